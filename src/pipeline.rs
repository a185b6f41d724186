//! Context-assembly pipeline
//!
//! `ContextConfig → TrustPolicy`, `ContextConfig → KeyMaterial`, then
//! `ContextBuilder → TlsContext`. Every step either succeeds or aborts the
//! whole run; nothing is retried and no partial context is returned.

use crate::config::ContextConfig;
use crate::keystore;
use crate::tls::{ContextBuilder, TlsContext, TrustPolicy};
use crate::Result;
use tracing::info;

/// Build a TLS context from a configuration
///
/// The trust policy is resolved first: a refused policy fails before the
/// key store is touched.
pub fn build_context(config: &ContextConfig) -> Result<TlsContext> {
    let trust_policy = TrustPolicy::resolve(config.strict_name_matching())?;

    let key_material = keystore::load(
        config.keystore_path(),
        config.keystore_password(),
        config.keystore_type(),
        config.provider(),
    )?;

    let context = ContextBuilder::new(key_material, trust_policy)
        .protocol(config.protocol())
        .build()?;

    info!(
        "Context created with trust policy [{}] and protocol [{}]",
        trust_policy.policy(),
        context.protocol()
    );
    Ok(context)
}
