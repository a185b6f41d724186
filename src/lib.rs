//! sslctx - TLS client context assembly
//!
//! This crate builds a configured TLS context from a local key store
//! (PKCS12 or JKS) and an explicit server-trust policy, and can exercise the
//! result against a live HTTPS endpoint.

pub mod config;
pub mod keystore;
#[cfg(test)]
mod log_capture;
pub mod pipeline;
pub mod probe;
pub mod secret;
pub mod tls;

pub use config::{ConfigError, ContextConfig};
pub use keystore::{KeyMaterial, KeystoreError, KeystoreFormat};
pub use pipeline::build_context;
pub use probe::{probe, ProbeError};
pub use secret::Secret;
pub use tls::{ContextBuilder, ContextError, TlsContext, TrustPolicy};

/// Result type for the context pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure of the context pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Context(#[from] ContextError),
}
