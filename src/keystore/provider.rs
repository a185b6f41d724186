//! Named cryptographic providers
//!
//! OpenSSL 3 exposes algorithm implementations through providers
//! (`default`, `legacy`, `fips`, ...). Binding one loads it into the default
//! library context for as long as the binding, or any context built from it,
//! is alive.

use openssl::error::ErrorStack;
use openssl::provider::Provider;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A loaded provider
#[derive(Clone)]
pub struct ProviderBinding {
    name: String,
    _handle: Arc<Provider>,
}

impl ProviderBinding {
    /// Load the named provider, keeping the built-in ones available as
    /// fallbacks
    pub fn bind(name: &str) -> Result<Self, ErrorStack> {
        let provider = Provider::try_load(None, name, true)?;
        info!("Security provider [{}] loaded", name);

        Ok(ProviderBinding {
            name: name.to_string(),
            _handle: Arc::new(provider),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderBinding").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_default_provider() {
        let binding = ProviderBinding::bind("default").unwrap();
        assert_eq!(binding.name(), "default");
    }

    #[test]
    fn test_bind_unknown_provider_fails() {
        assert!(ProviderBinding::bind("definitely-not-a-provider").is_err());
    }
}
