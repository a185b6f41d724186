//! Context configuration
//!
//! [`ContextConfig`] is the single immutable input of the pipeline. It is
//! built once by the caller (normally the launcher, from its arguments) and
//! then only read.

use crate::keystore::KeystoreFormat;
use crate::secret::{Secret, MASK};
use std::fmt;
use std::path::{Path, PathBuf};

/// Protocol identifier used when none is given
pub const DEFAULT_PROTOCOL: &str = "TLS";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{policy} is not supported yet; disable strict name matching and retry")]
    UnsupportedPolicy { policy: &'static str },

    #[error("Unsupported key store type: {0} (expected PKCS12 or JKS)")]
    UnsupportedKeystoreType(String),

    #[error("Key store path must not be empty")]
    MissingKeystorePath,
}

/// Everything needed to assemble a TLS context
#[derive(Clone)]
pub struct ContextConfig {
    keystore_path: PathBuf,
    keystore_password: Secret,
    keystore_type: Option<KeystoreFormat>,
    provider: Option<String>,
    protocol: String,
    strict_name_matching: bool,
}

impl ContextConfig {
    /// Start a configuration from the two mandatory values
    pub fn builder(
        keystore_path: impl Into<PathBuf>,
        keystore_password: impl Into<Secret>,
    ) -> ContextConfigBuilder {
        ContextConfigBuilder {
            keystore_path: keystore_path.into(),
            keystore_password: keystore_password.into(),
            keystore_type: None,
            provider: None,
            protocol: DEFAULT_PROTOCOL.to_string(),
            strict_name_matching: true,
        }
    }

    pub fn keystore_path(&self) -> &Path {
        &self.keystore_path
    }

    pub fn keystore_password(&self) -> &Secret {
        &self.keystore_password
    }

    /// Explicit key store type, `None` when it is to be inferred
    pub fn keystore_type(&self) -> Option<KeystoreFormat> {
        self.keystore_type
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn strict_name_matching(&self) -> bool {
        self.strict_name_matching
    }
}

impl fmt::Display for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContextConfig [keystoreType={}, keystorePath={}, keystorePassword={}, \
             securityProvider={}, protocol={}, strictNameMatching={}]",
            self.keystore_type
                .map(|t| t.as_str())
                .unwrap_or("<inferred>"),
            self.keystore_path.display(),
            MASK,
            self.provider.as_deref().unwrap_or("DEFAULT"),
            self.protocol,
            self.strict_name_matching,
        )
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("keystore_path", &self.keystore_path)
            .field("keystore_password", &self.keystore_password)
            .field("keystore_type", &self.keystore_type)
            .field("provider", &self.provider)
            .field("protocol", &self.protocol)
            .field("strict_name_matching", &self.strict_name_matching)
            .finish()
    }
}

/// Builder for [`ContextConfig`]
pub struct ContextConfigBuilder {
    keystore_path: PathBuf,
    keystore_password: Secret,
    keystore_type: Option<KeystoreFormat>,
    provider: Option<String>,
    protocol: String,
    strict_name_matching: bool,
}

impl ContextConfigBuilder {
    /// Force the key store format instead of guessing it from the extension
    pub fn keystore_type(mut self, format: KeystoreFormat) -> Self {
        self.keystore_type = Some(format);
        self
    }

    /// Bind key store decoding to a named cryptographic provider
    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    /// Protocol identifier, e.g. `TLS` or `TLSv1.2`
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Request strict hostname matching (currently always rejected)
    pub fn strict_name_matching(mut self, strict: bool) -> Self {
        self.strict_name_matching = strict;
        self
    }

    pub fn build(self) -> Result<ContextConfig, ConfigError> {
        if self.keystore_path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ConfigError::MissingKeystorePath);
        }

        Ok(ContextConfig {
            keystore_path: self.keystore_path,
            keystore_password: self.keystore_password,
            keystore_type: self.keystore_type,
            provider: self.provider,
            protocol: self.protocol,
            strict_name_matching: self.strict_name_matching,
        })
    }
}
