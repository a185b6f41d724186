//! Context assembly
//!
//! [`ContextBuilder`] joins key material, exactly one trust policy and a
//! protocol selection into an immutable [`TlsContext`].

use super::protocol::Protocol;
use super::session::{SessionError, TlsSession};
use super::trust::TrustPolicyHandle;
use crate::keystore::{KeyMaterial, ProviderBinding};
use openssl::ssl::{Ssl, SslContext, SslContextBuilder, SslMethod, SslOptions};
use std::fmt;
use std::net::{IpAddr, TcpStream};
use tracing::{info, warn};

/// Context assembly errors
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Unsupported protocol [{protocol}]")]
    UnsupportedProtocol { protocol: String },

    #[error("Initializing TLS context failed (protocol [{protocol}], provider [{provider}]): {cause}")]
    InitFailed {
        protocol: String,
        provider: String,
        cause: String,
    },
}

/// Builder for [`TlsContext`]
pub struct ContextBuilder {
    key_material: KeyMaterial,
    trust_policy: TrustPolicyHandle,
    protocol: String,
}

impl ContextBuilder {
    /// Start from loaded key material and a resolved trust policy
    pub fn new(key_material: KeyMaterial, trust_policy: TrustPolicyHandle) -> Self {
        ContextBuilder {
            key_material,
            trust_policy,
            protocol: crate::config::DEFAULT_PROTOCOL.to_string(),
        }
    }

    /// Protocol identifier, `TLS` by default
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn build(self) -> Result<TlsContext, ContextError> {
        let protocol = Protocol::parse(&self.protocol).ok_or_else(|| {
            ContextError::UnsupportedProtocol {
                protocol: self.protocol.clone(),
            }
        })?;

        let mut builder =
            SslContextBuilder::new(SslMethod::tls()).map_err(|e| self.init_failed(e))?;

        builder
            .set_max_proto_version(protocol.max_version())
            .map_err(|e| self.init_failed(e))?;
        builder.set_options(SslOptions::IGNORE_UNEXPECTED_EOF);

        self.trust_policy.install(&mut builder);

        let key_managers = self.key_material.key_managers();
        let identity_alias = match key_managers.primary() {
            Some(identity) => {
                builder
                    .set_certificate(identity.certificate())
                    .map_err(|e| self.init_failed(e))?;
                builder
                    .set_private_key(identity.key())
                    .map_err(|e| self.init_failed(e))?;
                for issuer in identity.chain() {
                    builder
                        .add_extra_chain_cert(issuer.clone())
                        .map_err(|e| self.init_failed(e))?;
                }
                builder.check_private_key().map_err(|e| self.init_failed(e))?;

                info!("Presenting client identity [{}]", identity.alias());
                if key_managers.identities().len() > 1 {
                    warn!(
                        "Key store holds {} private keys; only [{}] is installed",
                        key_managers.identities().len(),
                        identity.alias()
                    );
                }
                Some(identity.alias().to_string())
            }
            None => None,
        };

        let provider = format!(
            "{} / {}",
            openssl::version::version(),
            self.key_material.provider_label()
        );
        info!("TLS context successfully initialized (provider [{}])", provider);

        Ok(TlsContext {
            ctx: builder.build(),
            protocol,
            trust_policy: self.trust_policy,
            identity_alias,
            provider,
            _provider_binding: self.key_material.provider().cloned(),
        })
    }

    fn init_failed(&self, cause: impl fmt::Display) -> ContextError {
        ContextError::InitFailed {
            protocol: self.protocol.clone(),
            provider: self.key_material.provider_label().to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Immutable TLS context
///
/// Cheap to clone and safe to share between threads; every connection made
/// from it sees the same key and trust configuration.
#[derive(Clone)]
pub struct TlsContext {
    ctx: SslContext,
    protocol: Protocol,
    trust_policy: TrustPolicyHandle,
    identity_alias: Option<String>,
    provider: String,
    _provider_binding: Option<ProviderBinding>,
}

impl TlsContext {
    /// Perform a client handshake over `stream`
    ///
    /// `servername` is sent as SNI unless it is an IP address literal.
    pub fn connect(&self, stream: TcpStream, servername: Option<&str>) -> Result<TlsSession, SessionError> {
        let mut ssl = Ssl::new(&self.ctx)?;
        if let Some(name) = servername {
            if name.parse::<IpAddr>().is_err() {
                ssl.set_hostname(name)?;
            }
        }
        TlsSession::connect(ssl, stream)
    }

    /// Perform a server handshake over `stream`
    pub fn accept(&self, stream: TcpStream) -> Result<TlsSession, SessionError> {
        let ssl = Ssl::new(&self.ctx)?;
        TlsSession::accept(ssl, stream)
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn trust_policy(&self) -> TrustPolicyHandle {
        self.trust_policy
    }

    /// Alias of the installed client identity
    pub fn identity_alias(&self) -> Option<&str> {
        self.identity_alias.as_deref()
    }

    /// Library and provider the context was built with
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("protocol", &self.protocol)
            .field("trust_policy", &self.trust_policy.policy())
            .field("identity_alias", &self.identity_alias)
            .field("provider", &self.provider)
            .finish()
    }
}
