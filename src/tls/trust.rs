//! Server trust policies
//!
//! A trust policy decides whether the certificate chain presented by a
//! peer is acceptable. The set of policies is closed:
//!
//! - [`TrustPolicy::TrustAll`] accepts **every** chain, logging the peer's
//!   subject before doing so. It removes all protection against
//!   man-in-the-middle attacks and exists for diagnostics and testing only.
//! - [`TrustPolicy::StrictHostnameMatch`] has no implementation. Asking for
//!   it fails with [`ConfigError::UnsupportedPolicy`] before any certificate
//!   is looked at.
//!
//! Only [`TrustPolicy::resolve`] and [`TrustPolicyHandle::insecure_trust_all`]
//! produce a [`TrustPolicyHandle`], so choosing the weakened policy is
//! always visible at the call site.

use super::cert;
use crate::config::ConfigError;
use openssl::ssl::{SslContextBuilder, SslVerifyMode};
use openssl::x509::{X509Ref, X509StoreContext, X509StoreContextRef};
use std::fmt;
use tracing::{debug, info};

/// Available trust strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Accept any chain (security-weakening)
    TrustAll,
    /// Hostname-to-certificate matching; unimplemented, always refused
    StrictHostnameMatch,
}

impl TrustPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            TrustPolicy::TrustAll => "TrustAll",
            TrustPolicy::StrictHostnameMatch => "StrictHostnameMatch",
        }
    }

    /// Pick the policy for a configuration
    ///
    /// `strict_name_matching = true` always fails: the matching rules
    /// (wildcards, SAN versus CN precedence) are undefined, and the request
    /// is refused rather than downgraded.
    pub fn resolve(strict_name_matching: bool) -> Result<TrustPolicyHandle, ConfigError> {
        if strict_name_matching {
            return Err(ConfigError::UnsupportedPolicy {
                policy: TrustPolicy::StrictHostnameMatch.name(),
            });
        }

        Ok(TrustPolicyHandle::insecure_trust_all())
    }
}

impl fmt::Display for TrustPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the connection presented the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Server,
    Client,
}

impl PeerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerRole::Server => "server",
            PeerRole::Client => "client",
        }
    }
}

/// A resolved, installable trust policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustPolicyHandle {
    policy: TrustPolicy,
}

impl TrustPolicyHandle {
    /// Accept every certificate chain
    ///
    /// **Security-weakening**: peers are not authenticated at all.
    pub fn insecure_trust_all() -> Self {
        TrustPolicyHandle {
            policy: TrustPolicy::TrustAll,
        }
    }

    pub fn policy(&self) -> TrustPolicy {
        self.policy
    }

    /// Decide on a chain given its first (leaf) certificate
    pub fn check_chain(&self, role: PeerRole, leaf: &X509Ref, auth_type: &str) -> bool {
        match self.policy {
            TrustPolicy::TrustAll => {
                info!(
                    "Trusting {} with SubjectDN: [{}] (auth type [{}])",
                    role.as_str(),
                    cert::distinguished_name(leaf.subject_name()),
                    auth_type
                );
                true
            }
            TrustPolicy::StrictHostnameMatch => false,
        }
    }

    /// Install this policy as the context's only verifier
    pub(crate) fn install(&self, builder: &mut SslContextBuilder) {
        let handle = *self;
        builder.set_verify_callback(SslVerifyMode::PEER, move |preverify_ok, store| {
            handle.verify(preverify_ok, store)
        });
    }

    /// OpenSSL verify callback
    ///
    /// Called once per chain element, plus once per error found. The
    /// decision is taken on the successful pass over depth 0.
    fn verify(&self, preverify_ok: bool, store: &mut X509StoreContextRef) -> bool {
        if self.policy == TrustPolicy::StrictHostnameMatch {
            return false;
        }

        if !preverify_ok {
            debug!(
                depth = store.error_depth(),
                error = %store.error(),
                "Ignoring chain verification error"
            );
            return true;
        }

        if store.error_depth() != 0 {
            return true;
        }

        let Some(leaf) = store.current_cert() else {
            return true;
        };

        let role = X509StoreContext::ssl_idx()
            .ok()
            .and_then(|idx| store.ex_data(idx))
            .map(|ssl| if ssl.is_server() { PeerRole::Client } else { PeerRole::Server })
            .unwrap_or(PeerRole::Server);

        self.check_chain(role, leaf, &cert::key_algorithm(leaf))
    }
}
