//! Key store loading
//!
//! This module turns a credential file on disk into [`KeyMaterial`]: the
//! decoded key store entries plus the key-manager set used to present a
//! client certificate.
//!
//! # Format resolution
//!
//! When no format is given it is guessed from the file name, once:
//!
//! - a name ending in `jks` is read as JKS
//! - a name ending in `p12` or `pkcs12` is read as PKCS12
//! - **anything else silently falls back to PKCS12**
//!
//! # Loading
//!
//! ```no_run
//! use sslctx::keystore::{self, KeystoreFormat};
//! use sslctx::Secret;
//! use std::path::Path;
//!
//! let material = keystore::load(
//!     Path::new("client.p12"),
//!     &Secret::from("secret"),
//!     None,
//!     None,
//! ).unwrap();
//!
//! assert_eq!(material.format(), KeystoreFormat::Pkcs12);
//! ```

pub mod jks;
pub mod pkcs12;
pub mod provider;

#[cfg(test)]
pub(crate) mod fixtures;

pub use provider::ProviderBinding;

use crate::config::ConfigError;
use crate::secret::Secret;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Label used in messages when no provider was requested
pub const DEFAULT_PROVIDER_LABEL: &str = "DEFAULT";

/// Key store encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeystoreFormat {
    /// PKCS #12 container
    Pkcs12,
    /// Java key store
    Jks,
}

impl KeystoreFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeystoreFormat::Pkcs12 => "PKCS12",
            KeystoreFormat::Jks => "JKS",
        }
    }
}

impl fmt::Display for KeystoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeystoreFormat {
    type Err = ConfigError;

    /// Parse a key store type name (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PKCS12" | "P12" => Ok(KeystoreFormat::Pkcs12),
            "JKS" => Ok(KeystoreFormat::Jks),
            _ => Err(ConfigError::UnsupportedKeystoreType(s.to_string())),
        }
    }
}

/// Outcome of guessing a format from a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatGuess {
    /// Name ends in `jks`
    JksSuffix,
    /// Name ends in `p12` or `pkcs12`
    Pkcs12Suffix,
    /// No known suffix; PKCS12 is assumed
    Fallback,
}

impl FormatGuess {
    pub fn format(&self) -> KeystoreFormat {
        match self {
            FormatGuess::JksSuffix => KeystoreFormat::Jks,
            FormatGuess::Pkcs12Suffix | FormatGuess::Fallback => KeystoreFormat::Pkcs12,
        }
    }
}

/// Classify a key store path by its suffix (case-insensitive, trimmed)
pub fn guess_format(path: &str) -> FormatGuess {
    let name = path.trim().to_lowercase();
    if name.ends_with("jks") {
        FormatGuess::JksSuffix
    } else if name.ends_with("p12") || name.ends_with("pkcs12") {
        FormatGuess::Pkcs12Suffix
    } else {
        FormatGuess::Fallback
    }
}

/// Resolve the format of a key store path
pub fn infer_format(path: &Path) -> KeystoreFormat {
    guess_format(&path.to_string_lossy()).format()
}

/// Key store errors
///
/// Every variant names the resolved path, format and provider; none of them
/// ever carries the password.
#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("Cannot open key store [{}] (type [{format}], provider [{provider}])", path.display())]
    Unreadable {
        path: PathBuf,
        format: KeystoreFormat,
        provider: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot load key store from [{}] (type [{format}], provider [{provider}]): {reason}", path.display())]
    DecodeFailed {
        path: PathBuf,
        format: KeystoreFormat,
        provider: String,
        reason: String,
    },

    #[error("Security provider [{provider}] is not available for key store [{}] (type [{format}]): {reason}", path.display())]
    ProviderUnavailable {
        path: PathBuf,
        format: KeystoreFormat,
        provider: String,
        reason: String,
    },

    #[error("Creating key managers failed for key store [{}] (type [{format}], provider [{provider}]): {reason}", path.display())]
    KeyManagerInitFailed {
        path: PathBuf,
        format: KeystoreFormat,
        provider: String,
        reason: String,
    },
}

/// Container decoding failures
#[derive(Debug, thiserror::Error)]
pub(crate) enum DecodeError {
    #[error("not a PKCS12 container: {0}")]
    NotPkcs12(ErrorStack),

    #[error("cannot decrypt PKCS12 container (wrong password or corrupt data): {0}")]
    Pkcs12Decrypt(ErrorStack),

    #[error("private key has no matching certificate")]
    KeyWithoutCertificate,

    #[error("container holds no entries")]
    NoEntries,

    #[error("file too short to be a JKS key store")]
    TooShort,

    #[error("JCEKS key stores are not supported")]
    Jceks,

    #[error("bad JKS magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("key store integrity check failed (wrong password or corrupt data)")]
    IntegrityCheckFailed,

    #[error("unsupported JKS version {0}")]
    UnsupportedVersion(u32),

    #[error("truncated key store at offset {0}")]
    Truncated(usize),

    #[error("entry [{0}] has no certificate chain")]
    MissingChain(String),

    #[error("entry [{alias}] has unknown tag {tag}")]
    UnknownTag { alias: String, tag: u32 },

    #[error("trailing bytes after last entry")]
    TrailingBytes,

    #[error("unsupported certificate type {0}")]
    CertificateType(String),

    #[error("bad certificate: {0}")]
    BadCertificate(ErrorStack),
}

/// Failures recovering a JKS-protected key
#[derive(Debug, thiserror::Error)]
pub(crate) enum KeyRecoveryError {
    #[error("malformed protected key: {0}")]
    Malformed(&'static str),

    #[error("expected DER tag 0x{expected:02x}, found 0x{found:02x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("key is not protected with the JKS key protector")]
    UnknownProtector,

    #[error("cannot recover key (password does not match)")]
    PasswordMismatch,

    #[error("recovered key is not PKCS#8: {0}")]
    NotPkcs8(ErrorStack),
}

/// Key-manager derivation failures
#[derive(Debug, thiserror::Error)]
pub(crate) enum KeyManagerError {
    #[error("entry [{alias}]: {source}")]
    Recovery {
        alias: String,
        #[source]
        source: KeyRecoveryError,
    },

    #[error("entry [{alias}]: unreadable certificate key: {source}")]
    CertificateKey {
        alias: String,
        #[source]
        source: ErrorStack,
    },

    #[error("entry [{alias}]: private key does not match its certificate")]
    KeyMismatch { alias: String },
}

/// Private key as it comes out of a container
#[derive(Debug)]
pub(crate) enum KeySource {
    /// Already decrypted by the container decoder
    Clear(PKey<Private>),
    /// JKS-protected key, recovered during key-manager derivation
    JksProtected(Vec<u8>),
}

/// Entry of a freshly decoded container
#[derive(Debug)]
pub(crate) enum RawEntry {
    PrivateKey {
        alias: String,
        key: KeySource,
        certificate: X509,
        chain: Vec<X509>,
    },
    TrustedCertificate {
        alias: String,
        certificate: X509,
    },
}

/// Kind of a key store entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    PrivateKey,
    TrustedCertificate,
}

/// Summary of one key store entry
#[derive(Clone)]
pub struct KeystoreEntry {
    alias: String,
    kind: EntryKind,
    certificate: X509,
}

impl KeystoreEntry {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Leaf certificate of the entry
    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }
}

impl fmt::Debug for KeystoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreEntry")
            .field("alias", &self.alias)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Local credentials offered for client authentication
#[derive(Clone)]
pub struct ClientIdentity {
    alias: String,
    key: PKey<Private>,
    certificate: X509,
    chain: Vec<X509>,
}

impl ClientIdentity {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn key(&self) -> &PKey<Private> {
        &self.key
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    /// Issuer certificates following the leaf
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("alias", &self.alias)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Key managers derived from a key store
///
/// Empty when the store holds no private key; the context then presents no
/// client certificate.
#[derive(Debug, Clone, Default)]
pub struct KeyManagerSet {
    identities: Vec<ClientIdentity>,
}

impl KeyManagerSet {
    /// Recover every private key with the store password and pair it with
    /// its certificate chain
    pub(crate) fn derive(entries: &[RawEntry], password: &Secret) -> Result<Self, KeyManagerError> {
        let mut identities = Vec::new();

        for entry in entries {
            let RawEntry::PrivateKey { alias, key, certificate, chain } = entry else {
                continue;
            };

            let key = match key {
                KeySource::Clear(key) => key.clone(),
                KeySource::JksProtected(protected) => jks::recover_key(protected, password)
                    .map_err(|source| KeyManagerError::Recovery {
                        alias: alias.clone(),
                        source,
                    })?,
            };

            let public = certificate
                .public_key()
                .map_err(|source| KeyManagerError::CertificateKey {
                    alias: alias.clone(),
                    source,
                })?;
            if !public.public_eq(&key) {
                return Err(KeyManagerError::KeyMismatch { alias: alias.clone() });
            }

            identities.push(ClientIdentity {
                alias: alias.clone(),
                key,
                certificate: certificate.clone(),
                chain: chain.clone(),
            });
        }

        Ok(KeyManagerSet { identities })
    }

    pub fn identities(&self) -> &[ClientIdentity] {
        &self.identities
    }

    /// Identity installed into a context
    pub fn primary(&self) -> Option<&ClientIdentity> {
        self.identities.first()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

/// Decoded key store plus its key managers
///
/// Only produced by a fully successful [`load`]; never mutated afterwards.
#[derive(Clone)]
pub struct KeyMaterial {
    path: PathBuf,
    format: KeystoreFormat,
    provider: Option<ProviderBinding>,
    entries: Vec<KeystoreEntry>,
    key_managers: KeyManagerSet,
}

impl KeyMaterial {
    /// Absolute path the store was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> KeystoreFormat {
        self.format
    }

    pub fn provider(&self) -> Option<&ProviderBinding> {
        self.provider.as_ref()
    }

    /// Provider name for messages, `DEFAULT` when none was requested
    pub fn provider_label(&self) -> &str {
        self.provider
            .as_ref()
            .map(|p| p.name())
            .unwrap_or(DEFAULT_PROVIDER_LABEL)
    }

    pub fn entries(&self) -> &[KeystoreEntry] {
        &self.entries
    }

    pub fn key_managers(&self) -> &KeyManagerSet {
        &self.key_managers
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("provider", &self.provider_label())
            .field("entries", &self.entries)
            .field("key_managers", &self.key_managers)
            .finish()
    }
}

/// Load a key store and derive its key managers
///
/// `format` overrides the guess from the file name; `provider` binds the
/// decoding to a named OpenSSL provider.
pub fn load(
    path: &Path,
    password: &Secret,
    format: Option<KeystoreFormat>,
    provider: Option<&str>,
) -> Result<KeyMaterial, KeystoreError> {
    let format = format.unwrap_or_else(|| infer_format(path));
    let path = absolutize(path);
    let provider_label = provider.unwrap_or(DEFAULT_PROVIDER_LABEL).to_string();

    info!(
        "Attempting to load the keystore from [{}] (key store type [{}])",
        path.display(),
        format
    );

    let mut bytes = Vec::new();
    File::open(&path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(|source| KeystoreError::Unreadable {
            path: path.clone(),
            format,
            provider: provider_label.clone(),
            source,
        })?;

    let binding = provider
        .map(ProviderBinding::bind)
        .transpose()
        .map_err(|e| KeystoreError::ProviderUnavailable {
            path: path.clone(),
            format,
            provider: provider_label.clone(),
            reason: e.to_string(),
        })?;

    let decoded = match format {
        KeystoreFormat::Pkcs12 => pkcs12::decode(&bytes, password),
        KeystoreFormat::Jks => jks::decode(&bytes, password),
    }
    .map_err(|e| KeystoreError::DecodeFailed {
        path: path.clone(),
        format,
        provider: provider_label.clone(),
        reason: e.to_string(),
    })?;

    let key_managers = KeyManagerSet::derive(&decoded, password).map_err(|e| {
        KeystoreError::KeyManagerInitFailed {
            path: path.clone(),
            format,
            provider: provider_label.clone(),
            reason: e.to_string(),
        }
    })?;

    if key_managers.is_empty() {
        warn!(
            "Key store [{}] holds no private key; no client certificate will be presented",
            path.display()
        );
    }

    let entries = decoded
        .into_iter()
        .map(|entry| match entry {
            RawEntry::PrivateKey { alias, certificate, .. } => KeystoreEntry {
                alias,
                kind: EntryKind::PrivateKey,
                certificate,
            },
            RawEntry::TrustedCertificate { alias, certificate } => KeystoreEntry {
                alias,
                kind: EntryKind::TrustedCertificate,
                certificate,
            },
        })
        .collect::<Vec<_>>();

    debug!(
        entries = entries.len(),
        identities = key_managers.identities().len(),
        "Key store decoded"
    );

    Ok(KeyMaterial {
        path,
        format,
        provider: binding,
        entries,
        key_managers,
    })
}

/// Make a path absolute against the working directory, for diagnostics
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
