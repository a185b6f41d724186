//! PKCS #12 containers
//!
//! Decoding is delegated to OpenSSL. A container holds at most one private
//! key with its certificate; any further certificates are either that
//! key's chain or, in a key-less container, trusted certificates.

use super::{DecodeError, KeySource, RawEntry};
use crate::secret::Secret;
use openssl::pkcs12::Pkcs12;
use openssl::x509::X509;

/// Decode a DER-encoded PKCS #12 container
pub(crate) fn decode(der: &[u8], password: &Secret) -> Result<Vec<RawEntry>, DecodeError> {
    let container = Pkcs12::from_der(der).map_err(DecodeError::NotPkcs12)?;
    let parsed = container
        .parse2(password.expose())
        .map_err(DecodeError::Pkcs12Decrypt)?;

    let others: Vec<X509> = parsed
        .ca
        .map(|stack| stack.into_iter().collect())
        .unwrap_or_default();

    let mut entries = Vec::new();
    match (parsed.pkey, parsed.cert) {
        (Some(key), Some(certificate)) => {
            entries.push(RawEntry::PrivateKey {
                alias: alias_of(&certificate, 0),
                key: KeySource::Clear(key),
                certificate,
                chain: others,
            });
        }
        (Some(_), None) => {
            return Err(DecodeError::KeyWithoutCertificate);
        }
        (None, leaf) => {
            for (index, certificate) in leaf.into_iter().chain(others).enumerate() {
                entries.push(RawEntry::TrustedCertificate {
                    alias: alias_of(&certificate, index),
                    certificate,
                });
            }
        }
    }

    if entries.is_empty() {
        return Err(DecodeError::NoEntries);
    }

    Ok(entries)
}

/// Friendly name of a certificate, or a positional alias
fn alias_of(certificate: &X509, index: usize) -> String {
    certificate
        .alias()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_else(|| (index + 1).to_string())
}
