//! Certificate summaries
//!
//! Extracts the printable parts of an X.509 certificate: distinguished
//! names, subject alternative names and the public key algorithm.

use openssl::pkey::Id;
use openssl::x509::{X509NameRef, X509Ref};

/// Certificate information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject distinguished name, most specific attribute first
    pub subject: String,
    /// Issuer distinguished name, most specific attribute first
    pub issuer: String,
    /// Subject Alternative Names (DNS names and IP addresses)
    pub subject_alt_names: Vec<String>,
    /// Public key algorithm, e.g. "RSA" or "EC"
    pub key_algorithm: String,
}

impl CertInfo {
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: distinguished_name(cert.subject_name()),
            issuer: distinguished_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
            key_algorithm: key_algorithm(cert),
        }
    }
}

/// Render a name as `CN=..., O=..., C=...`
///
/// Certificates store the most general attribute first; the rendering
/// reverses that, as RFC 4514 strings do.
pub fn distinguished_name(name: &X509NameRef) -> String {
    let mut parts: Vec<String> = name
        .entries()
        .map(|entry| {
            let key = entry
                .object()
                .nid()
                .short_name()
                .map(str::to_string)
                .unwrap_or_else(|_| entry.object().to_string());
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_else(|_| "<undef>".to_string());
            format!("{}={}", key, value)
        })
        .collect();

    parts.reverse();
    parts.join(", ")
}

/// Name of the certificate's public key algorithm
pub fn key_algorithm(cert: &X509Ref) -> String {
    let Ok(key) = cert.public_key() else {
        return "UNKNOWN".to_string();
    };

    match key.id() {
        Id::RSA => "RSA".to_string(),
        Id::RSA_PSS => "RSASSA-PSS".to_string(),
        Id::EC => "EC".to_string(),
        Id::DSA => "DSA".to_string(),
        Id::ED25519 => "Ed25519".to_string(),
        Id::ED448 => "Ed448".to_string(),
        other => format!("NID {}", other.as_raw()),
    }
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(san_ext) = cert.subject_alt_names() {
        for name in san_ext {
            if let Some(dns) = name.dnsname() {
                names.push(format!("DNS:{}", dns));
            } else if let Some(ip) = name.ipaddress() {
                match ip.len() {
                    4 => {
                        let octets: [u8; 4] = [ip[0], ip[1], ip[2], ip[3]];
                        names.push(format!("IP:{}", std::net::Ipv4Addr::from(octets)));
                    }
                    16 => {
                        let mut octets = [0u8; 16];
                        octets.copy_from_slice(ip);
                        names.push(format!("IP:{}", std::net::Ipv6Addr::from(octets)));
                    }
                    _ => {}
                }
            }
        }
    }

    names
}
