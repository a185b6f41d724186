//! Protocol identifiers
//!
//! Maps the textual protocol name of a configuration onto OpenSSL version
//! bounds.

use openssl::ssl::SslVersion;
use std::fmt;

/// TLS protocol selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Let the library negotiate any version it supports ("TLS")
    Negotiated,
    /// TLS 1.0 and below
    Tls10,
    /// TLS 1.1 and below
    Tls11,
    /// TLS 1.2 and below
    Tls12,
    /// TLS 1.3 and below
    Tls13,
}

impl Protocol {
    /// Parse a protocol identifier (case-insensitive)
    ///
    /// Returns `None` for identifiers the library cannot honour. SSLv3 is
    /// one of them: OpenSSL 3 builds cannot negotiate it.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TLS" | "SSL" | "DEFAULT" => Some(Protocol::Negotiated),
            "TLSV1" | "TLSV1.0" | "TLS1" | "TLS1.0" => Some(Protocol::Tls10),
            "TLSV1.1" | "TLS1.1" => Some(Protocol::Tls11),
            "TLSV1.2" | "TLS1.2" => Some(Protocol::Tls12),
            "TLSV1.3" | "TLS1.3" => Some(Protocol::Tls13),
            _ => None,
        }
    }

    /// Highest version the context may negotiate, `None` for no cap
    pub fn max_version(&self) -> Option<SslVersion> {
        match self {
            Protocol::Negotiated => None,
            Protocol::Tls10 => Some(SslVersion::TLS1),
            Protocol::Tls11 => Some(SslVersion::TLS1_1),
            Protocol::Tls12 => Some(SslVersion::TLS1_2),
            Protocol::Tls13 => Some(SslVersion::TLS1_3),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Negotiated => "TLS",
            Protocol::Tls10 => "TLSv1",
            Protocol::Tls11 => "TLSv1.1",
            Protocol::Tls12 => "TLSv1.2",
            Protocol::Tls13 => "TLSv1.3",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
