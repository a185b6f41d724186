//! Probe targets
//!
//! Resolves a URL string into what the probe needs: where to connect, what
//! to send as SNI and `Host`, and which path to request.

use super::ProbeError;
use std::io;
use std::net::SocketAddr;
use url::{Host, Url};

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// A parsed `https` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self, ProbeError> {
        let url = Url::parse(input).map_err(|e| ProbeError::InvalidUrl {
            url: input.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(url)
    }

    fn from_url(url: Url) -> Result<Self, ProbeError> {
        if url.scheme() != "https" {
            return Err(ProbeError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host().is_none() {
            return Err(ProbeError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }
        Ok(Target { url })
    }

    /// Resolve a `Location` header against this target
    pub fn join(&self, location: &str) -> Result<Self, ProbeError> {
        let url = self.url.join(location).map_err(|e| ProbeError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or(DEFAULT_HTTPS_PORT)
    }

    /// Host as written in the URL (IPv6 literals keep their brackets)
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Name to send as SNI; IP literals get none
    pub fn servername(&self) -> Option<&str> {
        match self.url.host() {
            Some(Host::Domain(domain)) => Some(domain),
            _ => None,
        }
    }

    /// Value of the `Host` request header
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }

    /// Request target: path plus query
    pub fn request_path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.url.socket_addrs(|| Some(DEFAULT_HTTPS_PORT))
    }
}
