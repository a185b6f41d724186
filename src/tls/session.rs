//! Established TLS sessions
//!
//! A [`TlsSession`] is one handshaken connection made from a
//! [`TlsContext`](super::TlsContext). It is a plain blocking
//! `Read + Write` stream.

use super::cert::CertInfo;
use openssl::error::ErrorStack;
use openssl::ssl::{Ssl, SslRef, SslStream};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Session establishment errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("TLS session setup failed: {0}")]
    Setup(#[from] ErrorStack),

    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Negotiated parameters of a session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Negotiated protocol version (e.g. "TLSv1.3")
    pub version: String,
    /// Negotiated cipher suite
    pub cipher: String,
    /// Certificate presented by the peer, if any
    pub peer: Option<CertInfo>,
}

impl SessionInfo {
    fn from_ssl(ssl: &SslRef) -> Self {
        SessionInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            peer: ssl.peer_certificate().map(|cert| CertInfo::from_x509(&cert)),
        }
    }
}

/// A handshaken TLS connection over TCP
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    info: SessionInfo,
}

impl TlsSession {
    pub(crate) fn connect(ssl: Ssl, tcp_stream: TcpStream) -> Result<Self, SessionError> {
        let stream = ssl
            .connect(tcp_stream)
            .map_err(|e| SessionError::HandshakeFailed(format!("connect failed: {}", e)))?;
        let info = SessionInfo::from_ssl(stream.ssl());
        Ok(TlsSession { stream, info })
    }

    pub(crate) fn accept(ssl: Ssl, tcp_stream: TcpStream) -> Result<Self, SessionError> {
        let stream = ssl
            .accept(tcp_stream)
            .map_err(|e| SessionError::HandshakeFailed(format!("accept failed: {}", e)))?;
        let info = SessionInfo::from_ssl(stream.ssl());
        Ok(TlsSession { stream, info })
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Send close_notify and shut the socket down
    pub fn close(&mut self) -> io::Result<()> {
        let _ = self.stream.shutdown();
        self.stream.get_mut().shutdown(Shutdown::Both)
    }
}

impl Read for TlsSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TlsSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
