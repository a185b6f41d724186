//! Connection probing
//!
//! Exercises a [`TlsContext`] against a live HTTPS endpoint: connect,
//! handshake, `GET` the URL and stream the body back line by line.
//!
//! # Examples
//!
//! ```no_run
//! use sslctx::probe;
//! # fn ctx() -> sslctx::tls::TlsContext { unimplemented!() }
//!
//! let context = ctx();
//! for line in probe::probe(&context, "https://example.com/").unwrap() {
//!     println!("< {}", line.unwrap());
//! }
//! ```
//!
//! The lines are produced lazily while the body is read; the sequence ends
//! with the body and cannot be restarted. A failed probe leaves the context
//! untouched and usable.

pub mod body;
pub mod response;
pub mod target;

pub use body::{BodyReader, Framing};
pub use response::{Headers, ResponseHead};
pub use target::Target;

use crate::tls::{SessionError, TlsContext, TlsSession};
use socket2::{Domain, Protocol as SockProtocol, SockAddr, Socket, Type};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use tracing::{debug, info};

/// Redirects followed by default
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// User agent sent with probe requests
pub const USER_AGENT: &str = concat!("sslctx/", env!("CARGO_PKG_VERSION"));

/// Probe errors
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Invalid URL [{url}]: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme [{0}] (only https can be probed)")]
    UnsupportedScheme(String),

    #[error("Cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed response: {0}")]
    Protocol(String),

    #[error("Server returned HTTP {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),
}

/// Probe `url` with default settings
pub fn probe(context: &TlsContext, url: &str) -> Result<ProbeLines, ProbeError> {
    Prober::new(context.clone()).probe(url)
}

/// Configurable probe
pub struct Prober {
    context: TlsContext,
    timeout: Option<Duration>,
    max_redirects: usize,
}

impl Prober {
    pub fn new(context: TlsContext) -> Self {
        Prober {
            context,
            timeout: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Connect and read timeout; none by default
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Maximum redirects to follow, 0 to disable
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Fetch `url` and return its body lines
    ///
    /// Redirects to other `https` URLs are followed; a redirect to any other
    /// scheme is returned as is.
    pub fn probe(&self, url: &str) -> Result<ProbeLines, ProbeError> {
        let mut target = Target::parse(url)?;
        let mut redirects = 0;

        loop {
            let (head, reader) = self.exchange(&target)?;

            if head.is_redirect() {
                if let Some(next) = head.headers.get("Location").and_then(|l| target.join(l).ok()) {
                    if redirects >= self.max_redirects {
                        if self.max_redirects > 0 {
                            return Err(ProbeError::TooManyRedirects(self.max_redirects));
                        }
                    } else {
                        redirects += 1;
                        info!("Following redirect {} to [{}]", head.status, next.url());
                        target = next;
                        continue;
                    }
                }
            }

            if head.status >= 400 {
                return Err(ProbeError::HttpStatus {
                    status: head.status,
                    reason: head.reason,
                });
            }

            let framing = Framing::of(&head)?;
            debug!(status = head.status, ?framing, "Response head received");
            return Ok(ProbeLines::new(head, BodyReader::new(reader, framing)));
        }
    }

    fn exchange(&self, target: &Target) -> Result<(ResponseHead, BufReader<TlsSession>), ProbeError> {
        let tcp_stream = self.connect(target)?;
        let mut session = self.context.connect(tcp_stream, target.servername())?;
        debug!(
            version = %session.info().version,
            cipher = %session.info().cipher,
            "TLS session established with {}",
            target.authority()
        );

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            target.request_path(),
            target.authority(),
            USER_AGENT
        );
        session.write_all(request.as_bytes())?;
        session.flush()?;

        let mut reader = BufReader::new(session);
        let head = response::read_head(&mut reader)?;
        Ok((head, reader))
    }

    fn connect(&self, target: &Target) -> Result<TcpStream, ProbeError> {
        let connect_error = |source: io::Error| ProbeError::Connect {
            host: target.host().to_string(),
            port: target.port(),
            source,
        };

        let addrs = target.socket_addrs().map_err(connect_error)?;
        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");

        for addr in addrs {
            match self.connect_addr(addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "Connect attempt failed");
                    last_error = e;
                }
            }
        }

        Err(connect_error(last_error))
    }

    fn connect_addr(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(SockProtocol::TCP))?;
        let sock_addr = SockAddr::from(addr);

        match self.timeout {
            Some(timeout) => socket.connect_timeout(&sock_addr, timeout)?,
            None => socket.connect(&sock_addr)?,
        }
        socket.set_nodelay(true)?;
        socket.set_read_timeout(self.timeout)?;
        socket.set_write_timeout(self.timeout)?;

        Ok(socket.into())
    }
}

/// Lazily decoded body lines
///
/// Lines are split on `\n` with any trailing `\r` removed and decoded as
/// UTF-8 (invalid sequences replaced). After the first error the iterator
/// is exhausted.
pub struct ProbeLines {
    head: ResponseHead,
    reader: BufReader<BodyReader<BufReader<TlsSession>>>,
    done: bool,
}

impl ProbeLines {
    fn new(head: ResponseHead, body: BodyReader<BufReader<TlsSession>>) -> Self {
        ProbeLines {
            head,
            reader: BufReader::new(body),
            done: false,
        }
    }

    /// Head of the final (non-redirect) response
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }
}

impl Iterator for ProbeLines {
    type Item = Result<String, ProbeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut raw = Vec::new();
        match self.reader.read_until(b'\n', &mut raw) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                if raw.last() == Some(&b'\n') {
                    raw.pop();
                    if raw.last() == Some(&b'\r') {
                        raw.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&raw).into_owned()))
            }
            Err(e) => {
                self.done = true;
                Some(Err(ProbeError::Io(e)))
            }
        }
    }
}
