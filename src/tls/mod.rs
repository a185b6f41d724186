//! TLS context assembly
//!
//! This module wires loaded key material and a trust policy into an
//! immutable, shareable [`TlsContext`]. The TLS protocol itself is provided
//! by OpenSSL.
//!
//! # Architecture
//!
//! 1. [`TrustPolicy::resolve`] picks the (single) trust strategy
//! 2. [`ContextBuilder`] combines it with the key managers of a
//!    [`KeyMaterial`](crate::keystore::KeyMaterial) and a [`Protocol`]
//! 3. [`TlsContext::connect`] / [`TlsContext::accept`] hand out
//!    [`TlsSession`]s, any number of them, from any thread
//!
//! # Examples
//!
//! ```no_run
//! use sslctx::keystore;
//! use sslctx::tls::{ContextBuilder, TrustPolicy};
//! use sslctx::Secret;
//! use std::net::TcpStream;
//! use std::path::Path;
//!
//! let material = keystore::load(Path::new("client.p12"), &Secret::from("secret"), None, None).unwrap();
//! let trust = TrustPolicy::resolve(false).unwrap();
//! let ctx = ContextBuilder::new(material, trust)
//!     .protocol("TLSv1.2")
//!     .build()
//!     .unwrap();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let session = ctx.connect(tcp_stream, Some("example.com")).unwrap();
//! println!("negotiated {}", session.info().version);
//! ```

pub mod cert;
pub mod context;
pub mod protocol;
pub mod session;
pub mod trust;

pub use cert::CertInfo;
pub use context::{ContextBuilder, ContextError, TlsContext};
pub use protocol::Protocol;
pub use session::{SessionError, SessionInfo, TlsSession};
pub use trust::{PeerRole, TrustPolicy, TrustPolicyHandle};
