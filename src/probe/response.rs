//! HTTP/1.1 response heads
//!
//! Reads the status line and header block of a response from a buffered
//! stream, leaving the stream positioned at the first body byte.

use super::ProbeError;
use std::io::{BufRead, Read};

/// Maximum number of headers per response
pub const MAX_HEADERS: usize = 100;

/// Maximum length of a single head line
pub const MAX_LINE_LEN: usize = 16 * 1024;

/// Response headers, case-insensitive lookup, insertion order kept
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First value of a header
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.headers.len()
    }
}

/// Status line plus headers
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

/// Parse `HTTP/1.1 200 OK`
pub fn parse_status_line(line: &str) -> Result<(String, u16, String), ProbeError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ProbeError::Protocol(format!("Invalid status line: {}", line)));
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..=999).contains(code))
        .ok_or_else(|| ProbeError::Protocol(format!("Invalid status code in: {}", line)))?;
    let reason = parts.next().unwrap_or_default().trim().to_string();

    Ok((version.to_string(), status, reason))
}

/// Read one CRLF- or LF-terminated line, without its terminator
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut raw = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Ok(None);
    }
    if raw.last() != Some(&b'\n') && n == MAX_LINE_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "line too long",
        ));
    }
    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Read a complete response head, skipping interim (1xx) responses
pub fn read_head<R: BufRead>(reader: &mut R) -> Result<ResponseHead, ProbeError> {
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| ProbeError::Protocol("Connection closed before response".to_string()))?;
        let (version, status, reason) = parse_status_line(&line)?;

        let mut headers = Headers::new();
        loop {
            let line = read_line(reader)?
                .ok_or_else(|| ProbeError::Protocol("Connection closed inside headers".to_string()))?;
            if line.is_empty() {
                break;
            }
            if headers.len() >= MAX_HEADERS {
                return Err(ProbeError::Protocol("Too many headers".to_string()));
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProbeError::Protocol(format!("Invalid header: {}", line)))?;
            headers.insert(name.trim(), value.trim());
        }

        if (100..200).contains(&status) && status != 101 {
            continue;
        }

        return Ok(ResponseHead {
            version,
            status,
            reason,
            headers,
        });
    }
}
