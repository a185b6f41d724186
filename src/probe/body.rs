//! Response body framing
//!
//! [`BodyReader`] exposes exactly the body of a response as a `Read`,
//! removing chunked transfer encoding on the fly.

use super::response::{read_line, ResponseHead};
use std::io::{self, BufRead, Read};

/// How the end of a body is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// No body at all (204, 304)
    Empty,
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// `Content-Length: n`
    Length(u64),
    /// Everything until the server closes the connection
    UntilClose,
}

impl Framing {
    pub fn of(head: &ResponseHead) -> io::Result<Self> {
        if matches!(head.status, 204 | 304) {
            return Ok(Framing::Empty);
        }

        if let Some(encoding) = head.headers.get("Transfer-Encoding") {
            if encoding
                .rsplit(',')
                .next()
                .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
            {
                return Ok(Framing::Chunked);
            }
        }

        if let Some(length) = head.headers.get("Content-Length") {
            let length = length.trim().parse::<u64>().map_err(|_| {
                invalid_data(format!("Invalid Content-Length: {}", length))
            })?;
            return Ok(Framing::Length(length));
        }

        Ok(Framing::UntilClose)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ChunkState {
    Size,
    Data { remaining: u64 },
    DataEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BodyState {
    Chunked(ChunkState),
    Length { remaining: u64 },
    UntilClose,
    Done,
}

/// Reader over one response body
pub struct BodyReader<R: BufRead> {
    inner: R,
    state: BodyState,
}

impl<R: BufRead> BodyReader<R> {
    pub fn new(inner: R, framing: Framing) -> Self {
        let state = match framing {
            Framing::Empty | Framing::Length(0) => BodyState::Done,
            Framing::Chunked => BodyState::Chunked(ChunkState::Size),
            Framing::Length(remaining) => BodyState::Length { remaining },
            Framing::UntilClose => BodyState::UntilClose,
        };
        BodyReader { inner, state }
    }

    pub fn is_done(&self) -> bool {
        self.state == BodyState::Done
    }

    fn read_chunked(&mut self, buf: &mut [u8], mut chunk: ChunkState) -> io::Result<usize> {
        loop {
            match chunk {
                ChunkState::Size => {
                    let line = read_line(&mut self.inner)?
                        .ok_or_else(|| unexpected_eof("chunk size"))?;
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    let size = u64::from_str_radix(size_str, 16)
                        .map_err(|_| invalid_data(format!("Invalid chunk size: {}", size_str)))?;

                    if size == 0 {
                        self.skip_trailers()?;
                        self.state = BodyState::Done;
                        return Ok(0);
                    }
                    chunk = ChunkState::Data { remaining: size };
                }

                ChunkState::Data { remaining } => {
                    let max = remaining.min(buf.len() as u64) as usize;
                    let n = self.inner.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(unexpected_eof("chunk data"));
                    }

                    let remaining = remaining - n as u64;
                    self.state = BodyState::Chunked(if remaining == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data { remaining }
                    });
                    return Ok(n);
                }

                ChunkState::DataEnd => {
                    let line = read_line(&mut self.inner)?
                        .ok_or_else(|| unexpected_eof("chunk terminator"))?;
                    if !line.is_empty() {
                        return Err(invalid_data("Expected CRLF after chunk".to_string()));
                    }
                    chunk = ChunkState::Size;
                }
            }
        }
    }

    /// Trailer headers end with an empty line
    fn skip_trailers(&mut self) -> io::Result<()> {
        loop {
            match read_line(&mut self.inner)? {
                None => return Ok(()),
                Some(line) if line.is_empty() => return Ok(()),
                Some(_) => continue,
            }
        }
    }
}

impl<R: BufRead> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.state {
            BodyState::Done => Ok(0),

            BodyState::Chunked(chunk) => self.read_chunked(buf, chunk),

            BodyState::Length { remaining } => {
                let max = remaining.min(buf.len() as u64) as usize;
                let n = self.inner.read(&mut buf[..max])?;
                if n == 0 {
                    return Err(unexpected_eof("body"));
                }
                let remaining = remaining - n as u64;
                self.state = if remaining == 0 {
                    BodyState::Done
                } else {
                    BodyState::Length { remaining }
                };
                Ok(n)
            }

            BodyState::UntilClose => {
                let n = self.inner.read(buf)?;
                if n == 0 {
                    self.state = BodyState::Done;
                }
                Ok(n)
            }
        }
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn unexpected_eof(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("Connection closed inside {}", what),
    )
}
