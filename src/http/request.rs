//! Request head reading and parsing.
//!
//! # Responsibilities
//! - Accumulate client bytes until the blank line ending the head
//! - Enforce the head buffer capacity
//! - Decompose the head into method, target host/port/path, version and headers
//!
//! # Design Decisions
//! - Tokenizing is delegated to `httparse`
//! - A missing host or path is not a parse error; the handler answers it with 400
//! - Header order and duplicates are preserved for re-serialization

use std::num::ParseIntError;
use std::time::Duration;

use http::uri::{Authority, Scheme, Uri};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::resilience::{with_deadline, TimeoutError};

/// Marks the end of a request head.
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Shortest possible header line, `a:\n`. Bounds the header count for a head
/// of a given length, so the only limit on headers is the head buffer itself.
const MIN_HEADER_LINE: usize = 3;

/// Error type for reading and parsing a request head.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The peer closed without sending a byte.
    #[error("client closed before sending a request")]
    Closed,
    /// The peer closed before the head was complete.
    #[error("client closed after {received} bytes without completing the request head")]
    Incomplete { received: usize },
    /// The head did not fit in the buffer.
    #[error("request head exceeds {capacity} bytes")]
    HeadTooLarge { capacity: usize },
    #[error("reading request head: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    #[error("malformed request head: {0}")]
    Parse(#[from] httparse::Error),
    #[error("request head is incomplete")]
    Partial,
    #[error("invalid request target `{0}`")]
    InvalidTarget(String),
    #[error("unsupported scheme in `{0}`")]
    UnsupportedScheme(String),
    #[error("invalid Host header `{0}`")]
    InvalidHost(String),
}

impl RequestError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Closed => "closed",
            RequestError::Incomplete { .. } => "incomplete",
            RequestError::HeadTooLarge { .. } => "head_too_large",
            RequestError::Io(_) => "io",
            RequestError::Timeout(_) => "timeout",
            RequestError::Parse(_)
            | RequestError::Partial
            | RequestError::InvalidTarget(_)
            | RequestError::UnsupportedScheme(_)
            | RequestError::InvalidHost(_) => "parse",
        }
    }
}

/// A single header line. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Structured form of one client request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub version: String,
    pub headers: Vec<HeaderField>,
}

impl ParsedRequest {
    /// Parse a complete request head.
    pub fn parse(head: &[u8]) -> Result<Self, RequestError> {
        let mut storage = vec![httparse::EMPTY_HEADER; head.len() / MIN_HEADER_LINE + 1];
        let mut req = httparse::Request::new(&mut storage);
        if req.parse(head)?.is_partial() {
            return Err(RequestError::Partial);
        }

        let (Some(method), Some(target), Some(minor)) = (req.method, req.path, req.version)
        else {
            return Err(RequestError::Partial);
        };

        let headers: Vec<HeaderField> = req
            .headers
            .iter()
            .map(|h| HeaderField::new(h.name, h.value))
            .collect();

        let mut request = ParsedRequest {
            method: method.to_string(),
            host: None,
            port: None,
            path: None,
            version: format!("HTTP/1.{minor}"),
            headers,
        };
        request.resolve_target(target)?;
        Ok(request)
    }

    /// Fill host, port and path from the request target, falling back to the
    /// Host header for origin-form targets.
    fn resolve_target(&mut self, target: &str) -> Result<(), RequestError> {
        if target.starts_with('/') {
            self.path = Some(target.to_string());
            return self.host_from_header();
        }
        if target == "*" {
            return self.host_from_header();
        }

        if target.contains("://") {
            let uri: Uri = target
                .parse()
                .map_err(|_| RequestError::InvalidTarget(target.to_string()))?;
            if uri.scheme() != Some(&Scheme::HTTP) {
                return Err(RequestError::UnsupportedScheme(target.to_string()));
            }
            let authority = uri
                .authority()
                .ok_or_else(|| RequestError::InvalidTarget(target.to_string()))?;
            self.set_authority(authority)
                .map_err(|_| RequestError::InvalidTarget(target.to_string()))?;
            let path = uri
                .path_and_query()
                .map(|pq| pq.as_str())
                .filter(|p| !p.is_empty())
                .unwrap_or("/");
            self.path = Some(path.to_string());
            return Ok(());
        }

        // Authority-form: names a host but carries no path.
        let authority: Authority = target
            .parse()
            .map_err(|_| RequestError::InvalidTarget(target.to_string()))?;
        self.set_authority(&authority)
            .map_err(|_| RequestError::InvalidTarget(target.to_string()))
    }

    fn host_from_header(&mut self) -> Result<(), RequestError> {
        let Some(field) = self.header("Host") else {
            return Ok(());
        };
        let raw = String::from_utf8_lossy(&field.value).trim().to_string();
        if raw.is_empty() {
            return Ok(());
        }
        let authority: Authority = raw
            .parse()
            .map_err(|_| RequestError::InvalidHost(raw.clone()))?;
        self.set_authority(&authority)
            .map_err(|_| RequestError::InvalidHost(raw))
    }

    /// Take host and port from `authority`. A port that is written but does
    /// not fit in a u16 is an error, never a fallback to the default.
    fn set_authority(&mut self, authority: &Authority) -> Result<(), ParseIntError> {
        let host = authority.host();
        let port = match explicit_port(authority, host) {
            Some(text) => Some(text.parse::<u16>()?),
            None => None,
        };
        self.host = (!host.is_empty()).then(|| host.to_string());
        self.port = port;
        Ok(())
    }

    /// First header with the given name.
    pub fn header(&self, name: &str) -> Option<&HeaderField> {
        self.headers.iter().find(|h| h.is(name))
    }

    /// Port to connect to, defaulting to 80.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(crate::net::DEFAULT_HTTP_PORT)
    }
}

/// Port text following the host, if the authority spells one out.
fn explicit_port<'a>(authority: &'a Authority, host: &str) -> Option<&'a str> {
    let raw = authority.as_str();
    let host_port = raw.rsplit_once('@').map_or(raw, |(_, rest)| rest);
    host_port
        .strip_prefix(host)
        .and_then(|rest| rest.strip_prefix(':'))
        .filter(|port| !port.is_empty())
}

/// Read from `stream` until a complete head is buffered.
///
/// Bytes after the terminator (a request body) are left in the returned
/// buffer and ignored by the parser.
pub async fn read_head<S>(
    stream: &mut S,
    capacity: usize,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, RequestError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    with_deadline("client read", timeout, read_until_terminator(stream, capacity)).await?
}

async fn read_until_terminator<S>(stream: &mut S, capacity: usize) -> Result<Vec<u8>, RequestError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; capacity];
    let mut filled = 0;

    loop {
        if filled == capacity {
            return Err(RequestError::HeadTooLarge { capacity });
        }
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                RequestError::Closed
            } else {
                RequestError::Incomplete { received: filled }
            });
        }

        // The terminator may straddle the previous read.
        let scan_from = filled.saturating_sub(HEAD_TERMINATOR.len() - 1);
        filled += n;
        if contains_terminator(&buf[scan_from..filled]) {
            buf.truncate(filled);
            return Ok(buf);
        }
    }
}

fn contains_terminator(bytes: &[u8]) -> bool {
    bytes
        .windows(HEAD_TERMINATOR.len())
        .any(|window| window == HEAD_TERMINATOR)
}
