//! Request header rewriting and head serialization.
//!
//! Two fixed edits are applied before forwarding: the connection is marked
//! `Connection: close`, and a `Host` header is added when the client sent
//! none. Both are idempotent.

use crate::http::request::{HeaderField, ParsedRequest};

/// Error type for head serialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("rewritten request head needs {needed} bytes, buffer holds {capacity}")]
    Overflow { needed: usize, capacity: usize },
    #[error("request has no {0} to forward")]
    Missing(&'static str),
}

/// Apply the header policy in place.
pub fn rewrite_headers(request: &mut ParsedRequest) {
    set_connection_close(&mut request.headers);

    if request.header("Host").is_none() {
        if let Some(host) = &request.host {
            let value = match request.port {
                Some(port) => format!("{host}:{port}"),
                None => host.clone(),
            };
            request.headers.push(HeaderField::new("Host", value));
        }
    }
}

/// Overwrite the first `Connection` header with `close` and drop the rest,
/// or append one if there is none.
fn set_connection_close(headers: &mut Vec<HeaderField>) {
    let mut seen = false;
    headers.retain_mut(|field| {
        if !field.is("Connection") {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        field.value = b"close".to_vec();
        true
    });
    if !seen {
        headers.push(HeaderField::new("Connection", "close"));
    }
}

/// Serialize `METHOD PATH VERSION`, the headers and the blank line, failing if
/// the result would exceed `capacity` bytes.
pub fn serialize_head(request: &ParsedRequest, capacity: usize) -> Result<Vec<u8>, RewriteError> {
    let path = request.path.as_deref().ok_or(RewriteError::Missing("path"))?;

    let needed = request.method.len()
        + 1
        + path.len()
        + 1
        + request.version.len()
        + 2
        + request
            .headers
            .iter()
            .map(|h| h.name.len() + 2 + h.value.len() + 2)
            .sum::<usize>()
        + 2;
    if needed > capacity {
        return Err(RewriteError::Overflow { needed, capacity });
    }

    let mut out = Vec::with_capacity(needed);
    out.extend_from_slice(request.method.as_bytes());
    out.push(b' ');
    out.extend_from_slice(path.as_bytes());
    out.push(b' ');
    out.extend_from_slice(request.version.as_bytes());
    out.extend_from_slice(b"\r\n");
    for header in &request.headers {
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(&header.value);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    Ok(out)
}

/// Rewrite headers and serialize the head for the upstream.
pub fn rewrite(request: &mut ParsedRequest, capacity: usize) -> Result<Vec<u8>, RewriteError> {
    rewrite_headers(request);
    serialize_head(request, capacity)
}
