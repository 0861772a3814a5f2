//! Error responses written by the proxy itself.
//!
//! Every response has the same fixed shape:
//!
//! ```text
//! HTTP/1.0 <code> <reason>\r\n
//! Content-Type: text/plain\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <code> <reason>\n
//! ```

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Statuses the proxy can answer with on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    /// GET without a host or path.
    BadRequest,
    /// Upstream unreachable or rewritten head too large.
    InternalServerError,
    /// Any method other than GET.
    NotImplemented,
}

impl ErrorStatus {
    pub fn code(&self) -> u16 {
        match self {
            ErrorStatus::BadRequest => 400,
            ErrorStatus::InternalServerError => 500,
            ErrorStatus::NotImplemented => 501,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ErrorStatus::BadRequest => "Bad Request",
            ErrorStatus::InternalServerError => "Internal Server Error",
            ErrorStatus::NotImplemented => "Not Implemented",
        }
    }

    /// Full response bytes, status line through body.
    pub fn render(&self) -> Vec<u8> {
        let body = format!("{} {}\n", self.code(), self.reason());
        format!(
            "HTTP/1.0 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            self.code(),
            self.reason(),
            body.len(),
            body
        )
        .into_bytes()
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Write `status` to the client.
pub async fn send_error<W>(client: &mut W, status: ErrorStatus) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    client.write_all(&status.render()).await?;
    client.flush().await
}
