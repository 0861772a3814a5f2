//! Unidirectional byte relay.
//!
//! Copies bytes from one stream to another until the source ends. Payload is
//! never inspected: there is no framing awareness, the relay simply runs until
//! the TCP stream itself stops.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::resilience::with_deadline;

/// How a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The source reached EOF.
    Eof,
    /// Reading from the source failed.
    ReadFailed,
    /// Writing to the sink failed.
    WriteFailed,
    /// The source produced nothing within the idle timeout.
    Idle,
}

impl RelayEnd {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RelayEnd::Eof => "eof",
            RelayEnd::ReadFailed => "read_failed",
            RelayEnd::WriteFailed => "write_failed",
            RelayEnd::Idle => "idle",
        }
    }
}

/// Result of a relay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Bytes written to the sink.
    pub bytes: u64,
    pub end: RelayEnd,
}

/// Copy `source` into `sink` through a buffer of `capacity` bytes.
///
/// Every way of stopping is reported through [`RelayOutcome`]; errors are
/// logged, not returned, since the caller's only option is to close both sides.
pub async fn relay<R, W>(
    source: &mut R,
    sink: &mut W,
    capacity: usize,
    idle_timeout: Option<Duration>,
) -> RelayOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; capacity.max(1)];
    let mut bytes = 0u64;

    let end = loop {
        let n = match with_deadline("upstream read", idle_timeout, source.read(&mut buf)).await {
            Ok(Ok(0)) => break RelayEnd::Eof,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, relayed = bytes, "Relay source failed");
                break RelayEnd::ReadFailed;
            }
            Err(e) => {
                tracing::debug!(error = %e, relayed = bytes, "Relay source idle");
                break RelayEnd::Idle;
            }
        };

        if let Err(e) = sink.write_all(&buf[..n]).await {
            tracing::debug!(error = %e, relayed = bytes, "Relay sink failed");
            break RelayEnd::WriteFailed;
        }
        bytes += n as u64;
    };

    if end != RelayEnd::WriteFailed {
        if let Err(e) = sink.flush().await {
            tracing::debug!(error = %e, "Relay sink flush failed");
            return RelayOutcome {
                bytes,
                end: RelayEnd::WriteFailed,
            };
        }
    }

    RelayOutcome { bytes, end }
}
