//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap client reads, upstream connects and upstream reads with an optional deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - An unset deadline waits as long as the operation takes

use std::future::Future;
use std::time::Duration;

/// An operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation} timed out after {after:?}")]
pub struct TimeoutError {
    pub operation: &'static str,
    pub after: Duration,
}

/// Run `fut`, failing with [`TimeoutError`] if `limit` elapses first.
pub async fn with_deadline<F>(
    operation: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| TimeoutError { operation, after }),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_limit_waits_for_completion() {
        let value = with_deadline("sleep", None, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn limit_produces_distinct_error() {
        let err = with_deadline(
            "connect",
            Some(Duration::from_millis(20)),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.operation, "connect");
        assert_eq!(err.after, Duration::from_millis(20));
        assert_eq!(err.to_string(), "connect timed out after 20ms");
    }
}
