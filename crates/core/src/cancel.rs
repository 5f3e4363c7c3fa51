//! Cancellation and deadlines for client operations

use std::future::Future;
use std::ops::Deref;
use std::time::Duration;

pub use tokio_util::sync::CancellationToken;
use tokio_util::sync::DropGuard;

use crate::error::{Error, Result};

/// Run `fut` until it completes or `cancel` fires.
///
/// Cancellation drops the in-flight request and returns
/// [`Error::Cancelled`], never a transport error.
pub async fn with_cancellation<T, F>(
    cancel: &CancellationToken,
    operation: &'static str,
    resource: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(operation, resource, "operation cancelled");
            Err(Error::cancelled(operation, resource))
        }
        result = fut => result,
    }
}

/// A cancellation token that also fires once a timeout elapses.
///
/// The timer task lives as long as the `Deadline`. Clones of
/// [`Deadline::token`] stay usable after it is dropped but no longer
/// expire on their own.
pub struct Deadline {
    token: CancellationToken,
    _timer: DropGuard,
}

impl Deadline {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Deref for Deadline {
    type Target = CancellationToken;

    fn deref(&self) -> &CancellationToken {
        &self.token
    }
}

/// Derive a token that fires when `parent` does or after `timeout`,
/// whichever comes first.
///
/// Must be called from within a tokio runtime.
pub fn with_deadline(parent: &CancellationToken, timeout: Duration) -> Deadline {
    let token = parent.child_token();
    let stop = CancellationToken::new();

    let timer = token.clone();
    let stopped = stop.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = timer.cancelled() => {}
            _ = stopped.cancelled() => {}
            _ = tokio::time::sleep(timeout) => timer.cancel(),
        }
    });

    Deadline {
        token,
        _timer: stop.drop_guard(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_when_not_cancelled() {
        let cancel = CancellationToken::new();
        let value = with_cancellation(&cancel, "get", "b/k", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = with_cancellation(&cancel, "get", "b/k", async { Ok(7) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let cancel = CancellationToken::new();
        let err = with_cancellation::<(), _>(&cancel, "send", "q", async {
            Err(Error::queue("send", "q", "boom", None))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Queue { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_pending_operation() {
        let parent = CancellationToken::new();
        let token = with_deadline(&parent, Duration::from_secs(2));

        let err = with_cancellation::<(), _>(&token, "receive", "q", std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Cancelled {
                operation: "receive",
                ..
            }
        ));
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_deadline_token() {
        let parent = CancellationToken::new();
        let token = with_deadline(&parent, Duration::from_secs(3600));
        parent.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_deadline_stops_timer() {
        let parent = CancellationToken::new();
        let deadline = with_deadline(&parent, Duration::from_secs(2));
        let token = deadline.token().clone();

        drop(deadline);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(!token.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
