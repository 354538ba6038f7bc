//! Timeout and cancellation around one external call

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{RagError, Result};

/// Race `fut` against the cancellation token and a per-call timeout
///
/// Cancellation wins over a result that is ready in the same poll. Dropping
/// the losing future aborts the underlying request.
pub async fn guarded<T, F>(
    component: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        outcome = tokio::time::timeout(timeout, fut) => match outcome {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                component: component.to_string(),
                duration_ms: timeout.as_millis() as u64,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let token = CancellationToken::new();
        let value = guarded("router", Duration::from_secs(1), &token, async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_times_out() {
        let token = CancellationToken::new();
        let result: Result<()> = guarded(
            "checker",
            Duration::from_millis(20),
            &token,
            std::future::pending(),
        )
        .await;
        match result {
            Err(RagError::Timeout {
                component,
                duration_ms,
            }) => {
                assert_eq!(component, "checker");
                assert_eq!(duration_ms, 20);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let result = guarded("grader", Duration::from_secs(5), &token, async { Ok(1) }).await;
        assert!(matches!(result, Err(RagError::Cancelled)));
    }
}
