use std::{future::Future, time::Duration};

use crate::errors::error::{IssuanceError, IssuanceResult};

/// Bounded-retry policy: the attempt budget and inter-attempt delay are
/// configuration values, the control flow lives in [`retry`].
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Issuance absorbs registry rotation races by re-resolving the active
/// registry between attempts.
pub const ISSUANCE_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 5,
    interval: Duration::from_secs(2),
};

/// A publication conflict spans a single transaction commit, so the retry
/// is tight.
pub const PUBLISH_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 5,
    interval: Duration::ZERO,
};

/// Tails upload. The policy this was inherited from carried a negative
/// backoff factor; only the observed attempt count and interval are kept.
pub const TAILS_UPLOAD_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 5,
    interval: Duration::from_millis(800),
};

/// Run `op` until it succeeds, it fails with a non-retryable error, or the
/// attempt budget is spent. The final error is returned as-is; callers
/// wanting a different terminal error map it afterwards.
pub async fn retry<T, Op, Fut, Pred>(
    policy: RetryPolicy,
    is_retryable: Pred,
    mut op: Op,
) -> IssuanceResult<T>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = IssuanceResult<T>>,
    Pred: Fn(&IssuanceError) -> bool,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_retryable(&err) => {
                warn!(
                    "retry >>> attempt {attempt}/{} failed: {err}",
                    policy.max_attempts
                );
                if !policy.interval.is_zero() {
                    tokio::time::sleep(policy.interval).await;
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    const TIGHT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        interval: Duration::ZERO,
    };

    fn conflict() -> IssuanceError {
        IssuanceError::Conflict("lost the race".into())
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = retry(TIGHT, |_| true, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(conflict())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result: IssuanceResult<()> = retry(
            TIGHT,
            |err| matches!(err, IssuanceError::Conflict(_)),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(IssuanceError::Configuration("fatal".into())) }
            },
        )
        .await;

        assert!(matches!(result, Err(IssuanceError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_the_attempt_budget_and_returns_the_last_error() {
        let calls = AtomicU32::new(0);
        let result: IssuanceResult<()> = retry(TIGHT, |_| true, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(conflict()) }
        })
        .await;

        assert!(matches!(result, Err(IssuanceError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
