//! Bounded exponential backoff for retryable store errors (C9, spec.md
//! §4.6 "API-retry wrapper"). Terminal errors surface immediately; this
//! wrapper only ever retries errors the caller's classifier marks
//! retryable.

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};

/// Retries `op` with exponential backoff (100ms base, capped at 5s, at most
/// 5 attempts) whenever `is_retryable` returns true for the error it
/// produced. Non-retryable errors return immediately on the first attempt.
pub async fn with_backoff<T, E, F, Fut>(is_retryable: impl Fn(&E) -> bool + Send + Sync, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let backoff = ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(5);

    op.retry(backoff)
        .when(|e| is_retryable(e))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32, &'static str> = with_backoff(
            |_: &&str| true,
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32, &'static str> = with_backoff(
            |_: &&str| false,
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("terminal")
            },
        )
        .await;
        assert_eq!(result, Err("terminal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
