use std::future::Future;
use std::time::Duration;

/// Run `op` up to `max_attempts` times. After the i-th failure, sleeps
/// `backoff_ms[i - 1]` (clamped to the last element once `i` exceeds the
/// sequence length) before the next attempt. Every error is retryable; the
/// caller layers any selective-retry policy on top.
///
/// # Errors
///
/// Returns the last error if `op` fails on every attempt.
pub async fn with_retries<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    backoff_ms: &[u64],
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                let idx = (attempt as usize).saturating_sub(1).min(backoff_ms.len().saturating_sub(1));
                let wait = backoff_ms.get(idx).copied().unwrap_or(0);
                if wait > 0 {
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            },
            3,
            &[1, 1, 1],
        )
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retries(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("boom") } else { Ok(42) } }
            },
            5,
            &[1, 1],
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts_and_fails_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("persistent failure") }
            },
            3,
            &[1],
        )
        .await;
        assert_eq!(result, Err("persistent failure"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_clamps_to_last_element() {
        // Sequence has one element; attempt indices beyond it reuse it.
        // Mostly exercised for the index-math not panicking.
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = with_retries(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            },
            4,
            &[1],
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
