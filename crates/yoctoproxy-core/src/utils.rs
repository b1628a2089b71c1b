/*!
 * Async helpers shared by the yoctoproxy crates.
 *
 * Library calls that reach a hub can hang or fail transiently; these
 * helpers bound them in time and retry them.
 */
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Run `future`, failing with `Error::Timeout` once `duration` has elapsed
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, future)
        .await
        .unwrap_or_else(|_| Err(Error::timeout(format!("No answer within {:?}", duration))))
}

/// Run a fallible operation up to `retries + 1` times
///
/// `make_attempt` builds a fresh future for every attempt, and each attempt
/// is bounded by `per_attempt`. The error of the last attempt is returned
/// when none succeeds.
pub async fn with_retry<F, Fut, T>(per_attempt: Duration, retries: usize, mut make_attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempt = 0;
    loop {
        match with_timeout(per_attempt, make_attempt()).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(attempt, retries, "Attempt failed, retrying: {}", e);
            }
            Err(e) => {
                warn!(elapsed = ?started.elapsed(), "Giving up after {} attempts: {}", attempt + 1, e);
                return Err(e);
            }
        }
    }
}

/// Spawn a fallible task whose outcome is only logged
pub fn spawn_and_log<F, T, E>(name: &str, fut: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!(task = %name, "Task failed: {}", e);
        } else {
            debug!(task = %name, "Task finished");
        }
    })
}

/// Whole milliseconds in `duration`, saturating
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration values are in milliseconds
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let ok = with_timeout(Duration::from_secs(1), async { Ok::<_, Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = with_timeout(Duration::from_secs(1), async { Err::<i32, _>(Error::other("refused")) }).await;
        assert!(matches!(err, Err(Error::Other(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, Error>(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = with_retry(Duration::from_secs(1), 3, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::runtime("hub busy"))
                } else {
                    Ok("usb")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "usb");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_returns_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result: Result<()> = with_retry(Duration::from_secs(1), 2, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(Error::other(format!("attempt {}", n))) }
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "Other error: attempt 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_counts_timeouts() {
        let result: Result<()> = with_retry(Duration::from_millis(5), 1, || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_spawn_and_log_swallows_errors() {
        tokio_test::block_on(async {
            spawn_and_log("ok", async { Ok::<_, Error>(()) }).await.unwrap();
            spawn_and_log("failing", async { Err::<(), _>(Error::other("boom")) })
                .await
                .unwrap();
        });
    }

    #[test]
    fn test_duration_conversions() {
        assert_eq!(duration_to_millis(Duration::from_millis(1234)), 1234);
        assert_eq!(millis_to_duration(500), Duration::from_millis(500));
        assert_eq!(duration_to_millis(Duration::MAX), u64::MAX);
    }
}
