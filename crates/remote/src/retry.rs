use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Error;

/// Bounded retry for a single logical request.
///
/// `retries` is the number of additional attempts after the first one, so
/// a request is issued at most `retries + 1` times. Only errors for which
/// [`Error::is_retryable`] holds are repeated. Attempts follow each other
/// immediately unless a delay is set.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            delay: Duration::ZERO,
        }
    }

    /// Sets the pause between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Maximum number of times a request is issued.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Runs `op` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(what, attempt, attempts, error = %e, "request failed, retrying");
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> Error {
        Error::Api {
            status: 502,
            body: "bad gateway".into(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3).with_delay(Duration::ZERO);
        let result = policy
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(transient()) } else { Ok(n) }
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries_plus_one() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2).with_delay(Duration::ZERO);
        let err = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 502, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(0).with_delay(Duration::ZERO);
        let _ = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(transient())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(5).with_delay(Duration::ZERO);
        let err = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::CallbackRejected("no".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CallbackRejected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
