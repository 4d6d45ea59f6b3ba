//! Timeout and bounded retry around oracle calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::OracleError;

#[derive(Debug, Clone, Copy)]
pub struct OracleGuard {
    timeout: Duration,
    max_attempts: u32,
}

impl OracleGuard {
    pub fn new(timeout: Duration, max_attempts: u32) -> Self {
        Self {
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `call` until it succeeds, up to `max_attempts` times, each
    /// attempt bounded by the timeout.
    pub async fn call<T, F, Fut>(&self, oracle: &str, mut call: F) -> Result<T, OracleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OracleError>>,
    {
        let mut last = None;

        for attempt in 1..=self.max_attempts {
            let err = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => OracleError::Timeout {
                    oracle: oracle.to_string(),
                    timeout: self.timeout,
                },
            };
            warn!(oracle, attempt, max_attempts = self.max_attempts, error = %err, "Oracle call failed");
            last = Some(err);
        }

        match last {
            Some(err) if self.max_attempts == 1 => Err(err),
            Some(err) => Err(OracleError::RetriesExhausted {
                oracle: oracle.to_string(),
                attempts: self.max_attempts,
                last: err.to_string(),
            }),
            None => Err(OracleError::Unavailable {
                oracle: oracle.to_string(),
                reason: "no attempt made".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_after_one_failure() {
        let guard = OracleGuard::new(Duration::from_secs(1), 2);
        let calls = Arc::new(AtomicU32::new(0));

        let result = guard
            .call("test", || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(OracleError::Unavailable {
                            oracle: "test".into(),
                            reason: "flaky".into(),
                        })
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_retries() {
        let guard = OracleGuard::new(Duration::from_secs(1), 3);
        let result: Result<(), _> = guard
            .call("test", || async {
                Err(OracleError::Malformed {
                    oracle: "test".into(),
                    reason: "garbage".into(),
                })
            })
            .await;

        assert!(matches!(
            result,
            Err(OracleError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let guard = OracleGuard::new(Duration::from_millis(20), 1);
        let result: Result<(), _> = guard
            .call("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(OracleError::Timeout { .. })));
    }
}
