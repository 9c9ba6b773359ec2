//! Exponential backoff retry used to wait out Keycloak's read-after-create lag.

use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{KeycloakError, KeycloakResult};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Policy that never waits, for tests.
    #[must_use]
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Delay for the given attempt: `min(base_delay * 2^attempt, max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `f` until it succeeds, returns an error `retry_on` rejects, or the
    /// retry budget is spent. The last error is returned on exhaustion.
    pub async fn execute<F, Fut, T, R>(
        &self,
        operation_name: &str,
        retry_on: R,
        mut f: F,
    ) -> KeycloakResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = KeycloakResult<T>>,
        R: Fn(&KeycloakError) -> bool,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if !retry_on(&error) => return Err(error),
                Err(error) if attempt >= self.max_retries => {
                    warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %error,
                        "Max retries exceeded"
                    );
                    return Err(error);
                }
                Err(error) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn not_found() -> KeycloakError {
        KeycloakError::RoleNotFound {
            role: "Auditor".into(),
            detail: "Could not find role".into(),
        }
    }

    fn is_not_found(e: &KeycloakError) -> bool {
        matches!(e, KeycloakError::RoleNotFound { .. })
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(4));
        assert_eq!(policy.max_delay, Duration::from_secs(20));
    }

    #[test]
    fn test_delay_exponential_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(4));
        assert_eq!(policy.delay_for(1), Duration::from_secs(8));
        assert_eq!(policy.delay_for(2), Duration::from_secs(16));
        assert_eq!(policy.delay_for(3), Duration::from_secs(20));
        assert_eq!(policy.delay_for(31), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_execute_succeeds_after_retries() {
        let policy = RetryPolicy::immediate(3);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = policy
            .execute("confirm_role", is_not_found, move || {
                let counter = counter_clone.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(not_found())
                    } else {
                        Ok("role-id")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "role-id");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_other_errors() {
        let policy = RetryPolicy::immediate(3);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: KeycloakResult<()> = policy
            .execute("confirm_role", is_not_found, move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(KeycloakError::Parse("bad body".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(KeycloakError::Parse(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_returns_last_error_when_exhausted() {
        let policy = RetryPolicy::immediate(2);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: KeycloakResult<()> = policy
            .execute("confirm_role", is_not_found, move || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(not_found())
                }
            })
            .await;

        assert!(matches!(result, Err(KeycloakError::RoleNotFound { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_waits_between_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_secs(4), Duration::from_secs(20));
        let started = tokio::time::Instant::now();

        let result: KeycloakResult<()> = policy
            .execute("confirm_role", is_not_found, || async { Err(not_found()) })
            .await;

        assert!(result.is_err());
        // 4s + 8s of backoff on the paused clock
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(12));
        assert!(elapsed < Duration::from_secs(13));
    }
}
