//! Token bucket gate for user lookups.
//!
//! One limiter is shared by every request for the lifetime of the process, so
//! the aggregate lookup rate against Keycloak stays bounded no matter how many
//! requests or logins are queued.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use crate::error::{KeycloakError, KeycloakResult};

/// Configuration for the user lookup limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Steady-state lookups per second (default: 1).
    pub requests_per_second: u32,
    /// Lookups allowed back to back before throttling (default: 10).
    pub burst: u32,
    /// Longest a single lookup waits for a token (default: 5s).
    pub wait_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1,
            burst: 10,
            wait_timeout: Duration::from_secs(5),
        }
    }
}

impl RateLimitConfig {
    /// Creates a configuration that effectively never throttles, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            requests_per_second: 1000,
            burst: 1000,
            wait_timeout: Duration::from_secs(1),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_second == 0 {
            return Err("requests_per_second must be > 0".to_string());
        }
        if self.burst == 0 {
            return Err("burst must be > 0".to_string());
        }
        Ok(())
    }
}

/// Shared lookup gate.
pub struct UserLookupLimiter {
    limiter: DefaultDirectRateLimiter,
    wait_timeout: Duration,
}

impl std::fmt::Debug for UserLookupLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLookupLimiter")
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

impl UserLookupLimiter {
    /// Creates a limiter from the given configuration.
    pub fn new(config: &RateLimitConfig) -> KeycloakResult<Self> {
        config.validate().map_err(KeycloakError::Config)?;

        let rate = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| KeycloakError::Config("requests_per_second must be > 0".into()))?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| KeycloakError::Config("burst must be > 0".into()))?;

        Ok(Self {
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
            wait_timeout: config.wait_timeout,
        })
    }

    /// Wait for a lookup token on behalf of `login`.
    ///
    /// Fails with [`KeycloakError::RateLimitTimeout`] when no token frees up
    /// within the configured timeout.
    pub async fn acquire(&self, login: &str) -> KeycloakResult<()> {
        if self.limiter.check().is_ok() {
            return Ok(());
        }

        debug!(login, "User lookup throttled, waiting for a token");
        tokio::time::timeout(self.wait_timeout, self.limiter.until_ready())
            .await
            .map_err(|_| KeycloakError::RateLimitTimeout {
                login: login.to_string(),
            })
    }
}
