//! Connector configuration.

use secrecy::SecretString;
use std::fmt;

use crate::error::{KeycloakError, KeycloakResult};
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryPolicy;

/// Default name of the container group holding per-client role subgroups.
pub const DEFAULT_ROLES_GROUP: &str = "Roles";

/// Default OAuth2 client used for the password grant.
pub const DEFAULT_ADMIN_CLIENT_ID: &str = "admin-cli";

/// Admin account used to obtain a session token.
pub struct AdminCredentials {
    pub username: String,
    pub password: SecretString,
    /// OAuth2 client id presented with the password grant.
    pub client_id: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            client_id: DEFAULT_ADMIN_CLIENT_ID.to_string(),
        }
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Rejects empty fields before any network call is made.
    pub fn validate(&self) -> KeycloakResult<()> {
        use secrecy::ExposeSecret;

        if self.username.trim().is_empty() {
            return Err(KeycloakError::Config("admin username is empty".into()));
        }
        if self.password.expose_secret().is_empty() {
            return Err(KeycloakError::Config("admin password is empty".into()));
        }
        if self.client_id.trim().is_empty() {
            return Err(KeycloakError::Config("admin client id is empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Tunables for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Name of the top-level group that holds one group per client.
    pub roles_group_name: String,
    /// Shared user lookup limiter settings.
    pub user_lookup: RateLimitConfig,
    /// Backoff used while waiting for a created role to become readable.
    pub role_confirmation: RetryPolicy,
    /// Treat a user search with several hits as an error instead of taking the first.
    pub strict_user_match: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            roles_group_name: DEFAULT_ROLES_GROUP.to_string(),
            user_lookup: RateLimitConfig::default(),
            role_confirmation: RetryPolicy::default(),
            strict_user_match: false,
        }
    }
}

impl ReconcileConfig {
    /// Configuration with no throttling or backoff, for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            roles_group_name: DEFAULT_ROLES_GROUP.to_string(),
            user_lookup: RateLimitConfig::for_testing(),
            role_confirmation: RetryPolicy::immediate(2),
            strict_user_match: false,
        }
    }

    pub fn validate(&self) -> KeycloakResult<()> {
        if self.roles_group_name.trim().is_empty() {
            return Err(KeycloakError::Config("roles group name is empty".into()));
        }
        self.user_lookup.validate().map_err(KeycloakError::Config)
    }
}
