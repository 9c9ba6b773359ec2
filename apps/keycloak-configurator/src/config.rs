//! Runtime configuration, read from the environment (and `.env`).

use std::env::VarError;
use std::str::FromStr;
use std::time::Duration;

use xavyo_connector_keycloak::{
    AdminCredentials, RateLimitConfig, ReconcileConfig, RetryPolicy, DEFAULT_ADMIN_CLIENT_ID,
    DEFAULT_ROLES_GROUP,
};

/// Domain the Keycloak hosts live under unless `KEYCLOAK_DOMAIN` says otherwise.
pub const DEFAULT_DOMAIN: &str = "your_domain.ru";

/// Configuration for the configurator.
#[derive(Debug)]
pub struct AppConfig {
    pub credentials: AdminCredentials,
    /// Domain appended to the per-instance host names.
    pub domain: String,
    /// Timeout for every HTTP call to Keycloak.
    pub http_timeout: Duration,
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Admin credentials fall back to values baked in at build time.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| {
            std::env::var(key).or_else(|e| build_time_default(key).map(String::from).ok_or(e))
        })
    }

    /// Load configuration from a custom variable reader.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let username = required(&reader, "KEYCLOAK_ADMIN_USERNAME")?;
        let password = required(&reader, "KEYCLOAK_ADMIN_PASSWORD")?;
        let client_id = reader("KEYCLOAK_ADMIN_CLIENT_ID")
            .unwrap_or_else(|_| DEFAULT_ADMIN_CLIENT_ID.to_string());

        let domain = reader("KEYCLOAK_DOMAIN").unwrap_or_else(|_| DEFAULT_DOMAIN.to_string());
        let roles_group_name =
            reader("KEYCLOAK_ROLES_GROUP").unwrap_or_else(|_| DEFAULT_ROLES_GROUP.to_string());

        let http_timeout = Duration::from_secs(parse(&reader, "KEYCLOAK_HTTP_TIMEOUT_SECS", 30)?);

        let user_lookup = RateLimitConfig {
            requests_per_second: parse(&reader, "USER_LOOKUP_RATE_PER_SEC", 1)?,
            burst: parse(&reader, "USER_LOOKUP_BURST", 10)?,
            wait_timeout: Duration::from_secs(parse(&reader, "USER_LOOKUP_TIMEOUT_SECS", 5)?),
        };
        user_lookup
            .validate()
            .map_err(|e| ConfigError::InvalidValue("USER_LOOKUP_*".into(), e))?;

        let role_confirmation = RetryPolicy::new(
            parse(&reader, "ROLE_CONFIRM_MAX_RETRIES", 5)?,
            Duration::from_secs(parse(&reader, "ROLE_CONFIRM_BASE_DELAY_SECS", 4)?),
            Duration::from_secs(parse(&reader, "ROLE_CONFIRM_MAX_DELAY_SECS", 20)?),
        );

        let strict_user_match = parse(&reader, "STRICT_USER_MATCH", false)?;

        Ok(Self {
            credentials: AdminCredentials::new(username, password).with_client_id(client_id),
            domain,
            http_timeout,
            reconcile: ReconcileConfig {
                roles_group_name,
                user_lookup,
                role_confirmation,
                strict_user_match,
            },
        })
    }
}

/// Credentials compiled into the binary, if any.
fn build_time_default(key: &str) -> Option<&'static str> {
    match key {
        "KEYCLOAK_ADMIN_USERNAME" => option_env!("KEYCLOAK_ADMIN_USERNAME"),
        "KEYCLOAK_ADMIN_PASSWORD" => option_env!("KEYCLOAK_ADMIN_PASSWORD"),
        _ => None,
    }
}

fn required<F>(reader: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    reader(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVar(key.into()))
}

fn parse<F, T>(reader: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match reader(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
