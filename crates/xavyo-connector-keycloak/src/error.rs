//! Error types for the Keycloak connector.

use thiserror::Error;

/// Result type alias using `KeycloakError`.
pub type KeycloakResult<T> = Result<T, KeycloakError>;

/// Pipeline stage an error belongs to.
///
/// Auth, Resolution and Reconciliation errors abort the current request.
/// Membership errors only affect a single login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Resolution,
    Reconciliation,
    Membership,
    Parse,
    Transport,
    Config,
}

/// Errors that can occur when talking to the Keycloak admin API.
#[derive(Debug, Error)]
pub enum KeycloakError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token exchange failed.
    #[error("Authentication failed (status {}): {detail}", status_label(.status))]
    Auth { status: Option<u16>, detail: String },

    /// No client matched the requested name.
    #[error("Client {client} not found")]
    ClientNotFound { client: String },

    /// More than one client matched the requested name.
    #[error("Found {matches} clients named {client}")]
    AmbiguousClient { client: String, matches: usize },

    /// A group expected to exist could not be located.
    #[error("Group {0} not found")]
    GroupNotFound(String),

    /// Group creation returned something other than 201.
    #[error("Failed to create group {group} (status {status}): {detail}")]
    GroupCreation {
        group: String,
        status: u16,
        detail: String,
    },

    /// Role creation returned something other than 201.
    #[error("Failed to create role {role} (status {status}): {detail}")]
    RoleCreation {
        role: String,
        status: u16,
        detail: String,
    },

    /// A just-created role never became readable.
    #[error("Role {role} not found after creation: {detail}")]
    RoleNotFound { role: String, detail: String },

    /// Requested action needs a role/group pair that does not exist.
    #[error("Role {role} does not exist ({missing} missing), skipping logins: {logins}")]
    RoleMissing {
        role: String,
        missing: &'static str,
        logins: String,
    },

    /// Linking the client role to its group failed.
    #[error("Failed to assign role {role} to group {group_id} (status {status})")]
    RoleAssignment {
        role: String,
        group_id: String,
        status: u16,
    },

    /// User search returned no result.
    #[error("Login not found: {login}")]
    LoginNotFound { login: String },

    /// User search returned a non-200 status.
    #[error("User search failed for login {login} (status {status})")]
    UserSearch { login: String, status: u16 },

    /// User search returned several results and strict matching is enabled.
    #[error("Found {matches} users for login {login}")]
    AmbiguousLogin { login: String, matches: usize },

    /// Waiting on the user lookup rate limiter took too long.
    #[error("User lookup rate limit wait timed out for login {login}")]
    RateLimitTimeout { login: String },

    /// Adding or removing a group member failed.
    #[error("Failed to {operation} user {user_id} (group {group_id}, status {status})")]
    Membership {
        operation: &'static str,
        user_id: String,
        group_id: String,
        status: u16,
    },

    /// A call returned a status the caller does not handle.
    #[error("{operation} returned status {status}: {detail}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        detail: String,
    },

    /// Response body could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl KeycloakError {
    /// Classify the error into its pipeline stage.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::ClientNotFound { .. }
            | Self::AmbiguousClient { .. }
            | Self::GroupNotFound(_)
            | Self::UnexpectedStatus { .. } => ErrorKind::Resolution,
            Self::GroupCreation { .. }
            | Self::RoleCreation { .. }
            | Self::RoleNotFound { .. }
            | Self::RoleMissing { .. }
            | Self::RoleAssignment { .. } => ErrorKind::Reconciliation,
            Self::LoginNotFound { .. }
            | Self::AmbiguousLogin { .. }
            | Self::UserSearch { .. }
            | Self::RateLimitTimeout { .. }
            | Self::Membership { .. } => ErrorKind::Membership,
            Self::Parse(_) | Self::Json(_) => ErrorKind::Parse,
            Self::Http(_) => ErrorKind::Transport,
        }
    }

    /// Whether the error is an expected condition reported as a warning.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::LoginNotFound { .. })
    }

    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } => *status,
            Self::GroupCreation { status, .. }
            | Self::RoleCreation { status, .. }
            | Self::RoleAssignment { status, .. }
            | Self::Membership { status, .. }
            | Self::UserSearch { status, .. }
            | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let auth = KeycloakError::Auth {
            status: Some(401),
            detail: "invalid_grant".into(),
        };
        assert_eq!(auth.kind(), ErrorKind::Auth);

        let ambiguous = KeycloakError::AmbiguousClient {
            client: "billing".into(),
            matches: 2,
        };
        assert_eq!(ambiguous.kind(), ErrorKind::Resolution);

        let missing = KeycloakError::RoleMissing {
            role: "Auditor".into(),
            missing: "role and group",
            logins: "alice".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::Reconciliation);

        let login = KeycloakError::LoginNotFound {
            login: "bob".into(),
        };
        assert_eq!(login.kind(), ErrorKind::Membership);
    }

    #[test]
    fn test_only_login_not_found_is_warning() {
        assert!(KeycloakError::LoginNotFound {
            login: "bob".into()
        }
        .is_warning());
        assert!(!KeycloakError::RateLimitTimeout {
            login: "bob".into()
        }
        .is_warning());
        assert!(!KeycloakError::GroupNotFound("Roles".into()).is_warning());
    }

    #[test]
    fn test_auth_message_without_status() {
        let err = KeycloakError::Auth {
            status: None,
            detail: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "Authentication failed (status none): connection refused"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_status_accessor() {
        let err = KeycloakError::Membership {
            operation: "add",
            user_id: "u1".into(),
            group_id: "g1".into(),
            status: 403,
        };
        assert_eq!(err.status(), Some(403));
        assert_eq!(
            err.to_string(),
            "Failed to add user u1 (group g1, status 403)"
        );
    }
}
