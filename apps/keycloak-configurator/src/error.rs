//! CLI error types and exit codes

use std::path::PathBuf;
use thiserror::Error;
use xavyo_connector_keycloak::KeycloakError;

use crate::config::ConfigError;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 4: Validation or configuration error
/// - 130: Interrupted by the user
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request file {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid workbook {}: {source}", path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("{}: sheet '{sheet}' not found. Available sheets: {}", path.display(), available.join(", "))]
    MissingSheet {
        path: PathBuf,
        sheet: &'static str,
        available: Vec<String>,
    },

    #[error("No request files found in {0}")]
    NoInput(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Keycloak(#[from] KeycloakError),

    #[error("Interrupted by user")]
    Interrupted,
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Validation(_) | CliError::Csv { .. } => 4,
            CliError::Workbook { .. } | CliError::MissingSheet { .. } => 4,
            CliError::NoInput(_) => 4,
            CliError::Keycloak(e) if e.kind() == xavyo_connector_keycloak::ErrorKind::Config => 4,
            CliError::Interrupted => 130,
            CliError::Io { .. } | CliError::Logging(_) | CliError::Keycloak(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Validation("x".into()).exit_code(), 4);
        assert_eq!(CliError::NoInput(".".into()).exit_code(), 4);
        assert_eq!(
            CliError::Config(ConfigError::MissingVar("KEYCLOAK_ADMIN_USERNAME".into())).exit_code(),
            4
        );
        assert_eq!(CliError::Interrupted.exit_code(), 130);
        assert_eq!(CliError::Logging("denied".into()).exit_code(), 1);
        assert_eq!(
            CliError::MissingSheet {
                path: PathBuf::from("requests.xlsx"),
                sheet: "Request",
                available: vec!["Sheet1".into()],
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn test_keycloak_config_error_is_validation() {
        let err = CliError::from(KeycloakError::Config("burst must be > 0".into()));
        assert_eq!(err.exit_code(), 4);

        let err = CliError::from(KeycloakError::Parse("bad".into()));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_io_error_names_path() {
        let err = CliError::Io {
            path: PathBuf::from("requests/missing.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read requests/missing.csv: not found"
        );
    }
}
