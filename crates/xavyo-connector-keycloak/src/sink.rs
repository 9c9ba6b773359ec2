//! Operator-facing output.

use tracing::{error, info, warn};

/// Receives progress and human-readable messages from the engine.
///
/// The engine calls `begin_logins` once per request that touches memberships,
/// `login_processed` once per login whatever the outcome, then `finish_logins`.
pub trait OperatorSink: Send + Sync {
    fn begin_logins(&self, role: &str, total: usize);
    fn login_processed(&self, login: &str);
    fn finish_logins(&self);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink that only logs. Progress is reported at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OperatorSink for TracingSink {
    fn begin_logins(&self, role: &str, total: usize) {
        tracing::debug!(role, total, "Processing logins");
    }

    fn login_processed(&self, login: &str) {
        tracing::debug!(login, "Login processed");
    }

    fn finish_logins(&self) {}

    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn error(&self, message: &str) {
        error!("{message}");
    }
}
