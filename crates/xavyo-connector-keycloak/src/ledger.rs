//! Per-request record of failures.

use std::fmt;

use crate::error::KeycloakError;
use crate::sink::OperatorSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub severity: Severity,
    pub message: String,
}

/// Ordered, append-only list of what went wrong while processing one request.
#[derive(Debug, Clone, Default)]
pub struct ErrorLedger {
    entries: Vec<LedgerEntry>,
}

impl ErrorLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error, classifying expected conditions as warnings.
    pub fn record(&mut self, error: &KeycloakError) {
        let severity = if error.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        };
        self.push(severity, error.to_string());
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.entries.push(LedgerEntry {
            severity,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    /// Emit every entry, in insertion order.
    pub fn flush(&self, sink: &dyn OperatorSink) {
        for entry in &self.entries {
            match entry.severity {
                Severity::Warning => sink.warn(&entry.message),
                Severity::Error => sink.error(&entry.message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl OperatorSink for Lines {
        fn begin_logins(&self, _: &str, _: usize) {}
        fn login_processed(&self, _: &str) {}
        fn finish_logins(&self) {}
        fn info(&self, m: &str) {
            self.0.lock().unwrap().push(format!("info: {m}"));
        }
        fn warn(&self, m: &str) {
            self.0.lock().unwrap().push(format!("warn: {m}"));
        }
        fn error(&self, m: &str) {
            self.0.lock().unwrap().push(format!("error: {m}"));
        }
    }

    #[test]
    fn test_record_classifies_severity() {
        let mut ledger = ErrorLedger::new();
        ledger.record(&KeycloakError::LoginNotFound {
            login: "bob".into(),
        });
        ledger.record(&KeycloakError::RateLimitTimeout {
            login: "carol".into(),
        });

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.count(Severity::Warning), 1);
        assert_eq!(ledger.count(Severity::Error), 1);
        assert_eq!(ledger.entries()[0].message, "Login not found: bob");
    }

    #[test]
    fn test_flush_preserves_order() {
        let mut ledger = ErrorLedger::new();
        ledger.push(Severity::Error, "first");
        ledger.push(Severity::Warning, "second");
        ledger.push(Severity::Error, "third");

        let sink = Lines::default();
        ledger.flush(&sink);

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec!["error: first", "warn: second", "error: third"]
        );
    }
}
