//! Progress reporting for membership changes
//!
//! One indicatif bar per request, sized to its login count. The bar currently
//! on screen is published through [`ActiveBar`] so the console log writer can
//! print above it.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};
use xavyo_connector_keycloak::OperatorSink;

/// Handle to the progress bar being drawn, if any.
#[derive(Clone, Default)]
pub struct ActiveBar(Arc<Mutex<Option<ProgressBar>>>);

impl ActiveBar {
    pub fn current(&self) -> Option<ProgressBar> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, bar: Option<ProgressBar>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = bar;
    }
}

/// Progress indicator for one request's logins
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    /// Create a new progress indicator
    pub fn new(total: u64, role: &str) -> Self {
        let bar = ProgressBar::new(total);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░");
        bar.set_style(style);
        bar.set_message(format!("{role} "));
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Increment the progress by one
    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish and clear the progress bar
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Operator sink rendering progress bars and routing messages to the log.
#[derive(Default)]
pub struct ProgressSink {
    active: ActiveBar,
    current: Mutex<Option<BatchProgress>>,
}

impl ProgressSink {
    pub fn new(active: ActiveBar) -> Self {
        Self {
            active,
            current: Mutex::new(None),
        }
    }

    fn with_current(&self, f: impl FnOnce(&BatchProgress)) {
        let guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(progress) = guard.as_ref() {
            f(progress);
        }
    }
}

impl OperatorSink for ProgressSink {
    fn begin_logins(&self, role: &str, total: usize) {
        let progress = BatchProgress::new(total as u64, role);
        self.active.set(Some(progress.bar.clone()));
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(progress);
    }

    fn login_processed(&self, _login: &str) {
        self.with_current(BatchProgress::inc);
    }

    fn finish_logins(&self) {
        let finished = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(progress) = finished {
            progress.finish_and_clear();
        }
        self.active.set(None);
    }

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
