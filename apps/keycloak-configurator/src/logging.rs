//! Console and file logging using tracing.
//!
//! Console output goes to stdout and is printed above any active progress
//! bar. The file layer appends plain-text lines to the log file.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use indicatif::ProgressBar;
use tracing_subscriber::{fmt, fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CliError, CliResult};
use crate::progress::ActiveBar;

/// Default log file name, created next to the executable.
pub const DEFAULT_LOG_FILE: &str = "keycloak_configurator.log";

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging(log_file: &Path, active: ActiveBar) -> CliResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| CliError::Logging(format!("{}: {e}", log_file.display())))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| CliError::Logging(e.to_string()))?;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(ConsoleWriter::new(active));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_file.display(),
        "===== Keycloak configurator session started ====="
    );
    Ok(())
}

/// Stdout writer that suspends the active progress bar while printing.
#[derive(Clone)]
pub struct ConsoleWriter {
    active: ActiveBar,
}

impl ConsoleWriter {
    pub fn new(active: ActiveBar) -> Self {
        Self { active }
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleLine;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleLine {
            bar: self.active.current(),
            buf: Vec::new(),
        }
    }
}

/// One buffered log event, flushed to stdout on drop.
pub struct ConsoleLine {
    bar: Option<ProgressBar>,
    buf: Vec<u8>,
}

impl Write for ConsoleLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        let print = move || {
            let mut stdout = io::stdout().lock();
            // Nothing useful to do if the terminal is gone.
            let _ = stdout.write_all(&buf).and_then(|()| stdout.flush());
        };
        match &self.bar {
            Some(bar) => bar.suspend(print),
            None => print(),
        }
    }
}
