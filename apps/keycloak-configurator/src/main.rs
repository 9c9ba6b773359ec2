//! Keycloak configurator - applies role and membership requests to Keycloak
//!
//! Reads request workbooks (or CSV files) and, for each row:
//! - creates the client role and its role group when asked to
//! - grants the role to the listed users by adding them to the role group
//! - revokes it by removing them from the group

use clap::Parser;
use std::future::Future;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use xavyo_connector_keycloak::{AdminClient, BatchSummary, ReconcileContext, Reconciler};

mod config;
mod environment;
mod error;
mod ingest;
mod logging;
mod progress;

use config::AppConfig;
use error::{CliError, CliResult};
use progress::{ActiveBar, ProgressSink};

/// Apply role and membership requests from Excel or CSV files to Keycloak
#[derive(Parser, Debug)]
#[command(name = "keycloak-configurator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Request files, or directories whose request files are processed in name order.
    /// Defaults to the directory holding the executable.
    paths: Vec<PathBuf>,

    /// Log file, appended to on every run. Defaults to keycloak_configurator.log
    /// next to the executable.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Wait for Enter before exiting
    #[arg(long)]
    pause: bool,
}

impl Cli {
    fn input_paths(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            vec![executable_dir()]
        } else {
            self.paths.clone()
        }
    }

    fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| executable_dir().join(logging::DEFAULT_LOG_FILE))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let log_file = cli.log_path();
    let active = ActiveBar::default();
    if let Err(e) = logging::init_logging(&log_file, active.clone()) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }

    let code = tokio::select! {
        result = run(&cli, &log_file, active) => match result {
            Ok(()) => 0,
            Err(e) => {
                error!("{e}");
                e.exit_code()
            }
        },
        () = wait_for_interrupt(signal::ctrl_c()) => {
            warn!("{}", CliError::Interrupted);
            CliError::Interrupted.exit_code()
        }
    };

    if cli.pause && code != CliError::Interrupted.exit_code() {
        wait_for_enter();
    }
    std::process::exit(code);
}

/// Resolves once the operator interrupts. If the handler cannot be
/// installed the error is logged and the run is left alone.
async fn wait_for_interrupt<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {}
        Err(e) => {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

async fn run(cli: &Cli, log_file: &Path, active: ActiveBar) -> CliResult<()> {
    let config = AppConfig::from_env()?;

    let paths = cli.input_paths();
    let files = ingest::discover_files(&paths)?;
    if files.is_empty() {
        return Err(CliError::NoInput(display_paths(&paths)));
    }
    info!("Found {} request file(s):", files.len());
    for file in &files {
        info!("  {}", file.display());
    }

    let context = ReconcileContext::new(&config.reconcile.user_lookup)?;
    let http = AdminClient::http_client(config.http_timeout)?;
    let reconciler = Reconciler::new(
        context,
        config.credentials,
        config.reconcile,
        Arc::new(ProgressSink::new(active)),
        http,
    )?;

    let mut summary = BatchSummary::default();
    let mut failed_files = 0usize;

    for file in &files {
        info!("Processing file {}", file.display());
        let parsed = match ingest::load_file(file, &config.domain) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("{e}");
                failed_files += 1;
                continue;
            }
        };

        for warning in &parsed.warnings {
            warn!("{}: {warning}", file.display());
        }
        if parsed.requests.is_empty() {
            warn!("{} has no valid requests", file.display());
            continue;
        }

        summary.merge(reconciler.run_batch(&parsed.requests).await);
    }

    report(&summary, failed_files, log_file);
    Ok(())
}

fn report(summary: &BatchSummary, failed_files: usize, log_file: &Path) {
    if summary.has_errors() || failed_files > 0 {
        warn!(
            processed = summary.processed,
            aborted = summary.aborted,
            with_errors = summary.with_errors,
            failed_files,
            "Some operations finished with errors, see {} for details",
            log_file.display()
        );
    } else {
        info!(
            processed = summary.processed,
            "All operations completed successfully"
        );
    }
}

/// Directory holding the executable, falling back to the working directory.
fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn wait_for_enter() {
    println!("Press Enter to exit...");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
