//! incman: incident response and on-call management from the terminal.
//!
//! Startup sequence:
//! 1. Parse arguments
//! 2. Load config (seeding the default file on first run)
//! 3. Initialize tracing (log file, or stderr with `-v`)
//! 4. Open the database and dispatch the subcommand

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use incman_core::config::{self, Config};
use incman_core::incident::Severity;

/// Track incidents, alerts, and on-call schedules.
#[derive(Parser, Debug)]
#[command(name = "incman", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level to stderr instead of the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// List active incidents
    Active,

    /// Create incident
    Create {
        /// Incident title
        title: String,
        /// Severity (P1/P2/P3/P4)
        severity: Severity,
        /// Affected services
        services: Vec<String>,
    },

    /// Resolve incident
    Resolve {
        /// Incident ID
        incident_id: String,
        /// Resolution notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Update incident status
    Status {
        /// Incident ID
        incident_id: String,
        /// New status (new, investigating, identified, monitoring, resolved)
        new_status: String,
    },

    /// Add timeline event
    Timeline {
        /// Incident ID
        incident_id: String,
        /// Event description
        event: String,
        /// Event author
        #[arg(long, default_value = "system")]
        author: String,
    },

    /// Generate postmortem
    Postmortem {
        /// Incident ID
        incident_id: String,
        /// Also store the rendered postmortem on the incident
        #[arg(long)]
        save: bool,
    },

    /// Get mean time to resolve
    Mttr {
        /// Filter by severity
        #[arg(long)]
        severity: Option<Severity>,
    },

    /// Get on-call person
    Oncall {
        /// Weekday to look up instead of today (e.g. mon, friday)
        #[arg(long)]
        day: Option<String>,
    },

    /// Show incident details
    Show {
        /// Incident ID
        incident_id: String,
    },

    /// Reassign incident
    Assign {
        /// Incident ID
        incident_id: String,
        /// New assignee
        assignee: String,
    },

    /// Open an incident from a monitoring alert
    Alert {
        /// Alert source (e.g. prometheus)
        source: String,
        /// Severity (P1/P2/P3/P4)
        severity: Severity,
        /// Alert message
        message: String,
    },

    /// List alerts linked to an incident
    Alerts {
        /// Incident ID
        incident_id: String,
    },

    /// Export all incidents as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Accept alerts over WebSocket until interrupted
    Listen {
        /// Port to bind on 127.0.0.1 (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref()).context("failed to load configuration")?;

    init_tracing(&config, cli.verbose)?;
    info!(db = %config.db_path.display(), "incman starting");

    commands::execute(cli.command, &config).await
}

/// Initialize tracing. Logs go to `<data dir>/logs/incman.log` so command
/// output on stdout stays clean; `-v` sends debug output to stderr instead.
fn init_tracing(config: &Config, verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    if verbose {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(EnvFilter::new("incman=debug,incman_core=debug,incman_app=debug,warn"))
            .with_writer(std::io::stderr)
            .with_target(true)
            .finish();
        return tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber");
    }

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("failed to create log directory {}", config.log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_dir.join("incman.log"))
        .context("failed to open log file")?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("incman=info,incman_core=info,incman_app=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
