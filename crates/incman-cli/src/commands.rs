// Subcommand handlers. Each prints its result to stdout and reports
// "not found" outcomes through the exit code.

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use chrono::Weekday;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use incman_app::notify::Notifier;
use incman_app::{intake, listener};
use incman_core::config::Config;
use incman_core::db::Database;
use incman_core::incident::{format_timestamp, Incident, Status};
use incman_core::manager::IncidentManager;
use incman_core::oncall::Rotation;
use incman_core::report;

use crate::Commands;

/// Time allowed for the intake loop to flush pending webhook deliveries.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn open_manager(config: &Config) -> anyhow::Result<IncidentManager> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&config.db_path.to_string_lossy()).context("failed to open database")?;
    let rotation = Rotation::new(config.rotation.clone()).context("invalid on-call rotation")?;
    Ok(IncidentManager::new(db, rotation))
}

fn not_found(message: &str) -> ExitCode {
    println!("{message}");
    ExitCode::FAILURE
}

pub(crate) async fn execute(command: Commands, config: &Config) -> anyhow::Result<ExitCode> {
    let manager = open_manager(config)?;
    let notifier = Notifier::from_config(config)?;

    match command {
        Commands::Active => {
            for inc in manager.active_incidents()? {
                println!(
                    "{} - {} [{}] ({}) - {}",
                    inc.id, inc.title, inc.severity, inc.status, inc.assignee
                );
            }
        }

        Commands::Create {
            title,
            severity,
            services,
        } => {
            let inc = manager.create_incident(&title, severity, services)?;
            println!(
                "Created: {} - {} (assigned to {})",
                inc.id, inc.title, inc.assignee
            );
            notifier.incident_opened(&inc).await;
        }

        Commands::Resolve { incident_id, notes } => {
            if !manager.resolve(&incident_id, notes.as_deref().unwrap_or(""))? {
                return Ok(not_found("Not found"));
            }
            println!("Resolved: {incident_id}");
            notifier.incident_resolved(&incident_id).await;
        }

        Commands::Status {
            incident_id,
            new_status,
        } => {
            let Ok(status) = new_status.parse::<Status>() else {
                return Ok(not_found("Not found or invalid status"));
            };
            if !manager.update_status(&incident_id, status)? {
                return Ok(not_found("Not found or invalid status"));
            }
            println!("Updated: {incident_id} -> {status}");
            if status == Status::Resolved {
                notifier.incident_resolved(&incident_id).await;
            }
        }

        Commands::Timeline {
            incident_id,
            event,
            author,
        } => {
            if !manager.add_timeline_event(&incident_id, &event, &author)? {
                return Ok(not_found("Not found"));
            }
            println!("Added event to {incident_id}");
        }

        Commands::Postmortem { incident_id, save } => {
            let rendered = if save {
                manager.save_postmortem(&incident_id)?
            } else {
                manager.generate_postmortem(&incident_id)?
            };
            match rendered {
                Some(text) => println!("{text}"),
                None => return Ok(not_found("Not found")),
            }
        }

        Commands::Mttr { severity } => {
            let mttr = manager.mttr(severity)?;
            println!("MTTR: {mttr:.2} minutes");
        }

        Commands::Oncall { day } => match day {
            Some(day) => {
                let weekday: Weekday = day
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid weekday `{day}`"))?;
                println!("On-call: {}", manager.oncall_for(weekday));
            }
            None => println!("On-call: {}", manager.oncall()),
        },

        Commands::Show { incident_id } => match manager.get_incident(&incident_id)? {
            Some(inc) => print!("{}", describe(&inc)),
            None => return Ok(not_found("Not found")),
        },

        Commands::Assign {
            incident_id,
            assignee,
        } => {
            if !manager.assign(&incident_id, &assignee)? {
                return Ok(not_found("Not found"));
            }
            println!("Assigned {incident_id} to {assignee}");
        }

        Commands::Alert {
            source,
            severity,
            message,
        } => {
            let inc = manager.auto_create_from_alert(&source, &message, severity)?;
            println!(
                "Created: {} - {} (assigned to {})",
                inc.id, inc.title, inc.assignee
            );
            notifier.incident_opened(&inc).await;
        }

        Commands::Alerts { incident_id } => {
            if manager.get_incident(&incident_id)?.is_none() {
                return Ok(not_found("Not found"));
            }
            for alert in manager.alerts_for(&incident_id)? {
                println!(
                    "{} - [{}] {}: {} ({})",
                    alert.id,
                    alert.severity,
                    alert.source,
                    alert.message,
                    format_timestamp(&alert.fired_at)
                );
            }
        }

        Commands::Export { output } => {
            let incidents = manager.all_incidents()?;
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    report::write_csv(&incidents, file)?;
                    println!("Exported {} incident(s) to {}", incidents.len(), path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    report::write_csv(&incidents, &mut lock)?;
                    lock.flush()?;
                }
            }
        }

        Commands::Listen { port } => {
            listen(manager, notifier, port.unwrap_or(config.listener_port)).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Multi-line detail view used by `show`.
fn describe(inc: &Incident) -> String {
    let mut out = format!("{} - {}\n", inc.id, inc.title);
    out.push_str(&format!("  severity:  {}\n", inc.severity));
    out.push_str(&format!("  status:    {}\n", inc.status));
    out.push_str(&format!("  assignee:  {}\n", inc.assignee));
    if !inc.services.is_empty() {
        out.push_str(&format!("  services:  {}\n", inc.services.join(", ")));
    }
    out.push_str(&format!("  created:   {}\n", format_timestamp(&inc.created_at)));
    if let Some(resolved) = &inc.resolved_at {
        out.push_str(&format!("  resolved:  {}\n", format_timestamp(resolved)));
    }
    if !inc.timeline.is_empty() {
        out.push_str("  timeline:\n");
        for ev in &inc.timeline {
            out.push_str(&format!(
                "    - {} ({}): {}\n",
                format_timestamp(&ev.timestamp),
                ev.author,
                ev.event
            ));
        }
    }
    out
}

/// Run the alert listener and intake loop until Ctrl+C.
async fn listen(manager: IncidentManager, notifier: Notifier, port: u16) -> anyhow::Result<()> {
    let tcp = listener::bind(port)
        .await
        .with_context(|| format!("failed to bind alert listener on port {port}"))?;
    let local = tcp.local_addr()?;

    let (tx, rx) = mpsc::channel(256);
    let server = tokio::spawn(async move {
        if let Err(e) = listener::serve(tcp, tx).await {
            error!("Alert listener error: {e}");
        }
    });
    let intake_handle = tokio::spawn(intake::run(rx, manager, notifier));

    println!("Listening for alerts on ws://{local} (Ctrl+C to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Interrupt received, stopping alert listener");

    // Dropping the server task closes the channel, which ends the intake loop.
    server.abort();
    match tokio::time::timeout(SHUTDOWN_GRACE, intake_handle).await {
        Ok(Ok(Ok(opened))) => println!("Stopped. Opened {opened} incident(s)."),
        Ok(Ok(Err(e))) => error!("Alert intake loop error: {e:#}"),
        Ok(Err(e)) => error!("Alert intake task failed: {e}"),
        Err(_) => warn!("Alert intake loop did not stop within {SHUTDOWN_GRACE:?}"),
    }

    Ok(())
}
