// Alert intake loop: turns listener alerts into incidents and answers each
// sender with the outcome.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use incman_core::incident::Incident;
use incman_core::manager::IncidentManager;

use crate::listener::{Ack, AlertPayload, ListenerEvent};
use crate::notify::Notifier;

/// Open an incident for one alert.
fn open_incident(manager: &IncidentManager, payload: &AlertPayload) -> (Ack, Option<Incident>) {
    match manager.auto_create_from_alert(&payload.source, &payload.message, payload.severity) {
        Ok(incident) => {
            info!(
                "Opened incident {} [{}] for {}",
                incident.id, incident.severity, incident.assignee
            );
            let ack = Ack::Opened {
                incident_id: incident.id.clone(),
            };
            (ack, Some(incident))
        }
        Err(e) => {
            warn!("Failed to open incident from alert: {e:#}");
            let ack = Ack::Rejected {
                reason: "failed to open incident".into(),
            };
            (ack, None)
        }
    }
}

/// Consume listener events until the channel closes. Returns the number of
/// incidents opened.
///
/// Notifications run on their own tasks so a slow webhook never delays the
/// next alert. Pending deliveries are awaited before returning.
pub async fn run(
    mut rx: mpsc::Receiver<ListenerEvent>,
    manager: IncidentManager,
    notifier: Notifier,
) -> anyhow::Result<usize> {
    info!("Alert intake loop started");
    let notifier = Arc::new(notifier);
    let mut deliveries = JoinSet::new();
    let mut opened = 0;

    while let Some(event) = rx.recv().await {
        match event {
            ListenerEvent::Connected { addr } => info!("Alert source connected from {addr}"),
            ListenerEvent::Disconnected { addr } => info!("Alert source {addr} disconnected"),
            ListenerEvent::Alert { payload, reply } => {
                let (ack, incident) = open_incident(&manager, &payload);
                if let Some(incident) = incident {
                    opened += 1;
                    let notifier = Arc::clone(&notifier);
                    deliveries.spawn(async move { notifier.incident_opened(&incident).await });
                }
                if reply.send(ack).is_err() {
                    debug!("Alert sender left before its ack");
                }
            }
        }

        while deliveries.try_join_next().is_some() {}
    }

    while deliveries.join_next().await.is_some() {}

    info!("Alert intake loop exiting after {opened} incident(s)");
    Ok(opened)
}
