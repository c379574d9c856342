// Incident lifecycle operations on top of the store and the on-call rotation.

use anyhow::Result;
use chrono::{DateTime, Utc, Weekday};
use tracing::{debug, info};

use crate::db::Database;
use crate::incident::{new_id, Alert, Incident, Severity, Status, TimelineEvent};
use crate::metrics;
use crate::oncall::Rotation;
use crate::postmortem;

/// Author recorded on timeline events the tool writes itself.
pub const SYSTEM_AUTHOR: &str = "system";

/// Entry point for every incident operation. Each method that depends on the
/// clock has an `*_at` variant taking the time explicitly.
pub struct IncidentManager {
    db: Database,
    rotation: Rotation,
}

impl IncidentManager {
    pub fn new(db: Database, rotation: Rotation) -> Self {
        Self { db, rotation }
    }

    /// Who is on call right now.
    pub fn oncall(&self) -> String {
        self.rotation.on_call_now().to_string()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Open a new incident assigned to the current on-call responder.
    pub fn create_incident(
        &self,
        title: &str,
        severity: Severity,
        services: Vec<String>,
    ) -> Result<Incident> {
        let assignee = self.oncall();
        self.create_incident_at(title, severity, services, &assignee, Utc::now())
    }

    pub fn create_incident_at(
        &self,
        title: &str,
        severity: Severity,
        services: Vec<String>,
        assignee: &str,
        now: DateTime<Utc>,
    ) -> Result<Incident> {
        let incident = Incident::open(title, severity, assignee, services, now);
        self.db.insert_incident(&incident)?;
        info!(
            id = %incident.id,
            %severity,
            assignee = %incident.assignee,
            "incident created"
        );
        Ok(incident)
    }

    /// Open an incident titled `Alert: <message>` and record the alert that
    /// triggered it.
    pub fn auto_create_from_alert(
        &self,
        source: &str,
        message: &str,
        severity: Severity,
    ) -> Result<Incident> {
        let assignee = self.oncall();
        self.auto_create_from_alert_at(source, message, severity, &assignee, Utc::now())
    }

    pub fn auto_create_from_alert_at(
        &self,
        source: &str,
        message: &str,
        severity: Severity,
        assignee: &str,
        now: DateTime<Utc>,
    ) -> Result<Incident> {
        let incident = Incident::open(format!("Alert: {message}"), severity, assignee, Vec::new(), now);
        let alert = Alert {
            id: new_id(),
            source: source.to_string(),
            message: message.to_string(),
            severity,
            fired_at: now,
            incident_id: Some(incident.id.clone()),
        };
        self.db.insert_incident_with_alert(&incident, &alert)?;
        info!(
            id = %incident.id,
            alert = %alert.id,
            source,
            %severity,
            "incident opened from alert"
        );
        Ok(incident)
    }

    /// On-call responder for an arbitrary weekday, for callers that need a
    /// deterministic assignee.
    pub fn oncall_for(&self, day: Weekday) -> &str {
        self.rotation.on_call_for(day)
    }

    // ------------------------------------------------------------------
    // Updates (each returns false for an unknown id)
    // ------------------------------------------------------------------

    pub fn assign(&self, id: &str, assignee: &str) -> Result<bool> {
        let found = self.db.set_assignee(id, assignee)?;
        if found {
            info!(id, assignee, "incident reassigned");
        }
        Ok(found)
    }

    pub fn update_status(&self, id: &str, status: Status) -> Result<bool> {
        self.update_status_at(id, status, Utc::now())
    }

    pub fn update_status_at(&self, id: &str, status: Status, now: DateTime<Utc>) -> Result<bool> {
        let found = self.db.set_status(id, status, now)?;
        if found {
            info!(id, %status, "incident status updated");
        }
        Ok(found)
    }

    pub fn add_timeline_event(&self, id: &str, event: &str, author: &str) -> Result<bool> {
        self.add_timeline_event_at(id, event, author, Utc::now())
    }

    pub fn add_timeline_event_at(
        &self,
        id: &str,
        event: &str,
        author: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let entry = TimelineEvent {
            timestamp: now,
            event: event.to_string(),
            author: author.to_string(),
        };
        let found = self.db.append_timeline(id, &entry)?;
        if found {
            debug!(id, author, "timeline event added");
        }
        Ok(found)
    }

    /// Mark an incident resolved. Non-empty `notes` are kept on the timeline
    /// as `Resolved: <notes>`. Resolving an already resolved incident keeps
    /// the first `resolved_at` and adds no event.
    pub fn resolve(&self, id: &str, notes: &str) -> Result<bool> {
        self.resolve_at(id, notes, Utc::now())
    }

    pub fn resolve_at(&self, id: &str, notes: &str, now: DateTime<Utc>) -> Result<bool> {
        let notes = notes.trim();
        let note = (!notes.is_empty()).then(|| TimelineEvent {
            timestamp: now,
            event: format!("Resolved: {notes}"),
            author: SYSTEM_AUTHOR.to_string(),
        });
        let found = self.db.resolve(id, note.as_ref(), now)?;
        if found {
            info!(id, "incident resolved");
        }
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_incident(&self, id: &str) -> Result<Option<Incident>> {
        self.db.get_incident(id)
    }

    pub fn active_incidents(&self) -> Result<Vec<Incident>> {
        self.db.active_incidents()
    }

    pub fn all_incidents(&self) -> Result<Vec<Incident>> {
        self.db.all_incidents()
    }

    pub fn alerts_for(&self, id: &str) -> Result<Vec<Alert>> {
        self.db.alerts_for(id)
    }

    /// Mean time to resolve, in minutes, over resolved incidents (optionally
    /// of a single severity). 0.0 when nothing matches.
    pub fn mttr(&self, severity: Option<Severity>) -> Result<f64> {
        let spans = self.db.resolved_durations(severity)?;
        Ok(metrics::mean_minutes(&spans))
    }

    /// Markdown postmortem template, or `None` for an unknown id.
    pub fn generate_postmortem(&self, id: &str) -> Result<Option<String>> {
        Ok(self.db.get_incident(id)?.map(|inc| postmortem::render(&inc)))
    }

    /// Render the postmortem and store it on the incident.
    pub fn save_postmortem(&self, id: &str) -> Result<Option<String>> {
        let Some(text) = self.generate_postmortem(id)? else {
            return Ok(None);
        };
        self.db.set_postmortem(id, &text)?;
        info!(id, "postmortem saved");
        Ok(Some(text))
    }
}
