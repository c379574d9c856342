// SQLite persistence layer for incidents and alerts.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use crate::incident::{format_timestamp, parse_timestamp, Alert, Incident, Severity, Status, TimelineEvent};

/// Column list shared by every incident query, in `IncidentRow` order.
const INCIDENT_COLUMNS: &str =
    "id, title, severity, status, assignee, services, timeline, created_at, resolved_at, postmortem";

/// SQLite-backed persistence for incidents, their timelines, and the alerts
/// that opened them.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS incidents (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                severity    TEXT NOT NULL,
                status      TEXT NOT NULL,
                assignee    TEXT NOT NULL,
                services    TEXT NOT NULL DEFAULT '[]',
                timeline    TEXT NOT NULL DEFAULT '[]',
                created_at  TEXT NOT NULL,
                resolved_at TEXT,
                postmortem  TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id          TEXT PRIMARY KEY,
                source      TEXT NOT NULL,
                message     TEXT NOT NULL,
                severity    TEXT NOT NULL,
                fired_at    TEXT NOT NULL,
                incident_id TEXT REFERENCES incidents(id)
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_incident_id ON alerts(incident_id);
            CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents(status);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    pub fn insert_incident(&self, incident: &Incident) -> Result<()> {
        let conn = self.conn();
        insert_incident_row(&conn, incident)
    }

    pub fn insert_alert(&self, alert: &Alert) -> Result<()> {
        let conn = self.conn();
        insert_alert_row(&conn, alert)
    }

    /// Insert an incident and the alert that triggered it in one transaction,
    /// so an alert never points at a missing incident.
    pub fn insert_incident_with_alert(&self, incident: &Incident, alert: &Alert) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        insert_incident_row(&tx, incident)?;
        insert_alert_row(&tx, alert)?;
        tx.commit().context("failed to commit incident and alert")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_incident(&self, id: &str) -> Result<Option<Incident>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?1"),
                params![id],
                IncidentRow::from_row,
            )
            .optional()
            .context("failed to query incident")?;
        row.map(IncidentRow::into_incident).transpose()
    }

    /// Incidents that are not resolved, newest first.
    pub fn active_incidents(&self) -> Result<Vec<Incident>> {
        let conn = self.conn();
        query_incidents(
            &conn,
            &format!(
                "SELECT {INCIDENT_COLUMNS} FROM incidents
                 WHERE status != 'resolved' ORDER BY created_at DESC"
            ),
            [],
        )
    }

    /// Every incident, oldest first.
    pub fn all_incidents(&self) -> Result<Vec<Incident>> {
        let conn = self.conn();
        query_incidents(
            &conn,
            &format!("SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY created_at"),
            [],
        )
    }

    /// Alerts linked to `incident_id`, in firing order.
    pub fn alerts_for(&self, incident_id: &str) -> Result<Vec<Alert>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, source, message, severity, fired_at, incident_id
                 FROM alerts WHERE incident_id = ?1 ORDER BY fired_at",
            )
            .context("failed to prepare alerts_for query")?;

        let rows = stmt
            .query_map(params![incident_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .context("failed to query alerts")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map alert rows")?;

        rows.into_iter()
            .map(|(id, source, message, severity, fired_at, incident_id)| -> Result<Alert> {
                Ok(Alert {
                    severity: severity
                        .parse()
                        .with_context(|| format!("alert {id} has a bad severity"))?,
                    fired_at: parse_timestamp(&fired_at)
                        .with_context(|| format!("alert {id} has a bad fired_at"))?,
                    id,
                    source,
                    message,
                    incident_id,
                })
            })
            .collect()
    }

    /// `(created_at, resolved_at)` pairs of resolved incidents, optionally
    /// restricted to one severity.
    pub fn resolved_durations(
        &self,
        severity: Option<Severity>,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT created_at, resolved_at FROM incidents
                 WHERE status = 'resolved' AND resolved_at IS NOT NULL
                   AND (?1 IS NULL OR severity = ?1)",
            )
            .context("failed to prepare resolved_durations query")?;

        let raw = stmt
            .query_map(params![severity.map(|s| s.as_str())], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("failed to query resolved incidents")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map resolved incident rows")?;

        raw.iter()
            .map(|(start, end)| -> Result<(DateTime<Utc>, DateTime<Utc>)> {
                Ok((
                    parse_timestamp(start).context("bad created_at")?,
                    parse_timestamp(end).context("bad resolved_at")?,
                ))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------
    //
    // Each update returns `false` when no incident has the given id.

    pub fn set_assignee(&self, id: &str, assignee: &str) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE incidents SET assignee = ?2 WHERE id = ?1",
                params![id, assignee],
            )
            .context("failed to update assignee")?;
        Ok(changed > 0)
    }

    /// Move an incident to `status`. Entering `resolved` stamps `resolved_at`
    /// with `now` unless it is already stamped; leaving `resolved` clears it.
    pub fn set_status(&self, id: &str, status: Status, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn();
        Ok(update_status_row(&conn, id, status, now)? > 0)
    }

    /// Append one event to an incident's JSON timeline. The read and write
    /// happen inside a single transaction.
    pub fn append_timeline(&self, id: &str, event: &TimelineEvent) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let Some((_, mut timeline)) = read_status_and_timeline(&tx, id)? else {
            return Ok(false);
        };
        timeline.push(event.clone());
        write_timeline(&tx, id, &timeline)?;

        tx.commit().context("failed to commit timeline update")?;
        Ok(true)
    }

    /// Resolve an incident, optionally recording `note` on its timeline, in
    /// one transaction. The note is skipped when the incident was already
    /// resolved, so repeating a resolve leaves the timeline unchanged.
    pub fn resolve(&self, id: &str, note: Option<&TimelineEvent>, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let Some((status, mut timeline)) = read_status_and_timeline(&tx, id)? else {
            return Ok(false);
        };
        if let Some(note) = note.filter(|_| status != Status::Resolved) {
            timeline.push(note.clone());
            write_timeline(&tx, id, &timeline)?;
        }
        update_status_row(&tx, id, Status::Resolved, now)?;

        tx.commit().context("failed to commit resolve")?;
        Ok(true)
    }

    pub fn set_postmortem(&self, id: &str, text: &str) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE incidents SET postmortem = ?2 WHERE id = ?1",
                params![id, text],
            )
            .context("failed to store postmortem")?;
        Ok(changed > 0)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn insert_incident_row(conn: &Connection, incident: &Incident) -> Result<()> {
    let services =
        serde_json::to_string(&incident.services).context("failed to serialize services")?;
    let timeline =
        serde_json::to_string(&incident.timeline).context("failed to serialize timeline")?;
    conn.execute(
        "INSERT INTO incidents
            (id, title, severity, status, assignee, services, timeline, created_at, resolved_at, postmortem)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            incident.id,
            incident.title,
            incident.severity.as_str(),
            incident.status.as_str(),
            incident.assignee,
            services,
            timeline,
            format_timestamp(&incident.created_at),
            incident.resolved_at.as_ref().map(format_timestamp),
            incident.postmortem,
        ],
    )
    .with_context(|| format!("failed to insert incident {}", incident.id))?;
    Ok(())
}

fn insert_alert_row(conn: &Connection, alert: &Alert) -> Result<()> {
    conn.execute(
        "INSERT INTO alerts (id, source, message, severity, fired_at, incident_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            alert.id,
            alert.source,
            alert.message,
            alert.severity.as_str(),
            format_timestamp(&alert.fired_at),
            alert.incident_id,
        ],
    )
    .with_context(|| format!("failed to insert alert {}", alert.id))?;
    Ok(())
}

fn update_status_row(conn: &Connection, id: &str, status: Status, now: DateTime<Utc>) -> Result<usize> {
    if status == Status::Resolved {
        conn.execute(
            "UPDATE incidents
             SET status = 'resolved', resolved_at = COALESCE(resolved_at, ?2)
             WHERE id = ?1",
            params![id, format_timestamp(&now)],
        )
    } else {
        conn.execute(
            "UPDATE incidents SET status = ?2, resolved_at = NULL WHERE id = ?1",
            params![id, status.as_str()],
        )
    }
    .context("failed to update status")
}

fn read_status_and_timeline(
    conn: &Connection,
    id: &str,
) -> Result<Option<(Status, Vec<TimelineEvent>)>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT status, timeline FROM incidents WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .context("failed to read timeline")?;

    let Some((status, timeline)) = row else {
        return Ok(None);
    };
    let status = status
        .parse()
        .with_context(|| format!("incident {id}: bad status"))?;
    let timeline = serde_json::from_str(&timeline).context("failed to deserialize timeline")?;
    Ok(Some((status, timeline)))
}

fn write_timeline(conn: &Connection, id: &str, timeline: &[TimelineEvent]) -> Result<()> {
    let json = serde_json::to_string(timeline).context("failed to serialize timeline")?;
    conn.execute(
        "UPDATE incidents SET timeline = ?2 WHERE id = ?1",
        params![id, json],
    )
    .context("failed to write timeline")?;
    Ok(())
}

fn query_incidents<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Incident>> {
    let mut stmt = conn
        .prepare(sql)
        .context("failed to prepare incident query")?;
    let rows = stmt
        .query_map(params, IncidentRow::from_row)
        .context("failed to query incidents")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map incident rows")?;
    rows.into_iter().map(IncidentRow::into_incident).collect()
}

/// Raw column values of an `incidents` row, decoded into an [`Incident`]
/// outside the rusqlite row callback so decode errors carry context.
struct IncidentRow {
    id: String,
    title: String,
    severity: String,
    status: String,
    assignee: String,
    services: String,
    timeline: String,
    created_at: String,
    resolved_at: Option<String>,
    postmortem: Option<String>,
}

impl IncidentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            severity: row.get(2)?,
            status: row.get(3)?,
            assignee: row.get(4)?,
            services: row.get(5)?,
            timeline: row.get(6)?,
            created_at: row.get(7)?,
            resolved_at: row.get(8)?,
            postmortem: row.get(9)?,
        })
    }

    fn into_incident(self) -> Result<Incident> {
        let id = self.id;
        let services: Vec<String> = serde_json::from_str(&self.services)
            .with_context(|| format!("incident {id}: bad services JSON"))?;
        let timeline: Vec<TimelineEvent> = serde_json::from_str(&self.timeline)
            .with_context(|| format!("incident {id}: bad timeline JSON"))?;
        let resolved_at = self
            .resolved_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .with_context(|| format!("incident {id}: bad resolved_at"))?;

        Ok(Incident {
            title: self.title,
            severity: self
                .severity
                .parse()
                .with_context(|| format!("incident {id}: bad severity"))?,
            status: self
                .status
                .parse()
                .with_context(|| format!("incident {id}: bad status"))?,
            assignee: self.assignee,
            services,
            timeline,
            created_at: parse_timestamp(&self.created_at)
                .with_context(|| format!("incident {id}: bad created_at"))?,
            resolved_at,
            postmortem: self.postmortem.unwrap_or_default(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory db should open")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn sample_incident(title: &str, created_at: DateTime<Utc>) -> Incident {
        Incident::open(
            title,
            Severity::P2,
            "alexa",
            vec!["api".to_string(), "db".to_string()],
            created_at,
        )
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"incidents".to_string()));
        assert!(tables.contains(&"alerts".to_string()));
    }

    // ------------------------------------------------------------------
    // Insert / load
    // ------------------------------------------------------------------

    #[test]
    fn insert_and_get_incident() {
        let db = test_db();
        let inc = sample_incident("API latency", t0());
        db.insert_incident(&inc).unwrap();

        let loaded = db.get_incident(&inc.id).unwrap().unwrap();
        assert_eq!(loaded, inc);
    }

    #[test]
    fn get_incident_returns_none_for_unknown_id() {
        let db = test_db();
        assert!(db.get_incident("deadbeef").unwrap().is_none());
    }

    #[test]
    fn active_incidents_newest_first_and_excludes_resolved() {
        let db = test_db();
        let old = sample_incident("old", t0());
        let mid = sample_incident("mid", t0() + Duration::minutes(5));
        let new = sample_incident("new", t0() + Duration::minutes(10));
        for inc in [&old, &mid, &new] {
            db.insert_incident(inc).unwrap();
        }
        db.set_status(&mid.id, Status::Resolved, t0() + Duration::minutes(20))
            .unwrap();

        let titles: Vec<String> = db
            .active_incidents()
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[test]
    fn all_incidents_oldest_first() {
        let db = test_db();
        db.insert_incident(&sample_incident("b", t0() + Duration::minutes(1)))
            .unwrap();
        db.insert_incident(&sample_incident("a", t0())).unwrap();
        let titles: Vec<String> = db.all_incidents().unwrap().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_incident_id_is_rejected() {
        let db = test_db();
        let inc = sample_incident("dup", t0());
        db.insert_incident(&inc).unwrap();
        assert!(db.insert_incident(&inc).is_err());
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    #[test]
    fn set_assignee_reports_missing_incident() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        db.insert_incident(&inc).unwrap();

        assert!(db.set_assignee(&inc.id, "octavia").unwrap());
        assert!(!db.set_assignee("nope", "octavia").unwrap());
        assert_eq!(db.get_incident(&inc.id).unwrap().unwrap().assignee, "octavia");
    }

    #[test]
    fn resolving_stamps_resolved_at_once() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        db.insert_incident(&inc).unwrap();

        let first = t0() + Duration::minutes(30);
        assert!(db.set_status(&inc.id, Status::Resolved, first).unwrap());
        // A second resolve keeps the original timestamp.
        assert!(db
            .set_status(&inc.id, Status::Resolved, first + Duration::hours(1))
            .unwrap());

        let loaded = db.get_incident(&inc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::Resolved);
        assert_eq!(loaded.resolved_at, Some(first));
    }

    #[test]
    fn reopening_clears_resolved_at() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        db.insert_incident(&inc).unwrap();
        db.set_status(&inc.id, Status::Resolved, t0() + Duration::minutes(5))
            .unwrap();
        db.set_status(&inc.id, Status::Investigating, t0() + Duration::minutes(6))
            .unwrap();

        let loaded = db.get_incident(&inc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::Investigating);
        assert!(loaded.resolved_at.is_none());
    }

    #[test]
    fn set_status_unknown_id_is_false() {
        let db = test_db();
        assert!(!db.set_status("nope", Status::Monitoring, t0()).unwrap());
    }

    #[test]
    fn append_timeline_preserves_order() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        db.insert_incident(&inc).unwrap();

        for (i, text) in ["paged", "rolled back", "recovered"].iter().enumerate() {
            let ev = TimelineEvent {
                timestamp: t0() + Duration::minutes(i as i64),
                event: text.to_string(),
                author: "alice".into(),
            };
            assert!(db.append_timeline(&inc.id, &ev).unwrap());
        }

        let loaded = db.get_incident(&inc.id).unwrap().unwrap();
        let events: Vec<&str> = loaded.timeline.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(events, vec!["paged", "rolled back", "recovered"]);
    }

    #[test]
    fn append_timeline_unknown_id_is_false() {
        let db = test_db();
        let ev = TimelineEvent {
            timestamp: t0(),
            event: "x".into(),
            author: "system".into(),
        };
        assert!(!db.append_timeline("missing", &ev).unwrap());
    }

    #[test]
    fn resolve_writes_note_and_status_together() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        db.insert_incident(&inc).unwrap();
        let note = TimelineEvent {
            timestamp: t0() + Duration::minutes(30),
            event: "Resolved: rolled back".into(),
            author: "system".into(),
        };

        assert!(db.resolve(&inc.id, Some(&note), t0() + Duration::minutes(30)).unwrap());
        assert!(db.resolve(&inc.id, Some(&note), t0() + Duration::minutes(50)).unwrap());

        let loaded = db.get_incident(&inc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::Resolved);
        assert_eq!(loaded.timeline, vec![note]);
        assert_eq!(loaded.resolved_at, Some(t0() + Duration::minutes(30)));
    }

    #[test]
    fn resolve_unknown_id_is_false() {
        let db = test_db();
        assert!(!db.resolve("missing", None, t0()).unwrap());
    }

    #[test]
    fn set_postmortem_persists_text() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        db.insert_incident(&inc).unwrap();
        assert!(db.set_postmortem(&inc.id, "# Incident Postmortem").unwrap());
        assert_eq!(
            db.get_incident(&inc.id).unwrap().unwrap().postmortem,
            "# Incident Postmortem"
        );
    }

    // ------------------------------------------------------------------
    // Alerts
    // ------------------------------------------------------------------

    #[test]
    fn incident_with_alert_is_linked() {
        let db = test_db();
        let inc = sample_incident("Alert: disk full", t0());
        let alert = Alert {
            id: "a1b2c3d4".into(),
            source: "prometheus".into(),
            message: "disk full".into(),
            severity: Severity::P2,
            fired_at: t0(),
            incident_id: Some(inc.id.clone()),
        };
        db.insert_incident_with_alert(&inc, &alert).unwrap();

        let alerts = db.alerts_for(&inc.id).unwrap();
        assert_eq!(alerts, vec![alert]);
    }

    #[test]
    fn alert_for_missing_incident_violates_foreign_key() {
        let db = test_db();
        let alert = Alert {
            id: "a1b2c3d4".into(),
            source: "prometheus".into(),
            message: "disk full".into(),
            severity: Severity::P2,
            fired_at: t0(),
            incident_id: Some("ghost".into()),
        };
        assert!(db.insert_alert(&alert).is_err());
    }

    #[test]
    fn failed_alert_insert_rolls_back_incident() {
        let db = test_db();
        let inc = sample_incident("x", t0());
        let existing = Alert {
            id: "same".into(),
            source: "s".into(),
            message: "m".into(),
            severity: Severity::P4,
            fired_at: t0(),
            incident_id: None,
        };
        db.insert_alert(&existing).unwrap();

        let clash = Alert {
            incident_id: Some(inc.id.clone()),
            ..existing
        };
        assert!(db.insert_incident_with_alert(&inc, &clash).is_err());
        assert!(db.get_incident(&inc.id).unwrap().is_none());
    }

    // ------------------------------------------------------------------
    // Resolution durations
    // ------------------------------------------------------------------

    #[test]
    fn resolved_durations_filters_by_severity() {
        let db = test_db();
        let mut p1 = sample_incident("p1", t0());
        p1.severity = Severity::P1;
        let p2 = sample_incident("p2", t0());
        let open = sample_incident("open", t0());
        for inc in [&p1, &p2, &open] {
            db.insert_incident(inc).unwrap();
        }
        db.set_status(&p1.id, Status::Resolved, t0() + Duration::minutes(10))
            .unwrap();
        db.set_status(&p2.id, Status::Resolved, t0() + Duration::minutes(40))
            .unwrap();

        assert_eq!(db.resolved_durations(None).unwrap().len(), 2);
        let only_p1 = db.resolved_durations(Some(Severity::P1)).unwrap();
        assert_eq!(only_p1, vec![(t0(), t0() + Duration::minutes(10))]);
        assert!(db.resolved_durations(Some(Severity::P4)).unwrap().is_empty());
    }

    #[test]
    fn legacy_offsetless_rows_are_readable() {
        let db = test_db();
        db.conn()
            .execute(
                "INSERT INTO incidents (id, title, severity, status, assignee, services, timeline, created_at, resolved_at)
                 VALUES ('legacy01', 'old row', 'P3', 'resolved', 'aria', '[]',
                         '[{\"timestamp\": \"2026-01-05T10:01:00.000000\", \"event\": \"ack\", \"author\": \"aria\"}]',
                         '2026-01-05T10:00:00.000000', '2026-01-05T10:30:00.000000')",
                [],
            )
            .unwrap();

        let inc = db.get_incident("legacy01").unwrap().unwrap();
        assert_eq!(inc.minutes_to_resolve(), Some(30.0));
        assert_eq!(inc.timeline.len(), 1);
        assert!(inc.postmortem.is_empty());
    }
}
