// Incident, alert, and timeline types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IncidentError {
    #[error("invalid severity `{0}` (expected P1, P2, P3 or P4)")]
    InvalidSeverity(String),

    #[error("invalid status `{0}` (expected new, investigating, identified, monitoring or resolved)")]
    InvalidStatus(String),
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Incident priority. P1 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    P1,
    P2,
    P3,
    P4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::P1 => "P1",
            Severity::P2 => "P2",
            Severity::P3 => "P3",
            Severity::P4 => "P4",
        }
    }
}

impl FromStr for Severity {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "P1" => Ok(Severity::P1),
            "P2" => Ok(Severity::P2),
            "P3" => Ok(Severity::P3),
            "P4" => Ok(Severity::P4),
            _ => Err(IncidentError::InvalidSeverity(s.to_string())),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle stage of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    New,
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Investigating => "investigating",
            Status::Identified => "identified",
            Status::Monitoring => "monitoring",
            Status::Resolved => "resolved",
        }
    }

    /// Every status except `resolved` counts as active.
    pub fn is_active(&self) -> bool {
        !matches!(self, Status::Resolved)
    }
}

impl FromStr for Status {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Status::New),
            "investigating" => Ok(Status::Investigating),
            "identified" => Ok(Status::Identified),
            "monitoring" => Ok(Status::Monitoring),
            "resolved" => Ok(Status::Resolved),
            _ => Err(IncidentError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single timestamped note on an incident's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Short random identifier (8 hex characters).
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub status: Status,
    pub assignee: String,
    /// Names of the affected services, in the order given at creation.
    pub services: Vec<String>,
    pub timeline: Vec<TimelineEvent>,
    pub created_at: DateTime<Utc>,
    /// Set when, and only when, `status` is `Resolved`.
    pub resolved_at: Option<DateTime<Utc>>,
    pub postmortem: String,
}

impl Incident {
    /// Build a freshly opened incident: status `new`, empty timeline.
    pub fn open(
        title: impl Into<String>,
        severity: Severity,
        assignee: impl Into<String>,
        services: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            severity,
            status: Status::New,
            assignee: assignee.into(),
            services,
            timeline: Vec::new(),
            created_at,
            resolved_at: None,
            postmortem: String::new(),
        }
    }

    /// Minutes between creation and resolution, if resolved.
    pub fn minutes_to_resolve(&self) -> Option<f64> {
        self.resolved_at
            .map(|end| (end - self.created_at).num_milliseconds() as f64 / 60_000.0)
    }
}

/// A monitoring alert, optionally linked to the incident it opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub source: String,
    pub message: String,
    pub severity: Severity,
    pub fired_at: DateTime<Utc>,
    pub incident_id: Option<String>,
}

/// Generate a short identifier from the first 8 hex digits of a UUIDv4.
pub fn new_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Canonical on-disk timestamp format: RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp written by [`format_timestamp`] (or any RFC 3339 string).
///
/// Offset-less ISO 8601 values (`2026-03-02T10:00:00.123456`), as found in
/// databases written by earlier tooling, are read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()),
    }
}

/// Serde adapter that stores timestamps in the canonical on-disk format.
mod timestamp_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
