// CSV export of incident records.

use std::io::Write;

use anyhow::{Context, Result};

use crate::incident::{format_timestamp, Incident};

const HEADER: [&str; 10] = [
    "id",
    "title",
    "severity",
    "status",
    "assignee",
    "services",
    "created_at",
    "resolved_at",
    "minutes_to_resolve",
    "timeline_events",
];

/// Write one CSV row per incident. Services are joined with `;`; the
/// resolution columns are left empty for unresolved incidents.
pub fn write_csv<W: Write>(incidents: &[Incident], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER).context("failed to write CSV header")?;

    for inc in incidents {
        let resolved_at = inc
            .resolved_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_default();
        let minutes = inc
            .minutes_to_resolve()
            .map(|m| format!("{m:.2}"))
            .unwrap_or_default();

        wtr.write_record([
            inc.id.as_str(),
            inc.title.as_str(),
            inc.severity.as_str(),
            inc.status.as_str(),
            inc.assignee.as_str(),
            inc.services.join(";").as_str(),
            format_timestamp(&inc.created_at).as_str(),
            resolved_at.as_str(),
            minutes.as_str(),
            inc.timeline.len().to_string().as_str(),
        ])
        .with_context(|| format!("failed to write CSV row for incident {}", inc.id))?;
    }

    wtr.flush().context("failed to flush CSV output")?;
    Ok(())
}
