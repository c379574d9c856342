// Markdown postmortem template rendered from an incident record.

use crate::incident::{format_timestamp, Incident};

const TRAILING_SECTIONS: &str = "
## Root Cause Analysis
<!-- Add root cause here -->

## Impact
<!-- Describe impact here -->

## Action Items
<!-- List action items here -->

## Lessons Learned
<!-- Add lessons learned here -->
";

/// Render the postmortem skeleton for `incident`: a summary block, the full
/// timeline, and empty analysis sections for the responders to fill in.
pub fn render(incident: &Incident) -> String {
    let resolved = incident
        .resolved_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "None".to_string());

    let mut out = String::from("# Incident Postmortem\n\n## Summary\n");
    out.push_str(&format!("- **Title:** {}\n", incident.title));
    out.push_str(&format!("- **Severity:** {}\n", incident.severity));
    out.push_str(&format!("- **Assignee:** {}\n", incident.assignee));
    out.push_str(&format!(
        "- **Duration:** {} to {}\n\n",
        format_timestamp(&incident.created_at),
        resolved
    ));

    out.push_str("## Timeline\n");
    for event in &incident.timeline {
        out.push_str(&format!(
            "- **{}** ({}): {}\n",
            format_timestamp(&event.timestamp),
            event.author,
            event.event
        ));
    }

    out.push_str(TRAILING_SECTIONS);
    out
}
