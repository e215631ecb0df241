use std::fs;
use std::path::Path;

use rusqlite::Connection;

use crate::domain::PersistedIncident;
use crate::error::AppError;
use crate::normalize::timestamps::format_rfc3339;
use crate::repo;

const HEADERS: [&str; 19] = [
    "Id",
    "IncidentNumber",
    "Title",
    "IncidentType",
    "Priority",
    "PriorityJustification",
    "Status",
    "Urgency",
    "ImpactedUsers",
    "ApplicationAffected",
    "LocationsAffected",
    "BusinessImpact",
    "Workaround",
    "StartTs",
    "ReportedTs",
    "Source",
    "GeneratingMultipleCalls",
    "CreatedAt",
    "Fingerprint",
];

fn csv_err(e: impl std::fmt::Display) -> AppError {
    AppError::new("EXPORT_CSV_FAILED", "Failed to write incident register CSV")
        .with_details(e.to_string())
}

/// Render the incident register as CSV, one row per incident, in the given order.
///
/// Descriptions are left out; the register is a summary view.
pub fn incidents_to_csv(incidents: &[PersistedIncident]) -> Result<String, AppError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADERS).map_err(csv_err)?;

    for p in incidents {
        let inc = &p.incident;
        let id = p.id.to_string();
        let urgency = inc.urgency.to_string();
        let users = inc.impacted_users.to_string();
        let start = format_rfc3339(inc.start_time).unwrap_or_default();
        let reported = format_rfc3339(inc.reported_time).unwrap_or_default();
        let created = format_rfc3339(inc.created_at).unwrap_or_default();
        wtr.write_record([
            id.as_str(),
            inc.incident_number.as_str(),
            inc.title.as_str(),
            inc.incident_type.as_str(),
            inc.priority.as_str(),
            inc.priority_justification.as_deref().unwrap_or(""),
            inc.status.as_str(),
            urgency.as_str(),
            users.as_str(),
            inc.application_affected.as_str(),
            inc.locations_affected.as_str(),
            inc.business_impact.as_deref().unwrap_or(""),
            inc.workaround.as_deref().unwrap_or(""),
            start.as_str(),
            reported.as_str(),
            inc.source.as_str(),
            inc.generating_multiple_calls.as_str(),
            created.as_str(),
            inc.fingerprint.as_str(),
        ])
        .map_err(csv_err)?;
    }

    let bytes = wtr.into_inner().map_err(csv_err)?;
    String::from_utf8(bytes).map_err(csv_err)
}

/// Write every stored incident to `dest` as CSV. Returns the number of rows written.
pub fn write_incidents_csv(conn: &Connection, dest: &Path) -> Result<usize, AppError> {
    let incidents = repo::list_incidents(conn)?;
    let text = incidents_to_csv(&incidents)?;
    fs::write(dest, text).map_err(|e| {
        AppError::new("EXPORT_WRITE_FAILED", "Failed to write incident register")
            .with_details(format!("path={}: {}", dest.display(), e))
    })?;
    tracing::info!(rows = incidents.len(), path = %dest.display(), "exported incident register");
    Ok(incidents.len())
}
