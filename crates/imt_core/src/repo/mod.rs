use rusqlite::{Connection, OptionalExtension, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{
    IncidentSource, IncidentStatus, IncidentType, MultipleCalls, NewIncident, PersistedIncident,
    Priority,
};
use crate::error::AppError;

const SELECT_COLUMNS: &str = r#"
      SELECT
        id, fingerprint, incident_number, title, description, incident_type,
        priority, priority_justification, status, business_impact,
        start_ts, reported_ts, impacted_users, application_affected, locations_affected,
        workaround, urgency, source, generating_multiple_calls, created_at
      FROM incidents
"#;

/// Raw column values; enum and timestamp decoding happens outside the rusqlite closure so
/// that decode failures carry their own error code.
struct IncidentRow {
    id: i64,
    fingerprint: String,
    incident_number: String,
    title: String,
    description: String,
    incident_type: String,
    priority: String,
    priority_justification: Option<String>,
    status: String,
    business_impact: Option<String>,
    start_ts: String,
    reported_ts: String,
    impacted_users: i64,
    application_affected: String,
    locations_affected: String,
    workaround: Option<String>,
    urgency: i64,
    source: String,
    generating_multiple_calls: String,
    created_at: String,
}

impl IncidentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            fingerprint: row.get(1)?,
            incident_number: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            incident_type: row.get(5)?,
            priority: row.get(6)?,
            priority_justification: row.get(7)?,
            status: row.get(8)?,
            business_impact: row.get(9)?,
            start_ts: row.get(10)?,
            reported_ts: row.get(11)?,
            impacted_users: row.get(12)?,
            application_affected: row.get(13)?,
            locations_affected: row.get(14)?,
            workaround: row.get(15)?,
            urgency: row.get(16)?,
            source: row.get(17)?,
            generating_multiple_calls: row.get(18)?,
            created_at: row.get(19)?,
        })
    }

    fn decode(self) -> Result<PersistedIncident, AppError> {
        let id = self.id;
        let bad = |column: &str, value: &str| {
            AppError::new("DB_DECODE_FAILED", format!("Unrecognized {column} value"))
                .with_details(format!("id={id}; value={value}"))
        };

        Ok(PersistedIncident {
            id,
            incident: NewIncident {
                incident_type: IncidentType::parse(&self.incident_type)
                    .ok_or_else(|| bad("incident_type", &self.incident_type))?,
                priority: Priority::parse(&self.priority)
                    .ok_or_else(|| bad("priority", &self.priority))?,
                status: IncidentStatus::parse(&self.status)
                    .ok_or_else(|| bad("status", &self.status))?,
                source: IncidentSource::parse(&self.source)
                    .ok_or_else(|| bad("source", &self.source))?,
                generating_multiple_calls: MultipleCalls::parse(&self.generating_multiple_calls)
                    .ok_or_else(|| {
                        bad("generating_multiple_calls", &self.generating_multiple_calls)
                    })?,
                start_time: parse_ts(id, "start_ts", &self.start_ts)?,
                reported_time: parse_ts(id, "reported_ts", &self.reported_ts)?,
                created_at: parse_ts(id, "created_at", &self.created_at)?,
                fingerprint: self.fingerprint,
                incident_number: self.incident_number,
                title: self.title,
                description: self.description,
                priority_justification: self.priority_justification,
                business_impact: self.business_impact,
                impacted_users: self.impacted_users,
                application_affected: self.application_affected,
                locations_affected: self.locations_affected,
                workaround: self.workaround,
                urgency: self.urgency,
            },
        })
    }
}

fn parse_ts(id: i64, column: &str, value: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        AppError::new("DB_DECODE_FAILED", format!("Failed to parse {column}"))
            .with_details(format!("id={id}; value={value}; err={e}"))
    })
}

fn format_ts(column: &str, ts: OffsetDateTime) -> Result<String, AppError> {
    ts.format(&Rfc3339).map_err(|e| {
        AppError::new("DB_ENCODE_FAILED", format!("Failed to format {column}"))
            .with_details(e.to_string())
    })
}

pub fn list_incidents(conn: &Connection) -> Result<Vec<PersistedIncident>, AppError> {
    let sql = format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC");
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to prepare incidents query")
            .with_details(e.to_string())
    })?;

    let rows = stmt.query_map([], IncidentRow::from_row).map_err(|e| {
        AppError::new("DB_QUERY_FAILED", "Failed to query incidents").with_details(e.to_string())
    })?;

    let mut out = Vec::new();
    for r in rows {
        let row = r.map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to decode incident row")
                .with_details(e.to_string())
        })?;
        out.push(row.decode()?);
    }
    Ok(out)
}

pub fn count_incidents(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to count incidents")
                .with_details(e.to_string())
        })
}

pub fn get_incident(conn: &Connection, id: i64) -> Result<PersistedIncident, AppError> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
    let row = conn
        .query_row(&sql, [id], IncidentRow::from_row)
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query incident").with_details(e.to_string())
        })?
        .ok_or_else(|| {
            AppError::new("DB_NOT_FOUND", "Incident not found").with_details(format!("id={id}"))
        })?;
    row.decode()
}

pub fn find_by_fingerprint(
    conn: &Connection,
    fingerprint: &str,
) -> Result<Option<PersistedIncident>, AppError> {
    let sql = format!("{SELECT_COLUMNS} WHERE fingerprint = ?1");
    conn.query_row(&sql, [fingerprint], IncidentRow::from_row)
        .optional()
        .map_err(|e| {
            AppError::new("DB_QUERY_FAILED", "Failed to query incident by fingerprint")
                .with_details(e.to_string())
        })?
        .map(IncidentRow::decode)
        .transpose()
}

/// True when `stored` and `incoming` differ at most in their creation timestamp.
fn same_business_fields(stored: &NewIncident, incoming: &NewIncident) -> bool {
    let mut candidate = incoming.clone();
    candidate.created_at = stored.created_at;
    *stored == candidate
}

/// Insert an incident, or return the already-stored row when the same incident (same
/// fingerprint and business fields) was saved before.
///
/// A different incident under an existing fingerprint is a `DB_CONFLICT`; the stored row is
/// never silently returned in its place.
pub fn insert_incident(
    conn: &mut Connection,
    incident: &NewIncident,
) -> Result<PersistedIncident, AppError> {
    let tx = conn.transaction().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to start incident transaction")
            .with_details(e.to_string())
    })?;

    if let Some(existing) = find_by_fingerprint(&tx, &incident.fingerprint)? {
        if !same_business_fields(&existing.incident, incident) {
            tracing::warn!(
                id = existing.id,
                fingerprint = %incident.fingerprint,
                "fingerprint already stored with different incident fields"
            );
            return Err(AppError::new(
                "DB_CONFLICT",
                "An incident with the same number, title and start time is already stored with different details",
            )
            .with_details(format!(
                "id={}; incident_number={}",
                existing.id, existing.incident.incident_number
            )));
        }
        tracing::debug!(
            id = existing.id,
            fingerprint = %incident.fingerprint,
            "incident already stored; returning existing row"
        );
        return Ok(existing);
    }

    tx.execute(
        r#"
      INSERT INTO incidents(
        fingerprint, incident_number, title, description, incident_type,
        priority, priority_justification, status, business_impact,
        start_ts, reported_ts, impacted_users, application_affected, locations_affected,
        workaround, urgency, source, generating_multiple_calls, created_at
      ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
      "#,
        rusqlite::params![
            incident.fingerprint,
            incident.incident_number,
            incident.title,
            incident.description,
            incident.incident_type.as_str(),
            incident.priority.as_str(),
            incident.priority_justification,
            incident.status.as_str(),
            incident.business_impact,
            format_ts("start_ts", incident.start_time)?,
            format_ts("reported_ts", incident.reported_time)?,
            incident.impacted_users,
            incident.application_affected,
            incident.locations_affected,
            incident.workaround,
            incident.urgency,
            incident.source.as_str(),
            incident.generating_multiple_calls.as_str(),
            format_ts("created_at", incident.created_at)?,
        ],
    )
    .map_err(|e| {
        AppError::new("DB_WRITE_FAILED", "Failed to insert incident").with_details(e.to_string())
    })?;

    let id = tx.last_insert_rowid();
    tx.commit().map_err(|e| {
        AppError::new("DB_TX_FAILED", "Failed to commit incident transaction")
            .with_details(e.to_string())
    })?;

    Ok(PersistedIncident {
        id,
        incident: incident.clone(),
    })
}
