use time::format_description::well_known::Rfc3339;
use time::{format_description, OffsetDateTime, PrimitiveDateTime};

use crate::clock::RegionalZone;
use crate::domain::{DraftField, FieldViolation};

/// Zone-less formats accepted from date/time inputs. Deterministic allowlist only.
const WALL_CLOCK_FORMATS: [&str; 6] = [
    "[year]-[month]-[day] [hour]:[minute]:[second]",
    "[year]-[month]-[day] [hour]:[minute]",
    "[year]-[month]-[day]T[hour]:[minute]:[second]",
    "[year]-[month]-[day]T[hour]:[minute]",
    "[day]/[month]/[year] [hour]:[minute]",
    "[day]/[month]/[year] [hour]:[minute]:[second]",
];

fn parse_wall_clock(raw: &str) -> Option<PrimitiveDateTime> {
    WALL_CLOCK_FORMATS.iter().find_map(|fmt| {
        let items = format_description::parse(fmt).ok()?;
        PrimitiveDateTime::parse(raw, &items).ok()
    })
}

/// Parse a timestamp typed or picked in the UI.
///
/// Contract:
/// - blank input means "not entered" and yields `Ok(None)`;
/// - RFC3339 input keeps its explicit offset;
/// - allow-listed wall-clock input (no offset) is interpreted in `zone`;
/// - anything else is a `VALIDATION_TS_UNPARSEABLE` violation against `field`.
pub fn parse_ui_timestamp(
    field: DraftField,
    raw: &str,
    zone: &RegionalZone,
) -> Result<Option<OffsetDateTime>, FieldViolation> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(Some(dt));
    }

    if let Some(pdt) = parse_wall_clock(trimmed) {
        return Ok(Some(pdt.assume_offset(zone.offset())));
    }

    Err(FieldViolation::new(
        field,
        "VALIDATION_TS_UNPARSEABLE",
        format!("Could not read '{trimmed}' as a date and time"),
    ))
}

/// RFC3339 rendering used for storage and exports.
pub fn format_rfc3339(ts: OffsetDateTime) -> Option<String> {
    ts.format(&Rfc3339).ok()
}
