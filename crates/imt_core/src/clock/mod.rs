use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::AppError;

/// Source of "now" for validation and creation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// Configured regional zone used to reinterpret wall-clock input.
///
/// Only a fixed UTC offset is carried; `id` is the configured label (e.g. `Europe/London`)
/// and is kept for display and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionalZone {
    id: String,
    offset: UtcOffset,
}

impl RegionalZone {
    pub fn new(id: impl Into<String>, offset: UtcOffset) -> Self {
        Self {
            id: id.into(),
            offset,
        }
    }

    pub fn utc() -> Self {
        Self::new("UTC", UtcOffset::UTC)
    }

    /// Parse `"+HH:MM"`, `"-HH:MM"`, `"Z"` or `"UTC"`.
    pub fn parse(id: &str, offset: &str) -> Result<Self, AppError> {
        let trimmed = offset.trim();
        let parsed = match trimmed {
            "Z" | "UTC" | "" => UtcOffset::UTC,
            other => UtcOffset::parse(
                other,
                format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
            )
            .map_err(|e| {
                AppError::new("CONFIG_INVALID", "Invalid regional zone offset")
                    .with_details(format!("zone={id}; offset={other}; err={e}"))
            })?,
        };
        Ok(Self::new(id, parsed))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Keep the date and time-of-day components and attach this zone's offset, discarding
    /// whatever offset the input carried.
    pub fn reinterpret(&self, ts: OffsetDateTime) -> OffsetDateTime {
        ts.replace_offset(self.offset)
    }
}

impl Default for RegionalZone {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn reinterpret_keeps_wall_clock_components() {
        let zone = RegionalZone::new("Asia/Singapore", offset!(+8));
        let captured = datetime!(2026-03-01 09:30 UTC);
        let got = zone.reinterpret(captured);
        assert_eq!(got, datetime!(2026-03-01 09:30 +8));
        assert_eq!(got.hour(), 9);
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(
            RegionalZone::parse("x", "+05:30").unwrap().offset(),
            offset!(+5:30)
        );
        assert_eq!(
            RegionalZone::parse("x", "-03:00").unwrap().offset(),
            offset!(-3)
        );
        assert_eq!(RegionalZone::parse("UTC", "Z").unwrap().offset(), UtcOffset::UTC);
        assert!(RegionalZone::parse("x", "8").is_err());
    }
}
