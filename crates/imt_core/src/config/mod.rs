use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::clock::{Clock, RegionalZone};
use crate::domain::DEFAULT_URGENCY;
use crate::error::AppError;
use crate::priority::{URGENCY_MAX, URGENCY_MIN};
use crate::validate::{ValidationContext, DEFAULT_FUTURE_TOLERANCE};

/// Engine settings, typically stored as JSON next to the workspace database.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Label of the regional zone, e.g. `"Europe/London"`.
    pub zone_id: String,
    /// Fixed offset of the regional zone as `"+HH:MM"` / `"-HH:MM"` / `"Z"`.
    pub zone_offset: String,
    /// Reinterpret captured timestamps' wall-clock components in the regional zone before
    /// comparing them. Only needed when the capturing control attaches a wrong offset.
    pub reinterpret_timestamps: bool,
    /// How far into the future a start/reported time may be before it is rejected.
    pub future_tolerance_secs: i64,
    /// Urgency a fresh draft starts with, 1 (highest) through 5.
    pub default_urgency: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zone_id: "UTC".to_string(),
            zone_offset: "Z".to_string(),
            reinterpret_timestamps: false,
            future_tolerance_secs: DEFAULT_FUTURE_TOLERANCE.whole_seconds(),
            default_urgency: DEFAULT_URGENCY,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| AppError::wrap("CONFIG_PARSE_FAILED", "Failed to parse engine config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_READ_FAILED", "Failed to read engine config")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), zone = %config.zone_id, "loaded engine config");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::wrap("CONFIG_ENCODE_FAILED", "Failed to encode engine config", e))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.zone_id.trim().is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "zone_id must not be empty",
            ));
        }
        if self.future_tolerance_secs < 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "future_tolerance_secs must not be negative",
            )
            .with_details(format!("value={}", self.future_tolerance_secs)));
        }
        if !(URGENCY_MIN..=URGENCY_MAX).contains(&self.default_urgency) {
            return Err(AppError::new(
                "CONFIG_INVALID",
                format!("default_urgency must be between {URGENCY_MIN} and {URGENCY_MAX}"),
            )
            .with_details(format!("value={}", self.default_urgency)));
        }
        self.regional_zone().map(|_| ())
    }

    pub fn regional_zone(&self) -> Result<RegionalZone, AppError> {
        RegionalZone::parse(&self.zone_id, &self.zone_offset)
    }

    pub fn future_tolerance(&self) -> Duration {
        Duration::seconds(self.future_tolerance_secs)
    }

    /// Build the validation context this configuration describes around `clock`.
    pub fn validation_context(&self, clock: Arc<dyn Clock>) -> Result<ValidationContext, AppError> {
        self.validate()?;
        Ok(ValidationContext::new(clock)
            .with_regional_zone(self.regional_zone()?)
            .with_reinterpretation(self.reinterpret_timestamps)
            .with_future_tolerance(self.future_tolerance())
            .with_default_urgency(self.default_urgency))
    }
}
