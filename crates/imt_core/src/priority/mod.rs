//! Urgency × impact priority matrix.
//!
//! This table is the single source of truth for computed priority. Impact is bucketed from the
//! raw impacted-user count:
//!
//! | urgency \ users | ≤10 | ≤50 | ≤100 | ≤500 | >500 |
//! |-----------------|-----|-----|------|------|------|
//! | 1 (highest)     | P2  | P1  | P1   | P1   | P1   |
//! | 2               | P2  | P2  | P1   | P1   | P1   |
//! | 3               | P3  | P3  | P2   | P2   | P1   |
//! | 4               | P4  | P3  | P3   | P2   | P2   |
//! | 5 (lowest)      | P4  | P4  | P3   | P3   | P2   |
//!
//! Inputs outside the table are rejected with [`PriorityError::InvalidInput`]; there is no
//! fallback tier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DraftField, Priority, PriorityOverride};

pub const URGENCY_MIN: i64 = 1;
pub const URGENCY_MAX: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriorityError {
    #[error("invalid input for {field}: {message}")]
    InvalidInput { field: DraftField, message: String },
}

impl PriorityError {
    fn invalid(field: DraftField, message: impl Into<String>) -> Self {
        PriorityError::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

/// Validated urgency, 1 (highest) through 5 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Urgency(u8);

impl Urgency {
    pub fn new(value: i64) -> Result<Self, PriorityError> {
        if !(URGENCY_MIN..=URGENCY_MAX).contains(&value) {
            return Err(PriorityError::invalid(
                DraftField::Urgency,
                format!("urgency {value} outside {URGENCY_MIN}..={URGENCY_MAX}"),
            ));
        }
        Ok(Self(value as u8))
    }

    /// Coarse labels map onto the numeric scale: High = 1, Medium = 3, Low = 5.
    pub fn from_label(label: &str) -> Result<Self, PriorityError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self(1)),
            "medium" => Ok(Self(3)),
            "low" => Ok(Self(5)),
            other => Err(PriorityError::invalid(
                DraftField::Urgency,
                format!("unknown urgency label '{other}'"),
            )),
        }
    }

    pub fn value(self) -> i64 {
        i64::from(self.0)
    }

    fn row(self) -> usize {
        usize::from(self.0 - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactBucket {
    Minimal,
    Minor,
    Moderate,
    Significant,
    Extensive,
}

/// Inclusive upper bounds for every bucket but the last.
const BUCKET_BREAKPOINTS: [(i64, ImpactBucket); 4] = [
    (10, ImpactBucket::Minimal),
    (50, ImpactBucket::Minor),
    (100, ImpactBucket::Moderate),
    (500, ImpactBucket::Significant),
];

impl ImpactBucket {
    pub fn from_impacted_users(users: i64) -> Result<Self, PriorityError> {
        if users < 0 {
            return Err(PriorityError::invalid(
                DraftField::ImpactedUsers,
                format!("impacted user count {users} is negative"),
            ));
        }
        Ok(BUCKET_BREAKPOINTS
            .iter()
            .find(|(upper, _)| users <= *upper)
            .map(|(_, bucket)| *bucket)
            .unwrap_or(ImpactBucket::Extensive))
    }

    pub fn label(self) -> &'static str {
        match self {
            ImpactBucket::Minimal => "<=10 users",
            ImpactBucket::Minor => "<=50 users",
            ImpactBucket::Moderate => "<=100 users",
            ImpactBucket::Significant => "<=500 users",
            ImpactBucket::Extensive => ">500 users",
        }
    }

    fn column(self) -> usize {
        match self {
            ImpactBucket::Minimal => 0,
            ImpactBucket::Minor => 1,
            ImpactBucket::Moderate => 2,
            ImpactBucket::Significant => 3,
            ImpactBucket::Extensive => 4,
        }
    }
}

use Priority::{P1, P2, P3, P4};

const MATRIX: [[Priority; 5]; 5] = [
    [P2, P1, P1, P1, P1],
    [P2, P2, P1, P1, P1],
    [P3, P3, P2, P2, P1],
    [P4, P3, P3, P2, P2],
    [P4, P4, P3, P3, P2],
];

/// Computed priority together with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityResult {
    pub computed: Priority,
    pub final_priority: Priority,
    pub urgency: Urgency,
    pub impact_bucket: ImpactBucket,
    pub override_priority: Option<Priority>,
    pub justification: Option<String>,
}

impl PriorityResult {
    pub fn is_overridden(&self) -> bool {
        self.override_priority.is_some()
    }
}

/// Table lookup on already-validated inputs.
pub fn lookup(urgency: Urgency, bucket: ImpactBucket) -> Priority {
    MATRIX[urgency.row()][bucket.column()]
}

/// Compute the priority tier for raw draft inputs.
///
/// An override replaces the final tier; the computed tier is kept for audit.
pub fn calculate(
    urgency: i64,
    impacted_users: i64,
    priority_override: Option<&PriorityOverride>,
) -> Result<PriorityResult, PriorityError> {
    let urgency = Urgency::new(urgency)?;
    let impact_bucket = ImpactBucket::from_impacted_users(impacted_users)?;
    let computed = lookup(urgency, impact_bucket);

    Ok(PriorityResult {
        computed,
        final_priority: priority_override.map(|o| o.priority).unwrap_or(computed),
        urgency,
        impact_bucket,
        override_priority: priority_override.map(|o| o.priority),
        justification: priority_override.map(|o| o.justification.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_are_inclusive_upper_bounds() {
        let cases = [
            (0, ImpactBucket::Minimal),
            (10, ImpactBucket::Minimal),
            (11, ImpactBucket::Minor),
            (50, ImpactBucket::Minor),
            (51, ImpactBucket::Moderate),
            (100, ImpactBucket::Moderate),
            (101, ImpactBucket::Significant),
            (500, ImpactBucket::Significant),
            (501, ImpactBucket::Extensive),
            (i64::MAX, ImpactBucket::Extensive),
        ];
        for (users, expected) in cases {
            assert_eq!(
                ImpactBucket::from_impacted_users(users).unwrap(),
                expected,
                "users={users}"
            );
        }
    }

    #[test]
    fn table_is_monotonic_in_both_axes() {
        for row in 0..5 {
            for col in 1..5 {
                assert!(MATRIX[row][col] <= MATRIX[row][col - 1]);
            }
        }
        for col in 0..5 {
            for row in 1..5 {
                assert!(MATRIX[row][col] >= MATRIX[row - 1][col]);
            }
        }
    }
}
