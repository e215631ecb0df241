use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Urgency given to a fresh draft unless the engine config names another.
pub const DEFAULT_URGENCY: i64 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentType {
    #[default]
    PreIncident,
    MajorIncident,
}

impl IncidentType {
    /// Number of wizard steps for this type. Major incidents add the checklist step.
    pub fn total_steps(self) -> u8 {
        match self {
            IncidentType::PreIncident => 3,
            IncidentType::MajorIncident => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::PreIncident => "PreIncident",
            IncidentType::MajorIncident => "MajorIncident",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PreIncident" => Some(IncidentType::PreIncident),
            "MajorIncident" => Some(IncidentType::MajorIncident),
            _ => None,
        }
    }
}

/// Priority tier. `P1` is the most severe; ordering follows severity (`P1 < P4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
            Priority::P4 => "P4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "P1" => Some(Priority::P1),
            "P2" => Some(Priority::P2),
            "P3" => Some(Priority::P3),
            "P4" => Some(Priority::P4),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    #[default]
    New,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::New => "New",
            IncidentStatus::InProgress => "InProgress",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Closed => "Closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "New" => Some(IncidentStatus::New),
            "InProgress" => Some(IncidentStatus::InProgress),
            "Resolved" => Some(IncidentStatus::Resolved),
            "Closed" => Some(IncidentStatus::Closed),
            _ => None,
        }
    }
}

/// Channel the incident was first reported through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentSource {
    Phone,
    Email,
    Monitoring,
    #[default]
    ServiceDesk,
    Other,
}

impl IncidentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentSource::Phone => "Phone",
            IncidentSource::Email => "Email",
            IncidentSource::Monitoring => "Monitoring",
            IncidentSource::ServiceDesk => "ServiceDesk",
            IncidentSource::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Phone" => Some(IncidentSource::Phone),
            "Email" => Some(IncidentSource::Email),
            "Monitoring" => Some(IncidentSource::Monitoring),
            "ServiceDesk" => Some(IncidentSource::ServiceDesk),
            "Other" => Some(IncidentSource::Other),
            _ => None,
        }
    }
}

/// Whether the incident is generating multiple calls to the service desk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultipleCalls {
    #[default]
    Unknown,
    Yes,
    No,
}

impl MultipleCalls {
    pub fn as_str(self) -> &'static str {
        match self {
            MultipleCalls::Unknown => "Unknown",
            MultipleCalls::Yes => "Yes",
            MultipleCalls::No => "No",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unknown" => Some(MultipleCalls::Unknown),
            "Yes" => Some(MultipleCalls::Yes),
            "No" => Some(MultipleCalls::No),
            _ => None,
        }
    }
}

/// A manually chosen priority that supersedes the computed tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityOverride {
    pub priority: Priority,
    pub justification: String,
}

impl PriorityOverride {
    pub fn new(priority: Priority, justification: impl Into<String>) -> Self {
        Self {
            priority,
            justification: justification.into(),
        }
    }
}

/// Identifies a draft field in validation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DraftField {
    IncidentType,
    ImpactedUsers,
    Urgency,
    ApplicationAffected,
    LocationsAffected,
    IncidentNumber,
    Title,
    Description,
    StartTime,
    ReportedTime,
    Priority,
    PriorityJustification,
    Status,
    BusinessImpact,
    Workaround,
}

impl DraftField {
    pub fn as_str(self) -> &'static str {
        match self {
            DraftField::IncidentType => "IncidentType",
            DraftField::ImpactedUsers => "ImpactedUsers",
            DraftField::Urgency => "Urgency",
            DraftField::ApplicationAffected => "ApplicationAffected",
            DraftField::LocationsAffected => "LocationsAffected",
            DraftField::IncidentNumber => "IncidentNumber",
            DraftField::Title => "Title",
            DraftField::Description => "Description",
            DraftField::StartTime => "StartTime",
            DraftField::ReportedTime => "ReportedTime",
            DraftField::Priority => "Priority",
            DraftField::PriorityJustification => "PriorityJustification",
            DraftField::Status => "Status",
            DraftField::BusinessImpact => "BusinessImpact",
            DraftField::Workaround => "Workaround",
        }
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated rule: which field, a stable code, and a message fit for the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: DraftField,
    pub code: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: DraftField, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A non-empty set of violations returned instead of persisting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationFailure {
    pub violations: Vec<FieldViolation>,
}

impl ValidationFailure {
    pub fn new(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Distinct violated fields, in first-seen order.
    pub fn fields(&self) -> Vec<DraftField> {
        let mut out: Vec<DraftField> = Vec::new();
        for v in &self.violations {
            if !out.contains(&v.field) {
                out.push(v.field);
            }
        }
        out
    }

    pub fn names(&self, field: DraftField) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .fields()
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} violation(s) on [{names}]", self.violations.len())
    }
}

/// In-progress incident form. Mutated field by field through the wizard and consumed once
/// by submission.
///
/// Numeric and timestamp inputs are `Option` so that "not entered" is distinguishable from
/// a value; out-of-range values are representable and reported by the validators rather than
/// rejected at assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentDraft {
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    /// Final priority projection for display. Written by `IncidentWizard::recompute`;
    /// submission recomputes the tier, so pin a value with `priority_override` instead.
    pub priority: Option<Priority>,
    pub priority_override: Option<PriorityOverride>,
    pub status: Option<IncidentStatus>,
    pub business_impact: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reported_time: Option<OffsetDateTime>,
    pub impacted_users: Option<i64>,
    pub application_affected: String,
    pub locations_affected: String,
    pub workaround: Option<String>,
    pub incident_number: String,
    pub urgency: Option<i64>,
    pub current_step: u8,
    pub source: IncidentSource,
    pub generating_multiple_calls: MultipleCalls,
}

impl IncidentDraft {
    /// Fresh draft: pre-incident, P3, New, default urgency, both timestamps at `now`, step 1.
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            incident_type: IncidentType::PreIncident,
            priority: Some(Priority::P3),
            priority_override: None,
            status: Some(IncidentStatus::New),
            business_impact: String::new(),
            start_time: Some(now),
            reported_time: Some(now),
            impacted_users: None,
            application_affected: String::new(),
            locations_affected: String::new(),
            workaround: None,
            incident_number: String::new(),
            urgency: Some(DEFAULT_URGENCY),
            current_step: 1,
            source: IncidentSource::default(),
            generating_multiple_calls: MultipleCalls::default(),
        }
    }

    pub fn total_steps(&self) -> u8 {
        self.incident_type.total_steps()
    }
}

/// Entity shape handed to the persistence collaborator: the draft's business fields after
/// validation, plus the creation timestamp and a dedupe fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewIncident {
    pub fingerprint: String,
    pub incident_number: String,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub priority: Priority,
    pub priority_justification: Option<String>,
    pub status: IncidentStatus,
    pub business_impact: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub reported_time: OffsetDateTime,
    pub impacted_users: i64,
    pub application_affected: String,
    pub locations_affected: String,
    pub workaround: Option<String>,
    pub urgency: i64,
    pub source: IncidentSource,
    pub generating_multiple_calls: MultipleCalls,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A stored incident, owned by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedIncident {
    pub id: i64,
    #[serde(flatten)]
    pub incident: NewIncident,
}
