use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::clock::{Clock, RegionalZone};
use crate::domain::{DraftField, FieldViolation, IncidentDraft, IncidentType, DEFAULT_URGENCY};
use crate::priority::{URGENCY_MAX, URGENCY_MIN};

pub const STEP_TYPE_SELECTION: u8 = 1;
pub const STEP_IMPACT_ASSESSMENT: u8 = 2;
pub const STEP_INCIDENT_DETAILS: u8 = 3;
pub const STEP_MAJOR_CHECKLIST: u8 = 4;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;
pub const MAX_APPLICATION_CHARS: usize = 100;
pub const MAX_LOCATIONS_CHARS: usize = 500;
pub const MAX_BUSINESS_IMPACT_CHARS: usize = 1000;
pub const MAX_WORKAROUND_CHARS: usize = 1000;

/// Default allowance for clock skew between the capturing device and the validator.
pub const DEFAULT_FUTURE_TOLERANCE: Duration = Duration::minutes(5);

/// Everything time-dependent the validators need: the injected clock, the skew tolerance,
/// and the regional zone used for zone-less input and (when enabled) wall-clock
/// reinterpretation of captured timestamps. Also carries the urgency fresh drafts start with.
#[derive(Clone)]
pub struct ValidationContext {
    clock: Arc<dyn Clock>,
    zone: RegionalZone,
    reinterpret: bool,
    future_tolerance: Duration,
    default_urgency: i64,
}

impl ValidationContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            zone: RegionalZone::utc(),
            reinterpret: false,
            future_tolerance: DEFAULT_FUTURE_TOLERANCE,
            default_urgency: DEFAULT_URGENCY,
        }
    }

    pub fn with_regional_zone(mut self, zone: RegionalZone) -> Self {
        self.zone = zone;
        self
    }

    /// Reinterpret every captured timestamp in the regional zone before comparing.
    pub fn with_reinterpretation(mut self, enabled: bool) -> Self {
        self.reinterpret = enabled;
        self
    }

    pub fn with_future_tolerance(mut self, tolerance: Duration) -> Self {
        self.future_tolerance = tolerance;
        self
    }

    /// Urgency for fresh drafts. Callers validate the range; see `EngineConfig::validate`.
    pub fn with_default_urgency(mut self, urgency: i64) -> Self {
        self.default_urgency = urgency;
        self
    }

    pub fn default_urgency(&self) -> i64 {
        self.default_urgency
    }

    /// Fresh draft stamped with this context's clock and default urgency.
    pub fn new_draft(&self) -> IncidentDraft {
        let mut draft = IncidentDraft::new(self.now());
        draft.urgency = Some(self.default_urgency);
        draft
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn regional_zone(&self) -> &RegionalZone {
        &self.zone
    }

    pub fn future_tolerance(&self) -> Duration {
        self.future_tolerance
    }

    /// Captured timestamp as the validators see it.
    pub fn normalize(&self, ts: OffsetDateTime) -> OffsetDateTime {
        if self.reinterpret {
            self.zone.reinterpret(ts)
        } else {
            ts
        }
    }
}

impl std::fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationContext")
            .field("zone", &self.zone)
            .field("reinterpret", &self.reinterpret)
            .field("future_tolerance", &self.future_tolerance)
            .field("default_urgency", &self.default_urgency)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepValidation {
    pub step: u8,
    pub valid: bool,
    pub violations: Vec<FieldViolation>,
}

impl StepValidation {
    fn from_violations(step: u8, violations: Vec<FieldViolation>) -> Self {
        Self {
            step,
            valid: violations.is_empty(),
            violations,
        }
    }

    pub fn fields(&self) -> Vec<DraftField> {
        let mut out: Vec<DraftField> = Vec::new();
        for v in &self.violations {
            if !out.contains(&v.field) {
                out.push(v.field);
            }
        }
        out
    }
}

struct Issue {
    code: &'static str,
    message: String,
}

impl Issue {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

type Check = fn(&IncidentDraft, &ValidationContext) -> Option<Issue>;

/// One enumerated rule: the step it belongs to, the field it reports against, and the check.
struct Rule {
    step: u8,
    field: DraftField,
    check: Check,
}

const STEP_RULES: &[Rule] = &[
    Rule {
        step: STEP_IMPACT_ASSESSMENT,
        field: DraftField::ImpactedUsers,
        check: impacted_users_valid,
    },
    Rule {
        step: STEP_IMPACT_ASSESSMENT,
        field: DraftField::Urgency,
        check: urgency_valid,
    },
    Rule {
        step: STEP_IMPACT_ASSESSMENT,
        field: DraftField::ApplicationAffected,
        check: |d, _| required_text(&d.application_affected, "Affected application"),
    },
    Rule {
        step: STEP_IMPACT_ASSESSMENT,
        field: DraftField::LocationsAffected,
        check: |d, _| required_text(&d.locations_affected, "Affected locations"),
    },
    Rule {
        step: STEP_INCIDENT_DETAILS,
        field: DraftField::IncidentNumber,
        check: |d, _| required_text(&d.incident_number, "Incident number"),
    },
    Rule {
        step: STEP_INCIDENT_DETAILS,
        field: DraftField::Title,
        check: |d, _| required_text(&d.title, "Title"),
    },
    Rule {
        step: STEP_INCIDENT_DETAILS,
        field: DraftField::Description,
        check: |d, _| required_text(&d.description, "Description"),
    },
    Rule {
        step: STEP_INCIDENT_DETAILS,
        field: DraftField::StartTime,
        check: |d, ctx| timestamp_valid(d.start_time, "Start time", ctx),
    },
    Rule {
        step: STEP_INCIDENT_DETAILS,
        field: DraftField::ReportedTime,
        check: |d, ctx| timestamp_valid(d.reported_time, "Reported time", ctx),
    },
    Rule {
        step: STEP_INCIDENT_DETAILS,
        field: DraftField::ReportedTime,
        check: reported_not_before_start,
    },
    Rule {
        step: STEP_MAJOR_CHECKLIST,
        field: DraftField::Priority,
        check: |d, _| {
            d.priority
                .is_none()
                .then(|| Issue::new("VALIDATION_REQUIRED", "Priority is required"))
        },
    },
    Rule {
        step: STEP_MAJOR_CHECKLIST,
        field: DraftField::Status,
        check: |d, _| {
            d.status
                .is_none()
                .then(|| Issue::new("VALIDATION_REQUIRED", "Status is required"))
        },
    },
    Rule {
        step: STEP_MAJOR_CHECKLIST,
        field: DraftField::PriorityJustification,
        check: override_justified,
    },
];

/// Rules checked only when validating the whole form at submission.
struct FormRule {
    field: DraftField,
    check: Check,
}

const FORM_RULES: &[FormRule] = &[
    FormRule {
        field: DraftField::Status,
        check: |d, _| {
            d.status
                .is_none()
                .then(|| Issue::new("VALIDATION_REQUIRED", "Status is required"))
        },
    },
    FormRule {
        field: DraftField::BusinessImpact,
        check: business_impact_for_major,
    },
    FormRule {
        field: DraftField::PriorityJustification,
        check: override_justified,
    },
    FormRule {
        field: DraftField::Title,
        check: |d, _| max_chars(&d.title, MAX_TITLE_CHARS, "Title"),
    },
    FormRule {
        field: DraftField::Description,
        check: |d, _| max_chars(&d.description, MAX_DESCRIPTION_CHARS, "Description"),
    },
    FormRule {
        field: DraftField::ApplicationAffected,
        check: |d, _| {
            max_chars(
                &d.application_affected,
                MAX_APPLICATION_CHARS,
                "Affected application",
            )
        },
    },
    FormRule {
        field: DraftField::LocationsAffected,
        check: |d, _| {
            max_chars(
                &d.locations_affected,
                MAX_LOCATIONS_CHARS,
                "Affected locations",
            )
        },
    },
    FormRule {
        field: DraftField::BusinessImpact,
        check: |d, _| {
            max_chars(
                &d.business_impact,
                MAX_BUSINESS_IMPACT_CHARS,
                "Business impact",
            )
        },
    },
    FormRule {
        field: DraftField::Workaround,
        check: |d, _| {
            max_chars(
                d.workaround.as_deref().unwrap_or(""),
                MAX_WORKAROUND_CHARS,
                "Workaround",
            )
        },
    },
];

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn required_text(value: &str, label: &str) -> Option<Issue> {
    is_blank(value).then(|| Issue::new("VALIDATION_REQUIRED", format!("{label} is required")))
}

fn max_chars(value: &str, max: usize, label: &str) -> Option<Issue> {
    let len = value.chars().count();
    (len > max).then(|| {
        Issue::new(
            "VALIDATION_TOO_LONG",
            format!("{label} must be at most {max} characters (got {len})"),
        )
    })
}

fn impacted_users_valid(d: &IncidentDraft, _: &ValidationContext) -> Option<Issue> {
    match d.impacted_users {
        None => Some(Issue::new(
            "VALIDATION_REQUIRED",
            "Number of impacted users is required",
        )),
        Some(n) if n < 0 => Some(Issue::new(
            "VALIDATION_OUT_OF_RANGE",
            format!("Number of impacted users cannot be negative (got {n})"),
        )),
        Some(_) => None,
    }
}

fn urgency_valid(d: &IncidentDraft, _: &ValidationContext) -> Option<Issue> {
    match d.urgency {
        None => Some(Issue::new("VALIDATION_REQUIRED", "Urgency is required")),
        Some(u) if !(URGENCY_MIN..=URGENCY_MAX).contains(&u) => Some(Issue::new(
            "VALIDATION_OUT_OF_RANGE",
            format!("Urgency must be between {URGENCY_MIN} and {URGENCY_MAX} (got {u})"),
        )),
        Some(_) => None,
    }
}

fn timestamp_valid(
    ts: Option<OffsetDateTime>,
    label: &str,
    ctx: &ValidationContext,
) -> Option<Issue> {
    let Some(ts) = ts else {
        return Some(Issue::new(
            "VALIDATION_REQUIRED",
            format!("{label} is required"),
        ));
    };
    let ts = ctx.normalize(ts);
    let latest = ctx.now() + ctx.future_tolerance();
    (ts > latest).then(|| {
        Issue::new(
            "VALIDATION_TS_IN_FUTURE",
            format!("{label} cannot be in the future"),
        )
    })
}

fn reported_not_before_start(d: &IncidentDraft, ctx: &ValidationContext) -> Option<Issue> {
    let (Some(start), Some(reported)) = (d.start_time, d.reported_time) else {
        return None;
    };
    let (start, reported) = (ctx.normalize(start), ctx.normalize(reported));
    (reported < start).then(|| {
        Issue::new(
            "VALIDATION_TS_ORDER_VIOLATION",
            "Reported time must be at or after start time",
        )
    })
}

fn override_justified(d: &IncidentDraft, _: &ValidationContext) -> Option<Issue> {
    let o = d.priority_override.as_ref()?;
    is_blank(&o.justification).then(|| {
        Issue::new(
            "VALIDATION_REQUIRED",
            format!("A justification is required to override priority to {}", o.priority),
        )
    })
}

fn business_impact_for_major(d: &IncidentDraft, _: &ValidationContext) -> Option<Issue> {
    (d.incident_type == IncidentType::MajorIncident && is_blank(&d.business_impact)).then(|| {
        Issue::new(
            "VALIDATION_REQUIRED",
            "Business impact is required for major incidents",
        )
    })
}

fn push_unique(out: &mut Vec<FieldViolation>, v: FieldViolation) {
    if !out.iter().any(|o| o.field == v.field && o.code == v.code) {
        out.push(v);
    }
}

/// Validate one wizard step against the draft.
///
/// Step 1 has no rules. Steps beyond the draft type's step count (the checklist step for a
/// pre-incident) are trivially valid.
pub fn validate_step(step: u8, draft: &IncidentDraft, ctx: &ValidationContext) -> StepValidation {
    if step > draft.total_steps() {
        return StepValidation::from_violations(step, Vec::new());
    }

    let mut violations = Vec::new();
    for rule in STEP_RULES.iter().filter(|r| r.step == step) {
        if let Some(issue) = (rule.check)(draft, ctx) {
            push_unique(
                &mut violations,
                FieldViolation::new(rule.field, issue.code, issue.message),
            );
        }
    }
    StepValidation::from_violations(step, violations)
}

/// Validate every step for the draft's type regardless of the current position, plus the
/// submission-only rules (status, business impact for major incidents, override
/// justification, length ceilings).
pub fn validate_all(draft: &IncidentDraft, ctx: &ValidationContext) -> StepValidation {
    let mut violations = Vec::new();

    for step in STEP_TYPE_SELECTION..=draft.total_steps() {
        for v in validate_step(step, draft, ctx).violations {
            push_unique(&mut violations, v);
        }
    }

    for rule in FORM_RULES {
        if let Some(issue) = (rule.check)(draft, ctx) {
            push_unique(
                &mut violations,
                FieldViolation::new(rule.field, issue.code, issue.message),
            );
        }
    }

    // Step 0 marks a whole-form result.
    StepValidation::from_violations(0, violations)
}
