use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::domain::{
    DraftField, FieldViolation, IncidentDraft, NewIncident, PersistedIncident, ValidationFailure,
};
use crate::error::SubmitError;
use crate::normalize::timestamps::format_rfc3339;
use crate::priority::{self, PriorityError};
use crate::store::IncidentStore;
use crate::validate::{validate_all, ValidationContext};

/// Caller side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observed by an in-flight submission. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. If the handle is dropped without cancelling,
    /// this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn normalize_for_fingerprint(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable dedupe key over normalized incident number, title and start time. Saving the same
/// draft twice yields the same fingerprint, which lets stores make retries idempotent.
///
/// Start times RFC3339 cannot express (offsets with seconds, out-of-range years) are keyed by
/// their Unix nanosecond instant instead.
pub fn fingerprint(incident_number: &str, title: &str, start_time: OffsetDateTime) -> String {
    let start = format_rfc3339(start_time)
        .unwrap_or_else(|| format!("unix_ns:{}", start_time.unix_timestamp_nanos()));
    let payload = format!(
        "number={}|title={}|start={start}",
        normalize_for_fingerprint(incident_number),
        normalize_for_fingerprint(title),
    );
    hex::encode(Sha256::digest(payload.as_bytes()))
}

fn missing(field: DraftField) -> FieldViolation {
    FieldViolation::new(
        field,
        "VALIDATION_REQUIRED",
        format!("{field} is required"),
    )
}

/// Copy a validated draft onto the persisted-entity shape.
///
/// The stored priority is the matrix tier for the draft's urgency and impacted users, or the
/// override when one is set; whatever projection `draft.priority` holds is not trusted.
/// Timestamps pass through the context's normalization so that stored values match what
/// validation compared. Required values that are absent come back as a `ValidationFailure`
/// rather than a panic.
pub fn map_draft(
    draft: &IncidentDraft,
    ctx: &ValidationContext,
    created_at: OffsetDateTime,
) -> Result<NewIncident, ValidationFailure> {
    let mut violations = Vec::new();
    let start_time = draft.start_time.map(|t| ctx.normalize(t));
    let reported_time = draft.reported_time.map(|t| ctx.normalize(t));

    if draft.status.is_none() {
        violations.push(missing(DraftField::Status));
    }
    if start_time.is_none() {
        violations.push(missing(DraftField::StartTime));
    }
    if reported_time.is_none() {
        violations.push(missing(DraftField::ReportedTime));
    }
    if draft.impacted_users.is_none() {
        violations.push(missing(DraftField::ImpactedUsers));
    }
    if draft.urgency.is_none() {
        violations.push(missing(DraftField::Urgency));
    }

    let priority = match (draft.urgency, draft.impacted_users) {
        (Some(urgency), Some(users)) => {
            match priority::calculate(urgency, users, draft.priority_override.as_ref()) {
                Ok(result) => Some(result.final_priority),
                Err(PriorityError::InvalidInput { field, message }) => {
                    violations.push(FieldViolation::new(
                        field,
                        "VALIDATION_OUT_OF_RANGE",
                        message,
                    ));
                    None
                }
            }
        }
        _ => None,
    };

    let (
        Some(priority),
        Some(status),
        Some(start_time),
        Some(reported_time),
        Some(impacted_users),
        Some(urgency),
    ) = (
        priority,
        draft.status,
        start_time,
        reported_time,
        draft.impacted_users,
        draft.urgency,
    )
    else {
        return Err(ValidationFailure::new(violations));
    };

    let business_impact = Some(draft.business_impact.clone()).filter(|s| !s.trim().is_empty());

    Ok(NewIncident {
        fingerprint: fingerprint(&draft.incident_number, &draft.title, start_time),
        incident_number: draft.incident_number.clone(),
        title: draft.title.clone(),
        description: draft.description.clone(),
        incident_type: draft.incident_type,
        priority,
        priority_justification: draft
            .priority_override
            .as_ref()
            .map(|o| o.justification.clone()),
        status,
        business_impact,
        start_time,
        reported_time,
        impacted_users,
        application_affected: draft.application_affected.clone(),
        locations_affected: draft.locations_affected.clone(),
        workaround: draft.workaround.clone(),
        urgency,
        source: draft.source,
        generating_multiple_calls: draft.generating_multiple_calls,
        created_at,
    })
}

/// Runs final validation, maps the draft, and hands it to the persistence collaborator.
///
/// Holds no per-draft state; callers must not submit the same draft again until the
/// previous call has returned.
pub struct SubmissionOrchestrator<S> {
    store: S,
    ctx: ValidationContext,
}

impl<S: IncidentStore> SubmissionOrchestrator<S> {
    pub fn new(store: S, ctx: ValidationContext) -> Self {
        Self { store, ctx }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn context(&self) -> &ValidationContext {
        &self.ctx
    }

    /// Validate, map and persist `draft`.
    ///
    /// - Validation failure: nothing is persisted and the draft is untouched.
    /// - Cancellation: the pending save is dropped, `SubmitError::Cancelled` is returned and
    ///   the draft is untouched. A store that already committed will dedupe a retry by
    ///   fingerprint.
    /// - Persistence failure: the store's error is returned and the draft is untouched.
    /// - Success: the draft is reset to defaults.
    pub async fn submit(
        &self,
        draft: &mut IncidentDraft,
        cancel: &CancelSignal,
    ) -> Result<PersistedIncident, SubmitError> {
        let report = validate_all(draft, &self.ctx);
        if !report.valid {
            tracing::warn!(
                incident_number = %draft.incident_number,
                violations = report.violations.len(),
                fields = ?report.fields(),
                "submission rejected by validation"
            );
            return Err(SubmitError::Validation(ValidationFailure::new(
                report.violations,
            )));
        }

        let entity = match map_draft(draft, &self.ctx, self.ctx.now()) {
            Ok(entity) => entity,
            Err(failure) => {
                tracing::warn!(
                    incident_number = %draft.incident_number,
                    violations = failure.violations.len(),
                    fields = ?failure.fields(),
                    "submission rejected while mapping draft"
                );
                return Err(SubmitError::Validation(failure));
            }
        };

        if cancel.is_cancelled() {
            tracing::warn!(incident_number = %entity.incident_number, "submission cancelled before save");
            return Err(SubmitError::Cancelled);
        }

        let incident_number = entity.incident_number.clone();
        let saved = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(incident_number = %incident_number, "submission cancelled during save");
                return Err(SubmitError::Cancelled);
            }
            saved = self.store.save(entity) => saved,
        };

        match saved {
            Ok(persisted) => {
                tracing::info!(
                    id = persisted.id,
                    incident_number = %persisted.incident.incident_number,
                    incident_type = persisted.incident.incident_type.as_str(),
                    priority = persisted.incident.priority.as_str(),
                    "incident submitted"
                );
                *draft = self.ctx.new_draft();
                Ok(persisted)
            }
            Err(e) => {
                tracing::warn!(
                    incident_number = %incident_number,
                    code = %e.code,
                    "failed to persist incident"
                );
                Err(SubmitError::Persistence(e))
            }
        }
    }
}
