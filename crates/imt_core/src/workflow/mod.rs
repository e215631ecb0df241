use serde::{Deserialize, Serialize};

use crate::domain::{DraftField, FieldViolation, IncidentDraft, IncidentType, PersistedIncident};
use crate::error::SubmitError;
use crate::normalize::timestamps::parse_ui_timestamp;
use crate::priority::{self, PriorityError, PriorityResult};
use crate::store::IncidentStore;
use crate::submit::{CancelSignal, SubmissionOrchestrator};
use crate::validate::{validate_step, ValidationContext};

pub fn total_steps(incident_type: IncidentType) -> u8 {
    incident_type.total_steps()
}

/// Clamp a step into `1..=total_steps(incident_type)`. Positions past the end land on the
/// final step.
pub fn clamp_step(step: u8, incident_type: IncidentType) -> u8 {
    step.clamp(1, total_steps(incident_type))
}

/// Derived view of the wizard position. Recomputed from the draft on every read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowState {
    pub current_step: u8,
    pub total_steps: u8,
    pub current_step_valid: bool,
    pub violations: Vec<FieldViolation>,
    /// On the final step the UI offers "submit" instead of "next".
    pub is_final_step: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { from: u8, to: u8 },
    /// The current step failed validation; nothing changed.
    Blocked { step: u8, violations: Vec<FieldViolation> },
    /// Already on the final step; submission is the next action.
    AtFinalStep,
}

/// Everything a view binds to after a batch of edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSnapshot {
    pub state: WorkflowState,
    pub priority: Result<PriorityResult, PriorityError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Start,
    Reported,
}

impl TimestampField {
    fn draft_field(self) -> DraftField {
        match self {
            TimestampField::Start => DraftField::StartTime,
            TimestampField::Reported => DraftField::ReportedTime,
        }
    }
}

/// One wizard session over one draft.
///
/// The session only moves the step counter; business fields change through [`edit`],
/// [`set_incident_type`], [`set_timestamp_text`], and the priority projection written by
/// [`recompute`].
///
/// [`edit`]: IncidentWizard::edit
/// [`set_incident_type`]: IncidentWizard::set_incident_type
/// [`set_timestamp_text`]: IncidentWizard::set_timestamp_text
/// [`recompute`]: IncidentWizard::recompute
#[derive(Debug, Clone)]
pub struct IncidentWizard {
    draft: IncidentDraft,
    ctx: ValidationContext,
}

impl IncidentWizard {
    /// Start a session on a fresh default draft.
    pub fn new(ctx: ValidationContext) -> Self {
        let draft = ctx.new_draft();
        Self { draft, ctx }
    }

    /// Resume a session on an existing draft; an out-of-range step is clamped.
    pub fn resume(mut draft: IncidentDraft, ctx: ValidationContext) -> Self {
        draft.current_step = clamp_step(draft.current_step, draft.incident_type);
        Self { draft, ctx }
    }

    pub fn draft(&self) -> &IncidentDraft {
        &self.draft
    }

    pub fn into_draft(self) -> IncidentDraft {
        self.draft
    }

    pub fn context(&self) -> &ValidationContext {
        &self.ctx
    }

    pub fn current_step(&self) -> u8 {
        self.draft.current_step
    }

    pub fn total_steps(&self) -> u8 {
        total_steps(self.draft.incident_type)
    }

    pub fn state(&self) -> WorkflowState {
        let step = self.draft.current_step;
        let validation = validate_step(step, &self.draft, &self.ctx);
        WorkflowState {
            current_step: step,
            total_steps: self.total_steps(),
            current_step_valid: validation.valid,
            violations: validation.violations,
            is_final_step: step == self.total_steps(),
        }
    }

    /// Apply a batch of field mutations, then re-clamp the step for the (possibly changed)
    /// incident type.
    pub fn edit<F>(&mut self, mutate: F) -> WorkflowState
    where
        F: FnOnce(&mut IncidentDraft),
    {
        let before = self.draft.incident_type;
        mutate(&mut self.draft);
        if self.draft.incident_type != before {
            tracing::debug!(
                from = before.as_str(),
                to = self.draft.incident_type.as_str(),
                "incident type changed during edit"
            );
        }
        self.clamp();
        self.state()
    }

    /// Switch incident type. When the new type has fewer steps and the session is past its
    /// end, the session moves to the new final step.
    pub fn set_incident_type(&mut self, incident_type: IncidentType) -> WorkflowState {
        self.edit(|draft| draft.incident_type = incident_type)
    }

    /// Parse raw date/time text for a timestamp field and store it.
    ///
    /// Unparseable text leaves the field untouched and returns the violation.
    pub fn set_timestamp_text(
        &mut self,
        field: TimestampField,
        raw: &str,
    ) -> Result<WorkflowState, FieldViolation> {
        let parsed = parse_ui_timestamp(field.draft_field(), raw, self.ctx.regional_zone())?;
        Ok(self.edit(|draft| match field {
            TimestampField::Start => draft.start_time = parsed,
            TimestampField::Reported => draft.reported_time = parsed,
        }))
    }

    pub fn advance(&mut self) -> AdvanceOutcome {
        let from = self.draft.current_step;
        let validation = validate_step(from, &self.draft, &self.ctx);
        if !validation.valid {
            tracing::debug!(
                step = from,
                violations = validation.violations.len(),
                "advance blocked"
            );
            return AdvanceOutcome::Blocked {
                step: from,
                violations: validation.violations,
            };
        }

        let total = self.total_steps();
        if from >= total {
            return AdvanceOutcome::AtFinalStep;
        }

        let to = from + 1;
        self.draft.current_step = to;
        tracing::debug!(from, to, total, "advanced wizard step");
        AdvanceOutcome::Advanced { from, to }
    }

    /// Step back without validation. Returns the new step; never goes below 1.
    pub fn retreat(&mut self) -> u8 {
        let from = self.draft.current_step;
        let to = from.saturating_sub(1).max(1);
        self.draft.current_step = to;
        if to != from {
            tracing::debug!(from, to, "retreated wizard step");
        }
        to
    }

    /// Priority computed from the draft's current urgency, impacted users and override.
    pub fn priority(&self) -> Result<PriorityResult, PriorityError> {
        let urgency = self.draft.urgency.ok_or_else(|| PriorityError::InvalidInput {
            field: DraftField::Urgency,
            message: "urgency has not been entered".to_string(),
        })?;
        let users = self
            .draft
            .impacted_users
            .ok_or_else(|| PriorityError::InvalidInput {
                field: DraftField::ImpactedUsers,
                message: "impacted user count has not been entered".to_string(),
            })?;
        priority::calculate(urgency, users, self.draft.priority_override.as_ref())
    }

    /// Pull-style refresh after edits: recompute priority, project the final tier onto the
    /// draft when it can be computed, and return the bound view state.
    pub fn recompute(&mut self) -> WizardSnapshot {
        let priority = self.priority();
        if let Ok(result) = &priority {
            self.draft.priority = Some(result.final_priority);
        }
        WizardSnapshot {
            state: self.state(),
            priority,
        }
    }

    /// Discard the draft and start over with defaults.
    pub fn reset(&mut self) {
        self.draft = self.ctx.new_draft();
    }

    /// Submit this session's draft from the final step. On success the draft is reset;
    /// otherwise it is left as it was.
    pub async fn submit_with<S: IncidentStore>(
        &mut self,
        orchestrator: &SubmissionOrchestrator<S>,
        cancel: &CancelSignal,
    ) -> Result<PersistedIncident, SubmitError> {
        let (step, total) = (self.draft.current_step, self.total_steps());
        if step != total {
            return Err(SubmitError::NotOnFinalStep { step, total });
        }
        orchestrator.submit(&mut self.draft, cancel).await
    }

    fn clamp(&mut self) {
        let clamped = clamp_step(self.draft.current_step, self.draft.incident_type);
        if clamped != self.draft.current_step {
            tracing::debug!(
                from = self.draft.current_step,
                to = clamped,
                "clamped wizard step"
            );
            self.draft.current_step = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_step_bounds() {
        assert_eq!(clamp_step(0, IncidentType::PreIncident), 1);
        assert_eq!(clamp_step(4, IncidentType::PreIncident), 3);
        assert_eq!(clamp_step(4, IncidentType::MajorIncident), 4);
        assert_eq!(clamp_step(9, IncidentType::MajorIncident), 4);
    }
}
