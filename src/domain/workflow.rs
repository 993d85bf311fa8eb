use super::registry::StepRegistry;
use super::step::{Step, StepId};
use super::submission::{
    IdempotencyKey, PaymentPayload, SubmissionErrorKind, SubmissionOutcome, SubmissionRequest,
    SubmissionState,
};
use super::validation::{FieldValues, ValidationResult, validate};
use crate::error::{CheckoutError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Where the workflow is, beyond the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// On one of the registry steps, collecting input.
    Collecting,
    /// The final submission is in flight.
    Submitting,
    Completed,
    Aborted,
}

impl WorkflowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::Completed | WorkflowPhase::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub current_step_id: StepId,
    /// Completion order, always a prefix of the registry order.
    pub completed_step_ids: Vec<StepId>,
    pub field_values: FieldValues,
    pub submission: SubmissionState,
}

/// Durable form of a workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow_id: Uuid,
    pub state: WorkflowState,
    pub idempotency_key: Option<IdempotencyKey>,
}

/// The workflow state machine.
///
/// All transitions are synchronous. The only suspending operation, the
/// payment submission itself, lives in the application layer; this type only
/// opens the submission (`begin_submission`) and applies its outcome (`resolve`).
#[derive(Debug, Clone)]
pub struct Workflow {
    id: Uuid,
    registry: Arc<StepRegistry>,
    state: WorkflowState,
    phase: WorkflowPhase,
    idempotency_key: Option<IdempotencyKey>,
}

impl Workflow {
    /// Starts a fresh workflow on the first registry step.
    pub fn start(registry: Arc<StepRegistry>) -> Self {
        Self::with_id(Uuid::new_v4(), registry)
    }

    pub fn with_id(id: Uuid, registry: Arc<StepRegistry>) -> Self {
        let current_step_id = registry.first().id.clone();
        Self {
            id,
            registry,
            state: WorkflowState {
                current_step_id,
                completed_step_ids: Vec::new(),
                field_values: FieldValues::new(),
                submission: SubmissionState::NotStarted,
            },
            phase: WorkflowPhase::Collecting,
            idempotency_key: None,
        }
    }

    /// Rebuilds a workflow from its durable record.
    ///
    /// The phase is derived from the submission state. Records naming steps
    /// the registry does not know are rejected.
    pub fn restore(registry: Arc<StepRegistry>, record: WorkflowRecord) -> Result<Self> {
        let corrupt = |problem: &str| {
            CheckoutError::Storage(format!("workflow {} {problem}", record.workflow_id))
        };

        let state = &record.state;
        let current = registry.position(&state.current_step_id)?;
        for (index, id) in state.completed_step_ids.iter().enumerate() {
            if registry.position(id)? != index {
                return Err(corrupt("has completed steps out of order"));
            }
        }
        if current > state.completed_step_ids.len() {
            return Err(corrupt("skips steps before its current step"));
        }
        if matches!(
            state.submission,
            SubmissionState::InFlight { .. } | SubmissionState::Succeeded { .. }
        ) && (!registry.is_last(&state.current_step_id)
            || state.completed_step_ids.len() != registry.len())
        {
            return Err(corrupt("has a submission without a completed last step"));
        }

        let phase = match &record.state.submission {
            SubmissionState::InFlight { .. } => WorkflowPhase::Submitting,
            SubmissionState::Succeeded { .. } => WorkflowPhase::Completed,
            SubmissionState::Failed {
                retryable: false, ..
            } => WorkflowPhase::Aborted,
            _ => WorkflowPhase::Collecting,
        };

        Ok(Self {
            id: record.workflow_id,
            registry,
            state: record.state,
            phase,
            idempotency_key: record.idempotency_key,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    pub fn current_step(&self) -> Result<&Step> {
        self.registry.get(&self.state.current_step_id)
    }

    pub fn record(&self) -> WorkflowRecord {
        WorkflowRecord {
            workflow_id: self.id,
            state: self.state.clone(),
            idempotency_key: self.idempotency_key.clone(),
        }
    }

    /// Runs the validation gate for the current step.
    pub fn validate_current(&self) -> Result<ValidationResult> {
        Ok(validate(self.current_step()?, &self.state.field_values))
    }

    /// Moves to the next step once the current one validates.
    pub fn advance(&mut self) -> Result<&Step> {
        self.ensure_collecting()?;
        let next = self
            .registry
            .next_of(&self.state.current_step_id)?
            .ok_or_else(|| CheckoutError::IllegalTransition {
                action: "advance",
                step: self.state.current_step_id.clone(),
            })?
            .id
            .clone();

        self.ensure_current_valid()?;
        self.mark_current_completed();
        debug!(workflow_id = %self.id, from = %self.state.current_step_id, to = %next, "advance");
        self.state.current_step_id = next;
        self.current_step()
    }

    /// Moves to the previous step. Completed steps keep their data and stay completed.
    pub fn go_back(&mut self) -> Result<&Step> {
        self.ensure_collecting()?;
        let previous = self
            .registry
            .previous_of(&self.state.current_step_id)?
            .ok_or_else(|| CheckoutError::IllegalTransition {
                action: "go back",
                step: self.state.current_step_id.clone(),
            })?
            .id
            .clone();

        debug!(workflow_id = %self.id, from = %self.state.current_step_id, to = %previous, "go back");
        self.state.current_step_id = previous;
        self.current_step()
    }

    /// Overwrites a field value. Does not validate.
    pub fn set_field(&mut self, field_id: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        self.state.field_values.insert(field_id.into(), value.into());
        Ok(())
    }

    /// Opens the final submission from the last step.
    ///
    /// Marks the last step completed, reuses (or generates, on the first call)
    /// the idempotency key and resets the attempt counter to 1.
    pub fn begin_submission(&mut self) -> Result<SubmissionRequest> {
        self.ensure_collecting()?;
        if !self.registry.is_last(&self.state.current_step_id) {
            return Err(CheckoutError::IllegalTransition {
                action: "submit",
                step: self.state.current_step_id.clone(),
            });
        }
        if !self.state.submission.accepts_submission() {
            return Err(CheckoutError::WorkflowCompleted);
        }
        self.ensure_current_valid()?;
        self.mark_current_completed();

        let idempotency_key = self
            .idempotency_key
            .get_or_insert_with(IdempotencyKey::generate)
            .clone();
        self.state.submission = SubmissionState::InFlight {
            idempotency_key: idempotency_key.clone(),
            attempt: 1,
        };
        self.phase = WorkflowPhase::Submitting;
        debug!(workflow_id = %self.id, %idempotency_key, "submission opened");

        Ok(SubmissionRequest {
            idempotency_key,
            payload: PaymentPayload {
                workflow_id: self.id,
                fields: self.state.field_values.clone(),
            },
        })
    }

    /// Records the attempt number reported by the coordinator.
    pub fn record_attempt(&mut self, attempt: u32) {
        if let SubmissionState::InFlight { attempt: current, .. } = &mut self.state.submission {
            *current = attempt;
        }
    }

    /// Applies the terminal outcome of a submission.
    pub fn resolve(&mut self, outcome: &SubmissionOutcome) -> Result<()> {
        self.ensure_active()?;
        if self.phase != WorkflowPhase::Submitting {
            return Err(CheckoutError::IllegalTransition {
                action: "resolve a submission",
                step: self.state.current_step_id.clone(),
            });
        }

        match outcome {
            SubmissionOutcome::Succeeded {
                confirmation_id, ..
            } => {
                self.state.submission = SubmissionState::Succeeded {
                    confirmation_id: confirmation_id.clone(),
                };
                self.phase = WorkflowPhase::Completed;
            }
            SubmissionOutcome::Failed {
                error, retryable, ..
            } => {
                self.state.submission = SubmissionState::Failed {
                    error: error.clone(),
                    retryable: *retryable,
                };
                self.phase = if *retryable {
                    WorkflowPhase::Collecting
                } else {
                    WorkflowPhase::Aborted
                };
            }
        }
        debug!(workflow_id = %self.id, phase = ?self.phase, "submission resolved");
        Ok(())
    }

    /// Resolves an in-flight submission whose outcome can no longer be observed.
    pub fn interrupt(&mut self) -> Result<SubmissionOutcome> {
        let attempts = match &self.state.submission {
            SubmissionState::InFlight { attempt, .. } => *attempt,
            _ => 0,
        };
        let outcome = SubmissionOutcome::Failed {
            error: SubmissionErrorKind::Interrupted,
            retryable: true,
            attempts,
        };
        self.resolve(&outcome)?;
        Ok(outcome)
    }

    fn ensure_active(&self) -> Result<()> {
        match self.phase {
            WorkflowPhase::Completed => Err(CheckoutError::WorkflowCompleted),
            WorkflowPhase::Aborted => Err(CheckoutError::WorkflowAborted),
            _ => Ok(()),
        }
    }

    fn ensure_collecting(&self) -> Result<()> {
        self.ensure_active()?;
        if self.phase == WorkflowPhase::Submitting {
            return Err(CheckoutError::SubmissionAlreadyInProgress);
        }
        Ok(())
    }

    fn ensure_current_valid(&self) -> Result<()> {
        match self.validate_current()? {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(violations) => {
                Err(CheckoutError::ValidationFailed(violations))
            }
        }
    }

    fn mark_current_completed(&mut self) {
        let current = &self.state.current_step_id;
        if !self.state.completed_step_ids.contains(current) {
            self.state.completed_step_ids.push(current.clone());
        }
    }
}
