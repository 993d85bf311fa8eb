use super::coordinator::{SubmissionCoordinator, SubmissionProgress, SubmissionTicket};
use crate::domain::progress::ProgressView;
use crate::domain::step::StepId;
use crate::domain::submission::{
    SubmissionErrorKind, SubmissionOutcome, SubmissionRequest, SubmissionState,
};
use crate::domain::validation::ValidationResult;
use crate::domain::workflow::{Workflow, WorkflowPhase, WorkflowRecord, WorkflowState};
use crate::error::{CheckoutError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// One checkout attempt: a workflow instance plus access to the coordinator.
///
/// Every method takes `&self`, so UI handlers can share a session. The
/// workflow lock is never held across the payment call, which is what lets a
/// duplicate `submit` observe `InFlight` and fail fast.
pub struct CheckoutSession {
    id: Uuid,
    workflow: Mutex<Workflow>,
    coordinator: Arc<SubmissionCoordinator>,
}

impl CheckoutSession {
    pub fn new(workflow: Workflow, coordinator: Arc<SubmissionCoordinator>) -> Self {
        Self {
            id: workflow.id(),
            workflow: Mutex::new(workflow),
            coordinator,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn advance(&self) -> Result<StepId> {
        let mut workflow = self.workflow.lock().await;
        Ok(workflow.advance()?.id.clone())
    }

    pub async fn go_back(&self) -> Result<StepId> {
        let mut workflow = self.workflow.lock().await;
        Ok(workflow.go_back()?.id.clone())
    }

    pub async fn set_field(&self, field_id: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.workflow.lock().await.set_field(field_id, value)
    }

    pub async fn validate_current(&self) -> Result<ValidationResult> {
        self.workflow.lock().await.validate_current()
    }

    /// Submits the checkout and waits for the final outcome.
    ///
    /// Returns the confirmation id on success. Failures surface as
    /// `SubmissionFailed`, with `retryable` telling whether the workflow is
    /// back on the last step or aborted. Nothing is persisted here; use
    /// [`CheckoutEngine::submit`](super::engine::CheckoutEngine::submit) when
    /// the workflow is backed by a store.
    pub async fn submit(&self) -> Result<String> {
        let request = self.begin_submission().await?;
        self.dispatch(request).await
    }

    /// Opens the submission on the workflow without contacting the gateway.
    pub(crate) async fn begin_submission(&self) -> Result<SubmissionRequest> {
        self.workflow.lock().await.begin_submission()
    }

    /// Backs out of a submission that was opened but never dispatched.
    pub(crate) async fn abandon_submission(&self) -> Result<()> {
        self.workflow.lock().await.interrupt().map(|_| ())
    }

    /// Hands an opened submission to the coordinator and applies its outcome.
    pub(crate) async fn dispatch(&self, request: SubmissionRequest) -> Result<String> {
        let key = request.idempotency_key.clone();
        info!(workflow_id = %self.id, idempotency_key = %key, "submitting checkout");

        let ticket = match self.coordinator.submit(request) {
            Ok(ticket) => ticket,
            // The same logical submission is still running from an earlier mount.
            Err(CheckoutError::SubmissionAlreadyInProgress) => self
                .coordinator
                .attach(&key)
                .ok_or(CheckoutError::SubmissionAlreadyInProgress)?,
            Err(e) => return Err(e),
        };

        let outcome = self.settle(ticket).await?;
        into_confirmation(outcome)
    }

    /// Settles a submission left `InFlight`, e.g. after the session was restored.
    ///
    /// Attaches to the coordinator's running submission when it still has one;
    /// otherwise the submission is marked as a retryable interruption, and the
    /// retry reuses the same idempotency key.
    pub async fn reconcile(&self) -> Result<Option<SubmissionOutcome>> {
        let key = match &self.workflow.lock().await.state().submission {
            SubmissionState::InFlight {
                idempotency_key, ..
            } => idempotency_key.clone(),
            _ => return Ok(None),
        };

        match self.coordinator.attach(&key) {
            Some(ticket) => {
                info!(workflow_id = %self.id, idempotency_key = %key, "re-attached to submission");
                Ok(Some(self.settle(ticket).await?))
            }
            None => {
                warn!(workflow_id = %self.id, idempotency_key = %key, "in-flight submission lost, marking interrupted");
                Ok(Some(self.workflow.lock().await.interrupt()?))
            }
        }
    }

    pub async fn phase(&self) -> WorkflowPhase {
        self.workflow.lock().await.phase()
    }

    pub async fn state(&self) -> WorkflowState {
        self.workflow.lock().await.state().clone()
    }

    pub async fn record(&self) -> WorkflowRecord {
        self.workflow.lock().await.record()
    }

    pub async fn progress(&self) -> ProgressView {
        let workflow = self.workflow.lock().await;
        ProgressView::project(workflow.registry(), workflow.state(), workflow.phase())
    }

    /// Follows a ticket to its outcome, applies it, then releases the
    /// coordinator's entry for the key.
    async fn settle(&self, ticket: SubmissionTicket) -> Result<SubmissionOutcome> {
        let key = ticket.idempotency_key().clone();
        let outcome = self.follow(ticket).await;
        self.workflow.lock().await.resolve(&outcome)?;
        self.coordinator.forget(&key);
        Ok(outcome)
    }

    async fn follow(&self, mut ticket: SubmissionTicket) -> SubmissionOutcome {
        loop {
            match ticket.current() {
                SubmissionProgress::Finished(outcome) => return outcome,
                SubmissionProgress::Attempting(attempt) => {
                    self.workflow.lock().await.record_attempt(attempt);
                }
            }
            if !ticket.changed().await {
                return SubmissionOutcome::Failed {
                    error: SubmissionErrorKind::Interrupted,
                    retryable: true,
                    attempts: 0,
                };
            }
        }
    }
}

fn into_confirmation(outcome: SubmissionOutcome) -> Result<String> {
    match outcome {
        SubmissionOutcome::Succeeded {
            confirmation_id, ..
        } => Ok(confirmation_id),
        SubmissionOutcome::Failed {
            error, retryable, ..
        } => Err(CheckoutError::SubmissionFailed {
            kind: error,
            retryable,
        }),
    }
}
