use super::coordinator::SubmissionCoordinator;
use super::session::CheckoutSession;
use crate::config::{CheckoutConfig, RetryPolicy};
use crate::domain::ports::{PaymentGatewayHandle, WorkflowStoreBox};
use crate::domain::registry::StepRegistry;
use crate::domain::workflow::{Workflow, WorkflowRecord};
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// The main entry point for running checkouts.
///
/// `CheckoutEngine` owns the workflow definition, the submission coordinator
/// shared by every session, and the storage backend for workflow records.
pub struct CheckoutEngine {
    registry: Arc<StepRegistry>,
    coordinator: Arc<SubmissionCoordinator>,
    store: WorkflowStoreBox,
}

impl CheckoutEngine {
    /// Creates a new `CheckoutEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `registry` - The workflow definition every session follows.
    /// * `gateway` - The payment collaborator used for final submissions.
    /// * `policy` - Automatic retry policy for transient payment failures.
    /// * `store` - The store for workflow records.
    pub fn new(
        registry: StepRegistry,
        gateway: PaymentGatewayHandle,
        policy: RetryPolicy,
        store: WorkflowStoreBox,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            coordinator: Arc::new(SubmissionCoordinator::new(gateway, policy)),
            store,
        }
    }

    pub fn from_config(
        config: &CheckoutConfig,
        gateway: PaymentGatewayHandle,
        store: WorkflowStoreBox,
    ) -> Result<Self> {
        config.retry.validate()?;
        Ok(Self::new(
            config.registry()?,
            gateway,
            config.retry.clone(),
            store,
        ))
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Starts and persists a fresh workflow instance.
    pub async fn start(&self) -> Result<CheckoutSession> {
        let workflow = Workflow::start(self.registry.clone());
        info!(workflow_id = %workflow.id(), "checkout started");
        self.store.save(workflow.record()).await?;
        Ok(CheckoutSession::new(workflow, self.coordinator.clone()))
    }

    /// Restores a persisted workflow instance.
    ///
    /// A submission that was in flight when the record was saved is settled
    /// first (see [`CheckoutSession::reconcile`]) and the result persisted.
    pub async fn resume(&self, workflow_id: Uuid) -> Result<Option<CheckoutSession>> {
        let Some(record) = self.store.load(workflow_id).await? else {
            return Ok(None);
        };

        let workflow = Workflow::restore(self.registry.clone(), record)?;
        let session = CheckoutSession::new(workflow, self.coordinator.clone());
        if session.reconcile().await?.is_some() {
            self.save(&session).await?;
        }
        Ok(Some(session))
    }

    /// Submits a session's checkout.
    ///
    /// The in-flight record, idempotency key included, is persisted before
    /// the charge goes out, so a restart can only ever retry under the same
    /// key. The settled state is persisted again afterwards.
    pub async fn submit(&self, session: &CheckoutSession) -> Result<String> {
        let request = session.begin_submission().await?;
        if let Err(e) = self.save(session).await {
            warn!(workflow_id = %session.id(), "could not persist submission, not charging: {}", e);
            session.abandon_submission().await?;
            return Err(e);
        }

        let result = session.dispatch(request).await;
        self.save(session).await?;
        result
    }

    /// Persists the current state of a session.
    pub async fn save(&self, session: &CheckoutSession) -> Result<()> {
        self.store.save(session.record().await).await
    }

    /// Consumes the engine and returns every persisted workflow record.
    pub async fn into_records(self) -> Result<Vec<WorkflowRecord>> {
        self.store.all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::WorkflowStore;
    use crate::domain::step::StepId;
    use crate::domain::submission::SubmissionState;
    use crate::domain::workflow::WorkflowPhase;
    use crate::infrastructure::in_memory::InMemoryWorkflowStore;
    use crate::infrastructure::simulated_gateway::SimulatedGateway;

    fn checkout_engine(store: InMemoryWorkflowStore) -> CheckoutEngine {
        CheckoutEngine::new(
            StepRegistry::checkout(),
            Arc::new(SimulatedGateway::new()),
            RetryPolicy::immediate(3),
            Box::new(store),
        )
    }

    #[tokio::test]
    async fn test_start_persists_fresh_workflow() {
        let store = InMemoryWorkflowStore::new();
        let engine = checkout_engine(store.clone());

        let session = engine.start().await.unwrap();
        let records = engine.into_records().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].workflow_id, session.id());
        assert_eq!(
            records[0].state.current_step_id,
            StepId::from("payment-method")
        );
    }

    #[tokio::test]
    async fn test_resume_restores_progress() {
        let store = InMemoryWorkflowStore::new();
        let engine = checkout_engine(store.clone());

        let session = engine.start().await.unwrap();
        session.set_field("payment_method", "card").await.unwrap();
        session.advance().await.unwrap();
        engine.save(&session).await.unwrap();
        drop(session);

        let workflow_id = engine.into_records().await.unwrap()[0].workflow_id;
        let engine = checkout_engine(store);
        let resumed = engine.resume(workflow_id).await.unwrap().unwrap();

        let state = resumed.state().await;
        assert_eq!(state.current_step_id, StepId::from("billing-address"));
        assert_eq!(state.completed_step_ids, vec![StepId::from("payment-method")]);
        assert_eq!(state.submission, SubmissionState::NotStarted);
        assert_eq!(resumed.phase().await, WorkflowPhase::Collecting);
    }

    #[tokio::test]
    async fn test_resume_unknown_workflow() {
        let engine = checkout_engine(InMemoryWorkflowStore::new());
        assert!(engine.resume(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submit_persists_key_before_charging() {
        let store = InMemoryWorkflowStore::new();
        let gateway = Arc::new(SimulatedGateway::new().held());
        let engine = CheckoutEngine::new(
            StepRegistry::checkout(),
            gateway.clone(),
            RetryPolicy::immediate(3),
            Box::new(store.clone()),
        );
        let session = engine.start().await.unwrap();
        session.set_field("payment_method", "card").await.unwrap();
        session.advance().await.unwrap();
        for (field, value) in [
            ("full_name", "Ada Lovelace"),
            ("address_line1", "12 St James's Square"),
            ("city", "London"),
            ("postal_code", "SW1Y 4JH"),
            ("country", "GB"),
        ] {
            session.set_field(field, value).await.unwrap();
        }
        session.advance().await.unwrap();
        session.set_field("amount", "42.50").await.unwrap();

        let (result, saved) = tokio::join!(engine.submit(&session), async {
            let saved = store.load(session.id()).await.unwrap().unwrap();
            gateway.release(1);
            saved
        });

        assert!(matches!(saved.state.submission, SubmissionState::InFlight { .. }));
        assert_eq!(saved.idempotency_key, Some(gateway.requests()[0].idempotency_key.clone()));

        result.unwrap();
        let settled = store.load(session.id()).await.unwrap().unwrap();
        assert!(matches!(settled.state.submission, SubmissionState::Succeeded { .. }));
    }
}
