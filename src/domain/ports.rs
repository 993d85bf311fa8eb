use super::submission::{ChargeRequest, GatewayResponse};
use super::workflow::WorkflowRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// The external payment collaborator.
///
/// Implementations must treat requests sharing an idempotency key as the same
/// logical charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> GatewayResponse;
}

/// Durable storage for workflow instances, keyed by workflow id.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn save(&self, record: WorkflowRecord) -> Result<()>;
    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowRecord>>;
    async fn all(&self) -> Result<Vec<WorkflowRecord>>;
}

pub type PaymentGatewayHandle = Arc<dyn PaymentGateway>;
pub type WorkflowStoreBox = Box<dyn WorkflowStore>;
