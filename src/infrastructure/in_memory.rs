use crate::domain::ports::WorkflowStore;
use crate::domain::workflow::WorkflowRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for workflow records.
///
/// Uses `Arc<RwLock<HashMap<Uuid, WorkflowRecord>>>` so clones share the same data.
/// Ideal for tests and single-process runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    records: Arc<RwLock<HashMap<Uuid, WorkflowRecord>>>,
}

impl InMemoryWorkflowStore {
    /// Creates a new, empty in-memory workflow store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save(&self, record: WorkflowRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.workflow_id, record);
        Ok(())
    }

    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&workflow_id).cloned())
    }

    async fn all(&self) -> Result<Vec<WorkflowRecord>> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}
