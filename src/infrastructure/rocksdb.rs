use crate::domain::ports::WorkflowStore;
use crate::domain::workflow::WorkflowRecord;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Column Family for storing workflow records.
pub const CF_WORKFLOWS: &str = "workflows";

/// A persistent store implementation using RocksDB.
///
/// Records are stored as JSON in their own column family, keyed by the
/// workflow id bytes.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbWorkflowStore {
    db: Arc<DB>,
}

impl RocksDbWorkflowStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_workflows = ColumnFamilyDescriptor::new(CF_WORKFLOWS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_workflows])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn handle(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_WORKFLOWS)
            .ok_or_else(|| CheckoutError::Storage("Workflows column family not found".to_string()))
    }
}

#[async_trait]
impl WorkflowStore for RocksDbWorkflowStore {
    async fn save(&self, record: WorkflowRecord) -> Result<()> {
        let cf = self.handle()?;
        let value = serde_json::to_vec(&record)?;
        self.db.put_cf(cf, record.workflow_id.as_bytes(), value)?;
        Ok(())
    }

    async fn load(&self, workflow_id: Uuid) -> Result<Option<WorkflowRecord>> {
        let cf = self.handle()?;
        match self.db.get_cf(cf, workflow_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<WorkflowRecord>> {
        let cf = self.handle()?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}
