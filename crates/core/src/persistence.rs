//! Forwarding transcripts to the spreadsheet backend.

use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::record::PersistedRecord;

/// Error returned by a [`PersistenceGateway`].
pub type PersistenceError = Box<dyn Error + Send + Sync>;

/// A best-effort sink for transcripts.
///
/// Callers never retry and never surface failures to the user; every call
/// may produce a new backend row.
#[async_trait]
pub trait PersistenceGateway: Send + Sync + 'static {
    /// Stores one record.
    async fn persist(&self, record: PersistedRecord) -> Result<(), PersistenceError>;
}

/// A gateway that drops every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopGateway;

#[async_trait]
impl PersistenceGateway for NoopGateway {
    async fn persist(&self, record: PersistedRecord) -> Result<(), PersistenceError> {
        trace!("dropping {:?} record", record.exit_mode());
        Ok(())
    }
}

/// A gateway that keeps records in memory, for tests and local runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryGateway {
    records: Arc<Mutex<Vec<PersistedRecord>>>,
}

impl MemoryGateway {
    /// Returns a copy of the records stored so far.
    pub fn records(&self) -> Vec<PersistedRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn persist(&self, record: PersistedRecord) -> Result<(), PersistenceError> {
        self.records
            .lock()
            .map_err(|_| "record store poisoned")?
            .push(record);
        Ok(())
    }
}
