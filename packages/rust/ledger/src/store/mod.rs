//! Persistence backends for the ledger.
//!
//! A [`LedgerStore`] keeps one [`LeadRecord`] per company. `upsert` must merge
//! with whatever is currently persisted, never replace it blindly.

mod sql;
mod table;

pub use sql::SqlStore;
pub use table::{FsTableBackend, MemoryTableBackend, TableBackend, TableStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use leadscout_shared::{LeadscoutError, Result};

use crate::record::LeadRecord;

/// Summary returned by [`LedgerStore::inspect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreHealth {
    pub records: usize,
    /// Rows present in the store that could not be parsed.
    pub malformed: usize,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Every valid record. Unparseable rows are skipped.
    async fn read_all(&self) -> Result<Vec<LeadRecord>>;

    /// Record for `company`, exact match.
    async fn read(&self, company: &str) -> Result<Option<LeadRecord>>;

    /// Merge `record` into the stored row for its company and return the result.
    async fn upsert(&self, record: &LeadRecord) -> Result<LeadRecord>;

    async fn inspect(&self) -> Result<StoreHealth> {
        Ok(StoreHealth {
            records: self.read_all().await?.len(),
            malformed: 0,
        })
    }

    /// Areas in the order they were first recorded for `company`.
    async fn history(&self, company: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        Err(LeadscoutError::validation(format!(
            "the {} store keeps no per-area history (asked for {company})",
            self.name()
        )))
    }
}
