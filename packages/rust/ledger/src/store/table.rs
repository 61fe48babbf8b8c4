//! Whole-table store: read the table, modify it, write it back.
//!
//! Writes are serialized by an in-process lock. Several processes sharing one
//! table file is not supported; use [`super::SqlStore`] for that.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use leadscout_shared::{LeadscoutError, Result};

use super::{LedgerStore, StoreHealth};
use crate::record::LeadRecord;
use crate::table::LeadTable;

/// Raw byte access to wherever the table lives.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Table bytes, or `None` if the table does not exist yet.
    async fn read_table(&self) -> Result<Option<Vec<u8>>>;

    async fn write_table(&self, bytes: Vec<u8>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Local file
// ---------------------------------------------------------------------------

/// Table stored in a local CSV file. Writes go to a sibling temp file that is
/// renamed over the target.
#[derive(Debug, Clone)]
pub struct FsTableBackend {
    path: PathBuf,
}

impl FsTableBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TableBackend for FsTableBackend {
    async fn read_table(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LeadscoutError::storage(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write_table(&self, bytes: Vec<u8>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LeadscoutError::storage(format!("cannot create {}: {e}", parent.display())))?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| LeadscoutError::storage(format!("cannot write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            LeadscoutError::storage(format!("cannot replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "table written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// Table held in memory. Can be switched to fail every call, for exercising the
/// unavailable-store paths.
#[derive(Debug, Default)]
pub struct MemoryTableBackend {
    bytes: StdMutex<Option<Vec<u8>>>,
    unavailable: AtomicBool,
}

impl MemoryTableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: StdMutex::new(Some(bytes.into())),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Current table bytes.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LeadscoutError::storage("memory table marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TableBackend for MemoryTableBackend {
    async fn read_table(&self) -> Result<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.contents())
    }

    async fn write_table(&self, bytes: Vec<u8>) -> Result<()> {
        self.check()?;
        *self
            .bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct TableStore<B> {
    backend: B,
    write_lock: Mutex<()>,
}

impl<B: TableBackend> TableStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn load(&self) -> Result<LeadTable> {
        match self.backend.read_table().await? {
            Some(bytes) => LeadTable::decode(&bytes),
            None => Ok(LeadTable::new()),
        }
    }
}

#[async_trait]
impl<B: TableBackend> LedgerStore for TableStore<B> {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn read_all(&self) -> Result<Vec<LeadRecord>> {
        Ok(self.load().await?.records().cloned().collect())
    }

    async fn read(&self, company: &str) -> Result<Option<LeadRecord>> {
        Ok(self.load().await?.get(company).cloned())
    }

    async fn upsert(&self, record: &LeadRecord) -> Result<LeadRecord> {
        let _guard = self.write_lock.lock().await;

        // An unreadable table is never overwritten.
        let mut table = self.load().await.map_err(|e| match e {
            LeadscoutError::StorageUnavailable(_) => e,
            other => LeadscoutError::storage(format!("refusing to rewrite unreadable table: {other}")),
        })?;

        let stored = table.merge(record);
        self.backend.write_table(table.encode()).await?;

        info!(
            company = %stored.company_name,
            areas = %stored.notified_areas,
            "ledger row written"
        );
        Ok(stored)
    }

    async fn inspect(&self) -> Result<StoreHealth> {
        let table = self.load().await?;
        Ok(StoreHealth {
            records: table.records().count(),
            malformed: table.malformed_count(),
        })
    }
}
