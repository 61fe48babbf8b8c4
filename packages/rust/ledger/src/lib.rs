//! Lead ledger: which business areas have already been notified per company.
//!
//! The [`Ledger`] is the single decision point for "is this a new lead
//! signal". Deciding and recording are separate steps:
//!
//! 1. [`Ledger::reconcile`] compares candidate areas against the stored record
//!    and stages the merged record without writing anything.
//! 2. The caller delivers notifications for the novel areas.
//! 3. [`Ledger::commit`] persists the staged record (or a subset of it via
//!    [`Reconciliation::stage`]) once delivery succeeded.
//!
//! A failed or skipped commit means the area is seen as novel again next run:
//! duplicate notification is preferred over a lost one.

pub mod areas;
mod migrations;
pub mod record;
pub mod store;
pub mod table;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use leadscout_shared::{LedgerBackend, LedgerConfig, LeadscoutError, Result};

pub use areas::{AreaSet, normalize, parse_candidates};
pub use record::{LeadRecord, TIMESTAMP_FORMAT};
pub use store::{
    FsTableBackend, LedgerStore, MemoryTableBackend, SqlStore, StoreHealth, TableBackend,
    TableStore,
};
pub use table::LeadTable;

/// Default bound for a single storage call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Held while a company's reconcile → notify → commit cycle runs.
pub type CompanyLock = OwnedMutexGuard<()>;

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// How a reconciliation turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Candidate input was empty or only placeholders.
    NoCandidates,
    /// Every candidate was already notified.
    AlreadyNotified,
    /// No prior record; every candidate is novel.
    NewCompany,
    /// Known company with at least one novel area.
    NewAreas,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::AlreadyNotified => "already_notified",
            Self::NewCompany => "new_company",
            Self::NewAreas => "new_areas",
        }
    }
}

/// A record ready to be committed. Produced only by [`Reconciliation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRecord {
    record: LeadRecord,
    added: AreaSet,
}

impl StagedRecord {
    pub fn company(&self) -> &str {
        &self.record.company_name
    }

    /// The full record as it should look after the commit.
    pub fn record(&self) -> &LeadRecord {
        &self.record
    }

    /// Areas this commit adds.
    pub fn added(&self) -> &AreaSet {
        &self.added
    }
}

/// Result of comparing candidate areas with the ledger.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub company: String,
    pub outcome: ReconcileOutcome,
    pub candidates: AreaSet,
    /// Areas already notified before this run.
    pub existing: AreaSet,
    /// `candidates - existing`.
    pub novel: AreaSet,
    staged_at: DateTime<Utc>,
}

impl Reconciliation {
    fn new(company: &str, candidates: AreaSet, existing: Option<LeadRecord>) -> Self {
        let known = existing.is_some();
        let existing = existing.map(|r| r.notified_areas).unwrap_or_default();
        let novel = candidates.difference(&existing);

        let outcome = if candidates.is_empty() {
            ReconcileOutcome::NoCandidates
        } else if novel.is_empty() {
            ReconcileOutcome::AlreadyNotified
        } else if known {
            ReconcileOutcome::NewAreas
        } else {
            ReconcileOutcome::NewCompany
        };

        Self {
            company: company.to_string(),
            outcome,
            candidates,
            existing,
            novel,
            staged_at: record::now(),
        }
    }

    pub fn has_novel(&self) -> bool {
        !self.novel.is_empty()
    }

    /// Staged record covering every novel area: `existing ∪ candidates`.
    pub fn staged(&self) -> Option<StagedRecord> {
        self.stage(&self.novel)
    }

    /// Staged record covering only `areas` (restricted to the novel ones).
    ///
    /// `None` if none of `areas` is novel.
    pub fn stage(&self, areas: &AreaSet) -> Option<StagedRecord> {
        let added = areas.intersection(&self.novel);
        if added.is_empty() {
            return None;
        }
        Some(StagedRecord {
            record: LeadRecord::new(
                self.company.clone(),
                self.existing.union(&added),
                self.staged_at,
            ),
            added,
        })
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: StdMutex::new(HashMap::new()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(LeadscoutError::storage(format!(
                "{} store {op} timed out after {:?}",
                self.store.name(),
                self.timeout
            ))),
        }
    }

    /// The full table keyed by company. Store failures yield an empty map.
    pub async fn load(&self) -> HashMap<String, LeadRecord> {
        match self.records().await {
            Ok(records) => records
                .into_iter()
                .map(|r| (r.company_name.clone(), r))
                .collect(),
            Err(e) => {
                warn!(store = self.store.name(), error = %e, "ledger unreadable, treating as empty");
                HashMap::new()
            }
        }
    }

    /// Every valid record. Unlike [`Ledger::load`], read failures are returned.
    pub async fn records(&self) -> Result<Vec<LeadRecord>> {
        self.bounded("read", self.store.read_all()).await
    }

    pub async fn inspect(&self) -> Result<StoreHealth> {
        self.bounded("inspect", self.store.inspect()).await
    }

    /// Serialize work on one company within this process.
    pub async fn lock(&self, company: &str) -> CompanyLock {
        let mutex = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(company.to_string())
            .or_default()
            .clone();
        mutex.lock_owned().await
    }

    /// Parse `raw` candidate output and compare it with the stored record.
    ///
    /// Never writes. A failed read is treated as "no prior record".
    #[instrument(skip_all, fields(company = %company))]
    pub async fn reconcile(&self, company: &str, raw: &str) -> Reconciliation {
        self.reconcile_areas(company, parse_candidates(raw)).await
    }

    /// [`Ledger::reconcile`] with an already-parsed candidate set.
    pub async fn reconcile_areas(&self, company: &str, candidates: AreaSet) -> Reconciliation {
        if candidates.is_empty() {
            debug!(company, "no candidate areas");
            return Reconciliation::new(company, candidates, None);
        }

        let existing = match self.bounded("read", self.store.read(company)).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(company, error = %e, "ledger read failed, treating company as new");
                None
            }
        };

        let rec = Reconciliation::new(company, candidates, existing);
        info!(
            company,
            outcome = rec.outcome.as_str(),
            candidates = %rec.candidates,
            novel = %rec.novel,
            "reconciled"
        );
        rec
    }

    /// Persist a staged record. The store merges it with the current row.
    #[instrument(skip_all, fields(company = %staged.company()))]
    pub async fn commit(&self, staged: &StagedRecord) -> Result<LeadRecord> {
        let stored = self
            .bounded("write", self.store.upsert(&staged.record))
            .await?;
        info!(added = %staged.added, areas = %stored.notified_areas, "committed");
        Ok(stored)
    }

    /// Record `areas` for `company` directly, bypassing notification.
    ///
    /// Returns the areas that were new, empty if nothing changed.
    pub async fn record(&self, company: &str, areas: AreaSet) -> Result<(AreaSet, LeadRecord)> {
        let _guard = self.lock(company).await;
        let existing = self.bounded("read", self.store.read(company)).await?;
        let rec = Reconciliation::new(company, areas, existing.clone());
        match rec.staged() {
            Some(staged) => {
                let stored = self.commit(&staged).await?;
                Ok((staged.added, stored))
            }
            None => Ok((
                AreaSet::new(),
                existing.unwrap_or_else(|| LeadRecord::new(company, AreaSet::new(), rec.staged_at)),
            )),
        }
    }

    /// Merge every record into the store. Returns how many rows grew.
    pub async fn import(&self, records: &[LeadRecord]) -> Result<usize> {
        let mut grown = 0;
        for incoming in records {
            let _guard = self.lock(&incoming.company_name).await;
            let before = self
                .bounded("read", self.store.read(&incoming.company_name))
                .await?;
            let after = self.bounded("write", self.store.upsert(incoming)).await?;
            if before.is_none_or(|b| b.notified_areas != after.notified_areas) {
                grown += 1;
            }
        }
        Ok(grown)
    }

    /// Per-area notification history, where the store keeps one.
    pub async fn history(&self, company: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        self.bounded("history", self.store.history(company)).await
    }
}

/// Open the store selected by `[ledger]`.
pub async fn open_ledger(config: &LedgerConfig) -> Result<Ledger> {
    let path = config.resolved_path()?;
    let store: Arc<dyn LedgerStore> = match config.backend {
        LedgerBackend::Sqlite => Arc::new(SqlStore::open(&path).await?),
        LedgerBackend::Table => Arc::new(TableStore::new(FsTableBackend::new(path))),
    };
    Ok(Ledger::new(store).with_timeout(Duration::from_secs(config.timeout_secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn table_ledger() -> (Arc<TableStore<MemoryTableBackend>>, Ledger) {
        let store = Arc::new(TableStore::new(MemoryTableBackend::new()));
        (store.clone(), Ledger::new(store))
    }

    async fn seed(ledger: &Ledger, company: &str, areas: &str) {
        ledger
            .record(company, AreaSet::parse(areas))
            .await
            .expect("seed");
    }

    #[tokio::test]
    async fn novel_is_set_difference() {
        let (_, ledger) = table_ledger();
        seed(&ledger, "Acme", "AI").await;

        let rec = ledger.reconcile("Acme", "AI, AWS").await;
        assert_eq!(rec.outcome, ReconcileOutcome::NewAreas);
        assert_eq!(rec.novel.to_string(), "AWS");

        let staged = rec.staged().expect("staged");
        assert_eq!(staged.record().notified_areas.to_string(), "AI, AWS");

        let stored = ledger.commit(&staged).await.unwrap();
        assert_eq!(stored.notified_areas.to_string(), "AI, AWS");
    }

    #[tokio::test]
    async fn new_company_creates_record() {
        let (store, ledger) = table_ledger();
        let rec = ledger.reconcile("Acme", "Cloud Migration").await;
        assert_eq!(rec.outcome, ReconcileOutcome::NewCompany);
        assert_eq!(rec.novel.to_string(), "Cloud Migration");
        assert!(store.read("Acme").await.unwrap().is_none(), "reconcile must not write");

        ledger.commit(&rec.staged().unwrap()).await.unwrap();
        let acme = store.read("Acme").await.unwrap().unwrap();
        assert_eq!(acme.notified_areas.to_string(), "Cloud Migration");
    }

    #[tokio::test]
    async fn covered_candidates_change_nothing() {
        let (store, ledger) = table_ledger();
        seed(&ledger, "Acme", "AI").await;
        let before = store.backend().contents();

        let rec = ledger.reconcile("Acme", "AI").await;
        assert_eq!(rec.outcome, ReconcileOutcome::AlreadyNotified);
        assert!(rec.novel.is_empty());
        assert!(rec.staged().is_none());
        assert_eq!(store.backend().contents(), before);
    }

    #[tokio::test]
    async fn empty_and_placeholder_input_yield_nothing() {
        let (store, ledger) = table_ledger();
        for raw in ["", "Not available", "**Lead Identification Area**: Not available"] {
            let rec = ledger.reconcile("Acme", raw).await;
            assert_eq!(rec.outcome, ReconcileOutcome::NoCandidates, "input {raw:?}");
            assert!(rec.novel.is_empty());
            assert!(rec.staged().is_none());
        }
        assert!(store.backend().contents().is_none());
    }

    #[tokio::test]
    async fn matching_is_case_sensitive() {
        let (_, ledger) = table_ledger();
        seed(&ledger, "Acme", "AI").await;
        let rec = ledger.reconcile("Acme", "ai").await;
        assert_eq!(rec.novel.to_string(), "ai");
        let other = ledger.reconcile("acme", "AI").await;
        assert_eq!(other.outcome, ReconcileOutcome::NewCompany);
    }

    #[tokio::test]
    async fn stage_restricts_to_delivered_areas() {
        let (store, ledger) = table_ledger();
        seed(&ledger, "Acme", "AI").await;

        let rec = ledger.reconcile("Acme", "AI, AWS, SaaS").await;
        assert_eq!(rec.novel.to_string(), "AWS, SaaS");

        assert!(rec.stage(&AreaSet::parse("AI")).is_none());
        let partial = rec.stage(&AreaSet::parse("SaaS, Zones")).unwrap();
        assert_eq!(partial.added().to_string(), "SaaS");
        ledger.commit(&partial).await.unwrap();

        let acme = store.read("Acme").await.unwrap().unwrap();
        assert_eq!(acme.notified_areas.to_string(), "AI, SaaS");
        // The undelivered area is novel again next time.
        let again = ledger.reconcile("Acme", "AI, AWS, SaaS").await;
        assert_eq!(again.novel.to_string(), "AWS");
    }

    #[tokio::test]
    async fn notified_areas_never_shrink() {
        let (store, ledger) = table_ledger();
        let inputs = [
            "AI", "AWS; AI", "", "Zones", "AI", "Not available", "SaaS, AWS", "GCC",
        ];
        let mut seen = AreaSet::new();
        for raw in inputs {
            let rec = ledger.reconcile("Acme", raw).await;
            if let Some(staged) = rec.staged() {
                ledger.commit(&staged).await.unwrap();
            }
            let current = store
                .read("Acme")
                .await
                .unwrap()
                .map(|r| r.notified_areas)
                .unwrap_or_default();
            assert!(seen.is_subset(&current), "{seen} lost after {raw:?}");
            seen = current;
        }
        assert_eq!(seen.to_string(), "AI, AWS, GCC, SaaS, Zones");
    }

    #[tokio::test]
    async fn stale_commit_does_not_remove_concurrent_areas() {
        let (store, ledger) = table_ledger();
        // Two runs reconcile against the same empty state.
        let first = ledger.reconcile("Acme", "AI").await;
        let second = ledger.reconcile("Acme", "AWS").await;
        ledger.commit(&first.staged().unwrap()).await.unwrap();
        ledger.commit(&second.staged().unwrap()).await.unwrap();

        let acme = store.read("Acme").await.unwrap().unwrap();
        assert_eq!(acme.notified_areas.to_string(), "AI, AWS");
    }

    #[tokio::test]
    async fn unreadable_store_degrades_to_empty() {
        let (store, ledger) = table_ledger();
        seed(&ledger, "Acme", "AI").await;
        store.backend().set_unavailable(true);

        assert!(ledger.load().await.is_empty());
        let rec = ledger.reconcile("Acme", "AI").await;
        assert_eq!(rec.outcome, ReconcileOutcome::NewCompany);

        let err = ledger.commit(&rec.staged().unwrap()).await.unwrap_err();
        assert!(matches!(err, LeadscoutError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_row_does_not_hide_others() {
        let backend = MemoryTableBackend::with_contents(
            "Company Name,Lead Identification Areas,Timestamp\n\
             Acme,AI,31/12/2024\n\
             Globex,\"AWS, SaaS\",2025-08-06 10:35:40\n\
             Initech,Zones,2025-08-07 09:00:00\n",
        );
        let ledger = Ledger::new(Arc::new(TableStore::new(backend)));
        let table = ledger.load().await;
        assert_eq!(table.len(), 2);
        assert_eq!(table["Globex"].notified_areas.to_string(), "AWS, SaaS");
        assert!(table.contains_key("Initech"));
        assert_eq!(ledger.inspect().await.unwrap().malformed, 1);
    }

    struct StalledStore;

    #[async_trait]
    impl LedgerStore for StalledStore {
        fn name(&self) -> &'static str {
            "stalled"
        }
        async fn read_all(&self) -> Result<Vec<LeadRecord>> {
            std::future::pending().await
        }
        async fn read(&self, _company: &str) -> Result<Option<LeadRecord>> {
            std::future::pending().await
        }
        async fn upsert(&self, _record: &LeadRecord) -> Result<LeadRecord> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn storage_calls_are_bounded() {
        let ledger = Ledger::new(Arc::new(StalledStore)).with_timeout(Duration::from_millis(20));
        assert!(ledger.load().await.is_empty());

        let rec = ledger.reconcile("Acme", "AI").await;
        assert_eq!(rec.outcome, ReconcileOutcome::NewCompany);

        let err = ledger.commit(&rec.staged().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn company_lock_serializes_cycles() {
        let (_, ledger) = table_ledger();
        let ledger = Arc::new(ledger);

        let guard = ledger.lock("Acme").await;
        let contender = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                let _g = ledger.lock("Acme").await;
                ledger.reconcile("Acme", "AI").await.outcome
            })
        };
        // Other companies are not blocked.
        let _other = ledger.lock("Globex").await;

        let rec = ledger.reconcile("Acme", "AI").await;
        ledger.commit(&rec.staged().unwrap()).await.unwrap();
        drop(guard);

        assert_eq!(contender.await.unwrap(), ReconcileOutcome::AlreadyNotified);
    }

    #[tokio::test]
    async fn import_merges_and_counts_growth() {
        let (_, ledger) = table_ledger();
        seed(&ledger, "Acme", "AI").await;
        let at = record::parse_timestamp("2025-08-01 00:00:00").unwrap();
        let incoming = vec![
            LeadRecord::new("Acme", AreaSet::parse("AI"), at),
            LeadRecord::new("Globex", AreaSet::parse("AWS"), at),
        ];
        assert_eq!(ledger.import(&incoming).await.unwrap(), 1);
        assert_eq!(ledger.records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn table_store_has_no_history() {
        let (_, ledger) = table_ledger();
        assert!(ledger.history("Acme").await.is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        const LABELS: [&str; 6] = ["AI", "AWS", "ai", "Cloud Migration", "SaaS", "Zones"];

        /// One reconcile cycle: candidate label indices, and which novel areas get delivered.
        fn cycle() -> impl Strategy<Value = (Vec<usize>, Vec<bool>, bool)> {
            (
                prop::collection::vec(0..LABELS.len(), 0..5),
                prop::collection::vec(any::<bool>(), LABELS.len()),
                any::<bool>(),
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn notified_areas_never_shrink_over_random_cycles(cycles in prop::collection::vec(cycle(), 1..10)) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let (store, ledger) = table_ledger();
                    let mut seen = AreaSet::new();
                    for (picks, delivered, semicolons) in cycles {
                        let joiner = if semicolons { "; " } else { ", " };
                        let raw = picks.iter().map(|&i| LABELS[i]).collect::<Vec<_>>().join(joiner);

                        let rec = ledger.reconcile("Acme", &raw).await;
                        let sent: AreaSet = rec
                            .novel
                            .iter()
                            .filter(|area| {
                                LABELS
                                    .iter()
                                    .position(|l| l == area)
                                    .is_some_and(|i| delivered[i])
                            })
                            .collect();
                        if let Some(staged) = rec.stage(&sent) {
                            ledger.commit(&staged).await.unwrap();
                        }

                        let current = store
                            .read("Acme")
                            .await
                            .unwrap()
                            .map(|r| r.notified_areas)
                            .unwrap_or_default();
                        assert!(seen.is_subset(&current), "{seen} lost after {raw:?}");
                        assert!(sent.is_subset(&current), "{sent} not recorded");
                        seen = current;
                    }
                });
            }
        }
    }
}
