//! libSQL ledger store (local file).
//!
//! One row per company in `leads`. `upsert` reads and merges the current row
//! inside an `IMMEDIATE` transaction, so concurrent writers from other
//! processes serialize on the database lock instead of overwriting each other.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, TransactionBehavior, params};
use tokio::sync::Mutex;
use tracing::{info, warn};

use leadscout_shared::{LeadscoutError, Result};

use super::LedgerStore;
use crate::areas::AreaSet;
use crate::migrations;
use crate::record::{LeadRecord, format_timestamp, parse_timestamp};

fn storage_err(e: libsql::Error) -> LeadscoutError {
    LeadscoutError::storage(e)
}

pub struct SqlStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    /// Only one transaction per connection at a time.
    write_lock: Mutex<()>,
}

impl SqlStore {
    /// Open or create the database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LeadscoutError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self {
            db,
            conn,
            write_lock: Mutex::new(()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LeadscoutError::storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        match self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await
        {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    async fn merge_in_transaction(&self, record: &LeadRecord) -> Result<LeadRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(storage_err)?;

        let mut rows = tx
            .query(
                "SELECT notified_areas, last_updated FROM leads WHERE company_name = ?1",
                params![record.company_name.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut stored = LeadRecord::new(
            record.company_name.clone(),
            AreaSet::new(),
            record.last_updated,
        );
        if let Some(row) = rows.next().await.map_err(storage_err)? {
            // Keep existing areas even if the stored timestamp is unreadable.
            let areas = row.get::<String>(0).map_err(storage_err)?;
            stored.notified_areas = AreaSet::parse(&areas);
            if let Ok(at) = row.get::<String>(1).map_err(storage_err).and_then(|s| parse_timestamp(&s)) {
                stored.last_updated = at.max(record.last_updated);
            }
        }
        drop(rows);

        let added = record.notified_areas.difference(&stored.notified_areas);
        stored.notified_areas = stored.notified_areas.union(&record.notified_areas);

        let areas = stored.notified_areas.to_string();
        let ts = format_timestamp(&stored.last_updated);
        tx.execute(
            "INSERT INTO leads (company_name, notified_areas, last_updated)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(company_name) DO UPDATE SET
                notified_areas = excluded.notified_areas,
                last_updated = excluded.last_updated",
            params![record.company_name.as_str(), areas.as_str(), ts.as_str()],
        )
        .await
        .map_err(storage_err)?;

        let recorded_at = format_timestamp(&record.last_updated);
        for area in added.iter() {
            tx.execute(
                "INSERT INTO lead_events (company_name, area, recorded_at) VALUES (?1, ?2, ?3)",
                params![record.company_name.as_str(), area, recorded_at.as_str()],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(stored)
    }
}

/// Decode one `leads` row. `None` (with a warning) if it is malformed.
fn decode_row(row: &Row, index: usize) -> Option<LeadRecord> {
    let decoded = (|| -> Result<LeadRecord> {
        let company = row.get::<String>(0).map_err(storage_err)?;
        let areas = row.get::<String>(1).map_err(storage_err)?;
        let at = parse_timestamp(&row.get::<String>(2).map_err(storage_err)?)?;
        Ok(LeadRecord::new(company, AreaSet::parse(&areas), at))
    })();

    match decoded {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(
                error = %LeadscoutError::MalformedRecord { row: index, message: e.to_string() },
                "skipping malformed ledger row"
            );
            None
        }
    }
}

#[async_trait]
impl LedgerStore for SqlStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn read_all(&self) -> Result<Vec<LeadRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT company_name, notified_areas, last_updated FROM leads ORDER BY company_name",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut records = Vec::new();
        let mut index = 0;
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            index += 1;
            records.extend(decode_row(&row, index));
        }
        Ok(records)
    }

    async fn read(&self, company: &str) -> Result<Option<LeadRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT company_name, notified_areas, last_updated FROM leads WHERE company_name = ?1",
                params![company],
            )
            .await
            .map_err(storage_err)?;

        Ok(rows
            .next()
            .await
            .map_err(storage_err)?
            .and_then(|row| decode_row(&row, 1)))
    }

    async fn upsert(&self, record: &LeadRecord) -> Result<LeadRecord> {
        let _guard = self.write_lock.lock().await;
        let stored = self.merge_in_transaction(record).await?;
        info!(
            company = %stored.company_name,
            areas = %stored.notified_areas,
            "ledger row written"
        );
        Ok(stored)
    }

    async fn history(&self, company: &str) -> Result<Vec<(String, DateTime<Utc>)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT area, recorded_at FROM lead_events
                 WHERE company_name = ?1 ORDER BY id",
                params![company],
            )
            .await
            .map_err(storage_err)?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let area = row.get::<String>(0).map_err(storage_err)?;
            let at = parse_timestamp(&row.get::<String>(1).map_err(storage_err)?)?;
            events.push((area, at));
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_store() -> SqlStore {
        let tmp = std::env::temp_dir().join(format!("leadscout_test_{}.db", Uuid::now_v7()));
        SqlStore::open(&tmp).await.expect("open test db")
    }

    fn record(company: &str, areas: &str, at: &str) -> LeadRecord {
        LeadRecord::new(company, AreaSet::parse(areas), parse_timestamp(at).unwrap())
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.schema_version().await, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("leadscout_test_{}.db", Uuid::now_v7()));
        let first = SqlStore::open(&tmp).await.expect("first open");
        drop(first);
        let second = SqlStore::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 2);
    }

    #[tokio::test]
    async fn upsert_merges_and_is_monotonic() {
        let store = test_store().await;
        store
            .upsert(&record("Acme", "AI", "2025-08-01 00:00:00"))
            .await
            .unwrap();
        let merged = store
            .upsert(&record("Acme", "AWS", "2025-08-02 00:00:00"))
            .await
            .unwrap();
        assert_eq!(merged.notified_areas.to_string(), "AI, AWS");

        // An older, smaller write neither removes areas nor rewinds time.
        let stale = store
            .upsert(&record("Acme", "AI", "2025-07-01 00:00:00"))
            .await
            .unwrap();
        assert_eq!(stale.notified_areas.to_string(), "AI, AWS");
        assert_eq!(stale.timestamp(), "2025-08-02 00:00:00");

        let read = store.read("Acme").await.unwrap().unwrap();
        assert_eq!(read, stale);
    }

    #[tokio::test]
    async fn lookups_are_exact() {
        let store = test_store().await;
        store
            .upsert(&record("Acme", "AI", "2025-08-01 00:00:00"))
            .await
            .unwrap();
        assert!(store.read("acme").await.unwrap().is_none());
        assert_eq!(store.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_lists_each_added_area_once() {
        let store = test_store().await;
        store
            .upsert(&record("Acme", "AI, AWS", "2025-08-01 00:00:00"))
            .await
            .unwrap();
        store
            .upsert(&record("Acme", "AWS, SaaS", "2025-08-02 00:00:00"))
            .await
            .unwrap();

        let areas: Vec<String> = store
            .history("Acme")
            .await
            .unwrap()
            .into_iter()
            .map(|(area, _)| area)
            .collect();
        assert_eq!(areas, ["AI", "AWS", "SaaS"]);
    }

    #[tokio::test]
    async fn malformed_row_is_skipped() {
        let store = test_store().await;
        store
            .upsert(&record("Globex", "SaaS", "2025-08-01 00:00:00"))
            .await
            .unwrap();
        store
            .conn
            .execute(
                "INSERT INTO leads (company_name, notified_areas, last_updated) VALUES ('Acme', 'AI', 'garbage')",
                params![],
            )
            .await
            .unwrap();

        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].company_name, "Globex");

        // Merging onto the malformed row keeps its areas.
        let fixed = store
            .upsert(&record("Acme", "AWS", "2025-08-03 00:00:00"))
            .await
            .unwrap();
        assert_eq!(fixed.notified_areas.to_string(), "AI, AWS");
    }
}
