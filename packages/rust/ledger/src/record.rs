//! Per-company ledger records.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use leadscout_shared::{LeadscoutError, Result};

use crate::areas::AreaSet;

/// Timestamp format used by the tabular store and the `leads` table.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Areas already confirmed and notified for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadRecord {
    /// Unique key, exact match.
    pub company_name: String,
    /// Normalized set of notified areas. Only ever grows.
    pub notified_areas: AreaSet,
    /// Set on every mutation.
    pub last_updated: DateTime<Utc>,
}

impl LeadRecord {
    pub fn new(company_name: impl Into<String>, areas: AreaSet, at: DateTime<Utc>) -> Self {
        Self {
            company_name: company_name.into(),
            notified_areas: areas,
            last_updated: at,
        }
    }

    /// Fold `other`'s areas into this record. Keeps the newer timestamp.
    ///
    /// Returns `true` if any area was added.
    pub fn absorb(&mut self, other: &LeadRecord) -> bool {
        let merged = self.notified_areas.union(&other.notified_areas);
        let grew = merged.len() > self.notified_areas.len();
        self.notified_areas = merged;
        if other.last_updated > self.last_updated {
            self.last_updated = other.last_updated;
        }
        grew
    }

    /// `last_updated` rendered in [`TIMESTAMP_FORMAT`].
    pub fn timestamp(&self) -> String {
        format_timestamp(&self.last_updated)
    }
}

/// Current time truncated to the stored resolution.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Stored values carry no zone and are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| LeadscoutError::parse(format!("invalid timestamp {raw:?}: {e}")))
}
