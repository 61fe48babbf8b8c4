//! Tabular ledger format.
//!
//! One row per company under the header
//! `Company Name,Lead Identification Areas,Timestamp`, encoded as CSV with
//! RFC-4180 quoting. Rows that fail to parse are kept verbatim so rewriting the
//! table never drops data the reader could not understand.

use std::mem::take;

use tracing::warn;

use leadscout_shared::{LeadscoutError, Result};

use crate::areas::AreaSet;
use crate::record::{LeadRecord, parse_timestamp};

pub const COMPANY_COLUMN: &str = "Company Name";
pub const AREAS_COLUMN: &str = "Lead Identification Areas";
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// One data row of the table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRow {
    Record(LeadRecord),
    /// Row that could not be parsed; written back exactly as read.
    Malformed { fields: Vec<String>, reason: String },
}

/// Decoded ledger table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadTable {
    rows: Vec<TableRow>,
}

/// Column positions resolved from the header row.
struct Columns {
    company: usize,
    areas: usize,
    timestamp: usize,
}

impl Columns {
    fn resolve(header: &[String]) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| LeadscoutError::parse(format!("table header lacks {name:?} column")))
        };
        Ok(Self {
            company: find(COMPANY_COLUMN)?,
            areas: find(AREAS_COLUMN)?,
            timestamp: find(TIMESTAMP_COLUMN)?,
        })
    }

    fn record(&self, fields: &[String]) -> std::result::Result<LeadRecord, String> {
        let cell = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");

        let company = cell(self.company);
        if company.is_empty() {
            return Err("empty company name".into());
        }
        let last_updated = parse_timestamp(cell(self.timestamp)).map_err(|e| e.to_string())?;

        Ok(LeadRecord::new(
            company,
            AreaSet::parse(cell(self.areas)),
            last_updated,
        ))
    }
}

impl LeadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode table bytes.
    ///
    /// Fails only when the whole table is unusable (not UTF-8, no recognizable
    /// header). Bad rows are kept as [`TableRow::Malformed`] and logged.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LeadscoutError::parse(format!("table is not UTF-8: {e}")))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut rows = parse_rows(text).into_iter();
        let Some(header) = rows.next() else {
            return Ok(Self::new());
        };
        let columns = Columns::resolve(&header)?;

        let mut table = Self::new();
        // Row numbers are 1-based and count the header.
        for (i, fields) in rows.enumerate() {
            let row = i + 2;
            match columns.record(&fields) {
                Ok(record) => table.push_record(record),
                Err(reason) => {
                    warn!(
                        error = %LeadscoutError::MalformedRecord { row, message: reason.clone() },
                        "skipping malformed ledger row"
                    );
                    table.rows.push(TableRow::Malformed { fields, reason });
                }
            }
        }
        Ok(table)
    }

    /// Encode the table, header first.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        write_row(&mut out, [COMPANY_COLUMN, AREAS_COLUMN, TIMESTAMP_COLUMN]);
        for row in &self.rows {
            match row {
                TableRow::Record(r) => {
                    let areas = r.notified_areas.to_string();
                    let ts = r.timestamp();
                    write_row(&mut out, [r.company_name.as_str(), &areas, &ts]);
                }
                TableRow::Malformed { fields, .. } => {
                    write_row(&mut out, fields.iter().map(String::as_str));
                }
            }
        }
        out.into_bytes()
    }

    /// Valid records in table order.
    pub fn records(&self) -> impl Iterator<Item = &LeadRecord> {
        self.rows.iter().filter_map(|row| match row {
            TableRow::Record(r) => Some(r),
            TableRow::Malformed { .. } => None,
        })
    }

    pub fn malformed_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row, TableRow::Malformed { .. }))
            .count()
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, company: &str) -> Option<&LeadRecord> {
        self.records().find(|r| r.company_name == company)
    }

    /// Upsert `record`, merging with any existing row for the same company.
    ///
    /// Areas are never removed. Returns the stored record.
    pub fn merge(&mut self, record: &LeadRecord) -> LeadRecord {
        let existing = self.rows.iter_mut().find_map(|row| match row {
            TableRow::Record(r) if r.company_name == record.company_name => Some(r),
            _ => None,
        });
        match existing {
            Some(current) => {
                current.absorb(record);
                current.clone()
            }
            None => {
                self.rows.push(TableRow::Record(record.clone()));
                record.clone()
            }
        }
    }

    fn push_record(&mut self, record: LeadRecord) {
        if self.get(&record.company_name).is_some() {
            warn!(company = %record.company_name, "duplicate ledger row, merging into first");
        }
        self.merge(&record);
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Split CSV text into rows of fields. Quotes and CRLF tolerant.
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\r' | '\n' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

fn write_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}
