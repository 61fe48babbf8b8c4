//! Lead-area labels: normalization and candidate parsing.
//!
//! A set of areas is always compared and stored in normalized form: split on
//! `,` or `;`, trimmed, empty segments dropped, deduplicated, sorted, joined
//! with `", "`. Matching is exact-string after normalization; no case folding.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Separator used in the normalized rendering.
const JOINER: &str = ", ";

/// Values the extraction step emits when it found nothing.
const PLACEHOLDERS: [&str; 5] = ["not available", "n/a", "none", "not found", "unknown"];

/// `**Lead Identification Area**: ...` / `**Lead Identification Areas**: ...`
static AREA_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s\-*\d.]*\**\s*lead identification areas?\s*\**\s*:\s*\**\s*(.*)$")
        .expect("area field regex")
});

// ---------------------------------------------------------------------------
// AreaSet
// ---------------------------------------------------------------------------

/// A normalized set of business-area labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AreaSet(BTreeSet<String>);

impl AreaSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw area string using the normalization rule.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split([',', ';'])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, area: &str) -> bool {
        self.0.contains(area)
    }

    /// Areas in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Areas in `self` that are not in `other`.
    pub fn difference(&self, other: &AreaSet) -> AreaSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    /// Areas in either set.
    pub fn union(&self, other: &AreaSet) -> AreaSet {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Areas in both sets.
    pub fn intersection(&self, other: &AreaSet) -> AreaSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn is_subset(&self, other: &AreaSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Add one already-trimmed label. Returns `false` if it was present.
    pub fn insert(&mut self, area: impl Into<String>) -> bool {
        let area = area.into();
        let area = area.trim();
        !area.is_empty() && self.0.insert(area.to_string())
    }
}

impl fmt::Display for AreaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for area in &self.0 {
            if !first {
                f.write_str(JOINER)?;
            }
            f.write_str(area)?;
            first = false;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for AreaSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = AreaSet::new();
        for area in iter {
            set.insert(area);
        }
        set
    }
}

impl<'a> IntoIterator for &'a AreaSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Normalize a raw area string to its canonical rendering.
pub fn normalize(raw: &str) -> String {
    AreaSet::parse(raw).to_string()
}

// ---------------------------------------------------------------------------
// Candidate parsing
// ---------------------------------------------------------------------------

/// Parse the analysis step's candidate output into an area set.
///
/// Accepts either a bare list (`"AI, AWS"`) or a larger extraction document
/// containing a `**Lead Identification Area**: ...` field, in which case only
/// the first such field is read. A document without that field yields no
/// candidates. Emphasis markers are stripped and placeholder values such as
/// `Not available` are dropped.
pub fn parse_candidates(raw: &str) -> AreaSet {
    let field = AREA_FIELD.captures(raw).and_then(|caps| caps.get(1));
    let list = match field {
        Some(m) => m.as_str(),
        None if is_bare_list(raw) => raw,
        None => return AreaSet::new(),
    };

    list.split([',', ';'])
        .map(clean_segment)
        .filter(|s| !s.is_empty() && !is_placeholder(s))
        .collect()
}

/// One line of labels with no field markup and no talk about the field.
fn is_bare_list(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.contains(['\n', ':'])
        && !raw.contains("**")
        && !raw.to_ascii_lowercase().contains("lead identification")
}

fn clean_segment(segment: &str) -> &str {
    segment
        .trim()
        .trim_start_matches(['-', '•'])
        .trim_matches(['*', '`', '_', ' ', '\t', '.'])
}

fn is_placeholder(segment: &str) -> bool {
    PLACEHOLDERS
        .iter()
        .any(|p| segment.eq_ignore_ascii_case(p))
}
