//! Change-set records decoded from the SCM engine.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::ScmAdapter;
use crate::errors::TimestampError;
use crate::timestamp::compare_with_tolerance;

/// A change as reported by the engine, before any normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChange {
    /// Item path, possibly with leading separators and a `;<revision>`
    /// qualifier.
    pub path: String,
    #[serde(default)]
    pub revision: Option<String>,
    /// Date text in any of the codec's patterns.
    pub date: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub comment: String,
    /// Action code or word (`A`, `M`, `D`, `add`, ...).
    #[serde(default)]
    pub action: String,
}

/// Kind of change applied to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
    Add,
    Edit,
    Delete,
}

impl EditType {
    /// Map an engine action code. Unknown codes count as edits.
    pub fn from_action(action: &str) -> Self {
        let action = action.trim();
        if action.eq_ignore_ascii_case("a") || action.eq_ignore_ascii_case("add") {
            Self::Add
        } else if action.eq_ignore_ascii_case("d") || action.eq_ignore_ascii_case("delete") {
            Self::Delete
        } else {
            Self::Edit
        }
    }
}

/// A normalized change-set entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetEntry {
    /// Canonical repository-relative path.
    pub path: String,
    pub revision: Option<String>,
    pub date: DateTime<Utc>,
    pub author: String,
    pub comment: String,
    pub edit_type: EditType,
    /// Request hint of the adapter that decoded the entry.
    pub request: Option<String>,
}

/// An ordered collection of change-set entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeLog {
    entries: Vec<ChangeSetEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a batch of raw records. Stops at the first record whose date
    /// can't be parsed.
    pub fn decode_all(
        adapter: &dyn ScmAdapter,
        raws: &[RawChange],
    ) -> Result<Self, TimestampError> {
        let entries = raws
            .iter()
            .map(|raw| adapter.decode_change(raw))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = entries.len(), variant = %adapter.variant(), "decoded change log");
        Ok(Self { entries })
    }

    pub fn push(&mut self, entry: ChangeSetEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeSetEntry> {
        self.entries.iter()
    }

    /// Sort by date, oldest first. Entries with the same date are ordered by
    /// path; the sort is stable beyond that.
    pub fn sort_by_date(&mut self) {
        self.entries
            .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    }

    /// Entries later than `reference` by more than `tolerance_ms`.
    ///
    /// An entry within tolerance of the reference counts as already seen, so
    /// a date that lost its seconds in a format round trip isn't reported
    /// twice.
    pub fn since(&self, reference: &DateTime<Utc>, tolerance_ms: i64) -> Vec<&ChangeSetEntry> {
        self.entries
            .iter()
            .filter(|e| compare_with_tolerance(&e.date, reference, tolerance_ms) == Ordering::Greater)
            .collect()
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a ChangeSetEntry;
    type IntoIter = std::slice::Iter<'a, ChangeSetEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<ChangeSetEntry> for ChangeLog {
    fn from_iter<I: IntoIterator<Item = ChangeSetEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{AdapterHints, CapabilityVariant};
    use crate::timestamp::CodecZone;
    use chrono::{Duration, TimeZone};

    fn entry(path: &str, date: DateTime<Utc>) -> ChangeSetEntry {
        ChangeSetEntry {
            path: path.into(),
            revision: None,
            date,
            author: "bob".into(),
            comment: String::new(),
            edit_type: EditType::Edit,
            request: None,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_edit_type_from_action() {
        assert_eq!(EditType::from_action("A"), EditType::Add);
        assert_eq!(EditType::from_action(" add "), EditType::Add);
        assert_eq!(EditType::from_action("D"), EditType::Delete);
        assert_eq!(EditType::from_action("Delete"), EditType::Delete);
        assert_eq!(EditType::from_action("M"), EditType::Edit);
        assert_eq!(EditType::from_action(""), EditType::Edit);
    }

    #[test]
    fn test_sort_by_date_then_path() {
        let mut log: ChangeLog = vec![
            entry("b.c", base() + Duration::seconds(5)),
            entry("z.c", base()),
            entry("a.c", base()),
        ]
        .into_iter()
        .collect();
        log.sort_by_date();
        let paths: Vec<&str> = log.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.c", "z.c", "b.c"]);
    }

    #[test]
    fn test_since_applies_tolerance() {
        let log: ChangeLog = vec![
            entry("old.c", base() - Duration::seconds(10)),
            entry("same.c", base() + Duration::milliseconds(800)),
            entry("new.c", base() + Duration::seconds(3)),
        ]
        .into_iter()
        .collect();

        let fresh: Vec<&str> = log.since(&base(), 1000).iter().map(|e| e.path.as_str()).collect();
        assert_eq!(fresh, vec!["new.c"]);

        let strict: Vec<&str> = log.since(&base(), 0).iter().map(|e| e.path.as_str()).collect();
        assert_eq!(strict, vec!["same.c", "new.c"]);
    }

    #[test]
    fn test_decode_all() {
        let adapter = CapabilityVariant::Legacy.adapter(AdapterHints::default(), CodecZone::Utc);
        let raws = vec![
            RawChange {
                path: "//proj/src/main.c;5".into(),
                revision: None,
                date: "01-Jan-2020 10:00:00".into(),
                author: "alice".into(),
                comment: "first".into(),
                action: "A".into(),
            },
            RawChange {
                path: "/proj/README;2".into(),
                revision: None,
                date: "2020-01-02T00:00:00Z".into(),
                author: "bob".into(),
                comment: "docs".into(),
                action: "M".into(),
            },
        ];
        let log = ChangeLog::decode_all(adapter.as_ref(), &raws).unwrap();
        assert_eq!(log.len(), 2);
        let paths: Vec<&str> = log.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["proj/src/main.c", "proj/README"]);
    }

    #[test]
    fn test_decode_all_stops_on_bad_date() {
        let adapter = CapabilityVariant::Dm14.adapter(AdapterHints::default(), CodecZone::Utc);
        let raws = vec![RawChange {
            path: "a.c".into(),
            revision: None,
            date: "soon".into(),
            author: String::new(),
            comment: String::new(),
            action: String::new(),
        }];
        assert!(ChangeLog::decode_all(adapter.as_ref(), &raws).is_err());
    }

    #[test]
    fn test_raw_change_json_defaults() {
        let raw: RawChange =
            serde_json::from_str(r#"{"path": "/a;1", "date": "01-Jan-2020"}"#).unwrap();
        assert_eq!(raw.revision, None);
        assert!(raw.author.is_empty());
        assert!(raw.action.is_empty());
    }
}
