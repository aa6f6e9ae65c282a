//! Address extraction and the recipient → row index used by resend-by-recipient.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use mailrun_common::types::ConfigRow;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

/// Extract addresses from free-form text.
///
/// Accepts any mix of `;`, `,`, whitespace, newlines, full-width separators and
/// `Name <addr>` forms. Output is lower-cased, de-duplicated and keeps first-seen
/// order.
pub fn extract_addresses(text: &str) -> Vec<String> {
    let normalized = text
        .replace('；', ";")
        .replace('，', ",")
        .replace('、', ";");

    let mut seen = HashSet::new();
    EMAIL_RE
        .find_iter(&normalized)
        .map(|m| m.as_str().trim().to_lowercase())
        .filter(|addr| !addr.is_empty() && seen.insert(addr.clone()))
        .collect()
}

/// A directory row referenced by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    /// Zero-based position in the directory's row order
    pub position: usize,
    pub sequence_id: String,
}

/// Normalized address → rows whose `to` field contains it, in row order.
///
/// Rebuilt for every resend; never mutates the rows it was built from.
#[derive(Debug, Default)]
pub struct RecipientIndex {
    entries: HashMap<String, Vec<RowRef>>,
}

impl RecipientIndex {
    pub fn build(rows: &[ConfigRow]) -> Self {
        let mut entries: HashMap<String, Vec<RowRef>> = HashMap::new();
        for (position, row) in rows.iter().enumerate() {
            for addr in extract_addresses(&row.to) {
                entries.entry(addr).or_default().push(RowRef {
                    position,
                    sequence_id: row.sequence_id.clone(),
                });
            }
        }
        Self { entries }
    }

    /// Rows whose `to` contains `address` (case-insensitive), earliest first.
    pub fn lookup(&self, address: &str) -> &[RowRef] {
        self.entries
            .get(&address.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
