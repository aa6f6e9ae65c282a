//! Per-run results and summary.

use serde::Serialize;

use mailrun_common::types::{DispatchMode, DispatchOutcome};

/// What happened to one dispatched row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowResult {
    pub sequence_id: String,
    pub group_name: String,
    pub to: String,
    /// Rendered subject; `None` when rendering failed
    pub subject: Option<String>,
    pub outcome: DispatchOutcome,
}

/// A recipient address found in more than one row's `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmbiguousRecipient {
    pub address: String,
    /// Matching rows' identities in directory order; the first one is used
    pub sequence_ids: Vec<String>,
}

impl std::fmt::Display for AmbiguousRecipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.address, self.sequence_ids.join(", "))
    }
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub mode: DispatchMode,
    /// Whether sent messages were being archived
    pub archiving: bool,
    pub results: Vec<RowResult>,
    /// Recipient resend only: addresses that matched no row
    pub unmatched: Vec<String>,
    /// Recipient resend only: addresses that matched several rows
    pub ambiguous: Vec<AmbiguousRecipient>,
    /// The run stopped before every row was attempted
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(mode: DispatchMode, archiving: bool) -> Self {
        Self {
            mode,
            archiving,
            results: Vec::new(),
            unmatched: Vec::new(),
            ambiguous: Vec::new(),
            cancelled: false,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn archived(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.archived_path().is_some())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }

    /// One-line summary. Archive counts are only shown for archiving send runs.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Processed {} rows: {} succeeded",
            self.total(),
            self.succeeded()
        );
        if self.mode == DispatchMode::Send && self.archiving {
            line.push_str(&format!(", {} archived", self.archived()));
        }
        line.push_str(&format!(", {} failed", self.failed()));
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for failure in self.failures() {
            writeln!(
                f,
                "  [{}] {}: {}",
                failure.sequence_id, failure.group_name, failure.outcome
            )?;
        }
        if !self.unmatched.is_empty() {
            writeln!(f, "Unmatched recipients: {}", self.unmatched.join(", "))?;
        }
        for ambiguous in &self.ambiguous {
            writeln!(f, "Ambiguous recipient: {} (first row used)", ambiguous)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn row(id: &str, outcome: DispatchOutcome) -> RowResult {
        RowResult {
            sequence_id: id.to_string(),
            group_name: format!("Group {}", id),
            to: "a@x.com".into(),
            subject: Some("s".into()),
            outcome,
        }
    }

    #[test]
    fn test_counts() {
        let mut report = RunReport::new(DispatchMode::Send, true);
        report.results = vec![
            row("1", DispatchOutcome::SentAndArchived(PathBuf::from("a.msg"))),
            row("2", DispatchOutcome::Sent),
            row("3", DispatchOutcome::Failed("rejected".into())),
        ];
        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.archived(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures().next().unwrap().sequence_id, "3");
        assert_eq!(
            report.summary(),
            "Processed 3 rows: 2 succeeded, 1 archived, 1 failed"
        );
    }

    #[test]
    fn test_draft_summary_omits_archive_count() {
        let mut report = RunReport::new(DispatchMode::Draft, true);
        report.results = vec![row("1", DispatchOutcome::Drafted)];
        assert_eq!(report.summary(), "Processed 1 rows: 1 succeeded, 0 failed");
    }

    #[test]
    fn test_display_lists_failures_and_recipients() {
        let mut report = RunReport::new(DispatchMode::Send, true);
        report.results = vec![row("7", DispatchOutcome::Failed("rejected".into()))];
        report.unmatched = vec!["ghost@x.com".into()];
        report.ambiguous = vec![AmbiguousRecipient {
            address: "shared@x.com".into(),
            sequence_ids: vec!["1".into(), "3".into()],
        }];

        let text = report.to_string();
        assert!(text.contains("[7] Group 7: Failed: rejected"));
        assert!(text.contains("Unmatched recipients: ghost@x.com"));
        assert!(text.contains("shared@x.com -> 1, 3"));
    }
}
