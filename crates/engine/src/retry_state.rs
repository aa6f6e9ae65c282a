//! Failure set carried between runs.
//!
//! Holds the identities of rows whose most recent attempt failed. A full run
//! replaces it; a resend of failed rows adds new failures and drops rows that
//! now succeed.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mailrun_common::error::AppError;
use mailrun_common::types::DispatchOutcome;

use crate::report::RunReport;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    failed_ids: BTreeSet<String>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row's latest outcome into the set.
    pub fn record(&mut self, sequence_id: &str, outcome: &DispatchOutcome) {
        if outcome.is_success() {
            self.failed_ids.remove(sequence_id);
        } else {
            self.failed_ids.insert(sequence_id.to_string());
        }
    }

    /// Fold every row of `report`, in order.
    pub fn absorb(mut self, report: &RunReport) -> Self {
        for result in &report.results {
            self.record(&result.sequence_id, &result.outcome);
        }
        self
    }

    pub fn contains(&self, sequence_id: &str) -> bool {
        self.failed_ids.contains(sequence_id)
    }

    pub fn is_empty(&self) -> bool {
        self.failed_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failed_ids.len()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed_ids.iter().map(String::as_str)
    }

    /// Load from `path`. A missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write via a temporary sibling and rename, so readers never see a partial file.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), failed = self.len(), "Retry state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RowResult;
    use mailrun_common::types::DispatchMode;

    fn report(rows: &[(&str, DispatchOutcome)]) -> RunReport {
        let mut report = RunReport::new(DispatchMode::Send, false);
        report.results = rows
            .iter()
            .map(|(id, outcome)| RowResult {
                sequence_id: id.to_string(),
                group_name: String::new(),
                to: String::new(),
                subject: None,
                outcome: outcome.clone(),
            })
            .collect();
        report
    }

    #[test]
    fn test_absorb_tracks_failures() {
        let state = RetryState::new().absorb(&report(&[
            ("A", DispatchOutcome::Sent),
            ("B", DispatchOutcome::Failed("x".into())),
        ]));
        assert!(state.contains("B"));
        assert!(!state.contains("A"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_success_removes_and_failure_adds() {
        let state = RetryState::new().absorb(&report(&[("B", DispatchOutcome::Failed("x".into()))]));
        let state = state.absorb(&report(&[
            ("B", DispatchOutcome::Sent),
            ("C", DispatchOutcome::Failed("y".into())),
        ]));
        assert_eq!(state.failed_ids().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn test_rows_not_in_report_are_untouched() {
        let state = RetryState::new().absorb(&report(&[
            ("B", DispatchOutcome::Failed("x".into())),
            ("C", DispatchOutcome::Failed("x".into())),
        ]));
        let state = state.absorb(&report(&[("B", DispatchOutcome::Drafted)]));
        assert_eq!(state.failed_ids().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("retry.json");
        assert!(RetryState::load(&path).unwrap().is_empty());

        let state = RetryState::new().absorb(&report(&[("7", DispatchOutcome::Failed("x".into()))]));
        state.save(&path).unwrap();
        assert_eq!(RetryState::load(&path).unwrap(), state);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(RetryState::load(&path), Err(AppError::Json(_))));
    }
}
