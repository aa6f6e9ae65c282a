//! Per-run CSV audit log.
//!
//! One file per run, `send_log_<YYYYmmdd_HHMMSS>.csv`, one line per dispatched
//! row. Each line is flushed as soon as it is written so an interrupted run keeps
//! everything recorded so far.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use mailrun_common::error::AppError;
use mailrun_common::types::DispatchMode;

use crate::report::RowResult;

pub const RUN_LOG_HEADER: [&str; 8] = [
    "time",
    "sequence_id",
    "group_name",
    "to",
    "subject",
    "attachment_count",
    "mode",
    "result",
];

#[derive(Debug, Serialize)]
struct RunLogEntry<'a> {
    time: String,
    sequence_id: &'a str,
    group_name: &'a str,
    to: &'a str,
    subject: &'a str,
    attachment_count: usize,
    mode: DispatchMode,
    result: String,
}

pub struct RunLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl RunLog {
    /// Create a new log file in `dir`, never reusing an existing file name.
    pub fn create(dir: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = dir.join(format!("send_log_{}.csv", stamp));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("send_log_{}_{}.csv", stamp, n));
            n += 1;
        }
        Self::create_at(path)
    }

    pub fn create_at(path: PathBuf) -> Result<Self, AppError> {
        let file = File::create(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(RUN_LOG_HEADER)?;
        writer.flush()?;
        tracing::info!(path = %path.display(), "Run log opened");
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(
        &mut self,
        result: &RowResult,
        attachment_count: usize,
        mode: DispatchMode,
    ) -> Result<(), AppError> {
        let entry = RunLogEntry {
            time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            sequence_id: &result.sequence_id,
            group_name: &result.group_name,
            to: &result.to,
            subject: result.subject.as_deref().unwrap_or(""),
            attachment_count,
            mode,
            result: result.outcome.to_string(),
        };
        self.writer.serialize(&entry)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailrun_common::types::DispatchOutcome;

    fn result(id: &str, subject: Option<&str>, outcome: DispatchOutcome) -> RowResult {
        RowResult {
            sequence_id: id.to_string(),
            group_name: "West, Inc".into(),
            to: "a@x.com; b@x.com".into(),
            subject: subject.map(String::from),
            outcome,
        }
    }

    #[test]
    fn test_header_written_on_create() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::create(dir.path()).unwrap();
        let name = log.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("send_log_") && name.ends_with(".csv"));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content.trim_end(),
            "time,sequence_id,group_name,to,subject,attachment_count,mode,result"
        );
    }

    #[test]
    fn test_entries_are_visible_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::create(dir.path()).unwrap();
        log.record(&result("1", Some("Report"), DispatchOutcome::Sent), 2, DispatchMode::Send)
            .unwrap();
        log.record(
            &result("2", None, DispatchOutcome::Failed("bad template".into())),
            2,
            DispatchMode::Send,
        )
        .unwrap();

        let mut reader = csv::Reader::from_path(log.path()).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "West, Inc");
        assert_eq!(&rows[0][5], "2");
        assert_eq!(&rows[0][6], "send");
        assert_eq!(&rows[0][7], "Sent");
        assert_eq!(&rows[1][4], "");
        assert_eq!(&rows[1][7], "Failed: bad template");
    }

    #[test]
    fn test_never_reuses_a_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunLog::create(dir.path()).unwrap();
        let second = RunLog::create(dir.path()).unwrap();
        assert_ne!(first.path(), second.path());
    }
}
