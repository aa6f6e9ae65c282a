use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One directory entry: a recipient group and its message templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRow {
    /// Stable identity used to target retries. Duplicates are allowed.
    pub sequence_id: String,
    pub group_name: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject_template: String,
    pub body_template: String,
}

/// Whether a run creates drafts or actually sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Draft,
    Send,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Draft => write!(f, "draft"),
            DispatchMode::Send => write!(f, "send"),
        }
    }
}

/// Result of dispatching a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Drafted,
    Sent,
    SentAndArchived(PathBuf),
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, DispatchOutcome::Failed(_))
    }

    pub fn archived_path(&self) -> Option<&PathBuf> {
        match self {
            DispatchOutcome::SentAndArchived(path) => Some(path),
            _ => None,
        }
    }
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Drafted => write!(f, "Saved to Drafts"),
            DispatchOutcome::Sent => write!(f, "Sent"),
            DispatchOutcome::SentAndArchived(path) => {
                write!(f, "Sent (archived: {})", path.display())
            }
            DispatchOutcome::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

/// A fully rendered message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<PathBuf>,
}

/// Opaque handle to an item in a transport's sent store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An item as returned by a sent-store query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentRecord {
    pub id: RecordId,
    pub subject: String,
    pub sent_on: DateTime<Utc>,
    /// `None` when the store cannot report attachment counts
    pub attachment_count: Option<usize>,
}

/// Sent-store filter: subject equality plus a minimum send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentQuery {
    pub subject: String,
    pub sent_after: DateTime<Utc>,
    /// Maximum number of most-recent items to return
    pub limit: usize,
}

/// On-disk message formats a transport may be asked to save in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    Msg,
    MsgUnicode,
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveFormat::Msg => write!(f, "msg"),
            ArchiveFormat::MsgUnicode => write!(f, "msg_unicode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_classification() {
        assert!(DispatchOutcome::Drafted.is_success());
        assert!(DispatchOutcome::Sent.is_success());
        assert!(DispatchOutcome::SentAndArchived(PathBuf::from("a.msg")).is_success());
        assert!(!DispatchOutcome::Failed("boom".into()).is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(DispatchOutcome::Drafted.to_string(), "Saved to Drafts");
        assert_eq!(
            DispatchOutcome::Failed("rejected".into()).to_string(),
            "Failed: rejected"
        );
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&DispatchMode::Send).unwrap();
        assert_eq!(json, "\"send\"");
    }
}
