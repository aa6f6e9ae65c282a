use thiserror::Error;

/// Batch-level errors. Anything here stops a run before the transport is touched,
/// except `Template` and `Transport`, which are carried per row.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Date range error: {0}")]
    DateRange(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("No failed rows to resend")]
    NoFailures,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rendering failures for a single row's subject or body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{name}}}'")]
    UnknownPlaceholder { name: String },

    #[error("placeholder '{{{name}}}' has no value in this context")]
    MissingValue { name: String },

    #[error("malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },
}

/// Failures reported by a mail transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("message rejected: {0}")]
    Rejected(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Archival failures. These degrade a row from archived to plain sent; they never
/// fail the row.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("sent copy of '{subject}' not visible after {waited_secs}s")]
    Timeout { subject: String, waited_secs: u64 },

    #[error("archive save failed after {attempts} attempts: {last_error}")]
    SaveExhausted { attempts: u32, last_error: String },

    #[error("archival cancelled")]
    Cancelled,

    #[error("archive directory error: {0}")]
    Io(#[from] std::io::Error),
}
