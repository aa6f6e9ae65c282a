//! Directory model: parses the tabular directory source into validated `ConfigRow`s.
//!
//! Columns are matched by header name. Rows missing a group name or a `to` address
//! are dropped, not reported; a source where nothing survives is a configuration
//! error.

pub mod attachments;
pub mod recipients;
pub mod sample;


use std::io::Read;
use std::path::Path;

use mailrun_common::error::AppError;
use mailrun_common::types::ConfigRow;

/// Canonical column names and the header spellings accepted for each.
const GROUP_NAME: (&str, &[&str]) = ("group_name", &["group_name", "Hospital"]);
const TO: (&str, &[&str]) = ("to", &["to", "To"]);
const CC: (&str, &[&str]) = ("cc", &["cc", "Cc", "CC"]);
const BCC: (&str, &[&str]) = ("bcc", &["bcc", "Bcc", "BCC"]);
const SUBJECT_TEMPLATE: (&str, &[&str]) =
    ("subject_template", &["subject_template", "SubjectTemplate"]);
const BODY_TEMPLATE: (&str, &[&str]) = ("body_template", &["body_template", "BodyTemplate"]);

/// Identity column candidates in priority order.
pub const IDENTITY_CANDIDATES: &[&str] =
    &["sequence_id", "序号", "Seq", "ID", "Index", "No", "#", "Number"];

/// Resolved column positions for one header row.
#[derive(Debug)]
struct ColumnMap {
    identity: Option<usize>,
    group_name: usize,
    to: usize,
    cc: Option<usize>,
    bcc: Option<usize>,
    subject_template: usize,
    body_template: usize,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Result<Self, AppError> {
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| headers.iter().position(|h| h == alias))
        };

        let mut missing = Vec::new();
        let mut require = |column: (&str, &[&str])| {
            let found = find(column.1);
            if found.is_none() {
                missing.push(column.0.to_string());
            }
            found.unwrap_or_default()
        };

        let group_name = require(GROUP_NAME);
        let to = require(TO);
        let subject_template = require(SUBJECT_TEMPLATE);
        let body_template = require(BODY_TEMPLATE);

        if !missing.is_empty() {
            return Err(AppError::MissingColumns(missing));
        }

        let identity = IDENTITY_CANDIDATES
            .iter()
            .find_map(|cand| headers.iter().position(|h| h == cand));

        Ok(Self {
            identity,
            group_name,
            to,
            cc: find(CC.1),
            bcc: find(BCC.1),
            subject_template,
            body_template,
        })
    }
}

fn malformed(e: csv::Error) -> AppError {
    AppError::Config(format!("malformed directory source: {}", e))
}

/// Parse a directory source from any reader.
///
/// Fails with a configuration error when the source is not readable CSV, when
/// the header row is absent, when required columns are missing (naming exactly
/// those columns), or when no row survives validation.
pub fn parse_directory<R: Read>(source: R) -> Result<Vec<ConfigRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::Config("directory source has no header row".into()));
    }

    let columns = ColumnMap::resolve(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(malformed)?;
        let position = idx + 1;
        let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        let optional = |i: Option<usize>| i.map(field).unwrap_or_default();

        let group_name = field(columns.group_name);
        let to = field(columns.to);
        if group_name.is_empty() || to.is_empty() {
            tracing::debug!(position, "Dropping directory row without group name or recipient");
            continue;
        }

        let sequence_id = match columns.identity.map(field) {
            Some(id) if !id.is_empty() => id,
            _ => position.to_string(),
        };

        rows.push(ConfigRow {
            sequence_id,
            group_name,
            to,
            cc: optional(columns.cc),
            bcc: optional(columns.bcc),
            subject_template: field(columns.subject_template),
            body_template: field(columns.body_template),
        });
    }

    if rows.is_empty() {
        return Err(AppError::Config(
            "directory source contains no valid rows".into(),
        ));
    }

    tracing::debug!(rows = rows.len(), "Parsed directory source");
    Ok(rows)
}

/// Parse a directory source file.
pub fn parse_directory_file(path: &Path) -> Result<Vec<ConfigRow>, AppError> {
    if !path.is_file() {
        return Err(AppError::Config(format!(
            "directory source not found: {}",
            path.display()
        )));
    }
    let file = std::fs::File::open(path)?;
    parse_directory(file)
}
