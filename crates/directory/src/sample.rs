use std::io::Write;
use std::path::Path;

use mailrun_common::error::AppError;

const HEADER: [&str; 7] = [
    "sequence_id",
    "group_name",
    "to",
    "cc",
    "bcc",
    "subject_template",
    "body_template",
];

const SAMPLE_ROWS: [[&str; 7]; 2] = [
    [
        "1",
        "示例医院A",
        "a@x.com; b@y.com",
        "",
        "",
        "【{group_name}】报告（{date_range_cn}）",
        "[indent]尊敬的{group_name}同事：\n\n[indent]附件为 {date_range_cn} 的相关报告，请查收。\n[right]此致\n[right]敬礼",
    ],
    [
        "2",
        "示例医院B",
        "exampleB@hospital.com",
        "",
        "",
        "{group_name}—每周报告（{start_date} 至 {end_date}）",
        "Dear team at {group_name},\n\nPlease find attached the reports covering {start_date_cn} 至 {end_date_cn}.\n[right]Best regards.",
    ],
];

/// Write a sample directory source to `path` unless something already exists there.
///
/// Returns `true` if a file was written. The file starts with a UTF-8 BOM so
/// spreadsheet tools detect the encoding.
pub fn write_sample_directory(path: &Path) -> Result<bool, AppError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all("\u{feff}".as_bytes())?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(HEADER)?;
    for row in SAMPLE_ROWS {
        writer.write_record(row)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), "Wrote sample directory source");
    Ok(true)
}
