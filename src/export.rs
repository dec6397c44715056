//! CSV export of dashboard collections.
//!
//! Records are flattened to their wire field names. The header comes from
//! the first record, so every record is expected to share its shape.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AdminError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvMode {
    /// Fields written verbatim, commas and newlines included.
    #[default]
    Legacy,
    /// Fields containing delimiters or quotes are quoted.
    Quoted,
}

pub fn to_csv<T: Serialize>(records: &[T], mode: CsvMode) -> Result<String, AdminError> {
    let first = records.first().ok_or(AdminError::EmptyExport)?;
    let headers: Vec<String> = flatten(first)?.into_iter().map(|(key, _)| key).collect();

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let fields = flatten(record)?;
        let row: Vec<String> = headers
            .iter()
            .map(|header| {
                fields
                    .iter()
                    .find(|(key, _)| key == header)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default()
            })
            .collect();
        rows.push(row);
    }

    match mode {
        CsvMode::Legacy => Ok(legacy_csv(&headers, &rows)),
        CsvMode::Quoted => quoted_csv(&headers, &rows),
    }
}

/// Plain comma join per line, so a single empty field is an empty line.
fn legacy_csv(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.join(","));
    lines.extend(rows.iter().map(|row| row.join(",")));
    lines.join("\n")
}

fn quoted_csv(headers: &[String], rows: &[Vec<String>]) -> Result<String, AdminError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(vec![]);

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AdminError::Internal(format!("csv buffer flush failed: {e}")))?;
    let mut csv_data = String::from_utf8(bytes)
        .map_err(|e| AdminError::Internal(format!("csv output is not utf-8: {e}")))?;
    if csv_data.ends_with('\n') {
        csv_data.pop();
    }
    Ok(csv_data)
}

/// `<view>-<timestamp>.csv`, timestamp in UTC with millisecond precision.
pub fn export_file_name(view: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}.csv",
        view,
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Writes an export into `dir` and returns the file path.
pub fn write_export<T: Serialize>(
    dir: &Path,
    view: &str,
    records: &[T],
    mode: CsvMode,
    now: DateTime<Utc>,
) -> Result<PathBuf, AdminError> {
    let csv_data = to_csv(records, mode)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(view, now));
    std::fs::write(&path, csv_data)?;
    Ok(path)
}

fn flatten<T: Serialize>(record: &T) -> Result<Vec<(String, String)>, AdminError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => {
            let mut fields = Vec::new();
            flatten_into("", &map, &mut fields);
            Ok(fields)
        }
        other => Err(AdminError::Internal(format!(
            "export records must be objects, got {other}"
        ))),
    }
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&name, inner, out),
            other => out.push((name, cell(other))),
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(","),
        Value::Object(_) => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportStatus;
    use crate::testing::report;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn flattens_uniform_records() {
        let records = vec![json!({"a": 1, "b": 2}), json!({"a": 3, "b": 4})];
        assert_eq!(to_csv(&records, CsvMode::Legacy).unwrap(), "a,b\n1,2\n3,4");
    }

    #[test]
    fn empty_collection_is_rejected() {
        let records: Vec<Value> = Vec::new();
        assert!(matches!(
            to_csv(&records, CsvMode::Legacy),
            Err(AdminError::EmptyExport)
        ));
    }

    #[test]
    fn legacy_mode_does_not_escape_delimiters() {
        let records = vec![json!({"title": "Lights out, east wing", "n": null})];
        assert_eq!(
            to_csv(&records, CsvMode::Legacy).unwrap(),
            "title,n\nLights out, east wing,"
        );
        assert_eq!(
            to_csv(&records, CsvMode::Quoted).unwrap(),
            "title,n\n\"Lights out, east wing\","
        );
    }

    #[test]
    fn nested_location_becomes_dotted_columns() {
        let mut record = report("r1", 1, ReportStatus::Resolved);
        record.harasser_details = Some("tall".to_string());
        let csv_data = to_csv(&[record], CsvMode::Legacy).unwrap();
        let mut lines = csv_data.lines();
        assert_eq!(
            lines.next().unwrap(),
            "_id,userId,Title,Description,HarasserDetails,Location.latitude,Location.longitude,Status,createdAt"
        );
        assert_eq!(
            lines.next().unwrap(),
            "r1,owner-r1,Report r1,Followed near the library,tall,12.97,77.59,Resolved,2026-03-01T12:00:00Z"
        );
    }

    #[test]
    fn legacy_single_empty_column_is_an_empty_line() {
        let records = vec![json!({"a": null}), json!({"a": "x"})];
        assert_eq!(to_csv(&records, CsvMode::Legacy).unwrap(), "a\n\nx");
    }

    #[test]
    fn legacy_mode_keeps_embedded_newlines() {
        let records = vec![json!({"note": "line one\nline two", "n": 1})];
        assert_eq!(
            to_csv(&records, CsvMode::Legacy).unwrap(),
            "note,n\nline one\nline two,1"
        );
    }

    #[test]
    fn missing_columns_render_empty() {
        let records = vec![json!({"a": 1, "b": 2}), json!({"a": 3})];
        assert_eq!(to_csv(&records, CsvMode::Legacy).unwrap(), "a,b\n1,2\n3,");
    }

    #[test]
    fn file_name_carries_view_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(export_file_name("sirens", now), "sirens-2026-03-04T05:06:07.000Z.csv");
    }

    #[test]
    fn write_export_creates_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let records = vec![json!({"a": 1})];
        let path = write_export(dir.path(), "users", &records, CsvMode::Legacy, now).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "a\n1");
    }
}
