//! Student record parsing
//!
//! A student record is the tab-separated partition produced at ingestion:
//! the batch header row followed by every row belonging to one student.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column holding the student identifier
pub const STUDENT_ID_COLUMN: &str = "StudentID";
/// Column holding the numeric module result
pub const RESULT_COLUMN: &str = "Result";
/// Column holding the credit weight of the module
pub const CREDITS_COLUMN: &str = "Credits";
/// Column holding the compulsory-pass flag
pub const PASS_FOR_PROGRESS_COLUMN: &str = "PassForProgress";

/// Columns every batch must carry
pub const REQUIRED_COLUMNS: [&str; 4] = [
    STUDENT_ID_COLUMN,
    RESULT_COLUMN,
    CREDITS_COLUMN,
    PASS_FOR_PROGRESS_COLUMN,
];

/// A student record that cannot be graded
///
/// Never retried: the same bytes would fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Malformed record for student {}: {reason}", .student_id.as_deref().unwrap_or("<unknown>"))]
pub struct MalformedRecord {
    /// Student identifier when it could be read
    pub student_id: Option<String>,
    /// Human-readable reason
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(student_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            student_id,
            reason: reason.into(),
        }
    }
}

/// One parsed result row
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub student_id: String,
    pub result: f64,
    pub credits: f64,
    pub pass_for_progress: bool,
}

/// All rows for exactly one student, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct StudentRecord {
    rows: Vec<ResultRow>,
}

impl StudentRecord {
    /// Build a record from already-parsed rows
    pub fn from_rows(rows: Vec<ResultRow>) -> Result<Self, MalformedRecord> {
        if rows.is_empty() {
            return Err(MalformedRecord::new(None, "record has no rows"));
        }
        Ok(Self { rows })
    }

    /// Parse a serialized partition (header row plus data rows, tab separated)
    pub fn parse(serialized: &str) -> Result<Self, MalformedRecord> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(serialized.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| MalformedRecord::new(None, format!("unreadable header row: {e}")))?
            .clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| MalformedRecord::new(None, format!("missing column '{name}'")))
        };
        let id_idx = column(STUDENT_ID_COLUMN)?;
        let result_idx = column(RESULT_COLUMN)?;
        let credits_idx = column(CREDITS_COLUMN)?;
        let pass_idx = column(PASS_FOR_PROGRESS_COLUMN)?;

        let mut rows = Vec::new();
        let mut first_id: Option<String> = None;

        for (line, record) in reader.records().enumerate() {
            let row_no = line + 1;
            let record = record.map_err(|e| {
                MalformedRecord::new(first_id.clone(), format!("row {row_no}: {e}"))
            })?;

            let student_id = required(&record, id_idx)
                .ok_or_else(|| missing_value(first_id.clone(), row_no, STUDENT_ID_COLUMN))?
                .to_string();
            let owner = Some(first_id.get_or_insert_with(|| student_id.clone()).clone());

            let result = required(&record, result_idx)
                .ok_or_else(|| missing_value(owner.clone(), row_no, RESULT_COLUMN))
                .and_then(|raw| {
                    parse_number(raw).ok_or_else(|| {
                        MalformedRecord::new(
                            owner.clone(),
                            format!("row {row_no}: '{RESULT_COLUMN}' is not a number"),
                        )
                    })
                })?;
            let credits = required(&record, credits_idx)
                .ok_or_else(|| missing_value(owner.clone(), row_no, CREDITS_COLUMN))
                .and_then(|raw| {
                    parse_number(raw).ok_or_else(|| {
                        MalformedRecord::new(
                            owner.clone(),
                            format!("row {row_no}: '{CREDITS_COLUMN}' is not a number"),
                        )
                    })
                })?;
            let pass_for_progress = required(&record, pass_idx)
                .ok_or_else(|| missing_value(owner.clone(), row_no, PASS_FOR_PROGRESS_COLUMN))
                .and_then(|raw| {
                    parse_flag(raw).ok_or_else(|| {
                        MalformedRecord::new(
                            owner.clone(),
                            format!("row {row_no}: '{PASS_FOR_PROGRESS_COLUMN}' is not a boolean"),
                        )
                    })
                })?;

            rows.push(ResultRow {
                student_id,
                result,
                credits,
                pass_for_progress,
            });
        }

        Self::from_rows(rows)
    }

    /// Identifier taken from the first row
    pub fn student_id(&self) -> &str {
        &self.rows[0].student_id
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }
}

/// Best-effort read of the student id from a serialized partition
///
/// Used to label failures of partitions that could not be graded.
pub fn peek_student_id(serialized: &str) -> Option<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(serialized.as_bytes());
    let idx = reader
        .headers()
        .ok()?
        .iter()
        .position(|h| h.trim() == STUDENT_ID_COLUMN)?;
    let first = reader.records().next()?.ok()?;
    required(&first, idx).map(str::to_string)
}

fn required(record: &csv::StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|v| !v.is_empty())
}

fn missing_value(student_id: Option<String>, row_no: usize, column: &str) -> MalformedRecord {
    MalformedRecord::new(
        student_id,
        format!("row {row_no}: missing value for '{column}'"),
    )
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts the boolean spellings spreadsheet exports commonly produce
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
