//! Batch partitioning
//!
//! Splits an uploaded batch into one tab-separated document per student.
//! Students appear in the order of their first row; each student's rows keep
//! their relative order; every partition repeats the batch header.
//! Short rows are kept as-is so the grader can report the missing values
//! against their student.

use crate::grading::record::{REQUIRED_COLUMNS, STUDENT_ID_COLUMN};
use csv::StringRecord;
use std::collections::HashMap;
use thiserror::Error;

/// Why a batch could not be split
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("batch has no header row")]
    MissingHeader,

    #[error("batch header lacks column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: missing StudentID")]
    MissingStudentId { row: usize },

    #[error("batch is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed batch: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to serialize partition: {0}")]
    Serialize(String),
}

/// Partition raw batch bytes
pub fn partition_bytes(bytes: &[u8]) -> Result<Vec<String>, PartitionError> {
    partition_batch(std::str::from_utf8(bytes)?)
}

/// Partition a batch by `StudentID`
pub fn partition_batch(content: &str) -> Result<Vec<String>, PartitionError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PartitionError::MissingHeader);
    }
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h.trim() == column) {
            return Err(PartitionError::MissingColumn(column.to_string()));
        }
    }
    let id_idx = headers
        .iter()
        .position(|h| h.trim() == STUDENT_ID_COLUMN)
        .ok_or_else(|| PartitionError::MissingColumn(STUDENT_ID_COLUMN.to_string()))?;

    let mut groups: Vec<Vec<StringRecord>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let student_id = record
            .get(id_idx)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(PartitionError::MissingStudentId { row: line + 1 })?;

        let slot = *index.entry(student_id.to_string()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    groups
        .iter()
        .map(|rows| serialize_partition(&headers, rows))
        .collect()
}

fn serialize_partition(headers: &StringRecord, rows: &[StringRecord]) -> Result<String, PartitionError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PartitionError::Serialize(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| PartitionError::Serialize(e.to_string()))
}
