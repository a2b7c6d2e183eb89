//! Grading rule
//!
//! Pure computation of one student's grade. Safe to call concurrently for
//! every student; nothing is shared between calls.

use super::classification::DegreeClass;
use super::record::{MalformedRecord, StudentRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Results below this on a compulsory component force the overall grade to 0
pub const COMPULSORY_PASS_MARK: f64 = 40.0;

/// Outcome of grading one student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub student_id: String,
    /// Rounded credit-weighted average; `None` is never produced by the
    /// evaluator but is accepted when reading reports back
    pub average_grade: Option<i64>,
    pub degree_class: DegreeClass,
}

/// True when any compulsory component was failed
pub fn fails_compulsory_component(record: &StudentRecord) -> bool {
    record
        .rows()
        .iter()
        .any(|row| row.pass_for_progress && row.result < COMPULSORY_PASS_MARK)
}

/// Credit-weighted mean of `Result`, unrounded
pub fn weighted_average(record: &StudentRecord) -> Result<f64, MalformedRecord> {
    let (weighted_sum, total_credits) = record
        .rows()
        .iter()
        .fold((0.0_f64, 0.0_f64), |(sum, credits), row| {
            (sum + row.result * row.credits, credits + row.credits)
        });

    if total_credits == 0.0 {
        return Err(MalformedRecord::new(
            Some(record.student_id().to_string()),
            "credits sum to zero",
        ));
    }

    let average = weighted_sum / total_credits;
    if !average.is_finite() {
        return Err(MalformedRecord::new(
            Some(record.student_id().to_string()),
            "weighted average is not finite",
        ));
    }
    Ok(average)
}

/// Round to the nearest integer, ties to even (69.5 -> 70, 68.5 -> 68)
pub fn round_grade(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Grade an already-parsed record
pub fn evaluate(record: &StudentRecord) -> Result<GradeResult, MalformedRecord> {
    let grade = if fails_compulsory_component(record) {
        0
    } else {
        round_grade(weighted_average(record)?)
    };

    let result = GradeResult {
        student_id: record.student_id().to_string(),
        average_grade: Some(grade),
        degree_class: DegreeClass::from_grade(grade),
    };
    debug!(
        "Graded student {}: {} ({})",
        result.student_id, grade, result.degree_class
    );
    Ok(result)
}

/// Parse a serialized partition and grade it
pub fn grade_serialized(serialized: &str) -> Result<GradeResult, MalformedRecord> {
    let record = StudentRecord::parse(serialized)?;
    evaluate(&record)
}
