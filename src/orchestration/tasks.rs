//! Grading task handler

use super::task::{TaskError, TaskHandler};
use crate::grading::{grade_serialized, MalformedRecord};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Grades one serialized student partition
///
/// A malformed partition is a permanent failure carrying the
/// [`MalformedRecord`] as structured detail.
#[derive(Debug, Default, Clone, Copy)]
pub struct GradeStudentTask;

impl GradeStudentTask {
    fn malformed(err: MalformedRecord) -> TaskError {
        let detail = serde_json::to_value(&err).unwrap_or(Value::Null);
        TaskError::permanent(err.to_string()).with_detail(detail)
    }
}

#[async_trait]
impl TaskHandler for GradeStudentTask {
    async fn execute(&self, payload: Value) -> Result<Value, TaskError> {
        let Value::String(serialized) = payload else {
            return Err(TaskError::permanent(
                "grading payload must be a serialized student record",
            ));
        };

        let grade = grade_serialized(&serialized).map_err(Self::malformed)?;
        debug!("Task graded student {}", grade.student_id);
        serde_json::to_value(grade).map_err(|e| TaskError::permanent(e.to_string()))
    }
}
