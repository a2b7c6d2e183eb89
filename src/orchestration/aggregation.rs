//! Fan-in aggregation
//!
//! Splits settled grading outcomes into the report and a per-student
//! failure summary. Every dispatched task lands in exactly one of the two.

use super::errors::{OrchestrationError, OrchestrationResult};
use super::task::{TaskErrorKind, TaskOutcome};
use crate::grading::{peek_student_id, GradeResult, MalformedRecord};
use crate::output::Report;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Why a student is missing from the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The student's rows could not be graded
    MalformedRecord,
    /// Every attempt failed with a transient error
    TransientExhausted,
    /// The task succeeded but returned something other than a grade
    InvalidTaskOutput,
}

/// One student that could not be graded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentFailure {
    /// Position of the student in the orchestration input
    pub task_index: usize,
    pub student_id: Option<String>,
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
}

/// Counts and details of student-level failures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub dispatched: usize,
    pub graded: usize,
    pub failures: Vec<StudentFailure>,
}

impl FailureSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Fraction of dispatched students that failed; 0 for an empty batch
    pub fn failure_ratio(&self) -> f64 {
        if self.dispatched == 0 {
            0.0
        } else {
            self.failed() as f64 / self.dispatched as f64
        }
    }
}

/// Result of fanning in one batch
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub report: Report,
    pub summary: FailureSummary,
}

/// When student failures should abort the whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Abort when `failed / dispatched` exceeds this; never abort when unset
    #[serde(default)]
    pub max_failure_ratio: Option<f64>,
}

impl FailurePolicy {
    pub fn check(&self, summary: &FailureSummary) -> OrchestrationResult<()> {
        match self.max_failure_ratio {
            Some(max_ratio) if summary.failure_ratio() > max_ratio => {
                Err(OrchestrationError::FailureThresholdExceeded {
                    failed: summary.failed(),
                    dispatched: summary.dispatched,
                    max_ratio,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Merge outcomes into a report and failure summary
///
/// `students` is the orchestration input; outcome `i` belongs to
/// `students[i]`. Failures carry the student id when it can be recovered.
pub fn aggregate(students: &[String], outcomes: &[TaskOutcome]) -> Aggregate {
    let mut grades = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();

    for (task_index, outcome) in outcomes.iter().enumerate() {
        let fallback_id = || {
            students
                .get(task_index)
                .and_then(|partition| peek_student_id(partition))
        };

        match &outcome.result {
            Ok(value) => match serde_json::from_value::<GradeResult>(value.clone()) {
                Ok(grade) => grades.push(grade),
                Err(e) => failures.push(StudentFailure {
                    task_index,
                    student_id: fallback_id(),
                    kind: FailureKind::InvalidTaskOutput,
                    message: e.to_string(),
                    attempts: outcome.attempts,
                }),
            },
            Err(error) => {
                let malformed = error
                    .detail
                    .clone()
                    .and_then(|detail| serde_json::from_value::<MalformedRecord>(detail).ok());
                let kind = match error.kind {
                    TaskErrorKind::Transient => FailureKind::TransientExhausted,
                    TaskErrorKind::Permanent => FailureKind::MalformedRecord,
                };
                failures.push(StudentFailure {
                    task_index,
                    student_id: malformed
                        .and_then(|m| m.student_id)
                        .or_else(fallback_id),
                    kind,
                    message: error.message.clone(),
                    attempts: outcome.attempts,
                });
            }
        }
    }

    for failure in &failures {
        warn!(
            "Student {} (task {}) not graded after {} attempt(s): {}",
            failure.student_id.as_deref().unwrap_or("<unknown>"),
            failure.task_index,
            failure.attempts,
            failure.message
        );
    }

    let summary = FailureSummary {
        dispatched: outcomes.len(),
        graded: grades.len(),
        failures,
    };
    Aggregate {
        report: Report::new(grades),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::DegreeClass;
    use crate::orchestration::task::TaskError;
    use serde_json::json;

    fn success(task_id: u64, id: &str, grade: i64) -> TaskOutcome {
        TaskOutcome {
            task_id,
            task_name: "grade_student".to_string(),
            attempts: 1,
            result: Ok(json!({
                "student_id": id,
                "average_grade": grade,
                "degree_class": DegreeClass::from_grade(grade),
            })),
        }
    }

    fn failure(task_id: u64, error: TaskError, attempts: u32) -> TaskOutcome {
        TaskOutcome {
            task_id,
            task_name: "grade_student".to_string(),
            attempts,
            result: Err(error),
        }
    }

    fn partition(id: &str) -> String {
        format!("StudentID\tResult\tCredits\tPassForProgress\n{id}\t50\t10\tFalse\n")
    }

    #[test]
    fn test_every_outcome_is_accounted_for() {
        let students: Vec<_> = ["3", "1", "2", "4"].iter().map(|id| partition(id)).collect();
        let malformed = MalformedRecord::new(Some("2".to_string()), "bad Result");
        let outcomes = vec![
            success(0, "3", 55),
            success(1, "1", 73),
            failure(
                2,
                TaskError::permanent(malformed.to_string())
                    .with_detail(serde_json::to_value(&malformed).unwrap()),
                1,
            ),
            failure(3, TaskError::transient("storage busy"), 3),
        ];

        let aggregate = aggregate(&students, &outcomes);
        let summary = &aggregate.summary;
        assert_eq!(summary.dispatched, 4);
        assert_eq!(summary.graded + summary.failed(), summary.dispatched);

        let ids: Vec<_> = aggregate.report.rows().iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);

        assert_eq!(summary.failures[0].kind, FailureKind::MalformedRecord);
        assert_eq!(summary.failures[0].student_id.as_deref(), Some("2"));
        assert_eq!(summary.failures[1].kind, FailureKind::TransientExhausted);
        assert_eq!(summary.failures[1].student_id.as_deref(), Some("4"));
        assert_eq!(summary.failures[1].attempts, 3);
    }

    #[test]
    fn test_unexpected_task_output() {
        let outcomes = vec![TaskOutcome {
            task_id: 0,
            task_name: "grade_student".to_string(),
            attempts: 1,
            result: Ok(json!("not a grade")),
        }];
        let aggregate = aggregate(&[partition("9")], &outcomes);
        assert_eq!(aggregate.summary.failures[0].kind, FailureKind::InvalidTaskOutput);
        assert!(aggregate.report.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let aggregate = aggregate(&[], &[]);
        assert!(aggregate.report.is_empty());
        assert_eq!(aggregate.summary.failure_ratio(), 0.0);
        assert!(FailurePolicy {
            max_failure_ratio: Some(0.0)
        }
        .check(&aggregate.summary)
        .is_ok());
    }

    #[test]
    fn test_failure_policy() {
        let summary = FailureSummary {
            dispatched: 4,
            graded: 3,
            failures: vec![StudentFailure {
                task_index: 0,
                student_id: None,
                kind: FailureKind::MalformedRecord,
                message: "bad".to_string(),
                attempts: 1,
            }],
        };

        assert!(FailurePolicy::default().check(&summary).is_ok());
        assert!(FailurePolicy {
            max_failure_ratio: Some(0.25)
        }
        .check(&summary)
        .is_ok());
        assert!(matches!(
            FailurePolicy {
                max_failure_ratio: Some(0.2)
            }
            .check(&summary),
            Err(OrchestrationError::FailureThresholdExceeded {
                failed: 1,
                dispatched: 4,
                ..
            })
        ));
    }
}
