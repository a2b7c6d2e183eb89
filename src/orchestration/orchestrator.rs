//! Grade calculation workflow
//!
//! Fans out one grading task per student, waits for all of them, merges the
//! results and writes the report once. All decisions are driven by the
//! context so the workflow replays cleanly after a crash.

use super::aggregation::{aggregate, FailurePolicy};
use super::context::OrchestrationContext;
use super::errors::{OrchestrationError, OrchestrationResult};
use super::runtime::Workflow;
use super::state::RunPhase;
use super::OrchestrationInput;
use crate::output::{OutputRequest, WrittenReport};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Workflow name the ingestion trigger starts
pub const GRADE_WORKFLOW: &str = "grade_calc";
/// Task grading one student partition
pub const GRADE_TASK: &str = "grade_student";
/// Task persisting the report
pub const WRITE_OUTPUT_TASK: &str = "write_output";

pub struct GradeWorkflow {
    policy: FailurePolicy,
}

impl GradeWorkflow {
    pub fn new(policy: FailurePolicy) -> Self {
        Self { policy }
    }
}

impl Default for GradeWorkflow {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}

#[async_trait]
impl Workflow for GradeWorkflow {
    async fn run(&self, ctx: &OrchestrationContext) -> OrchestrationResult<String> {
        let input: OrchestrationInput = ctx.input()?;
        if input.output_name.trim().is_empty() {
            return Err(OrchestrationError::InvalidInput {
                reason: "output_name is empty".to_string(),
            });
        }

        ctx.advance(RunPhase::FanningOut).await?;
        info!(
            "Instance {}: dispatching {} grading task(s)",
            ctx.instance_id(),
            input.students.len()
        );
        let tasks: Vec<_> = input
            .students
            .iter()
            .map(|student| ctx.call_task(GRADE_TASK, Value::String(student.clone())))
            .collect();

        ctx.advance(RunPhase::Waiting).await?;
        let outcomes = ctx.wait_all(tasks).await;
        ctx.ensure_not_cancelled()?;

        ctx.advance(RunPhase::Aggregating).await?;
        let aggregate = aggregate(&input.students, &outcomes);
        let summary = &aggregate.summary;
        info!(
            "Instance {}: {} graded, {} failed of {} dispatched",
            ctx.instance_id(),
            summary.graded,
            summary.failed(),
            summary.dispatched
        );
        self.policy.check(summary)?;
        ctx.ensure_not_cancelled()?;

        ctx.advance(RunPhase::WritingOutput).await?;
        // A cancel can land while the phase change is being saved
        ctx.ensure_not_cancelled()?;
        let content = aggregate
            .report
            .render()
            .map_err(|e| OrchestrationError::OutputWriteFailed {
                output_name: input.output_name.clone(),
                attempts: 0,
                reason: e.to_string(),
            })?;
        let request = OutputRequest {
            content,
            name: input.output_name.clone(),
        };
        let outcome = ctx
            .call_task(WRITE_OUTPUT_TASK, serde_json::to_value(&request)?)
            .await;
        let written: WrittenReport = match outcome.result {
            Ok(value) => serde_json::from_value(value)?,
            Err(error) => {
                return Err(OrchestrationError::OutputWriteFailed {
                    output_name: input.output_name,
                    attempts: outcome.attempts,
                    reason: error.message,
                })
            }
        };

        let finished_at = ctx.current_time().await?;
        let duration = finished_at - input.start_time;
        info!(
            "Instance {}: grading took {:.3}s",
            ctx.instance_id(),
            duration.num_milliseconds() as f64 / 1000.0
        );

        Ok(format!(
            "Graded {} of {} student(s), {} failed; report written to {} in {:.3}s",
            summary.graded,
            summary.dispatched,
            summary.failed(),
            written.location,
            duration.num_milliseconds() as f64 / 1000.0
        ))
    }
}
