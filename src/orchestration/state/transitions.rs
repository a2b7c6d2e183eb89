//! State machine transitions for orchestration runs
//!
//! Enforces the phase order and the terminal-state invariants.

use super::{RunPhase, RunState, StateError, StateMachine};
use chrono::Utc;
use tracing::{debug, error, info};

impl RunState {
    /// Move to `to`, rejecting transitions the state machine does not allow
    pub fn transition_to(&mut self, machine: &StateMachine, to: RunPhase) -> Result<(), StateError> {
        let from = self.phase;
        if !machine.is_valid_transition(from, to) {
            return Err(StateError::InvalidTransition { from, to });
        }

        self.phase = to;
        self.updated_at = Utc::now();
        debug!(
            "Instance {} transitioned from {:?} to {:?}",
            self.instance_id, from, to
        );
        Ok(())
    }

    /// Mark the run as completed with its final message
    pub fn mark_completed(
        &mut self,
        machine: &StateMachine,
        message: String,
    ) -> Result<(), StateError> {
        self.transition_to(machine, RunPhase::Completed)?;
        self.output = Some(message);
        info!("Instance {} marked as completed", self.instance_id);
        Ok(())
    }

    /// Mark the run as failed; allowed from any non-terminal phase
    pub fn mark_failed(&mut self, reason: String) -> Result<(), StateError> {
        if self.is_terminal() {
            return Err(StateError::InvalidTransition {
                from: self.phase,
                to: RunPhase::Failed,
            });
        }

        self.phase = RunPhase::Failed;
        self.failure_reason = Some(reason);
        self.updated_at = Utc::now();
        error!("Instance {} marked as failed", self.instance_id);
        Ok(())
    }

    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, RunPhase::Completed | RunPhase::Failed)
    }

    /// Check if the run can be resumed
    pub fn can_resume(&self) -> bool {
        !self.is_terminal()
    }

    /// Get a human-readable status string
    pub fn status_string(&self) -> String {
        match self.phase {
            RunPhase::Started => "Started".to_string(),
            RunPhase::FanningOut => "Scheduling grading tasks".to_string(),
            RunPhase::Waiting => format!("Waiting ({} tasks settled)", self.history.len()),
            RunPhase::Aggregating => "Aggregating results".to_string(),
            RunPhase::WritingOutput => "Writing report".to_string(),
            RunPhase::Completed => "Completed".to_string(),
            RunPhase::Failed => format!(
                "Failed: {}",
                self.failure_reason.as_deref().unwrap_or("unknown reason")
            ),
        }
    }
}
