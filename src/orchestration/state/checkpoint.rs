//! Checkpoint sealing and validation for run state
//!
//! Every save bumps the version and recomputes a checksum over the fields
//! that drive replay. A mismatch on load means the file was edited or
//! truncated outside the runtime.

use super::RunState;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Calculate a checksum for the run state
pub fn calculate_checksum(state: &RunState) -> String {
    let mut hasher = Sha256::new();

    hasher.update(state.instance_id.as_bytes());
    hasher.update(state.workflow.as_bytes());
    hasher.update(format!("{:?}", state.phase).as_bytes());
    hasher.update(state.input.to_string().as_bytes());

    // BTreeMap iteration is ordered by task id
    for (task_id, outcome) in &state.history {
        hasher.update(task_id.to_le_bytes());
        hasher.update(outcome.task_name.as_bytes());
        hasher.update(outcome.attempts.to_le_bytes());
        match &outcome.result {
            Ok(value) => hasher.update(format!("ok:{value}").as_bytes()),
            Err(error) => hasher.update(format!("err:{error}").as_bytes()),
        }
    }

    for reading in &state.clock {
        hasher.update(reading.to_rfc3339().as_bytes());
    }

    if let Some(output) = &state.output {
        hasher.update(output.as_bytes());
    }
    if let Some(reason) = &state.failure_reason {
        hasher.update(reason.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

/// Bump the version and recompute the checksum before a save
pub fn seal(state: &mut RunState) {
    state.version += 1;
    state.checksum = calculate_checksum(state);
}

/// Verify a loaded state; logs and returns false on mismatch
pub fn verify(state: &RunState) -> bool {
    let expected = calculate_checksum(state);
    if state.checksum != expected {
        warn!(
            "Checksum mismatch for instance {} v{}: expected {}, got {}",
            state.instance_id, state.version, expected, state.checksum
        );
        return false;
    }
    true
}
