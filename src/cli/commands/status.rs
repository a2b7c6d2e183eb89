//! Status reporting

use crate::app::App;
use crate::orchestration::{RunPhase, RunStatus};
use anyhow::{anyhow, Result};

pub fn print_status(status: &RunStatus) {
    match status {
        RunStatus::Running { instance_id, phase } => {
            println!("{instance_id}: running ({phase:?})")
        }
        RunStatus::Completed {
            instance_id,
            message,
        } => println!("{instance_id}: completed - {message}"),
        RunStatus::Failed {
            instance_id,
            reason,
        } => println!("{instance_id}: failed - {reason}"),
    }
}

/// Print a final status; a failed run becomes an error
pub(crate) fn finish_with(status: &RunStatus) -> Result<()> {
    print_status(status);
    match status {
        RunStatus::Failed {
            instance_id,
            reason,
        } => Err(anyhow!("Orchestration {instance_id} failed: {reason}")),
        _ => Ok(()),
    }
}

pub async fn run_status_command(app: &App, instance_id: Option<&str>, json: bool) -> Result<()> {
    if let Some(instance_id) = instance_id {
        let status = app.runtime.status(instance_id).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            print_status(&status);
        }
        return Ok(());
    }

    let runs = app.runtime.list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("No orchestrations recorded");
        return Ok(());
    }
    for run in runs {
        let marker = match run.phase {
            RunPhase::Completed => "done",
            RunPhase::Failed => "failed",
            _ => "open",
        };
        println!(
            "{}  {:<6}  {:?}  {} task(s), {} failed  updated {}",
            run.instance_id,
            marker,
            run.phase,
            run.tasks_settled,
            run.tasks_failed,
            run.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
