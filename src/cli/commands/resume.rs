//! Resume and cancel commands

use crate::app::App;
use crate::cli::commands::status::{finish_with, print_status};
use anyhow::Result;

/// Replay an interrupted instance to completion
pub async fn run_resume_command(app: &App, instance_id: &str) -> Result<()> {
    let status = app.runtime.resume(instance_id).await?;
    if status.is_terminal() {
        println!("Instance {instance_id} already finished");
        print_status(&status);
        return Ok(());
    }

    println!("Resuming {instance_id}");
    let status = app.runtime.wait_for_completion(instance_id).await?;
    finish_with(&status)
}

pub async fn run_cancel_command(app: &App, instance_id: &str) -> Result<()> {
    let status = app.runtime.cancel(instance_id).await?;
    print_status(&status);
    Ok(())
}
