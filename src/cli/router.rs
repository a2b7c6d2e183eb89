//! Command routing

use crate::app::App;
use crate::cli::args::Commands;
use crate::cli::commands::*;
use crate::config::Config;
use anyhow::Result;

/// Run one parsed command against a wired application
pub async fn execute_command(command: Commands, config: Config) -> Result<()> {
    let app = App::build(config).await?;
    let result = match command {
        Commands::Process { artifact } => run_process_command(&app, &artifact).await,
        Commands::Submit { file, name } => run_submit_command(&app, &file, name).await,
        Commands::Watch { settle } => run_watch_command(&app, settle).await,
        Commands::Resume { instance_id } => run_resume_command(&app, &instance_id).await,
        Commands::Cancel { instance_id } => run_cancel_command(&app, &instance_id).await,
        Commands::Status { instance_id, json } => {
            run_status_command(&app, instance_id.as_deref(), json).await
        }
    };
    app.shutdown().await;
    result
}
