use clap::Parser;
use gradeflow::app::{handle_fatal_error, init_logging, AppConfig};
use gradeflow::cli::{execute_command, Cli};
use gradeflow::config::Config;
use tracing::debug;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app_config = AppConfig::new(cli.verbose).with_config_path(cli.config.clone());

    let config = match Config::load(app_config.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&app_config, None);
            handle_fatal_error(
                anyhow::Error::new(e).context("Failed to load configuration"),
                cli.verbose,
            )
        }
    };
    init_logging(&app_config, config.log_level.as_deref());
    debug!("Configuration: {:?}", config);

    if let Err(e) = execute_command(cli.command, config).await {
        handle_fatal_error(e, cli.verbose);
    }
}
