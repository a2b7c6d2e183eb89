//! Fatal error reporting

use crate::config::ConfigError;
use tracing::error;

/// Exit code for configuration problems
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Exit code for everything else
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for an error that reached `main`
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    if error.chain().any(|cause| cause.is::<ConfigError>()) {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_FAILURE
    }
}

/// Print the error and exit
///
/// The cause chain is shown with `-v` or higher.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {:#}", error);
    eprintln!("Error: {error:#}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {i}: {cause}");
        }
    }

    std::process::exit(exit_code_for(&error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_errors_get_their_own_exit_code() {
        let err: anyhow::Error = ConfigError::Validation("bad".to_string()).into();
        assert_eq!(exit_code_for(&err), EXIT_CONFIG_ERROR);

        let wrapped = Err::<(), _>(ConfigError::Validation("bad".to_string()))
            .context("loading configuration")
            .unwrap_err();
        assert_eq!(exit_code_for(&wrapped), EXIT_CONFIG_ERROR);

        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), EXIT_FAILURE);
    }
}
