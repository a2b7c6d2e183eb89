//! Application module
//!
//! Process-level setup shared by the CLI commands: verbosity, logging,
//! fatal error reporting and the wiring of storage, runtime and trigger.

pub mod config;
pub mod error_handling;
pub mod logging;
pub mod runtime;

pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
pub use runtime::App;
