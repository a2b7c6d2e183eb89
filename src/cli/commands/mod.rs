//! Command implementation modules

pub mod process;
pub mod resume;
pub mod status;
pub mod watch;

pub use process::{run_process_command, run_submit_command};
pub use resume::{run_cancel_command, run_resume_command};
pub use status::{print_status, run_status_command};
pub use watch::run_watch_command;
