//! Utility modules for sifthub-deploy

pub mod container;
pub mod dryrun;
pub mod errors;
pub mod exec;
pub mod logger;
pub mod prereqs;
pub mod progress;
pub mod prompt;
pub mod template;

// Re-export commonly used items
pub use container::ContainerRuntime;
pub use exec::{CommandRunner, DryRunRunner, Invocation, ProcessRunner};
pub use logger::{log_error, log_info, log_warn};
pub use prereqs::{CommonPrereqs, Prerequisite};
pub use prompt::confirm;
