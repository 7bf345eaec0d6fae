//! Run driver: options, the run itself and the final report

pub mod options;
pub mod report;
pub mod run;

pub use options::{CliArgs, DeployOptions};
pub use run::{run, run_with_shell};
