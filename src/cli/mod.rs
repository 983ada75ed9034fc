//! CLI module for edfsim.
//!
//! All CLI logic lives here rather than in main.rs so it can be tested.
//! The binary only parses arguments, installs logging and calls `run_cli`.

mod args;
mod commands;
mod output;

pub use args::{Args, Command, SimOptions};
pub use commands::{resolve, run_cli};
pub use output::{
    print_help, print_reproducibility, print_run_report, print_trial_summary, print_version,
    render_reproducibility, render_run_report, render_trial_summary, version_string,
};
