//! edfsim CLI - EDF schedulability simulator
//!
//! Command-line interface for running simulations.

use std::process::ExitCode;

use edfsim::cli::{run_cli, Args};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbosity);
    run_cli(args)
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| "edfsim=warn".into()),
        1 => EnvFilter::new("edfsim=debug"),
        _ => EnvFilter::new("edfsim=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
