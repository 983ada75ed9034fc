//! CLI argument parsing.
//!
//! Hand-rolled parser over any string iterator, so parsing is testable
//! without touching `std::env::args()`.

use std::path::PathBuf;

/// CLI arguments container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// The command to execute.
    pub command: Command,
    /// Log verbosity: 0 default, 1 debug (`-v`), 2 trace (`-d`).
    pub verbosity: u8,
}

/// Inputs shared by every simulation command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SimOptions {
    /// Task set file (YAML or JSON).
    pub tasks_path: PathBuf,
    /// Optional simulation config YAML.
    pub config_path: Option<PathBuf>,
    /// Seed override.
    pub seed: Option<u64>,
    /// Timeout override.
    pub timeout: Option<u64>,
    /// Re-execution budget override.
    pub max_reexec: Option<u32>,
    /// Success requirement override.
    pub min_success: Option<u32>,
}

/// Available CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one simulation
    Run {
        /// Simulation inputs.
        sim: SimOptions,
        /// Write the event trace as JSON lines.
        trace_path: Option<PathBuf>,
        /// Write the full report as JSON.
        report_path: Option<PathBuf>,
    },
    /// Verify reproducibility across repeated runs
    Verify {
        /// Simulation inputs.
        sim: SimOptions,
        /// Number of verification runs.
        runs: usize,
    },
    /// Run independent trials and aggregate drops
    Trials {
        /// Simulation inputs.
        sim: SimOptions,
        /// Number of trials.
        trials: usize,
    },
    /// Validate a task set and config without running
    Validate {
        /// Simulation inputs.
        sim: SimOptions,
    },
    /// Show help
    Help,
    /// Show version
    Version,
}

impl Args {
    /// Parse command-line arguments from an iterator.
    ///
    /// This method is testable as it accepts any iterator of strings,
    /// not just `std::env::args()`.
    #[must_use]
    pub fn parse_from<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        Self::parse_from_vec(&args)
    }

    /// Parse command-line arguments from the environment.
    #[must_use]
    pub fn parse() -> Self {
        Self::parse_from(std::env::args())
    }

    /// Internal parsing from a vector of strings.
    fn parse_from_vec(args: &[String]) -> Self {
        let verbosity = Self::parse_verbosity(args);
        let args: Vec<String> = args
            .iter()
            .filter(|a| !is_verbosity_flag(a))
            .cloned()
            .collect();
        if args.len() < 2 {
            return Self {
                command: Command::Help,
                verbosity,
            };
        }

        let command = match args[1].as_str() {
            "run" => Self::parse_run_command(&args),
            "verify" => Self::parse_verify_command(&args),
            "trials" => Self::parse_trials_command(&args),
            "validate" => Self::parse_validate_command(&args),
            "-h" | "--help" | "help" => Command::Help,
            "-V" | "--version" | "version" => Command::Version,
            unknown => {
                eprintln!("Unknown command: {unknown}");
                Command::Help
            }
        };

        Self { command, verbosity }
    }

    /// Highest verbosity flag present anywhere on the line.
    fn parse_verbosity(args: &[String]) -> u8 {
        args.iter()
            .skip(1)
            .map(|a| match a.as_str() {
                "-d" | "--debug" => 2,
                "-v" | "--verbose" => 1,
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Parse the task path and shared options, returning unconsumed flags.
    fn parse_sim_options(name: &str, args: &[String]) -> Option<(SimOptions, Vec<(String, String)>)> {
        if args.len() < 3 || args[2].starts_with('-') {
            eprintln!("Error: '{name}' command requires a task set path");
            return None;
        }

        let mut sim = SimOptions {
            tasks_path: PathBuf::from(&args[2]),
            ..SimOptions::default()
        };
        let mut rest = Vec::new();

        let mut i = 3;
        while i < args.len() {
            let flag = args[i].as_str();
            let Some(value) = args.get(i + 1) else {
                eprintln!("Warning: flag {flag} is missing a value");
                break;
            };
            match flag {
                "--config" | "-c" => sim.config_path = Some(PathBuf::from(value)),
                "--seed" | "-s" => sim.seed = parse_value(flag, value),
                "--timeout" | "-t" => sim.timeout = parse_value(flag, value),
                "--nmax" | "-n" => sim.max_reexec = parse_value(flag, value),
                "--min" | "-m" => sim.min_success = parse_value(flag, value),
                _ => rest.push((flag.to_string(), value.clone())),
            }
            i += 2;
        }

        Some((sim, rest))
    }

    /// Parse the 'run' command arguments.
    fn parse_run_command(args: &[String]) -> Command {
        let Some((sim, rest)) = Self::parse_sim_options("run", args) else {
            return Command::Help;
        };

        let mut trace_path = None;
        let mut report_path = None;
        for (flag, value) in rest {
            match flag.as_str() {
                "--trace" => trace_path = Some(PathBuf::from(value)),
                "--report" => report_path = Some(PathBuf::from(value)),
                other => eprintln!("Warning: ignoring unknown flag {other}"),
            }
        }

        Command::Run {
            sim,
            trace_path,
            report_path,
        }
    }

    /// Parse the 'verify' command arguments.
    fn parse_verify_command(args: &[String]) -> Command {
        let Some((sim, rest)) = Self::parse_sim_options("verify", args) else {
            return Command::Help;
        };

        let mut runs = 3;
        for (flag, value) in rest {
            match flag.as_str() {
                "--runs" => runs = parse_value(&flag, &value).unwrap_or(runs),
                other => eprintln!("Warning: ignoring unknown flag {other}"),
            }
        }

        Command::Verify { sim, runs }
    }

    /// Parse the 'trials' command arguments.
    fn parse_trials_command(args: &[String]) -> Command {
        let Some((sim, rest)) = Self::parse_sim_options("trials", args) else {
            return Command::Help;
        };

        let mut trials = 100;
        for (flag, value) in rest {
            match flag.as_str() {
                "--trials" => trials = parse_value(&flag, &value).unwrap_or(trials),
                other => eprintln!("Warning: ignoring unknown flag {other}"),
            }
        }

        Command::Trials { sim, trials }
    }

    /// Parse the 'validate' command arguments.
    fn parse_validate_command(args: &[String]) -> Command {
        let Some((sim, rest)) = Self::parse_sim_options("validate", args) else {
            return Command::Help;
        };
        for (flag, _) in rest {
            eprintln!("Warning: ignoring unknown flag {flag}");
        }
        Command::Validate { sim }
    }
}

fn is_verbosity_flag(arg: &str) -> bool {
    matches!(arg, "-v" | "--verbose" | "-d" | "--debug")
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        eprintln!("Warning: invalid value '{value}' for {flag}");
    }
    parsed
}
