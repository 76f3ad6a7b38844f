//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ordo - sequential task queue runner
#[derive(Parser, Debug)]
#[command(name = "ordo")]
#[command(version)]
#[command(about = "Run asynchronous tasks one at a time, in submission order")]
#[command(
    long_about = "ordo submits the tasks of a plan to a sequential FIFO queue, waits for every outcome, and reports results in submission order."
)]
pub struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. "debug" or "ordo_queue=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tasks described in a plan file
    Run {
        /// Path to the TOML plan
        plan: PathBuf,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run the built-in demonstration plan
    Demo {
        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["ordo", "run", "plan.toml", "--json"]).unwrap();
        match cli.command {
            Commands::Run { plan, json } => {
                assert_eq!(plan, PathBuf::from("plan.toml"));
                assert!(json);
            }
            Commands::Demo { .. } => panic!("expected run"),
        }
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn test_parse_demo_with_log_level() {
        let cli = Cli::try_parse_from(["ordo", "demo", "--log-level", "debug"]).unwrap();
        assert!(matches!(cli.command, Commands::Demo { json: false }));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_run_requires_plan() {
        assert!(Cli::try_parse_from(["ordo", "run"]).is_err());
    }
}
