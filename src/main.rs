//! # ordo - plan runner
//!
//! Entry point for the `ordo` binary. Loads a task plan (or the built-in
//! demo), pushes every task through a [`SequentialTaskQueue`] and prints the
//! outcomes in submission order.
//!
//! Logs go to stderr so `--json` output on stdout stays machine readable.
//!
//! [`SequentialTaskQueue`]: ordo_queue::SequentialTaskQueue

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ordo::cli::{Cli, Commands};
use ordo::plan::Plan;
use ordo::runner::{RunReport, run_plan};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let result = tokio::select! {
        result = execute(cli.command) => result,
        () = wait_for_interrupt() => {
            warn!("Interrupted, outstanding tasks were abandoned");
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("ordo failed: {e:#}");
    }
    result
}

async fn execute(command: Commands) -> Result<()> {
    let (plan, json) = match command {
        Commands::Run { plan, json } => {
            let loaded = Plan::load(&plan)
                .with_context(|| format!("Failed to load plan '{}'", plan.display()))?;
            (loaded, json)
        }
        Commands::Demo { json } => (Plan::demo(), json),
    };

    info!(queue = %plan.queue.name, tasks = plan.tasks.len(), "plan loaded");

    let report = run_plan(&plan).await.context("Failed to run plan")?;
    print_report(&report, json)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!("{report}");
    }
    Ok(())
}

async fn wait_for_interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Initialize tracing with the `--log-level` filter, falling back to
/// `RUST_LOG` and then `info`.
fn init_tracing(level: Option<&str>) {
    let filter = level.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
