//! Predictive maintenance CLI entry point

use clap::Parser;
use predictive_maintenance::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "predictive_maintenance=info".into()),
        )
        .init();

    run(Cli::parse())
}
