mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Discover { providers, regions, local_fixture } => {
            commands::discover(providers, regions, local_fixture, cli.output).await
        }
        Command::Drift { command } => commands::drift(command, cli.output).await,
        Command::Terragrunt { command } => commands::terragrunt(command, cli.output).await,
    }
}
