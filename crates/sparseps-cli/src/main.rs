//! sparseps - sharded parameter server for distributed training.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sparseps_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("sparseps=info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(cmd) => cmd.run().await?,
        Commands::Shutdown(cmd) => cmd.run().await?,
    }
    Ok(())
}
