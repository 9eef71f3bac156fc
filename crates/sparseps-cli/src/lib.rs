//! Command-line interface for the sparseps parameter server.
//!
//! - **serve**: run one parameter server rank until a shutdown request
//! - **shutdown**: send a shutdown request to a running rank
//!
//! ```bash
//! sparseps serve --addr 0.0.0.0:9000 --rank 0 --config rule.json
//! sparseps shutdown --addr 10.0.0.1:9000
//! ```

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{ServeCommand, ShutdownCommand};

/// Sharded parameter server for distributed training
#[derive(Parser, Debug)]
#[command(name = "sparseps")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one parameter server rank
    Serve(ServeCommand),

    /// Stop a running parameter server rank
    Shutdown(ShutdownCommand),
}
