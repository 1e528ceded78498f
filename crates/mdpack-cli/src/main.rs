//! mdpack - deterministic metadata archive builder

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mdpack_cli::cmd;
use mdpack_cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => cmd::build::build(&args),
        Commands::Transform(args) => cmd::transform::transform(&args),
    }
}
