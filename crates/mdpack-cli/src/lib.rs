//! mdpack - metadata package assembly CLI
//!
//! Thin front end over `mdpack-core`: parses flags and an optional TOML
//! options file into the core option structs, runs the requested
//! operation, and writes the result to disk or stdout.

pub mod cmd;

use clap::{Parser, Subcommand};

pub use cmd::build::BuildArgs;
pub use cmd::transform::TransformArgs;

/// Top-level argument surface.
#[derive(Debug, Parser)]
#[command(name = "mdpack")]
#[command(author, version, about = "mdpack - deterministic metadata archive builder")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// The operations the binary exposes.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a deployable archive from a metadata source tree
    Build(BuildArgs),
    /// Rewrite records of one entity type inside a built archive
    Transform(TransformArgs),
}
