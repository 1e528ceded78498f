//! `mdpack transform` - rewrite records of one entity type in an archive.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use mdpack_core::etl::{
    EntityTransformEngine, FirstChildTextTransform, SelectionSet, TransformOptions,
};
use mdpack_core::Archive;
use tracing::info;

/// Arguments of the `transform` subcommand.
#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Input archive (zip)
    pub input: PathBuf,
    /// Entity type to transform (e.g. CustomApplication)
    #[arg(long)]
    pub entity: String,
    /// Comma-separated record names; omit for all
    #[arg(long)]
    pub api_names: Option<String>,
    /// First-level child element to set
    #[arg(long)]
    pub tag: String,
    /// Text value to write into the element
    #[arg(long)]
    pub value: String,
    /// API version stamped into the generated manifest
    #[arg(long, default_value = "47.0")]
    pub api_version: String,
    /// Deploy with the namespace prefix applied
    #[arg(long)]
    pub managed: bool,
    /// Resolve sentinel tokens to this namespace prefix
    #[arg(long)]
    pub namespace_inject: Option<String>,
    /// The target org itself carries the namespace
    #[arg(long)]
    pub namespaced_org: bool,
    /// Where to write the transformed zip
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Run the transform and write the resulting archive.
///
/// # Errors
///
/// Returns any engine or I/O failure.
pub fn transform(args: &TransformArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.input)
        .with_context(|| format!("reading archive {}", args.input.display()))?;
    let input = Archive::from_bytes(&bytes)?;

    let mut engine = EntityTransformEngine::new(TransformOptions {
        entity: args.entity.clone(),
        api_names: SelectionSet::parse(args.api_names.as_deref()),
        api_version: args.api_version.clone(),
        managed: args.managed,
        namespace_inject: args.namespace_inject.clone(),
        namespaced_org: args.namespaced_org,
    });
    let transform = FirstChildTextTransform::with_namespace(
        args.tag.clone(),
        args.value.clone(),
        args.namespace_inject.as_deref(),
        args.managed,
    );

    let mut result = engine.run(&input, &transform)?;
    result.archive.finalize();
    fs::write(&args.output, result.archive.to_bytes()?)
        .with_context(|| format!("writing archive to {}", args.output.display()))?;

    info!(
        entity = %args.entity,
        records = result.api_names.len(),
        output = %args.output.display(),
        "transform complete"
    );
    Ok(())
}
