//! `mdpack build` - run the archive pipeline over a source tree.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use mdpack_core::convert::CliConverter;
use mdpack_core::pipeline::MetadataPackageBuilder;
use mdpack_core::PackageOptions;
use tracing::info;

/// Arguments of the `build` subcommand.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Root of the metadata source tree
    pub source: PathBuf,
    /// TOML file holding pipeline options (flags override it)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Replace this namespace prefix with sentinel tokens
    #[arg(long, conflicts_with_all = ["namespace_inject", "namespace_strip"])]
    pub namespace_tokenize: Option<String>,
    /// Resolve sentinel tokens to this namespace prefix
    #[arg(long, conflicts_with = "namespace_strip")]
    pub namespace_inject: Option<String>,
    /// Remove sentinel tokens for this namespace
    #[arg(long)]
    pub namespace_strip: Option<String>,
    /// Deploy with the namespace prefix applied
    #[arg(long)]
    pub managed: bool,
    /// The target org itself carries the namespace
    #[arg(long)]
    pub namespaced_org: bool,
    /// Keep packageVersion stamps in side-car descriptors
    #[arg(long)]
    pub keep_meta_xml: bool,
    /// Directory of static resource bundles to pack in
    #[arg(long)]
    pub static_resource_path: Option<PathBuf>,
    /// Conversion command for trees without a root manifest
    #[arg(long)]
    pub converter: Option<String>,
    /// Package name passed to the conversion command
    #[arg(long)]
    pub name: Option<String>,
    /// Where to write the zip (stdout as base64 when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl BuildArgs {
    /// Fold the TOML config file (if any) and the flags into one options
    /// struct. Flags win over the file.
    fn options(&self) -> anyhow::Result<PackageOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading options file {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing options file {}", path.display()))?
            }
            None => PackageOptions::default(),
        };

        if self.namespace_tokenize.is_some() {
            options.namespace_tokenize = self.namespace_tokenize.clone();
        }
        if self.namespace_inject.is_some() {
            options.namespace_inject = self.namespace_inject.clone();
        }
        if self.namespace_strip.is_some() {
            options.namespace_strip = self.namespace_strip.clone();
        }
        if self.managed {
            options.unmanaged = false;
        }
        if self.namespaced_org {
            options.namespaced_org = true;
        }
        if self.keep_meta_xml {
            options.clean_meta_xml = false;
        }
        if self.static_resource_path.is_some() {
            options.static_resource_path = self.static_resource_path.clone();
        }
        Ok(options)
    }
}

/// Run the build and write the finished archive.
///
/// # Errors
///
/// Returns any pipeline or I/O failure.
pub fn build(args: &BuildArgs) -> anyhow::Result<()> {
    let builder = MetadataPackageBuilder::new(args.options()?)?;

    let converter = args.converter.as_deref().map(CliConverter::new);
    let mut archive = builder.build_from_path(
        &args.source,
        converter
            .as_ref()
            .map(|c| c as &dyn mdpack_core::convert::SourceConverter),
        args.name.as_deref(),
    )?;
    archive.finalize();

    match &args.output {
        Some(path) => {
            fs::write(path, archive.to_bytes()?)
                .with_context(|| format!("writing archive to {}", path.display()))?;
            info!(
                entries = archive.len(),
                hash = %archive.content_hash(),
                output = %path.display(),
                "archive written"
            );
        }
        None => println!("{}", archive.to_base64()?),
    }
    Ok(())
}
