//! Archive build pipeline.
//!
//! Orchestrates the fixed-order transformation stages over a freshly
//! populated [`Archive`]: namespace transform, then side-car cleaning, then
//! resource bundling. Each stage fully consumes its input archive and
//! produces a new one before the next stage begins, and each is a no-op
//! when its trigger option is unset. The pipeline is single-threaded and
//! synchronous; concurrent builds are safe because nothing is shared.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use walkdir::WalkDir;

use crate::archive::{Archive, MANIFEST_PATH};
use crate::convert::SourceConverter;
use crate::error::PackageError;
use crate::metaxml::clean_meta_xml;
use crate::namespace::{self, NamespaceInjector};
use crate::resources::bundle_static_resources;

/// Top-level grouping directory that is only descended one extra level.
const BUNDLED_COMPONENT_DIR: &str = "lwc";

/// Extensions included from inside a bundled component directory.
const BUNDLED_COMPONENT_EXTENSIONS: &[&str] =
    &[".js", ".js-meta.xml", ".html", ".css", ".svg"];

fn default_true() -> bool {
    true
}

/// Configuration surface of the archive-build pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    /// Replace `prefix__` occurrences with the namespace sentinel.
    pub namespace_tokenize: Option<String>,
    /// Resolve namespace sentinels to `prefix__` (managed) or nothing.
    pub namespace_inject: Option<String>,
    /// Remove namespace sentinels unconditionally.
    pub namespace_strip: Option<String>,
    /// Deploy without a namespace prefix (inverse of managed).
    #[serde(default = "default_true")]
    pub unmanaged: bool,
    /// The target org itself carries the namespace.
    pub namespaced_org: bool,
    /// Remove packageVersion stamps from side-car descriptors.
    #[serde(default = "default_true")]
    pub clean_meta_xml: bool,
    /// Directory of resource bundles to pack into the archive.
    pub static_resource_path: Option<PathBuf>,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            namespace_tokenize: None,
            namespace_inject: None,
            namespace_strip: None,
            unmanaged: true,
            namespaced_org: false,
            clean_meta_xml: true,
            static_resource_path: None,
        }
    }
}

impl PackageOptions {
    /// Reject contradictory settings.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Config`] if more than one namespace mode is
    /// set.
    pub fn validate(&self) -> Result<(), PackageError> {
        let modes = [
            self.namespace_tokenize.as_ref(),
            self.namespace_inject.as_ref(),
            self.namespace_strip.as_ref(),
        ]
        .into_iter()
        .flatten()
        .count();
        if modes > 1 {
            return Err(PackageError::Config(
                "namespace_tokenize, namespace_inject and namespace_strip \
                 are mutually exclusive"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the deployment is managed (namespace prefix applied).
    pub fn managed(&self) -> bool {
        !self.unmanaged
    }
}

/// Builds a deployable archive from a metadata tree or a pre-built archive.
#[derive(Debug)]
pub struct MetadataPackageBuilder {
    options: PackageOptions,
}

impl MetadataPackageBuilder {
    /// Create a builder with validated options.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Config`] if the options are contradictory.
    pub fn new(options: PackageOptions) -> Result<Self, PackageError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Discover a metadata tree on disk and run the pipeline over it.
    ///
    /// When the tree has no root manifest it is first normalized through
    /// `converter` into a staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Config`] if conversion is needed but no
    /// converter was supplied, or any stage error.
    pub fn build_from_path(
        &self,
        path: &Path,
        converter: Option<&dyn SourceConverter>,
        name: Option<&str>,
    ) -> Result<Archive, PackageError> {
        if path.join(MANIFEST_PATH).exists() {
            return self.process(collect_files(path)?);
        }

        let converter = converter.ok_or_else(|| {
            PackageError::Config(
                "source tree has no package.xml and no conversion tool was supplied"
                    .to_string(),
            )
        })?;
        info!(source = %path.display(), "converting source layout to metadata layout");
        let staging = tempfile::tempdir()?;
        converter.convert(path, staging.path(), name)?;
        self.process(collect_files(staging.path())?)
    }

    /// Run the pipeline over a pre-built archive.
    ///
    /// # Errors
    ///
    /// Returns any stage error.
    pub fn build_from_archive(&self, archive: Archive) -> Result<Archive, PackageError> {
        self.process(archive)
    }

    fn process(&self, archive: Archive) -> Result<Archive, PackageError> {
        let archive = self.process_namespace(archive)?;

        let archive = if self.options.clean_meta_xml {
            info!("cleaning side-car descriptors of packageVersion stamps");
            clean_meta_xml(&archive)?
        } else {
            archive
        };

        let archive = match &self.options.static_resource_path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "bundling static resources");
                bundle_static_resources(&archive, path)?
            }
            _ => archive,
        };

        Ok(archive)
    }

    fn process_namespace(&self, archive: Archive) -> Result<Archive, PackageError> {
        if let Some(prefix) = &self.options.namespace_tokenize {
            info!(namespace = %prefix, "tokenizing namespace prefix");
            return namespace::process_text_in_archive(&archive, |name, text| {
                namespace::tokenize_namespace(name, text, prefix)
            });
        }
        if let Some(prefix) = &self.options.namespace_inject {
            let managed = self.options.managed();
            if managed {
                info!(namespace = %prefix, "injecting namespace prefix");
            } else {
                info!("removing namespace tokens for unmanaged deployment");
            }
            let injector = NamespaceInjector::new(prefix, managed, self.options.namespaced_org);
            return namespace::process_text_in_archive(&archive, |name, text| {
                injector.apply(name, text)
            });
        }
        if let Some(prefix) = &self.options.namespace_strip {
            info!(namespace = %prefix, "stripping namespace tokens");
            return namespace::process_text_in_archive(&archive, |name, text| {
                namespace::strip_namespace(name, text)
            });
        }
        Ok(archive)
    }
}

/// Walk a metadata tree into an archive, applying the inclusion policy.
fn collect_files(root: &Path) -> Result<Archive, PackageError> {
    let mut archive = Archive::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let Some((file_name, dir_parts)) = parts.split_last() else {
            continue;
        };

        if !include_directory(dir_parts) || !include_file(dir_parts, file_name) {
            continue;
        }
        archive.add(parts.join("/"), fs::read(entry.path())?)?;
    }

    Ok(archive)
}

/// Whether a directory's contents belong in the package.
///
/// The bundled-component grouping directory is only descended one extra
/// level: its immediate named sub-directories are scanned, nothing deeper.
/// Every other directory is included unconditionally.
fn include_directory(dir_parts: &[String]) -> bool {
    dir_parts.is_empty()
        || dir_parts.first().map(String::as_str) != Some(BUNDLED_COMPONENT_DIR)
        || dir_parts.len() == 2
}

/// Whether a file belongs in the package, given its directory parts.
fn include_file(dir_parts: &[String], file_name: &str) -> bool {
    if dir_parts.len() == 2 && dir_parts.first().map(String::as_str) == Some(BUNDLED_COMPONENT_DIR)
    {
        let lower = file_name.to_lowercase();
        return BUNDLED_COMPONENT_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(ext));
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_namespace_modes_are_mutually_exclusive() {
        let options = PackageOptions {
            namespace_tokenize: Some("ns".to_string()),
            namespace_inject: Some("ns".to_string()),
            ..PackageOptions::default()
        };
        assert!(matches!(
            MetadataPackageBuilder::new(options),
            Err(PackageError::Config(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let options = PackageOptions::default();
        assert!(options.unmanaged);
        assert!(!options.managed());
        assert!(options.clean_meta_xml);
        options.validate().unwrap();
    }

    #[test]
    fn test_include_directory_policy() {
        let parts = |v: &[&str]| v.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();

        assert!(include_directory(&parts(&[])));
        assert!(include_directory(&parts(&["objects"])));
        assert!(include_directory(&parts(&["objects", "deep", "deeper"])));
        // lwc itself and anything below a component are excluded
        assert!(!include_directory(&parts(&["lwc"])));
        assert!(include_directory(&parts(&["lwc", "myComponent"])));
        assert!(!include_directory(&parts(&["lwc", "myComponent", "sub"])));
    }

    #[test]
    fn test_include_file_policy() {
        let lwc = vec!["lwc".to_string(), "myComponent".to_string()];
        assert!(include_file(&lwc, "component.js"));
        assert!(include_file(&lwc, "component.js-meta.xml"));
        assert!(include_file(&lwc, "Component.HTML"));
        assert!(!include_file(&lwc, "notes.txt"));

        let other = vec!["objects".to_string()];
        assert!(include_file(&other, "notes.txt"));
    }

    #[test]
    fn test_build_from_path_discovers_and_filters() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.xml"), b"<Package/>").unwrap();
        fs::create_dir_all(dir.path().join("classes")).unwrap();
        fs::write(dir.path().join("classes/Foo.cls"), b"class Foo {}").unwrap();
        fs::create_dir_all(dir.path().join("lwc/cmp")).unwrap();
        fs::write(dir.path().join("lwc/cmp/cmp.js"), b"export {}").unwrap();
        fs::write(dir.path().join("lwc/cmp/README.md"), b"docs").unwrap();
        fs::write(dir.path().join("lwc/loose.js"), b"excluded").unwrap();

        let builder = MetadataPackageBuilder::new(PackageOptions::default()).unwrap();
        let archive = builder.build_from_path(dir.path(), None, None).unwrap();

        assert!(archive.contains("package.xml"));
        assert!(archive.contains("classes/Foo.cls"));
        assert!(archive.contains("lwc/cmp/cmp.js"));
        assert!(!archive.contains("lwc/cmp/README.md"));
        assert!(!archive.contains("lwc/loose.js"));
    }

    #[test]
    fn test_build_without_manifest_requires_converter() {
        let dir = tempdir().unwrap();
        let builder = MetadataPackageBuilder::new(PackageOptions::default()).unwrap();

        assert!(matches!(
            builder.build_from_path(dir.path(), None, None),
            Err(PackageError::Config(_))
        ));
    }

    #[test]
    fn test_stages_apply_in_order() {
        // Tokenized input, inject managed, then side-car cleaning.
        let mut input = Archive::new();
        input
            .add(
                "objects/___NAMESPACE___Widget__c.object",
                b"<CustomObject><label>%%%NAMESPACE%%%Widget</label></CustomObject>".to_vec(),
            )
            .unwrap();
        input
            .add(
                "classes/Foo.cls-meta.xml",
                b"<ApexClass><packageVersion>1.0</packageVersion></ApexClass>".to_vec(),
            )
            .unwrap();

        let options = PackageOptions {
            namespace_inject: Some("ns".to_string()),
            unmanaged: false,
            ..PackageOptions::default()
        };
        let builder = MetadataPackageBuilder::new(options).unwrap();
        let out = builder.build_from_archive(input).unwrap();

        let object = out.read("objects/ns__Widget__c.object").unwrap();
        assert_eq!(
            object,
            b"<CustomObject><label>ns__Widget</label></CustomObject>"
        );
        let meta = String::from_utf8(out.read("classes/Foo.cls-meta.xml").unwrap().to_vec())
            .unwrap();
        assert!(!meta.contains("packageVersion"));
    }
}
