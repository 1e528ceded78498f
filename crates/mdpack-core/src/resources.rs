//! Static resource bundling.
//!
//! A resource bundle is a directory of arbitrary files packed into a nested
//! archive and registered as one named record in the outer manifest. For
//! every immediate sub-directory `<name>` of the configured source
//! directory, this stage:
//!
//! 1. copies the sibling descriptor `<name>.resource-meta.xml` into the
//!    archive verbatim (a bundle without its descriptor is a fatal error);
//! 2. walks the sub-directory and packs its full contents into a nested
//!    zip stored as the single entry `staticresources/<name>.resource`;
//! 3. merge-inserts `<name>` into the manifest's `StaticResource` section.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::{Archive, MANIFEST_PATH};
use crate::error::PackageError;
use crate::xml::PackageManifest;

/// Archive sub-directory bundles are written under.
pub const BUNDLE_DIR: &str = "staticresources";
/// Suffix of a packed bundle blob.
pub const BUNDLE_SUFFIX: &str = "resource";

const BUNDLE_TYPE: &str = "StaticResource";

/// Bundle every sub-directory of `path` into the archive and merge the new
/// members into its manifest.
///
/// Plain files directly under `path` (other than the descriptors) are
/// ignored; only sub-directories form bundles. The manifest is rewritten
/// only when at least one bundle was added, so a source directory with no
/// sub-directories leaves the archive byte-identical.
///
/// # Errors
///
/// Returns [`PackageError::MissingDescriptor`] if a sub-directory has no
/// sibling `<name>.resource-meta.xml`, or an error if the manifest is
/// absent or malformed.
pub fn bundle_static_resources(archive: &Archive, path: &Path) -> Result<Archive, PackageError> {
    let mut manifest = PackageManifest::parse(MANIFEST_PATH, archive.read(MANIFEST_PATH)?)?;

    let mut out = Archive::new();
    for entry in archive.entries() {
        out.add(entry.name.clone(), entry.data.clone())?;
    }

    let mut bundle_dirs: Vec<_> = fs::read_dir(path)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().is_dir())
        .collect();
    bundle_dirs.sort_by_key(std::fs::DirEntry::file_name);

    let mut bundled = 0usize;
    for dir in bundle_dirs {
        let name = dir.file_name().to_string_lossy().into_owned();
        let meta_name = format!("{name}.{BUNDLE_SUFFIX}-meta.xml");
        let meta_path = path.join(&meta_name);
        if !meta_path.exists() {
            return Err(PackageError::MissingDescriptor(meta_path));
        }

        info!(bundle = %name, "packing resource bundle");
        out.add(format!("{BUNDLE_DIR}/{meta_name}"), fs::read(&meta_path)?)?;
        out.add(
            format!("{BUNDLE_DIR}/{name}.{BUNDLE_SUFFIX}"),
            zip_directory(&dir.path())?,
        )?;
        manifest.add_member(BUNDLE_TYPE, &name);
        bundled += 1;
    }

    if bundled > 0 {
        out.add(MANIFEST_PATH, manifest.to_xml_bytes())?;
    }
    Ok(out)
}

/// Pack a directory tree into nested zip bytes, paths relative to `dir`.
fn zip_directory(dir: &Path) -> Result<Vec<u8>, PackageError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options)?;
        writer.write_all(&fs::read(entry.path())?)?;
    }

    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_archive() -> Archive {
        let mut archive = Archive::new();
        archive
            .add(
                MANIFEST_PATH,
                PackageManifest::new("47.0").to_xml_bytes(),
            )
            .unwrap();
        archive.add("classes/Foo.cls", b"class Foo {}".to_vec()).unwrap();
        archive
    }

    #[test]
    fn test_bundles_subdirectories_and_merges_manifest() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Logo");
        fs::create_dir_all(bundle.join("img")).unwrap();
        fs::write(bundle.join("img/logo.svg"), b"<svg/>").unwrap();
        fs::write(dir.path().join("Logo.resource-meta.xml"), b"<StaticResource/>").unwrap();

        let out = bundle_static_resources(&seed_archive(), dir.path()).unwrap();

        assert_eq!(
            out.read("staticresources/Logo.resource-meta.xml").unwrap(),
            b"<StaticResource/>"
        );
        // The blob is itself a readable archive with relative paths.
        let nested =
            Archive::from_bytes(out.read("staticresources/Logo.resource").unwrap()).unwrap();
        assert_eq!(nested.read("img/logo.svg").unwrap(), b"<svg/>");

        let manifest = PackageManifest::parse(MANIFEST_PATH, out.read(MANIFEST_PATH).unwrap())
            .unwrap();
        assert_eq!(
            manifest.members("StaticResource").unwrap(),
            &["Logo".to_string()]
        );
        // Untouched entries carried over byte-identical.
        assert_eq!(out.read("classes/Foo.cls").unwrap(), b"class Foo {}");
    }

    #[test]
    fn test_missing_descriptor_is_fatal() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Logo")).unwrap();

        assert!(matches!(
            bundle_static_resources(&seed_archive(), dir.path()),
            Err(PackageError::MissingDescriptor(_))
        ));
    }

    #[test]
    fn test_empty_source_directory_leaves_archive_unchanged() {
        let dir = tempdir().unwrap();
        let input = seed_archive();
        let out = bundle_static_resources(&input, dir.path()).unwrap();

        assert_eq!(out.content_hash(), input.content_hash());
    }

    #[test]
    fn test_rebundling_same_name_deduplicates_member() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Logo")).unwrap();
        fs::write(dir.path().join("Logo.resource-meta.xml"), b"<StaticResource/>").unwrap();

        let once = bundle_static_resources(&seed_archive(), dir.path()).unwrap();
        let twice = bundle_static_resources(&once, dir.path()).unwrap();

        let manifest =
            PackageManifest::parse(MANIFEST_PATH, twice.read(MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(
            manifest.members("StaticResource").unwrap(),
            &["Logo".to_string()]
        );
    }
}
