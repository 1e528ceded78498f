//! Side-car descriptor cleaning.
//!
//! Package-descriptor side-car files (`*-meta.xml`) retrieved from a
//! packaging org may carry a `packageVersion` stamp that must not be sent
//! back on deploy. This stage removes that one element and leaves
//! everything else alone: files without the element pass through
//! byte-identical, so re-running the cleaner is a no-op.

use tracing::debug;

use crate::archive::Archive;
use crate::error::PackageError;
use crate::xml::MetadataElement;

/// Suffix identifying side-car descriptor files.
pub const META_XML_SUFFIX: &str = "-meta.xml";

const PACKAGE_VERSION_TAG: &str = "packageVersion";

/// Remove `packageVersion` elements from every side-car descriptor in the
/// archive.
///
/// # Errors
///
/// Returns [`PackageError::MalformedDocument`] if a descriptor fails to
/// parse.
pub fn clean_meta_xml(archive: &Archive) -> Result<Archive, PackageError> {
    let mut out = Archive::new();
    for entry in archive.entries() {
        if entry.name.ends_with(META_XML_SUFFIX) {
            let mut root = MetadataElement::parse(&entry.name, &entry.data)?;
            if root.remove_children(PACKAGE_VERSION_TAG) > 0 {
                debug!(path = %entry.name, "removed packageVersion stamp");
                out.add(entry.name.clone(), root.to_xml_bytes())?;
                continue;
            }
        }
        out.add(entry.name.clone(), entry.data.clone())?;
    }
    Ok(out)
}
