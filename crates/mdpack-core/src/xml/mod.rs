//! XML handling: ordered metadata trees and the package manifest.

pub mod manifest;
pub mod tree;

pub use manifest::PackageManifest;
pub use tree::{METADATA_NAMESPACE, MetadataElement};
