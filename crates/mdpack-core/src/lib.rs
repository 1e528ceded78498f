//! Deterministic metadata archive assembly.
//!
//! Builds deployable zip archives from metadata source trees: ordered
//! in-memory archives, manifest generation and merging, namespace token
//! resolution, descriptor cleaning, static-resource bundling, and a
//! set-based entity transform engine.

pub mod archive;
pub mod builders;
pub mod convert;
pub mod entity;
pub mod error;
pub mod etl;
pub mod metaxml;
pub mod namespace;
pub mod pipeline;
pub mod resources;
pub mod xml;

pub use archive::{Archive, MANIFEST_PATH};
pub use error::PackageError;
pub use pipeline::{MetadataPackageBuilder, PackageOptions};
pub use xml::{MetadataElement, PackageManifest};
