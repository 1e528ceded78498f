//! Domain errors for archive assembly and entity transforms.
//!
//! Every variant is fatal to the current build invocation: the pipeline
//! performs no internal retry and no per-record recovery. Errors propagate
//! unmodified to the caller, which receives the stage and record/path that
//! triggered the failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the archive-build pipeline and the entity transform
/// engine.
#[derive(Error, Debug)]
pub enum PackageError {
    /// Invalid or contradictory configuration (e.g. two namespace modes set,
    /// or a builder missing a required identifier).
    #[error("Configuration error: {0}")]
    Config(String),

    /// An explicit selection set named a record that was never discovered.
    #[error("Selection error: {0}")]
    Selection(String),

    /// An entity transform was requested on a type that has no XML source.
    #[error("Entity type {0} is not supported by entity transforms")]
    UnsupportedEntity(String),

    /// A primary record or manifest document failed to parse.
    #[error("Malformed document {path}: {message}")]
    MalformedDocument {
        /// Archive path of the offending document.
        path: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A resource bundle directory lacks its required side-car descriptor.
    #[error("Missing descriptor file: {0}")]
    MissingDescriptor(PathBuf),

    /// An archive entry was read that does not exist.
    #[error("No such archive entry: {0}")]
    EntryNotFound(String),

    /// A write was attempted on a finalized archive.
    #[error("Archive is finalized and cannot be modified")]
    Finalized,

    /// The external format-conversion tool failed.
    #[error("Conversion tool failed: {0}")]
    Conversion(String),

    /// The remote deployment API reported a failure.
    #[error("Remote API failure: {0}")]
    Remote(String),

    /// Underlying filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Zip encoding or decoding failure.
    #[error("Archive error: {0}")]
    Zip(String),
}

impl From<zip::result::ZipError> for PackageError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Zip(err.to_string())
    }
}
