//! External collaborator contracts.
//!
//! The pipeline depends on two outside services, specified here only at
//! their interface boundary: a format-conversion tool that normalizes a
//! source-control-friendly layout into the flat metadata layout the
//! pipeline discovers, and a remote client that deploys or retrieves
//! archives. Neither is implemented with any network code in this crate.

use std::path::Path;
use std::process::Command;

use crate::archive::Archive;
use crate::error::PackageError;
use crate::xml::PackageManifest;

/// Converts a source tree into the flat metadata layout at `dest`.
pub trait SourceConverter {
    /// Populate `dest` from `source`, optionally naming the package.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Conversion`] if the conversion fails.
    fn convert(&self, source: &Path, dest: &Path, name: Option<&str>)
    -> Result<(), PackageError>;
}

/// [`SourceConverter`] backed by an external command, invoked as
/// `<program> -r <source> -d <dest> [-n <name>]`.
#[derive(Debug, Clone)]
pub struct CliConverter {
    program: String,
}

impl CliConverter {
    /// Use `program` as the conversion command.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SourceConverter for CliConverter {
    fn convert(
        &self,
        source: &Path,
        dest: &Path,
        name: Option<&str>,
    ) -> Result<(), PackageError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-r").arg(source).arg("-d").arg(dest);
        if let Some(name) = name {
            cmd.arg("-n").arg(name);
        }

        let status = cmd.status()?;
        if !status.success() {
            return Err(PackageError::Conversion(format!(
                "{} exited with status {:?}",
                self.program,
                status.code()
            )));
        }
        Ok(())
    }
}

/// Remote deploy/retrieve contract.
///
/// Implementations accept a finalized archive (or its encoded form) plus a
/// manifest, and surface remote-reported failures as
/// [`PackageError::Remote`].
pub trait DeployClient {
    /// Deploy a finalized archive.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Remote`] on a remote-reported failure.
    fn deploy(&self, archive: &Archive) -> Result<(), PackageError>;

    /// Retrieve the records named by `manifest` as serialized archive
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Remote`] on a remote-reported failure.
    fn retrieve(&self, manifest: &PackageManifest) -> Result<Vec<u8>, PackageError>;
}
