//! Special-purpose archive builders.
//!
//! A closed set of builder variants, each a pure function from its input
//! record to a finished [`Archive`]: create-package, install-package,
//! destructive-change, and uninstall-package. None of them share mutable
//! state beyond the archive they return.

use crate::archive::{Archive, MANIFEST_PATH};
use crate::error::PackageError;
use crate::xml::tree::{METADATA_NAMESPACE, MetadataElement};
use crate::xml::PackageManifest;

/// API version used for install-package requests.
const INSTALL_API_VERSION: &str = "43.0";

fn package_root() -> MetadataElement {
    let mut root = MetadataElement::new("Package");
    root.attrs
        .push(("xmlns".to_string(), METADATA_NAMESPACE.to_string()));
    root
}

/// Build an archive that creates a named package container.
///
/// # Errors
///
/// Returns [`PackageError::Config`] if `name` or `api_version` is empty.
pub fn create_package(name: &str, api_version: &str) -> Result<Archive, PackageError> {
    if name.is_empty() {
        return Err(PackageError::Config(
            "a name is required to create a package".to_string(),
        ));
    }
    if api_version.is_empty() {
        return Err(PackageError::Config(
            "an api_version is required to create a package".to_string(),
        ));
    }

    let mut manifest = package_root();
    manifest.append(MetadataElement::with_text("fullName", name));
    manifest.append(MetadataElement::with_text("version", api_version));

    let mut archive = Archive::new();
    archive.add(MANIFEST_PATH, manifest.to_xml_bytes())?;
    Ok(archive)
}

/// Options for [`install_package`].
#[derive(Debug, Clone)]
pub struct InstallPackageOptions {
    /// Activate remote site settings on install.
    pub activate_rss: bool,
    /// Installation password for protected packages.
    pub password: Option<String>,
    /// Security type granted to the installed package.
    pub security_type: String,
}

impl Default for InstallPackageOptions {
    fn default() -> Self {
        Self {
            activate_rss: false,
            password: None,
            security_type: "FULL".to_string(),
        }
    }
}

/// Build an archive that installs a packaged namespace at a version.
///
/// # Errors
///
/// Returns [`PackageError::Config`] if `namespace` or `version` is empty.
pub fn install_package(
    namespace: &str,
    version: &str,
    options: &InstallPackageOptions,
) -> Result<Archive, PackageError> {
    if namespace.is_empty() {
        return Err(PackageError::Config(
            "a namespace is required to install a package".to_string(),
        ));
    }
    if version.is_empty() {
        return Err(PackageError::Config(
            "a version is required to install a package".to_string(),
        ));
    }

    let mut manifest = PackageManifest::new(INSTALL_API_VERSION);
    manifest.add_member("InstalledPackage", namespace);

    let mut record = MetadataElement::new("InstalledPackage");
    record
        .attrs
        .push(("xmlns".to_string(), METADATA_NAMESPACE.to_string()));
    record.append(MetadataElement::with_text("versionNumber", version));
    record.append(MetadataElement::with_text(
        "activateRSS",
        if options.activate_rss { "true" } else { "false" },
    ));
    record.append(MetadataElement::with_text(
        "securityType",
        options.security_type.clone(),
    ));
    if let Some(password) = &options.password {
        record.append(MetadataElement::with_text("password", password.clone()));
    }

    let mut archive = Archive::new();
    archive.add(MANIFEST_PATH, manifest.to_xml_bytes())?;
    archive.add(
        format!("installedPackages/{namespace}.installedPackage"),
        record.to_xml_bytes(),
    )?;
    Ok(archive)
}

/// Build an archive that applies the given destructive changes document.
///
/// # Errors
///
/// Returns an error only if the archive rejects entries.
pub fn destructive_changes(changes_xml: &str, version: &str) -> Result<Archive, PackageError> {
    let mut archive = Archive::new();
    archive.add(MANIFEST_PATH, PackageManifest::new(version).to_xml_bytes())?;
    archive.add("destructiveChanges.xml", changes_xml.as_bytes().to_vec())?;
    Ok(archive)
}

/// Build an archive that uninstalls a packaged namespace.
///
/// # Errors
///
/// Returns [`PackageError::Config`] if `namespace` or `version` is empty.
pub fn uninstall_package(namespace: &str, version: &str) -> Result<Archive, PackageError> {
    if namespace.is_empty() {
        return Err(PackageError::Config(
            "a namespace is required to uninstall a package".to_string(),
        ));
    }
    if version.is_empty() {
        return Err(PackageError::Config(
            "a version is required to uninstall a package".to_string(),
        ));
    }

    let mut changes = PackageManifest::new(version);
    changes.add_member("InstalledPackage", namespace);
    destructive_changes(&changes.to_xml(), version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_package_manifest() {
        let archive = create_package("Sample & Co", "47.0").unwrap();
        let manifest = String::from_utf8(archive.read(MANIFEST_PATH).unwrap().to_vec()).unwrap();

        assert!(manifest.contains("<fullName>Sample &amp; Co</fullName>"));
        assert!(manifest.contains("<version>47.0</version>"));
    }

    #[test]
    fn test_create_package_requires_identifiers() {
        assert!(matches!(
            create_package("", "47.0"),
            Err(PackageError::Config(_))
        ));
        assert!(matches!(
            create_package("Sample", ""),
            Err(PackageError::Config(_))
        ));
    }

    #[test]
    fn test_install_package_record_and_manifest() {
        let options = InstallPackageOptions {
            password: Some("hunter2".to_string()),
            ..InstallPackageOptions::default()
        };
        let archive = install_package("ns", "1.5", &options).unwrap();

        let manifest =
            PackageManifest::parse(MANIFEST_PATH, archive.read(MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(
            manifest.members("InstalledPackage").unwrap(),
            &["ns".to_string()]
        );
        assert_eq!(manifest.version(), INSTALL_API_VERSION);

        let record = MetadataElement::parse(
            "record",
            archive
                .read("installedPackages/ns.installedPackage")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            record.find("versionNumber").unwrap().text.as_deref(),
            Some("1.5")
        );
        assert_eq!(
            record.find("activateRSS").unwrap().text.as_deref(),
            Some("false")
        );
        assert_eq!(
            record.find("password").unwrap().text.as_deref(),
            Some("hunter2")
        );
    }

    #[test]
    fn test_uninstall_package_lists_installed_package_destructively() {
        let archive = uninstall_package("ns", "47.0").unwrap();

        let changes = PackageManifest::parse(
            "destructiveChanges.xml",
            archive.read("destructiveChanges.xml").unwrap(),
        )
        .unwrap();
        assert_eq!(
            changes.members("InstalledPackage").unwrap(),
            &["ns".to_string()]
        );

        // The outer manifest is empty apart from the version.
        let manifest =
            PackageManifest::parse(MANIFEST_PATH, archive.read(MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(manifest.types().count(), 0);
        assert_eq!(manifest.version(), "47.0");
    }
}
