//! The package manifest (`package.xml`).
//!
//! A manifest lists every metadata record in a deployable archive, grouped
//! by entity type: each `types` section holds an ordered, de-duplicated run
//! of `members` followed by exactly one `name`, and the document ends with
//! the target API `version`. Sections appear in the order their type was
//! first encountered; merge-inserts locate an existing section by name
//! before creating a new one.

use quick_xml::escape::escape;

use crate::error::PackageError;
use crate::xml::tree::{METADATA_NAMESPACE, MetadataElement};

/// One `types` section: members in insertion order, duplicates collapsed.
#[derive(Debug, Clone)]
struct TypeSection {
    name: String,
    members: Vec<String>,
}

/// Structured representation of a package manifest.
#[derive(Debug, Clone)]
pub struct PackageManifest {
    version: String,
    sections: Vec<TypeSection>,
}

impl PackageManifest {
    /// Create an empty manifest targeting the given API version.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            sections: Vec::new(),
        }
    }

    /// Build a manifest from `(entity type, member names)` pairs.
    pub fn from_entities(version: &str, entities: Vec<(String, Vec<String>)>) -> Self {
        let mut manifest = Self::new(version);
        for (type_name, members) in entities {
            for member in members {
                manifest.add_member(&type_name, &member);
            }
        }
        manifest
    }

    /// Parse manifest bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::MalformedDocument`] if the bytes are not
    /// well-formed XML, the root element is not `Package`, or the `version`
    /// element is missing.
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self, PackageError> {
        let root = MetadataElement::parse(path, bytes)?;
        if root.tag != "Package" {
            return Err(PackageError::MalformedDocument {
                path: path.to_string(),
                message: format!("expected Package root element, found {}", root.tag),
            });
        }

        let mut manifest = Self::new(String::new());
        for child in &root.children {
            match child.tag.as_str() {
                "types" => {
                    let Some(name) = child.find("name").and_then(|n| n.text.clone()) else {
                        return Err(PackageError::MalformedDocument {
                            path: path.to_string(),
                            message: "types section has no name".to_string(),
                        });
                    };
                    for member in child.findall("members") {
                        if let Some(text) = &member.text {
                            manifest.add_member(&name, text);
                        }
                    }
                }
                "version" => {
                    manifest.version = child.text.clone().unwrap_or_default();
                }
                _ => {}
            }
        }

        if manifest.version.is_empty() {
            return Err(PackageError::MalformedDocument {
                path: path.to_string(),
                message: "manifest has no version".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Target API version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Merge-insert a member into the section for `type_name`, creating the
    /// section if absent. Returns whether the member was newly inserted.
    pub fn add_member(&mut self, type_name: &str, member: &str) -> bool {
        if let Some(section) = self.sections.iter_mut().find(|s| s.name == type_name) {
            if section.members.iter().any(|m| m == member) {
                return false;
            }
            section.members.push(member.to_string());
        } else {
            self.sections.push(TypeSection {
                name: type_name.to_string(),
                members: vec![member.to_string()],
            });
        }
        true
    }

    /// Members of the section for `type_name`, in insertion order.
    pub fn members(&self, type_name: &str) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|s| s.name == type_name)
            .map(|s| s.members.as_slice())
    }

    /// Entity type names in the order first encountered.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Serialize to the canonical manifest rendering.
    ///
    /// Sections with no members are omitted entirely.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!("<Package xmlns=\"{METADATA_NAMESPACE}\">\n"));
        for section in &self.sections {
            if section.members.is_empty() {
                continue;
            }
            out.push_str("    <types>\n");
            for member in &section.members {
                out.push_str(&format!(
                    "        <members>{}</members>\n",
                    escape(member.as_str())
                ));
            }
            out.push_str(&format!(
                "        <name>{}</name>\n",
                escape(section.name.as_str())
            ));
            out.push_str("    </types>\n");
        }
        out.push_str(&format!("\n    <version>{}</version>\n", self.version));
        out.push_str("</Package>\n");
        out
    }

    /// [`PackageManifest::to_xml`] as bytes.
    pub fn to_xml_bytes(&self) -> Vec<u8> {
        self.to_xml().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_grouped_sections() {
        let manifest = PackageManifest::from_entities(
            "47.0",
            vec![
                (
                    "CustomObject".to_string(),
                    vec!["Account".to_string(), "Contact".to_string()],
                ),
                ("ApexClass".to_string(), vec!["Test".to_string()]),
            ],
        );

        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="http://soap.sforce.com/2006/04/metadata">
    <types>
        <members>Account</members>
        <members>Contact</members>
        <name>CustomObject</name>
    </types>
    <types>
        <members>Test</members>
        <name>ApexClass</name>
    </types>

    <version>47.0</version>
</Package>
"#;
        assert_eq!(manifest.to_xml(), expected);
    }

    #[test]
    fn test_merge_is_order_preserving_and_duplicate_free() {
        let mut manifest = PackageManifest::new("52.0");
        assert!(manifest.add_member("StaticResource", "B"));
        assert!(manifest.add_member("StaticResource", "A"));
        assert!(!manifest.add_member("StaticResource", "B"));

        assert_eq!(
            manifest.members("StaticResource").unwrap(),
            &["B".to_string(), "A".to_string()]
        );

        // Members render first, the type name trails.
        let xml = manifest.to_xml();
        let members_pos = xml.find("<members>B</members>").unwrap();
        let name_pos = xml.find("<name>StaticResource</name>").unwrap();
        assert!(members_pos < name_pos);
    }

    #[test]
    fn test_parse_round_trip() {
        let mut manifest = PackageManifest::new("52.0");
        manifest.add_member("Layout", "Contact Layout");
        manifest.add_member("CustomObject", "Account");

        let parsed =
            PackageManifest::parse("package.xml", manifest.to_xml().as_bytes()).unwrap();

        assert_eq!(parsed.version(), "52.0");
        assert_eq!(parsed.types().collect::<Vec<_>>(), vec!["Layout", "CustomObject"]);
        assert_eq!(
            parsed.members("Layout").unwrap(),
            &["Contact Layout".to_string()]
        );
    }

    #[test]
    fn test_parse_rejects_missing_version() {
        let doc = b"<?xml version=\"1.0\"?><Package xmlns=\"x\"></Package>";
        assert!(matches!(
            PackageManifest::parse("package.xml", doc),
            Err(PackageError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_root() {
        let doc = b"<?xml version=\"1.0\"?><NotAPackage/>";
        assert!(matches!(
            PackageManifest::parse("package.xml", doc),
            Err(PackageError::MalformedDocument { .. })
        ));
    }
}
