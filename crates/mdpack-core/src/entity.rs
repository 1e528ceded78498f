//! Entity type registry.
//!
//! Maps an entity type name to its archive layout: the sub-directory its
//! records live in, the file suffix of a primary record, and whether the
//! primary record is an XML document. Types whose primary source is not XML
//! (code files, nested bundles) cannot be entity-transformed.

/// Archive layout of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    /// Entity type name as it appears in the manifest.
    pub name: &'static str,
    /// Archive sub-directory holding this type's records.
    pub directory: &'static str,
    /// File suffix of a primary record (no leading dot).
    pub suffix: &'static str,
    /// Whether the primary record is an XML document.
    pub xml_capable: bool,
}

/// Known entity types.
pub const ENTITY_TYPES: &[EntityType] = &[
    EntityType {
        name: "CustomApplication",
        directory: "applications",
        suffix: "app",
        xml_capable: true,
    },
    EntityType {
        name: "CustomObject",
        directory: "objects",
        suffix: "object",
        xml_capable: true,
    },
    EntityType {
        name: "CustomTab",
        directory: "tabs",
        suffix: "tab",
        xml_capable: true,
    },
    EntityType {
        name: "Flow",
        directory: "flows",
        suffix: "flow",
        xml_capable: true,
    },
    EntityType {
        name: "Layout",
        directory: "layouts",
        suffix: "layout",
        xml_capable: true,
    },
    EntityType {
        name: "PermissionSet",
        directory: "permissionsets",
        suffix: "permissionset",
        xml_capable: true,
    },
    EntityType {
        name: "Profile",
        directory: "profiles",
        suffix: "profile",
        xml_capable: true,
    },
    // Primary sources below are code or nested bundles, not XML documents.
    EntityType {
        name: "ApexClass",
        directory: "classes",
        suffix: "cls",
        xml_capable: false,
    },
    EntityType {
        name: "ExperienceBundle",
        directory: "experiences",
        suffix: "site",
        xml_capable: false,
    },
    EntityType {
        name: "LightningComponentBundle",
        directory: "lwc",
        suffix: "",
        xml_capable: false,
    },
    EntityType {
        name: "StaticResource",
        directory: "staticresources",
        suffix: "resource",
        xml_capable: false,
    },
];

/// Look up an entity type by manifest name.
pub fn lookup(name: &str) -> Option<&'static EntityType> {
    ENTITY_TYPES.iter().find(|t| t.name == name)
}
