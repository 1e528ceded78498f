//! Entity transform engine.
//!
//! Reads an archive laid out as typed sub-directories of named records,
//! applies a per-record transform to each selected record, and writes a
//! fresh output archive plus a manifest reflecting exactly the records
//! that survived. Each entity type moves through a fixed sequence:
//! discover, select, transform, emit.
//!
//! Selection is set-based: an explicit name set must be a subset of what
//! discovery finds (a missing name is fatal), while the wildcard resolves
//! to the concrete set of discovered names. A transform may return
//! [`TransformOutcome::Delete`] to drop a record from the output entirely;
//! that name is removed from the selection set too, so the generated
//! manifest reflects the deletion.

use std::collections::BTreeSet;

use percent_encoding::percent_decode_str;
use tracing::info;

use crate::archive::{Archive, MANIFEST_PATH};
use crate::entity::{self, EntityType};
use crate::error::PackageError;
use crate::metaxml::META_XML_SUFFIX;
use crate::namespace::NamespaceInjector;
use crate::xml::{MetadataElement, PackageManifest};

/// Which records of an entity type to include.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSet {
    /// Every discovered record.
    Wildcard,
    /// Exactly these API names (file-name form).
    Names(BTreeSet<String>),
}

impl SelectionSet {
    /// Parse a comma-separated name list; empty input or a `*` entry means
    /// the wildcard.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Wildcard;
        };
        let names: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect();
        if names.is_empty() || names.contains("*") {
            Self::Wildcard
        } else {
            Self::Names(names)
        }
    }

    /// The concrete names, if resolved.
    pub fn names(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Wildcard => None,
            Self::Names(names) => Some(names),
        }
    }
}

/// What a transform decided for one record.
#[derive(Debug, Clone)]
pub enum TransformOutcome {
    /// Emit this tree as the record's new primary document.
    Replace(MetadataElement),
    /// Drop the record from the output entirely.
    Delete,
}

/// A per-record transform over a parsed primary document.
pub trait EntityTransform {
    /// Transform one record, identified by its resolved API name.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole run.
    fn transform(
        &self,
        tree: MetadataElement,
        api_name: &str,
    ) -> Result<TransformOutcome, PackageError>;
}

/// Configuration of one transform run.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Entity type to transform.
    pub entity: String,
    /// Record selection.
    pub api_names: SelectionSet,
    /// Target API version for the generated manifest.
    pub api_version: String,
    /// Whether the deployment is managed.
    pub managed: bool,
    /// Namespace prefix resolved into names and values at init time.
    pub namespace_inject: Option<String>,
    /// The target org itself carries the namespace.
    pub namespaced_org: bool,
}

/// Result of a transform run.
#[derive(Debug)]
pub struct TransformResult {
    /// Output archive: surviving records, their side-cars, and a manifest.
    pub archive: Archive,
    /// The names actually emitted (file-name form).
    pub api_names: BTreeSet<String>,
    /// Manifest covering exactly the surviving records.
    pub manifest: PackageManifest,
}

/// Applies an [`EntityTransform`] to the selected records of one entity
/// type.
#[derive(Debug)]
pub struct EntityTransformEngine {
    options: TransformOptions,
}

impl EntityTransformEngine {
    /// Create an engine, resolving namespace tokens in the selection set
    /// once at construction.
    pub fn new(mut options: TransformOptions) -> Self {
        if let Some(prefix) = &options.namespace_inject {
            let injector = NamespaceInjector::new(prefix, options.managed, options.namespaced_org);
            if let SelectionSet::Names(names) = &options.api_names {
                options.api_names =
                    SelectionSet::Names(names.iter().map(|n| injector.inject(n)).collect());
            }
        }
        Self { options }
    }

    /// The current selection set. After [`EntityTransformEngine::run`] this
    /// reflects exactly the names that were emitted.
    pub fn api_names(&self) -> &SelectionSet {
        &self.options.api_names
    }

    /// Run discover, select, transform, emit over `input`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::UnsupportedEntity`] for unknown or non-XML
    /// entity types (before any record is read),
    /// [`PackageError::Selection`] if an explicit name was never
    /// discovered, and [`PackageError::MalformedDocument`] if a record
    /// fails to parse.
    pub fn run(
        &mut self,
        input: &Archive,
        transform: &dyn EntityTransform,
    ) -> Result<TransformResult, PackageError> {
        let entity_type = entity::lookup(&self.options.entity)
            .filter(|t| t.xml_capable)
            .ok_or_else(|| PackageError::UnsupportedEntity(self.options.entity.clone()))?;

        let discovered = discover(input, entity_type);

        let selected: BTreeSet<String> = match &self.options.api_names {
            SelectionSet::Wildcard => discovered.clone(),
            SelectionSet::Names(names) => {
                for name in names {
                    if !discovered.contains(name) {
                        return Err(PackageError::Selection(format!(
                            "{} record {name} was not found",
                            self.options.entity
                        )));
                    }
                }
                names.clone()
            }
        };

        let mut output = Archive::new();
        let mut survivors = BTreeSet::new();

        for name in &selected {
            let path = record_path(entity_type, name);
            let tree = MetadataElement::parse(&path, input.read(&path)?)?;
            let api_name = percent_decode_str(name).decode_utf8_lossy().into_owned();

            match transform.transform(tree, &api_name)? {
                TransformOutcome::Replace(tree) => {
                    output.add(path.clone(), tree.to_xml_bytes())?;
                    let sidecar = format!("{path}{META_XML_SUFFIX}");
                    if let Some(data) = input.get(&sidecar) {
                        output.add(sidecar, data.to_vec())?;
                    }
                    survivors.insert(name.clone());
                }
                TransformOutcome::Delete => {
                    info!(entity = %self.options.entity, record = %api_name, "removing record");
                }
            }
        }

        let members: Vec<String> = survivors
            .iter()
            .map(|n| percent_decode_str(n).decode_utf8_lossy().into_owned())
            .collect();
        let manifest = PackageManifest::from_entities(
            &self.options.api_version,
            vec![(self.options.entity.clone(), members)],
        );
        output.add(MANIFEST_PATH, manifest.to_xml_bytes())?;

        self.options.api_names = SelectionSet::Names(survivors.clone());
        Ok(TransformResult {
            archive: output,
            api_names: survivors,
            manifest,
        })
    }
}

/// Enumerate primary record names (file stems) of one type in an archive.
fn discover(input: &Archive, entity_type: &EntityType) -> BTreeSet<String> {
    let prefix = format!("{}/", entity_type.directory);
    let suffix = format!(".{}", entity_type.suffix);

    input
        .names()
        .filter_map(|name| name.strip_prefix(&prefix))
        .filter(|rest| !rest.contains('/'))
        .filter(|rest| !rest.ends_with(META_XML_SUFFIX))
        .filter_map(|rest| rest.strip_suffix(&suffix))
        .map(ToString::to_string)
        .collect()
}

fn record_path(entity_type: &EntityType, name: &str) -> String {
    format!(
        "{}/{}.{}",
        entity_type.directory, name, entity_type.suffix
    )
}

/// Overwrite (or create) the text of a record's first-level child element.
///
/// If a first-level child with the configured tag exists its text is
/// overwritten in place; otherwise a new child is appended. The value is
/// resolved through namespace injection once, at construction, so no
/// per-record resolution happens.
#[derive(Debug, Clone)]
pub struct FirstChildTextTransform {
    tag: String,
    value: String,
}

impl FirstChildTextTransform {
    /// Create a transform writing `value` into the child `tag`.
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// Create a transform whose value may carry a namespace sentinel,
    /// resolved now with the run's inject settings.
    pub fn with_namespace(
        tag: impl Into<String>,
        value: impl Into<String>,
        namespace_inject: Option<&str>,
        managed: bool,
    ) -> Self {
        let value = value.into();
        let value = match namespace_inject {
            Some(prefix) => NamespaceInjector::new(prefix, managed, false).inject(&value),
            None => value,
        };
        Self::new(tag, value)
    }
}

impl EntityTransform for FirstChildTextTransform {
    fn transform(
        &self,
        mut tree: MetadataElement,
        api_name: &str,
    ) -> Result<TransformOutcome, PackageError> {
        info!(record = %api_name, tag = %self.tag, value = %self.value, "updating first child");
        if let Some(child) = tree.find_mut(&self.tag) {
            child.text = Some(self.value.clone());
        } else {
            tree.append(MetadataElement::with_text(
                self.tag.clone(),
                self.value.clone(),
            ));
        }
        Ok(TransformOutcome::Replace(tree))
    }
}
