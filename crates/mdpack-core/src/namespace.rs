//! Namespace token substitution.
//!
//! Metadata text may carry sentinel tokens marking where a namespace prefix
//! belongs. Three mutually exclusive modes operate on an archive per build:
//!
//! - **tokenize**: replace literal `prefix__` occurrences with the sentinel,
//!   making the text namespace-agnostic for source control;
//! - **inject**: resolve sentinels back to `prefix__` (managed) or remove
//!   them (unmanaged), with an extra table of org-dependent tokens;
//! - **strip**: remove sentinel occurrences unconditionally.
//!
//! All three are pure `(name, text) -> (name, text)` rewrites; file names
//! carry their own token spelling because `%` is not always safe there.

use crate::archive::Archive;
use crate::error::PackageError;

/// Sentinel marking a namespace prefix in file content.
pub const NAMESPACE_TOKEN: &str = "%%%NAMESPACE%%%";
/// Sentinel marking a namespace prefix in file names.
pub const FILENAME_TOKEN: &str = "___NAMESPACE___";
/// Resolves to the bare namespace, or `c` when unmanaged (cross-object
/// references use `c` as the default namespace).
pub const NAMESPACE_OR_C_TOKEN: &str = "%%%NAMESPACE_OR_C%%%";
/// Resolves to `prefix__` only when deploying to a namespaced org.
pub const NAMESPACED_ORG_TOKEN: &str = "%%%NAMESPACED_ORG%%%";
/// File-name spelling of [`NAMESPACED_ORG_TOKEN`].
pub const NAMESPACED_ORG_FILENAME_TOKEN: &str = "___NAMESPACED_ORG___";
/// Resolves to the bare namespace in a namespaced org, `c` otherwise.
pub const NAMESPACED_ORG_OR_C_TOKEN: &str = "%%%NAMESPACED_ORG_OR_C%%%";

/// Replace literal `prefix__` occurrences with sentinel tokens in a file's
/// name and content.
pub fn tokenize_namespace(name: &str, text: &str, prefix: &str) -> (String, String) {
    let literal = format!("{prefix}__");
    (
        name.replace(&literal, FILENAME_TOKEN),
        text.replace(&literal, NAMESPACE_TOKEN),
    )
}

/// Remove sentinel occurrences from a file's name and content.
pub fn strip_namespace(name: &str, text: &str) -> (String, String) {
    (
        name.replace(FILENAME_TOKEN, ""),
        text.replace(NAMESPACE_TOKEN, ""),
    )
}

/// Table-driven sentinel resolution for the inject mode.
///
/// The substitution table is computed once from the prefix and the
/// `managed` / `namespaced_org` flags, then applied to every file. The
/// org-dependent tokens are a policy table, not a generic text operation:
/// adding a token means adding a row here.
#[derive(Debug, Clone)]
pub struct NamespaceInjector {
    content_rules: Vec<(&'static str, String)>,
    name_rules: Vec<(&'static str, String)>,
}

impl NamespaceInjector {
    /// Build the substitution table for the given prefix and flags.
    pub fn new(prefix: &str, managed: bool, namespaced_org: bool) -> Self {
        let namespace_prefix = if managed {
            format!("{prefix}__")
        } else {
            String::new()
        };
        let namespace_or_c = if managed { prefix.to_string() } else { "c".to_string() };
        let org_prefix = if namespaced_org {
            format!("{prefix}__")
        } else {
            String::new()
        };
        let org_or_c = if namespaced_org {
            prefix.to_string()
        } else {
            "c".to_string()
        };

        Self {
            content_rules: vec![
                (NAMESPACE_TOKEN, namespace_prefix.clone()),
                (NAMESPACE_OR_C_TOKEN, namespace_or_c),
                (NAMESPACED_ORG_TOKEN, org_prefix.clone()),
                (NAMESPACED_ORG_OR_C_TOKEN, org_or_c),
            ],
            name_rules: vec![
                (FILENAME_TOKEN, namespace_prefix),
                (NAMESPACED_ORG_FILENAME_TOKEN, org_prefix),
            ],
        }
    }

    /// Resolve content tokens in a piece of text.
    pub fn inject(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (token, replacement) in &self.content_rules {
            out = out.replace(token, replacement);
        }
        out
    }

    /// Resolve file-name tokens.
    pub fn inject_name(&self, name: &str) -> String {
        let mut out = name.to_string();
        for (token, replacement) in &self.name_rules {
            out = out.replace(token, replacement);
        }
        out
    }

    /// Resolve both the name and content of a file.
    pub fn apply(&self, name: &str, text: &str) -> (String, String) {
        (self.inject_name(name), self.inject(text))
    }
}

/// Apply a text rewrite to every entry whose name satisfies `predicate`,
/// copying all other entries verbatim.
///
/// Entries that are not valid UTF-8 pass through untouched, as do entries
/// the rewrite leaves unchanged; this is what keeps untouched files
/// byte-identical.
///
/// # Errors
///
/// Returns an error if the rewritten archive cannot accept entries.
pub fn process_text_entries<P, F>(
    archive: &Archive,
    predicate: P,
    transform: F,
) -> Result<Archive, PackageError>
where
    P: Fn(&str) -> bool,
    F: Fn(&str, &str) -> (String, String),
{
    let mut out = Archive::new();
    for entry in archive.entries() {
        if !predicate(&entry.name) {
            out.add(entry.name.clone(), entry.data.clone())?;
            continue;
        }
        match std::str::from_utf8(&entry.data) {
            Ok(text) => {
                let (name, new_text) = transform(&entry.name, text);
                if name == entry.name && new_text == text {
                    out.add(entry.name.clone(), entry.data.clone())?;
                } else {
                    out.add(name, new_text.into_bytes())?;
                }
            }
            Err(_) => out.add(entry.name.clone(), entry.data.clone())?,
        }
    }
    Ok(out)
}

/// [`process_text_entries`] over every file in the archive.
///
/// # Errors
///
/// Returns an error if the rewritten archive cannot accept entries.
pub fn process_text_in_archive<F>(archive: &Archive, transform: F) -> Result<Archive, PackageError>
where
    F: Fn(&str, &str) -> (String, String),
{
    process_text_entries(archive, |_| true, transform)
}
