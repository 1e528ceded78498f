//! In-memory deployable archive.
//!
//! An [`Archive`] is an ordered collection of `path -> bytes` entries backed
//! by the zip format on the wire. Pipeline stages never mutate entries in
//! place across stages: each stage re-opens its input into a fresh archive,
//! copying unread entries verbatim and rewriting only the entries it touches.
//! That copy discipline is what guarantees untouched files stay
//! byte-identical through the whole pipeline.

use std::io::{Cursor, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::PackageError;

/// Archive path of the package manifest.
pub const MANIFEST_PATH: &str = "package.xml";

/// A single named entry in an [`Archive`].
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Relative `/`-separated, case-sensitive path.
    pub name: String,
    /// Raw file content.
    pub data: Vec<u8>,
}

/// Ordered, mutable collection of archive entries.
///
/// Paths are unique; [`Archive::add`] on an existing path overwrites the
/// entry in place, preserving its position. Once [`Archive::finalize`] has
/// been called the archive rejects further writes.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    finalized: bool,
}

impl Archive {
    /// Create a new, empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-open a serialized archive into a new mutable archive.
    ///
    /// Entry order is preserved; directory entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a readable zip stream.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut archive = Self::new();

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data)?;
            archive.add(name, data)?;
        }

        Ok(archive)
    }

    /// Add an entry, overwriting (in place) any existing entry at `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Finalized`] if the archive has been finalized.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Result<(), PackageError> {
        if self.finalized {
            return Err(PackageError::Finalized);
        }
        let name = name.into();
        let data = data.into();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.data = data;
        } else {
            self.entries.push(ArchiveEntry { name, data });
        }
        Ok(())
    }

    /// Read an entry's content.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::EntryNotFound`] if no entry exists at `name`.
    pub fn read(&self, name: &str) -> Result<&[u8], PackageError> {
        self.get(name)
            .ok_or_else(|| PackageError::EntryNotFound(name.to_string()))
    }

    /// Read an entry's content, or `None` if absent.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Whether an entry exists at `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// All entry names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// All entries, in insertion order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close the archive for further writes. Idempotent.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    /// Whether [`Archive::finalize`] has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Serialize to zip bytes (deflate).
    ///
    /// # Errors
    ///
    /// Returns an error if zip encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            writer.start_file(&entry.name, options)?;
            writer.write_all(&entry.data)?;
        }

        Ok(writer.finish()?.into_inner())
    }

    /// Content-addressed digest over the archive's logical contents.
    ///
    /// The digest covers entry names and contents in sorted-name order, so
    /// it is stable across rebuilds and ignores zip metadata such as
    /// timestamps.
    pub fn content_hash(&self) -> String {
        let mut sorted: Vec<&ArchiveEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut hasher = Sha256::new();
        for entry in sorted {
            hasher.update(entry.name.as_bytes());
            hasher.update(&entry.data);
        }
        hex::encode(hasher.finalize())
    }

    /// Transportable base64 encoding of the serialized archive, for
    /// embedding in remote API payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if zip encoding fails.
    pub fn to_base64(&self) -> Result<String, PackageError> {
        Ok(BASE64.encode(self.to_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_read_overwrite() {
        let mut archive = Archive::new();
        archive.add("a.txt", b"one".to_vec()).unwrap();
        archive.add("b.txt", b"two".to_vec()).unwrap();
        archive.add("a.txt", b"three".to_vec()).unwrap();

        assert_eq!(archive.read("a.txt").unwrap(), b"three");
        assert_eq!(archive.len(), 2);
        // Overwrite keeps the original position
        assert_eq!(archive.names().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_read_missing_entry() {
        let archive = Archive::new();
        assert!(matches!(
            archive.read("nope.xml"),
            Err(PackageError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_finalize_rejects_writes() {
        let mut archive = Archive::new();
        archive.add("a.txt", b"one".to_vec()).unwrap();
        archive.finalize();
        archive.finalize(); // idempotent

        assert!(matches!(
            archive.add("b.txt", b"two".to_vec()),
            Err(PackageError::Finalized)
        ));
        assert!(archive.is_finalized());
    }

    #[test]
    fn test_zip_round_trip_preserves_order_and_bytes() {
        let mut archive = Archive::new();
        archive.add("package.xml", b"<Package/>".to_vec()).unwrap();
        archive.add("classes/Foo.cls", b"class Foo {}".to_vec()).unwrap();

        let bytes = archive.to_bytes().unwrap();
        let reopened = Archive::from_bytes(&bytes).unwrap();

        assert_eq!(
            reopened.names().collect::<Vec<_>>(),
            vec!["package.xml", "classes/Foo.cls"]
        );
        assert_eq!(reopened.read("classes/Foo.cls").unwrap(), b"class Foo {}");
    }

    #[test]
    fn test_content_hash_ignores_insertion_order() {
        let mut a = Archive::new();
        a.add("x", b"1".to_vec()).unwrap();
        a.add("y", b"2".to_vec()).unwrap();

        let mut b = Archive::new();
        b.add("y", b"2".to_vec()).unwrap();
        b.add("x", b"1".to_vec()).unwrap();

        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_content_hash_stable_across_rebuilds() {
        let mut archive = Archive::new();
        archive.add("package.xml", b"<Package/>".to_vec()).unwrap();

        let first = archive.content_hash();
        let reopened = Archive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
        assert_eq!(first, reopened.content_hash());
    }

    #[test]
    fn test_base64_is_reversible() {
        let mut archive = Archive::new();
        archive.add("package.xml", b"<Package/>".to_vec()).unwrap();

        let encoded = archive.to_base64().unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, archive.to_bytes().unwrap());
    }
}
