//! Ordered XML tree for metadata documents.
//!
//! Metadata records are small XML documents whose element order is
//! significant (the deployment API requires, for example, that a manifest
//! section list its `members` before its `name`). [`MetadataElement`] is an
//! explicit ordered tree with find / insert-before / append operations, so
//! ordering contracts live in the insertion routines rather than in caller
//! discipline.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::error::PackageError;

/// XML namespace of all metadata documents.
pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// One element of a metadata document: tag, optional text, attributes, and
/// ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataElement {
    /// Element tag name.
    pub tag: String,
    /// Text content, if any.
    pub text: Option<String>,
    /// Attributes in document order (`xmlns` included).
    pub attrs: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<MetadataElement>,
}

impl MetadataElement {
    /// Create an element with no text, attributes, or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Create a leaf element carrying text.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Parse a document rooted at a single element.
    ///
    /// `path` identifies the document in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::MalformedDocument`] if the bytes are not
    /// well-formed XML with exactly one root element.
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self, PackageError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<MetadataElement> = Vec::new();
        let mut root: Option<MetadataElement> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(start)) => {
                    stack.push(Self::from_start(path, &start)?);
                }
                Ok(Event::Empty(start)) => {
                    let element = Self::from_start(path, &start)?;
                    Self::attach(path, &mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    let value = text
                        .unescape()
                        .map_err(|e| malformed(path, &e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        match &mut current.text {
                            Some(existing) => existing.push_str(&value),
                            None => current.text = Some(value.into_owned()),
                        }
                    }
                }
                Ok(Event::CData(cdata)) => {
                    let value = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        match &mut current.text {
                            Some(existing) => existing.push_str(&value),
                            None => current.text = Some(value),
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed(path, "unexpected closing tag"))?;
                    Self::attach(path, &mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                // Declaration, comments, processing instructions, doctype
                Ok(_) => {}
                Err(e) => return Err(malformed(path, &e.to_string())),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(malformed(path, "unclosed element"));
        }
        root.ok_or_else(|| malformed(path, "document has no root element"))
    }

    fn from_start(path: &str, start: &BytesStart<'_>) -> Result<Self, PackageError> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| malformed(path, &e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| malformed(path, &e.to_string()))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            tag,
            text: None,
            attrs,
            children: Vec::new(),
        })
    }

    fn attach(
        path: &str,
        stack: &mut [MetadataElement],
        root: &mut Option<MetadataElement>,
        element: MetadataElement,
    ) -> Result<(), PackageError> {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(element);
            Ok(())
        } else if root.is_some() {
            Err(malformed(path, "multiple root elements"))
        } else {
            *root = Some(element);
            Ok(())
        }
    }

    /// First child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&MetadataElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// First child with the given tag, mutable.
    pub fn find_mut(&mut self, tag: &str) -> Option<&mut MetadataElement> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    /// First child with the given tag whose text equals `text`.
    pub fn find_with_text(&self, tag: &str, text: &str) -> Option<&MetadataElement> {
        self.children
            .iter()
            .find(|c| c.tag == tag && c.text.as_deref() == Some(text))
    }

    /// All children with the given tag, in order.
    pub fn findall(&self, tag: &str) -> impl Iterator<Item = &MetadataElement> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Index of the first child with the given tag.
    pub fn position(&self, tag: &str) -> Option<usize> {
        self.children.iter().position(|c| c.tag == tag)
    }

    /// Append a child and return a mutable reference to it.
    pub fn append(&mut self, child: MetadataElement) -> &mut MetadataElement {
        self.children.push(child);
        self.children.last_mut().expect("just pushed")
    }

    /// Insert a child at `index`, shifting later siblings.
    ///
    /// An `index` at or past the end appends.
    pub fn insert_before(&mut self, index: usize, child: MetadataElement) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    /// Remove all first-level children with the given tag, returning how
    /// many were removed.
    pub fn remove_children(&mut self, tag: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|c| c.tag != tag);
        before - self.children.len()
    }

    /// Serialize to a UTF-8 document with an XML declaration and four-space
    /// indentation.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.write_into(&mut out, 0);
        out
    }

    /// [`MetadataElement::to_xml_string`] as bytes.
    pub fn to_xml_bytes(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth);
        out.push_str(&indent);
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() {
            if let Some(text) = &self.text {
                out.push('>');
                out.push_str(&escape(text.as_str()));
                out.push_str("</");
                out.push_str(&self.tag);
                out.push_str(">\n");
            } else {
                out.push_str("/>\n");
            }
        } else {
            out.push_str(">\n");
            for child in &self.children {
                child.write_into(out, depth + 1);
            }
            out.push_str(&indent);
            out.push_str("</");
            out.push_str(&self.tag);
            out.push_str(">\n");
        }
    }
}

fn malformed(path: &str, message: &str) -> PackageError {
    PackageError::MalformedDocument {
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<CustomObject xmlns=\"http://soap.sforce.com/2006/04/metadata\">
    <label>Account &amp; Contact</label>
    <fields>
        <fullName>Name__c</fullName>
    </fields>
    <fields>
        <fullName>Other__c</fullName>
    </fields>
</CustomObject>";

    #[test]
    fn test_parse_structure() {
        let root = MetadataElement::parse("test.xml", DOC).unwrap();

        assert_eq!(root.tag, "CustomObject");
        assert_eq!(
            root.attrs,
            vec![("xmlns".to_string(), METADATA_NAMESPACE.to_string())]
        );
        assert_eq!(
            root.find("label").unwrap().text.as_deref(),
            Some("Account & Contact")
        );
        assert_eq!(root.findall("fields").count(), 2);
    }

    #[test]
    fn test_parse_malformed() {
        let err = MetadataElement::parse("bad.xml", b">>>>>NOT XML<<<<<").unwrap_err();
        assert!(matches!(
            err,
            PackageError::MalformedDocument { ref path, .. } if path == "bad.xml"
        ));
    }

    #[test]
    fn test_parse_unclosed() {
        assert!(MetadataElement::parse("bad.xml", b"<a><b></a>").is_err());
        assert!(MetadataElement::parse("bad.xml", b"<a>").is_err());
    }

    #[test]
    fn test_round_trip() {
        let root = MetadataElement::parse("test.xml", DOC).unwrap();
        let rendered = root.to_xml_string();
        let reparsed = MetadataElement::parse("test.xml", rendered.as_bytes()).unwrap();
        assert_eq!(root, reparsed);
    }

    #[test]
    fn test_insert_before_keeps_order() {
        let mut section = MetadataElement::new("types");
        section.append(MetadataElement::with_text("name", "StaticResource"));

        let anchor = section.position("name").unwrap();
        section.insert_before(anchor, MetadataElement::with_text("members", "B"));
        let anchor = section.position("name").unwrap();
        section.insert_before(anchor, MetadataElement::with_text("members", "A"));

        let tags: Vec<&str> = section.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["members", "members", "name"]);
        assert_eq!(section.children[0].text.as_deref(), Some("B"));
        assert_eq!(section.children[1].text.as_deref(), Some("A"));
    }

    #[test]
    fn test_remove_children() {
        let mut root = MetadataElement::parse("test.xml", DOC).unwrap();
        assert_eq!(root.remove_children("fields"), 2);
        assert_eq!(root.remove_children("fields"), 0);
        assert!(root.find("label").is_some());
    }

    #[test]
    fn test_escaping_round_trip() {
        let element = MetadataElement::with_text("value", "a < b & \"c\"");
        let rendered = element.to_xml_string();
        let reparsed = MetadataElement::parse("t.xml", rendered.as_bytes()).unwrap();
        assert_eq!(reparsed.text.as_deref(), Some("a < b & \"c\""));
    }
}
