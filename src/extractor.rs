//! Schema reference extraction
//!
//! Scans the whole document once with `quick-xml` to make sure it is well-formed,
//! and reads the `xsi:schemaLocation` / `xsi:noNamespaceSchemaLocation` attributes
//! of the root element. The `xsi` prefix is resolved through the namespace
//! declarations in scope, so any prefix bound to the schema-instance namespace works.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::document::Document;
use crate::error::{Result, ValidationError};
use crate::outcome::{Violation, ViolationKind};

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

const SCHEMA_LOCATION: &[u8] = b"schemaLocation";
const NO_NAMESPACE_SCHEMA_LOCATION: &[u8] = b"noNamespaceSchemaLocation";

/// A schema binding declared by a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaReference {
    /// `None` for the no-namespace binding
    pub namespace: Option<String>,
    pub location: String,
}

impl SchemaReference {
    pub fn namespaced(namespace: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            location: location.into(),
        }
    }

    pub fn no_namespace(location: impl Into<String>) -> Self {
        Self {
            namespace: None,
            location: location.into(),
        }
    }

    pub fn is_no_namespace(&self) -> bool {
        self.namespace.is_none()
    }
}

/// Everything the extractor learned about a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Line of the root element's start tag
    pub root_line: usize,
    pub references: Vec<SchemaReference>,
    /// Malformed reference attributes
    pub findings: Vec<Violation>,
}

impl Extraction {
    pub fn has_references(&self) -> bool {
        !self.references.is_empty()
    }
}

/// Check well-formedness and collect the schema references of the root element
pub fn extract(document: &Document) -> Result<Extraction> {
    let mut reader = NsReader::from_str(document.content());

    let mut depth = 0usize;
    let mut root: Option<Extraction> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let at = reader.buffer_position() as usize;
                return Err(parse_error(document, at, e.to_string()));
            }
        };

        match event {
            Event::Start(ref start) | Event::Empty(ref start) => {
                let (resolved, _) = reader.resolve_element(start.name());
                if let ResolveResult::Unknown(prefix) = resolved {
                    return Err(parse_error(
                        document,
                        offset,
                        format!(
                            "namespace prefix '{}' is not declared",
                            String::from_utf8_lossy(&prefix)
                        ),
                    ));
                }
                if depth == 0 {
                    if root.is_some() {
                        return Err(parse_error(
                            document,
                            offset,
                            "extra content after the root element".to_string(),
                        ));
                    }
                    let (line, _) = document.position_of(offset);
                    root = Some(read_root_attributes(document, &reader, start, line, offset)?);
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    return Err(parse_error(
                        document,
                        offset,
                        "closing tag without a matching opening tag".to_string(),
                    ));
                }
                depth -= 1;
            }
            Event::Text(ref text) if depth == 0 => {
                if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(parse_error(
                        document,
                        offset,
                        "text outside of the root element".to_string(),
                    ));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(parse_error(
                    document,
                    offset,
                    "CDATA section outside of the root element".to_string(),
                ));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err(parse_error(
            document,
            document.content().len(),
            "premature end of document, unclosed element".to_string(),
        ));
    }

    root.ok_or_else(|| parse_error(document, 0, "document has no root element".to_string()))
}

fn read_root_attributes(
    document: &Document,
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    root_line: usize,
    offset: usize,
) -> Result<Extraction> {
    let mut extraction = Extraction {
        root_line,
        references: Vec::new(),
        findings: Vec::new(),
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| parse_error(document, offset, e.to_string()))?;
        let (namespace, local) = reader.resolve_attribute(attribute.key);
        let in_xsi = matches!(namespace, ResolveResult::Bound(ns) if ns.as_ref() == XSI_NAMESPACE.as_bytes());
        if !in_xsi {
            continue;
        }

        let value = attribute
            .decode_and_unescape_value(&**reader)
            .map_err(|e| parse_error(document, offset, e.to_string()))?;

        match local.as_ref() {
            SCHEMA_LOCATION => {
                let tokens: Vec<&str> = value.split_whitespace().collect();
                if tokens.len() % 2 != 0 {
                    extraction.findings.push(Violation::new(
                        ViolationKind::ReferenceSyntax,
                        root_line,
                        format!(
                            "xsi:schemaLocation must list namespace/location pairs, found {} tokens (dangling '{}')",
                            tokens.len(),
                            tokens[tokens.len() - 1]
                        ),
                    ));
                }
                for pair in tokens.chunks_exact(2) {
                    push_unique(
                        &mut extraction.references,
                        SchemaReference::namespaced(pair[0], pair[1]),
                    );
                }
            }
            NO_NAMESPACE_SCHEMA_LOCATION => {
                let location = value.trim();
                if location.is_empty() {
                    continue;
                }
                if location.split_whitespace().count() > 1 {
                    extraction.findings.push(Violation::new(
                        ViolationKind::ReferenceSyntax,
                        root_line,
                        format!(
                            "xsi:noNamespaceSchemaLocation must hold a single location, found '{}'",
                            location
                        ),
                    ));
                    continue;
                }
                push_unique(
                    &mut extraction.references,
                    SchemaReference::no_namespace(location),
                );
            }
            _ => {}
        }
    }

    Ok(extraction)
}

/// Exact duplicates collapse; mismatched ones are left for the composer
fn push_unique(references: &mut Vec<SchemaReference>, reference: SchemaReference) {
    if !references.contains(&reference) {
        references.push(reference);
    }
}

fn parse_error(document: &Document, offset: usize, message: String) -> ValidationError {
    let (line, column) = document.position_of(offset);
    ValidationError::Parse {
        path: document.path().to_path_buf(),
        line,
        column: Some(column),
        message,
    }
}
