//! Merging resolved schemas into one validation context
//!
//! Grammars are keyed by the namespace they are bound to. libxml2 only validates
//! against a single compiled schema, so the context is rendered as a wrapper schema
//! that imports every namespaced grammar and includes the no-namespace one.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use crate::document;
use crate::error::{Result, ValidationError};
use crate::outcome::{Violation, ViolationKind};
use crate::resolver::{ResolvedSchema, SchemaOrigin, SchemaResolver};

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace a grammar is bound to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamespaceKey {
    NoNamespace,
    Uri(String),
}

impl NamespaceKey {
    pub fn from_namespace(namespace: Option<&str>) -> Self {
        match namespace {
            Some(uri) => NamespaceKey::Uri(uri.to_string()),
            None => NamespaceKey::NoNamespace,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match self {
            NamespaceKey::NoNamespace => None,
            NamespaceKey::Uri(uri) => Some(uri),
        }
    }
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceKey::NoNamespace => f.write_str("(no namespace)"),
            NamespaceKey::Uri(uri) => f.write_str(uri),
        }
    }
}

/// One schema taking part in validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    /// Resolved path or URL
    pub source: String,
    pub origin: SchemaOrigin,
    pub content: Arc<Vec<u8>>,
    pub digest: String,
    /// `schemaLocation`s of the `xs:include`/`xs:import`/`xs:redefine`/`xs:override`
    /// directives in the schema
    pub nested: Vec<String>,
}

/// The grammars one document is validated against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationContext {
    grammars: BTreeMap<NamespaceKey, Grammar>,
    excluded: BTreeSet<NamespaceKey>,
    findings: Vec<Violation>,
}

impl ValidationContext {
    pub fn grammars(&self) -> &BTreeMap<NamespaceKey, Grammar> {
        &self.grammars
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }

    /// Namespaces declared by the document that have no grammar here
    pub fn excluded(&self) -> &BTreeSet<NamespaceKey> {
        &self.excluded
    }

    /// Schemas rejected because they do not define the namespace they are bound to
    pub fn findings(&self) -> &[Violation] {
        &self.findings
    }

    /// Identity of the grammar set
    ///
    /// Self-contained schemas count by content only, wherever they came from. A schema
    /// pulling in other documents also counts by origin, since its relative locations
    /// depend on it.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        for (key, grammar) in &self.grammars {
            key.hash(&mut hasher);
            grammar.digest.hash(&mut hasher);
            if !grammar.nested.is_empty() {
                grammar.origin.hash(&mut hasher);
            }
        }
        format!("context_{:016x}", hasher.finish())
    }

    /// Write every grammar, and every schema they pull in, into `dir` and return the
    /// wrapper schema tying them together.
    ///
    /// Nested locations are resolved through `resolver` and rewritten to point at the
    /// copies in `dir`, so libxml2 never loads anything itself. A nested location that
    /// cannot be resolved is left as written.
    pub async fn materialize(&self, dir: &Path, resolver: &SchemaResolver) -> Result<Vec<u8>> {
        let mut staging = Staging::new(dir);
        let mut wrapper = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xs:schema xmlns:xs=\"{XSD_NAMESPACE}\">\n"
        );

        for (key, grammar) in &self.grammars {
            let path = staging
                .stage(&grammar.origin, Arc::clone(&grammar.content), resolver)
                .await?;

            let location = path.display().to_string();
            match key {
                NamespaceKey::NoNamespace => wrapper.push_str(&format!(
                    "  <xs:include schemaLocation=\"{}\"/>\n",
                    escape(location.as_str())
                )),
                NamespaceKey::Uri(uri) => wrapper.push_str(&format!(
                    "  <xs:import namespace=\"{}\" schemaLocation=\"{}\"/>\n",
                    escape(uri.as_str()),
                    escape(location.as_str())
                )),
            }
        }

        wrapper.push_str("</xs:schema>\n");
        Ok(wrapper.into_bytes())
    }
}

/// Scratch copies of schema documents, one file per origin
struct Staging<'a> {
    dir: &'a Path,
    files: HashMap<SchemaOrigin, PathBuf>,
}

impl<'a> Staging<'a> {
    fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            files: HashMap::new(),
        }
    }

    fn assign(&mut self, origin: SchemaOrigin) -> PathBuf {
        let path = self.dir.join(format!("grammar{}.xsd", self.files.len()));
        self.files.insert(origin, path.clone());
        path
    }

    /// Write `content` and everything it transitively pulls in; returns its copy
    async fn stage(
        &mut self,
        origin: &SchemaOrigin,
        content: Arc<Vec<u8>>,
        resolver: &SchemaResolver,
    ) -> Result<PathBuf> {
        if let Some(path) = self.files.get(origin) {
            return Ok(path.clone());
        }

        let root = self.assign(origin.clone());
        let mut pending = vec![(origin.clone(), content, root.clone())];

        while let Some((origin, content, path)) = pending.pop() {
            let mut targets: HashMap<String, String> = HashMap::new();

            for location in schema_directives(&content) {
                if targets.contains_key(&location) {
                    continue;
                }
                match resolver.resolve_nested(&origin, &location).await {
                    Ok((nested, nested_content)) => {
                        let target = match self.files.get(&nested) {
                            Some(existing) => existing.clone(),
                            None => {
                                let assigned = self.assign(nested.clone());
                                pending.push((nested, nested_content, assigned.clone()));
                                assigned
                            }
                        };
                        targets.insert(location, target.display().to_string());
                    }
                    Err(e) => tracing::warn!(
                        schema = %origin,
                        location = %location,
                        error = %e,
                        "Nested schema could not be resolved"
                    ),
                }
            }

            let staged = if targets.is_empty() {
                content
            } else {
                match rewrite_directives(&content, &targets) {
                    Ok(rewritten) => Arc::new(rewritten),
                    Err(e) => {
                        tracing::warn!(schema = %origin, error = %e, "Schema locations not rewritten");
                        content
                    }
                }
            };
            tokio::fs::write(&path, staged.as_slice()).await?;
        }

        Ok(root)
    }
}

/// Whether an element is an `xs:include`, `xs:import`, `xs:redefine` or `xs:override`
fn is_directive(namespace: &ResolveResult<'_>, local: &[u8]) -> bool {
    matches!(namespace, ResolveResult::Bound(ns) if ns.as_ref() == XSD_NAMESPACE.as_bytes())
        && matches!(local, b"include" | b"import" | b"redefine" | b"override")
}

/// `schemaLocation` of every directive in a schema, in document order
fn schema_directives(content: &[u8]) -> Vec<String> {
    let mut reader = NsReader::from_reader(content);
    let mut locations = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                let (namespace, local) = reader.resolve_element(start.name());
                if !is_directive(&namespace, local.as_ref()) {
                    continue;
                }
                let location = start
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"schemaLocation")
                    .and_then(|attr| attr.decode_and_unescape_value(&*reader).ok())
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                if let Some(location) = location
                    && !locations.contains(&location)
                {
                    locations.push(location);
                }
            }
            Ok(Event::Eof) | Err(_) => return locations,
            Ok(_) => {}
        }
    }
}

/// Copy a schema, pointing directive `schemaLocation`s found in `targets` elsewhere
fn rewrite_directives(
    content: &[u8],
    targets: &HashMap<String, String>,
) -> std::result::Result<Vec<u8>, quick_xml::Error> {
    let mut reader = NsReader::from_reader(content);
    let mut writer = Writer::new(Vec::with_capacity(content.len()));

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) if directive(&reader, &start) => {
                writer.write_event(Event::Start(retarget(&reader, &start, targets)?))?
            }
            Event::Empty(start) if directive(&reader, &start) => {
                writer.write_event(Event::Empty(retarget(&reader, &start, targets)?))?
            }
            event => writer.write_event(event)?,
        }
    }

    Ok(writer.into_inner())
}

fn directive(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> bool {
    let (namespace, local) = reader.resolve_element(start.name());
    is_directive(&namespace, local.as_ref())
}

fn retarget(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
    targets: &HashMap<String, String>,
) -> std::result::Result<BytesStart<'static>, quick_xml::Error> {
    let mut copy = BytesStart::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());

    for attr in start.attributes() {
        let attr = attr?;
        let target = if attr.key.as_ref() == b"schemaLocation" {
            let value = attr.decode_and_unescape_value(&**reader)?;
            targets.get(value.trim())
        } else {
            None
        };
        match target {
            Some(target) => copy.push_attribute(("schemaLocation", target.as_str())),
            None => copy.push_attribute(attr),
        }
    }
    Ok(copy)
}

fn content_digest(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// What a schema document says about itself
#[derive(Debug, Clone, PartialEq, Eq)]
enum SchemaHeader {
    Schema { target_namespace: Option<String> },
    NotSchema(String),
}

fn read_schema_header(content: &[u8]) -> SchemaHeader {
    let text = document::decode_text(content);
    let mut reader = NsReader::from_str(&text);

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                let (namespace, local) = reader.resolve_element(start.name());
                let in_xsd = matches!(
                    namespace,
                    ResolveResult::Bound(ns) if ns.as_ref() == XSD_NAMESPACE.as_bytes()
                );
                if !in_xsd || local.as_ref() != b"schema" {
                    return SchemaHeader::NotSchema(format!(
                        "root element <{}> is not an XML Schema",
                        String::from_utf8_lossy(start.name().as_ref())
                    ));
                }

                let target_namespace = start
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"targetNamespace")
                    .and_then(|attr| {
                        attr.decode_and_unescape_value(&*reader)
                            .ok()
                            .map(|v| v.trim().to_string())
                    })
                    .filter(|v| !v.is_empty());
                return SchemaHeader::Schema { target_namespace };
            }
            Ok(Event::Eof) => return SchemaHeader::NotSchema("empty document".to_string()),
            Ok(_) => {}
            Err(e) => return SchemaHeader::NotSchema(format!("not well-formed XML: {e}")),
        }
    }
}

/// Merge resolved schemas into a context.
///
/// Unresolved references only mark their namespace as excluded. Two different schemas
/// bound to one namespace are a [`ValidationError::CompositionConflict`]. A schema that
/// is not an XSD, or whose `targetNamespace` differs from its binding, is rejected
/// with a `SchemaMismatch` violation reported at `root_line`.
pub fn compose(resolved: &[ResolvedSchema], root_line: usize) -> Result<ValidationContext> {
    let mut context = ValidationContext::default();

    for schema in resolved {
        let key = NamespaceKey::from_namespace(schema.reference.namespace.as_deref());
        let (Some(content), Some(origin)) = (schema.content(), schema.origin()) else {
            context.excluded.insert(key);
            continue;
        };

        let digest = content_digest(content);
        if let Some(existing) = context.grammars.get(&key) {
            if existing.digest != digest {
                return Err(ValidationError::CompositionConflict {
                    namespace: key.to_string(),
                    first: existing.source.clone(),
                    second: schema.source(),
                });
            }
            tracing::debug!(
                namespace = %key,
                source = %schema.source(),
                "Duplicate schema ignored"
            );
            continue;
        }

        context.grammars.insert(
            key,
            Grammar {
                source: schema.source(),
                origin,
                content: Arc::new(content.to_vec()),
                digest,
                nested: schema_directives(content),
            },
        );
    }

    let mut rejected = Vec::new();
    for (key, grammar) in &context.grammars {
        let problem = match read_schema_header(&grammar.content) {
            SchemaHeader::NotSchema(reason) => Some(reason),
            SchemaHeader::Schema { target_namespace }
                if target_namespace.as_deref() != key.uri() =>
            {
                Some(match (target_namespace, key) {
                    (Some(declared), NamespaceKey::NoNamespace) => format!(
                        "declares target namespace '{declared}' but is referenced without a namespace"
                    ),
                    (Some(declared), NamespaceKey::Uri(bound)) => format!(
                        "declares target namespace '{declared}' but is bound to '{bound}'"
                    ),
                    (None, key) => format!("has no target namespace but is bound to '{key}'"),
                })
            }
            SchemaHeader::Schema { .. } => None,
        };

        if let Some(problem) = problem {
            tracing::warn!(
                namespace = %key,
                source = %grammar.source,
                problem = %problem,
                "Schema rejected"
            );
            context.findings.push(Violation::new(
                ViolationKind::SchemaMismatch,
                root_line,
                format!("schema {} {}", grammar.source, problem),
            ));
            rejected.push(key.clone());
        }
    }

    for key in rejected {
        context.grammars.remove(&key);
        context.excluded.insert(key);
    }
    context
        .excluded
        .retain(|key| !context.grammars.contains_key(key));

    Ok(context)
}
