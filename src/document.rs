use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::Event;

use crate::error::Result;

/// An XML document handed in for validation: a logical path plus its text.
///
/// The path is used for error messages and as the base for resolving
/// relative schema locations. It does not have to exist on disk.
///
/// Documents read from bytes keep those bytes so libxml2 sees exactly what is on
/// disk and applies the encoding the document declares; `content` is the decoded
/// text used for everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    content: Arc<str>,
    raw: Option<Arc<[u8]>>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Arc::from(content.into()),
            raw: None,
        }
    }

    /// Build a document from undecoded bytes, honouring a byte order mark or the
    /// `encoding` of the XML declaration
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        let raw: Arc<[u8]> = Arc::from(bytes.into());
        let content = Arc::from(decode_text(&raw).into_owned());
        Self {
            path: path.into(),
            content,
            raw: Some(raw),
        }
    }

    /// Read a document from the file system
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let bytes = tokio::fs::read(&path).await?;
        Ok(Self::from_bytes(path, bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Bytes as read, `None` for documents built from text
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// What to hand the XML parser, and the encoding to force on it
    ///
    /// Raw bytes go through undecoded so the parser applies the declared encoding;
    /// text is always UTF-8, whatever its declaration says.
    pub(crate) fn parser_input(&self) -> (Arc<[u8]>, Option<&'static str>) {
        match &self.raw {
            Some(raw) => (Arc::clone(raw), None),
            None => (Arc::from(self.content.as_bytes()), Some("UTF-8")),
        }
    }

    /// Directory containing the document, `.` for bare file names
    pub fn base_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// 1-based line and column of a byte offset into the content
    pub fn position_of(&self, offset: usize) -> (usize, usize) {
        line_and_column(&self.content, offset)
    }
}

/// Decode document bytes: a byte order mark wins, then the XML declaration, then UTF-8
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (detected, bom) = quick_xml::encoding::detect_encoding(bytes).unwrap_or((UTF_8, 0));
    let body = &bytes[bom..];

    // Only an ASCII-compatible byte stream can carry a declaration we can read
    let encoding = if detected == UTF_8 && bom == 0 {
        declared_encoding(body)
            .filter(|declared| declared.is_ascii_compatible())
            .unwrap_or(UTF_8)
    } else {
        detected
    };

    let (text, malformed) = encoding.decode_without_bom_handling(body);
    if malformed {
        tracing::debug!(
            encoding = encoding.name(),
            "Document contains bytes invalid in its encoding"
        );
    }
    text
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let mut reader = quick_xml::Reader::from_reader(bytes);
    match reader.read_event() {
        Ok(Event::Decl(decl)) => decl.encoder(),
        _ => None,
    }
}

/// 1-based line and column of `offset` within `text`
pub(crate) fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = &text.as_bytes()[..offset];
    let line = before.iter().filter(|b| **b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}
