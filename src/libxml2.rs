//! LibXML2 FFI wrapper for XML Schema compilation and validation
//!
//! The Rust XML ecosystem has fast parsers (quick-xml, roxmltree) but no runtime XSD
//! validator, so schema-aware validation goes through libxml2 directly.
//!
//! ## Thread safety
//!
//! According to the libxml2 documentation (http://xmlsoft.org/threads.html):
//!
//! - Initialization is not thread-safe and happens exactly once behind a [`Once`].
//! - Schema parsing is not thread-safe; every compilation holds a process-wide lock.
//! - Document parsing and validation are thread-safe as long as each thread uses its
//!   own parser and validation context. A compiled schema is read-only once built and
//!   is shared through an `Arc`.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, Once};

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};

static LIBXML2_INIT: Once = Once::new();

/// Held for the duration of every `xmlSchemaParse`
static SCHEMA_PARSE_LOCK: Mutex<()> = Mutex::new(());

/// Parser options: no stderr chatter, no network access, line numbers above 65535
const PARSE_OPTIONS: c_int =
    XML_PARSE_NOERROR | XML_PARSE_NOWARNING | XML_PARSE_NONET | XML_PARSE_BIG_LINES;
const XML_PARSE_NOERROR: c_int = 1 << 5;
const XML_PARSE_NOWARNING: c_int = 1 << 6;
const XML_PARSE_NONET: c_int = 1 << 11;
const XML_PARSE_BIG_LINES: c_int = 1 << 22;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlInitGlobals();

    // Error and resource loading hooks
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
    pub fn xmlSetExternalEntityLoader(loader: XmlExternalEntityLoader);
    pub fn xmlNoNetExternalEntityLoader(
        url: *const c_char,
        id: *const c_char,
        ctxt: *mut XmlParserCtxt,
    ) -> *mut c_void;

    // Schema compilation
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Document parsing
    pub fn xmlNewParserCtxt() -> *mut XmlParserCtxt;
    pub fn xmlCtxtReadMemory(
        ctxt: *mut XmlParserCtxt,
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlCtxtGetLastError(ctxt: *mut c_void) -> *const xmlError;
    pub fn xmlFreeParserCtxt(ctxt: *mut XmlParserCtxt);
    pub fn xmlFreeDoc(doc: *mut XmlDoc);

    // Schema validation
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

pub type XmlExternalEntityLoader = Option<
    unsafe extern "C" fn(
        url: *const c_char,
        id: *const c_char,
        ctxt: *mut XmlParserCtxt,
    ) -> *mut c_void,
>;

/// Severity reported by libxml2 (`xmlErrorLevel`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorLevel {
    Warning,
    Error,
    Fatal,
}

impl ErrorLevel {
    fn from_raw(level: c_int) -> Self {
        match level {
            3 => ErrorLevel::Fatal,
            2 => ErrorLevel::Error,
            _ => ErrorLevel::Warning,
        }
    }
}

/// One structured error captured from libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub line: usize,
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    /// # Safety
    ///
    /// `error` must point to a live `xmlError` for the duration of the call.
    unsafe fn from_raw(error: *const xmlError) -> Option<Self> {
        if error.is_null() {
            return None;
        }
        let error = unsafe { &*error };
        let message = if error.message.is_null() {
            String::from("unknown libxml2 error")
        } else {
            unsafe { CStr::from_ptr(error.message) }
                .to_string_lossy()
                .trim()
                .to_string()
        };

        Some(Diagnostic {
            level: ErrorLevel::from_raw(error.level),
            line: usize::try_from(error.line).unwrap_or(0),
            // int2 carries the column for parser errors, 0 when unknown
            column: usize::try_from(error.int2).ok().filter(|&c| c > 0),
            message,
        })
    }

    pub fn is_error(&self) -> bool {
        self.level >= ErrorLevel::Error
    }
}

unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    let diagnostics = unsafe { &mut *(user_data as *mut Vec<Diagnostic>) };

    if let Some(diagnostic) = unsafe { Diagnostic::from_raw(error) } {
        diagnostics.push(diagnostic);
    }
}

/// Thread-safe owner of a compiled libxml2 schema; freed when the last clone drops
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: a compiled xmlSchema is only read during validation
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// `ptr` must come from `xmlSchemaParse` and must not be freed by anyone else.
    unsafe fn from_raw(ptr: *mut XmlSchema) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }

        Some(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Result of validating one document against a compiled schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Validation succeeded (return code 0)
    Valid,
    /// Validation failed (return code > 0); every error libxml2 reported, in order
    Invalid { errors: Vec<Diagnostic> },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn errors(&self) -> &[Diagnostic] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid { errors } => errors,
        }
    }
}

/// Safe entry point to libxml2
///
/// Creating one initializes libxml2 on first use; instances are free to create.
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
            xmlInitGlobals();
            // Schemas are fetched ahead of compilation; libxml2 itself reads files only
            xmlSetExternalEntityLoader(Some(xmlNoNetExternalEntityLoader));
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile a schema held in memory.
    ///
    /// `xs:import`/`xs:include` locations inside it are loaded by libxml2 itself, so
    /// they must be absolute paths; network locations are refused. Compilations are
    /// serialized process-wide.
    ///
    /// # Errors
    ///
    /// `SchemaParseFailed` with every error libxml2 reported when the schema does not
    /// compile.
    pub fn compile_schema(&self, schema_data: &[u8]) -> LibXml2Result<XmlSchemaPtr> {
        let size = buffer_size(schema_data)?;
        let _guard = SCHEMA_PARSE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        unsafe {
            let parser_ctxt =
                xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }

            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
            );

            // Loading included documents reports through the thread's global handler
            xmlSetStructuredErrorFunc(
                &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
                Some(structured_error_callback),
            );
            let schema_ptr = xmlSchemaParse(parser_ctxt);
            xmlSetStructuredErrorFunc(std::ptr::null_mut(), None);
            xmlSchemaFreeParserCtxt(parser_ctxt);

            for warning in diagnostics.iter().filter(|d| !d.is_error()) {
                tracing::debug!(
                    line = warning.line,
                    message = %warning.message,
                    "Schema compilation warning"
                );
            }

            XmlSchemaPtr::from_raw(schema_ptr).ok_or_else(|| LibXml2Error::SchemaParseFailed {
                details: diagnostics
                    .into_iter()
                    .filter(Diagnostic::is_error)
                    .map(|d| d.message)
                    .collect(),
            })
        }
    }

    /// Parse `content` and validate it against `schema`, collecting every error.
    ///
    /// `encoding` overrides whatever the document declares; with `None` libxml2 reads
    /// the byte order mark and the XML declaration itself. `uri` names the document in
    /// libxml2 diagnostics. Safe to call concurrently.
    ///
    /// # Errors
    ///
    /// `DocumentParseFailed` when libxml2 cannot build the document tree,
    /// `ValidationFailed` on an internal libxml2 failure.
    pub fn validate_document(
        &self,
        schema: &XmlSchemaPtr,
        content: &[u8],
        encoding: Option<&str>,
        uri: &str,
    ) -> LibXml2Result<ValidationResult> {
        let size = buffer_size(content)?;
        let c_uri = CString::new(uri).map_err(|_| LibXml2Error::InvalidInput {
            details: format!("document name contains a NUL byte: {uri:?}"),
        })?;
        let c_encoding = encoding
            .map(CString::new)
            .transpose()
            .map_err(|_| LibXml2Error::InvalidInput {
                details: format!("encoding name contains a NUL byte: {encoding:?}"),
            })?;

        unsafe {
            let parser_ctxt = xmlNewParserCtxt();
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }

            let doc = xmlCtxtReadMemory(
                parser_ctxt,
                content.as_ptr() as *const c_char,
                size,
                c_uri.as_ptr(),
                c_encoding
                    .as_ref()
                    .map_or(std::ptr::null(), |e| e.as_ptr()),
                PARSE_OPTIONS,
            );
            if doc.is_null() {
                let error = Diagnostic::from_raw(xmlCtxtGetLastError(parser_ctxt as *mut c_void));
                xmlFreeParserCtxt(parser_ctxt);
                return Err(match error {
                    Some(d) => LibXml2Error::DocumentParseFailed {
                        line: d.line,
                        column: d.column,
                        message: d.message,
                    },
                    None => LibXml2Error::DocumentParseFailed {
                        line: 0,
                        column: None,
                        message: "document could not be parsed".to_string(),
                    },
                });
            }
            xmlFreeParserCtxt(parser_ctxt);

            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                xmlFreeDoc(doc);
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
            );

            let code = xmlSchemaValidateDoc(valid_ctxt, doc);

            xmlSchemaFreeValidCtxt(valid_ctxt);
            xmlFreeDoc(doc);

            match code {
                0 => Ok(ValidationResult::Valid),
                n if n > 0 => Ok(ValidationResult::Invalid {
                    errors: diagnostics.into_iter().filter(Diagnostic::is_error).collect(),
                }),
                n => Err(LibXml2Error::ValidationFailed {
                    code: n,
                    document: uri.to_string(),
                }),
            }
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}

fn buffer_size(data: &[u8]) -> LibXml2Result<c_int> {
    c_int::try_from(data.len()).map_err(|_| LibXml2Error::InvalidInput {
        details: format!("{} bytes exceeds the libxml2 buffer limit", data.len()),
    })
}
