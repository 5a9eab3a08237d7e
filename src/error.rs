use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Main error type for everything that aborts the validation of a document
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url} - {message}")]
    HttpStatus {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Remote schema access is disabled: {url}")]
    NetworkDisabled { url: String },

    #[error("Schema not found: {location}")]
    SchemaNotFound { location: String },

    #[error("unsupported URI scheme '{scheme}' in {location}")]
    UnsupportedScheme { scheme: String, location: String },

    /// The document is not well-formed XML
    #[error("{}: line {line}{}: {message}", .path.display(), column_suffix(.column))]
    Parse {
        path: PathBuf,
        line: usize,
        column: Option<usize>,
        message: String,
    },

    /// Two schema locations bound to the same namespace with different content
    #[error("Conflicting schemas for {namespace}: {first} and {second}")]
    CompositionConflict {
        namespace: String,
        first: String,
        second: String,
    },

    #[error("Composed schema could not be compiled: {details}")]
    SchemaCompilation { details: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    /// An error produced once and handed to every task waiting on the same cache entry
    #[error(transparent)]
    Shared(Arc<ValidationError>),
}

impl ValidationError {
    /// Take back ownership of an error coming out of a single-flight cache load
    pub(crate) fn from_shared(error: Arc<ValidationError>) -> Self {
        Arc::try_unwrap(error).unwrap_or_else(ValidationError::Shared)
    }
}

/// LibXML2-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: {}", join_details(.details))]
    SchemaParseFailed { details: Vec<String> },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Document could not be parsed at line {line}: {message}")]
    DocumentParseFailed {
        line: usize,
        column: Option<usize>,
        message: String,
    },

    #[error("Validation of {document} failed with internal code {code}")]
    ValidationFailed { code: i32, document: String },

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Input too large or not representable for libxml2: {details}")]
    InvalidInput { details: String },
}

impl From<LibXml2Error> for ValidationError {
    fn from(err: LibXml2Error) -> Self {
        match err {
            LibXml2Error::SchemaParseFailed { .. } => ValidationError::SchemaCompilation {
                details: err.to_string(),
            },
            other => ValidationError::LibXml2Internal {
                details: other.to_string(),
            },
        }
    }
}

impl From<crate::config::ConfigError> for ValidationError {
    fn from(err: crate::config::ConfigError) -> Self {
        ValidationError::Config(err.to_string())
    }
}

fn column_suffix(column: &Option<usize>) -> String {
    column.map(|c| format!(", column {c}")).unwrap_or_default()
}

fn join_details(details: &[String]) -> String {
    if details.is_empty() {
        "null pointer returned".to_string()
    } else {
        details.join("; ")
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
