use std::fmt;

use serde::{Deserialize, Serialize};

/// What a violation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// Reported by the schema validator against the document content
    Content,
    /// Malformed schema reference attribute in the document itself
    ReferenceSyntax,
    /// Strict mode and the document declares no schema
    MissingSchema,
    /// A schema location could not be fetched and the policy says so
    UnresolvedSchema,
    /// A schema whose target namespace does not match its binding
    SchemaMismatch,
    /// Layout differs from the indented form (only when formatting is checked)
    Formatting,
}

/// A single finding, tagged with the line it originates from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub line: usize,
    pub column: Option<usize>,
    pub message: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(kind: ViolationKind, line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
            kind,
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(f, "line {}, column {}: {}", self.line, column, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

/// Result of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "violations", rename_all = "lowercase")]
pub enum ValidationOutcome {
    Pass,
    /// Never empty; violations are kept in discovery order
    Fail(Vec<Violation>),
}

impl ValidationOutcome {
    /// `Pass` for no violations, `Fail` otherwise
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        if violations.is_empty() {
            ValidationOutcome::Pass
        } else {
            ValidationOutcome::Fail(violations)
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationOutcome::Pass)
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationOutcome::Pass => &[],
            ValidationOutcome::Fail(violations) => violations,
        }
    }
}
