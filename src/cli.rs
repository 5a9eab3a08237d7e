use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per document, violations indented below
    #[default]
    Human,
    /// A single JSON object on stdout
    Json,
}

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VerbosityLevel {
    /// Only failing documents
    Quiet,
    #[default]
    Normal,
    /// Debug logging as well
    Verbose,
}

/// Validate XML documents against the XML Schemas they declare
#[derive(Parser, Debug, Clone)]
#[command(name = "xsd-check")]
#[command(
    about = "Validate XML documents against the schemas named in xsi:schemaLocation and xsi:noNamespaceSchemaLocation"
)]
#[command(version)]
pub struct Cli {
    /// Documents to validate
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Fail documents that declare no schema
    #[arg(long = "strict")]
    pub strict: bool,

    /// Fail documents whose schema locations cannot be resolved
    #[arg(long = "fail-on-unresolved")]
    pub fail_on_unresolved: bool,

    /// Also require documents to be laid out one element per line, 4-space indented
    #[arg(long = "check-formatting")]
    pub check_formatting: bool,

    /// Extra directory searched for relative schema locations (repeatable)
    #[arg(long = "resource-root", value_name = "DIR", action = clap::ArgAction::Append)]
    pub resource_roots: Vec<PathBuf>,

    /// Never download remote schemas
    #[arg(long = "offline")]
    pub offline: bool,

    /// Disable the schema cache
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Cache directory for downloaded schemas
    #[arg(long = "cache-dir", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Number of retry attempts for failed downloads
    #[arg(long = "retry-attempts")]
    pub retry_attempts: Option<u32>,

    /// Number of documents validated concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Output format
    #[arg(long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only report failing documents
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
