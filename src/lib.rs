//! # xsd-check Library
//!
//! Validates XML documents against the XML Schemas they declare through
//! `xsi:schemaLocation` and `xsi:noNamespaceSchemaLocation`. Schemas for several
//! namespaces are composed into one grammar, remote schemas are downloaded once
//! and cached, and a document whose schemas cannot be found is handled according
//! to the configured mode.

pub mod cache;
pub mod cli;
pub mod composer;
pub mod config;
pub mod document;
pub mod error;
pub mod extractor;
pub mod formatting;
pub mod http_client;
pub mod libxml2;
pub mod mode;
pub mod outcome;
pub mod output;
pub mod resolver;
pub mod resources;
pub mod validator;

pub use cache::{CacheConfig, CompiledGrammarCache, DiskCache, SchemaCache};
pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use composer::{NamespaceKey, ValidationContext, compose};
pub use config::{Config, ConfigManager};
pub use document::Document;
pub use error::{LibXml2Error, ValidationError};
pub use extractor::{Extraction, SchemaReference, extract};
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use libxml2::{Diagnostic, LibXml2Wrapper, ValidationResult, XmlSchemaPtr};
pub use mode::{Mode, ModeController, UnresolvedPolicy};
pub use outcome::{ValidationOutcome, Violation, ViolationKind};
pub use output::{Reporter, RunSummary};
pub use resolver::{Resolution, ResolvedSchema, ResolverSettings, SchemaOrigin, SchemaResolver};
pub use resources::{FileSystemResources, InMemoryResources, ResourceAccess};
pub use validator::{DocumentReport, SchemaValidator, ValidatorSettings};
