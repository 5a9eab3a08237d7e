//! Document validation pipeline
//!
//! - **Async I/O**: schema resolution, HTTP downloads and caching run on tokio
//! - **Blocking work**: libxml2 compilation and validation run on `spawn_blocking`
//! - **Bounded concurrency**: batch validation holds one semaphore permit per document
//!
//! One call to [`SchemaValidator::validate`] goes extractor → resolver → mode
//! controller → composer → libxml2, and owns every intermediate value it creates.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tokio::sync::Semaphore;

use crate::cache::SchemaCache;
use crate::composer::{self, NamespaceKey, ValidationContext};
use crate::document::Document;
use crate::error::{LibXml2Error, Result, ValidationError};
use crate::extractor;
use crate::formatting;
use crate::libxml2::{Diagnostic, LibXml2Wrapper, XmlSchemaPtr};
use crate::mode::{Mode, ModeController, UnresolvedPolicy};
use crate::outcome::{ValidationOutcome, Violation, ViolationKind};
use crate::resolver::{ResolvedSchema, ResolverSettings, SchemaResolver};
use crate::resources::ResourceAccess;

/// Everything that changes how a document is judged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorSettings {
    pub mode: Mode,
    pub unresolved: UnresolvedPolicy,
    pub resolver: ResolverSettings,
    /// Also report documents not laid out the way [`formatting`] expects
    pub check_formatting: bool,
}

/// Result for one file of a batch
#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub outcome: Result<ValidationOutcome>,
    pub duration: Duration,
}

impl DocumentReport {
    pub fn passed(&self) -> bool {
        matches!(&self.outcome, Ok(outcome) if outcome.is_pass())
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Validates documents against the schemas they declare
///
/// `Send + Sync`; share one instance through an `Arc` to validate many documents
/// concurrently.
pub struct SchemaValidator {
    resolver: SchemaResolver,
    controller: ModeController,
    check_formatting: bool,
    cache: Option<Arc<SchemaCache>>,
    libxml2: Arc<LibXml2Wrapper>,
}

impl SchemaValidator {
    pub fn new(resources: Arc<dyn ResourceAccess>, settings: ValidatorSettings) -> Self {
        Self {
            resolver: SchemaResolver::new(resources, settings.resolver),
            controller: ModeController::new(settings.mode, settings.unresolved),
            check_formatting: settings.check_formatting,
            cache: None,
            libxml2: Arc::new(LibXml2Wrapper::new()),
        }
    }

    /// Share downloaded schemas and compiled grammars across validations
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.resolver = self.resolver.with_cache(Arc::clone(&cache));
        self.cache = Some(cache);
        self
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    /// Validate one document.
    ///
    /// # Errors
    ///
    /// `Parse` for a malformed document, `CompositionConflict` when two different
    /// schemas claim one namespace, `SchemaCompilation` when the schemas do not
    /// compile. Everything else, unreachable schemas included, ends up in the outcome.
    pub async fn validate(&self, document: &Document) -> Result<ValidationOutcome> {
        let extraction = extractor::extract(document)?;
        let root_line = extraction.root_line;
        let mut violations = extraction.findings.clone();
        if self.check_formatting {
            violations.extend(formatting::check(document));
        }

        if !extraction.has_references() {
            violations.extend(self.controller.missing_schema(root_line));
            return Ok(self.finish(document, violations));
        }

        let mut resolved = self
            .resolver
            .resolve_all(document, &extraction.references)
            .await;

        loop {
            let mut attempt = violations.clone();
            attempt.extend(self.controller.unresolved_violations(&resolved, root_line));

            if !resolved.iter().any(ResolvedSchema::is_resolved) {
                tracing::info!(
                    document = %document.path().display(),
                    "None of the declared schemas could be resolved"
                );
                return Ok(self.finish(document, attempt));
            }

            let context = composer::compose(&resolved, root_line)?;
            attempt.extend(context.findings().iter().cloned());
            if context.is_empty() {
                return Ok(self.finish(document, attempt));
            }

            match self.compiled_grammar(&context).await {
                Ok(grammar) => {
                    attempt.extend(self.check_content(document, grammar, &context).await?);
                    return Ok(self.finish(document, attempt));
                }
                // A local copy found by file name is only a guess; one that breaks the
                // grammar counts as unresolved rather than failing the document
                Err(e)
                    if is_compilation_failure(&e)
                        && resolved.iter().any(ResolvedSchema::is_substitute) =>
                {
                    tracing::info!(
                        document = %document.path().display(),
                        error = %e,
                        "Local schema copies do not compile, treating them as unresolved"
                    );
                    for schema in resolved.iter_mut() {
                        schema.reject_substitute("does not compile");
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Load and validate files, at most `max_concurrent` at a time, in input order
    pub async fn validate_files(
        self: Arc<Self>,
        files: Vec<PathBuf>,
        max_concurrent: usize,
    ) -> Result<Vec<DocumentReport>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let validator = Arc::clone(&self);
                let semaphore = Arc::clone(&semaphore);

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|_| {
                        ValidationError::Concurrency {
                            details: "validation semaphore closed".to_string(),
                        }
                    })?;

                    let start = Instant::now();
                    let outcome = match Document::load(&path).await {
                        Ok(document) => validator.validate(&document).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &outcome {
                        tracing::error!(document = %path.display(), error = %e, "Validation aborted");
                    }

                    Ok::<_, ValidationError>(DocumentReport {
                        path,
                        outcome,
                        duration: start.elapsed(),
                    })
                })
            })
            .collect();

        try_join_all(tasks)
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("Task join error: {}", e),
            })?
            .into_iter()
            .collect()
    }

    fn finish(&self, document: &Document, violations: Vec<Violation>) -> ValidationOutcome {
        let outcome = ValidationOutcome::from_violations(violations);
        tracing::debug!(
            document = %document.path().display(),
            passed = outcome.is_pass(),
            violations = outcome.violations().len(),
            "Document checked"
        );
        outcome
    }

    async fn compiled_grammar(&self, context: &ValidationContext) -> Result<XmlSchemaPtr> {
        let compile = self.compile(context);
        match &self.cache {
            Some(cache) => {
                cache
                    .compiled()
                    .get_or_compile(&context.fingerprint(), compile)
                    .await
            }
            None => compile.await,
        }
    }

    async fn compile(&self, context: &ValidationContext) -> Result<XmlSchemaPtr> {
        let scratch = tempfile::Builder::new().prefix("xsd-check").tempdir()?;
        let wrapper = context.materialize(scratch.path(), &self.resolver).await?;

        let libxml2 = Arc::clone(&self.libxml2);
        let schema = tokio::task::spawn_blocking(move || libxml2.compile_schema(&wrapper))
            .await
            .map_err(|e| ValidationError::Concurrency {
                details: format!("Join error: {}", e),
            })??;

        tracing::debug!(
            fingerprint = %context.fingerprint(),
            grammars = context.grammars().len(),
            "Compiled schema set"
        );
        Ok(schema)
    }

    async fn check_content(
        &self,
        document: &Document,
        grammar: XmlSchemaPtr,
        context: &ValidationContext,
    ) -> Result<Vec<Violation>> {
        let libxml2 = Arc::clone(&self.libxml2);
        let (content, encoding) = document.parser_input();
        let uri = document.path().display().to_string();

        let result = tokio::task::spawn_blocking(move || {
            libxml2.validate_document(&grammar, &content, encoding, &uri)
        })
        .await
        .map_err(|e| ValidationError::Concurrency {
            details: format!("Join error: {}", e),
        })?;

        let result = match result {
            Ok(result) => result,
            Err(LibXml2Error::DocumentParseFailed {
                line,
                column,
                message,
            }) => {
                return Err(ValidationError::Parse {
                    path: document.path().to_path_buf(),
                    line,
                    column,
                    message,
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(result
            .errors()
            .iter()
            .filter(|diagnostic| !concerns_excluded(diagnostic, context.excluded()))
            .map(|diagnostic| {
                Violation::new(ViolationKind::Content, diagnostic.line, &diagnostic.message)
                    .with_column(diagnostic.column)
            })
            .collect())
    }
}

fn is_compilation_failure(error: &ValidationError) -> bool {
    match error {
        ValidationError::SchemaCompilation { .. } => true,
        ValidationError::Shared(inner) => is_compilation_failure(inner),
        _ => false,
    }
}

/// Whether a diagnostic is about an element of a namespace that has no grammar
///
/// libxml2 names elements as `'{namespace}local'`, and plain `'local'` when they
/// have no namespace.
fn concerns_excluded(diagnostic: &Diagnostic, excluded: &BTreeSet<NamespaceKey>) -> bool {
    excluded.iter().any(|key| match key {
        NamespaceKey::Uri(uri) => diagnostic.message.contains(&format!("{{{uri}}}")),
        NamespaceKey::NoNamespace => diagnostic
            .message
            .strip_prefix("Element '")
            .is_some_and(|rest| !rest.starts_with('{')),
    })
}
