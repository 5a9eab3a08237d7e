//! Schema location resolution
//!
//! Every [`SchemaReference`] becomes a [`ResolvedSchema`]. Failures never abort the
//! validation: they come back as [`Resolution::Unresolved`] with a reason, and the
//! mode controller decides what they mean.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;

use crate::cache::SchemaCache;
use crate::document::Document;
use crate::error::{Result, ValidationError};
use crate::extractor::SchemaReference;
use crate::resources::ResourceAccess;

/// URI scheme prefix; two characters at least so `C:` stays a drive letter
static URI_SCHEME_REGEX: OnceLock<Regex> = OnceLock::new();

fn uri_scheme_regex() -> &'static Regex {
    URI_SCHEME_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]+):").expect("Failed to compile URI scheme regex")
    })
}

/// Where a schema's content came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local {
        path: PathBuf,
        content: Arc<Vec<u8>>,
        /// URL this local copy stands in for, when the URL itself was unreachable
        substitute_for: Option<String>,
    },
    Remote {
        url: String,
        content: Arc<Vec<u8>>,
    },
    Unresolved {
        reason: String,
    },
}

/// Where a schema document was read from
///
/// Relative `xs:include`/`xs:import` locations inside a schema resolve against it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaOrigin {
    File(PathBuf),
    Url(String),
}

impl fmt::Display for SchemaOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOrigin::File(path) => write!(f, "{}", path.display()),
            SchemaOrigin::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionKind {
    Local,
    Remote,
    Unresolved,
}

/// A reference paired with the outcome of resolving it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub reference: SchemaReference,
    pub resolution: Resolution,
}

impl ResolvedSchema {
    pub fn kind(&self) -> ResolutionKind {
        match self.resolution {
            Resolution::Local { .. } => ResolutionKind::Local,
            Resolution::Remote { .. } => ResolutionKind::Remote,
            Resolution::Unresolved { .. } => ResolutionKind::Unresolved,
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match &self.resolution {
            Resolution::Local { content, .. } | Resolution::Remote { content, .. } => {
                Some(content.as_slice())
            }
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.kind() != ResolutionKind::Unresolved
    }

    pub fn origin(&self) -> Option<SchemaOrigin> {
        match &self.resolution {
            Resolution::Local { path, .. } => Some(SchemaOrigin::File(path.clone())),
            Resolution::Remote { url, .. } => Some(SchemaOrigin::Url(url.clone())),
            Resolution::Unresolved { .. } => None,
        }
    }

    /// Whether this is a local copy standing in for an unreachable URL
    pub fn is_substitute(&self) -> bool {
        matches!(
            &self.resolution,
            Resolution::Local {
                substitute_for: Some(_),
                ..
            }
        )
    }

    /// Give up on a substituted local copy: the reference becomes unresolved
    pub fn reject_substitute(&mut self, reason: &str) {
        if let Resolution::Local {
            path,
            substitute_for: Some(url),
            ..
        } = &self.resolution
        {
            self.resolution = Resolution::Unresolved {
                reason: format!("{url} is unreachable and local copy {} {reason}", path.display()),
            };
        }
    }

    /// Human-readable origin: resolved path or URL, else the declared location
    pub fn source(&self) -> String {
        match &self.resolution {
            Resolution::Local { path, .. } => path.display().to_string(),
            Resolution::Remote { url, .. } => url.clone(),
            Resolution::Unresolved { .. } => self.reference.location.clone(),
        }
    }
}

/// Resolver tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    /// Extra directories searched for relative locations, after the document's own
    pub resource_roots: Vec<PathBuf>,
    /// Look up the file name of an unreachable URL among local resources
    pub local_fallback: bool,
    /// Upper bound for one remote fetch, retries included
    pub remote_timeout: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            resource_roots: Vec::new(),
            local_fallback: true,
            remote_timeout: Duration::from_secs(30),
        }
    }
}

/// How a location string is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Remote(String),
    Absolute(PathBuf),
    Relative(PathBuf),
    Unsupported(String),
}

impl Location {
    fn classify(location: &str) -> Self {
        if let Some(caps) = uri_scheme_regex().captures(location) {
            let scheme = caps[1].to_ascii_lowercase();
            return match scheme.as_str() {
                "http" | "https" => Location::Remote(location.to_string()),
                "file" => Location::Absolute(file_uri_path(location)),
                _ => Location::Unsupported(scheme),
            };
        }

        let path = PathBuf::from(location);
        if path.is_absolute() {
            Location::Absolute(path)
        } else {
            Location::Relative(path)
        }
    }
}

/// Path part of a `file:` URI (`file:///a/b`, `file://localhost/a/b`, `file:/a/b`)
fn file_uri_path(uri: &str) -> PathBuf {
    let rest = &uri["file:".len()..];
    let rest = match rest.strip_prefix("//") {
        Some(authority_and_path) => match authority_and_path.find('/') {
            Some(index) => &authority_and_path[index..],
            None => authority_and_path,
        },
        None => rest,
    };
    PathBuf::from(rest.replace("%20", " "))
}

/// Last path segment of a URL, without query or fragment
fn url_file_name(url: &str) -> Option<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let name = url[..end].rsplit('/').next()?;
    (!name.is_empty()).then_some(name)
}

/// Resolve `.` and `..` without touching the file system
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// Turns schema references into content through an injected [`ResourceAccess`]
pub struct SchemaResolver {
    resources: Arc<dyn ResourceAccess>,
    cache: Option<Arc<SchemaCache>>,
    settings: ResolverSettings,
}

impl SchemaResolver {
    pub fn new(resources: Arc<dyn ResourceAccess>, settings: ResolverSettings) -> Self {
        Self {
            resources,
            cache: None,
            settings,
        }
    }

    /// Route remote fetches through `cache`
    pub fn with_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve every reference of a document concurrently, keeping their order
    pub async fn resolve_all(
        &self,
        document: &Document,
        references: &[SchemaReference],
    ) -> Vec<ResolvedSchema> {
        join_all(
            references
                .iter()
                .map(|reference| self.resolve(document, reference)),
        )
        .await
    }

    pub async fn resolve(&self, document: &Document, reference: &SchemaReference) -> ResolvedSchema {
        let resolution = match self.resolve_location(document, &reference.location).await {
            Ok(resolution) => resolution,
            Err(e) => Resolution::Unresolved {
                reason: e.to_string(),
            },
        };

        match &resolution {
            Resolution::Unresolved { reason } => tracing::warn!(
                document = %document.path().display(),
                location = %reference.location,
                reason = %reason,
                "Schema could not be resolved"
            ),
            Resolution::Local { path, .. } => tracing::debug!(
                location = %reference.location,
                path = %path.display(),
                "Schema resolved locally"
            ),
            Resolution::Remote { url, .. } => {
                tracing::debug!(location = %reference.location, url, "Schema resolved remotely")
            }
        }

        ResolvedSchema {
            reference: reference.clone(),
            resolution,
        }
    }

    async fn resolve_location(&self, document: &Document, location: &str) -> Result<Resolution> {
        match Location::classify(location.trim()) {
            Location::Remote(url) => self.resolve_remote(document, url).await,
            Location::Absolute(path) => {
                let path = normalize_path(&path);
                let content = self.read_file(&path, location).await?;
                Ok(Resolution::Local {
                    path,
                    content,
                    substitute_for: None,
                })
            }
            Location::Relative(path) => match self.find_relative(document, &path).await {
                Some(resolution) => Ok(resolution),
                None => Err(ValidationError::SchemaNotFound {
                    location: location.to_string(),
                }),
            },
            Location::Unsupported(scheme) => Err(ValidationError::UnsupportedScheme {
                scheme,
                location: location.to_string(),
            }),
        }
    }

    async fn resolve_remote(&self, document: &Document, url: String) -> Result<Resolution> {
        let error = match self.fetch_remote(&url).await {
            Ok(content) => return Ok(Resolution::Remote { url, content }),
            Err(e) => e,
        };

        if self.settings.local_fallback
            && let Some(name) = url_file_name(&url)
            && let Some(Resolution::Local { path, content, .. }) =
                self.find_relative(document, Path::new(name)).await
        {
            tracing::info!(
                url,
                path = %path.display(),
                error = %error,
                "Remote schema unavailable, using local copy"
            );
            return Ok(Resolution::Local {
                path,
                content,
                substitute_for: Some(url),
            });
        }

        Err(error)
    }

    /// Resolve a location found inside a schema (`xs:include`, `xs:import`, ...)
    ///
    /// Relative locations resolve against `base`: the schema's directory for files,
    /// URL resolution for remote schemas. Remote fetches share the timeout and cache
    /// of top-level ones; there is no local fallback.
    pub async fn resolve_nested(
        &self,
        base: &SchemaOrigin,
        location: &str,
    ) -> Result<(SchemaOrigin, Arc<Vec<u8>>)> {
        let location = location.trim();
        match (Location::classify(location), base) {
            (Location::Remote(url), _) => {
                let content = self.fetch_remote(&url).await?;
                Ok((SchemaOrigin::Url(url), content))
            }
            (Location::Absolute(path), _) => {
                let path = normalize_path(&path);
                let content = self.read_file(&path, location).await?;
                Ok((SchemaOrigin::File(path), content))
            }
            (Location::Relative(relative), SchemaOrigin::File(file)) => {
                let dir = file.parent().unwrap_or(Path::new("."));
                let path = normalize_path(&dir.join(relative));
                let content = self.read_file(&path, location).await?;
                Ok((SchemaOrigin::File(path), content))
            }
            (Location::Relative(_), SchemaOrigin::Url(base_url)) => {
                let url = reqwest::Url::parse(base_url)
                    .and_then(|base| base.join(location))
                    .map_err(|e| ValidationError::SchemaNotFound {
                        location: format!("{location} relative to {base_url}: {e}"),
                    })?
                    .to_string();
                let content = self.fetch_remote(&url).await?;
                Ok((SchemaOrigin::Url(url), content))
            }
            (Location::Unsupported(scheme), _) => Err(ValidationError::UnsupportedScheme {
                scheme,
                location: location.to_string(),
            }),
        }
    }

    async fn read_file(&self, path: &Path, location: &str) -> Result<Arc<Vec<u8>>> {
        match self.resources.read_local(path).await? {
            Some(content) => Ok(Arc::new(content)),
            None => Err(ValidationError::SchemaNotFound {
                location: location.to_string(),
            }),
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        let timeout = self.settings.remote_timeout;
        let fetch = async {
            tokio::time::timeout(timeout, self.resources.fetch_remote(url))
                .await
                .map_err(|_| ValidationError::Timeout {
                    url: url.to_string(),
                    timeout_seconds: timeout.as_secs(),
                })?
        };

        match &self.cache {
            Some(cache) => cache.get_or_fetch(url, fetch).await,
            None => fetch.await.map(Arc::new),
        }
    }

    /// First readable candidate among the document directory and the resource roots
    ///
    /// A candidate that exists but cannot be read is skipped.
    async fn find_relative(&self, document: &Document, relative: &Path) -> Option<Resolution> {
        let candidates = std::iter::once(document.base_dir())
            .chain(self.settings.resource_roots.iter().map(PathBuf::as_path))
            .map(|base| normalize_path(&base.join(relative)));

        for candidate in candidates {
            match self.resources.read_local(&candidate).await {
                Ok(Some(content)) => {
                    return Some(Resolution::Local {
                        path: candidate,
                        content: Arc::new(content),
                        substitute_for: None,
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(
                    path = %candidate.display(),
                    error = %e,
                    "Skipping unreadable schema candidate"
                ),
            }
        }
        None
    }
}
