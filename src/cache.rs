use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, ValidationError};
use crate::libxml2::XmlSchemaPtr;

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Disk cache directory; `None` keeps everything in memory
    pub directory: Option<PathBuf>,
    /// Time-to-live for schemas on disk in hours
    pub ttl_hours: u64,
    /// Maximum number of entries per memory tier
    pub max_memory_entries: u64,
    /// Memory tier TTL in seconds
    pub memory_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            ttl_hours: 24,
            max_memory_entries: 100,
            memory_ttl_seconds: 3600,
        }
    }
}

/// Compiled grammars keyed by the fingerprint of the composed context
///
/// Two documents referencing the same set of schemas share one compiled grammar, and
/// concurrent requests for a missing fingerprint wait for a single compilation.
pub struct CompiledGrammarCache {
    cache: Cache<String, XmlSchemaPtr>,
}

impl CompiledGrammarCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_capacity).build();

        Self { cache }
    }

    /// Get a compiled grammar, or compile it if missing.
    ///
    /// The `compile` future only runs when the fingerprint is absent; failures are not
    /// cached.
    pub async fn get_or_compile<Fut>(&self, fingerprint: &str, compile: Fut) -> Result<XmlSchemaPtr>
    where
        Fut: Future<Output = Result<XmlSchemaPtr>>,
    {
        self.cache
            .try_get_with(fingerprint.to_string(), compile)
            .await
            .map_err(ValidationError::from_shared)
    }

    pub async fn contains(&self, fingerprint: &str) -> bool {
        self.cache.contains_key(fingerprint)
    }
}

/// Metadata stored next to each schema on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub key: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl CacheMetadata {
    pub fn new(key: String, url: String, ttl: Duration, size_bytes: u64) -> Self {
        let now = Utc::now();
        let expires_at =
            now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24));

        Self {
            key,
            url,
            created_at: now,
            expires_at,
            size_bytes,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Persistent tier for downloaded schemas, backed by cacache
pub struct DiskCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub fn new(cache_dir: PathBuf, ttl: Duration) -> Self {
        Self { cache_dir, ttl }
    }

    /// Generate a cache key from a URL
    pub fn generate_key(url: &str) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        format!("schema_{:x}", hasher.finish())
    }

    /// Schema bytes for a URL, `None` when absent or expired
    pub async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let key = Self::generate_key(url);

        match self.get_metadata(&key).await? {
            Some(metadata) if !metadata.is_expired() => {}
            Some(_) => {
                self.remove(&key).await;
                return Ok(None);
            }
            None => return Ok(None),
        }

        match cacache::read(&self.cache_dir, &key).await {
            Ok(data) => Ok(Some(data)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ValidationError::Cache(format!(
                "Failed to read from disk cache: {}",
                e
            ))),
        }
    }

    pub async fn set(&self, url: &str, data: &[u8]) -> Result<()> {
        let key = Self::generate_key(url);

        cacache::write(&self.cache_dir, &key, data)
            .await
            .map_err(|e| ValidationError::Cache(format!("Failed to write to disk cache: {}", e)))?;

        let metadata =
            CacheMetadata::new(key.clone(), url.to_string(), self.ttl, data.len() as u64);
        self.set_metadata(&key, &metadata).await
    }

    async fn remove(&self, key: &str) {
        let _ = cacache::remove(&self.cache_dir, key).await;
        let _ = fs::remove_file(self.metadata_path(key)).await;
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let entries = match cacache::index::ls(&self.cache_dir)
            .collect::<std::result::Result<Vec<_>, _>>()
        {
            Ok(entries) => entries,
            // No index yet
            Err(_) => return Ok(0),
        };

        let mut removed = 0;
        for entry in entries {
            if let Ok(Some(metadata)) = self.get_metadata(&entry.key).await
                && metadata.is_expired()
            {
                self.remove(&entry.key).await;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<CacheMetadata>> {
        match fs::read_to_string(self.metadata_path(key)).await {
            Ok(content) => serde_json::from_str(&content).map(Some).map_err(|e| {
                ValidationError::Cache(format!("Failed to parse metadata: {}", e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ValidationError::Cache(format!(
                "Failed to read metadata: {}",
                e
            ))),
        }
    }

    async fn set_metadata(&self, key: &str, metadata: &CacheMetadata) -> Result<()> {
        let metadata_path = self.metadata_path(key);

        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ValidationError::Cache(format!("Failed to create metadata directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| ValidationError::Cache(format!("Failed to serialize metadata: {}", e)))?;

        fs::write(&metadata_path, content)
            .await
            .map_err(|e| ValidationError::Cache(format!("Failed to write metadata: {}", e)))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join("metadata")
            .join(format!("{}.json", key))
    }
}

/// Cache shared by every validation of a run
///
/// Remote schema bytes go memory → disk → network, with at most one download in
/// flight per URL. Compiled grammars live in [`CompiledGrammarCache`].
pub struct SchemaCache {
    remote: Cache<String, Arc<Vec<u8>>>,
    disk: Option<DiskCache>,
    compiled: CompiledGrammarCache,
}

impl SchemaCache {
    pub fn new(config: CacheConfig) -> Self {
        let remote = Cache::builder()
            .max_capacity(config.max_memory_entries)
            .time_to_live(Duration::from_secs(config.memory_ttl_seconds))
            .build();

        let disk = config
            .directory
            .map(|dir| DiskCache::new(dir, Duration::from_secs(config.ttl_hours * 3600)));

        Self {
            remote,
            disk,
            compiled: CompiledGrammarCache::new(config.max_memory_entries),
        }
    }

    /// Memory-only cache with default limits
    pub fn in_memory() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn compiled(&self) -> &CompiledGrammarCache {
        &self.compiled
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Schema bytes for `url`, calling `fetch` only when neither tier has them.
    ///
    /// Concurrent callers for the same URL share one `fetch`. A failed fetch is not
    /// remembered, so the next call tries again.
    pub async fn get_or_fetch<Fut>(&self, url: &str, fetch: Fut) -> Result<Arc<Vec<u8>>>
    where
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let load = async {
            if let Some(disk) = &self.disk {
                match disk.get(url).await {
                    Ok(Some(data)) => {
                        tracing::debug!(url, "Remote schema served from disk cache");
                        return Ok(Arc::new(data));
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(url, error = %e, "Ignoring unreadable disk cache entry"),
                }
            }

            let data = fetch.await?;
            if let Some(disk) = &self.disk
                && let Err(e) = disk.set(url, &data).await
            {
                tracing::warn!(url, error = %e, "Could not persist remote schema");
            }
            Ok::<_, ValidationError>(Arc::new(data))
        };

        self.remote
            .try_get_with(url.to_string(), load)
            .await
            .map_err(ValidationError::from_shared)
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.remote.contains_key(url)
    }

    /// Drop the memory tiers; the disk tier is kept
    pub async fn clear_memory(&self) {
        self.remote.invalidate_all();
        self.compiled.cache.invalidate_all();
        self.remote.run_pending_tasks().await;
        self.compiled.cache.run_pending_tasks().await;
    }
}
