use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::{Cli, OutputFormat, VerbosityLevel};
use crate::http_client::HttpClientConfig;
use crate::mode::{Mode, UnresolvedPolicy};
use crate::resolver::ResolverSettings;
use crate::validator::ValidatorSettings;

const ENV_PREFIX: &str = "XSD_CHECK_";

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
///
/// Every section defaults field by field, so a file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub validation: ValidationConfig,
    pub network: NetworkConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

/// Validation-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub mode: Mode,
    pub unresolved: UnresolvedPolicy,
    /// Directories searched for relative schema locations after the document's own
    pub resource_roots: Vec<PathBuf>,
    /// Look up the file name of an unreachable schema URL locally
    pub local_fallback: bool,
    /// Number of documents validated concurrently
    pub threads: Option<usize>,
    /// Report documents not laid out one element per line with 4-space indentation
    pub check_formatting: bool,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Never download remote schemas
    pub offline: bool,
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed downloads
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory path
    pub directory: PathBuf,
    /// Time-to-live for cached schemas in hours
    pub ttl_hours: u64,
    /// Maximum number of entries in memory cache
    pub max_memory_entries: u64,
    /// Memory cache TTL in seconds
    pub memory_ttl_seconds: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            unresolved: UnresolvedPolicy::default(),
            resource_roots: Vec::new(),
            local_fallback: true,
            threads: None,
            check_formatting: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            offline: false,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("xsd-check"),
            ttl_hours: 24,
            max_memory_entries: 1000,
            memory_ttl_seconds: 3600,
        }
    }
}

impl Config {
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: self.network.timeout_seconds,
            retry_attempts: self.network.retry_attempts,
            retry_delay_ms: self.network.retry_delay_ms,
            ..HttpClientConfig::default()
        }
    }

    pub fn validator_settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            mode: self.validation.mode,
            unresolved: self.validation.unresolved,
            resolver: ResolverSettings {
                resource_roots: self.validation.resource_roots.clone(),
                local_fallback: self.validation.local_fallback,
                remote_timeout: self.http_client_config().worst_case_duration(),
            },
            check_formatting: self.validation.check_formatting,
        }
    }

    /// Cache settings, or `None` when caching is disabled
    pub fn schema_cache_config(&self) -> Option<crate::cache::CacheConfig> {
        self.cache.enabled.then(|| crate::cache::CacheConfig {
            directory: Some(self.cache.directory.clone()),
            ttl_hours: self.cache.ttl_hours,
            max_memory_entries: self.cache.max_memory_entries,
            memory_ttl_seconds: self.cache.memory_ttl_seconds,
        })
    }

    /// Get the effective concurrency
    pub fn thread_count(&self) -> usize {
        self.validation.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.output.quiet {
            VerbosityLevel::Quiet
        } else if self.output.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_seconds)
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        let config = match &cli.config {
            Some(path) => Self::load_from_file(path).await?,
            None => Self::find_config_file().await?.unwrap_or_default(),
        };

        let config = Self::apply_environment_overrides_with(env, config)?;
        let config = Self::merge_with_cli(config, cli);
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => match toml::from_str::<Config>(&content) {
                Ok(config) => Ok(config),
                Err(_) => Ok(serde_json::from_str(&content)?),
            },
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "xsd-check.toml",
            "xsd-check.json",
            ".xsd-check.toml",
            ".xsd-check.json",
        ];

        let mut directories = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            directories.push(config_dir.join("xsd-check"));
        }

        for directory in directories {
            for name in &config_names {
                let path = directory.join(name);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    tracing::debug!(path = %path.display(), "Using configuration file");
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply `XSD_CHECK_*` overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        if let Some(mode) = env_value(env, "MODE")? {
            config.validation.mode = mode;
        }
        if let Some(fail) = env_value::<bool>(env, "FAIL_ON_UNRESOLVED")? {
            config.validation.unresolved = if fail {
                UnresolvedPolicy::Fail
            } else {
                UnresolvedPolicy::Ignore
            };
        }
        if let Some(roots) = env.get(&format!("{ENV_PREFIX}RESOURCE_ROOTS")) {
            config.validation.resource_roots = std::env::split_paths(&roots)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(fallback) = env_value(env, "LOCAL_FALLBACK")? {
            config.validation.local_fallback = fallback;
        }
        if let Some(threads) = env_value(env, "THREADS")? {
            config.validation.threads = Some(threads);
        }
        if let Some(check) = env_value(env, "CHECK_FORMATTING")? {
            config.validation.check_formatting = check;
        }

        if let Some(offline) = env_value(env, "OFFLINE")? {
            config.network.offline = offline;
        }
        if let Some(timeout) = env_value(env, "TIMEOUT")? {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = env_value(env, "RETRY_ATTEMPTS")? {
            config.network.retry_attempts = retry_attempts;
        }

        if let Some(no_cache) = env_value::<bool>(env, "NO_CACHE")? {
            config.cache.enabled = !no_cache;
        }
        if let Some(cache_dir) = env.get(&format!("{ENV_PREFIX}CACHE_DIR")) {
            config.cache.directory = PathBuf::from(cache_dir);
        }
        if let Some(cache_ttl) = env_value(env, "CACHE_TTL")? {
            config.cache.ttl_hours = cache_ttl;
        }

        if let Some(format) = env.get(&format!("{ENV_PREFIX}FORMAT")) {
            config.output.format = match format.to_lowercase().as_str() {
                "human" => OutputFormat::Human,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::Environment(format!(
                        "Invalid {ENV_PREFIX}FORMAT value: {}",
                        format
                    )));
                }
            };
        }
        if let Some(verbose) = env_value(env, "VERBOSE")? {
            config.output.verbose = verbose;
        }
        if let Some(quiet) = env_value(env, "QUIET")? {
            config.output.quiet = quiet;
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        if cli.strict {
            config.validation.mode = Mode::Strict;
        }
        if cli.fail_on_unresolved {
            config.validation.unresolved = UnresolvedPolicy::Fail;
        }
        config
            .validation
            .resource_roots
            .extend(cli.resource_roots.iter().cloned());
        if cli.threads.is_some() {
            config.validation.threads = cli.threads;
        }
        if cli.check_formatting {
            config.validation.check_formatting = true;
        }

        if cli.offline {
            config.network.offline = true;
        }
        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.network.retry_attempts = retry_attempts;
        }

        if cli.no_cache {
            config.cache.enabled = false;
        }
        if let Some(cache_dir) = &cli.cache_dir {
            config.cache.directory = cache_dir.clone();
        }

        if let Some(format) = cli.format {
            config.output.format = format;
        }
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }

        config
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        if let Some(threads) = config.validation.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.cache.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "Cache TTL must be greater than 0".to_string(),
            ));
        }

        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse `XSD_CHECK_<name>` when it is set
fn env_value<T: FromStr>(env: &impl EnvProvider, name: &str) -> Result<Option<T>> {
    let key = format!("{ENV_PREFIX}{name}");
    match env.get(&key) {
        Some(raw) => parse_env(&key, &raw).map(Some),
        None => Ok(None),
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, raw)))
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(Mode::Lenient),
            "strict" => Ok(Mode::Strict),
            other => Err(ConfigError::Validation(format!("Unknown mode: {other}"))),
        }
    }
}
