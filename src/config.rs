//! Configuration management for docvault using the prefer crate.
//!
//! A config file (TOML, YAML or JSON) is discovered with prefer or given
//! explicitly, applied over built-in defaults, and finally overridden by
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive::ArchiveOptions;
use crate::dispatch::{default_allowed_countries, default_disallowed_extensions, DispatchPolicy};
use crate::http_client::RetryPolicy;
use crate::rate_limit::RateLimitConfig;
use crate::repository::DbContext;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "docvault.db";

/// Default object store subdirectory name.
const OBJECTS_SUBDIR: &str = "objects";

/// Default per-attempt timeout for document source requests.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 300;

/// Default number of documents archived at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Root of the filesystem object store.
    pub object_store_dir: PathBuf,
    /// Document source API base URL.
    pub source_base_url: Option<String>,
    /// Bearer token for the document source.
    pub source_token: Option<String>,
    /// Per-attempt request timeout in seconds.
    pub source_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
    pub dispatch: DispatchPolicy,
    pub replicate_all_versions: bool,
    pub delete_source_after: bool,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: data dir -> home dir -> current dir
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docvault");

        Self {
            object_store_dir: data_dir.join(OBJECTS_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            source_base_url: None,
            source_token: None,
            source_timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            dispatch: DispatchPolicy::default(),
            replicate_all_versions: true,
            delete_source_after: false,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            object_store_dir: data_dir.join(OBJECTS_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Create a database context for these settings.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::from_url(&self.database_url())
    }

    /// Ensure the data and object store directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.object_store_dir)?;
        Ok(())
    }

    /// Default replication switches for batches that don't specify them.
    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions {
            replicate_all_versions: self.replicate_all_versions,
            delete_source_after: self.delete_source_after,
        }
    }
}

/// Document source section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Archive section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_countries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disallowed_extensions: Option<Vec<String>>,
    /// 0 means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicate_all_versions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_source_after: Option<bool>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Object store root directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store_dir: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    pub async fn load() -> Self {
        match prefer::load("docvault").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.object_store_dir = settings.data_dir.join(OBJECTS_SUBDIR);
        }
        if let Some(ref dir) = self.object_store_dir {
            settings.object_store_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }

        if let Some(ref url) = self.source.base_url {
            settings.source_base_url = Some(url.clone());
        }
        if let Some(ref token) = self.source.token {
            settings.source_token = Some(token.clone());
        }
        if let Some(timeout) = self.source.timeout_secs {
            settings.source_timeout_secs = timeout;
        }

        if let Some(ref retry) = self.retry {
            settings.retry = retry.clone();
        }
        if let Some(ref rate_limit) = self.rate_limit {
            settings.rate_limit = rate_limit.clone();
        }

        let archive = &self.archive;
        if let Some(ref countries) = archive.allowed_countries {
            settings.dispatch.allowed_countries = countries.clone();
        }
        if let Some(ref extensions) = archive.disallowed_extensions {
            settings.dispatch.disallowed_extensions = extensions.clone();
        }
        if let Some(max) = archive.max_concurrency {
            settings.dispatch.max_concurrency = max;
        }
        if let Some(all) = archive.replicate_all_versions {
            settings.replicate_all_versions = all;
        }
        if let Some(delete) = archive.delete_source_after {
            settings.delete_source_after = delete;
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let mut settings = Settings::default();

    let base_dir = if options.use_cwd {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    };

    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings);

    (settings, config)
}

/// Environment variables take highest precedence.
fn apply_env_overrides(settings: &mut Settings) {
    if let Some(database_url) = env_override("DATABASE_URL") {
        tracing::debug!("Using DATABASE_URL from environment: {}", database_url);
        settings.database_url = Some(database_url);
    }
    if let Some(url) = env_override("DOCVAULT_SOURCE_URL") {
        tracing::debug!("Using DOCVAULT_SOURCE_URL from environment: {}", url);
        settings.source_base_url = Some(url);
    }
    if let Some(token) = env_override("DOCVAULT_SOURCE_TOKEN") {
        settings.source_token = Some(token);
    }
    if let Some(dir) = env_override("DOCVAULT_OBJECT_STORE") {
        let expanded = shellexpand::tilde(&dir).into_owned();
        settings.object_store_dir = PathBuf::from(expanded);
    }
}

/// Default archive section values, for documentation and `init` output.
pub fn default_archive_config() -> ArchiveConfig {
    ArchiveConfig {
        allowed_countries: Some(default_allowed_countries()),
        disallowed_extensions: Some(default_disallowed_extensions()),
        max_concurrency: Some(DEFAULT_MAX_CONCURRENCY),
        replicate_all_versions: Some(true),
        delete_source_after: Some(false),
    }
}
