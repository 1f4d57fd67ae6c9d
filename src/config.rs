//! Config store — the JSON settings file under `$CLAUNCH_HOME`.
//!
//! The file is read once per [`ConfigStore`] and cached. Any write goes
//! through [`ConfigStore::save`], which replaces the file atomically and
//! invalidates the cache; the store's generation counter lets dependent
//! caches (the provider registry) notice that they are stale.
//!
//! A malformed file never aborts the program: it is logged as a warning
//! and the defaults are used instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ClassifiedError, ErrorCode};
use crate::providers::{DiscoveryMode, Model};

pub const CONFIG_FILE: &str = "config.json";
pub const MODEL_CACHE_FILE: &str = "models-cache.json";
pub const ENV_FILE: &str = ".env";

/// Overrides the data directory (default `~/.claunch`).
pub const HOME_ENV_VAR: &str = "CLAUNCH_HOME";

pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 30_000;
pub const DEFAULT_ALLOWED_TOOLS: &str = "Read,Edit,Write,Bash,Glob,Grep";
pub const DEFAULT_AGENT_BINARY: &str = "claude";

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the data directory: `$CLAUNCH_HOME` or `~/.claunch`.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Cannot determine home directory")?;
    Ok(home.join(".claunch"))
}

// ── Config Types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub discovery_timeout_ms: u64,
    pub health_check_timeout_ms: u64,
    pub cache_ttl_ms: u64,
    pub custom_providers: Vec<CustomProviderConfig>,
    pub skip_health_check: bool,
    pub offline_mode: bool,
    pub headless_allowed_tools: String,
    pub agent_binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: None,
            default_model: None,
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_MS,
            health_check_timeout_ms: DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            custom_providers: Vec::new(),
            skip_health_check: false,
            offline_mode: false,
            headless_allowed_tools: DEFAULT_ALLOWED_TOOLS.to_string(),
            agent_binary: DEFAULT_AGENT_BINARY.to_string(),
        }
    }
}

impl Config {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// A user-defined provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomProviderConfig {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    pub base_url: String,
    /// Literal token. Takes precedence over `auth_env_var`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Name of the environment variable holding the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_env_var: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<CustomModelConfig>,
    /// Defaults to `static` when `models` is non-empty, `dynamic` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryMode>,
}

impl CustomProviderConfig {
    pub fn discovery_mode(&self) -> DiscoveryMode {
        match self.discovery {
            Some(mode) => mode,
            None if self.models.is_empty() => DiscoveryMode::DynamicApi,
            None => DiscoveryMode::Static,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomModelConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shortcut: Option<String>,
}

impl From<&CustomModelConfig> for Model {
    fn from(m: &CustomModelConfig) -> Self {
        Model {
            id: m.id.clone(),
            name: m.name.clone().unwrap_or_else(|| m.id.clone()),
            shortcut: m.shortcut.clone().unwrap_or_else(|| m.id.clone()),
        }
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn classify(self) -> ClassifiedError {
        let code = match &self {
            ConfigError::Read { .. } => ErrorCode::Unknown,
            ConfigError::Parse { .. } => ErrorCode::ConfigParseError,
        };
        ClassifiedError::new(code, self.to_string()).with_cause(self)
    }
}

// ── Store ───────────────────────────────────────────────────────────

pub struct ConfigStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<Config>>>,
    /// Bumped on every invalidation.
    generation: AtomicU64,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Current config. Reads the file on first use; falls back to
    /// defaults (with a warning) when the file is malformed.
    pub fn load(&self) -> Arc<Config> {
        if let Some(config) = self.cached.read().ok().and_then(|c| c.clone()) {
            return config;
        }

        let config = match self.read_file() {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %self.path.display(), "No config file, using defaults");
                Config::default()
            }
            Err(e) => {
                let classified = e.classify();
                warn!(
                    code = %classified.code(),
                    "{}; falling back to defaults",
                    classified.message()
                );
                Config::default()
            }
        };

        let config = Arc::new(config);
        if let Ok(mut slot) = self.cached.write() {
            *slot = Some(Arc::clone(&config));
        }
        config
    }

    /// Read the file without caching or fallback. `Ok(None)` when absent.
    pub fn read_file(&self) -> std::result::Result<Option<Config>, ConfigError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Write the config and invalidate the cache.
    pub fn save(&self, config: &Config) -> Result<()> {
        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        atomic_write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), "Config saved");
        self.invalidate();
        Ok(())
    }

    /// Write a default config file. Returns `false` when a file already
    /// exists and `force` is not set.
    pub fn init(&self, force: bool) -> Result<bool> {
        if self.path.exists() && !force {
            return Ok(false);
        }
        self.save(&Config::default())?;
        Ok(true)
    }

    /// Apply `f` to the current config and save the result.
    pub fn update(&self, f: impl FnOnce(&mut Config)) -> Result<Config> {
        let mut config = (*self.load()).clone();
        f(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    /// Drop the cached config; the next `load` re-reads the file.
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.cached.write() {
            *slot = None;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

// ── File Operations (Atomic) ────────────────────────────────────────

/// Write via `<file>.tmp` + fsync + rename so readers never see a
/// half-written file.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
