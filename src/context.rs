//! Context — one owned instance of every stateful component.
//!
//! Everything that caches (config, provider snapshot, model cache) lives
//! in a field here rather than in a global, so each test builds its own
//! `Context` over a temp directory and never has to reset shared state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::{Config, ConfigStore, CONFIG_FILE, MODEL_CACHE_FILE};
use crate::discovery::{DiscoverySettings, DiskCache, ModelDiscovery};
use crate::error::{ClassifiedError, ErrorCode};
use crate::health::{HealthCheckResult, HealthChecker};
use crate::launcher::{LaunchOptions, Launcher};
use crate::providers::resolver::{self, Resolution};
use crate::providers::{resolve_provider_alias, Model, Provider, ProviderRegistry};

pub struct Context {
    data_dir: PathBuf,
    pub config: Arc<ConfigStore>,
    pub registry: ProviderRegistry,
    pub discovery: ModelDiscovery,
    pub health: HealthChecker,
}

impl Context {
    /// Build every component over `data_dir`. Timeouts and TTL are taken
    /// from the config as it reads now.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let store = Arc::new(ConfigStore::new(data_dir.join(CONFIG_FILE)));
        let settings = store.load();

        Self {
            registry: ProviderRegistry::new(Arc::clone(&store)),
            discovery: ModelDiscovery::new(
                DiscoverySettings::from(settings.as_ref()),
                DiskCache::new(data_dir.join(MODEL_CACHE_FILE)),
            ),
            health: HealthChecker::new(settings.health_check_timeout()),
            config: store,
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings(&self) -> Arc<Config> {
        self.config.load()
    }

    /// Look a provider up by key or alias, or fail with the valid keys.
    pub fn require_provider(&self, key_or_alias: &str) -> Result<Provider, ClassifiedError> {
        self.registry.get_provider(key_or_alias).ok_or_else(|| {
            ClassifiedError::new(
                ErrorCode::ProviderNotFound,
                format!(
                    "{}: `{}` (available: {})",
                    ErrorCode::ProviderNotFound.summary(),
                    resolve_provider_alias(key_or_alias),
                    self.registry.keys().join(", ")
                ),
            )
        })
    }

    pub async fn get_models(&self, provider: &Provider) -> Vec<Model> {
        self.discovery.get_models(provider).await
    }

    pub async fn resolve_model(&self, provider: &Provider, input: &str) -> Resolution {
        resolver::resolve_for_provider(&self.discovery, provider, input).await
    }

    pub async fn check_health(&self, provider: &Provider) -> HealthCheckResult {
        self.health.check_health(provider).await
    }

    /// Probe every registered provider concurrently.
    pub async fn check_all_providers(&self) -> Vec<HealthCheckResult> {
        let providers = self.registry.providers();
        self.health.check_all(providers.values()).await
    }

    // ── By key ──────────────────────────────────────────────────────

    /// Models for a provider key or alias. Unknown providers have none.
    pub async fn get_models_by_key(&self, key_or_alias: &str) -> Vec<Model> {
        match self.registry.get_provider(key_or_alias) {
            Some(provider) => self.get_models(&provider).await,
            None => {
                warn!(provider = %key_or_alias, "Unknown provider; no models");
                Vec::new()
            }
        }
    }

    /// Resolve against a provider by key. With no such provider there is
    /// nothing to match, so the input passes through.
    pub async fn resolve_model_by_key(&self, key_or_alias: &str, input: &str) -> Resolution {
        match self.registry.get_provider(key_or_alias) {
            Some(provider) => self.resolve_model(&provider, input).await,
            None => Resolution::PassThrough(input.to_string()),
        }
    }

    /// Probe a provider by key. An unknown key is an unhealthy result
    /// carrying `PROVIDER_NOT_FOUND`.
    pub async fn check_health_by_key(&self, key_or_alias: &str) -> HealthCheckResult {
        match self.require_provider(key_or_alias) {
            Ok(provider) => self.check_health(&provider).await,
            Err(err) => HealthCheckResult {
                provider_key: resolve_provider_alias(key_or_alias).to_string(),
                healthy: false,
                latency_ms: None,
                error: Some(err),
            },
        }
    }

    pub fn launcher(&self) -> Launcher {
        Launcher::new(self.settings().agent_binary.clone())
    }

    /// Launch options from the config, with per-invocation overrides.
    pub fn launch_options(&self, skip_permissions: bool, headless_prompt: Option<String>) -> LaunchOptions {
        LaunchOptions {
            skip_permissions,
            headless_prompt,
            allowed_tools: self.settings().headless_allowed_tools.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_uses_config_timeouts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"healthCheckTimeoutMs": 750, "discoveryTimeoutMs": 1500, "cacheTtlMs": 0}"#,
        )
        .unwrap();

        let ctx = Context::open(dir.path());
        assert_eq!(ctx.health.timeout().as_millis(), 750);
        assert_eq!(ctx.discovery.settings().timeout.as_millis(), 1500);
        assert_eq!(ctx.discovery.settings().cache_ttl.as_millis(), 0);
    }

    #[test]
    fn test_require_provider_lists_available_keys() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());

        assert_eq!(ctx.require_provider("ol").unwrap().key(), "ollama-local");

        let err = ctx.require_provider("nowhere").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderNotFound);
        assert!(err.message().contains("nowhere"));
        assert!(err.message().contains("openrouter"));
        assert!(err.hint().is_some());
    }

    #[tokio::test]
    async fn test_resolve_model_on_static_provider() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());
        let provider = ctx.require_provider("or").unwrap();

        assert_eq!(
            ctx.resolve_model(&provider, "sonnet").await,
            Resolution::Resolved("anthropic/claude-sonnet-4.5".into())
        );
        assert_eq!(
            ctx.resolve_model(&provider, "meta-llama/llama-4").await,
            Resolution::PassThrough("meta-llama/llama-4".into())
        );
    }

    #[tokio::test]
    async fn test_lookups_by_unknown_key() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());

        assert!(ctx.get_models_by_key("nowhere").await.is_empty());
        assert_eq!(
            ctx.resolve_model_by_key("nowhere", "x/y").await,
            Resolution::PassThrough("x/y".into())
        );

        let result = ctx.check_health_by_key("nowhere").await;
        assert!(!result.healthy);
        assert_eq!(result.error.unwrap().code(), ErrorCode::ProviderNotFound);
    }

    #[tokio::test]
    async fn test_lookups_by_alias() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());

        let models = ctx.get_models_by_key("z").await;
        assert!(models.iter().any(|m| m.shortcut == "glm"));
        assert!(ctx.resolve_model_by_key("ds", "chat").await.is_resolved());
    }

    #[test]
    fn test_launch_options_use_configured_tools() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());
        ctx.config
            .update(|c| c.headless_allowed_tools = "Read".into())
            .unwrap();

        let opts = ctx.launch_options(true, Some("go".into()));
        assert!(opts.skip_permissions);
        assert_eq!(opts.allowed_tools, "Read");
    }
}
