//! Provider registry — built-in and user-defined backends.
//!
//! A provider is an Anthropic-compatible endpoint plus credentials. The
//! registry merges the built-in table with `customProviders` from the
//! config (a custom entry with the same key replaces the built-in) and
//! caches the merged snapshot until the config store's generation moves.
//!
//! Lookups never fail: an unknown key is simply absent, and callers
//! report `PROVIDER_NOT_FOUND` with the list of valid keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::config::{ConfigStore, CustomProviderConfig};

pub mod builtin;
pub mod resolver;

// ── Aliases ─────────────────────────────────────────────────────────

/// Short provider aliases. No alias is itself a canonical key, so
/// resolution is idempotent.
pub const PROVIDER_ALIASES: &[(&str, &str)] = &[
    ("a", "anthropic"),
    ("or", "openrouter"),
    ("z", "zai"),
    ("ds", "deepseek"),
    ("ol", "ollama-local"),
    ("oc", "ollama-cloud"),
];

/// Map an alias to its canonical key. Unknown input is returned as-is.
pub fn resolve_provider_alias(input: &str) -> &str {
    PROVIDER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == input)
        .map(|(_, key)| *key)
        .unwrap_or(input)
}

// ── Core Types ──────────────────────────────────────────────────────

/// How a provider's model list is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMode {
    /// Fixed list shipped with the provider definition.
    #[serde(rename = "static")]
    Static,
    /// `GET {baseUrl}/v1/models`.
    #[serde(rename = "dynamic")]
    DynamicApi,
}

/// A model a provider can serve. Only `id` is ever sent downstream;
/// `name` and `shortcut` are lookup keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub shortcut: String,
}

impl Model {
    /// A discovered model: no separate alias, so shortcut = name = id.
    pub fn discovered(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            shortcut: id.clone(),
            id,
        }
    }
}

/// Where a provider's URL and token come from.
#[derive(Debug, Clone)]
pub enum ProviderSource {
    BuiltIn {
        base_url_vars: &'static [&'static str],
        fallback_base_url: &'static str,
        token_vars: &'static [&'static str],
        fallback_token: Option<&'static str>,
    },
    Custom {
        base_url: String,
        auth_token: Option<String>,
        auth_env_var: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Provider {
    pub(crate) key: String,
    pub(crate) display_name: String,
    pub(crate) description: String,
    pub(crate) discovery: DiscoveryMode,
    pub(crate) models: Vec<Model>,
    pub(crate) requires_auth: bool,
    pub(crate) source: ProviderSource,
}

impl Provider {
    pub fn from_custom(cfg: &CustomProviderConfig) -> Self {
        Self {
            key: cfg.key.clone(),
            display_name: cfg.name.clone().unwrap_or_else(|| cfg.key.clone()),
            description: cfg
                .description
                .clone()
                .unwrap_or_else(|| format!("Custom provider at {}", cfg.base_url)),
            discovery: cfg.discovery_mode(),
            models: cfg.models.iter().map(Model::from).collect(),
            requires_auth: false,
            source: ProviderSource::Custom {
                base_url: cfg.base_url.clone(),
                auth_token: cfg.auth_token.clone(),
                auth_env_var: cfg.auth_env_var.clone(),
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn discovery(&self) -> DiscoveryMode {
        self.discovery
    }

    /// The fixed model list (empty for dynamic providers).
    pub fn static_models(&self) -> &[Model] {
        &self.models
    }

    pub fn is_built_in(&self) -> bool {
        matches!(self.source, ProviderSource::BuiltIn { .. })
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        let url = match &self.source {
            ProviderSource::BuiltIn {
                base_url_vars,
                fallback_base_url,
                ..
            } => first_env(base_url_vars).unwrap_or_else(|| fallback_base_url.to_string()),
            ProviderSource::Custom { base_url, .. } => base_url.clone(),
        };
        let url = url.trim().trim_end_matches('/');
        // OLLAMA_HOST is conventionally `host:port` with no scheme.
        if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        }
    }

    /// Auth token, or `None` when nothing non-empty is configured.
    pub fn auth_token(&self) -> Option<String> {
        match &self.source {
            ProviderSource::BuiltIn {
                token_vars,
                fallback_token,
                ..
            } => first_env(token_vars).or_else(|| fallback_token.map(str::to_string)),
            ProviderSource::Custom {
                auth_token,
                auth_env_var,
                ..
            } => auth_token
                .clone()
                .filter(|t| !t.is_empty())
                .or_else(|| auth_env_var.as_deref().and_then(|var| first_env(&[var]))),
        }
    }

    /// `{baseUrl}/v1/models`, used for discovery and health probes.
    pub fn models_url(&self) -> String {
        format!("{}/v1/models", self.base_url())
    }
}

fn first_env(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|v| std::env::var(v).ok())
        .find(|v| !v.trim().is_empty())
}

// ── Registry ────────────────────────────────────────────────────────

pub type ProviderMap = BTreeMap<String, Provider>;

pub struct ProviderRegistry {
    config: Arc<ConfigStore>,
    /// (config generation, merged providers)
    snapshot: RwLock<Option<(u64, Arc<ProviderMap>)>>,
}

impl ProviderRegistry {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            snapshot: RwLock::new(None),
        }
    }

    /// Built-ins merged with custom providers. Rebuilt when the config
    /// has been invalidated since the last build.
    pub fn providers(&self) -> Arc<ProviderMap> {
        let generation = self.config.generation();
        if let Some((built_at, map)) = self.snapshot.read().ok().and_then(|s| s.clone()) {
            if built_at == generation {
                return map;
            }
        }

        let map = Arc::new(self.build());
        if let Ok(mut slot) = self.snapshot.write() {
            *slot = Some((generation, Arc::clone(&map)));
        }
        map
    }

    fn build(&self) -> ProviderMap {
        let config = self.config.load();
        let mut map: ProviderMap = builtin::BUILTIN_PROVIDERS
            .iter()
            .map(|spec| (spec.key.to_string(), spec.to_provider()))
            .collect();

        for custom in &config.custom_providers {
            if map.contains_key(&custom.key) {
                debug!(key = %custom.key, "Custom provider replaces built-in");
            }
            map.insert(custom.key.clone(), Provider::from_custom(custom));
        }
        map
    }

    /// Resolve an alias, then look the key up.
    pub fn get_provider(&self, key_or_alias: &str) -> Option<Provider> {
        let key = resolve_provider_alias(key_or_alias);
        self.providers().get(key).cloned()
    }

    /// Canonical keys in registry order.
    pub fn keys(&self) -> Vec<String> {
        self.providers().keys().cloned().collect()
    }

    pub fn clear_cache(&self) {
        if let Ok(mut slot) = self.snapshot.write() {
            *slot = None;
        }
    }
}
