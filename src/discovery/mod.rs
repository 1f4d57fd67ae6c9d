//! Model discovery — live `/v1/models` fetch with a two-tier cache.
//!
//! Lookup order for a dynamic provider:
//!
//!   in-memory entry younger than the TTL
//!        ↓ miss / stale
//!   GET {baseUrl}/v1/models (bounded by the discovery timeout)
//!        ↓ success → memory + disk entry overwritten
//!        ↓ failure
//!   disk entry (any age, if non-empty) → else empty list
//!
//! `get_models` never returns an error. Failures are classified, logged
//! and remembered per provider (`last_error`) so the CLI can explain an
//! empty list.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{classify_http, classify_message, ClassifiedError, ErrorCode};
use crate::providers::{DiscoveryMode, Model, Provider};

pub mod disk_cache;

pub use disk_cache::DiskCache;

// ── Types ───────────────────────────────────────────────────────────

/// One provider's discovered models. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCacheEntry {
    pub provider_key: String,
    pub models: Vec<Model>,
    /// Epoch millis.
    pub timestamp: i64,
}

impl ModelCacheEntry {
    fn is_fresh(&self, ttl: Duration, now_ms: i64) -> bool {
        now_ms - self.timestamp < i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoverySettings {
    pub timeout: Duration,
    pub cache_ttl: Duration,
    /// Serve the disk cache without touching the network.
    pub offline: bool,
}

impl From<&Config> for DiscoverySettings {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.discovery_timeout(),
            cache_ttl: config.cache_ttl(),
            offline: config.offline_mode,
        }
    }
}

/// `{ "data": [ { "id": "..." }, ... ] }`; other fields are ignored.
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelDescriptor>,
}

#[derive(Debug, Deserialize)]
struct ModelDescriptor {
    id: String,
}

// ── Discovery ───────────────────────────────────────────────────────

pub struct ModelDiscovery {
    client: reqwest::Client,
    settings: DiscoverySettings,
    memory: RwLock<HashMap<String, ModelCacheEntry>>,
    disk: DiskCache,
    last_errors: RwLock<HashMap<String, ClassifiedError>>,
}

impl ModelDiscovery {
    pub fn new(settings: DiscoverySettings, disk: DiskCache) -> Self {
        Self::with_client(reqwest::Client::new(), settings, disk)
    }

    pub fn with_client(client: reqwest::Client, settings: DiscoverySettings, disk: DiskCache) -> Self {
        Self {
            client,
            settings,
            memory: RwLock::new(HashMap::new()),
            disk,
            last_errors: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> DiscoverySettings {
        self.settings
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    /// Models for a provider. Static providers return their fixed list;
    /// dynamic providers go through the cache tiers described above.
    pub async fn get_models(&self, provider: &Provider) -> Vec<Model> {
        if provider.discovery() == DiscoveryMode::Static {
            return provider.static_models().to_vec();
        }

        let key = provider.key();
        if let Some(entry) = self.fresh_entry(key) {
            debug!(provider = %key, count = entry.models.len(), "Model cache hit");
            return entry.models;
        }

        if self.settings.offline {
            debug!(provider = %key, "Offline mode, reading model list from disk");
            return self
                .disk
                .get(key)
                .map(|entry| entry.models)
                .unwrap_or_default();
        }

        match self.fetch(provider).await {
            Ok(models) => {
                self.record_success(key, &models);
                models
            }
            Err(err) => {
                let fallback = self.disk.get(key).filter(|entry| !entry.models.is_empty());
                match &fallback {
                    Some(entry) => warn!(
                        provider = %key,
                        code = %err.code(),
                        cached_at = entry.timestamp,
                        "{}; using cached model list",
                        err.message()
                    ),
                    None => error!(
                        provider = %key,
                        code = %err.code(),
                        "{}",
                        err.message()
                    ),
                }
                if let Ok(mut errors) = self.last_errors.write() {
                    errors.insert(key.to_string(), err);
                }
                fallback.map(|entry| entry.models).unwrap_or_default()
            }
        }
    }

    /// Live fetch that skips the memory cache and offline mode. Caches
    /// are updated on success; failures are returned, not masked.
    pub async fn refresh(&self, provider: &Provider) -> Result<Vec<Model>, ClassifiedError> {
        if provider.discovery() == DiscoveryMode::Static {
            return Ok(provider.static_models().to_vec());
        }
        let key = provider.key();
        match self.fetch(provider).await {
            Ok(models) => {
                self.record_success(key, &models);
                Ok(models)
            }
            Err(err) => {
                if let Ok(mut errors) = self.last_errors.write() {
                    errors.insert(key.to_string(), err.clone());
                }
                Err(err)
            }
        }
    }

    fn record_success(&self, key: &str, models: &[Model]) {
        let timestamp = Utc::now().timestamp_millis();
        info!(provider = %key, count = models.len(), "📡 Discovered models");

        if let Ok(mut memory) = self.memory.write() {
            memory.insert(
                key.to_string(),
                ModelCacheEntry {
                    provider_key: key.to_string(),
                    models: models.to_vec(),
                    timestamp,
                },
            );
        }
        if let Err(e) = self.disk.store(key, models, timestamp) {
            warn!(provider = %key, "Failed to persist model cache: {:#}", e);
        }
        if let Ok(mut errors) = self.last_errors.write() {
            errors.remove(key);
        }
    }

    /// Drop one provider's in-memory entry, or all of them. The disk
    /// cache is left alone.
    pub fn clear_cache(&self, provider_key: Option<&str>) {
        if let Ok(mut memory) = self.memory.write() {
            match provider_key {
                Some(key) => {
                    memory.remove(key);
                }
                None => memory.clear(),
            }
        }
    }

    /// In-memory entry regardless of age.
    pub fn cached(&self, provider_key: &str) -> Option<ModelCacheEntry> {
        self.memory.read().ok()?.get(provider_key).cloned()
    }

    /// Most recent discovery failure for a provider, cleared on success.
    pub fn last_error(&self, provider_key: &str) -> Option<ClassifiedError> {
        self.last_errors.read().ok()?.get(provider_key).cloned()
    }

    fn fresh_entry(&self, key: &str) -> Option<ModelCacheEntry> {
        let now = Utc::now().timestamp_millis();
        self.cached(key)
            .filter(|entry| entry.is_fresh(self.settings.cache_ttl, now))
    }

    /// One bounded request. Hitting the deadline drops the request
    /// future, which aborts the connection.
    async fn fetch(&self, provider: &Provider) -> Result<Vec<Model>, ClassifiedError> {
        let url = provider.models_url();
        let timeout = self.settings.timeout;

        let mut request = self.client.get(&url);
        if let Some(token) = provider.auth_token() {
            request = request.bearer_auth(token);
        }

        let attempt = async {
            let resp = request.send().await.map_err(classify_http)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(http_status_error(status));
            }
            let body: ModelsResponse = resp.json().await.map_err(|e| {
                ClassifiedError::new(
                    ErrorCode::ModelFetchFailed,
                    format!("Malformed model list from {}", url),
                )
                .with_cause(e)
            })?;
            Ok::<Vec<Model>, ClassifiedError>(
                body.data.into_iter().map(|m| Model::discovered(m.id)).collect(),
            )
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ClassifiedError::new(
                ErrorCode::ConnectionTimeout,
                format!(
                    "Model discovery for {} timed out after {}ms",
                    provider.key(),
                    timeout.as_millis()
                ),
            )),
        }
    }
}

/// Non-2xx discovery response. Statuses the classifier does not know
/// become `MODEL_FETCH_FAILED`.
fn http_status_error(status: reqwest::StatusCode) -> ClassifiedError {
    let raw = format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("error")
    );
    let classified = classify_message(&raw);
    if classified.code() == ErrorCode::Unknown {
        ClassifiedError::new(ErrorCode::ModelFetchFailed, format!("Failed to fetch models: {}", raw))
    } else {
        classified
    }
}
