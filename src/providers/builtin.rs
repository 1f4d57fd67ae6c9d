//! Built-in providers — static metadata for every backend we ship.
//!
//! Each entry names the environment variables its base URL and token are
//! read from (first non-empty wins) plus a static fallback, and, for
//! static providers, the model list with user-facing shortcuts.
//! Dynamic providers carry no models; theirs come from discovery.

use super::{DiscoveryMode, Model, Provider, ProviderSource};

/// A model in a built-in provider's fixed list.
#[derive(Debug, Clone, Copy)]
pub struct StaticModel {
    pub id: &'static str,
    pub name: &'static str,
    pub shortcut: &'static str,
}

/// Static definition of a built-in provider.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinSpec {
    pub key: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub discovery: DiscoveryMode,
    /// Checked in order; the first non-empty value wins.
    pub base_url_vars: &'static [&'static str],
    pub fallback_base_url: &'static str,
    /// Checked in order; later names are accepted synonyms.
    pub token_vars: &'static [&'static str],
    pub fallback_token: Option<&'static str>,
    /// Whether the launcher should refuse to start without a token.
    pub requires_auth: bool,
    pub models: &'static [StaticModel],
}

impl BuiltinSpec {
    pub fn to_provider(&self) -> Provider {
        Provider {
            key: self.key.to_string(),
            display_name: self.display_name.to_string(),
            description: self.description.to_string(),
            discovery: self.discovery,
            models: self
                .models
                .iter()
                .map(|m| Model {
                    id: m.id.to_string(),
                    name: m.name.to_string(),
                    shortcut: m.shortcut.to_string(),
                })
                .collect(),
            requires_auth: self.requires_auth,
            source: ProviderSource::BuiltIn {
                base_url_vars: self.base_url_vars,
                fallback_base_url: self.fallback_base_url,
                token_vars: self.token_vars,
                fallback_token: self.fallback_token,
            },
        }
    }
}

// ── Static Registry ─────────────────────────────────────────────────

pub static BUILTIN_PROVIDERS: &[BuiltinSpec] = &[
    BuiltinSpec {
        key: "anthropic",
        display_name: "Anthropic",
        description: "Anthropic API (direct)",
        discovery: DiscoveryMode::Static,
        base_url_vars: &["ANTHROPIC_PROVIDER_BASE_URL"],
        fallback_base_url: "https://api.anthropic.com",
        token_vars: &["ANTHROPIC_PROVIDER_AUTH_TOKEN", "ANTHROPIC_PROVIDER_API_KEY"],
        fallback_token: None,
        requires_auth: true,
        models: &[
            StaticModel {
                id: "claude-sonnet-4-5-20250929",
                name: "Claude Sonnet 4.5",
                shortcut: "sonnet",
            },
            StaticModel {
                id: "claude-opus-4-1-20250805",
                name: "Claude Opus 4.1",
                shortcut: "opus",
            },
            StaticModel {
                id: "claude-haiku-4-5-20251001",
                name: "Claude Haiku 4.5",
                shortcut: "haiku",
            },
        ],
    },
    BuiltinSpec {
        key: "openrouter",
        display_name: "OpenRouter",
        description: "OpenRouter (Anthropic-compatible endpoint, many vendors)",
        discovery: DiscoveryMode::Static,
        base_url_vars: &["OPENROUTER_BASE_URL"],
        fallback_base_url: "https://openrouter.ai/api",
        token_vars: &["OPENROUTER_AUTH_TOKEN", "OPENROUTER_API_KEY"],
        fallback_token: None,
        requires_auth: true,
        models: &[
            StaticModel {
                id: "anthropic/claude-sonnet-4.5",
                name: "Claude Sonnet 4.5",
                shortcut: "sonnet",
            },
            StaticModel {
                id: "anthropic/claude-opus-4.1",
                name: "Claude Opus 4.1",
                shortcut: "opus",
            },
            StaticModel {
                id: "anthropic/claude-haiku-4.5",
                name: "Claude Haiku 4.5",
                shortcut: "haiku",
            },
            StaticModel {
                id: "openai/gpt-5",
                name: "GPT-5",
                shortcut: "gpt5",
            },
            StaticModel {
                id: "google/gemini-2.5-pro",
                name: "Gemini 2.5 Pro",
                shortcut: "gemini",
            },
            StaticModel {
                id: "x-ai/grok-code-fast-1",
                name: "Grok Code Fast 1",
                shortcut: "grok",
            },
            StaticModel {
                id: "qwen/qwen3-coder",
                name: "Qwen3 Coder",
                shortcut: "qwen",
            },
            StaticModel {
                id: "z-ai/glm-4.6",
                name: "GLM 4.6",
                shortcut: "glm",
            },
            StaticModel {
                id: "moonshotai/kimi-k2",
                name: "Kimi K2",
                shortcut: "kimi",
            },
            StaticModel {
                id: "deepseek/deepseek-chat-v3.1",
                name: "DeepSeek V3.1",
                shortcut: "deepseek",
            },
        ],
    },
    BuiltinSpec {
        key: "zai",
        display_name: "Z.AI",
        description: "Z.AI GLM coding plan",
        discovery: DiscoveryMode::Static,
        base_url_vars: &["ZAI_BASE_URL"],
        fallback_base_url: "https://api.z.ai/api/anthropic",
        token_vars: &["ZAI_AUTH_TOKEN", "ZAI_API_KEY"],
        fallback_token: None,
        requires_auth: true,
        models: &[
            StaticModel {
                id: "glm-4.6",
                name: "GLM 4.6",
                shortcut: "glm",
            },
            StaticModel {
                id: "glm-4.5-air",
                name: "GLM 4.5 Air",
                shortcut: "air",
            },
        ],
    },
    BuiltinSpec {
        key: "deepseek",
        display_name: "DeepSeek",
        description: "DeepSeek Anthropic-compatible API",
        discovery: DiscoveryMode::Static,
        base_url_vars: &["DEEPSEEK_BASE_URL"],
        fallback_base_url: "https://api.deepseek.com/anthropic",
        token_vars: &["DEEPSEEK_AUTH_TOKEN", "DEEPSEEK_API_KEY"],
        fallback_token: None,
        requires_auth: true,
        models: &[
            StaticModel {
                id: "deepseek-chat",
                name: "DeepSeek Chat",
                shortcut: "chat",
            },
            StaticModel {
                id: "deepseek-reasoner",
                name: "DeepSeek Reasoner",
                shortcut: "reasoner",
            },
        ],
    },
    BuiltinSpec {
        key: "ollama-local",
        display_name: "Ollama (local)",
        description: "Local Ollama server",
        discovery: DiscoveryMode::DynamicApi,
        base_url_vars: &["OLLAMA_BASE_URL", "OLLAMA_HOST"],
        fallback_base_url: "http://localhost:11434",
        token_vars: &["OLLAMA_AUTH_TOKEN"],
        // Ollama ignores the token but Claude Code insists on one
        fallback_token: Some("ollama"),
        requires_auth: false,
        models: &[],
    },
    BuiltinSpec {
        key: "ollama-cloud",
        display_name: "Ollama Cloud",
        description: "Hosted Ollama models",
        discovery: DiscoveryMode::DynamicApi,
        base_url_vars: &["OLLAMA_CLOUD_BASE_URL"],
        fallback_base_url: "https://ollama.com",
        token_vars: &["OLLAMA_CLOUD_AUTH_TOKEN", "OLLAMA_API_KEY"],
        fallback_token: None,
        requires_auth: true,
        models: &[],
    },
];

/// Look up a built-in provider by its canonical key.
pub fn get_builtin(key: &str) -> Option<&'static BuiltinSpec> {
    BUILTIN_PROVIDERS.iter().find(|p| p.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_keys_are_unique() {
        let keys: HashSet<_> = BUILTIN_PROVIDERS.iter().map(|p| p.key).collect();
        assert_eq!(keys.len(), BUILTIN_PROVIDERS.len());
    }

    #[test]
    fn test_static_providers_have_models_dynamic_do_not() {
        for spec in BUILTIN_PROVIDERS {
            match spec.discovery {
                DiscoveryMode::Static => assert!(!spec.models.is_empty(), "{}", spec.key),
                DiscoveryMode::DynamicApi => assert!(spec.models.is_empty(), "{}", spec.key),
            }
        }
    }

    #[test]
    fn test_shortcuts_unique_within_provider() {
        for spec in BUILTIN_PROVIDERS {
            let shortcuts: HashSet<_> = spec.models.iter().map(|m| m.shortcut).collect();
            assert_eq!(shortcuts.len(), spec.models.len(), "{}", spec.key);
        }
    }

    #[test]
    fn test_every_builtin_has_a_token_source() {
        for spec in BUILTIN_PROVIDERS {
            assert!(
                !spec.token_vars.is_empty() || spec.fallback_token.is_some(),
                "{} has no way to get a token",
                spec.key
            );
        }
    }

    #[test]
    fn test_get_builtin() {
        assert!(get_builtin("openrouter").is_some());
        assert!(get_builtin("or").is_none());
    }
}
