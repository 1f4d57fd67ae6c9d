//! Model resolver — turns a shortcut, id or display name into a model id.
//!
//! Unmatched input is passed through untouched so that power users can
//! hand a raw provider-native id straight to the agent. The two outcomes
//! are distinct variants of [`Resolution`] so callers (and tests) can
//! tell "found" from "fell through".

use tracing::debug;

use super::{DiscoveryMode, Model, Provider};
use crate::discovery::ModelDiscovery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Matched a model; holds its canonical id.
    Resolved(String),
    /// Nothing matched; holds the input unchanged.
    PassThrough(String),
}

impl Resolution {
    /// The id to send downstream, whichever way it was obtained.
    pub fn model_id(&self) -> &str {
        match self {
            Resolution::Resolved(id) | Resolution::PassThrough(id) => id,
        }
    }

    pub fn into_model_id(self) -> String {
        match self {
            Resolution::Resolved(id) | Resolution::PassThrough(id) => id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Resolve against an ordered model list.
///
/// A model matches on exact shortcut, exact id, or case-insensitive
/// name; the first model in list order that matches any of the three
/// wins.
pub fn resolve_model(models: &[Model], input: &str) -> Resolution {
    let lower = input.to_lowercase();
    models
        .iter()
        .find(|m| m.shortcut == input || m.id == input || m.name.to_lowercase() == lower)
        .map(|m| Resolution::Resolved(m.id.clone()))
        .unwrap_or_else(|| Resolution::PassThrough(input.to_string()))
}

/// Resolve for a provider: its fixed list for static providers, the
/// discovered (possibly cached) list for dynamic ones.
pub async fn resolve_for_provider(
    discovery: &ModelDiscovery,
    provider: &Provider,
    input: &str,
) -> Resolution {
    let resolution = match provider.discovery() {
        DiscoveryMode::Static => resolve_model(provider.static_models(), input),
        DiscoveryMode::DynamicApi => {
            let models = discovery.get_models(provider).await;
            resolve_model(&models, input)
        }
    };

    if let Resolution::PassThrough(raw) = &resolution {
        debug!(provider = %provider.key(), model = %raw, "No model matched; passing id through");
    }
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> Vec<Model> {
        vec![
            Model {
                id: "anthropic/claude-sonnet-4.5".into(),
                name: "Claude Sonnet 4.5".into(),
                shortcut: "sonnet".into(),
            },
            Model {
                id: "anthropic/claude-opus-4.1".into(),
                name: "Claude Opus 4.1".into(),
                shortcut: "opus".into(),
            },
        ]
    }

    #[test]
    fn test_shortcut_resolves_to_id() {
        assert_eq!(
            resolve_model(&models(), "sonnet"),
            Resolution::Resolved("anthropic/claude-sonnet-4.5".into())
        );
    }

    #[test]
    fn test_id_resolves_to_itself() {
        let r = resolve_model(&models(), "anthropic/claude-sonnet-4.5");
        assert!(r.is_resolved());
        assert_eq!(r.model_id(), "anthropic/claude-sonnet-4.5");
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        assert_eq!(
            resolve_model(&models(), "claude opus 4.1").into_model_id(),
            "anthropic/claude-opus-4.1"
        );
    }

    #[test]
    fn test_unmatched_passes_through() {
        let r = resolve_model(&models(), "nonexistent");
        assert_eq!(r, Resolution::PassThrough("nonexistent".into()));
        assert_eq!(r.model_id(), "nonexistent");
        assert!(!r.is_resolved());
    }

    #[test]
    fn test_shortcut_is_case_sensitive() {
        // "SONNET" is neither a shortcut nor a name
        assert!(!resolve_model(&models(), "SONNET").is_resolved());
    }

    #[test]
    fn test_empty_list_passes_through() {
        assert_eq!(
            resolve_model(&[], "llama3.2:latest"),
            Resolution::PassThrough("llama3.2:latest".into())
        );
    }

    #[test]
    fn test_builtin_openrouter_scenario() {
        let provider = crate::providers::builtin::get_builtin("openrouter")
            .unwrap()
            .to_provider();
        let list = provider.static_models();
        assert_eq!(resolve_model(list, "sonnet").model_id(), "anthropic/claude-sonnet-4.5");
        assert_eq!(
            resolve_model(list, "anthropic/claude-sonnet-4.5").model_id(),
            "anthropic/claude-sonnet-4.5"
        );
        assert_eq!(resolve_model(list, "nonexistent").model_id(), "nonexistent");
    }
}
