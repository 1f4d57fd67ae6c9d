//! Interactive provider/model picker (dialoguer).
//!
//! Only used when no provider was given and stdin is a terminal. The
//! prompts block, so they run on the blocking pool.

use anyhow::{Context as _, Result};
use dialoguer::{theme::ColorfulTheme, FuzzySelect, Input, Select};
use std::io::{self, IsTerminal};

use crate::context::Context;
use crate::health::HealthCheckResult;
use crate::providers::{Model, Provider};

pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

/// One picker line: key, display name, and health when it was probed.
pub fn provider_label(provider: &Provider, health: Option<&HealthCheckResult>) -> String {
    let status = match health {
        None => String::new(),
        Some(h) if h.healthy => match h.latency_ms {
            Some(ms) => format!("  ✔ {}ms", ms),
            None => "  ✔".to_string(),
        },
        Some(h) => match &h.error {
            Some(err) => format!("  ✖ {}", err.code()),
            None => "  ✖".to_string(),
        },
    };
    format!("{:<14} {}{}", provider.key(), provider.display_name(), status)
}

pub fn model_label(model: &Model) -> String {
    if model.shortcut == model.id {
        model.id.clone()
    } else {
        format!("{:<10} {}", model.shortcut, model.id)
    }
}

/// Ask for a provider. The configured default is preselected.
pub async fn pick_provider(ctx: &Context) -> Result<Provider> {
    let providers: Vec<Provider> = ctx.registry.providers().values().cloned().collect();
    let settings = ctx.settings();

    let health = if settings.skip_health_check {
        Vec::new()
    } else {
        ctx.health.check_all(providers.iter()).await
    };

    let labels: Vec<String> = providers
        .iter()
        .map(|p| {
            let result = health.iter().find(|h| h.provider_key == p.key());
            provider_label(p, result)
        })
        .collect();

    let default = settings
        .default_provider
        .as_deref()
        .and_then(|key| ctx.registry.get_provider(key))
        .and_then(|d| providers.iter().position(|p| p.key() == d.key()))
        .unwrap_or(0);

    let index = prompt_blocking(move || {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Provider")
            .items(&labels)
            .default(default)
            .interact()
    })
    .await?;

    providers
        .into_iter()
        .nth(index)
        .context("Provider selection out of range")
}

/// Ask for a model. Falls back to free text when the provider has no
/// known models (discovery failed or returned nothing).
pub async fn pick_model(ctx: &Context, provider: &Provider) -> Result<String> {
    let models = ctx.get_models(provider).await;

    if models.is_empty() {
        let prompt = format!("Model id for {}", provider.display_name());
        return prompt_blocking(move || {
            Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .interact_text()
        })
        .await;
    }

    let labels: Vec<String> = models.iter().map(model_label).collect();
    let index = prompt_blocking(move || {
        FuzzySelect::with_theme(&ColorfulTheme::default())
            .with_prompt("Model")
            .items(&labels)
            .default(0)
            .interact()
    })
    .await?;

    models
        .into_iter()
        .nth(index)
        .map(|m| m.id)
        .context("Model selection out of range")
}

async fn prompt_blocking<T, F>(prompt: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, dialoguer::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .context("Prompt task panicked")?
        .context("Prompt cancelled")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClassifiedError, ErrorCode};
    use crate::providers::builtin::get_builtin;

    fn openrouter() -> Provider {
        get_builtin("openrouter").unwrap().to_provider()
    }

    #[test]
    fn test_provider_label_without_health() {
        let label = provider_label(&openrouter(), None);
        assert!(label.starts_with("openrouter"));
        assert!(label.contains("OpenRouter"));
        assert!(!label.contains('✔'));
    }

    #[test]
    fn test_provider_label_with_health() {
        let ok = HealthCheckResult {
            provider_key: "openrouter".into(),
            healthy: true,
            latency_ms: Some(42),
            error: None,
        };
        assert!(provider_label(&openrouter(), Some(&ok)).ends_with("✔ 42ms"));

        let bad = HealthCheckResult {
            provider_key: "openrouter".into(),
            healthy: false,
            latency_ms: None,
            error: Some(ClassifiedError::new(ErrorCode::AuthInvalid, "HTTP 401")),
        };
        assert!(provider_label(&openrouter(), Some(&bad)).ends_with("✖ AUTH_INVALID"));
    }

    #[test]
    fn test_model_label() {
        assert_eq!(model_label(&Model::discovered("llama3:8b")), "llama3:8b");

        let model = Model {
            id: "anthropic/claude-sonnet-4.5".into(),
            name: "Claude Sonnet 4.5".into(),
            shortcut: "sonnet".into(),
        };
        let label = model_label(&model);
        assert!(label.starts_with("sonnet"));
        assert!(label.ends_with("anthropic/claude-sonnet-4.5"));
    }
}
