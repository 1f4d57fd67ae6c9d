//! Command-line surface.
//!
//! ```text
//! claunch [PROVIDER] [MODEL] [MODE] [PROMPT] [-y] [-l] [-p TEXT] [--debug]
//! claunch models [PROVIDER] [--refresh]
//! claunch health [PROVIDER]
//! claunch config show | path | init [--force] | set-default <PROVIDER> [MODEL]
//! claunch completions <SHELL>
//! ```
//!
//! Listings go to stdout; logs and error reports go to stderr.

use anyhow::{Context as _, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use futures::future::join_all;
use std::io;
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::context::Context;
use crate::error::{classify_anyhow, ClassifiedError, ErrorCode};
use crate::health::HealthCheckResult;
use crate::interactive;
use crate::launcher::{AgentRunner, LaunchError, Launcher};
use crate::providers::resolver::Resolution;
use crate::providers::{DiscoveryMode, Model, Provider};

const MODE_SKIP_PERMISSIONS: &str = "yolo";
const MODE_DEFAULT: &str = "default";

#[derive(Parser, Debug)]
#[command(
    name = "claunch",
    author,
    version,
    about = "Launch the Claude coding agent against any Anthropic-compatible provider",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub launch: LaunchArgs,

    /// Verbose logs and full error causes (also CLAUNCH_DEBUG=1)
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Args, Debug, Default)]
pub struct LaunchArgs {
    /// Provider key or alias (a, or, z, ds, ol, oc)
    pub provider: Option<String>,

    /// Model shortcut, display name or id
    pub model: Option<String>,

    /// `yolo` to skip permission prompts, `default` otherwise
    pub mode: Option<String>,

    /// Run headless with this prompt
    #[arg(value_name = "PROMPT")]
    pub prompt_arg: Option<String>,

    /// Skip permission prompts in the agent
    #[arg(short = 'y', long)]
    pub skip_permissions: bool,

    /// List the provider's models instead of launching
    #[arg(short, long)]
    pub list: bool,

    /// Run headless with this prompt
    #[arg(short = 'p', long = "prompt", value_name = "TEXT")]
    pub headless: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List models for one provider, or all of them
    Models {
        provider: Option<String>,
        /// Fetch live even when cached or offline
        #[arg(long)]
        refresh: bool,
    },
    /// Probe provider reachability and auth
    Health { provider: Option<String> },
    /// Inspect or edit the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print a shell completion script
    Completions { shell: Shell },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective config
    Show,
    /// Print the config file location
    Path,
    /// Write a config file with default values
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Remember a provider (and optionally a model) as the default
    SetDefault {
        provider: String,
        model: Option<String>,
    },
}

/// How the agent should run, folded from MODE, PROMPT and the flags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchMode {
    pub skip_permissions: bool,
    pub headless_prompt: Option<String>,
}

impl LaunchArgs {
    /// A MODE word that is neither `yolo` nor `default` is taken as the
    /// prompt, so `claunch or sonnet "fix the tests"` runs headless.
    pub fn launch_mode(&self) -> LaunchMode {
        let (yolo, stray_prompt) = match self.mode.as_deref() {
            Some(MODE_SKIP_PERMISSIONS) => (true, None),
            Some(MODE_DEFAULT) | None => (false, None),
            Some(other) => (false, Some(other.to_string())),
        };
        LaunchMode {
            skip_permissions: self.skip_permissions || yolo,
            headless_prompt: self
                .headless
                .clone()
                .or_else(|| self.prompt_arg.clone())
                .or(stray_prompt),
        }
    }
}

// ── Dispatch ────────────────────────────────────────────────────────

/// Run the parsed command. Returns the process exit code on success.
pub async fn run(cli: Cli, ctx: &Context) -> Result<i32> {
    match cli.command {
        Some(Command::Models { provider, refresh }) => {
            list_models(ctx, provider.as_deref(), refresh).await
        }
        Some(Command::Health { provider }) => health(ctx, provider.as_deref()).await,
        Some(Command::Config { action }) => config(ctx, action),
        Some(Command::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "claunch", &mut io::stdout());
            Ok(0)
        }
        None if cli.launch.list => list_models(ctx, cli.launch.provider.as_deref(), false).await,
        None => {
            let launcher = ctx.launcher();
            launch(ctx, &launcher, cli.launch, interactive::is_interactive()).await
        }
    }
}

// ── Launch ──────────────────────────────────────────────────────────

pub async fn launch<R: AgentRunner>(
    ctx: &Context,
    launcher: &Launcher<R>,
    args: LaunchArgs,
    interactive: bool,
) -> Result<i32> {
    let settings = ctx.settings();
    let mode = args.launch_mode();

    let (provider, picked) = match args.provider.as_deref() {
        Some(key) => (ctx.require_provider(key)?, false),
        None if interactive => (interactive::pick_provider(ctx).await?, true),
        None => match settings.default_provider.as_deref() {
            Some(key) => (ctx.require_provider(key)?, false),
            None => {
                return Err(ClassifiedError::new(
                    ErrorCode::ProviderNotFound,
                    "No provider given and no defaultProvider configured",
                )
                .into())
            }
        },
    };

    let default_model = if picked {
        None
    } else {
        configured_model_for(ctx, &settings, &provider)
    };
    let model_input = match (args.model, default_model) {
        (Some(model), _) | (None, Some(model)) => model,
        (None, None) if interactive => interactive::pick_model(ctx, &provider).await?,
        (None, None) => {
            return Err(ClassifiedError::new(
                ErrorCode::ModelNotFound,
                format!("No model given for provider `{}`", provider.key()),
            )
            .into())
        }
    };

    let model_id = match ctx.resolve_model(&provider, &model_input).await {
        Resolution::Resolved(id) => id,
        Resolution::PassThrough(id) => {
            info!(provider = %provider.key(), model = %id, "Model not in list; passing id through");
            id
        }
    };

    let opts = ctx.launch_options(mode.skip_permissions, mode.headless_prompt);
    launcher.launch(&provider, &model_id, &opts).await?;
    Ok(0)
}

/// `defaultModel` applies only when `defaultProvider` names this provider.
fn configured_model_for(ctx: &Context, settings: &Config, provider: &Provider) -> Option<String> {
    let default_key = settings.default_provider.as_deref()?;
    let default_provider = ctx.registry.get_provider(default_key)?;
    if default_provider.key() == provider.key() {
        settings.default_model.clone()
    } else {
        None
    }
}

// ── Models ──────────────────────────────────────────────────────────

async fn list_models(ctx: &Context, provider: Option<&str>, refresh: bool) -> Result<i32> {
    let providers: Vec<Provider> = match provider {
        Some(key) => vec![ctx.require_provider(key)?],
        None => ctx.registry.providers().values().cloned().collect(),
    };

    let listings = join_all(providers.iter().map(|p| async move {
        if refresh {
            ctx.discovery.refresh(p).await
        } else {
            Ok(ctx.get_models(p).await)
        }
    }))
    .await;

    let mut failed = false;
    for (provider, listing) in providers.iter().zip(listings) {
        let (models, error) = match listing {
            Ok(models) => {
                let error = if models.is_empty() {
                    ctx.discovery.last_error(provider.key())
                } else {
                    None
                };
                (models, error)
            }
            Err(err) => (Vec::new(), Some(err)),
        };
        failed |= error.is_some();
        print!("{}", format_listing(provider, &models, error.as_ref()));
    }
    Ok(if failed && provider.is_some() { 1 } else { 0 })
}

pub fn format_listing(provider: &Provider, models: &[Model], error: Option<&ClassifiedError>) -> String {
    let mode = match provider.discovery() {
        DiscoveryMode::Static => "static",
        DiscoveryMode::DynamicApi => "discovered",
    };
    let mut out = format!(
        "{} ({}, {})  {}\n",
        provider.key(),
        provider.display_name(),
        mode,
        provider.description()
    );

    if models.is_empty() {
        match error {
            Some(err) => {
                out.push_str(&format!("  no models: {}\n", err.message()));
                if let Some(hint) = err.hint() {
                    out.push_str(&format!("  hint: {}\n", hint));
                }
            }
            None => out.push_str("  no models\n"),
        }
    }
    for model in models {
        if model.shortcut == model.id {
            out.push_str(&format!("  {}\n", model.id));
        } else {
            out.push_str(&format!("  {:<10} {:<36} {}\n", model.shortcut, model.id, model.name));
        }
    }
    out
}

// ── Health ──────────────────────────────────────────────────────────

async fn health(ctx: &Context, provider: Option<&str>) -> Result<i32> {
    let results = match provider {
        Some(key) => vec![ctx.check_health(&ctx.require_provider(key)?).await],
        None => ctx.check_all_providers().await,
    };
    for result in &results {
        println!("{}", format_health(result));
    }
    Ok(if results.iter().all(|r| r.healthy) { 0 } else { 1 })
}

pub fn format_health(result: &HealthCheckResult) -> String {
    let latency = result
        .latency_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string());
    match &result.error {
        None if result.healthy => format!("✔ {:<14} {:>7}", result.provider_key, latency),
        None => format!("✖ {:<14} {:>7}", result.provider_key, latency),
        Some(err) => format!(
            "✖ {:<14} {:>7}  {}  {}",
            result.provider_key,
            latency,
            err.code(),
            err.message()
        ),
    }
}

// ── Config ──────────────────────────────────────────────────────────

fn config(ctx: &Context, action: ConfigAction) -> Result<i32> {
    let path = ctx.config.path().display().to_string();
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(ctx.settings().as_ref())
                .context("Failed to serialize config")?;
            println!("{}", json);
        }
        ConfigAction::Path => println!("{}", path),
        ConfigAction::Init { force } => {
            if ctx.config.init(force)? {
                println!("Wrote {}", path);
            } else {
                println!("{} already exists (use --force to overwrite)", path);
            }
        }
        ConfigAction::SetDefault { provider, model } => {
            let key = ctx.require_provider(&provider)?.key().to_string();
            debug!(provider = %key, model = ?model, "Updating defaults");
            ctx.config.update(|c| {
                c.default_provider = Some(key.clone());
                c.default_model = model.clone();
            })?;
            match &model {
                Some(model) => println!("Default set to {} / {}", key, model),
                None => println!("Default provider set to {}", key),
            }
        }
    }
    Ok(0)
}

// ── Error Report ────────────────────────────────────────────────────

/// Classified view of a failed command and the exit code to use.
pub fn describe_failure(err: anyhow::Error) -> (ClassifiedError, i32) {
    if let Some(launch) = err.downcast_ref::<LaunchError>() {
        (launch.classified(), launch.exit_code())
    } else if let Some(classified) = err.downcast_ref::<ClassifiedError>() {
        (classified.clone(), 1)
    } else if let Some(config) = err.downcast_ref::<ConfigError>() {
        let code = match config {
            ConfigError::Parse { .. } => ErrorCode::ConfigParseError,
            ConfigError::Read { .. } => ErrorCode::Unknown,
        };
        (ClassifiedError::new(code, config.to_string()), 1)
    } else {
        (classify_anyhow(err), 1)
    }
}

/// Print the failure to stderr and return the exit code.
pub fn report_failure(err: anyhow::Error, debug: bool) -> i32 {
    let context_chain: Vec<String> = err.chain().skip(1).map(|c| c.to_string()).collect();
    let (classified, code) = describe_failure(err);
    eprintln!("✖ {}", classified.message());
    if let Some(hint) = classified.hint() {
        eprintln!("  hint: {}", hint);
    }
    if debug {
        eprintln!("  code: {}", classified.code());
        let causes = if context_chain.is_empty() {
            classified.cause_chain()
        } else {
            context_chain
        };
        for cause in causes.iter().filter(|c| c.as_str() != classified.message()) {
            eprintln!("  caused by: {}", cause);
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::Invocation;
    use async_trait::async_trait;
    use serial_test::serial;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_positional_launch() {
        let cli = parse(&["claunch", "or", "sonnet", "yolo"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.launch.provider.as_deref(), Some("or"));
        assert_eq!(cli.launch.model.as_deref(), Some("sonnet"));
        assert_eq!(
            cli.launch.launch_mode(),
            LaunchMode {
                skip_permissions: true,
                headless_prompt: None
            }
        );
    }

    #[test]
    fn test_mode_word_falls_back_to_prompt() {
        let cli = parse(&["claunch", "or", "sonnet", "fix the tests"]);
        let mode = cli.launch.launch_mode();
        assert!(!mode.skip_permissions);
        assert_eq!(mode.headless_prompt.as_deref(), Some("fix the tests"));

        let cli = parse(&["claunch", "or", "sonnet", "default", "write docs"]);
        assert_eq!(cli.launch.launch_mode().headless_prompt.as_deref(), Some("write docs"));
    }

    #[test]
    fn test_prompt_flag_wins_over_positional() {
        let cli = parse(&["claunch", "ds", "chat", "yolo", "positional", "-p", "flag"]);
        let mode = cli.launch.launch_mode();
        assert!(mode.skip_permissions);
        assert_eq!(mode.headless_prompt.as_deref(), Some("flag"));
    }

    #[test]
    fn test_parse_subcommands() {
        match parse(&["claunch", "models", "ol", "--refresh"]).command {
            Some(Command::Models { provider, refresh }) => {
                assert_eq!(provider.as_deref(), Some("ol"));
                assert!(refresh);
            }
            other => panic!("unexpected {:?}", other),
        }

        match parse(&["claunch", "config", "set-default", "or", "opus"]).command {
            Some(Command::Config {
                action: ConfigAction::SetDefault { provider, model },
            }) => {
                assert_eq!(provider, "or");
                assert_eq!(model.as_deref(), Some("opus"));
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(parse(&["claunch", "health", "--debug"]).debug);
        assert!(matches!(
            parse(&["claunch", "completions", "zsh"]).command,
            Some(Command::Completions { shell: Shell::Zsh })
        ));
    }

    #[test]
    fn test_format_health() {
        let ok = HealthCheckResult {
            provider_key: "ollama-local".into(),
            healthy: true,
            latency_ms: Some(12),
            error: None,
        };
        assert!(format_health(&ok).starts_with("✔ ollama-local"));
        assert!(format_health(&ok).contains("12ms"));

        let bad = HealthCheckResult {
            provider_key: "zai".into(),
            healthy: false,
            latency_ms: None,
            error: Some(ClassifiedError::new(ErrorCode::ConnectionTimeout, "timed out")),
        };
        let line = format_health(&bad);
        assert!(line.starts_with("✖ zai"));
        assert!(line.contains("CONNECTION_TIMEOUT"));
    }

    #[test]
    fn test_format_listing_explains_empty_list() {
        let provider = crate::providers::builtin::get_builtin("ollama-local")
            .unwrap()
            .to_provider();
        let err = crate::error::classify_message("connect ECONNREFUSED 127.0.0.1:11434");
        let out = format_listing(&provider, &[], Some(&err));
        assert!(out.contains("no models"));
        assert!(out.contains("hint:"));

        let out = format_listing(&provider, &[Model::discovered("llama3:8b")], None);
        assert!(out.contains("  llama3:8b\n"));
    }

    #[test]
    fn test_describe_failure_exit_codes() {
        let err = anyhow::Error::from(LaunchError::Exited {
            program: "claude".into(),
            exit_code: Some(7),
        });
        let (classified, code) = describe_failure(err);
        assert_eq!(classified.code(), ErrorCode::ProcessFailed);
        assert_eq!(code, 7);

        let err = anyhow::Error::from(ClassifiedError::new(ErrorCode::AuthMissing, "no token"))
            .context("launching");
        let (classified, code) = describe_failure(err);
        assert_eq!(classified.code(), ErrorCode::AuthMissing);
        assert_eq!(code, 1);

        let (classified, _) = describe_failure(anyhow::anyhow!("something weird happened"));
        assert_eq!(classified.code(), ErrorCode::Unknown);
    }

    #[test]
    fn test_unrecognised_failure_keeps_its_chain() {
        let err = anyhow::Error::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk on fire",
        ))
        .context("writing settings");

        let (classified, code) = describe_failure(err);
        assert_eq!(code, 1);
        assert_eq!(classified.code(), ErrorCode::Unknown);
        assert!(classified.message().contains("writing settings: disk on fire"));
        assert!(classified.cause().is_some());
        assert_eq!(
            classified.cause_chain(),
            vec!["writing settings".to_string(), "disk on fire".to_string()]
        );
    }

    // ── Launch flow ────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingRunner {
        seen: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl AgentRunner for RecordingRunner {
        async fn run(&self, invocation: &Invocation) -> Result<Option<i32>, ClassifiedError> {
            self.seen.lock().unwrap().push(invocation.clone());
            Ok(Some(0))
        }
    }

    fn fake_binary(dir: &TempDir) -> String {
        let path = dir.path().join("claude");
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    #[serial]
    async fn test_launch_resolves_alias_and_shortcut() {
        std::env::set_var("OPENROUTER_AUTH_TOKEN", "or-token");
        std::env::remove_var("OPENROUTER_BASE_URL");
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());
        let launcher = Launcher::with_runner(fake_binary(&dir), RecordingRunner::default());

        let cli = parse(&["claunch", "or", "sonnet", "yolo"]);
        let code = launch(&ctx, &launcher, cli.launch, false).await.unwrap();
        assert_eq!(code, 0);

        let seen = launcher_invocations(&launcher);
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].args,
            vec!["--model", "anthropic/claude-sonnet-4.5", "--dangerously-skip-permissions"]
        );
        assert!(seen[0]
            .env
            .contains(&("ANTHROPIC_BASE_URL".into(), "https://openrouter.ai/api".into())));
        std::env::remove_var("OPENROUTER_AUTH_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn test_launch_uses_configured_defaults() {
        std::env::set_var("DEEPSEEK_AUTH_TOKEN", "ds-token");
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());
        ctx.config
            .update(|c| {
                c.default_provider = Some("ds".into());
                c.default_model = Some("reasoner".into());
            })
            .unwrap();
        let launcher = Launcher::with_runner(fake_binary(&dir), RecordingRunner::default());

        launch(&ctx, &launcher, LaunchArgs::default(), false).await.unwrap();

        let seen = launcher_invocations(&launcher);
        assert_eq!(seen[0].args, vec!["--model", "deepseek-reasoner"]);
        std::env::remove_var("DEEPSEEK_AUTH_TOKEN");
    }

    #[tokio::test]
    async fn test_launch_without_provider_or_default_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());
        let launcher = Launcher::with_runner(fake_binary(&dir), RecordingRunner::default());

        let err = launch(&ctx, &launcher, LaunchArgs::default(), false)
            .await
            .unwrap_err();
        assert_eq!(describe_failure(err).0.code(), ErrorCode::ProviderNotFound);
    }

    #[tokio::test]
    async fn test_launch_without_model_fails_when_not_interactive() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::open(dir.path());
        let launcher = Launcher::with_runner(fake_binary(&dir), RecordingRunner::default());

        let cli = parse(&["claunch", "z"]);
        let err = launch(&ctx, &launcher, cli.launch, false).await.unwrap_err();
        assert_eq!(describe_failure(err).0.code(), ErrorCode::ModelNotFound);
        assert!(launcher_invocations(&launcher).is_empty());
    }

    fn launcher_invocations(launcher: &Launcher<RecordingRunner>) -> Vec<Invocation> {
        launcher.runner().seen.lock().unwrap().clone()
    }
}
