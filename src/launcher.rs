//! Launcher — hands the resolved provider and model to the agent binary.
//!
//! The child gets three environment overrides:
//!
//!   ANTHROPIC_BASE_URL   = provider base URL
//!   ANTHROPIC_AUTH_TOKEN = provider token
//!   ANTHROPIC_API_KEY    = ""   (blanked so it cannot take precedence)
//!
//! and inherits stdin/stdout/stderr, so Ctrl-C reaches it directly. The
//! binary is located before anything is spawned; a missing binary is
//! reported as `BINARY_NOT_FOUND`, never as a spawn failure.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{classify_message, ClassifiedError, ErrorCode};
use crate::providers::Provider;

pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";
pub const ENV_LEGACY_API_KEY: &str = "ANTHROPIC_API_KEY";

pub const SKIP_PERMISSIONS_FLAG: &str = "--dangerously-skip-permissions";

// ── Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub skip_permissions: bool,
    /// Run non-interactively with this prompt.
    pub headless_prompt: Option<String>,
    /// Passed as `--allowedTools` in headless mode.
    pub allowed_tools: String,
}

/// Fully assembled process invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    /// Failed before or while spawning.
    #[error(transparent)]
    Preflight(#[from] ClassifiedError),
    /// The agent ran and exited unsuccessfully.
    #[error("{} exited with {}", .program, describe_exit(.exit_code))]
    Exited {
        program: String,
        exit_code: Option<i32>,
    },
}

impl LaunchError {
    pub fn classified(&self) -> ClassifiedError {
        match self {
            LaunchError::Preflight(err) => err.clone(),
            LaunchError::Exited { .. } => {
                ClassifiedError::new(ErrorCode::ProcessFailed, self.to_string())
            }
        }
    }

    /// Exit code to propagate from our own process.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaunchError::Exited {
                exit_code: Some(code),
                ..
            } => *code,
            _ => 1,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

// ── Runner ──────────────────────────────────────────────────────────

/// Executes an invocation to completion.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Returns the exit code, `None` when the child was killed by a signal.
    async fn run(&self, invocation: &Invocation) -> Result<Option<i32>, ClassifiedError>;
}

/// Spawns a real child process with inherited stdio.
pub struct ProcessRunner;

#[async_trait]
impl AgentRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<Option<i32>, ClassifiedError> {
        let status = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                let raw = format!("failed to spawn {}: {}", invocation.program.display(), e);
                // The program may have vanished since pre-flight, under any name.
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClassifiedError::new(
                        ErrorCode::BinaryNotFound,
                        format!("{}: {}", ErrorCode::BinaryNotFound.summary(), raw),
                    )
                    .with_cause(e)
                } else {
                    classify_message(&raw).with_cause(e)
                }
            })?;
        Ok(status.code())
    }
}

// ── Launcher ────────────────────────────────────────────────────────

pub struct Launcher<R = ProcessRunner> {
    binary: String,
    runner: R,
}

impl Launcher<ProcessRunner> {
    pub fn new(binary: impl Into<String>) -> Self {
        Self::with_runner(binary, ProcessRunner)
    }
}

impl<R: AgentRunner> Launcher<R> {
    pub fn with_runner(binary: impl Into<String>, runner: R) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Find the agent binary on PATH (or at the given path).
    pub fn locate_binary(&self) -> Result<PathBuf, ClassifiedError> {
        which::which(&self.binary).map_err(|e| {
            ClassifiedError::new(
                ErrorCode::BinaryNotFound,
                format!("{}: `{}` not found on PATH", ErrorCode::BinaryNotFound.summary(), self.binary),
            )
            .with_cause(e)
        })
    }

    /// Pre-flight checks plus argument/env assembly. Nothing is spawned.
    pub fn prepare(
        &self,
        provider: &Provider,
        model_id: &str,
        opts: &LaunchOptions,
    ) -> Result<Invocation, ClassifiedError> {
        let program = self.locate_binary()?;

        let token = provider.auth_token();
        if token.is_none() && provider.requires_auth() {
            return Err(ClassifiedError::new(
                ErrorCode::AuthMissing,
                format!(
                    "{} for provider `{}`",
                    ErrorCode::AuthMissing.summary(),
                    provider.key()
                ),
            ));
        }

        Ok(Invocation {
            program,
            args: build_args(model_id, opts),
            env: build_env(&provider.base_url(), token.as_deref().unwrap_or("")),
        })
    }

    /// Run the agent. `Ok` only when it exits with code 0.
    pub async fn launch(
        &self,
        provider: &Provider,
        model_id: &str,
        opts: &LaunchOptions,
    ) -> Result<(), LaunchError> {
        let invocation = self.prepare(provider, model_id, opts)?;

        info!(
            provider = %provider.key(),
            model = %model_id,
            headless = opts.headless_prompt.is_some(),
            "🚀 Launching {}",
            invocation.program.display()
        );
        debug!(args = ?invocation.args, "Agent arguments");

        match self.runner.run(&invocation).await? {
            Some(0) => Ok(()),
            exit_code => Err(LaunchError::Exited {
                program: self.binary.clone(),
                exit_code,
            }),
        }
    }
}

/// `--model <id>`, then optional permission skip and headless flags.
pub fn build_args(model_id: &str, opts: &LaunchOptions) -> Vec<String> {
    let mut args = vec!["--model".to_string(), model_id.to_string()];
    if opts.skip_permissions {
        args.push(SKIP_PERMISSIONS_FLAG.to_string());
    }
    if let Some(prompt) = &opts.headless_prompt {
        args.push("-p".to_string());
        args.push(prompt.clone());
        if !opts.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(opts.allowed_tools.clone());
        }
    }
    args
}

pub fn build_env(base_url: &str, auth_token: &str) -> Vec<(String, String)> {
    vec![
        (ENV_BASE_URL.to_string(), base_url.to_string()),
        (ENV_AUTH_TOKEN.to_string(), auth_token.to_string()),
        (ENV_LEGACY_API_KEY.to_string(), String::new()),
    ]
}
