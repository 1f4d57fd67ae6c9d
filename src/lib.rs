//! claunch — launch the Claude coding agent against any
//! Anthropic-compatible provider.
//!
//! Pieces:
//! - `providers` — built-in + custom provider registry, alias and model resolution
//! - `discovery` — live `/v1/models` fetch with memory and disk caches
//! - `health`    — concurrent reachability/auth probes
//! - `error`     — failure taxonomy, classifier, hints
//! - `launcher`  — environment assembly and agent process execution
//! - `config`    — `$CLAUNCH_HOME/config.json` store
//! - `cli`       — clap surface and command dispatch

pub mod cli;
pub mod config;
pub mod context;
pub mod discovery;
pub mod env;
pub mod error;
pub mod health;
pub mod interactive;
pub mod launcher;
pub mod providers;

pub use context::Context;
pub use error::{ClassifiedError, ErrorCode};
