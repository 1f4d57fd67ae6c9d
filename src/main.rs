//! claunch binary entry point.

use clap::Parser;
use tracing::{debug, warn};

use claunch::cli::{self, Cli};
use claunch::config;
use claunch::env::{self, EnvFileLoad};
use claunch::Context;

const DEBUG_ENV_VAR: &str = "CLAUNCH_DEBUG";

#[tokio::main]
async fn main() {
    // ./.env first so it can set CLAUNCH_HOME.
    let mut env_loads = env::merge_env_files(env::working_dir_env_file());

    let cli = Cli::parse();

    let data_dir = match config::data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("✖ {:#}", e);
            std::process::exit(1);
        }
    };
    env_loads.extend(env::merge_env_files([env::data_dir_env_file(&data_dir)]));

    let debug = cli.debug || env_flag(DEBUG_ENV_VAR);
    init_tracing(debug);

    for load in &env_loads {
        match load {
            EnvFileLoad::Loaded(path) => debug!(path = %path.display(), "Merged .env file"),
            EnvFileLoad::Failed(path, e) => {
                warn!(path = %path.display(), "Ignoring unreadable .env file: {}", e)
            }
        }
    }
    debug!(data_dir = %data_dir.display(), "claunch v{}", env!("CARGO_PKG_VERSION"));

    let ctx = Context::open(data_dir);
    let code = match cli::run(cli, &ctx).await {
        Ok(code) => code,
        Err(err) => cli::report_failure(err, debug),
    };
    std::process::exit(code);
}

/// Structured logs to stderr; stdout is reserved for listings.
fn init_tracing(debug: bool) {
    let default = if debug { "claunch=debug" } else { "claunch=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
