// src/logging.rs

//! Logging setup for `pipedag` using `tracing` + `tracing-subscriber`.
//!
//! The subscriber is driven by an [`EnvFilter`]: an explicit `--log-level`
//! wins, otherwise directives come from the `PIPEDAG_LOG` environment
//! variable, otherwise everything defaults to `info`. Because the variable
//! holds filter directives rather than a bare level, per-module filtering
//! like `PIPEDAG_LOG=pipedag::engine=debug` works too.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "PIPEDAG_LOG";

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; a second call panics inside `init()`.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level.as_directive()),
        None => EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt().with_env_filter(filter).with_target(true).init();

    Ok(())
}
