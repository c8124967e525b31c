//! Tracing bootstrap for the demo binary.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,chatsim=info,chat_runtime=info,chat_core=info,chat_mock=info";

/// Initialize the global tracing subscriber with severity gating from the environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `CHATSIM_LOG`
/// 3) internal default filter
///
/// Logs go to stderr; stdout carries the rendered screens.
pub fn init() {
    let env_filter = filter_from_env();
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(value) = env::var("CHATSIM_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(value)
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
