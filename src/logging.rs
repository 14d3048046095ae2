//! Tracing subscriber setup.
//!
//! Logs go to stderr: stdout carries JSON results and the MCP stdio
//! transport. `RUST_LOG` wins when set; otherwise the filter is
//! `pageindex=info`, or `pageindex=debug` with `--verbose` /
//! `PAGEINDEX_VERBOSE=1`.

use tracing_subscriber::EnvFilter;

pub const VERBOSE_ENV: &str = "PAGEINDEX_VERBOSE";

/// Installs the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let verbose = verbose || env_flag();
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(default_directives(verbose)),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "pageindex=debug"
    } else {
        "pageindex=info"
    }
}

/// `PAGEINDEX_VERBOSE` parsed as a boolean flag.
pub fn env_flag() -> bool {
    std::env::var(VERBOSE_ENV)
        .map(|value| parse_bool(&value))
        .unwrap_or(false)
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
