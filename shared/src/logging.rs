//! Shared logging utilities for consistent tracing across the harness

use tracing::info;

/// Default per-crate filter used when `RUST_LOG` is not set
pub fn default_filter(level: &str) -> String {
    format!("tester={level},shared={level},bollard=warn,aws_config=warn,aws_smithy_runtime=warn,hyper=warn,reqwest=warn")
}

/// Initialize tracing subscriber with the given base log level
///
/// `RUST_LOG` takes precedence when present. Safe to call more than once:
/// later calls are ignored, which lets every integration test opt in.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Initialize tracing at `debug` when verbose, `info` otherwise
pub fn init_tracing_verbose(verbose: bool) {
    init_tracing(if verbose { "debug" } else { "info" });
}

/// Macro for resource-aware info logging
#[macro_export]
macro_rules! resource_info {
    ($resource:expr, $($arg:tt)*) => {
        tracing::info!(resource = %$resource, $($arg)*);
    };
}

/// Macro for resource-aware warning logging
#[macro_export]
macro_rules! resource_warn {
    ($resource:expr, $($arg:tt)*) => {
        tracing::warn!(resource = %$resource, $($arg)*);
    };
}

/// Macro for resource-aware debug logging
#[macro_export]
macro_rules! resource_debug {
    ($resource:expr, $($arg:tt)*) => {
        tracing::debug!(resource = %$resource, $($arg)*);
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(resource: &str, details: &str) {
    info!(resource = %resource, "🚀 Starting {}", details);
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(resource: &str, reason: &str) {
    info!(resource = %resource, "🛑 Shutting down: {}", reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_scopes_harness_crates() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("tester=debug,shared=debug"));
        assert!(filter.contains("bollard=warn"));
    }

    #[test]
    fn test_init_tracing_is_repeatable() {
        init_tracing("info");
        init_tracing("debug");
        init_tracing_verbose(true);
    }
}
