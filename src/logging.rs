//! Logging setup for the command-line tool.
//!
//! Structured `tracing` output on stderr, filtered by `RUST_LOG` (default
//! `info`). Stage spans are reported when they close so each phase shows its
//! duration.

use std::io;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor an explicit directive is given.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter: an explicit directive wins over `RUST_LOG`.
#[must_use]
pub fn env_filter(directive: Option<&str>) -> EnvFilter {
    match directive {
        Some(d) => EnvFilter::new(d),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns [`TryInitError`] if a global subscriber is already set.
pub fn init_logging(directive: Option<&str>) -> Result<(), TryInitError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter(directive))
        .with(stderr_layer)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_directive_wins() {
        assert_eq!(env_filter(Some("geomosaic=debug")).to_string(), "geomosaic=debug");
    }

    #[test]
    fn test_second_init_fails_cleanly() {
        let _ = init_logging(Some("warn"));
        assert!(init_logging(Some("warn")).is_err());
    }
}
