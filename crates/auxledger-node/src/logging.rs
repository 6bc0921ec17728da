//! Tracing subscriber setup shared by the ledger binaries.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use auxledger_core::error::LedgerError;

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `level_str` when set. `format` is `"json"` for
/// structured output; anything else selects the human-readable layer.
/// Fails if a global subscriber is already installed.
pub fn init_logging(level_str: &str, format: &str) -> Result<(), LedgerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    let result = if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .try_init()
    };
    result.map_err(|e| LedgerError::Config(format!("logging: {e}")))
}
