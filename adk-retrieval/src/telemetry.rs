//! Subscriber setup for binaries and tests embedding the retrieval engine.
//!
//! Library components never install a subscriber; they emit events into the
//! span handed to them with `with_span`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::{Result, RetrievalError};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryFormat {
    #[default]
    Text,
    Json,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, or `default_level` when unset.
///
/// # Errors
///
/// Returns [`RetrievalError::ConfigError`] if a global subscriber is already set.
pub fn init_tracing(default_level: &str, format: TelemetryFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        TelemetryFormat::Text => builder.try_init(),
        TelemetryFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| RetrievalError::ConfigError(format!("failed to init tracing: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        // Whichever call runs first in this process wins; the next must report an error.
        let _ = init_tracing("debug", TelemetryFormat::Text);
        assert!(init_tracing("info", TelemetryFormat::Json).is_err());
    }

    #[test]
    fn format_names() {
        assert_eq!(serde_json::to_string(&TelemetryFormat::Json).unwrap(), "\"json\"");
        assert_eq!(TelemetryFormat::default(), TelemetryFormat::Text);
    }
}
