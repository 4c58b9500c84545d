// ─────────────────────────────────────────────────────────────────────
// Polarity Homeostat — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all homeostat failures.
///
/// Only configuration and numeric divergence terminate a run. Conditions
/// that are recoverable within a tick (too few oscillation samples, gates
/// disagreeing) are states, not errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomeostatError {
    /// Malformed or out-of-range configuration. Raised before the first tick.
    #[error("config error: {0}")]
    Config(String),

    /// State became non-finite during integration.
    #[error("numeric divergence after tick {tick}: {detail}")]
    NumericDivergence { tick: u64, detail: String },

    /// Invalid input at an API seam (length or shape mismatch).
    #[error("validation error: {0}")]
    Validation(String),
}

pub type HomeostatResult<T> = Result<T, HomeostatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divergence_message_names_tick() {
        let err = HomeostatError::NumericDivergence {
            tick: 42,
            detail: "V[3] = NaN".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("V[3]"));
    }

    #[test]
    fn test_config_message() {
        let err = HomeostatError::Config("dt must be > 0".into());
        assert_eq!(err.to_string(), "config error: dt must be > 0");
    }
}
