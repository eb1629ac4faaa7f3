//! Error taxonomy for effect estimation
//!
//! Precondition failures are reported before any model is invoked. Graph
//! transform failures are hard errors: falling back to the deterministic
//! model would yield zero-variance samples and meaningless p-values.
//! Non-finite statistics are not errors; they flow into the result tables.

use thiserror::Error;

/// Errors that can occur while estimating variant effects
#[derive(Error, Debug)]
pub enum EffectError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Invalid model configuration: {0}")]
    Config(String),

    #[error("Unknown layer class '{0}' (not registered)")]
    UnknownLayer(String),

    #[error("Weight mismatch: {0}")]
    WeightShape(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for effect estimation operations
pub type Result<T> = std::result::Result<T, EffectError>;

impl EffectError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EffectError::InvalidArgument(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        EffectError::Config(msg.into())
    }

    pub(crate) fn shape(what: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        EffectError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = EffectError::shape("alt batch", &[2, 10, 4], &[3, 10, 4]);
        let msg = err.to_string();
        assert!(msg.contains("alt batch"));
        assert!(msg.contains("[2, 10, 4]"));
        assert!(msg.contains("[3, 10, 4]"));
    }

    #[test]
    fn test_json_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: EffectError = parse.unwrap_err().into();
        assert!(matches!(err, EffectError::Json(_)));
    }
}
