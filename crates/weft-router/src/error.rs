//! Route registration errors.

use thiserror::Error;

/// Errors raised while registering a route.
///
/// All of them are programming errors and surface at setup time, never
/// while serving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The pattern could not be compiled.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A custom group contains its own capturing group.
    #[error("route pattern {0:?} has a capturing group inside a parameter; use (?:...) instead")]
    NestedCapture(String),

    /// The method is neither a known HTTP verb nor a wildcard.
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),
}

impl RouteError {
    pub(crate) fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
