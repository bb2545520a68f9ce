//! Interop error types

use thiserror::Error;

/// Errors raised while crossing the host/script boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InteropError {
    /// No candidate of an overload set accepted the call-site arguments
    #[error("NoViableOverload: no viable overload for '{member}'")]
    NoViableOverload {
        /// Exposed member name
        member: String,
    },

    /// Every ranked candidate was invoked and the last one failed
    #[error("InvocationFailure: '{member}' failed: {message}")]
    InvocationFailure {
        /// Exposed member name
        member: String,
        /// Message of the last underlying failure
        message: String,
    },

    /// A value could not cross the boundary
    #[error("ConversionFailure: {0}")]
    ConversionFailure(String),

    /// Nested conversion went deeper than the configured limit
    #[error("ConversionFailure: maximum conversion depth {0} exceeded")]
    MaxDepthExceeded(usize),

    /// Type error surfaced to the script
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Failure raised by host code
    #[error("{0}")]
    Host(String),

    /// Exception thrown by a script function called from the host
    #[error("Uncaught exception: {0}")]
    ScriptException(String),

    /// Engine-level failure (released handle, wrong value kind)
    #[error("EngineError: {0}")]
    Engine(String),
}

impl InteropError {
    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    /// Create a host failure
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    /// Create a conversion failure
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::ConversionFailure(message.into())
    }

    /// Create an engine failure
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    /// Create a "no viable overload" error for a member
    pub fn no_viable_overload(member: impl Into<String>) -> Self {
        Self::NoViableOverload {
            member: member.into(),
        }
    }

    /// Whether the error is fatal to the current call.
    ///
    /// Conversion failures abort overload fallback instead of moving on to
    /// the next ranked candidate.
    pub fn is_conversion_failure(&self) -> bool {
        matches!(self, Self::ConversionFailure(_) | Self::MaxDepthExceeded(_))
    }

    /// The message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            Self::NoViableOverload { member } => format!("no viable overload for '{member}'"),
            Self::InvocationFailure { message, .. } => message.clone(),
            Self::ConversionFailure(message)
            | Self::TypeError(message)
            | Self::Host(message)
            | Self::ScriptException(message)
            | Self::Engine(message) => message.clone(),
            Self::MaxDepthExceeded(depth) => format!("maximum conversion depth {depth} exceeded"),
        }
    }
}

/// Result type for interop operations
pub type InteropResult<T> = Result<T, InteropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_member_name() {
        let err = InteropError::InvocationFailure {
            member: "add".to_string(),
            message: "overflow".to_string(),
        };
        assert_eq!(err.to_string(), "InvocationFailure: 'add' failed: overflow");
        assert_eq!(err.message(), "overflow");
    }

    #[test]
    fn test_conversion_failures_are_fatal() {
        assert!(InteropError::conversion("bad").is_conversion_failure());
        assert!(InteropError::MaxDepthExceeded(20).is_conversion_failure());
        assert!(!InteropError::host("boom").is_conversion_failure());
    }
}
