//! Response-request error types.

use thiserror::Error;

use lapse_core::{LapseError, TimeUnit};

/// Errors raised when a request is submitted or a registry is built.
///
/// Timeouts, cancellations and ambiguous replies are not errors. They are
/// reported through [`crate::Outcome`] and [`crate::Interception`].
#[derive(Debug, Error)]
pub enum RespondError {
    /// The context name was empty or whitespace.
    #[error("Request context name must not be empty")]
    EmptyContextName,

    /// The request accepts no response kind, so it could only time out.
    #[error("Request '{context}' accepts no response kinds")]
    NoAcceptedKinds {
        /// Context of the rejected request.
        context: String,
    },

    /// The timeout does not describe a finite, positive duration.
    #[error("Request timeout must be positive, got {amount} {unit}")]
    InvalidTimeout {
        /// Amount as supplied.
        amount: i64,
        /// Unit of the amount.
        unit: TimeUnit,
    },

    /// The responder already has a pending request with this context name.
    #[error("A request named '{context}' is already pending for this responder")]
    DuplicateContext {
        /// The clashing context name.
        context: String,
    },

    /// Error from the core library.
    #[error(transparent)]
    Core(#[from] LapseError),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, RespondError>;
