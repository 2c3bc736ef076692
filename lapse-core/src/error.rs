//! Error types for the LAPSE core library.

use thiserror::Error;

use crate::clock::TimeUnit;

/// Top-level error type for LAPSE core operations.
///
/// Every variant is a configuration mistake caught at the call that made it.
/// Expiry itself is never an error: an expired entry is simply absent.
#[derive(Error, Debug)]
pub enum LapseError {
    /// A lifespan was required but the given amount does not describe one.
    #[error("Lifespan must be positive, got {amount} {unit}")]
    InvalidLifespan {
        /// Amount as supplied by the caller.
        amount: i64,
        /// Unit the amount was expressed in.
        unit: TimeUnit,
    },

    /// A scheduling interval was zero.
    #[error("Interval for {what} must be at least one tick")]
    InvalidInterval {
        /// Which interval was rejected.
        what: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, LapseError>;
