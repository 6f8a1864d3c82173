//! # Error Types
//!
//! Errors raised while constructing the foundational types. Every variant
//! keeps the offending input so callers can report it verbatim.

use thiserror::Error;

/// Error constructing or parsing a core type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The string is not one of the seven registration statuses.
    ///
    /// The message lists the accepted values in canonical order; it is
    /// returned to clients unchanged.
    #[error("status must be one of new,approved,partially paid,paid,checked in,cancelled,deleted")]
    UnknownStatus {
        /// The rejected input.
        value: String,
    },

    /// Attendee ids are positive integers.
    #[error("invalid attendee id {value:?}: must be a positive integer")]
    InvalidAttendeeId {
        /// The rejected input.
        value: String,
    },

    /// Login subjects must be non-blank.
    #[error("invalid subject: must not be blank")]
    BlankSubject,

    /// Currency codes are three uppercase ASCII letters (ISO 4217).
    #[error("invalid currency code {value:?}: expected three uppercase letters")]
    InvalidCurrency {
        /// The rejected input.
        value: String,
    },

    /// Timestamp could not be parsed or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
