//! # Service Error
//!
//! Every failure the registration service can report, with the HTTP
//! status and stable error code a boundary layer renders for it.
//!
//! | Variant              | Status | Code                                |
//! |----------------------|--------|-------------------------------------|
//! | `Validation`         | 400    | per field (`status.data.invalid`, …) |
//! | `Unauthenticated`    | 401    | `auth.unauthorized`                 |
//! | `Forbidden`          | 403    | `auth.forbidden`                    |
//! | `NotFound`           | 404    | `attendee.id.notfound`              |
//! | `Conflict`           | 409    | the policy's conflict code          |
//! | `Duplicate`          | 409    | `attendee.data.duplicate`           |
//! | `Downstream`         | 502    | `downstream.<service>.error`        |
//! | `NotificationFailed` | 502    | `downstream.mail.error`             |
//! | `Persistence`        | 500    | `storage.error`                     |

use thiserror::Error;

use attreg_core::AttendeeId;
use attreg_ledger::{MailError, PaymentError};
use attreg_state::{ConflictCode, StatusChange, FORBIDDEN_MESSAGE};

use crate::repository::RepositoryError;

/// Message for callers who are not logged in.
pub const UNAUTHENTICATED_MESSAGE: &str = "you must be logged in for this operation";

/// Message for callers reading data they may not see.
pub const FORBIDDEN_DATA_MESSAGE: &str =
    "you are not authorized to access this data - the attempt has been logged";

/// Message for callers invoking an operation reserved for others.
pub const FORBIDDEN_OPERATION_MESSAGE: &str =
    "you are not authorized for this operation - the attempt has been logged";

/// Errors returned by the registration service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed input.
    #[error("{message}")]
    Validation {
        /// Field-specific error code.
        code: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// No auth claims were supplied.
    #[error("you must be logged in for this operation")]
    Unauthenticated,

    /// The caller's role does not permit the operation.
    #[error("{message}")]
    Forbidden {
        /// Fixed message for the kind of operation attempted.
        message: &'static str,
    },

    /// The attendee does not exist.
    #[error("attendee {id} not found")]
    NotFound {
        /// The id that was looked up.
        id: AttendeeId,
    },

    /// The policy refused the transition in the current financial state.
    #[error("{}", .code.message())]
    Conflict {
        /// Stable conflict code.
        code: ConflictCode,
    },

    /// A registration with the same nickname and email exists.
    #[error("there is already an attendee with this information (attendee {existing})")]
    Duplicate {
        /// The existing registration.
        existing: AttendeeId,
    },

    /// A collaborator failed before anything was recorded.
    #[error("{service} service error: {reason}")]
    Downstream {
        /// `payment` or `mail`.
        service: &'static str,
        /// Failure description.
        reason: String,
    },

    /// The status change was recorded but the notification failed.
    #[error("status changed to {} but notification failed: {reason}", .change.status)]
    NotificationFailed {
        /// The recorded change. It is not rolled back.
        change: StatusChange,
        /// Failure description.
        reason: String,
    },

    /// The repository failed.
    #[error("storage error: {0}")]
    Persistence(String),
}

impl ServiceError {
    /// Validation failure with the given code.
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    /// Forbidden status transition.
    pub fn forbidden_transition() -> Self {
        Self::Forbidden {
            message: FORBIDDEN_MESSAGE,
        }
    }

    /// Forbidden read.
    pub fn forbidden_data() -> Self {
        Self::Forbidden {
            message: FORBIDDEN_DATA_MESSAGE,
        }
    }

    /// Forbidden operation.
    pub fn forbidden_operation() -> Self {
        Self::Forbidden {
            message: FORBIDDEN_OPERATION_MESSAGE,
        }
    }

    /// HTTP status and stable error code.
    pub fn status_and_code(&self) -> (u16, &'static str) {
        match self {
            Self::Validation { code, .. } => (400, code),
            Self::Unauthenticated => (401, "auth.unauthorized"),
            Self::Forbidden { .. } => (403, "auth.forbidden"),
            Self::NotFound { .. } => (404, "attendee.id.notfound"),
            Self::Conflict { code } => (409, code.as_str()),
            Self::Duplicate { .. } => (409, "attendee.data.duplicate"),
            Self::Downstream { service, .. } => (502, downstream_code(service)),
            Self::NotificationFailed { .. } => (502, "downstream.mail.error"),
            Self::Persistence(_) => (500, "storage.error"),
        }
    }

    /// HTTP status alone.
    pub fn status_code(&self) -> u16 {
        self.status_and_code().0
    }

    /// Stable error code alone.
    pub fn code(&self) -> &'static str {
        self.status_and_code().1
    }

    /// Label for the transition outcome metric.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } | Self::Duplicate { .. } => "conflict",
            Self::Downstream { .. } => "downstream",
            Self::NotificationFailed { .. } => "notification_failed",
            Self::Persistence(_) => "persistence",
        }
    }
}

fn downstream_code(service: &str) -> &'static str {
    match service {
        "payment" => "downstream.payment.error",
        "mail" => "downstream.mail.error",
        _ => "downstream.error",
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound { id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        Self::Downstream {
            service: "payment",
            reason: err.to_string(),
        }
    }
}

impl From<MailError> for ServiceError {
    fn from(err: MailError) -> Self {
        Self::Downstream {
            service: "mail",
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> AttendeeId {
        AttendeeId::new(raw).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ServiceError, u16, &str)> = vec![
            (
                ServiceError::validation("status.data.invalid", "bad"),
                400,
                "status.data.invalid",
            ),
            (ServiceError::Unauthenticated, 401, "auth.unauthorized"),
            (ServiceError::forbidden_transition(), 403, "auth.forbidden"),
            (ServiceError::NotFound { id: id(3) }, 404, "attendee.id.notfound"),
            (
                ServiceError::Conflict {
                    code: ConflictCode::HasPaid,
                },
                409,
                "status.has.paid",
            ),
            (
                ServiceError::Duplicate { existing: id(1) },
                409,
                "attendee.data.duplicate",
            ),
            (
                PaymentError::Timeout { elapsed_ms: 10 }.into(),
                502,
                "downstream.payment.error",
            ),
            (
                MailError::Unavailable {
                    reason: "down".into(),
                }
                .into(),
                502,
                "downstream.mail.error",
            ),
            (
                ServiceError::Persistence("disk".into()),
                500,
                "storage.error",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[test]
    fn test_unauthenticated_message() {
        assert_eq!(
            ServiceError::Unauthenticated.to_string(),
            UNAUTHENTICATED_MESSAGE
        );
    }

    #[test]
    fn test_forbidden_transition_message() {
        assert_eq!(
            ServiceError::forbidden_transition().to_string(),
            "you are not allowed to make this status transition - the attempt has been logged"
        );
    }

    #[test]
    fn test_repository_not_found_maps_to_404() {
        let err: ServiceError = RepositoryError::NotFound(id(9)).into();
        assert_eq!(err.status_code(), 404);
        let err: ServiceError = RepositoryError::Storage("locked".into()).into();
        assert_eq!(err.status_code(), 500);
    }
}
