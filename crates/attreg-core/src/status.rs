//! # Registration Status: Single Source of Truth
//!
//! Defines the `Status` enum with all seven registration statuses. This is
//! the ONE definition used across the workspace; every `match` on `Status`
//! is exhaustive.
//!
//! The wire strings contain spaces (`partially paid`, `checked in`) and
//! are part of the external contract, so serde, `Display`, and `FromStr`
//! all go through [`Status::as_str()`].
//!
//! No transition rules live here. See `attreg-state::policy`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

/// Lifecycle status of an attendee registration.
///
/// | # | Status | Meaning |
/// |---|--------|---------|
/// | 0 | new | registered, not yet reviewed |
/// | 1 | approved | accepted, dues are charged |
/// | 2 | partially paid | some payment received |
/// | 3 | paid | dues fully covered |
/// | 4 | checked in | picked up badge on site |
/// | 5 | cancelled | registration cancelled, payments may remain |
/// | 6 | deleted | soft-deleted, only possible without payment history |
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Status {
    /// Registered, not yet approved. Initial status of every attendee.
    #[default]
    #[serde(rename = "new")]
    New,
    /// Approved; dues for the selected packages are posted.
    #[serde(rename = "approved")]
    Approved,
    /// At least some payment has been received.
    #[serde(rename = "partially paid")]
    PartiallyPaid,
    /// Dues are fully covered.
    #[serde(rename = "paid")]
    Paid,
    /// Attendee has checked in at the registration desk.
    #[serde(rename = "checked in")]
    CheckedIn,
    /// Registration cancelled.
    #[serde(rename = "cancelled")]
    Cancelled,
    /// Registration soft-deleted.
    #[serde(rename = "deleted")]
    Deleted,
}

/// Number of registration statuses.
pub const STATUS_COUNT: usize = 7;

impl Status {
    /// All statuses in canonical order.
    pub fn all() -> &'static [Status; STATUS_COUNT] {
        &[
            Self::New,
            Self::Approved,
            Self::PartiallyPaid,
            Self::Paid,
            Self::CheckedIn,
            Self::Cancelled,
            Self::Deleted,
        ]
    }

    /// The wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Approved => "approved",
            Self::PartiallyPaid => "partially paid",
            Self::Paid => "paid",
            Self::CheckedIn => "checked in",
            Self::Cancelled => "cancelled",
            Self::Deleted => "deleted",
        }
    }

    /// Position in canonical order, usable as a table index.
    pub fn index(&self) -> usize {
        match self {
            Self::New => 0,
            Self::Approved => 1,
            Self::PartiallyPaid => 2,
            Self::Paid => 3,
            Self::CheckedIn => 4,
            Self::Cancelled => 5,
            Self::Deleted => 6,
        }
    }

    /// Whether `value` names a status.
    pub fn is_valid(value: &str) -> bool {
        value.parse::<Status>().is_ok()
    }

    /// Statuses reached by receiving money: partially paid, paid, checked in.
    pub fn is_paid_stage(&self) -> bool {
        matches!(self, Self::PartiallyPaid | Self::Paid | Self::CheckedIn)
    }

    /// Statuses in which the attendee owes dues for their packages.
    pub fn carries_dues(&self) -> bool {
        matches!(self, Self::Approved) || self.is_paid_stage()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CoreError;

    /// Parse a status from its wire string. Case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "approved" => Ok(Self::Approved),
            "partially paid" => Ok(Self::PartiallyPaid),
            "paid" => Ok(Self::Paid),
            "checked in" => Ok(Self::CheckedIn),
            "cancelled" => Ok(Self::Cancelled),
            "deleted" => Ok(Self::Deleted),
            other => Err(CoreError::UnknownStatus {
                value: other.to_string(),
            }),
        }
    }
}
