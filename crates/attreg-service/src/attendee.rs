//! # Attendee Entity
//!
//! The registration record and the admin-managed data attached to it.
//! `status` on [`Attendee`] is a cache of the latest status history row;
//! only the history log writes it.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use attreg_core::{AttendeeId, Status, Subject, Timestamp};

/// A registered attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Registration number.
    pub id: AttendeeId,
    /// Login that created the registration.
    pub owner: Subject,
    /// Public nickname.
    pub nickname: String,
    /// Contact address; notifications go here.
    pub email: String,
    /// Selected package keys.
    pub packages: BTreeSet<String>,
    /// Selected flag keys.
    pub flags: BTreeSet<String>,
    /// Current status, mirrored from the status history.
    pub status: Status,
    /// When the registration was created.
    pub registered_at: Timestamp,
}

/// Data submitted when registering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttendee {
    /// Public nickname.
    pub nickname: String,
    /// Contact address.
    pub email: String,
    /// Selected package keys.
    #[serde(default)]
    pub packages: BTreeSet<String>,
    /// Selected flag keys.
    #[serde(default)]
    pub flags: BTreeSet<String>,
}

impl NewAttendee {
    /// Registration data with no flags.
    pub fn new<I, S>(nickname: impl Into<String>, email: impl Into<String>, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nickname: nickname.into(),
            email: email.into(),
            packages: packages.into_iter().map(Into::into).collect(),
            flags: BTreeSet::new(),
        }
    }
}

/// Capability granted by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// May check fully paid attendees in.
    Regdesk,
}

impl Permission {
    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regdesk => "regdesk",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regdesk" => Ok(Self::Regdesk),
            other => Err(format!("unknown permission {other:?}")),
        }
    }
}

/// Admin-managed data for one attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminInfo {
    /// The attendee this belongs to.
    pub attendee_id: AttendeeId,
    /// Granted permissions.
    pub permissions: BTreeSet<Permission>,
}

impl AdminInfo {
    /// No permissions.
    pub fn empty(attendee_id: AttendeeId) -> Self {
        Self {
            attendee_id,
            permissions: BTreeSet::new(),
        }
    }

    /// Whether `permission` has been granted.
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
