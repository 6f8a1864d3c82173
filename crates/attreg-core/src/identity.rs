//! # Identifier Newtypes
//!
//! `AttendeeId` is the numeric key of a registration. It is positive; zero
//! and anything that is not a plain decimal integer is rejected at parse
//! time so handlers never see a malformed id.
//!
//! `Subject` is the identity-provider subject of the login that owns a
//! registration. Ownership checks compare subjects, never emails.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::CoreError;

/// Positive numeric attendee identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct AttendeeId(u64);

impl AttendeeId {
    /// Construct from a raw integer, rejecting zero.
    pub fn new(raw: u64) -> Result<Self, CoreError> {
        if raw == 0 {
            return Err(CoreError::InvalidAttendeeId {
                value: raw.to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// The raw integer.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for AttendeeId {
    type Error = CoreError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<AttendeeId> for u64 {
    fn from(id: AttendeeId) -> Self {
        id.0
    }
}

impl FromStr for AttendeeId {
    type Err = CoreError;

    /// Parse `[1-9][0-9]*`. Signs, whitespace, and leading zeros are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidAttendeeId {
            value: s.to_string(),
        };
        if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let raw: u64 = s.parse().map_err(|_| invalid())?;
        Self::new(raw)
    }
}

impl std::fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Login subject from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Construct from a non-blank string.
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::BlankSubject);
        }
        Ok(Self(raw))
    }

    /// Borrow the subject string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Subject {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Subject> for String {
    fn from(s: Subject) -> Self {
        s.0
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
