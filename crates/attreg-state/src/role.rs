//! # Actor Roles
//!
//! A role is never stored. It is derived for each request from the
//! caller's auth claims, the identity that owns the target attendee, and
//! whether the caller holds the `regdesk` permission. [`derive_role`] is
//! the only place that derivation happens.
//!
//! ## Precedence
//!
//! 1. No claims: `anonymous`.
//! 2. Admin claim: `admin`, whoever owns the target.
//! 3. Caller owns the target: `staff-self` for staff, otherwise `self`.
//! 4. Caller holds `regdesk`: `regdesk`.
//! 5. Anyone else: `other-authenticated`. Staff status confers nothing on
//!    other people's registrations.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use attreg_core::Subject;

/// Verified claims of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// Identity-provider subject of the login.
    pub subject: Subject,
    /// Caller belongs to the admin group.
    pub is_admin: bool,
    /// Caller belongs to the staff group.
    pub is_staff: bool,
}

impl AuthClaims {
    /// Claims for a regular user.
    pub fn user(subject: Subject) -> Self {
        Self {
            subject,
            is_admin: false,
            is_staff: false,
        }
    }

    /// Claims for a staff member.
    pub fn staff(subject: Subject) -> Self {
        Self {
            is_staff: true,
            ..Self::user(subject)
        }
    }

    /// Claims for an admin.
    pub fn admin(subject: Subject) -> Self {
        Self {
            is_admin: true,
            ..Self::user(subject)
        }
    }
}

/// Role of the caller relative to one attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorRole {
    /// No valid login.
    Anonymous,
    /// Owner of the registration.
    #[serde(rename = "self")]
    SelfOwner,
    /// Logged in, but neither owner nor privileged.
    OtherAuthenticated,
    /// Staff member acting on their own registration.
    StaffSelf,
    /// Holder of the regdesk permission acting on someone else.
    Regdesk,
    /// Administrator.
    Admin,
}

impl ActorRole {
    /// All roles, least to most privileged.
    pub fn all() -> &'static [ActorRole] {
        &[
            Self::Anonymous,
            Self::OtherAuthenticated,
            Self::SelfOwner,
            Self::StaffSelf,
            Self::Regdesk,
            Self::Admin,
        ]
    }

    /// Kebab-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::SelfOwner => "self",
            Self::OtherAuthenticated => "other-authenticated",
            Self::StaffSelf => "staff-self",
            Self::Regdesk => "regdesk",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role {0:?}")]
pub struct RoleParseError(pub String);

impl FromStr for ActorRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| RoleParseError(s.to_string()))
    }
}

/// Derive the caller's role relative to the attendee owned by `owner`.
pub fn derive_role(
    claims: Option<&AuthClaims>,
    owner: &Subject,
    caller_has_regdesk: bool,
) -> ActorRole {
    let Some(claims) = claims else {
        return ActorRole::Anonymous;
    };
    if claims.is_admin {
        return ActorRole::Admin;
    }
    if &claims.subject == owner {
        return if claims.is_staff {
            ActorRole::StaffSelf
        } else {
            ActorRole::SelfOwner
        };
    }
    if caller_has_regdesk {
        return ActorRole::Regdesk;
    }
    ActorRole::OtherAuthenticated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(s: &str) -> Subject {
        Subject::new(s).unwrap()
    }

    #[test]
    fn test_anonymous_without_claims() {
        assert_eq!(derive_role(None, &subject("owner"), true), ActorRole::Anonymous);
    }

    #[test]
    fn test_admin_wins_over_ownership() {
        let claims = AuthClaims::admin(subject("owner"));
        assert_eq!(derive_role(Some(&claims), &subject("owner"), false), ActorRole::Admin);
        assert_eq!(derive_role(Some(&claims), &subject("other"), false), ActorRole::Admin);
    }

    #[test]
    fn test_owner_roles() {
        let user = AuthClaims::user(subject("owner"));
        let staff = AuthClaims::staff(subject("owner"));
        assert_eq!(derive_role(Some(&user), &subject("owner"), false), ActorRole::SelfOwner);
        assert_eq!(derive_role(Some(&staff), &subject("owner"), false), ActorRole::StaffSelf);
        // ownership outranks regdesk
        assert_eq!(derive_role(Some(&user), &subject("owner"), true), ActorRole::SelfOwner);
    }

    #[test]
    fn test_non_owner_roles() {
        let user = AuthClaims::user(subject("someone"));
        let staff = AuthClaims::staff(subject("someone"));
        assert_eq!(derive_role(Some(&user), &subject("owner"), true), ActorRole::Regdesk);
        assert_eq!(
            derive_role(Some(&user), &subject("owner"), false),
            ActorRole::OtherAuthenticated
        );
        assert_eq!(
            derive_role(Some(&staff), &subject("owner"), false),
            ActorRole::OtherAuthenticated
        );
    }

    #[test]
    fn test_role_str_roundtrip() {
        for role in ActorRole::all() {
            assert_eq!(role.as_str().parse::<ActorRole>().unwrap(), *role);
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
        assert!("root".parse::<ActorRole>().is_err());
    }
}
