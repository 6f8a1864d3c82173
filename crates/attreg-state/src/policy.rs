//! # Transition Policy
//!
//! Decides whether an actor may move an attendee from one status to
//! another, given the attendee's financial state. The rules are one static
//! table, [`TRANSITIONS`], indexed by `(old, new)`. Each cell holds:
//!
//! - the [`RoleSet`] permitted to take the edge, and
//! - the ordered [`Precondition`]s evaluated once the role gate passes.
//!
//! ## Evaluation order
//!
//! 1. Role gate. A role outside the cell's set is `Forbidden`. Diagonal
//!    cells are admin-only, so non-admins asking for an unchanged status
//!    are forbidden rather than told it is unchanged.
//! 2. Preconditions in cell order. The first failing one is the
//!    `Conflict`. Cells list preconditions in the global order
//!    unchanged, use-approved, has-paid, cannot-delete, unpaid-dues.
//! 3. Otherwise `Allowed`.
//!
//! ## Role grants
//!
//! | Roles | Edges |
//! |-------|-------|
//! | admin | every edge |
//! | self, staff-self, regdesk | new → cancelled, approved → cancelled |
//! | regdesk | paid → checked in |
//! | anonymous, other-authenticated | none |

use serde::{Deserialize, Serialize};

use attreg_core::{Status, STATUS_COUNT};

use crate::dues::FinancialState;
use crate::role::ActorRole;

use self::Precondition::{
    DuesSettled, NeverDeletable, NoPaymentBalance, NoPaymentHistory, Unchanged, UseApproved,
};

/// Message returned with every `Forbidden` verdict. Forbidden attempts are
/// logged as security events by the caller.
pub const FORBIDDEN_MESSAGE: &str =
    "you are not allowed to make this status transition - the attempt has been logged";

// ─── Verdict ─────────────────────────────────────────────────────────

/// Stable error codes for business-rule conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictCode {
    /// Requested status equals the current one.
    #[serde(rename = "status.unchanged.invalid")]
    Unchanged,
    /// Paid stages must be reached through approved.
    #[serde(rename = "status.use.approved")]
    UseApproved,
    /// Money is still held for the attendee.
    #[serde(rename = "status.has.paid")]
    HasPaid,
    /// Payment history forbids deletion.
    #[serde(rename = "status.cannot.delete")]
    CannotDelete,
    /// Dues are not fully covered.
    #[serde(rename = "status.unpaid.dues")]
    UnpaidDues,
}

impl ConflictCode {
    /// Wire code, e.g. `status.has.paid`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "status.unchanged.invalid",
            Self::UseApproved => "status.use.approved",
            Self::HasPaid => "status.has.paid",
            Self::CannotDelete => "status.cannot.delete",
            Self::UnpaidDues => "status.unpaid.dues",
        }
    }

    /// Client-facing message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unchanged => "old and new status are the same",
            Self::UseApproved => {
                "please change status to approved, this will automatically advance to (partially) paid as appropriate"
            }
            Self::HasPaid => {
                "there is a non-zero payment balance, please use partially paid, or refund"
            }
            Self::CannotDelete => {
                "cannot delete attendee for legal reasons (there were payments or invoices)"
            }
            Self::UnpaidDues => "payment amount not sufficient",
        }
    }
}

impl std::fmt::Display for ConflictCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The transition may proceed.
    Allowed,
    /// The actor may never take this edge.
    Forbidden,
    /// The actor may take this edge, but not in the current state.
    Conflict(ConflictCode),
}

impl Verdict {
    /// Whether the transition may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Short label for logs and the CLI matrix.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Forbidden => "forbidden",
            Self::Conflict(code) => code.as_str(),
        }
    }
}

// ─── Table cells ─────────────────────────────────────────────────────

/// Set of roles, as a bitmask over [`ActorRole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleSet(u8);

impl RoleSet {
    /// Administrators only.
    pub const ADMIN: Self = Self(bit(ActorRole::Admin));
    /// Roles allowed to cancel a registration that has not been paid.
    pub const CANCEL: Self = Self(
        bit(ActorRole::Admin)
            | bit(ActorRole::SelfOwner)
            | bit(ActorRole::StaffSelf)
            | bit(ActorRole::Regdesk),
    );
    /// Roles allowed to check a fully paid attendee in.
    pub const CHECK_IN: Self = Self(bit(ActorRole::Admin) | bit(ActorRole::Regdesk));

    /// Whether `role` is in the set.
    pub fn contains(&self, role: ActorRole) -> bool {
        self.0 & bit(role) != 0
    }
}

const fn bit(role: ActorRole) -> u8 {
    match role {
        ActorRole::Anonymous => 1 << 0,
        ActorRole::SelfOwner => 1 << 1,
        ActorRole::OtherAuthenticated => 1 << 2,
        ActorRole::StaffSelf => 1 << 3,
        ActorRole::Regdesk => 1 << 4,
        ActorRole::Admin => 1 << 5,
    }
}

/// A business rule checked after the role gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precondition {
    /// Fails always; placed on diagonal cells.
    Unchanged,
    /// Fails always; placed on edges into paid stages that skip approved.
    UseApproved,
    /// Fails while payments are held (`payment_balance != 0`).
    NoPaymentBalance,
    /// Fails always; placed on deletes out of paid stages.
    NeverDeletable,
    /// Fails if any payment was ever received.
    NoPaymentHistory,
    /// Fails while dues are outstanding (`balance > 0`).
    DuesSettled,
}

impl Precondition {
    /// `Some(code)` if the rule fails for `state`.
    pub fn check(&self, state: &FinancialState) -> Option<ConflictCode> {
        match self {
            Self::Unchanged => Some(ConflictCode::Unchanged),
            Self::UseApproved => Some(ConflictCode::UseApproved),
            Self::NoPaymentBalance => (state.payment_balance != 0).then_some(ConflictCode::HasPaid),
            Self::NeverDeletable => Some(ConflictCode::CannotDelete),
            Self::NoPaymentHistory => state.has_any_payment.then_some(ConflictCode::CannotDelete),
            Self::DuesSettled => (state.balance > 0).then_some(ConflictCode::UnpaidDues),
        }
    }
}

/// One cell of the transition table.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    /// Roles permitted to take this edge.
    pub roles: RoleSet,
    /// Rules evaluated in order once the role gate passes.
    pub preconditions: &'static [Precondition],
}

impl Edge {
    /// Evaluate this edge for `role` in `state`.
    pub fn evaluate(&self, role: ActorRole, state: &FinancialState) -> Verdict {
        if !self.roles.contains(role) {
            return Verdict::Forbidden;
        }
        self.preconditions
            .iter()
            .find_map(|p| p.check(state))
            .map_or(Verdict::Allowed, Verdict::Conflict)
    }
}

// ─── The table ───────────────────────────────────────────────────────

const fn admin(preconditions: &'static [Precondition]) -> Edge {
    Edge {
        roles: RoleSet::ADMIN,
        preconditions,
    }
}

const fn cancel() -> Edge {
    Edge {
        roles: RoleSet::CANCEL,
        preconditions: &[],
    }
}

const fn check_in() -> Edge {
    Edge {
        roles: RoleSet::CHECK_IN,
        preconditions: &[DuesSettled],
    }
}

/// Transition table, `TRANSITIONS[old.index()][new.index()]`.
///
/// Columns: new, approved, partially paid, paid, checked in, cancelled, deleted.
pub static TRANSITIONS: [[Edge; STATUS_COUNT]; STATUS_COUNT] = [
    // from new
    [
        admin(&[Unchanged]),
        admin(&[]),
        admin(&[UseApproved]),
        admin(&[UseApproved]),
        admin(&[UseApproved, DuesSettled]),
        cancel(),
        admin(&[NoPaymentHistory]),
    ],
    // from approved
    [
        admin(&[]),
        admin(&[Unchanged]),
        admin(&[]),
        admin(&[]),
        admin(&[DuesSettled]),
        cancel(),
        admin(&[NoPaymentHistory]),
    ],
    // from partially paid
    [
        admin(&[NoPaymentBalance]),
        admin(&[NoPaymentBalance]),
        admin(&[Unchanged]),
        admin(&[]),
        admin(&[DuesSettled]),
        admin(&[]),
        admin(&[NeverDeletable]),
    ],
    // from paid
    [
        admin(&[NoPaymentBalance]),
        admin(&[NoPaymentBalance]),
        admin(&[]),
        admin(&[Unchanged]),
        check_in(),
        admin(&[]),
        admin(&[NeverDeletable]),
    ],
    // from checked in
    [
        admin(&[NoPaymentBalance]),
        admin(&[NoPaymentBalance]),
        admin(&[]),
        admin(&[]),
        admin(&[Unchanged]),
        admin(&[]),
        admin(&[NeverDeletable]),
    ],
    // from cancelled
    [
        admin(&[NoPaymentBalance]),
        admin(&[NoPaymentBalance]),
        admin(&[UseApproved]),
        admin(&[UseApproved]),
        admin(&[UseApproved, DuesSettled]),
        admin(&[Unchanged]),
        admin(&[NoPaymentHistory]),
    ],
    // from deleted
    [
        admin(&[]),
        admin(&[]),
        admin(&[UseApproved]),
        admin(&[UseApproved]),
        admin(&[UseApproved, DuesSettled]),
        admin(&[]),
        admin(&[Unchanged]),
    ],
];

/// The table cell for `old → new`.
pub fn edge(old: Status, new: Status) -> &'static Edge {
    &TRANSITIONS[old.index()][new.index()]
}

/// Decide whether `role` may move an attendee from `old` to `new`.
pub fn decide(role: ActorRole, old: Status, new: Status, state: &FinancialState) -> Verdict {
    edge(old, new).evaluate(role, state)
}

/// Targets `role` may currently move to from `old`.
pub fn allowed_targets(role: ActorRole, old: Status, state: &FinancialState) -> Vec<Status> {
    Status::all()
        .iter()
        .copied()
        .filter(|new| decide(role, old, *new, state).is_allowed())
        .collect()
}
