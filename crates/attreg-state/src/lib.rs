//! # attreg-state: Registration Status State Machine
//!
//! Pure decision logic for registration status changes. Nothing in this
//! crate performs I/O; the executor in `attreg-service` feeds it the
//! attendee's ledger and acts on its verdicts.
//!
//! ## Components
//!
//! - **Roles** (`role.rs`): the six actor roles and `derive_role`, the one
//!   function that turns auth claims plus ownership into a role.
//!
//! - **Dues** (`dues.rs`): folds ledger postings into a `FinancialState`
//!   and plans the due adjustment a transition requires.
//!
//! - **Policy** (`policy.rs`): the 7×7 transition table. Each cell names
//!   the roles that may take the edge and the preconditions checked
//!   against the financial state. `decide` returns Allowed, Forbidden,
//!   or Conflict with a stable code.
//!
//! - **History record** (`change.rs`): the immutable `StatusChange` row.
//!
//! ## State Diagram
//!
//! ```text
//!   new ──▶ approved ──▶ partially paid ──▶ paid ──▶ checked in
//!    │         │  ▲            │              │          │
//!    │         │  └── (refund) ┴──────────────┴──────────┘
//!    ▼         ▼
//!  cancelled / deleted ──▶ new | approved      (admin recovery)
//! ```
//!
//! No status is terminal: admins can reach every status from every other
//! status through some allowed path.

pub mod change;
pub mod dues;
pub mod policy;
pub mod role;

// ─── Role re-exports ────────────────────────────────────────────────

pub use role::{derive_role, ActorRole, AuthClaims, RoleParseError};

// ─── Dues re-exports ────────────────────────────────────────────────

pub use dues::{
    financial_state, plan_due_adjustment, DueAdjustment, FinancialState, COMMENT_DUES_ADJUSTMENT,
    COMMENT_VOID_ON_CANCEL,
};

// ─── Policy re-exports ──────────────────────────────────────────────

pub use policy::{
    allowed_targets, decide, edge, ConflictCode, Edge, Precondition, RoleSet, Verdict,
    FORBIDDEN_MESSAGE, TRANSITIONS,
};

// ─── History re-exports ─────────────────────────────────────────────

pub use change::StatusChange;
