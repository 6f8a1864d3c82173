//! # Dues Calculator
//!
//! Folds an attendee's ledger postings into a [`FinancialState`] and plans
//! the single due posting a status change requires.
//!
//! Only postings with status `valid` count. Sign convention follows the
//! ledger: dues charge, payments pay; `balance > 0` means the attendee
//! still owes money. Sums saturate at the `i64` bounds.
//!
//! ## Due adjustment
//!
//! | Target status | Posting |
//! |---------------|---------|
//! | approved, partially paid, paid, checked in | expected dues − dues posted, if nonzero |
//! | new, deleted | − dues posted, if nonzero |
//! | cancelled | − outstanding balance, if positive |
//!
//! Cancelling voids only what is still unpaid. Money already received
//! stays on the account until an admin refunds it.

use serde::{Deserialize, Serialize};

use attreg_core::Status;
use attreg_ledger::{Transaction, TransactionKind};

/// Comment on dues postings that bring charges in line with packages.
pub const COMMENT_DUES_ADJUSTMENT: &str =
    "dues adjustment due to change in status or selected packages";

/// Comment on the posting that voids unpaid dues on cancellation.
pub const COMMENT_VOID_ON_CANCEL: &str = "void unpaid dues on cancel";

/// Aggregate view of an attendee's valid postings, in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialState {
    /// Outstanding amount: valid dues minus valid payments.
    pub balance: i64,
    /// Net money received: valid payments minus refunds.
    pub payment_balance: i64,
    /// Net dues charged.
    pub dues_posted: i64,
    /// A nonzero valid payment exists, even if later refunded.
    pub has_any_payment: bool,
}

impl FinancialState {
    /// Nothing posted.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Fold postings into a [`FinancialState`].
pub fn financial_state<'a, I>(transactions: I) -> FinancialState
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut state = FinancialState::empty();
    for tx in transactions.into_iter().filter(|t| t.is_valid()) {
        match tx.kind {
            TransactionKind::Due => {
                state.dues_posted = state.dues_posted.saturating_add(tx.amount);
            }
            TransactionKind::Payment => {
                state.payment_balance = state.payment_balance.saturating_add(tx.amount);
                if tx.amount != 0 {
                    state.has_any_payment = true;
                }
            }
        }
    }
    state.balance = state.dues_posted.saturating_sub(state.payment_balance);
    state
}

/// A due posting the executor must make before recording a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueAdjustment {
    /// Signed amount to post as a due.
    pub amount: i64,
    /// Comment stored with the posting.
    pub comment: String,
}

/// Plan the due posting for a change to `target`.
///
/// `expected_dues` is what the attendee's current package selection costs.
/// Returns `None` when the ledger is already consistent with `target`.
pub fn plan_due_adjustment(
    target: Status,
    state: &FinancialState,
    expected_dues: i64,
) -> Option<DueAdjustment> {
    let (amount, comment) = match target {
        Status::Approved | Status::PartiallyPaid | Status::Paid | Status::CheckedIn => (
            expected_dues.saturating_sub(state.dues_posted),
            COMMENT_DUES_ADJUSTMENT.to_string(),
        ),
        Status::New | Status::Deleted => (
            state.dues_posted.saturating_neg(),
            format!("remove dues balance - status changed to {target}"),
        ),
        Status::Cancelled => {
            if state.balance <= 0 {
                return None;
            }
            (state.balance.saturating_neg(), COMMENT_VOID_ON_CANCEL.to_string())
        }
    };
    (amount != 0).then_some(DueAdjustment { amount, comment })
}
