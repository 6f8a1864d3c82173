//! # Matrix Subcommand
//!
//! Prints the policy verdict for every (old, new) status pair for one
//! role in a given financial state.

use anyhow::Result;
use clap::Args;

use attreg_core::{format_minor_units, Status};
use attreg_state::{decide, ActorRole, FinancialState};

/// Financial state flags shared by `matrix` and `decide`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct FinancialArgs {
    /// Outstanding balance (dues minus payments), in minor units.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub balance: i64,

    /// Net payments received, in minor units.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub payments: i64,

    /// A payment was received at some point, even if since refunded.
    #[arg(long)]
    pub has_payment: bool,
}

impl FinancialArgs {
    /// The financial state these flags describe.
    pub fn state(&self) -> FinancialState {
        FinancialState {
            balance: self.balance,
            payment_balance: self.payments,
            dues_posted: self.balance.saturating_add(self.payments),
            has_any_payment: self.has_payment || self.payments != 0,
        }
    }
}

/// Arguments for the matrix subcommand.
#[derive(Args, Debug)]
pub struct MatrixArgs {
    /// Role to evaluate (anonymous, self, other-authenticated, staff-self, regdesk, admin).
    #[arg(long)]
    pub role: ActorRole,

    #[command(flatten)]
    pub financial: FinancialArgs,
}

/// Execute the matrix subcommand.
pub fn run_matrix(args: &MatrixArgs) -> Result<u8> {
    print!("{}", render_matrix(args.role, &args.financial.state()));
    Ok(0)
}

const FIRST_COLUMN: usize = 16;
const COLUMN: usize = 26;

/// Render the verdict table as text, rows = old status, columns = new.
pub fn render_matrix(role: ActorRole, state: &FinancialState) -> String {
    let mut out = format!(
        "role: {role}  balance: {}  payments: {}  payment history: {}\n\n",
        format_minor_units(state.balance),
        format_minor_units(state.payment_balance),
        if state.has_any_payment { "yes" } else { "no" },
    );

    out.push_str(&format!("{:<FIRST_COLUMN$}", "from \\ to"));
    for new in Status::all() {
        out.push_str(&format!("{:<COLUMN$}", new.as_str()));
    }
    out.push('\n');

    for old in Status::all() {
        out.push_str(&format!("{:<FIRST_COLUMN$}", old.as_str()));
        for new in Status::all() {
            out.push_str(&format!("{:<COLUMN$}", decide(role, *old, *new, state).label()));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_financial_args_derive_dues() {
        let args = FinancialArgs {
            balance: 100,
            payments: 25400,
            has_payment: false,
        };
        let state = args.state();
        assert_eq!(state.dues_posted, 25500);
        assert!(state.has_any_payment);
    }

    #[test]
    fn test_matrix_shape() {
        let text = render_matrix(ActorRole::Admin, &FinancialState::empty());
        let lines: Vec<&str> = text.lines().collect();
        // header, blank, column row, seven status rows
        assert_eq!(lines.len(), 10);
        assert!(lines[2].contains("partially paid"));
        assert!(lines[3].starts_with("new"));
        assert!(lines[3].contains("status.unchanged.invalid"));
    }

    #[test]
    fn test_matrix_for_anonymous_is_all_forbidden() {
        let text = render_matrix(ActorRole::Anonymous, &FinancialState::empty());
        let cells: usize = text
            .lines()
            .skip(3)
            .map(|l| l.matches("forbidden").count())
            .sum();
        assert_eq!(cells, 49);
    }
}
