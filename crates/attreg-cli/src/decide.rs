//! # Decide Subcommand
//!
//! Prints the verdict for one transition and, when allowed, the due
//! posting it would require.

use anyhow::Result;
use clap::Args;

use attreg_core::{format_minor_units, Status};
use attreg_state::{decide, plan_due_adjustment, ActorRole, Verdict, FORBIDDEN_MESSAGE};

use crate::matrix::FinancialArgs;

/// Arguments for the decide subcommand.
#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Role of the caller.
    #[arg(long)]
    pub role: ActorRole,

    /// Current status.
    #[arg(long)]
    pub from: Status,

    /// Requested status.
    #[arg(long)]
    pub to: Status,

    /// What the attendee's packages cost, in minor units.
    #[arg(long, default_value_t = 0)]
    pub expected_dues: i64,

    #[command(flatten)]
    pub financial: FinancialArgs,
}

/// Execute the decide subcommand. Exits 0 when allowed, 1 otherwise.
pub fn run_decide(args: &DecideArgs) -> Result<u8> {
    let (text, verdict) = describe(args);
    println!("{text}");
    Ok(if verdict.is_allowed() { 0 } else { 1 })
}

/// The verdict and its human-readable explanation.
pub fn describe(args: &DecideArgs) -> (String, Verdict) {
    let state = args.financial.state();
    let verdict = decide(args.role, args.from, args.to, &state);
    let text = match verdict {
        Verdict::Allowed => {
            match plan_due_adjustment(args.to, &state, args.expected_dues) {
                Some(adj) => format!(
                    "allowed: post due {} ({})",
                    format_minor_units(adj.amount),
                    adj.comment
                ),
                None => "allowed: no due posting".to_string(),
            }
        }
        Verdict::Forbidden => format!("forbidden: {FORBIDDEN_MESSAGE}"),
        Verdict::Conflict(code) => format!("conflict {code}: {}", code.message()),
    };
    (text, verdict)
}
