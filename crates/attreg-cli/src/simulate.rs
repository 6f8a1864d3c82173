//! # Simulate Subcommand
//!
//! Runs a scripted scenario against the registration service wired to
//! in-memory collaborators, printing one line per step.
//!
//! ```yaml
//! steps:
//!   - action: register
//!     actor: { subject: snep }
//!     nickname: Snep
//!     email: snep@example.com
//!   - action: transition
//!     actor: { subject: boss, admin: true }
//!     attendee: 1
//!     status: approved
//!     expect: allowed
//!   - action: pay
//!     attendee: 1
//!     amount: 25500
//!   - action: fail_next_mail
//!     reason: smtp down
//! ```
//!
//! A step with `expect` checks the outcome (`allowed` or an error code);
//! any mismatch makes the command exit 1.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

use attreg_core::{format_minor_units, AttendeeId, Subject};
use attreg_ledger::NewTransaction;
use attreg_service::{
    InMemoryHandles, NewAttendee, Permission, RegistrationService, ServiceConfig,
    ServiceError, TransitionRequest,
};
use attreg_state::AuthClaims;

/// Arguments for the simulate subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to the scenario file.
    pub scenario: PathBuf,
}

/// Who performs a step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Actor {
    /// Login subject.
    pub subject: String,
    /// Member of the admin group.
    #[serde(default)]
    pub admin: bool,
    /// Member of the staff group.
    #[serde(default)]
    pub staff: bool,
}

impl Actor {
    fn claims(&self) -> Result<AuthClaims> {
        Ok(AuthClaims {
            subject: Subject::new(self.subject.as_str())?,
            is_admin: self.admin,
            is_staff: self.staff,
        })
    }
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Register an attendee owned by `actor`.
    Register {
        actor: Option<Actor>,
        nickname: String,
        email: String,
        #[serde(default)]
        packages: Vec<String>,
        expect: Option<String>,
    },
    /// Grant a permission on an attendee.
    Grant {
        actor: Option<Actor>,
        attendee: u64,
        permission: String,
        expect: Option<String>,
    },
    /// Record a payment (negative for a refund) directly in the ledger.
    Pay {
        attendee: u64,
        amount: i64,
        #[serde(default)]
        comment: Option<String>,
    },
    /// Request a status change.
    Transition {
        actor: Option<Actor>,
        attendee: u64,
        status: String,
        #[serde(default)]
        comment: String,
        expect: Option<String>,
    },
    /// Make the next payment posting fail.
    FailNextPayment { reason: String },
    /// Make the next mail fail.
    FailNextMail { reason: String },
}

/// A scenario file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse scenario")
    }
}

/// Result of running a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// One line per step.
    pub lines: Vec<String>,
    /// Steps whose outcome did not match `expect`.
    pub mismatches: usize,
}

/// Execute the simulate subcommand.
pub fn run_simulate(args: &SimulateArgs, config_path: Option<&Path>) -> Result<u8> {
    let config = match config_path {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    let yaml = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario {}", args.scenario.display()))?;
    let scenario = Scenario::from_yaml_str(&yaml)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime.block_on(run_scenario(config, &scenario))?;

    for line in &report.lines {
        println!("{line}");
    }
    if report.mismatches > 0 {
        println!("{} step(s) did not match expectations", report.mismatches);
        return Ok(1);
    }
    Ok(0)
}

/// Run every step of `scenario` against a fresh in-memory service.
pub async fn run_scenario(config: ServiceConfig, scenario: &Scenario) -> Result<Report> {
    let (service, handles) = RegistrationService::in_memory(config)?;
    let mut report = Report::default();
    for (index, step) in scenario.steps.iter().enumerate() {
        let (line, outcome, expect) = run_step(&service, &handles, step).await?;
        let mut line = format!("{:>3}. {line}", index + 1);
        if let Some(expected) = expect {
            if expected != outcome {
                report.mismatches += 1;
                line.push_str(&format!("  [expected {expected}]"));
            }
        }
        report.lines.push(line);
    }
    Ok(report)
}

/// Returns the printed line, the outcome label, and the expectation.
async fn run_step<'a>(
    service: &RegistrationService,
    handles: &InMemoryHandles,
    step: &'a Step,
) -> Result<(String, String, Option<&'a str>)> {
    match step {
        Step::Register {
            actor,
            nickname,
            email,
            packages,
            expect,
        } => {
            let claims = claims_of(actor)?;
            let data = NewAttendee::new(nickname.as_str(), email.as_str(), packages.iter().cloned());
            let (line, outcome) = match service.register(claims.as_ref(), data).await {
                Ok(attendee) => (
                    format!("register {nickname}: attendee {}", attendee.id),
                    "allowed".to_string(),
                ),
                Err(e) => failure(format!("register {nickname}"), &e),
            };
            Ok((line, outcome, expect.as_deref()))
        }
        Step::Grant {
            actor,
            attendee,
            permission,
            expect,
        } => {
            let claims = claims_of(actor)?;
            let id = AttendeeId::new(*attendee)?;
            let permission: Permission = permission
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            let label = format!("grant {permission} on {id}");
            let (line, outcome) = match service
                .grant_permission(claims.as_ref(), id, permission)
                .await
            {
                Ok(_) => (format!("{label}: ok"), "allowed".to_string()),
                Err(e) => failure(label, &e),
            };
            Ok((line, outcome, expect.as_deref()))
        }
        Step::Pay {
            attendee,
            amount,
            comment,
        } => {
            let id = AttendeeId::new(*attendee)?;
            let comment = comment.clone().unwrap_or_else(|| "payment".to_string());
            handles
                .payments
                .inject(NewTransaction::payment(id, *amount, comment));
            Ok((
                format!("pay {} for {id}", format_minor_units(*amount)),
                "allowed".to_string(),
                None,
            ))
        }
        Step::Transition {
            actor,
            attendee,
            status,
            comment,
            expect,
        } => {
            let claims = claims_of(actor)?;
            let id = AttendeeId::new(*attendee)?;
            let label = format!("transition {id} -> {status}");
            let request = TransitionRequest::new(id, claims, status.as_str(), comment.as_str());
            let (line, outcome) = match service.change_status(request).await {
                Ok(outcome) => {
                    let posted = outcome
                        .posting
                        .as_ref()
                        .map(|t| format!(", posted {}", format_minor_units(t.amount)))
                        .unwrap_or_default();
                    (
                        format!(
                            "{label}: allowed as {} (was {}{posted})",
                            outcome.role, outcome.previous
                        ),
                        "allowed".to_string(),
                    )
                }
                Err(e) => failure(label, &e),
            };
            Ok((line, outcome, expect.as_deref()))
        }
        Step::FailNextPayment { reason } => {
            handles.payments.fail_next_post(reason.as_str());
            Ok((format!("payment service will fail: {reason}"), "allowed".to_string(), None))
        }
        Step::FailNextMail { reason } => {
            handles.mail.fail_next(reason.as_str());
            Ok((format!("mail service will fail: {reason}"), "allowed".to_string(), None))
        }
    }
}

fn claims_of(actor: &Option<Actor>) -> Result<Option<AuthClaims>> {
    actor.as_ref().map(Actor::claims).transpose()
}

fn failure(label: String, err: &ServiceError) -> (String, String) {
    let (status, code) = err.status_and_code();
    (
        format!("{label}: {status} {code}: {err}"),
        code.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
packages:
  attendance:
    description: Entrance Fee
    price: 25500
    default: true
"#;

    const SCENARIO: &str = r#"
steps:
  - action: register
    actor: { subject: snep }
    nickname: Snep
    email: snep@example.com
    expect: allowed
  - action: transition
    actor: { subject: snep }
    attendee: 1
    status: approved
    expect: auth.forbidden
  - action: transition
    actor: { subject: boss, admin: true }
    attendee: 1
    status: approved
    expect: allowed
  - action: pay
    attendee: 1
    amount: 25500
  - action: transition
    actor: { subject: boss, admin: true }
    attendee: 1
    status: new
    expect: status.has.paid
  - action: fail_next_mail
    reason: smtp down
  - action: transition
    actor: { subject: boss, admin: true }
    attendee: 1
    status: paid
    expect: downstream.mail.error
  - action: transition
    attendee: 1
    status: cancelled
    expect: auth.unauthorized
"#;

    #[tokio::test]
    async fn test_scenario_runs_and_matches_expectations() {
        let config = ServiceConfig::from_yaml_str(CONFIG).unwrap();
        let scenario = Scenario::from_yaml_str(SCENARIO).unwrap();
        let report = run_scenario(config, &scenario).await.unwrap();
        assert_eq!(report.lines.len(), 8);
        assert_eq!(report.mismatches, 0, "{:#?}", report.lines);
        assert!(report.lines[2].contains("posted 255.00"));
    }

    #[tokio::test]
    async fn test_mismatch_is_counted() {
        let config = ServiceConfig::from_yaml_str(CONFIG).unwrap();
        let scenario = Scenario::from_yaml_str(
            r#"
steps:
  - action: register
    actor: { subject: snep }
    nickname: Snep
    email: snep@example.com
  - action: transition
    actor: { subject: snep }
    attendee: 1
    status: cancelled
    expect: auth.forbidden
"#,
        )
        .unwrap();
        let report = run_scenario(config, &scenario).await.unwrap();
        assert_eq!(report.mismatches, 1);
        assert!(report.lines[1].ends_with("[expected auth.forbidden]"));
    }

    #[test]
    fn test_unknown_action_is_parse_error() {
        let err = Scenario::from_yaml_str("steps:\n  - action: teleport\n").unwrap_err();
        assert!(err.to_string().contains("scenario"));
    }
}
