//! # Transition Executor
//!
//! Carries out one status change request end to end:
//!
//! 1. Reject anonymous callers and unknown statuses.
//! 2. Take the attendee's lock, then load the attendee, its history, and
//!    its ledger postings.
//! 3. Derive the caller's role and ask the policy for a verdict.
//! 4. Post the planned due adjustment, if any.
//! 5. Append the history row.
//! 6. Send the status notification.
//!
//! A failure in step 4 aborts before anything is recorded. A failure in
//! step 6 leaves the recorded change in place and is reported as
//! [`ServiceError::NotificationFailed`].
//!
//! Payment and mail calls run under `tokio::time::timeout`; an elapsed
//! budget is reported like any other downstream failure.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tracing::{error, info, warn};

use attreg_core::{format_minor_units, AttendeeId, CurrencyCode, Status, Timestamp};
use attreg_ledger::{
    DueDatePolicy, MailError, MailRequest, MailService, NewTransaction, PaymentError,
    PaymentService, Transaction, TransactionKind,
};
use attreg_state::{
    decide, derive_role, financial_state, plan_due_adjustment, ActorRole, AuthClaims,
    DueAdjustment, StatusChange, Verdict,
};

use crate::attendee::{Attendee, Permission};
use crate::config::{ConfigError, ServiceConfig};
use crate::error::ServiceError;
use crate::history::StatusHistoryLog;
use crate::locks::AttendeeLocks;
use crate::pricing::DuesPricing;
use crate::repository::AttendeeRepository;

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Everything the executor talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Attendee and history storage.
    pub repository: Arc<dyn AttendeeRepository>,
    /// Dues/payment ledger.
    pub payments: Arc<dyn PaymentService>,
    /// Notification sender.
    pub mail: Arc<dyn MailService>,
    /// Expected dues per attendee.
    pub pricing: Arc<dyn DuesPricing>,
    /// Due date stamped on new dues.
    pub due_dates: Arc<dyn DueDatePolicy>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("repository", &self.repository.adapter_name())
            .field("payments", &self.payments.adapter_name())
            .field("mail", &self.mail.adapter_name())
            .field("pricing", &self.pricing)
            .field("due_dates", &self.due_dates)
            .finish()
    }
}

/// Ledger stamping and call budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    /// Currency stamped on dues.
    pub currency: CurrencyCode,
    /// VAT rate stamped on dues.
    pub vat_rate_percent: f64,
    /// Budget for each payment call.
    pub payment_timeout: Duration,
    /// Budget for each mail call.
    pub mail_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::default(),
            vat_rate_percent: 19.0,
            payment_timeout: Duration::from_millis(3000),
            mail_timeout: Duration::from_millis(3000),
        }
    }
}

impl ExecutorSettings {
    /// Settings from the `dues` and `downstream` sections.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let currency =
            CurrencyCode::new(config.dues.currency.as_str()).map_err(|e| ConfigError::Invalid {
                violations: vec![format!("dues.currency: {e}")],
            })?;
        Ok(Self {
            currency,
            vat_rate_percent: config.dues.vat_rate_percent,
            payment_timeout: config.downstream.payment_timeout(),
            mail_timeout: config.downstream.mail_timeout(),
        })
    }
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// A request to move an attendee to a new status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Target attendee.
    pub attendee_id: AttendeeId,
    /// Caller identity; `None` for anonymous.
    pub claims: Option<AuthClaims>,
    /// Requested status as received on the wire.
    pub new_status: String,
    /// Reason recorded with the change.
    pub comment: String,
    /// Caller-supplied key for the due posting. Derived when absent.
    pub idempotency_key: Option<String>,
}

impl TransitionRequest {
    /// Request with no idempotency key.
    pub fn new(
        attendee_id: AttendeeId,
        claims: Option<AuthClaims>,
        new_status: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            attendee_id,
            claims,
            new_status: new_status.into(),
            comment: comment.into(),
            idempotency_key: None,
        }
    }

    /// Set the idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// What an allowed transition did.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// The recorded history row.
    pub change: StatusChange,
    /// Status before the change.
    pub previous: Status,
    /// The caller's derived role.
    pub role: ActorRole,
    /// The due posted, if the change required one.
    pub posting: Option<Transaction>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Applies policy verdicts to the ledger, the history log, and mail.
#[derive(Debug, Clone)]
pub struct TransitionExecutor {
    collaborators: Collaborators,
    history: StatusHistoryLog,
    locks: Arc<AttendeeLocks>,
    settings: ExecutorSettings,
}

impl TransitionExecutor {
    /// Executor with its own lock table.
    pub fn new(collaborators: Collaborators, settings: ExecutorSettings) -> Self {
        Self::with_locks(collaborators, settings, Arc::new(AttendeeLocks::new()))
    }

    /// Executor sharing `locks` with other writers of the same attendees.
    pub fn with_locks(
        collaborators: Collaborators,
        settings: ExecutorSettings,
        locks: Arc<AttendeeLocks>,
    ) -> Self {
        let history = StatusHistoryLog::new(Arc::clone(&collaborators.repository));
        Self {
            collaborators,
            history,
            locks,
            settings,
        }
    }

    /// The status history log this executor appends to.
    pub fn history(&self) -> &StatusHistoryLog {
        &self.history
    }

    /// Call budgets and ledger stamping.
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute one status change request.
    pub async fn execute(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, ServiceError> {
        let start = Instant::now();
        let result = self.run(request).await;
        let outcome = match &result {
            Ok(_) => "allowed",
            Err(e) => e.outcome_label(),
        };
        counter!("attreg_status_transitions_total", "outcome" => outcome).increment(1);
        histogram!("attreg_status_transition_duration_seconds", "outcome" => outcome)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, request: TransitionRequest) -> Result<TransitionOutcome, ServiceError> {
        let Some(claims) = request.claims.as_ref() else {
            return Err(ServiceError::Unauthenticated);
        };
        let new_status: Status = request
            .new_status
            .parse()
            .map_err(|e: attreg_core::CoreError| {
                ServiceError::validation("status.data.invalid", e.to_string())
            })?;
        let id = request.attendee_id;

        // Unknown ids are refused before a lock slot is allocated.
        self.collaborators.repository.get_attendee(id).await?;
        let _guard = self.locks.lock(id).await;

        let attendee = self.collaborators.repository.get_attendee(id).await?;
        let history = self.history.list(id).await?;
        let old_status = history.last().map(|c| c.status).unwrap_or_default();
        let role = resolve_role(
            self.collaborators.repository.as_ref(),
            Some(claims),
            &attendee,
        )
        .await?;

        let transactions = self.ledger_for(id).await?;
        let financial = financial_state(&transactions);

        match decide(role, old_status, new_status, &financial) {
            Verdict::Allowed => {}
            Verdict::Forbidden => {
                warn!(
                    security = true,
                    attendee_id = %id,
                    subject = %claims.subject,
                    role = %role,
                    old_status = %old_status,
                    new_status = %new_status,
                    "forbidden status transition attempted"
                );
                return Err(ServiceError::forbidden_transition());
            }
            Verdict::Conflict(code) => {
                info!(
                    attendee_id = %id,
                    role = %role,
                    old_status = %old_status,
                    new_status = %new_status,
                    code = code.as_str(),
                    "status transition refused"
                );
                return Err(ServiceError::Conflict { code });
            }
        }

        let expected = self.collaborators.pricing.expected_dues(&attendee);
        let posting = match plan_due_adjustment(new_status, &financial, expected) {
            Some(adjustment) => {
                let key = request.idempotency_key.clone().unwrap_or_else(|| {
                    format!("attendee-{id}/seq-{}/{new_status}", history.len())
                });
                Some(self.post_due(id, adjustment, key).await?)
            }
            None => None,
        };

        let change = self
            .history
            .append(id, new_status, &request.comment, Timestamp::now())
            .await?;
        info!(
            attendee_id = %id,
            role = %role,
            old_status = %old_status,
            new_status = %new_status,
            sequence = change.sequence,
            posted = posting.as_ref().map(|t| t.amount).unwrap_or(0),
            "status changed"
        );

        let balance_after = financial
            .balance
            .saturating_add(posting.as_ref().map(|t| t.amount).unwrap_or(0));
        let mail = MailRequest::new(new_status.as_str(), attendee.email.as_str())
            .with_variable("nickname", attendee.nickname.as_str())
            .with_variable("badge_number", id.to_string())
            .with_variable("old_status", old_status.as_str())
            .with_variable("new_status", new_status.as_str())
            .with_variable("reason", request.comment.as_str())
            .with_variable("remaining_dues", format_minor_units(balance_after))
            .with_variable("currency", self.settings.currency.as_str());
        if let Err(e) = self.send(mail).await {
            error!(
                attendee_id = %id,
                new_status = %new_status,
                error = %e,
                "status change recorded but notification failed"
            );
            return Err(ServiceError::NotificationFailed {
                change,
                reason: e.to_string(),
            });
        }

        Ok(TransitionOutcome {
            change,
            previous: old_status,
            role,
            posting,
        })
    }

    /// All postings for `id`, within the payment budget.
    pub(crate) async fn ledger_for(&self, id: AttendeeId) -> Result<Vec<Transaction>, ServiceError> {
        bounded(
            self.settings.payment_timeout,
            self.collaborators.payments.transactions_for(id),
            |elapsed_ms| PaymentError::Timeout { elapsed_ms },
        )
        .await
        .map_err(|e| {
            error!(attendee_id = %id, error = %e, "failed to read ledger");
            ServiceError::from(e)
        })
    }

    /// Post a due within the payment budget.
    pub(crate) async fn post_due(
        &self,
        id: AttendeeId,
        adjustment: DueAdjustment,
        idempotency_key: String,
    ) -> Result<Transaction, ServiceError> {
        let now = Timestamp::now();
        let tx = NewTransaction {
            debitor_id: id,
            kind: TransactionKind::Due,
            amount: adjustment.amount,
            currency: self.settings.currency.clone(),
            vat_rate_percent: self.settings.vat_rate_percent,
            due_at: self.collaborators.due_dates.due_date(now),
            comment: adjustment.comment,
            idempotency_key: Some(idempotency_key),
        };
        let posted = bounded(
            self.settings.payment_timeout,
            self.collaborators.payments.post_transaction(tx.clone()),
            |elapsed_ms| PaymentError::Timeout { elapsed_ms },
        )
        .await
        .map_err(|e| {
            error!(attendee_id = %id, amount = tx.amount, error = %e, "failed to post due");
            ServiceError::from(e)
        })?;

        // A transaction returned for a reused key must be the one asked for.
        if !posted.matches(&tx) {
            error!(
                attendee_id = %id,
                amount = tx.amount,
                transaction_id = %posted.id,
                returned_debitor = %posted.debitor_id,
                returned_amount = posted.amount,
                "payment service returned a different posting"
            );
            return Err(ServiceError::Downstream {
                service: "payment",
                reason: format!(
                    "posting {} does not match the requested due adjustment",
                    posted.id
                ),
            });
        }
        Ok(posted)
    }

    async fn send(&self, mail: MailRequest) -> Result<(), MailError> {
        bounded(
            self.settings.mail_timeout,
            self.collaborators.mail.send_templated(mail),
            |elapsed_ms| MailError::Timeout { elapsed_ms },
        )
        .await
    }

    pub(crate) fn locks(&self) -> &AttendeeLocks {
        &self.locks
    }
}

/// Derive the caller's role for `attendee`.
///
/// The regdesk permission is looked up on the registrations the caller
/// owns, and only when it can matter.
pub async fn resolve_role(
    repository: &dyn AttendeeRepository,
    claims: Option<&AuthClaims>,
    attendee: &Attendee,
) -> Result<ActorRole, ServiceError> {
    let has_regdesk = match claims {
        Some(c) if !c.is_admin && c.subject != attendee.owner => {
            let mut granted = false;
            for own in repository.find_by_owner(&c.subject).await? {
                if repository.get_admin_info(own.id).await?.has(Permission::Regdesk) {
                    granted = true;
                    break;
                }
            }
            granted
        }
        _ => false,
    };
    Ok(derive_role(claims, &attendee.owner, has_regdesk))
}

async fn bounded<T, E, F>(
    budget: Duration,
    call: F,
    on_timeout: impl FnOnce(u64) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(
            u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}
