//! # Payment Service Interface
//!
//! The payment service owns every dues and payment posting. The engine
//! reads an attendee's postings before deciding a transition and posts a
//! single due adjustment when a transition is allowed.
//!
//! ## Idempotency
//!
//! A posting submitted with an idempotency key that the service has
//! already seen returns the original transaction instead of posting a
//! second time. Retried transitions therefore never double-charge. A key
//! reused for a different debitor, kind, amount, or comment is rejected.
//!
//! ## Simulator
//!
//! [`InMemoryPaymentService`] keeps two lists: the full ledger, and a
//! recording of postings made through [`PaymentService::post_transaction`].
//! Seeding with [`InMemoryPaymentService::inject`] only touches the ledger,
//! so tests can assert exactly what the engine posted.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use attreg_core::{AttendeeId, Timestamp};

use crate::transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from the payment service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    /// Service unreachable or answered with a server error.
    #[error("payment service unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// Service refused the posting.
    #[error("posting rejected by payment service: {reason}")]
    Rejected {
        /// Why the posting was refused.
        reason: String,
    },

    /// The call did not complete within its budget.
    #[error("payment service timed out after {elapsed_ms}ms")]
    Timeout {
        /// Budget that elapsed.
        elapsed_ms: u64,
    },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Contract for the dues/payment ledger.
///
/// Implementations must be `Send + Sync` so they can be shared across
/// tasks behind an `Arc`.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Post a due or payment. Repeating a known idempotency key with the
    /// same payload returns the transaction posted under it; a different
    /// payload under a known key is [`PaymentError::Rejected`].
    async fn post_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentError>;

    /// All postings for an attendee, valid and deleted, in posting order.
    async fn transactions_for(&self, debitor: AttendeeId)
        -> Result<Vec<Transaction>, PaymentError>;

    /// Outstanding balance as computed by the service: valid dues minus
    /// valid payments.
    async fn query_balance(&self, debitor: AttendeeId) -> Result<i64, PaymentError>;

    /// Human-readable name of this implementation.
    fn adapter_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// In-memory simulator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerState {
    transactions: Vec<Transaction>,
    recorded: Vec<Transaction>,
    fail_next_post: Option<String>,
    fail_next_query: Option<String>,
    latency: Option<Duration>,
}

/// In-memory payment service for tests and local simulation.
#[derive(Debug, Default)]
pub struct InMemoryPaymentService {
    state: Mutex<LedgerState>,
}

impl InMemoryPaymentService {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a posting to the ledger without recording it.
    pub fn inject(&self, tx: NewTransaction) -> Transaction {
        let stored = materialize(tx);
        self.state.lock().transactions.push(stored.clone());
        stored
    }

    /// Postings made through [`PaymentService::post_transaction`], oldest first.
    pub fn recorded(&self) -> Vec<Transaction> {
        self.state.lock().recorded.clone()
    }

    /// Forget recorded postings. The ledger is untouched.
    pub fn clear_recorded(&self) {
        self.state.lock().recorded.clear();
    }

    /// Mark a posting deleted. Returns `false` if the id is unknown.
    pub fn void(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        match state.transactions.iter_mut().find(|t| t.id == id) {
            Some(tx) => {
                tx.status = TransactionStatus::Deleted;
                true
            }
            None => false,
        }
    }

    /// Make the next post fail with [`PaymentError::Unavailable`].
    pub fn fail_next_post(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_post = Some(reason.into());
    }

    /// Make the next read (list or balance) fail with [`PaymentError::Unavailable`].
    pub fn fail_next_query(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_query = Some(reason.into());
    }

    /// Delay every call by `latency`. `None` removes the delay.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.lock().latency = latency;
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
    }

    fn take_query_failure(&self) -> Result<(), PaymentError> {
        match self.state.lock().fail_next_query.take() {
            Some(reason) => Err(PaymentError::Unavailable { reason }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn post_transaction(&self, tx: NewTransaction) -> Result<Transaction, PaymentError> {
        self.simulate_latency().await;
        let mut state = self.state.lock();

        if let Some(reason) = state.fail_next_post.take() {
            return Err(PaymentError::Unavailable { reason });
        }
        if tx.amount == 0 {
            return Err(PaymentError::Rejected {
                reason: "amount must not be zero".to_string(),
            });
        }
        if let Some(key) = tx.idempotency_key.as_deref() {
            let existing = state
                .transactions
                .iter()
                .find(|t| t.idempotency_key.as_deref() == Some(key));
            if let Some(existing) = existing {
                if !existing.matches(&tx) {
                    tracing::warn!(
                        idempotency_key = key,
                        transaction_id = %existing.id,
                        "idempotency key reused with a different posting"
                    );
                    return Err(PaymentError::Rejected {
                        reason: format!(
                            "idempotency key {key} was already used for a different posting"
                        ),
                    });
                }
                tracing::debug!(
                    idempotency_key = key,
                    transaction_id = %existing.id,
                    "duplicate posting suppressed"
                );
                return Ok(existing.clone());
            }
        }

        let stored = materialize(tx);
        state.transactions.push(stored.clone());
        state.recorded.push(stored.clone());
        Ok(stored)
    }

    async fn transactions_for(
        &self,
        debitor: AttendeeId,
    ) -> Result<Vec<Transaction>, PaymentError> {
        self.simulate_latency().await;
        self.take_query_failure()?;
        Ok(self
            .state
            .lock()
            .transactions
            .iter()
            .filter(|t| t.debitor_id == debitor)
            .cloned()
            .collect())
    }

    async fn query_balance(&self, debitor: AttendeeId) -> Result<i64, PaymentError> {
        self.simulate_latency().await;
        self.take_query_failure()?;
        let state = self.state.lock();
        let balance = state
            .transactions
            .iter()
            .filter(|t| t.debitor_id == debitor && t.is_valid())
            .fold(0i64, |balance, t| match t.kind {
                TransactionKind::Due => balance.saturating_add(t.amount),
                TransactionKind::Payment => balance.saturating_sub(t.amount),
            });
        Ok(balance)
    }

    fn adapter_name(&self) -> &str {
        "InMemoryPaymentService"
    }
}

fn materialize(tx: NewTransaction) -> Transaction {
    Transaction {
        id: uuid::Uuid::new_v4().to_string(),
        debitor_id: tx.debitor_id,
        kind: tx.kind,
        amount: tx.amount,
        currency: tx.currency,
        vat_rate_percent: tx.vat_rate_percent,
        status: TransactionStatus::Valid,
        effective_at: Timestamp::now(),
        due_at: tx.due_at,
        comment: tx.comment,
        idempotency_key: tx.idempotency_key,
    }
}
