//! # Ledger Transactions
//!
//! A transaction is one posting against an attendee's account. Dues are
//! what the attendee is charged (negative amounts credit charges back);
//! payments are money received (negative amounts are refunds). The
//! outstanding balance is the sum of valid dues minus the sum of valid
//! payments.
//!
//! Transactions are never removed. A posting is corrected by an offsetting
//! posting, or marked [`TransactionStatus::Deleted`] by the payment service,
//! which takes it out of every sum.

use serde::{Deserialize, Serialize};

use attreg_core::{AttendeeId, CurrencyCode, Timestamp};

/// Kind of ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Charge (or charge reversal) for packages.
    Due,
    /// Money received (or refunded).
    Payment,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Due => f.write_str("due"),
            Self::Payment => f.write_str("payment"),
        }
    }
}

/// Validity of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Counts toward balances.
    Valid,
    /// Voided by the payment service; ignored in every sum.
    Deleted,
}

/// A posting as stored by the payment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Identifier assigned by the payment service.
    pub id: String,
    /// The attendee the posting belongs to.
    pub debitor_id: AttendeeId,
    /// Due or payment.
    pub kind: TransactionKind,
    /// Gross amount in minor units. Sign per module docs.
    pub amount: i64,
    /// Currency of `amount`.
    pub currency: CurrencyCode,
    /// VAT rate in percent, e.g. `19.0`.
    pub vat_rate_percent: f64,
    /// Whether the posting counts.
    pub status: TransactionStatus,
    /// When the posting was recorded.
    pub effective_at: Timestamp,
    /// When the amount falls due.
    pub due_at: Timestamp,
    /// Human-readable reason for the posting.
    pub comment: String,
    /// Key the posting was submitted under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl Transaction {
    /// Whether this posting counts toward balances.
    pub fn is_valid(&self) -> bool {
        self.status == TransactionStatus::Valid
    }

    /// Whether this posting is what `request` asks for: same debitor,
    /// kind, amount, and comment.
    pub fn matches(&self, request: &NewTransaction) -> bool {
        self.debitor_id == request.debitor_id
            && self.kind == request.kind
            && self.amount == request.amount
            && self.comment == request.comment
    }
}

/// A posting request submitted to the payment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// The attendee the posting belongs to.
    pub debitor_id: AttendeeId,
    /// Due or payment.
    pub kind: TransactionKind,
    /// Gross amount in minor units.
    pub amount: i64,
    /// Currency of `amount`.
    pub currency: CurrencyCode,
    /// VAT rate in percent.
    pub vat_rate_percent: f64,
    /// When the amount falls due.
    pub due_at: Timestamp,
    /// Human-readable reason for the posting.
    pub comment: String,
    /// Repeat submissions with the same key produce one posting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl NewTransaction {
    /// A due posting with no idempotency key, due immediately.
    pub fn due(debitor_id: AttendeeId, amount: i64, comment: impl Into<String>) -> Self {
        Self {
            debitor_id,
            kind: TransactionKind::Due,
            amount,
            currency: CurrencyCode::default(),
            vat_rate_percent: 19.0,
            due_at: Timestamp::now(),
            comment: comment.into(),
            idempotency_key: None,
        }
    }

    /// A payment posting with no idempotency key.
    pub fn payment(debitor_id: AttendeeId, amount: i64, comment: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::Payment,
            ..Self::due(debitor_id, amount, comment)
        }
    }

    /// Set the idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&TransactionKind::Due).unwrap(), "\"due\"");
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Deleted).unwrap(),
            "\"deleted\""
        );
    }

    #[test]
    fn test_payment_builder_keeps_fields() {
        let id = AttendeeId::new(3).unwrap();
        let tx = NewTransaction::payment(id, 15500, "bank transfer").with_idempotency_key("k1");
        assert_eq!(tx.kind, TransactionKind::Payment);
        assert_eq!(tx.amount, 15500);
        assert_eq!(tx.currency.as_str(), "EUR");
        assert_eq!(tx.idempotency_key.as_deref(), Some("k1"));
    }
}
