//! # attreg-ledger: Downstream Collaborators
//!
//! The registration engine talks to two external services: the payment
//! service, which owns the dues/payment ledger, and the mail service, which
//! renders and sends templated notifications. This crate defines the
//! contract for each and an in-memory simulator used by tests and the
//! `attreg simulate` command.
//!
//! ## Architecture
//!
//! - [`PaymentService`] and [`MailService`] are `Send + Sync` async traits,
//!   shared behind `Arc<dyn ...>` so the engine never couples to a transport.
//! - [`InMemoryPaymentService`] deduplicates postings by idempotency key and
//!   records what was posted through the trait, separately from seeded state.
//! - [`InMemoryMailService`] records every request.
//! - Both simulators support one-shot failure injection and artificial
//!   latency, for exercising abort and timeout paths.
//! - [`DueDatePolicy`] decides the due date stamped on new dues.

pub mod due_date;
pub mod mail;
pub mod payment;
pub mod transaction;

pub use due_date::{DaysAfter, DueDatePolicy, SameDay};
pub use mail::{InMemoryMailService, MailError, MailRequest, MailService};
pub use payment::{InMemoryPaymentService, PaymentError, PaymentService};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
