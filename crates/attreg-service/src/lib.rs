//! # attreg-service: Attendee Registration Service
//!
//! Wires the pure state machine from `attreg-state` to persistence, the
//! payment ledger, and mail. Every collaborator is injected through a
//! constructor; there are no globals.
//!
//! ## Modules
//!
//! - `attendee`: attendee entity, admin info, permissions.
//! - `repository`: persistence contract and in-memory implementation.
//! - `history`: the status history log (append, list, latest).
//! - `locks`: per-attendee serialization of read-decide-write sequences.
//! - `pricing`: expected dues for an attendee's package selection.
//! - `config`: YAML configuration with defaults and validation.
//! - `executor`: the transition executor.
//! - `service`: the registration service facade.
//! - `error`: the error taxonomy and its HTTP status mapping.
//!
//! ## Crate Policy
//!
//! - No `.unwrap()` or `.expect()` outside tests.
//! - Collaborator calls carry a timeout; a timeout is a downstream error.
//! - Nothing is recorded before the policy has allowed the transition.

pub mod attendee;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod locks;
pub mod pricing;
pub mod repository;
pub mod service;

pub use attendee::{AdminInfo, Attendee, NewAttendee, Permission};
pub use config::{ConfigError, ServiceConfig};
pub use error::ServiceError;
pub use executor::{Collaborators, TransitionExecutor, TransitionOutcome, TransitionRequest};
pub use history::StatusHistoryLog;
pub use locks::{AttendeeGuard, AttendeeLocks};
pub use pricing::{DuesPricing, PackagePricing};
pub use repository::{AttendeeRepository, InMemoryRepository, RepositoryError};
pub use service::{InMemoryHandles, RegistrationService};
