//! # attreg-core: Foundational Types for Attendee Registration
//!
//! Defines the primitives every other crate in the workspace builds on.
//! `attreg-core` depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **One status registry.** `Status` is the single definition of the
//!    seven registration statuses. Wire strings, parsing, and canonical
//!    ordering live here; no transition logic does.
//!
//! 2. **Newtype wrappers for identifiers.** `AttendeeId` rejects zero,
//!    `Subject` rejects blank login subjects. No bare integers or strings
//!    cross crate boundaries as identifiers.
//!
//! 3. **UTC-only timestamps** truncated to seconds, so history ordering and
//!    rendering are deterministic.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `attreg-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod money;
pub mod status;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use error::CoreError;
pub use identity::{AttendeeId, Subject};
pub use money::{format_minor_units, CurrencyCode};
pub use status::{Status, STATUS_COUNT};
pub use temporal::Timestamp;
