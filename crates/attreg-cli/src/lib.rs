//! # attreg-cli: Attendee Registration Command-Line Interface
//!
//! Provides the `attreg` binary for inspecting the status transition
//! policy and exercising the registration service against in-memory
//! collaborators.
//!
//! ## Subcommands
//!
//! - `attreg matrix`: verdict for every (old, new) pair for one role.
//! - `attreg decide`: verdict for a single transition.
//! - `attreg check-config`: load and validate a configuration file.
//! - `attreg simulate`: run a scripted scenario and report each step.
//!
//! ```bash
//! attreg matrix --role regdesk --payments 25500
//! attreg decide --role admin --from paid --to new --payments 25500
//! attreg check-config attreg.yaml
//! attreg --config attreg.yaml simulate scenario.yaml
//! ```
//!
//! ## Crate Policy
//!
//! - Argument parsing lives here; decisions live in the domain crates.
//! - Handlers return an exit code; hard failures surface as `anyhow` errors.

pub mod check_config;
pub mod decide;
pub mod logging;
pub mod matrix;
pub mod simulate;
