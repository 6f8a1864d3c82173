//! # Service Configuration
//!
//! YAML configuration for the registration service. Every section and
//! field has a default, so an empty document is a valid configuration.
//! Defaults are applied during deserialization; [`ServiceConfig::validate`]
//! then reports every violation at once, keyed by its YAML path.
//!
//! ```yaml
//! dues:
//!   currency: EUR
//!   vat_rate_percent: 19.0
//!   due_in_days: 14
//! packages:
//!   attendance:
//!     description: Entrance Fee (Convention Ticket)
//!     price: 25500
//!     default: true
//! downstream:
//!   payment_timeout_ms: 3000
//!   mail_timeout_ms: 3000
//! logging:
//!   severity: INFO
//!   json: false
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use attreg_core::CurrencyCode;
use attreg_ledger::{DaysAfter, DueDatePolicy, SameDay};

const SEVERITIES: [&str; 4] = ["DEBUG", "INFO", "WARN", "ERROR"];
const MAX_TIMEOUT_MS: u64 = 60_000;
const MAX_DESCRIPTION_LEN: usize = 256;

/// Errors loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// Path that was opened.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid YAML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// One or more values are out of range.
    #[error("configuration invalid: {}", .violations.join("; "))]
    Invalid {
        /// Each violation as `key: message`.
        violations: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// How dues are posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuesConfig {
    /// ISO 4217 code stamped on dues.
    pub currency: String,
    /// VAT rate stamped on dues, in percent.
    pub vat_rate_percent: f64,
    /// Days between posting a due and its due date. 0 means same day.
    pub due_in_days: u32,
}

impl Default for DuesConfig {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            vat_rate_percent: 19.0,
            due_in_days: 14,
        }
    }
}

impl DuesConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(e) = CurrencyCode::new(self.currency.as_str()) {
            errors.push(format!("dues.currency: {e}"));
        }
        if !(0.0..=100.0).contains(&self.vat_rate_percent) {
            errors.push(format!(
                "dues.vat_rate_percent: must be between 0 and 100, got {}",
                self.vat_rate_percent
            ));
        }
        errors
    }

    /// The due date policy this section selects.
    pub fn due_date_policy(&self) -> Arc<dyn DueDatePolicy> {
        match self.due_in_days {
            0 => Arc::new(SameDay),
            n => Arc::new(DaysAfter(n)),
        }
    }
}

/// One selectable package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Shown to attendees.
    pub description: String,
    /// Price in minor units.
    #[serde(default)]
    pub price: i64,
    /// Preselected on the registration form.
    #[serde(default)]
    pub default: bool,
}

/// Collaborator call budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Budget for each payment service call.
    pub payment_timeout_ms: u64,
    /// Budget for each mail service call.
    pub mail_timeout_ms: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            payment_timeout_ms: 3000,
            mail_timeout_ms: 3000,
        }
    }
}

impl DownstreamConfig {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (key, value) in [
            ("downstream.payment_timeout_ms", self.payment_timeout_ms),
            ("downstream.mail_timeout_ms", self.mail_timeout_ms),
        ] {
            if !(1..=MAX_TIMEOUT_MS).contains(&value) {
                errors.push(format!(
                    "{key}: must be between 1 and {MAX_TIMEOUT_MS}, got {value}"
                ));
            }
        }
        errors
    }

    /// Payment call budget.
    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    /// Mail call budget.
    pub fn mail_timeout(&self) -> Duration {
        Duration::from_millis(self.mail_timeout_ms)
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// DEBUG, INFO, WARN or ERROR.
    pub severity: String,
    /// Emit JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            severity: "INFO".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Vec<String> {
        if SEVERITIES.contains(&self.severity.as_str()) {
            Vec::new()
        } else {
            vec![format!(
                "logging.severity: must be one of {}",
                SEVERITIES.join(", ")
            )]
        }
    }

    /// The severity as a `tracing` filter directive.
    pub fn filter_directive(&self) -> &'static str {
        match self.severity.as_str() {
            "DEBUG" => "debug",
            "WARN" => "warn",
            "ERROR" => "error",
            _ => "info",
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Dues posting.
    pub dues: DuesConfig,
    /// Selectable packages by key.
    pub packages: BTreeMap<String, PackageConfig>,
    /// Collaborator budgets.
    pub downstream: DownstreamConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check every section, reporting all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = self.dues.validate();
        violations.extend(self.validate_packages());
        violations.extend(self.downstream.validate());
        violations.extend(self.logging.validate());
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { violations })
        }
    }

    fn validate_packages(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (key, package) in &self.packages {
            if !is_valid_choice_key(key) {
                errors.push(format!(
                    "choices.packages.{key}: invalid key, must consist of a-z A-Z 0-9 - _ only"
                ));
            }
            let len = package.description.chars().count();
            if len == 0 || len > MAX_DESCRIPTION_LEN {
                errors.push(format!(
                    "choices.packages.{key}.description: must be between 1 and {MAX_DESCRIPTION_LEN} characters"
                ));
            }
            if package.price < 0 {
                errors.push(format!(
                    "choices.packages.{key}.price: must not be negative"
                ));
            }
        }
        errors
    }

    /// Keys of packages marked `default`.
    pub fn default_packages(&self) -> Vec<String> {
        self.packages
            .iter()
            .filter(|(_, p)| p.default)
            .map(|(k, _)| k.clone())
            .collect()
    }
}

fn is_valid_choice_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
