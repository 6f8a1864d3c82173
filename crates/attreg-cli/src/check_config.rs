//! # Check-Config Subcommand
//!
//! Loads a configuration file and reports every validation violation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use attreg_service::{ConfigError, ServiceConfig};

/// Arguments for the check-config subcommand.
#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Path to the YAML configuration file.
    pub path: PathBuf,
}

/// Execute the check-config subcommand. Exits 1 if the file is invalid.
pub fn run_check_config(args: &CheckConfigArgs) -> Result<u8> {
    match ServiceConfig::load(&args.path) {
        Ok(config) => {
            println!("{}: OK", args.path.display());
            println!("  currency:  {}", config.dues.currency);
            println!("  vat rate:  {}%", config.dues.vat_rate_percent);
            println!("  due in:    {} day(s)", config.dues.due_in_days);
            println!("  packages:  {}", config.packages.len());
            for (key, package) in &config.packages {
                println!(
                    "    {key:<20} {:>10}{}",
                    attreg_core::format_minor_units(package.price),
                    if package.default { "  (default)" } else { "" }
                );
            }
            Ok(0)
        }
        Err(ConfigError::Invalid { violations }) => {
            println!("{}: INVALID", args.path.display());
            for v in &violations {
                println!("  {v}");
            }
            Ok(1)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_valid_config() {
        let f = file_with("packages:\n  attendance:\n    description: Ticket\n    price: 25500\n");
        let code = run_check_config(&CheckConfigArgs {
            path: f.path().to_path_buf(),
        })
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn test_invalid_config_exits_one() {
        let f = file_with("logging:\n  severity: LOUD\n");
        let code = run_check_config(&CheckConfigArgs {
            path: f.path().to_path_buf(),
        })
        .unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_unreadable_config_is_error() {
        let result = run_check_config(&CheckConfigArgs {
            path: PathBuf::from("/nonexistent/attreg.yaml"),
        });
        assert!(result.is_err());
    }
}
