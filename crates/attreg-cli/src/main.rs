//! # attreg CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use attreg_cli::check_config::{run_check_config, CheckConfigArgs};
use attreg_cli::decide::{run_decide, DecideArgs};
use attreg_cli::logging::init_tracing;
use attreg_cli::matrix::{run_matrix, MatrixArgs};
use attreg_cli::simulate::{run_simulate, SimulateArgs};
use attreg_service::ServiceConfig;

/// Attendee registration status engine.
///
/// Inspects the status transition policy and runs scripted scenarios
/// against the registration service with in-memory collaborators.
#[derive(Parser, Debug)]
#[command(name = "attreg", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the verdict for every (old, new) status pair for one role.
    Matrix(MatrixArgs),

    /// Print the verdict and due posting for a single transition.
    Decide(DecideArgs),

    /// Load a configuration file and report validation violations.
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),

    /// Run a scripted scenario against in-memory collaborators.
    Simulate(SimulateArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config file when it loads; a broken
    // file is reported by the subcommand itself.
    let logging = cli
        .config
        .as_deref()
        .and_then(|path| ServiceConfig::load(path).ok())
        .map(|config| config.logging)
        .unwrap_or_default();
    init_tracing(cli.verbose, &logging);

    tracing::debug!("attreg CLI v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Commands::Matrix(args) => run_matrix(&args),
        Commands::Decide(args) => run_decide(&args),
        Commands::CheckConfig(args) => run_check_config(&args),
        Commands::Simulate(args) => run_simulate(&args, cli.config.as_deref()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attreg_core::Status;
    use attreg_state::ActorRole;

    #[test]
    fn cli_parse_matrix_with_balance() {
        let cli = Cli::try_parse_from([
            "attreg", "matrix", "--role", "regdesk", "--balance", "-42", "--payments", "25500",
        ])
        .unwrap();
        if let Commands::Matrix(args) = cli.command {
            assert_eq!(args.role, ActorRole::Regdesk);
            assert_eq!(args.financial.balance, -42);
            assert_eq!(args.financial.payments, 25500);
            assert!(!args.financial.has_payment);
        } else {
            panic!("expected Matrix command");
        }
    }

    #[test]
    fn cli_parse_decide() {
        let cli = Cli::try_parse_from([
            "attreg",
            "decide",
            "--role",
            "admin",
            "--from",
            "partially paid",
            "--to",
            "checked in",
            "--expected-dues",
            "25500",
        ])
        .unwrap();
        if let Commands::Decide(args) = cli.command {
            assert_eq!(args.role, ActorRole::Admin);
            assert_eq!(args.from, Status::PartiallyPaid);
            assert_eq!(args.to, Status::CheckedIn);
            assert_eq!(args.expected_dues, 25500);
        } else {
            panic!("expected Decide command");
        }
    }

    #[test]
    fn cli_parse_decide_rejects_unknown_status() {
        let result = Cli::try_parse_from([
            "attreg", "decide", "--role", "admin", "--from", "new", "--to", "waitlisted",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_check_config() {
        let cli = Cli::try_parse_from(["attreg", "check-config", "attreg.yaml"]).unwrap();
        if let Commands::CheckConfig(args) = cli.command {
            assert_eq!(args.path, PathBuf::from("attreg.yaml"));
        } else {
            panic!("expected CheckConfig command");
        }
    }

    #[test]
    fn cli_parse_simulate_with_global_config() {
        let cli = Cli::try_parse_from([
            "attreg",
            "-vv",
            "simulate",
            "scenario.yaml",
            "--config",
            "attreg.yaml",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("attreg.yaml")));
        assert!(matches!(cli.command, Commands::Simulate(_)));
    }

    #[test]
    fn cli_parse_requires_subcommand() {
        assert!(Cli::try_parse_from(["attreg"]).is_err());
    }
}
