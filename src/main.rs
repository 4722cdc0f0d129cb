//! `provision` binary entry point.

use std::process::ExitCode;

use clap::Parser;

use provision_cli::cli::{Cli, Command};
use provision_cli::commands;
use provision_cli::logging::{self, Logger};
use provision_cli::progress::Outcome;

/// Exit status when the user quits before the run completes.
const EXIT_CANCELLED: u8 = 130;

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let command = args.subcommand();

    if command == Command::Version {
        commands::version::run();
        return ExitCode::SUCCESS;
    }

    logging::init_subscriber(args.verbose, command.name());
    let log = Logger::new(command.name());

    let result = if command == Command::Check {
        commands::check::run(&args.global, &log).map(|()| ExitCode::SUCCESS)
    } else {
        commands::run::run(&args.global, &log).map(|outcome| match outcome {
            Outcome::Completed { .. } => ExitCode::SUCCESS,
            Outcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
        })
    };

    result.unwrap_or_else(|e| {
        log.error(&format!("{e:#}"));
        if let Some(path) = log.log_path() {
            log.info(&format!("log: {}", path.display()));
        }
        ExitCode::FAILURE
    })
}
