//! Command-line argument definitions.

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the provisioner.
#[derive(Parser, Debug)]
#[command(
    name = "provision",
    about = "Install packages and create symlinks with live progress",
    version
)]
pub struct Cli {
    /// Subcommand to run; `run` when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

impl Cli {
    /// The subcommand to execute, defaulting to [`Command::Run`].
    #[must_use]
    pub const fn subcommand(&self) -> Command {
        match self.command {
            Some(command) => command,
            None => Command::Run,
        }
    }
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Path to the provisioning file (overrides `CONFIG_PATH`)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Disable coloured output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Install packages, then create symlinks
    Run,
    /// Load and validate the configuration and print the plan
    Check,
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Check => "check",
            Self::Version => "version",
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::parse_from(["provision"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.subcommand(), Command::Run);
    }

    #[test]
    fn parse_run() {
        let cli = Cli::parse_from(["provision", "run"]);
        assert_eq!(cli.subcommand(), Command::Run);
    }

    #[test]
    fn parse_check() {
        let cli = Cli::parse_from(["provision", "check"]);
        assert_eq!(cli.subcommand(), Command::Check);
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["provision", "version"]);
        assert_eq!(cli.subcommand(), Command::Version);
    }

    #[test]
    fn parse_config_before_subcommand() {
        let cli = Cli::parse_from(["provision", "--config", "/tmp/p.toml", "check"]);
        assert_eq!(
            cli.global.config,
            Some(std::path::PathBuf::from("/tmp/p.toml"))
        );
    }

    #[test]
    fn parse_config_short_after_subcommand() {
        let cli = Cli::parse_from(["provision", "run", "-c", "p.toml"]);
        assert_eq!(cli.global.config, Some(std::path::PathBuf::from("p.toml")));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["provision", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_no_color() {
        let cli = Cli::parse_from(["provision", "--no-color", "run"]);
        assert!(cli.global.no_color);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["provision", "install"]).is_err());
    }

    #[test]
    fn command_names() {
        assert_eq!(Command::Run.name(), "run");
        assert_eq!(Command::Check.name(), "check");
        assert_eq!(Command::Version.name(), "version");
    }
}
