//! Top-level subcommand orchestration.
pub mod check;
pub mod run;
pub mod version;

use std::path::PathBuf;

use crate::cli::GlobalOpts;
use crate::config::{self, Config, validation};
use crate::error::ConfigError;
use crate::logging::Log;

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Where the configuration was read from.
    pub config_path: PathBuf,
    /// The loaded configuration.
    pub config: Config,
}

impl CommandSetup {
    /// Resolve the config path, load it and report validation warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if no path can be determined or the file cannot be
    /// read or parsed.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self, ConfigError> {
        let config_path = config::resolve_path(global.config.as_deref())?;

        log.stage("Loading configuration");
        log.debug(&format!("config: {}", config_path.display()));
        let config = Config::load(&config_path)?;
        log.info(&format!(
            "loaded {} packages, {} links",
            config.packages.len(),
            config.links.len()
        ));

        let warnings = validation::validate(&config);
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!("  {warning}"));
            }
        }

        Ok(Self {
            config_path,
            config,
        })
    }
}
