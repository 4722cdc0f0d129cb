//! Command: validate the configuration and show what a run would do.
use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::error::ProvisionError;
use crate::logging::Log;

/// Load and validate the configuration and print the plan.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn run(global: &GlobalOpts, log: &dyn Log) -> Result<(), ProvisionError> {
    let setup = super::CommandSetup::init(global, log)?;

    log.stage("Plan");
    for line in plan(&setup.config) {
        log.info(&line);
    }
    super::run::preflight(&setup.config, log);
    Ok(())
}

/// One line per unit of work, in execution order.
#[must_use]
pub fn plan(config: &Config) -> Vec<String> {
    let mut lines = Vec::with_capacity(config.packages.len() + config.links.len() + 1);
    if !config.packages.is_empty() {
        lines.push(format!("install with: {}", config.install.command.join(" ")));
    }
    lines.extend(config.packages.iter().map(|p| format!("package {p}")));
    lines.extend(config.links.iter().map(|l| format!("link {l}")));
    if lines.is_empty() {
        lines.push("nothing to do".to_string());
    }
    lines
}
