//! Command: install packages, then create symlinks, with live progress.
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::error::ProvisionError;
use crate::exec::SystemExecutor;
use crate::logging::Log;
use crate::progress::{self, HostConfig, Machine, Outcome, RenderConfig, Renderer};
use crate::resources::{SystemUnits, UnitExecutor, home};

/// Run both phases on the terminal and report how the run ended.
///
/// Per-unit failures are part of a completed run, not errors.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the terminal
/// host fails.
pub fn run(global: &GlobalOpts, log: &dyn Log) -> Result<Outcome, ProvisionError> {
    let setup = super::CommandSetup::init(global, log)?;
    preflight(&setup.config, log);

    let units: Arc<dyn UnitExecutor> = Arc::new(SystemUnits::new(
        Arc::new(SystemExecutor),
        setup.config.install.command.clone(),
        home::home_dir(),
    ));
    let renderer = Renderer::new(if global.no_color {
        RenderConfig::plain()
    } else {
        RenderConfig::styled()
    });
    let mut machine = Machine::new(setup.config.work_items());

    log.stage("Provisioning");
    let outcome = progress::run(&mut machine, &units, &renderer, &HostConfig::default())?;
    report(outcome, log);
    Ok(outcome)
}

/// Warn about problems that will make every unit of a phase fail.
pub(super) fn preflight(config: &Config, log: &dyn Log) {
    if config.packages.is_empty() {
        return;
    }
    match config.install.command.first() {
        Some(program) => match which::which(program) {
            Ok(path) => log.debug(&format!("install program: {}", path.display())),
            Err(_) => log.warn(&format!(
                "{program} not found on PATH; package installs will fail"
            )),
        },
        None => log.warn("install command is empty; package installs will fail"),
    }
}

/// Summarise the outcome after the terminal has been restored.
fn report(outcome: Outcome, log: &dyn Log) {
    match outcome {
        Outcome::Completed { had_errors: false } => log.info("all done"),
        Outcome::Completed { had_errors: true } => {
            log.warn("finished with errors; see the log file for details");
        }
        Outcome::Cancelled => log.warn("cancelled before completion"),
    }
}
