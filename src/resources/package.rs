//! Package installation resource.
use anyhow::{Result, bail};

use super::{Applicable, ResourceChange};
use crate::exec::Executor;

/// A single package installed through the configured package-manager command.
pub struct PackageResource<'a> {
    /// Package name, appended to the install command.
    pub name: &'a str,
    /// Program followed by its leading arguments.
    command: &'a [String],
    /// Executor for running the package manager.
    executor: &'a dyn Executor,
}

impl<'a> PackageResource<'a> {
    /// Create a new package resource.
    #[must_use]
    pub const fn new(name: &'a str, command: &'a [String], executor: &'a dyn Executor) -> Self {
        Self {
            name,
            command,
            executor,
        }
    }
}

impl std::fmt::Debug for PackageResource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageResource")
            .field("name", &self.name)
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl Applicable for PackageResource<'_> {
    fn description(&self) -> String {
        self.name.to_string()
    }

    fn apply(&self) -> Result<ResourceChange> {
        let Some((program, leading)) = self.command.split_first() else {
            bail!("install command is empty");
        };
        let mut args = leading.to_vec();
        args.push(self.name.to_string());

        let result = self.executor.run_unchecked(program, &args)?;
        if result.success {
            return Ok(ResourceChange::Applied);
        }

        let output = result.combined_output();
        if output.trim().is_empty() {
            bail!(
                "{program} exited with status {}",
                result
                    .code
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string())
            );
        }
        bail!("{output}")
    }
}
