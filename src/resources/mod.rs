//! Unit executor: one package install or one symlink per call.
pub mod helpers;
pub mod home;
pub mod package;
pub mod symlink;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Link;
use crate::exec::Executor;

/// Something that can be described and applied once.
pub trait Applicable {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Apply the resource change.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be made. Work done before the
    /// failing step (such as creating parent directories) is not undone.
    fn apply(&self) -> Result<ResourceChange>;
}

/// Result of applying a resource change.
///
/// # Examples
///
/// ```
/// use provision_cli::resources::ResourceChange;
///
/// assert_ne!(ResourceChange::Applied, ResourceChange::AlreadyCorrect);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created.
    Applied,
    /// Resource was already in the desired state.
    AlreadyCorrect,
}

/// Performs exactly one unit of work and reports its outcome.
///
/// Errors are plain messages: the caller prints them, it never inspects them.
/// Each call is a single attempt with no retries.
#[cfg_attr(test, mockall::automock)]
pub trait UnitExecutor: Send + Sync {
    /// Install one package.
    ///
    /// # Errors
    ///
    /// Returns the combined output of the package manager on failure.
    fn install_package(&self, name: &str) -> Result<(), String>;

    /// Create one symlink, creating the destination's parent directory first.
    ///
    /// # Errors
    ///
    /// Returns a description of whichever step failed.
    fn create_symlink(&self, link: &Link) -> Result<(), String>;
}

/// [`UnitExecutor`] that touches the real system.
#[derive(Clone)]
pub struct SystemUnits {
    executor: Arc<dyn Executor>,
    install_command: Vec<String>,
    home: Option<PathBuf>,
}

impl std::fmt::Debug for SystemUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemUnits")
            .field("install_command", &self.install_command)
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

impl SystemUnits {
    /// Create a unit executor.
    ///
    /// `home` replaces a leading `~` in link paths; when it is `None` such
    /// links fail individually.
    #[must_use]
    pub fn new(
        executor: Arc<dyn Executor>,
        install_command: Vec<String>,
        home: Option<PathBuf>,
    ) -> Self {
        Self {
            executor,
            install_command,
            home,
        }
    }
}

impl UnitExecutor for SystemUnits {
    fn install_package(&self, name: &str) -> Result<(), String> {
        let resource = package::PackageResource::new(name, &self.install_command, &*self.executor);
        tracing::debug!("installing {}", resource.description());
        resource.apply().map(drop).map_err(|e| format!("{e:#}"))
    }

    fn create_symlink(&self, link: &Link) -> Result<(), String> {
        let resolve = |path: &str| home::expand(path, self.home.as_deref());
        let resource = resolve(&link.from)
            .and_then(|from| Ok(symlink::SymlinkResource::new(from, resolve(&link.to)?)))
            .map_err(|e| format!("{e:#}"))?;
        tracing::debug!("linking {}", resource.description());
        match resource.apply() {
            Ok(ResourceChange::AlreadyCorrect) => {
                tracing::debug!("already linked: {}", resource.description());
                Ok(())
            }
            Ok(ResourceChange::Applied) => Ok(()),
            Err(e) => Err(format!("{e:#}")),
        }
    }
}
