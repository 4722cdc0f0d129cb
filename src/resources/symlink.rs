//! Symlink resource.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::{Applicable, ResourceChange};

/// A symlink resource that can be applied.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// The source file/directory (what the symlink points to).
    pub source: PathBuf,
    /// The target path (where the symlink will be created).
    pub target: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }

    /// Whether `target` is already a link to `source`.
    fn is_linked(&self) -> bool {
        std::fs::read_link(&self.target).is_ok_and(|existing| paths_equal(&existing, &self.source))
    }
}

impl Applicable for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.source.display(), self.target.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        // The parent is kept even when linking fails below.
        super::helpers::fs::ensure_parent_dir(&self.target)?;

        if self.is_linked() {
            return Ok(ResourceChange::AlreadyCorrect);
        }

        create_symlink(&self.source, &self.target)
            .with_context(|| format!("create link: {}", self.target.display()))?;

        Ok(ResourceChange::Applied)
    }
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Create a symlink at `link` pointing to `target`.
fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}
