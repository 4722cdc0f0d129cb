//! File-system resource helpers.
use anyhow::{Context as _, Result};
use std::path::Path;

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c/file");
        ensure_parent_dir(&target).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
        assert!(!target.exists(), "only the parent should be created");
    }

    #[test]
    fn existing_parent_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        ensure_parent_dir(&dir.path().join("file")).unwrap();
    }

    #[test]
    fn bare_file_name_has_no_parent_to_create() {
        ensure_parent_dir(Path::new("file")).unwrap();
    }

    #[test]
    fn parent_blocked_by_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let err = ensure_parent_dir(&dir.path().join("blocker/child/file")).unwrap_err();
        assert!(err.to_string().contains("create parent"));
    }
}
