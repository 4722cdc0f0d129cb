//! Home-directory lookup and `~` expansion.
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// The current user's home directory.
///
/// Reads `HOME`, or `USERPROFILE` first on Windows.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME"))
    } else {
        std::env::var("HOME")
    };
    var.ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Replace a leading `~` component of `path` with `home`.
///
/// Only `~` on its own or followed by a separator is expanded; `~user` and a
/// `~` later in the path are left alone.
///
/// # Errors
///
/// Returns an error if `path` needs expanding and `home` is `None`.
pub fn expand(path: &str, home: Option<&Path>) -> Result<PathBuf> {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
            .or_else(|| path.strip_prefix("~\\"))
    };
    match (rest, home) {
        (None, _) => Ok(PathBuf::from(path)),
        (Some(rest), Some(home)) => Ok(if rest.is_empty() {
            home.to_path_buf()
        } else {
            home.join(rest)
        }),
        (Some(_), None) => bail!("cannot expand `~` in {path}: home directory is unknown"),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const HOME: &str = "/home/me";

    fn expand_with_home(path: &str) -> PathBuf {
        expand(path, Some(Path::new(HOME))).unwrap()
    }

    #[test]
    fn expands_leading_tilde_slash() {
        assert_eq!(
            expand_with_home("~/.config/vimrc"),
            PathBuf::from("/home/me/.config/vimrc")
        );
    }

    #[test]
    fn expands_bare_tilde() {
        assert_eq!(expand_with_home("~"), PathBuf::from(HOME));
    }

    #[test]
    fn leaves_absolute_paths_alone() {
        assert_eq!(expand_with_home("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn leaves_inner_tilde_alone() {
        assert_eq!(expand_with_home("/tmp/~/x"), PathBuf::from("/tmp/~/x"));
    }

    #[test]
    fn leaves_other_users_alone() {
        assert_eq!(expand_with_home("~root/x"), PathBuf::from("~root/x"));
    }

    #[test]
    fn tilde_without_home_is_an_error() {
        let err = expand("~/x", None).unwrap_err();
        assert!(err.to_string().contains("home directory is unknown"));
    }

    #[test]
    fn plain_path_without_home_is_fine() {
        assert_eq!(expand("relative/x", None).unwrap(), PathBuf::from("relative/x"));
    }
}
