//! Work-item source: the TOML file listing packages and links.
//!
//! ```toml
//! packages = ["git", "vim"]
//!
//! [[links]]
//! from = "~/.dotfiles/vimrc"
//! to = "~/.vimrc"
//!
//! [install]
//! command = ["sudo", "pacman", "-S", "--noconfirm"]
//! ```
//!
//! The default location is `~/.dotfiles/provision.toml`. YAML configs from
//! the older di0build setup (`~/.dotfiles/di0build.yaml`) are not read and
//! must be converted to this layout.
pub mod validation;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::progress::WorkItems;
use crate::resources::home;

/// Environment variable that overrides the default config location.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Config location relative to the home directory.
const DEFAULT_RELATIVE_PATH: &str = ".dotfiles/provision.toml";

/// A symlink to create: `to` becomes a link pointing at `from`.
///
/// Either path may start with `~`, which is replaced by the home directory
/// when the link is created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Link {
    /// What the link points to.
    pub from: String,
    /// Where the link is created.
    pub to: String,
}

impl Link {
    /// Create a link entry.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// The `[install]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallSettings {
    /// Program and leading arguments; the package name is appended.
    #[serde(default = "default_install_command")]
    pub command: Vec<String>,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            command: default_install_command(),
        }
    }
}

fn default_install_command() -> Vec<String> {
    ["sudo", "pacman", "-S", "--noconfirm"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Everything loaded from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Packages to install, in order.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Links to create, in order.
    #[serde(default)]
    pub links: Vec<Link>,
    /// How packages are installed.
    #[serde(default)]
    pub install: InstallSettings,
}

impl Config {
    /// Read and parse the config file at `path`.
    ///
    /// Unlike optional config fragments, a missing file is an error here:
    /// without it there is nothing to provision.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse config text.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if `content` does not match the schema.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Ordered work for the two phases.
    #[must_use]
    pub fn work_items(&self) -> WorkItems {
        WorkItems::new(self.packages.clone(), self.links.clone())
    }
}

/// Resolve the config path: `explicit`, then `$CONFIG_PATH`, then
/// `~/.dotfiles/provision.toml`.
///
/// # Errors
///
/// Returns [`ConfigError::NoPath`] when none of the sources is available.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_path_from(
        explicit,
        std::env::var(CONFIG_PATH_ENV).ok(),
        home::home_dir(),
    )
}

/// [`resolve_path`] with its environment inputs made explicit.
fn resolve_path_from(
    explicit: Option<&Path>,
    env_value: Option<String>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(value));
    }
    home.map(|h| h.join(DEFAULT_RELATIVE_PATH))
        .ok_or(ConfigError::NoPath)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
packages = ["git", "vim"]

[[links]]
from = "~/.dotfiles/vimrc"
to = "~/.vimrc"

[[links]]
from = "~/.dotfiles/nvim"
to = "~/.config/nvim"

[install]
command = ["paru", "-S", "--noconfirm"]
"#,
        )
        .unwrap();
        assert_eq!(config.packages, vec!["git", "vim"]);
        assert_eq!(config.links.len(), 2);
        assert_eq!(config.links[1], Link::new("~/.dotfiles/nvim", "~/.config/nvim"));
        assert_eq!(config.install.command, vec!["paru", "-S", "--noconfirm"]);
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.packages.is_empty());
        assert!(config.links.is_empty());
        assert_eq!(
            config.install.command,
            vec!["sudo", "pacman", "-S", "--noconfirm"]
        );
    }

    #[test]
    fn parse_install_table_without_command_uses_default() {
        let config = Config::parse("[install]\n").unwrap();
        assert_eq!(config.install, InstallSettings::default());
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        assert!(Config::parse("pakages = [\"git\"]").is_err());
        assert!(Config::parse("[[links]]\nfrom = \"a\"\nto = \"b\"\nmode = 1\n").is_err());
    }

    #[test]
    fn parse_rejects_di0build_yaml() {
        let yaml = "packages:\n  - git\nlinks:\n  - from: ~/a\n    to: ~/b\n";
        assert!(Config::parse(yaml).is_err());
    }

    #[test]
    fn parse_rejects_link_without_destination() {
        assert!(Config::parse("[[links]]\nfrom = \"a\"\n").is_err());
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provision.toml");
        std::fs::write(&path, "packages = git").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provision.toml");
        std::fs::write(&path, "packages = [\"git\"]\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().packages, vec!["git"]);
    }

    #[test]
    fn work_items_preserve_order() {
        let config = Config {
            packages: vec!["b".into(), "a".into()],
            links: vec![Link::new("~/x", "~/y")],
            install: InstallSettings::default(),
        };
        let items = config.work_items();
        assert_eq!(items.packages(), ["b".to_string(), "a".to_string()]);
        assert_eq!(items.links(), [Link::new("~/x", "~/y")]);
    }

    #[test]
    fn link_display() {
        assert_eq!(
            Link::new("~/.vimrc", "~/.config/vimrc").to_string(),
            "~/.vimrc -> ~/.config/vimrc"
        );
    }

    #[test]
    fn resolve_prefers_explicit_path() {
        let path = resolve_path_from(
            Some(Path::new("/etc/provision.toml")),
            Some("/env.toml".into()),
            Some(PathBuf::from("/home/me")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/etc/provision.toml"));
    }

    #[test]
    fn resolve_uses_env_before_home() {
        let path =
            resolve_path_from(None, Some("/env.toml".into()), Some(PathBuf::from("/home/me")))
                .unwrap();
        assert_eq!(path, PathBuf::from("/env.toml"));
    }

    #[test]
    fn resolve_ignores_empty_env() {
        let path =
            resolve_path_from(None, Some(String::new()), Some(PathBuf::from("/home/me"))).unwrap();
        assert_eq!(path, PathBuf::from("/home/me/.dotfiles/provision.toml"));
    }

    #[test]
    fn resolve_without_any_source_fails() {
        assert!(matches!(
            resolve_path_from(None, None, None),
            Err(ConfigError::NoPath)
        ));
    }
}
