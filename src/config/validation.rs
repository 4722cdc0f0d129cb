//! Non-fatal configuration checks reported before a run starts.
use std::collections::HashSet;

use super::Config;

/// A validation warning detected after loading the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The config section the warning belongs to (`packages`, `links`, `install`).
    pub source: &'static str,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(source: &'static str, item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source,
            item: item.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.source, self.item, self.message)
    }
}

/// Check `config` for entries that are likely mistakes.
///
/// Nothing here stops a run: duplicates are still attempted in order and an
/// empty name simply fails when its unit executes.
#[must_use]
pub fn validate(config: &Config) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for (i, name) in config.packages.iter().enumerate() {
        if name.trim().is_empty() {
            warnings.push(ValidationWarning::new(
                "packages",
                format!("#{}", i + 1),
                "package name is empty",
            ));
        } else if !seen.insert(name.as_str()) {
            warnings.push(ValidationWarning::new(
                "packages",
                name,
                "package is listed more than once",
            ));
        }
    }

    let mut destinations = HashSet::new();
    for (i, link) in config.links.iter().enumerate() {
        if link.from.trim().is_empty() || link.to.trim().is_empty() {
            warnings.push(ValidationWarning::new(
                "links",
                format!("#{}", i + 1),
                "link has an empty `from` or `to`",
            ));
            continue;
        }
        if !destinations.insert(link.to.as_str()) {
            warnings.push(ValidationWarning::new(
                "links",
                &link.to,
                "destination is used by more than one link",
            ));
        }
    }

    if config.install.command.is_empty() {
        warnings.push(ValidationWarning::new(
            "install",
            "command",
            "install command is empty; every package will fail",
        ));
    }

    warnings
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::{InstallSettings, Link};

    fn config(packages: &[&str], links: &[(&str, &str)]) -> Config {
        Config {
            packages: packages.iter().map(|p| (*p).to_string()).collect(),
            links: links.iter().map(|(f, t)| Link::new(*f, *t)).collect(),
            install: InstallSettings::default(),
        }
    }

    #[test]
    fn clean_config_has_no_warnings() {
        let c = config(&["git", "vim"], &[("~/a", "~/b"), ("~/c", "~/d")]);
        assert!(validate(&c).is_empty());
    }

    #[test]
    fn empty_package_name_is_reported_by_position() {
        let warnings = validate(&config(&["git", "  "], &[]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].item, "#2");
        assert_eq!(warnings[0].source, "packages");
    }

    #[test]
    fn duplicate_package_is_reported_once_per_repeat() {
        let warnings = validate(&config(&["git", "vim", "git"], &[]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].item, "git");
    }

    #[test]
    fn duplicate_destination_is_reported() {
        let warnings = validate(&config(&[], &[("~/a", "~/x"), ("~/b", "~/x")]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "links");
        assert_eq!(warnings[0].item, "~/x");
    }

    #[test]
    fn empty_link_endpoint_is_reported() {
        let warnings = validate(&config(&[], &[("", "~/x")]));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].item, "#1");
    }

    #[test]
    fn empty_install_command_is_reported() {
        let mut c = config(&["git"], &[]);
        c.install.command.clear();
        let warnings = validate(&c);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "install");
    }

    #[test]
    fn warning_display() {
        let w = ValidationWarning::new("links", "~/x", "destination is used by more than one link");
        assert_eq!(
            w.to_string(),
            "links [~/x]: destination is used by more than one link"
        );
    }
}
