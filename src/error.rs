//! Domain-specific error types for the provisioner.
//!
//! Only startup can fail fatally. Per-unit failures (a package that will not
//! install, a link that cannot be created) are plain messages carried by
//! completion events and never surface here.
//!
//! # Error hierarchy
//!
//! ```text
//! ProvisionError
//! ├── Config(ConfigError): config path resolution, reading, parsing
//! └── Host(HostError):     terminal setup and the event loop
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the provisioner.
///
/// Convertible to [`anyhow::Error`] at the binary boundary.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The work-item source could not be obtained.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The terminal host failed to start or broke down.
    #[error("Terminal error: {0}")]
    Host(#[from] HostError),
}

/// Errors that arise while locating and loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither an explicit path nor a home directory was available.
    #[error("cannot determine config path: set --config, CONFIG_PATH or HOME")]
    NoPath,

    /// The config file could not be read.
    #[error("Unable to read config {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or does not match the schema.
    #[error("Unable to parse config {path}: {source}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Underlying deserialization error.
        source: toml::de::Error,
    },
}

/// Errors raised by the terminal event-loop host.
#[derive(Error, Debug)]
pub enum HostError {
    /// Switching the terminal into raw mode (or back) failed.
    #[error("unable to start terminal UI: {0}")]
    Terminal(#[source] std::io::Error),

    /// Writing a frame or line to the terminal failed.
    #[error("unable to write to terminal: {0}")]
    Write(#[source] std::io::Error),

    /// The Ctrl-C handler could not be installed.
    #[error("unable to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Every event producer hung up while work was still pending.
    #[error("event queue closed before the run finished")]
    QueueClosed,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn config_error_no_path_display() {
        assert_eq!(
            ConfigError::NoPath.to_string(),
            "cannot determine config path: set --config, CONFIG_PATH or HOME"
        );
    }

    #[test]
    fn config_error_io_display() {
        let e = ConfigError::Io {
            path: PathBuf::from("/home/me/.dotfiles/provision.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let text = e.to_string();
        assert!(text.starts_with("Unable to read config"));
        assert!(text.contains("/home/me/.dotfiles/provision.toml"));
        assert!(text.contains("no such file"));
    }

    #[test]
    fn config_error_io_has_source() {
        use std::error::Error as StdError;
        let e = ConfigError::Io {
            path: PathBuf::from("x.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn config_error_parse_display() {
        let source = toml::from_str::<toml::Value>("packages = [")
            .expect_err("truncated array must not parse");
        let e = ConfigError::Parse {
            path: PathBuf::from("broken.toml"),
            source,
        };
        assert!(e.to_string().starts_with("Unable to parse config broken.toml"));
    }

    #[test]
    fn host_error_display() {
        let e = HostError::Terminal(io::Error::other("not a tty"));
        assert_eq!(e.to_string(), "unable to start terminal UI: not a tty");
        assert_eq!(
            HostError::QueueClosed.to_string(),
            "event queue closed before the run finished"
        );
    }

    #[test]
    fn provision_error_from_config_error() {
        let e: ProvisionError = ConfigError::NoPath.into();
        assert!(e.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn provision_error_from_host_error() {
        let e: ProvisionError = HostError::QueueClosed.into();
        assert!(e.to_string().starts_with("Terminal error:"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<ProvisionError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<HostError>();
    }

    #[test]
    fn errors_convert_to_anyhow() {
        let _config: anyhow::Error = ConfigError::NoPath.into();
        let _host: anyhow::Error = HostError::QueueClosed.into();
    }
}
