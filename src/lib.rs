//! Two-phase workstation provisioner.
//!
//! Installs a list of packages one at a time, then creates a list of
//! symlinks, while a single repainted status line shows a spinner, the
//! current item, an eased progress bar and a counter.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: load and validate the TOML work list
//! - **[`resources`]**: single-attempt package installs and symlinks
//! - **[`progress`]**: the state machine, its renderer and the terminal host
//! - **[`commands`]**: top-level subcommand orchestration (`run`, `check`, `version`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod progress;
pub mod resources;
