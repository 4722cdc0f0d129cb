// Shared helpers for integration tests.
//
// Provides a temporary home directory with a provisioning file in it, fake
// collaborators for the package manager, and a driver that runs the event
// loop against an in-memory writer.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};

use anyhow::Result;
use provision_cli::config::Config;
use provision_cli::exec::{ExecResult, Executor};
use provision_cli::progress::{self, Event, Machine, Outcome, RenderConfig, Renderer};
use provision_cli::resources::{SystemUnits, UnitExecutor};

/// Erase-line sequence written before every repaint and printed line.
const CLEAR_LINE: &str = "\x1b[2K";

/// An isolated home directory backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory standing in for `$HOME`.
    pub home: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create a new, empty context.
    pub fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Path of the fake home directory.
    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// Path of the provisioning file inside the fake home.
    pub fn config_path(&self) -> PathBuf {
        self.home.path().join(".dotfiles").join("provision.toml")
    }

    /// Write the provisioning file.
    pub fn write_config(&self, content: &str) {
        let path = self.config_path();
        std::fs::create_dir_all(path.parent().expect("config parent")).expect("create config dir");
        std::fs::write(path, content).expect("write provision.toml");
    }

    /// Create a regular file (and its parents) relative to the home directory.
    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.home.path().join(relative);
        std::fs::create_dir_all(path.parent().expect("file parent")).expect("create dirs");
        std::fs::write(path, content).expect("write file");
    }

    /// Load the provisioning file.
    pub fn load_config(&self) -> Config {
        Config::load(&self.config_path()).expect("load config")
    }

    /// Real unit executor rooted at the fake home, installing through `installer`.
    pub fn units(&self, installer: FakeInstaller, config: &Config) -> Arc<dyn UnitExecutor> {
        Arc::new(SystemUnits::new(
            Arc::new(installer),
            config.install.command.clone(),
            Some(self.home.path().to_path_buf()),
        ))
    }
}

/// Package manager stand-in: succeeds unless the package is listed as broken.
#[derive(Debug, Default)]
pub struct FakeInstaller {
    broken: HashSet<String>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeInstaller {
    /// An installer where every package installs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` fail with a pacman-style error.
    pub fn with_broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    /// Shared record of every `program args..` invocation.
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.calls)
    }
}

impl Executor for FakeInstaller {
    fn run_unchecked(&self, program: &str, args: &[String]) -> Result<ExecResult> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().cloned());
        self.calls.lock().expect("calls lock").push(call);

        let name = args.last().map(String::as_str).unwrap_or_default();
        let broken = self.broken.contains(name);
        Ok(ExecResult {
            stdout: String::new(),
            stderr: if broken {
                format!("error: target not found: {name}\n")
            } else {
                String::new()
            },
            success: !broken,
            code: Some(i32::from(broken)),
        })
    }
}

/// Drive `config`'s work through the event loop with `queued` events already
/// waiting. Returns the outcome and the raw terminal output.
pub fn drive(
    config: &Config,
    units: &Arc<dyn UnitExecutor>,
    queued: Vec<Event>,
) -> (Outcome, String) {
    let mut machine = Machine::new(config.work_items());
    machine.update(Event::Resize {
        width: 80,
        height: 24,
    });
    let renderer = Renderer::new(RenderConfig::plain());
    let (tx, rx) = mpsc::channel();
    for event in queued {
        tx.send(event).expect("queue event");
    }
    let mut out = Vec::new();
    let outcome =
        progress::event_loop(&mut machine, units, &renderer, &tx, &rx, &mut out).expect("run");
    (outcome, String::from_utf8(out).expect("utf-8 output"))
}

/// The lines printed above the status line, without repaint noise.
pub fn printed_lines(out: &str) -> Vec<String> {
    let mut rows: Vec<&str> = out.split("\r\n").collect();
    // The trailing piece is the cleared status line.
    rows.pop();
    rows.into_iter()
        .map(|row| row.rsplit(CLEAR_LINE).next().unwrap_or(row).trim().to_string())
        .collect()
}
