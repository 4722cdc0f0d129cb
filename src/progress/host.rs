//! Terminal host: owns the event queue and executes the machine's effects.
//!
//! Every producer (keyboard, resize, timer, interrupt signal and unit
//! workers) sends into one channel. The loop takes one event at a time,
//! feeds it to the [`Machine`] and carries out the returned effects in
//! order, then repaints the status line.
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveToColumn, Show};
use crossterm::event::{self as term_event, Event as TermEvent};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};

use super::machine::{Effect, Event, Machine, Outcome, Unit, UnitResult, Work};
use super::render::Renderer;
use crate::error::HostError;
use crate::resources::UnitExecutor;

/// Timing for the background event producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    /// Interval between animation ticks.
    pub tick_interval: Duration,
    /// How long the input thread waits for a key before re-checking for shutdown.
    pub input_poll: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            input_poll: Duration::from_millis(100),
        }
    }
}

/// Run the machine to completion on the real terminal.
///
/// Raw mode is enabled for the duration of the run and restored on every
/// exit path, including errors.
///
/// # Errors
///
/// Returns [`HostError`] if the terminal cannot be set up, the interrupt
/// handler cannot be installed, or writing to the terminal fails.
pub fn run(
    machine: &mut Machine,
    units: &Arc<dyn UnitExecutor>,
    renderer: &Renderer,
    config: &HostConfig,
) -> Result<Outcome, HostError> {
    let (tx, rx) = mpsc::channel();

    let interrupt = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt.send(Event::Interrupt);
    })?;

    let (width, height) = terminal::size().map_err(HostError::Terminal)?;
    machine.update(Event::Resize { width, height });

    let guard = TerminalGuard::enter()?;
    let stop = StopSignal::new();
    let producers = [
        spawn_input(tx.clone(), stop.clone(), config.input_poll)?,
        spawn_ticker(tx.clone(), stop.clone(), config.tick_interval)?,
    ];

    let mut stdout = io::stdout();
    let result = event_loop(machine, units, renderer, &tx, &rx, &mut stdout);

    stop.stop();
    for handle in producers {
        if handle.join().is_err() {
            tracing::warn!("event producer thread panicked");
        }
    }
    drop(guard);
    result
}

/// Drive `machine` until it quits, reading events from `rx`.
///
/// Units are executed on worker threads that report back through `tx`.
/// Lines are written with `\r\n` endings since the terminal may be in raw
/// mode; the status line is redrawn in place after each event and cleared
/// before returning.
///
/// # Errors
///
/// Returns [`HostError::Write`] if `out` fails, or
/// [`HostError::QueueClosed`] if the channel disconnects before the run ends.
pub fn event_loop<W: Write>(
    machine: &mut Machine,
    units: &Arc<dyn UnitExecutor>,
    renderer: &Renderer,
    tx: &Sender<Event>,
    rx: &Receiver<Event>,
    out: &mut W,
) -> Result<Outcome, HostError> {
    let mut screen = Screen::new(out);
    let mut effects = machine.start();
    loop {
        for effect in effects {
            match effect {
                Effect::Print(line) => screen.print(&renderer.line(&line))?,
                Effect::Dispatch(unit) => spawn_unit(unit, units, tx),
                Effect::Quit => {
                    screen.clear()?;
                    return Ok(machine.outcome().unwrap_or(Outcome::Cancelled));
                }
            }
        }
        screen.repaint(&renderer.render(machine))?;

        let event = rx.recv().map_err(|_| HostError::QueueClosed)?;
        effects = machine.update(event);
    }
}

/// Execute one unit on its own thread and post the result back.
fn spawn_unit(unit: Unit, units: &Arc<dyn UnitExecutor>, tx: &Sender<Event>) {
    let id = unit.id;
    let worker = Arc::clone(units);
    let sender = tx.clone();
    let spawned = thread::Builder::new()
        .name(format!("unit-{}-{}", id.phase, id.index))
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &unit.work {
                Work::Install(name) => worker.install_package(name),
                Work::Link(link) => worker.create_symlink(link),
            }))
            .unwrap_or_else(|_| Err("worker panicked".to_string()));
            let result = match outcome {
                Ok(()) => UnitResult::ok(id),
                Err(e) => UnitResult::failed(id, e),
            };
            // The loop may already be gone after a cancel.
            let _ = sender.send(Event::UnitCompleted(result));
        });

    if let Err(e) = spawned {
        tracing::error!("unable to start worker for {} #{}: {e}", id.phase, id.index);
        let _ = tx.send(Event::UnitCompleted(UnitResult::failed(
            id,
            format!("unable to start worker: {e}"),
        )));
    }
}

/// Forward keyboard and resize events until stopped.
fn spawn_input(
    tx: Sender<Event>,
    stop: StopSignal,
    poll: Duration,
) -> Result<JoinHandle<()>, HostError> {
    thread::Builder::new()
        .name("input".into())
        .spawn(move || {
            while !stop.is_stopped() {
                let ready = match term_event::poll(poll) {
                    Ok(ready) => ready,
                    Err(e) => {
                        tracing::warn!("terminal input unavailable: {e}");
                        return;
                    }
                };
                if !ready {
                    continue;
                }
                let event = match term_event::read() {
                    Ok(TermEvent::Key(key)) => Event::Input(key),
                    Ok(TermEvent::Resize(width, height)) => Event::Resize { width, height },
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("terminal input unavailable: {e}");
                        return;
                    }
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
        })
        .map_err(HostError::Terminal)
}

/// Send a tick every `interval` until stopped.
fn spawn_ticker(
    tx: Sender<Event>,
    stop: StopSignal,
    interval: Duration,
) -> Result<JoinHandle<()>, HostError> {
    thread::Builder::new()
        .name("ticker".into())
        .spawn(move || {
            loop {
                thread::sleep(interval);
                if stop.is_stopped() || tx.send(Event::Tick).is_err() {
                    return;
                }
            }
        })
        .map_err(HostError::Terminal)
}

/// Shutdown flag shared with the producer threads.
#[derive(Debug, Clone, Default)]
struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    fn new() -> Self {
        Self::default()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Raw mode with a hidden cursor; both restored on drop.
#[derive(Debug)]
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, HostError> {
        terminal::enable_raw_mode().map_err(HostError::Terminal)?;
        let guard = Self;
        execute!(io::stdout(), Hide).map_err(HostError::Terminal)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show);
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("unable to restore terminal: {e}");
        }
    }
}

/// Output with one repaintable status line at the bottom.
struct Screen<'a, W: Write> {
    out: &'a mut W,
    status: String,
}

impl<'a, W: Write> Screen<'a, W> {
    const fn new(out: &'a mut W) -> Self {
        Self {
            out,
            status: String::new(),
        }
    }

    /// Print `text` above the status line.
    fn print(&mut self, text: &str) -> Result<(), HostError> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))
            .map_err(HostError::Write)?;
        for row in text.split('\n') {
            write!(self.out, "{row}\r\n").map_err(HostError::Write)?;
        }
        self.status.clear();
        self.out.flush().map_err(HostError::Write)
    }

    /// Replace the status line, skipping the write if nothing changed.
    fn repaint(&mut self, frame: &str) -> Result<(), HostError> {
        if frame == self.status {
            return Ok(());
        }
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))
            .map_err(HostError::Write)?;
        self.out
            .write_all(frame.as_bytes())
            .map_err(HostError::Write)?;
        frame.clone_into(&mut self.status);
        self.out.flush().map_err(HostError::Write)
    }

    fn clear(&mut self) -> Result<(), HostError> {
        queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))
            .map_err(HostError::Write)?;
        self.status.clear();
        self.out.flush().map_err(HostError::Write)
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::Link;
    use crate::progress::machine::{Phase, UnitId, WorkItems};
    use crate::progress::render::RenderConfig;
    use crate::resources::MockUnitExecutor;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn machine(packages: &[&str], links: &[(&str, &str)]) -> Machine {
        let mut m = Machine::new(WorkItems::new(
            packages.iter().map(|p| (*p).to_string()).collect(),
            links.iter().map(|(f, t)| Link::new(*f, *t)).collect(),
        ));
        m.update(Event::Resize {
            width: 60,
            height: 24,
        });
        m
    }

    struct Panicking;

    impl UnitExecutor for Panicking {
        fn install_package(&self, _: &str) -> Result<(), String> {
            panic!("boom")
        }

        fn create_symlink(&self, _: &Link) -> Result<(), String> {
            panic!("boom")
        }
    }

    fn drive(
        machine: &mut Machine,
        units: impl UnitExecutor + 'static,
        queued: Vec<Event>,
    ) -> (Outcome, String) {
        let units: Arc<dyn UnitExecutor> = Arc::new(units);
        let renderer = Renderer::new(RenderConfig::plain());
        let (tx, rx) = mpsc::channel();
        for event in queued {
            tx.send(event).unwrap();
        }
        let mut out = Vec::new();
        let outcome = event_loop(machine, &units, &renderer, &tx, &rx, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    fn position(haystack: &str, needle: &str) -> usize {
        haystack
            .find(needle)
            .unwrap_or_else(|| panic!("{needle:?} not in {haystack:?}"))
    }

    #[test]
    fn runs_both_phases_in_order() {
        let mut units = MockUnitExecutor::new();
        units.expect_install_package().times(2).returning(|_| Ok(()));
        units.expect_create_symlink().times(1).returning(|_| Ok(()));
        let mut m = machine(&["git", "vim"], &[("~/.vimrc", "~/.config/vimrc")]);

        let (outcome, out) = drive(&mut m, units, Vec::new());

        assert_eq!(outcome, Outcome::Completed { had_errors: false });
        let order = [
            "Installing packages...\r\n",
            " ✔ git\r\n",
            " ✔ vim\r\n",
            "Done! Packages installed\r\n",
            "\r\nCreating symlinks...\r\n",
            " ✔ ~/.vimrc -> ~/.config/vimrc\r\n",
            "Done! Symlinks created\r\n",
        ];
        let positions: Vec<usize> = order.iter().map(|s| position(&out, s)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{out:?}");
    }

    #[test]
    fn failure_is_reported_and_run_continues() {
        let mut units = MockUnitExecutor::new();
        units.expect_install_package().returning(|name| {
            if name == "badpkg" {
                Err("error: target not found: badpkg\n".to_string())
            } else {
                Ok(())
            }
        });
        let mut m = machine(&["badpkg", "git"], &[]);

        let (outcome, out) = drive(&mut m, units, Vec::new());

        assert_eq!(outcome, Outcome::Completed { had_errors: true });
        assert!(out.contains(" ✗ badpkg\r\n    error: target not found: badpkg\r\n"));
        assert!(out.contains(" ✔ git\r\n"));
        assert!(out.contains("Done! Packages installed, but with errors\r\n"));
    }

    #[test]
    fn worker_panic_becomes_failure() {
        let mut m = machine(&["git"], &[]);

        let (outcome, out) = drive(&mut m, Panicking, Vec::new());

        assert_eq!(outcome, Outcome::Completed { had_errors: true });
        assert!(out.contains("    worker panicked\r\n"));
    }

    #[test]
    fn interrupt_cancels_without_summary() {
        let mut units = MockUnitExecutor::new();
        units.expect_install_package().returning(|_| Ok(()));
        let mut m = machine(&["git", "vim"], &[]);

        let (outcome, out) = drive(&mut m, units, vec![Event::Interrupt]);

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(out.contains("Installing packages...\r\n"));
        assert!(!out.contains("Done!"));
    }

    #[test]
    fn quit_key_cancels() {
        let mut units = MockUnitExecutor::new();
        units.expect_install_package().returning(|_| Ok(()));
        let mut m = machine(&["git"], &[]);
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);

        let (outcome, _) = drive(&mut m, units, vec![Event::Input(q)]);

        assert_eq!(outcome, Outcome::Cancelled);
    }

    #[test]
    fn no_work_finishes_without_output() {
        let mut m = machine(&[], &[]);
        let (outcome, out) = drive(&mut m, MockUnitExecutor::new(), Vec::new());
        assert_eq!(outcome, Outcome::Completed { had_errors: false });
        assert!(!out.contains("Installing"));
        assert!(!out.contains("Done!"));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut units = MockUnitExecutor::new();
        units.expect_create_symlink().times(1).returning(|_| Ok(()));
        let mut m = machine(&[], &[("~/a", "~/b")]);
        let stale = UnitResult::failed(
            UnitId {
                phase: Phase::Symlinks,
                index: 7,
            },
            "late",
        );

        let (outcome, out) = drive(&mut m, units, vec![Event::UnitCompleted(stale)]);

        assert_eq!(outcome, Outcome::Completed { had_errors: false });
        assert!(!out.contains("late"));
    }

    #[test]
    fn repaint_skips_identical_frames() {
        let mut out = Vec::new();
        let mut screen = Screen::new(&mut out);
        screen.repaint("frame").unwrap();
        screen.repaint("frame").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("frame").count(), 1);
    }

    #[test]
    fn print_forces_next_repaint() {
        let mut out = Vec::new();
        let mut screen = Screen::new(&mut out);
        screen.repaint("frame").unwrap();
        screen.print("line").unwrap();
        screen.repaint("frame").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("frame").count(), 2);
        assert!(text.contains("line\r\n"));
    }

    #[test]
    fn multi_line_text_uses_crlf() {
        let mut out = Vec::new();
        Screen::new(&mut out).print("a\nb").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("a\r\nb\r\n"), "{text:?}");
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_stopped());
        signal.stop();
        assert!(clone.is_stopped());
    }

    #[test]
    fn default_config_ticks_ten_times_a_second() {
        assert_eq!(HostConfig::default().tick_interval, Duration::from_millis(100));
    }
}
