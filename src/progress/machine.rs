//! The progress state machine.
//!
//! [`Machine::update`] is the only place state changes. It takes one
//! [`Event`], mutates the owned [`ProgressState`], and returns the
//! [`Effect`]s the host must carry out: lines to print, the next unit to run,
//! or the request to stop. No I/O happens here.
//!
//! ```text
//! Installing ──(last package done)──▶ Linking ──(last link done)──▶ Finished
//!      │                                 │                             ▲
//!      └──────────────(quit input)───────┴─────────────────────────────┘
//! ```
//!
//! Exactly one unit is in flight between a [`Effect::Dispatch`] and the
//! matching [`Event::UnitCompleted`]. Completions that do not match the
//! in-flight unit are discarded without touching state.
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::animation::Animation;
use crate::config::Link;

/// One of the two ordered stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Installing packages.
    Packages,
    /// Creating symlinks.
    Symlinks,
}

impl Phase {
    /// The phase that follows this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Packages => Some(Self::Symlinks),
            Self::Symlinks => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Packages => write!(f, "packages"),
            Self::Symlinks => write!(f, "symlinks"),
        }
    }
}

/// The ordered work for both phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkItems {
    packages: Vec<String>,
    links: Vec<Link>,
}

impl WorkItems {
    /// Create the work list.
    #[must_use]
    pub const fn new(packages: Vec<String>, links: Vec<Link>) -> Self {
        Self { packages, links }
    }

    /// Packages, in install order.
    #[must_use]
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Links, in creation order.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Number of units in `phase`.
    #[must_use]
    pub const fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::Packages => self.packages.len(),
            Phase::Symlinks => self.links.len(),
        }
    }

    /// The unit of work at `id`, if it exists.
    #[must_use]
    pub fn work(&self, id: UnitId) -> Option<Work> {
        match id.phase {
            Phase::Packages => self.packages.get(id.index).cloned().map(Work::Install),
            Phase::Symlinks => self.links.get(id.index).cloned().map(Work::Link),
        }
    }

    /// Text used in the completion line for the unit at `id`.
    #[must_use]
    pub fn describe(&self, id: UnitId) -> Option<String> {
        match id.phase {
            Phase::Packages => self.packages.get(id.index).cloned(),
            Phase::Symlinks => self.links.get(id.index).map(ToString::to_string),
        }
    }

    /// Short name shown on the status line for the unit at `id`.
    #[must_use]
    pub fn display_name(&self, id: UnitId) -> Option<&str> {
        match id.phase {
            Phase::Packages => self.packages.get(id.index).map(String::as_str),
            Phase::Symlinks => self.links.get(id.index).map(|l| l.to.as_str()),
        }
    }
}

/// Identifies one unit: its phase and its index within that phase's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId {
    /// Phase the unit belongs to.
    pub phase: Phase,
    /// Position in the phase's list.
    pub index: usize,
}

/// What a unit does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    /// Install the named package.
    Install(String),
    /// Create the link.
    Link(Link),
}

/// A request for the unit executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Which unit this is; echoed back in the [`UnitResult`].
    pub id: UnitId,
    /// The work to perform.
    pub work: Work,
}

/// Outcome of one unit, delivered back to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitResult {
    /// The unit that finished.
    pub id: UnitId,
    /// Failure message, or `None` on success.
    pub error: Option<String>,
}

impl UnitResult {
    /// A successful result.
    #[must_use]
    pub const fn ok(id: UnitId) -> Self {
        Self { id, error: None }
    }

    /// A failed result.
    #[must_use]
    pub fn failed(id: UnitId, error: impl Into<String>) -> Self {
        Self {
            id,
            error: Some(error.into()),
        }
    }
}

/// Everything the machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The terminal was resized.
    Resize {
        /// New width in columns.
        width: u16,
        /// New height in rows.
        height: u16,
    },
    /// A key was pressed.
    Input(KeyEvent),
    /// Animation timer fired.
    Tick,
    /// The process received an interrupt signal.
    Interrupt,
    /// A dispatched unit finished.
    UnitCompleted(UnitResult),
}

/// A discrete line printed above the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A phase with work in it has begun.
    PhaseStarted {
        /// The phase being entered.
        phase: Phase,
        /// An earlier phase printed output, so the header is set apart.
        separated: bool,
    },
    /// A unit succeeded.
    UnitSucceeded {
        /// Package name or `from -> to`.
        description: String,
    },
    /// A unit failed.
    UnitFailed {
        /// Package name or `from -> to`.
        description: String,
        /// Error text with surrounding whitespace trimmed.
        error: String,
    },
    /// The last unit of a phase completed.
    PhaseFinished {
        /// The phase that completed.
        phase: Phase,
        /// Whether any unit of the phase failed.
        had_errors: bool,
    },
}

/// Side effects requested by the machine, in the order they must happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Print a line above the status line.
    Print(Line),
    /// Run a unit off the event-loop thread.
    Dispatch(Unit),
    /// Stop the event loop.
    Quit,
}

/// Coarse state derived from [`ProgressState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Working through packages.
    Installing,
    /// Working through links.
    Linking,
    /// Done or cancelled.
    Finished,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Both phases ran to the end.
    Completed {
        /// Whether any unit in either phase failed.
        had_errors: bool,
    },
    /// The user quit before the end.
    Cancelled,
}

/// The mutable aggregate owned by the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    /// Current phase; only ever moves forward.
    pub phase: Phase,
    /// Index of the unit in flight within the current phase.
    pub cursor: usize,
    /// Set by the first failure in the current phase; cleared on phase change.
    pub phase_had_error: bool,
    /// Set once the run is over; nothing changes afterwards.
    pub quitting: bool,
    /// Last known terminal width.
    pub viewport_width: u16,
    /// Last known terminal height.
    pub viewport_height: u16,
    /// `cursor / len` for the current phase.
    pub progress_fraction: f64,
    /// Spinner and bar animation.
    pub animation: Animation,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            phase: Phase::Packages,
            cursor: 0,
            phase_had_error: false,
            quitting: false,
            viewport_width: 0,
            viewport_height: 0,
            progress_fraction: 0.0,
            animation: Animation::default(),
        }
    }
}

/// The progress controller.
#[derive(Debug, Clone)]
pub struct Machine {
    items: WorkItems,
    state: ProgressState,
    in_flight: Option<UnitId>,
    started: bool,
    cancelled: bool,
    any_error: bool,
}

impl Machine {
    /// Create a machine for `items`, positioned before the first package.
    #[must_use]
    pub fn new(items: WorkItems) -> Self {
        Self {
            items,
            state: ProgressState::default(),
            in_flight: None,
            started: false,
            cancelled: false,
            any_error: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ProgressState {
        &self.state
    }

    /// The work list.
    #[must_use]
    pub const fn items(&self) -> &WorkItems {
        &self.items
    }

    /// The unit currently awaiting completion.
    #[must_use]
    pub const fn in_flight(&self) -> Option<UnitId> {
        self.in_flight
    }

    /// Coarse status.
    #[must_use]
    pub const fn status(&self) -> Status {
        if self.state.quitting {
            return Status::Finished;
        }
        match self.state.phase {
            Phase::Packages => Status::Installing,
            Phase::Symlinks => Status::Linking,
        }
    }

    /// How the run ended, once it has.
    #[must_use]
    pub const fn outcome(&self) -> Option<Outcome> {
        if !self.state.quitting {
            None
        } else if self.cancelled {
            Some(Outcome::Cancelled)
        } else {
            Some(Outcome::Completed {
                had_errors: self.any_error,
            })
        }
    }

    /// Number of units in the current phase.
    #[must_use]
    pub const fn phase_len(&self) -> usize {
        self.items.len(self.state.phase)
    }

    /// Status-line label for the unit at the cursor: the verb and the item name.
    #[must_use]
    pub fn current_label(&self) -> Option<(&'static str, &str)> {
        let verb = match self.state.phase {
            Phase::Packages => "Installing ",
            Phase::Symlinks => "Linking ",
        };
        self.items
            .display_name(self.cursor_id())
            .map(|name| (verb, name))
    }

    /// Begin the run: announce the first non-empty phase and dispatch its
    /// first unit. Empty phases are complete without any output; with no
    /// work at all the run finishes immediately.
    ///
    /// Calling this again has no effect.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.started || self.state.quitting {
            return Vec::new();
        }
        self.started = true;
        let mut effects = Vec::new();
        self.enter_phase(Phase::Packages, &mut effects);
        effects
    }

    /// Apply one event.
    pub fn update(&mut self, event: Event) -> Vec<Effect> {
        if self.state.quitting {
            return Vec::new();
        }
        match event {
            Event::Resize { width, height } => {
                self.state.viewport_width = width;
                self.state.viewport_height = height;
                Vec::new()
            }
            Event::Input(key) if is_quit_key(&key) => self.cancel(),
            Event::Input(_) => Vec::new(),
            Event::Interrupt => self.cancel(),
            Event::Tick => {
                self.state.animation.tick(self.state.progress_fraction);
                Vec::new()
            }
            Event::UnitCompleted(result) => self.complete(result),
        }
    }

    const fn cursor_id(&self) -> UnitId {
        UnitId {
            phase: self.state.phase,
            index: self.state.cursor,
        }
    }

    fn complete(&mut self, result: UnitResult) -> Vec<Effect> {
        if self.in_flight != Some(result.id) {
            tracing::debug!(
                "discarding result for {} #{}: not in flight",
                result.id.phase,
                result.id.index
            );
            return Vec::new();
        }
        self.in_flight = None;

        let phase = self.state.phase;
        let description = self
            .items
            .describe(result.id)
            .unwrap_or_else(|| format!("#{}", result.id.index + 1));

        let line = match result.error {
            None => Line::UnitSucceeded { description },
            Some(error) => {
                self.state.phase_had_error = true;
                self.any_error = true;
                Line::UnitFailed {
                    description,
                    error: error.trim().to_string(),
                }
            }
        };

        let len = self.items.len(phase);
        self.state.cursor += 1;
        self.state.progress_fraction = fraction(self.state.cursor, len);

        let mut effects = vec![Effect::Print(line)];
        if self.state.cursor < len {
            effects.extend(self.dispatch());
            return effects;
        }

        // Summarise before the flag is cleared by the next phase.
        effects.push(Effect::Print(Line::PhaseFinished {
            phase,
            had_errors: self.state.phase_had_error,
        }));
        tracing::info!(
            "{phase} phase finished{}",
            if self.state.phase_had_error {
                " with errors"
            } else {
                ""
            }
        );
        match phase.next() {
            Some(next) => self.enter_phase(next, &mut effects),
            None => self.finish(&mut effects),
        }
        effects
    }

    /// Move to `phase`, skipping forward over empty phases.
    fn enter_phase(&mut self, phase: Phase, effects: &mut Vec<Effect>) {
        let mut next = Some(phase);
        while let Some(phase) = next {
            self.state.phase = phase;
            self.state.cursor = 0;
            self.state.phase_had_error = false;
            self.state.progress_fraction = 0.0;
            self.state.animation.reset_bar();

            if self.items.len(phase) > 0 {
                let separated =
                    phase == Phase::Symlinks && self.items.len(Phase::Packages) > 0;
                effects.push(Effect::Print(Line::PhaseStarted { phase, separated }));
                effects.extend(self.dispatch());
                return;
            }
            tracing::debug!("no {phase} to process");
            next = phase.next();
        }
        self.finish(effects);
    }

    /// Request the unit at the cursor.
    fn dispatch(&mut self) -> Option<Effect> {
        let id = self.cursor_id();
        let work = self.items.work(id)?;
        self.in_flight = Some(id);
        Some(Effect::Dispatch(Unit { id, work }))
    }

    fn finish(&mut self, effects: &mut Vec<Effect>) {
        self.state.quitting = true;
        self.in_flight = None;
        effects.push(Effect::Quit);
    }

    fn cancel(&mut self) -> Vec<Effect> {
        tracing::info!("run cancelled by user");
        self.cancelled = true;
        let mut effects = Vec::new();
        self.finish(&mut effects);
        effects
    }
}

/// `done / len`, with an empty list counting as complete.
#[allow(clippy::cast_precision_loss)]
fn fraction(done: usize, len: usize) -> f64 {
    if len == 0 {
        return 1.0;
    }
    done as f64 / len as f64
}

fn is_quit_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;

    fn items(packages: &[&str], links: &[(&str, &str)]) -> WorkItems {
        WorkItems::new(
            packages.iter().map(|p| (*p).to_string()).collect(),
            links.iter().map(|(f, t)| Link::new(*f, *t)).collect(),
        )
    }

    fn started(packages: &[&str], links: &[(&str, &str)]) -> (Machine, Vec<Effect>) {
        let mut machine = Machine::new(items(packages, links));
        let effects = machine.start();
        (machine, effects)
    }

    fn pkg(index: usize) -> UnitId {
        UnitId {
            phase: Phase::Packages,
            index,
        }
    }

    fn link(index: usize) -> UnitId {
        UnitId {
            phase: Phase::Symlinks,
            index,
        }
    }

    fn ok(id: UnitId) -> Event {
        Event::UnitCompleted(UnitResult::ok(id))
    }

    fn failed(id: UnitId, error: &str) -> Event {
        Event::UnitCompleted(UnitResult::failed(id, error))
    }

    fn dispatches(effects: &[Effect]) -> Vec<UnitId> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Dispatch(unit) => Some(unit.id),
                _ => None,
            })
            .collect()
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Input(KeyEvent::new(code, modifiers))
    }

    fn assert_fraction(machine: &Machine, expected: f64) {
        let actual = machine.state().progress_fraction;
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected fraction {expected}, got {actual}"
        );
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    #[test]
    fn start_announces_packages_and_dispatches_first() {
        let (machine, effects) = started(&["git", "vim"], &[]);
        assert_eq!(
            effects,
            vec![
                Effect::Print(Line::PhaseStarted {
                    phase: Phase::Packages,
                    separated: false,
                }),
                Effect::Dispatch(Unit {
                    id: pkg(0),
                    work: Work::Install("git".into()),
                }),
            ]
        );
        assert_eq!(machine.status(), Status::Installing);
        assert_eq!(machine.in_flight(), Some(pkg(0)));
        assert_fraction(&machine, 0.0);
    }

    #[test]
    fn start_twice_does_nothing() {
        let (mut machine, _) = started(&["git"], &[]);
        assert!(machine.start().is_empty());
        assert_eq!(machine.in_flight(), Some(pkg(0)));
    }

    #[test]
    fn empty_packages_go_straight_to_symlinks() {
        let (machine, effects) = started(&[], &[("~/.vimrc", "~/.config/vimrc")]);
        assert_eq!(
            effects,
            vec![
                Effect::Print(Line::PhaseStarted {
                    phase: Phase::Symlinks,
                    separated: false,
                }),
                Effect::Dispatch(Unit {
                    id: link(0),
                    work: Work::Link(Link::new("~/.vimrc", "~/.config/vimrc")),
                }),
            ]
        );
        assert_eq!(machine.status(), Status::Linking);
        assert_fraction(&machine, 0.0);
    }

    #[test]
    fn no_work_at_all_finishes_immediately() {
        let (machine, effects) = started(&[], &[]);
        assert_eq!(effects, vec![Effect::Quit]);
        assert_eq!(machine.status(), Status::Finished);
        assert_eq!(
            machine.outcome(),
            Some(Outcome::Completed { had_errors: false })
        );
    }

    #[test]
    fn empty_links_finish_after_packages() {
        let (mut machine, _) = started(&["git"], &[]);
        let effects = machine.update(ok(pkg(0)));
        assert_eq!(
            effects,
            vec![
                Effect::Print(Line::UnitSucceeded {
                    description: "git".into()
                }),
                Effect::Print(Line::PhaseFinished {
                    phase: Phase::Packages,
                    had_errors: false,
                }),
                Effect::Quit,
            ]
        );
        assert!(machine.state().quitting);
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn two_packages_succeed_then_linking_starts() {
        let (mut machine, _) = started(&["git", "vim"], &[("~/a", "~/b")]);

        let first = machine.update(ok(pkg(0)));
        assert_eq!(
            first,
            vec![
                Effect::Print(Line::UnitSucceeded {
                    description: "git".into()
                }),
                Effect::Dispatch(Unit {
                    id: pkg(1),
                    work: Work::Install("vim".into()),
                }),
            ]
        );
        assert_fraction(&machine, 0.5);

        let second = machine.update(ok(pkg(1)));
        assert_eq!(
            second,
            vec![
                Effect::Print(Line::UnitSucceeded {
                    description: "vim".into()
                }),
                Effect::Print(Line::PhaseFinished {
                    phase: Phase::Packages,
                    had_errors: false,
                }),
                Effect::Print(Line::PhaseStarted {
                    phase: Phase::Symlinks,
                    separated: true,
                }),
                Effect::Dispatch(Unit {
                    id: link(0),
                    work: Work::Link(Link::new("~/a", "~/b")),
                }),
            ]
        );
        assert_eq!(machine.status(), Status::Linking);
        assert_eq!(machine.state().cursor, 0);
        assert!(!machine.state().phase_had_error);
        assert_fraction(&machine, 0.0);
    }

    #[test]
    fn failed_package_is_reported_and_run_continues() {
        let (mut machine, _) = started(&["badpkg"], &[("~/a", "~/b")]);
        let effects = machine.update(failed(pkg(0), "\n  exit status 1: package not found \n"));

        assert_eq!(
            effects[0],
            Effect::Print(Line::UnitFailed {
                description: "badpkg".into(),
                error: "exit status 1: package not found".into(),
            })
        );
        assert_eq!(
            effects[1],
            Effect::Print(Line::PhaseFinished {
                phase: Phase::Packages,
                had_errors: true,
            })
        );
        assert_eq!(dispatches(&effects), vec![link(0)]);
        assert_eq!(machine.status(), Status::Linking);
        assert!(
            !machine.state().phase_had_error,
            "flag resets for the new phase"
        );
    }

    #[test]
    fn single_link_finishes_the_run() {
        let (mut machine, _) = started(&[], &[("~/.vimrc", "~/.config/vimrc")]);
        let effects = machine.update(ok(link(0)));
        assert_eq!(
            effects,
            vec![
                Effect::Print(Line::UnitSucceeded {
                    description: "~/.vimrc -> ~/.config/vimrc".into()
                }),
                Effect::Print(Line::PhaseFinished {
                    phase: Phase::Symlinks,
                    had_errors: false,
                }),
                Effect::Quit,
            ]
        );
        assert!(machine.state().quitting);
        assert_eq!(
            machine.outcome(),
            Some(Outcome::Completed { had_errors: false })
        );
    }

    #[test]
    fn nothing_changes_after_finishing() {
        let (mut machine, _) = started(&[], &[("~/a", "~/b")]);
        machine.update(ok(link(0)));
        let frozen = machine.state().clone();

        for event in [
            Event::Tick,
            Event::Resize {
                width: 100,
                height: 40,
            },
            ok(link(0)),
            Event::Interrupt,
            key(KeyCode::Char('q'), KeyModifiers::NONE),
        ] {
            assert!(machine.update(event).is_empty());
        }
        assert_eq!(machine.state(), &frozen);
        assert_eq!(
            machine.outcome(),
            Some(Outcome::Completed { had_errors: false })
        );
    }

    #[test]
    fn errors_in_first_phase_mark_the_outcome() {
        let (mut machine, _) = started(&["bad"], &[("~/a", "~/b")]);
        machine.update(failed(pkg(0), "boom"));
        machine.update(ok(link(0)));
        assert_eq!(
            machine.outcome(),
            Some(Outcome::Completed { had_errors: true })
        );
    }

    // -----------------------------------------------------------------------
    // Invariants
    // -----------------------------------------------------------------------

    #[test]
    fn n_completions_move_installing_to_linking() {
        for n in 1..=12 {
            let packages: Vec<String> = (0..n).map(|i| format!("pkg{i}")).collect();
            let refs: Vec<&str> = packages.iter().map(String::as_str).collect();
            let (mut machine, _) = started(&refs, &[("~/a", "~/b")]);

            for i in 0..n {
                assert_eq!(machine.status(), Status::Installing, "n={n} i={i}");
                machine.update(ok(pkg(i)));
            }
            assert_eq!(machine.status(), Status::Linking, "n={n}");
            assert_eq!(machine.state().cursor, 0);
            assert!(!machine.state().phase_had_error);
        }
    }

    #[test]
    fn fraction_is_k_over_len_after_each_completion() {
        let links: Vec<(String, String)> =
            (0..7).map(|i| (format!("~/s{i}"), format!("~/d{i}"))).collect();
        let refs: Vec<(&str, &str)> = links
            .iter()
            .map(|(f, t)| (f.as_str(), t.as_str()))
            .collect();
        let (mut machine, _) = started(&["a", "b", "c"], &refs);

        for k in 1..3 {
            machine.update(ok(pkg(k - 1)));
            assert_fraction(&machine, k as f64 / 3.0);
        }
        machine.update(ok(pkg(2)));
        for k in 1..=7 {
            machine.update(ok(link(k - 1)));
            if k < 7 {
                assert_fraction(&machine, k as f64 / 7.0);
            }
        }
        assert_fraction(&machine, 1.0);
    }

    #[test]
    fn error_flag_is_sticky_within_a_phase() {
        let (mut machine, _) = started(&["a", "b", "c", "d"], &[("~/a", "~/b")]);
        machine.update(failed(pkg(0), "x"));
        assert!(machine.state().phase_had_error);
        machine.update(ok(pkg(1)));
        assert!(machine.state().phase_had_error, "success must not clear it");
        machine.update(failed(pkg(2), "y"));
        assert!(machine.state().phase_had_error);

        let effects = machine.update(ok(pkg(3)));
        assert!(effects.contains(&Effect::Print(Line::PhaseFinished {
            phase: Phase::Packages,
            had_errors: true,
        })));
        assert!(!machine.state().phase_had_error);
    }

    #[test]
    fn repeated_failures_summarise_like_one() {
        let run = |failures: usize| {
            let (mut machine, _) = started(&["a", "b", "c"], &[]);
            let mut last = Vec::new();
            for i in 0..3 {
                last = if i < failures {
                    machine.update(failed(pkg(i), "e"))
                } else {
                    machine.update(ok(pkg(i)))
                };
            }
            last.into_iter()
                .find(|e| matches!(e, Effect::Print(Line::PhaseFinished { .. })))
        };
        assert_eq!(run(1), run(3));
    }

    #[test]
    fn every_dispatch_is_preceded_by_a_completion() {
        let (mut machine, mut effects) =
            started(&["a", "b", "c"], &[("~/1", "~/2"), ("~/3", "~/4")]);
        let mut completed = 0;

        loop {
            let dispatched = dispatches(&effects);
            assert!(dispatched.len() <= 1, "more than one unit in flight");
            let Some(id) = dispatched.first().copied() else {
                break;
            };
            // Noise between dispatch and completion must not dispatch anything.
            for noise in [
                Event::Tick,
                Event::Resize {
                    width: 80,
                    height: 24,
                },
            ] {
                assert!(dispatches(&machine.update(noise)).is_empty());
            }
            assert_eq!(machine.in_flight(), Some(id));
            effects = machine.update(ok(id));
            completed += 1;
        }

        assert_eq!(completed, 5);
        assert_eq!(machine.status(), Status::Finished);
    }

    #[test]
    fn units_are_dispatched_in_list_order() {
        let (mut machine, start) = started(&["z", "a", "m"], &[("~/2", "~/1"), ("~/0", "~/9")]);
        let mut order = Vec::new();
        let mut effects = start;
        loop {
            let Some(unit) = effects.iter().find_map(|e| match e {
                Effect::Dispatch(u) => Some(u.clone()),
                _ => None,
            }) else {
                break;
            };
            order.push(unit.work.clone());
            effects = machine.update(ok(unit.id));
        }
        assert_eq!(
            order,
            vec![
                Work::Install("z".into()),
                Work::Install("a".into()),
                Work::Install("m".into()),
                Work::Link(Link::new("~/2", "~/1")),
                Work::Link(Link::new("~/0", "~/9")),
            ]
        );
    }

    #[test]
    fn failure_does_not_skip_the_next_unit() {
        let (mut machine, _) = started(&["a", "b"], &[]);
        let effects = machine.update(failed(pkg(0), "nope"));
        assert_eq!(dispatches(&effects), vec![pkg(1)]);
    }

    // -----------------------------------------------------------------------
    // Stale and unexpected results
    // -----------------------------------------------------------------------

    #[test]
    fn result_for_a_unit_not_in_flight_is_discarded() {
        let (mut machine, _) = started(&["a", "b"], &[]);
        let before = machine.state().clone();
        assert!(machine.update(ok(pkg(1))).is_empty());
        assert!(machine.update(ok(link(0))).is_empty());
        assert_eq!(machine.state(), &before);
        assert_eq!(machine.in_flight(), Some(pkg(0)));
    }

    #[test]
    fn duplicate_completion_is_discarded() {
        let (mut machine, _) = started(&["a", "b", "c"], &[]);
        machine.update(ok(pkg(0)));
        assert!(machine.update(ok(pkg(0))).is_empty());
        assert_eq!(machine.state().cursor, 1);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn q_quits_immediately_with_work_in_flight() {
        let (mut machine, _) = started(&["a", "b"], &[]);
        let effects = machine.update(key(KeyCode::Char('q'), KeyModifiers::NONE));
        assert_eq!(effects, vec![Effect::Quit]);
        assert_eq!(machine.status(), Status::Finished);
        assert_eq!(machine.outcome(), Some(Outcome::Cancelled));
        assert_eq!(machine.in_flight(), None);
    }

    #[test]
    fn late_result_after_quit_is_discarded() {
        let (mut machine, _) = started(&["a", "b"], &[]);
        machine.update(Event::Interrupt);
        let frozen = machine.state().clone();
        assert!(machine.update(ok(pkg(0))).is_empty());
        assert_eq!(machine.state(), &frozen);
    }

    #[test]
    fn ctrl_c_and_esc_quit() {
        for event in [
            key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            key(KeyCode::Esc, KeyModifiers::NONE),
        ] {
            let (mut machine, _) = started(&["a"], &[]);
            assert_eq!(machine.update(event), vec![Effect::Quit]);
        }
    }

    #[test]
    fn other_keys_are_ignored() {
        let (mut machine, _) = started(&["a"], &[]);
        assert!(
            machine
                .update(key(KeyCode::Char('c'), KeyModifiers::NONE))
                .is_empty()
        );
        assert!(
            machine
                .update(key(KeyCode::Enter, KeyModifiers::NONE))
                .is_empty()
        );
        assert_eq!(machine.status(), Status::Installing);
    }

    #[test]
    fn key_release_does_not_quit() {
        let (mut machine, _) = started(&["a"], &[]);
        let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(machine.update(Event::Input(release)).is_empty());
        assert!(!machine.state().quitting);
    }

    // -----------------------------------------------------------------------
    // Resize and tick
    // -----------------------------------------------------------------------

    #[test]
    fn resize_updates_viewport() {
        let (mut machine, _) = started(&["a"], &[]);
        machine.update(Event::Resize {
            width: 120,
            height: 30,
        });
        assert_eq!(machine.state().viewport_width, 120);
        assert_eq!(machine.state().viewport_height, 30);
    }

    #[test]
    fn tick_advances_animation_only() {
        let (mut machine, _) = started(&["a", "b"], &[]);
        machine.update(ok(pkg(0)));
        let cursor = machine.state().cursor;
        machine.update(Event::Tick);
        assert_eq!(machine.state().animation.spinner_frame, 1);
        assert!(machine.state().animation.shown_fraction > 0.0);
        assert_eq!(machine.state().cursor, cursor);
        assert_eq!(machine.in_flight(), Some(pkg(1)));
    }

    #[test]
    fn phase_change_empties_the_bar() {
        let (mut machine, _) = started(&["a"], &[("~/a", "~/b")]);
        machine.update(Event::Tick);
        machine.update(ok(pkg(0)));
        assert!(machine.state().animation.shown_fraction.abs() < f64::EPSILON);
    }

    #[test]
    fn current_label_follows_phase() {
        let (mut machine, _) = started(&["git"], &[("~/.vimrc", "~/.config/vimrc")]);
        assert_eq!(machine.current_label(), Some(("Installing ", "git")));
        machine.update(ok(pkg(0)));
        assert_eq!(
            machine.current_label(),
            Some(("Linking ", "~/.config/vimrc"))
        );
        machine.update(ok(link(0)));
        assert_eq!(machine.current_label(), None);
    }

    #[test]
    fn fraction_of_empty_list_is_complete() {
        assert!((fraction(0, 0) - 1.0).abs() < f64::EPSILON);
        assert!((fraction(1, 4) - 0.25).abs() < f64::EPSILON);
    }
}
