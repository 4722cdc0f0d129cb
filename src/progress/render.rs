//! Turns machine state into terminal text.
//!
//! [`Renderer::render`] produces the single repainted status line;
//! [`Renderer::line`] formats the discrete lines printed above it. Both are
//! pure: colours and sizes come from the [`RenderConfig`] passed in.
use unicode_width::{UnicodeWidthChar as _, UnicodeWidthStr as _};

use super::machine::{Line, Machine, Phase};

/// Default progress bar width in cells.
const DEFAULT_BAR_WIDTH: usize = 40;

/// Braille dot spinner.
const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

const DONE_MARK: &str = "✔";
const FAIL_MARK: &str = "✗";

// 256-colour SGR codes.
const SPINNER_COLOR: &str = "\x1b[38;5;63m";
const NAME_COLOR: &str = "\x1b[38;5;211m";
const DONE_COLOR: &str = "\x1b[38;5;42m";
const FAIL_COLOR: &str = "\x1b[38;5;160m";
const DETAIL_COLOR: &str = "\x1b[38;5;245m";
const BAR_FILLED_COLOR: &str = "\x1b[38;5;99m";
const BAR_EMPTY_COLOR: &str = "\x1b[38;5;238m";
const RESET: &str = "\x1b[0m";

/// Presentation settings for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Emit ANSI colour codes.
    pub color: bool,
    /// Width of the progress bar in cells.
    pub bar_width: usize,
    /// Spinner frames, cycled on every tick. Each must be one cell wide.
    pub spinner_frames: &'static [&'static str],
}

impl RenderConfig {
    /// Coloured output for an interactive terminal.
    #[must_use]
    pub const fn styled() -> Self {
        Self {
            color: true,
            bar_width: DEFAULT_BAR_WIDTH,
            spinner_frames: SPINNER_FRAMES,
        }
    }

    /// Uncoloured output.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            color: false,
            ..Self::styled()
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::styled()
    }
}

/// Formats frames and lines according to a [`RenderConfig`].
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Create a renderer.
    #[must_use]
    pub const fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// The status line for the current state.
    ///
    /// Empty once the run is over. Layout, left to right: spinner, label
    /// (truncated to the space left), padding, progress bar, counter.
    #[must_use]
    pub fn render(&self, machine: &Machine) -> String {
        let state = machine.state();
        if state.quitting {
            return String::new();
        }
        let Some((verb, name)) = machine.current_label() else {
            return String::new();
        };

        let total = machine.phase_len();
        let digits = total.to_string().len();
        let count = format!(" {:0digits$}/{total:0digits$} ", state.cursor.min(total));
        let spin = format!(" {} ", self.spinner_glyph(state.animation.spinner_frame));

        let viewport = usize::from(state.viewport_width);
        let fixed = spin.width() + self.config.bar_width + count.width();
        let available = viewport.saturating_sub(fixed);

        let label = truncate_to_width(&format!("{verb}{name}"), available);
        let gap = " ".repeat(viewport.saturating_sub(fixed + label.width()));

        let mut out = String::new();
        out.push_str(&self.paint(SPINNER_COLOR, &spin));
        match label.split_at_checked(verb.len()) {
            Some((head, tail)) if !tail.is_empty() => {
                out.push_str(head);
                out.push_str(&self.paint(NAME_COLOR, tail));
            }
            _ => out.push_str(&label),
        }
        out.push_str(&gap);
        out.push_str(&self.bar(state.animation.shown_fraction));
        out.push_str(&count);
        out
    }

    /// Format a discrete line. Failures span several rows: the error text
    /// follows on its own indented lines.
    #[must_use]
    pub fn line(&self, line: &Line) -> String {
        match line {
            Line::PhaseStarted { phase, separated } => {
                let header = match phase {
                    Phase::Packages => "Installing packages...",
                    Phase::Symlinks => "Creating symlinks...",
                };
                if *separated {
                    format!("\n{header}")
                } else {
                    header.to_string()
                }
            }
            Line::UnitSucceeded { description } => {
                format!(" {} {description}", self.paint(DONE_COLOR, DONE_MARK))
            }
            Line::UnitFailed { description, error } => {
                let mut out = format!(" {} {description}", self.paint(FAIL_COLOR, FAIL_MARK));
                for detail in error.lines() {
                    out.push_str("\n    ");
                    out.push_str(&self.paint(DETAIL_COLOR, detail));
                }
                out
            }
            Line::PhaseFinished { phase, had_errors } => {
                let done = match phase {
                    Phase::Packages => "Done! Packages installed",
                    Phase::Symlinks => "Done! Symlinks created",
                };
                if *had_errors {
                    format!("{done}, but with errors")
                } else {
                    done.to_string()
                }
            }
        }
    }

    fn spinner_glyph(&self, frame: usize) -> &'static str {
        let frames = self.config.spinner_frames;
        if frames.is_empty() {
            return " ";
        }
        frames.get(frame % frames.len()).copied().unwrap_or(" ")
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn bar(&self, fraction: f64) -> String {
        let width = self.config.bar_width;
        let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
        let full = "█".repeat(filled);
        let empty = "░".repeat(width - filled);
        format!(
            "{}{}",
            self.paint(BAR_FILLED_COLOR, &full),
            self.paint(BAR_EMPTY_COLOR, &empty)
        )
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.config.color && !text.is_empty() {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Cut `s` to at most `max` terminal cells, never splitting a character.
fn truncate_to_width(s: &str, max: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Link;
    use crate::progress::machine::{Event, UnitId, UnitResult, WorkItems};

    fn renderer(bar_width: usize) -> Renderer {
        Renderer::new(RenderConfig {
            bar_width,
            ..RenderConfig::plain()
        })
    }

    fn machine(packages: &[&str], links: &[(&str, &str)], width: u16) -> Machine {
        let mut m = Machine::new(WorkItems::new(
            packages.iter().map(|p| (*p).to_string()).collect(),
            links.iter().map(|(f, t)| Link::new(*f, *t)).collect(),
        ));
        m.update(Event::Resize { width, height: 24 });
        m.start();
        m
    }

    fn complete(m: &mut Machine, phase: Phase, index: usize) {
        m.update(Event::UnitCompleted(UnitResult::ok(UnitId { phase, index })));
    }

    #[test]
    fn first_frame_fills_the_viewport() {
        let m = machine(&["git", "vim"], &[], 40);
        let frame = renderer(10).render(&m);
        assert_eq!(frame, " ⣾ Installing git        ░░░░░░░░░░ 0/2 ");
        assert_eq!(frame.width(), 40);
    }

    #[test]
    fn bar_and_counter_follow_progress() {
        let mut m = machine(&["git", "vim"], &[], 40);
        complete(&mut m, Phase::Packages, 0);
        for _ in 0..40 {
            m.update(Event::Tick);
        }
        let frame = renderer(10).render(&m);
        assert!(frame.ends_with("█████░░░░░ 1/2 "), "{frame:?}");
        assert!(frame.contains("Installing vim"));
    }

    #[test]
    fn linking_shows_destination() {
        let mut m = machine(&["git"], &[("~/.vimrc", "~/.config/vimrc")], 50);
        complete(&mut m, Phase::Packages, 0);
        let frame = renderer(10).render(&m);
        assert!(frame.contains("Linking ~/.config/vimrc"), "{frame:?}");
        assert!(frame.ends_with("░░░░░░░░░░ 0/1 "));
    }

    #[test]
    fn counter_is_zero_padded_to_total_width() {
        let packages: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = packages.iter().map(String::as_str).collect();
        let mut m = machine(&refs, &[], 60);
        for i in 0..3 {
            complete(&mut m, Phase::Packages, i);
        }
        assert!(renderer(10).render(&m).ends_with(" 03/12 "));
    }

    #[test]
    fn narrow_viewport_truncates_label() {
        let m = machine(&["git", "vim"], &[], 25);
        let frame = renderer(10).render(&m);
        assert_eq!(frame, " ⣾ Install░░░░░░░░░░ 0/2 ");
        assert_eq!(frame.width(), 25);
    }

    #[test]
    fn label_never_exceeds_available_width() {
        let fixed = " ⣾ ".width() + 10 + " 0/1 ".width();
        for width in 0..80u16 {
            let m = machine(&["a-package-with-a-very-long-name-indeed"], &[], width);
            let frame = renderer(10).render(&m);
            let label = frame
                .strip_prefix(" ⣾ ")
                .and_then(|rest| rest.split('░').next())
                .unwrap()
                .trim_end();
            let available = usize::from(width).saturating_sub(fixed);
            assert!(label.width() <= available, "width={width}: {frame:?}");
            assert_eq!(frame.width(), usize::from(width).max(fixed));
        }
    }

    #[test]
    fn zero_viewport_renders_only_fixed_parts() {
        let m = machine(&["git"], &[], 0);
        assert_eq!(renderer(10).render(&m), " ⣾ ░░░░░░░░░░ 0/1 ");
    }

    #[test]
    fn wide_characters_are_not_split() {
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(truncate_to_width("日本語", 6), "日本語");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn spinner_cycles_on_ticks() {
        let mut m = machine(&["git"], &[], 40);
        m.update(Event::Tick);
        assert!(renderer(10).render(&m).starts_with(" ⣽ "));
        for _ in 0..7 {
            m.update(Event::Tick);
        }
        assert!(renderer(10).render(&m).starts_with(" ⣾ "));
    }

    #[test]
    fn quitting_renders_nothing() {
        let mut m = machine(&["git"], &[], 40);
        m.update(Event::Interrupt);
        assert_eq!(renderer(10).render(&m), "");
    }

    #[test]
    fn finished_run_renders_nothing() {
        let mut m = machine(&[], &[("~/a", "~/b")], 40);
        complete(&mut m, Phase::Symlinks, 0);
        assert_eq!(renderer(10).render(&m), "");
    }

    #[test]
    fn styled_frame_colours_name_but_keeps_width() {
        let m = machine(&["git"], &[], 40);
        let styled = Renderer::new(RenderConfig {
            bar_width: 10,
            ..RenderConfig::styled()
        })
        .render(&m);
        assert!(styled.contains(&format!("Installing {NAME_COLOR}git{RESET}")));
        assert_eq!(
            crate::logging::strip_ansi(&styled),
            renderer(10).render(&m)
        );
    }

    #[test]
    fn success_line() {
        let line = Line::UnitSucceeded {
            description: "git".into(),
        };
        assert_eq!(renderer(10).line(&line), " ✔ git");
    }

    #[test]
    fn failure_line_indents_each_error_line() {
        let line = Line::UnitFailed {
            description: "badpkg".into(),
            error: "exit status 1\npackage not found".into(),
        };
        assert_eq!(
            renderer(10).line(&line),
            " ✗ badpkg\n    exit status 1\n    package not found"
        );
    }

    #[test]
    fn failure_line_is_coloured_when_styled() {
        let line = Line::UnitFailed {
            description: "badpkg".into(),
            error: "nope".into(),
        };
        let text = Renderer::new(RenderConfig::styled()).line(&line);
        assert!(text.contains(&format!("{FAIL_COLOR}✗{RESET}")));
        assert!(text.contains(&format!("{DETAIL_COLOR}nope{RESET}")));
    }

    #[test]
    fn phase_summaries() {
        let r = renderer(10);
        let summary = |phase, had_errors| r.line(&Line::PhaseFinished { phase, had_errors });
        assert_eq!(summary(Phase::Packages, false), "Done! Packages installed");
        assert_eq!(
            summary(Phase::Packages, true),
            "Done! Packages installed, but with errors"
        );
        assert_eq!(summary(Phase::Symlinks, false), "Done! Symlinks created");
        assert_eq!(
            summary(Phase::Symlinks, true),
            "Done! Symlinks created, but with errors"
        );
    }

    #[test]
    fn phase_headers() {
        let r = renderer(10);
        assert_eq!(
            r.line(&Line::PhaseStarted {
                phase: Phase::Packages,
                separated: false,
            }),
            "Installing packages..."
        );
        assert_eq!(
            r.line(&Line::PhaseStarted {
                phase: Phase::Symlinks,
                separated: true,
            }),
            "\nCreating symlinks..."
        );
    }

    #[test]
    fn unseparated_header_has_no_blank_line() {
        let r = renderer(10);
        assert_eq!(
            r.line(&Line::PhaseStarted {
                phase: Phase::Symlinks,
                separated: false,
            }),
            "Creating symlinks..."
        );
    }
}
