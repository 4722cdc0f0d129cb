//! Spinner and progress-bar animation advanced by timer ticks.

/// Fraction of the remaining distance the bar covers per tick.
const BAR_EASING: f64 = 0.35;

/// Distance below which the bar snaps onto its target.
const BAR_SNAP: f64 = 0.005;

/// Animation sub-state of the status line.
///
/// Completion events move the *target* fraction; the bar shown on screen
/// catches up over the following ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Animation {
    /// Monotonic spinner frame counter; the renderer picks `frame % frames`.
    pub spinner_frame: usize,
    /// Fraction currently drawn by the bar, in `[0, 1]`.
    pub shown_fraction: f64,
}

impl Animation {
    /// Advance one frame, easing the bar toward `target`.
    pub fn tick(&mut self, target: f64) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        let target = target.clamp(0.0, 1.0);
        let delta = target - self.shown_fraction;
        self.shown_fraction = if delta.abs() < BAR_SNAP {
            target
        } else {
            BAR_EASING.mul_add(delta, self.shown_fraction)
        };
    }

    /// Empty the bar for a new phase without disturbing the spinner.
    pub const fn reset_bar(&mut self) {
        self.shown_fraction = 0.0;
    }
}
