//! Interactive two-phase progress: state machine, renderer and terminal host.
//!
//! - **[`machine`]**: pure `(state, event) -> effects` transitions
//! - **[`render`]**: turns the state into a status line and printed lines
//! - **[`animation`]**: spinner and eased progress-bar sub-state
//! - **[`host`]**: the terminal event loop that executes effects
pub mod animation;
pub mod host;
pub mod machine;
pub mod render;

pub use animation::Animation;
pub use host::{HostConfig, event_loop, run};
pub use machine::{
    Effect, Event, Line, Machine, Outcome, Phase, ProgressState, Status, Unit, UnitId,
    UnitResult, Work, WorkItems,
};
pub use render::{RenderConfig, Renderer};
