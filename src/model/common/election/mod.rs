mod phase;
mod window;

pub use phase::{ElectionPhase, Transition};
pub use window::{PhaseWindow, WindowEdge, WindowKind};
