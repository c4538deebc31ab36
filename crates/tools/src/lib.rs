//! Developer tooling: scene inspector and frame timing.
//!
//! # Invariants
//! - Tools only read scene state.

mod inspector;
mod timer;

pub use inspector::{GroupSummary, ObjectInfo, SceneInspector, SceneSummary};
pub use timer::FrameTimer;
