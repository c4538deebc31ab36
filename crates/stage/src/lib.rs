//! Lifecycle manager.
//!
//! [`Stage`] attaches a scene program to a host: it creates a display
//! surface, mounts it, bootstraps the scene, and then runs one tick per
//! frame callback until teardown.
//!
//! # Invariants
//! - At most one frame request is outstanding; stale callbacks do nothing.
//! - Each tick polls deferred resources, updates, and renders exactly once.
//! - Teardown is idempotent and also runs on drop.

mod frame_loop;
pub mod headless;
mod host;
mod stage;

pub use frame_loop::FrameLoop;
pub use headless::{HeadlessContainer, HeadlessHost, HeadlessSurface, HostProbe, HostStats};
pub use host::{FrameRequest, Host, MountTarget, Subscription};
pub use stage::{FrameOutcome, Stage, StageError};
