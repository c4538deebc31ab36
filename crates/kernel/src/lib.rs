//! Scene kernel: the scene graph a renderer draws and the clock that paces it.
//!
//! # Invariants
//! - Animated group membership only grows; objects join at bootstrap or when
//!   a deferred resource finishes loading.
//! - Groups are evaluated in registration order.
//! - Clock elapsed time never decreases.

pub mod clock;
pub mod group;
pub mod scene;

pub use clock::{Clock, FixedStep, FrameTime, MonotonicTime, TimeSource};
pub use group::{AnimatedGroup, AnimationRule, GroupId, PulseTarget, Timing};
pub use scene::{ObjectKind, PointLight, Scene, SceneGraphError, SceneObject};
