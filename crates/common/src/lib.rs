//! Shared types used by every glimmer crate.

mod types;

pub use types::{Color, ObjectId, SurfaceId, Transform, Viewport};
