//! Rendering adapter: renderer-agnostic interface.
//!
//! # Invariants
//! - Renderers never mutate the scene.
//! - A frame is a pure function of scene, assets and camera.
//!
//! Backends implement [`Renderer`]. [`DrawList`] resolves a scene into
//! backend-neutral draw items so every backend agrees on what is visible.

mod camera;
mod draw;
mod renderer;

pub use camera::PerspectiveCamera;
pub use draw::{DrawItem, DrawList, Primitive, TintCache};
pub use renderer::{DebugTextRenderer, RenderError, RenderView, Renderer};
