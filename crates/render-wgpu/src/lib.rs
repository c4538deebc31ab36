//! wgpu render backend.
//!
//! Draws a [`glimmer_render::DrawList`]: boxes and planes as instanced
//! meshes, polylines as line lists and point clouds as point lists. Texture
//! maps contribute their average color as a tint. Canvas-text planes are
//! not rasterized.
//!
//! # Invariants
//! - The renderer never mutates the scene.
//! - Normal-blended items draw before additive ones.

mod batch;
mod gpu;
mod shaders;
mod surface;

pub use batch::{Batch, BatchKind, FramePlan, Shape};
pub use gpu::SceneRenderer;
pub use surface::WgpuSurface;
