use glimmer_assets::AssetStore;
use glimmer_common::Viewport;
use glimmer_kernel::{ObjectKind, Scene};
use std::fmt::{self, Write as _};

use crate::camera::PerspectiveCamera;
use crate::draw::{DrawList, TintCache};

/// Everything a renderer reads to produce one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderView<'a> {
    pub scene: &'a Scene,
    pub assets: &'a AssetStore,
    pub camera: &'a PerspectiveCamera,
}

/// Errors a render backend reports for one frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The presentation surface was lost or outdated; the backend
    /// reconfigures it and the next frame proceeds normally.
    #[error("render surface lost")]
    SurfaceLost,
    #[error("render backend error: {0}")]
    Backend(String),
}

/// Renderer-agnostic interface. All display surfaces implement this trait.
///
/// A renderer reads the scene, its assets and the camera, then produces
/// output. It never mutates the scene.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame.
    fn render(&mut self, view: &RenderView<'_>) -> Result<Self::Output, RenderError>;

    /// The drawable area changed size.
    fn resize(&mut self, viewport: Viewport);

    /// Free graphics resources. Calling it again is a no-op.
    fn release(&mut self);
}

/// Text renderer for headless runs and tests.
///
/// Produces a human-readable listing of the frame: camera, then every
/// object in draw order with its transform and visibility.
#[derive(Debug)]
pub struct DebugTextRenderer {
    viewport: Viewport,
    frames: u64,
    released: bool,
    tints: TintCache,
}

impl DebugTextRenderer {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: viewport.clamped(),
            frames: 0,
            released: false,
            tints: TintCache::new(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl DebugTextRenderer {
    fn write_frame(&self, out: &mut String, view: &RenderView<'_>, list: &DrawList) -> fmt::Result {
        let cam = view.camera;
        writeln!(
            out,
            "=== Frame {} ({}x{}) ===",
            self.frames, self.viewport.width, self.viewport.height
        )?;
        writeln!(
            out,
            "Camera: pos=({:.1}, {:.1}, {:.1}) fov={:.0} aspect={:.3}",
            cam.position.x, cam.position.y, cam.position.z, cam.fov_degrees, cam.aspect
        )?;
        writeln!(
            out,
            "Objects: {} (drawn {}, unresolved {})",
            view.scene.object_count(),
            list.len(),
            list.unresolved
        )?;

        for (id, object) in view.scene.objects() {
            let t = &object.transform;
            let kind = match object.kind {
                ObjectKind::Mesh => "mesh".to_string(),
                ObjectKind::Line => "line".to_string(),
                ObjectKind::Points => "points".to_string(),
                ObjectKind::PointLight(light) => format!("light power={:.1}", light.power),
            };
            writeln!(
                out,
                "  [{}] {} {} pos=({:.2}, {:.2}, {:.2}) rot=({:.3}, {:.3}, {:.3}) scale={:.3}{}",
                id.short(),
                object.name,
                kind,
                t.position.x,
                t.position.y,
                t.position.z,
                t.rotation.x,
                t.rotation.y,
                t.rotation.z,
                t.scale.x,
                if object.visible { "" } else { " hidden" },
            )?;
        }
        for label in list.items.iter().filter_map(|i| i.label.as_deref()) {
            writeln!(out, "  label: {label:?}")?;
        }
        Ok(())
    }
}

impl Default for DebugTextRenderer {
    fn default() -> Self {
        Self::new(Viewport::new(1, 1))
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, view: &RenderView<'_>) -> Result<String, RenderError> {
        if self.released {
            return Err(RenderError::Backend("surface already released".into()));
        }
        let list = DrawList::build(view, &mut self.tints);
        let mut out = String::new();
        self.write_frame(&mut out, view, &list)
            .map_err(|e| RenderError::Backend(format!("frame listing: {e}")))?;

        self.frames += 1;
        Ok(out)
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport.clamped();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.tints.clear();
        }
    }
}
