//! In-memory host for tests and command-line runs.
//!
//! Frames are dispatched explicitly with [`crate::Stage::step`]; nothing
//! runs on its own. Every host interaction is counted in a shared
//! [`HostStats`] that outlives the stage through a [`HostProbe`].

use glimmer_common::{SurfaceId, Viewport};
use glimmer_render::{DebugTextRenderer, RenderError, RenderView, Renderer};
use std::cell::RefCell;
use std::rc::Rc;

use crate::host::{FrameRequest, Host, MountTarget, Subscription};

/// Counters of everything the stage asked the host to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStats {
    pub frames_requested: u64,
    pub frames_cancelled: u64,
    pub resize_subscribers: usize,
    pub surfaces_created: usize,
    pub surfaces_released: usize,
    pub redraws: u64,
    pub surface_viewport: Option<Viewport>,
}

/// Read-only view of a headless host's counters.
#[derive(Debug, Clone)]
pub struct HostProbe(Rc<RefCell<HostStats>>);

impl HostProbe {
    pub fn stats(&self) -> HostStats {
        self.0.borrow().clone()
    }
}

#[derive(Debug)]
pub struct HeadlessHost {
    viewport: Viewport,
    next_id: u64,
    stats: Rc<RefCell<HostStats>>,
}

impl HeadlessHost {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            next_id: 0,
            stats: Rc::default(),
        }
    }

    pub fn probe(&self) -> HostProbe {
        HostProbe(Rc::clone(&self.stats))
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for HeadlessHost {
    type Surface = HeadlessSurface;

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_surface(&mut self, viewport: Viewport) -> Result<HeadlessSurface, RenderError> {
        let mut stats = self.stats.borrow_mut();
        stats.surfaces_created += 1;
        stats.surface_viewport = Some(viewport.clamped());
        Ok(HeadlessSurface {
            inner: DebugTextRenderer::new(viewport),
            stats: Rc::clone(&self.stats),
        })
    }

    fn request_frame(&mut self) -> FrameRequest {
        self.stats.borrow_mut().frames_requested += 1;
        FrameRequest(self.next())
    }

    fn cancel_frame(&mut self, _request: FrameRequest) {
        self.stats.borrow_mut().frames_cancelled += 1;
    }

    fn subscribe_resize(&mut self) -> Subscription {
        self.stats.borrow_mut().resize_subscribers += 1;
        Subscription(self.next())
    }

    fn unsubscribe_resize(&mut self, _subscription: Subscription) {
        let mut stats = self.stats.borrow_mut();
        stats.resize_subscribers = stats.resize_subscribers.saturating_sub(1);
    }
}

/// Text surface that reports redraws and releases to its host.
#[derive(Debug)]
pub struct HeadlessSurface {
    inner: DebugTextRenderer,
    stats: Rc<RefCell<HostStats>>,
}

impl Renderer for HeadlessSurface {
    type Output = String;

    fn render(&mut self, view: &RenderView<'_>) -> Result<String, RenderError> {
        let frame = self.inner.render(view)?;
        self.stats.borrow_mut().redraws += 1;
        Ok(frame)
    }

    fn resize(&mut self, viewport: Viewport) {
        self.inner.resize(viewport);
        self.stats.borrow_mut().surface_viewport = Some(self.inner.viewport());
    }

    fn release(&mut self) {
        if !self.inner.is_released() {
            self.inner.release();
            self.stats.borrow_mut().surfaces_released += 1;
        }
    }
}

/// Mount target that records which surfaces it displays.
#[derive(Debug, Clone, Default)]
pub struct HeadlessContainer {
    surfaces: Rc<RefCell<Vec<SurfaceId>>>,
}

impl HeadlessContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surfaces(&self) -> Vec<SurfaceId> {
        self.surfaces.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.borrow().is_empty()
    }
}

impl MountTarget for HeadlessContainer {
    fn insert_surface(&mut self, surface: SurfaceId) {
        self.surfaces.borrow_mut().push(surface);
    }

    fn remove_surface(&mut self, surface: SurfaceId) -> bool {
        let mut surfaces = self.surfaces.borrow_mut();
        let before = surfaces.len();
        surfaces.retain(|s| *s != surface);
        surfaces.len() != before
    }
}
