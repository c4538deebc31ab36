use glimmer_common::{SurfaceId, Viewport};
use glimmer_render::{RenderError, Renderer};

/// Handle for one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Handle for a resize notification registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(pub u64);

/// The environment a stage runs in: a display, a refresh callback and
/// resize notifications.
///
/// The host calls back into the stage (`on_frame`, `on_resize`) from its
/// own event loop, one call at a time.
pub trait Host {
    type Surface: Renderer;

    /// Current drawable size.
    fn viewport(&self) -> Viewport;

    fn create_surface(&mut self, viewport: Viewport) -> Result<Self::Surface, RenderError>;

    /// Ask for one frame callback at the next display refresh.
    fn request_frame(&mut self) -> FrameRequest;

    fn cancel_frame(&mut self, request: FrameRequest);

    fn subscribe_resize(&mut self) -> Subscription;

    fn unsubscribe_resize(&mut self, subscription: Subscription);
}

/// Container that displays a surface, such as a window or a panel.
pub trait MountTarget {
    fn insert_surface(&mut self, surface: SurfaceId);

    /// Returns false if the surface was not mounted here.
    fn remove_surface(&mut self, surface: SurfaceId) -> bool;
}
