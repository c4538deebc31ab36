use glimmer_assets::AssetError;
use glimmer_kernel::SceneGraphError;

use crate::context::SceneContext;

/// Errors raised while building a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("scene graph error: {0}")]
    Graph(#[from] SceneGraphError),
}

/// State of a program's deferred resources after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Nothing outstanding.
    Ready,
    /// A load is still in flight.
    Pending,
    /// A load finished this poll and the scene was augmented.
    Loaded,
    /// A load failed this poll; dependent features stay absent.
    Failed,
}

/// Builds a fixed scene graph once, then optionally augments it when
/// deferred resources arrive.
pub trait SceneProgram {
    fn name(&self) -> &str;

    /// Construct objects, assets and animated groups. Called once.
    fn bootstrap(&mut self, ctx: &mut SceneContext) -> Result<(), SceneError>;

    /// Apply any deferred resources that have arrived. Never blocks.
    fn poll_resources(&mut self, _ctx: &mut SceneContext) -> ResourceStatus {
        ResourceStatus::Ready
    }
}
