use glimmer_assets::AssetStore;
use glimmer_kernel::Scene;
use glimmer_render::PerspectiveCamera;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Everything a scene program builds into and a renderer reads from.
///
/// Owned by the stage for the lifetime of one attachment.
#[derive(Debug)]
pub struct SceneContext {
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub assets: AssetStore,
    /// Source of random placement. Seeded for reproducible runs.
    pub rng: StdRng,
}

impl SceneContext {
    pub fn new(seed: Option<u64>, aspect: f32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut camera = PerspectiveCamera::default();
        camera.set_aspect(aspect);
        Self {
            scene: Scene::new(),
            camera,
            assets: AssetStore::new(),
            rng,
        }
    }

    /// Drop every object, group and asset.
    pub fn clear(&mut self) {
        self.scene.clear();
        self.assets.clear();
    }
}
