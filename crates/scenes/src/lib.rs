//! Scene bootstrappers.
//!
//! A [`SceneProgram`] builds its objects, assets and animated groups into a
//! [`SceneContext`] exactly once. Object counts and material bindings are
//! fixed; only random placement varies with the context's seed.
//!
//! # Invariants
//! - Every animated group is registered during bootstrap, even when its
//!   members only arrive later with a deferred texture.
//! - A failed texture load leaves the dependent groups empty and is not an
//!   error.

mod config;
mod context;
mod cube;
mod portal;
mod program;

pub use config::{ConfigError, SceneConfig, SceneKind};
pub use context::SceneContext;
pub use cube::{CUBE_GROUP, CUBE_RATE, CUBE_STEP, CubeScene};
pub use portal::{
    BOLTS, GLOW_GROUP, LIGHT_GROUP, LIGHTNING_GROUP, PortalScene, RING_GROUP, RING_PARTICLES,
    SMOKE_GROUP, SMOKE_PUFFS,
};
pub use program::{ResourceStatus, SceneError, SceneProgram};

use glimmer_kernel::Timing;

/// Build the program a config selects.
pub fn program_for(config: &SceneConfig) -> Box<dyn SceneProgram> {
    match config.scene {
        SceneKind::Cube => {
            let timing = if config.delta_scaled_primary {
                Timing::PerSecond
            } else {
                Timing::PerTick
            };
            Box::new(CubeScene::new(timing))
        }
        SceneKind::Portal => Box::new(PortalScene::new(config.texture_path.clone())),
    }
}

impl<P: SceneProgram + ?Sized> SceneProgram for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn bootstrap(&mut self, ctx: &mut SceneContext) -> Result<(), SceneError> {
        (**self).bootstrap(ctx)
    }

    fn poll_resources(&mut self, ctx: &mut SceneContext) -> ResourceStatus {
        (**self).poll_resources(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimmer_animate::FrameUpdater;
    use glimmer_assets::PendingTexture;

    #[test]
    fn config_selects_program() {
        let mut config = SceneConfig::default();
        assert_eq!(program_for(&config).name(), "cube");
        config.scene = SceneKind::Portal;
        assert_eq!(program_for(&config).name(), "portal");
    }

    #[test]
    fn delta_scaled_flag_reaches_cube_rule() {
        let config = SceneConfig {
            delta_scaled_primary: true,
            ..SceneConfig::default()
        };
        let mut ctx = SceneContext::new(Some(0), 1.0);
        program_for(&config).bootstrap(&mut ctx).unwrap();
        let cube = ctx.scene.find("cube").unwrap();

        let mut updater = FrameUpdater::seeded(0);
        updater.update(&mut ctx.scene, 0.5, 0.5);
        let rot = ctx.scene.get(cube).unwrap().transform.rotation;
        assert!((rot.x - 0.3).abs() < 1e-6);
    }

    #[test]
    fn unloaded_portal_still_animates() {
        let (_completer, pending) = PendingTexture::channel("never.png");
        let mut program = PortalScene::with_pending(pending);
        let mut ctx = SceneContext::new(Some(11), 1.0);
        program.bootstrap(&mut ctx).unwrap();
        let glow = ctx.scene.find("center-glow").unwrap();
        let bolt = ctx.scene.find("bolt-0").unwrap();
        let start_z = ctx.scene.get(bolt).unwrap().transform.rotation.z;

        let mut updater = FrameUpdater::seeded(11);
        let dt = 1.0 / 60.0;
        for i in 1..=60 {
            assert_eq!(program.poll_resources(&mut ctx), ResourceStatus::Pending);
            updater.update(&mut ctx.scene, dt, f64::from(dt) * i as f64);
        }

        let scale = ctx.scene.get(glow).unwrap().transform.scale.x;
        assert!((scale - (1.0 + 2.0f32.sin() * 0.06)).abs() < 1e-4);
        let z = ctx.scene.get(bolt).unwrap().transform.rotation.z;
        assert!((z - start_z - 2.0).abs() < 1e-3);
    }
}
