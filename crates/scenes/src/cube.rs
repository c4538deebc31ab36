use glam::Vec3;
use glimmer_assets::{Geometry, Material, TextLabel, Texture};
use glimmer_common::Color;
use glimmer_kernel::{AnimationRule, SceneObject, Timing};

use crate::context::SceneContext;
use crate::program::{SceneError, SceneProgram};

pub const CUBE_GROUP: &str = "cube";
/// Rotation added to x and y every tick.
pub const CUBE_STEP: f32 = 0.01;
/// Equivalent rate at 60 Hz when rotation is delta-scaled.
pub const CUBE_RATE: f32 = CUBE_STEP * 60.0;

/// Orange tumbling cube with a "Hello" label floating above it.
#[derive(Debug, Clone)]
pub struct CubeScene {
    timing: Timing,
}

impl CubeScene {
    pub fn new(timing: Timing) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    fn rotation_rule(&self) -> AnimationRule {
        let step = match self.timing {
            Timing::PerTick => CUBE_STEP,
            Timing::PerSecond => CUBE_RATE,
        };
        AnimationRule::Rotate {
            rate: Vec3::new(step, step, 0.0),
            timing: self.timing,
        }
    }
}

impl Default for CubeScene {
    fn default() -> Self {
        Self::new(Timing::PerTick)
    }
}

impl SceneProgram for CubeScene {
    fn name(&self) -> &str {
        "cube"
    }

    fn bootstrap(&mut self, ctx: &mut SceneContext) -> Result<(), SceneError> {
        let assets = &mut ctx.assets;

        let cube_geo = assets.register_geometry(Geometry::cuboid(2.0, 2.0, 2.0));
        let cube_mat = assets.register_material(Material::basic("cube", Color::from_hex(0xffa500)));

        let label = assets.register_texture(Texture::canvas(
            "hello-label",
            512,
            256,
            TextLabel {
                text: "Hello".into(),
                font: "Arial".into(),
                font_px: 48,
                fill: Color::WHITE,
                origin: [50, 100],
            },
        ));
        let label_geo = assets.register_geometry(Geometry::plane(5.0, 2.5));
        let label_mat = assets.register_material(
            Material::basic("label", Color::WHITE)
                .with_map(label)
                .transparent(),
        );

        let group = ctx.scene.add_group(CUBE_GROUP, vec![self.rotation_rule()]);
        ctx.scene
            .add_to_group(group, SceneObject::mesh("cube", cube_geo, cube_mat))?;
        ctx.scene
            .add(SceneObject::mesh("label", label_geo, label_mat).at(Vec3::new(0.0, 3.0, 0.0)));

        tracing::info!(timing = ?self.timing, objects = ctx.scene.object_count(), "cube scene built");
        Ok(())
    }
}
