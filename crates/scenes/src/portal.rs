use glam::Vec3;
use glimmer_assets::{AssetId, Geometry, Material, PendingTexture, Texture, TextureLoader};
use glimmer_common::Color;
use glimmer_kernel::{AnimationRule, GroupId, PointLight, PulseTarget, SceneObject};
use rand::Rng;
use std::f32::consts::TAU;
use std::path::PathBuf;

use crate::context::SceneContext;
use crate::program::{ResourceStatus, SceneError, SceneProgram};

pub const RING_GROUP: &str = "ring-particles";
pub const SMOKE_GROUP: &str = "smoke";
pub const GLOW_GROUP: &str = "center-glow";
pub const LIGHTNING_GROUP: &str = "lightning";
pub const LIGHT_GROUP: &str = "portal-light";

pub const RING_PARTICLES: usize = 1500;
pub const RING_INNER: f32 = 2.6;
pub const RING_OUTER: f32 = 3.4;
pub const RING_JITTER_Z: f32 = 0.2;
pub const SMOKE_PUFFS: usize = 24;
pub const SMOKE_RADIUS: f32 = 4.0;
pub const SMOKE_OPACITY: f32 = 0.35;
pub const BOLTS: usize = 8;
const BOLT_SEGMENTS: usize = 6;
const BOLT_JITTER: f32 = 0.18;
const BOLT_START: f32 = 0.4;

const VIOLET: u32 = 0x8a2be2;

/// Where the particle texture comes from.
#[derive(Debug)]
enum TextureRequest {
    Path(PathBuf),
    Pending(PendingTexture),
}

/// Fixed group ids, valid after bootstrap.
#[derive(Debug, Clone, Copy)]
struct PortalGroups {
    ring: GroupId,
    smoke: GroupId,
}

/// Swirling portal: particle ring, smoke, center glow, lightning and a
/// pulsing point light.
///
/// The ring and smoke need the particle texture and are added when it
/// arrives; until then (or forever, on failure) their groups stay empty.
#[derive(Debug)]
pub struct PortalScene {
    request: Option<TextureRequest>,
    pending: Option<PendingTexture>,
    groups: Option<PortalGroups>,
}

impl PortalScene {
    /// Portal that loads its particle texture from `path` in the background.
    pub fn new(texture_path: impl Into<PathBuf>) -> Self {
        Self {
            request: Some(TextureRequest::Path(texture_path.into())),
            pending: None,
            groups: None,
        }
    }

    /// Portal that waits on an externally driven texture load.
    pub fn with_pending(pending: PendingTexture) -> Self {
        Self {
            request: Some(TextureRequest::Pending(pending)),
            pending: None,
            groups: None,
        }
    }

    /// True while the texture load is outstanding.
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    fn augment(&self, ctx: &mut SceneContext, texture: Texture) -> Result<usize, SceneError> {
        let Some(groups) = self.groups else {
            return Ok(0);
        };
        let map = ctx.assets.register_texture(texture);
        let before = ctx.scene.object_count();

        let positions = ring_positions(&mut ctx.rng);
        let ring_geo = ctx.assets.register_geometry(Geometry::Points { positions });
        let ring_mat = ctx.assets.register_material(
            Material::basic("ring-particles", Color::from_hex(0xc77dff))
                .with_map(map)
                .with_point_size(0.08)
                .additive(),
        );
        ctx.scene
            .add_to_group(groups.ring, SceneObject::points("ring", ring_geo, ring_mat))?;

        let smoke_geo = ctx.assets.register_geometry(Geometry::plane(4.0, 4.0));
        let smoke_mat = ctx.assets.register_material(smoke_material(map));
        for i in 0..SMOKE_PUFFS {
            let position = smoke_position(&mut ctx.rng);
            let angle = ctx.rng.gen_range(0.0..TAU);
            let puff = SceneObject::mesh(format!("smoke-{i}"), smoke_geo, smoke_mat)
                .at(position)
                .rotated_z(angle);
            ctx.scene.add_to_group(groups.smoke, puff)?;
        }

        Ok(ctx.scene.object_count() - before)
    }
}

impl SceneProgram for PortalScene {
    fn name(&self) -> &str {
        "portal"
    }

    fn bootstrap(&mut self, ctx: &mut SceneContext) -> Result<(), SceneError> {
        let scene = &mut ctx.scene;

        // Registration order is evaluation order.
        let ring = scene.add_group(RING_GROUP, vec![AnimationRule::spin_z(-1.5)]);
        let smoke = scene.add_group(SMOKE_GROUP, vec![AnimationRule::spin_z(-0.2)]);
        let glow = scene.add_group(
            GLOW_GROUP,
            vec![AnimationRule::Pulse {
                target: PulseTarget::Scale,
                base: 1.0,
                amplitude: 0.06,
                frequency: 2.0,
            }],
        );
        let lightning = scene.add_group(
            LIGHTNING_GROUP,
            vec![
                AnimationRule::Flicker { threshold: 0.92 },
                AnimationRule::spin_z(2.0),
            ],
        );
        let light = scene.add_group(
            LIGHT_GROUP,
            vec![AnimationRule::Pulse {
                target: PulseTarget::LightPower,
                base: 500.0,
                amplitude: 400.0,
                frequency: 4.0,
            }],
        );
        self.groups = Some(PortalGroups { ring, smoke });

        let glow_geo = ctx.assets.register_geometry(Geometry::plane(3.0, 3.0));
        let glow_mat = ctx
            .assets
            .register_material(Material::basic("center-glow", Color::from_hex(0xb266ff)).additive());
        ctx.scene
            .add_to_group(glow, SceneObject::mesh("center-glow", glow_geo, glow_mat))?;

        let bolt_mat = ctx
            .assets
            .register_material(Material::basic("lightning", Color::from_hex(0xe0c3ff)).additive());
        for i in 0..BOLTS {
            let points = bolt_points(&mut ctx.rng);
            let bolt_geo = ctx.assets.register_geometry(Geometry::Polyline { points });
            let angle = ctx.rng.gen_range(0.0..TAU);
            ctx.scene.add_to_group(
                lightning,
                SceneObject::line(format!("bolt-{i}"), bolt_geo, bolt_mat).rotated_z(angle),
            )?;
        }

        ctx.scene.add_to_group(
            light,
            SceneObject::light(
                "portal-light",
                PointLight {
                    color: Color::from_hex(VIOLET),
                    power: 500.0,
                    distance: 20.0,
                },
            ),
        )?;

        self.pending = match self.request.take() {
            Some(TextureRequest::Path(path)) => Some(TextureLoader::new().load(path)),
            Some(TextureRequest::Pending(pending)) => Some(pending),
            None => None,
        };

        tracing::info!(
            objects = ctx.scene.object_count(),
            groups = ctx.scene.groups().len(),
            "portal scene built"
        );
        Ok(())
    }

    fn poll_resources(&mut self, ctx: &mut SceneContext) -> ResourceStatus {
        let Some(pending) = self.pending.as_mut() else {
            return ResourceStatus::Ready;
        };
        let Some(result) = pending.try_take() else {
            return ResourceStatus::Pending;
        };
        let path = pending.path().display().to_string();
        self.pending = None;

        let texture = match result {
            Ok(texture) => texture,
            Err(e) => {
                tracing::warn!(%path, "particle texture failed to load, ring and smoke disabled: {e}");
                return ResourceStatus::Failed;
            }
        };
        match self.augment(ctx, texture) {
            Ok(added) => {
                tracing::debug!(%path, added, "portal augmented with textured particles");
                ResourceStatus::Loaded
            }
            Err(e) => {
                tracing::warn!(%path, "portal augmentation failed: {e}");
                ResourceStatus::Failed
            }
        }
    }
}

fn smoke_material(map: AssetId) -> Material {
    let mut material = Material::basic("smoke", Color::from_hex(0x6a0dad))
        .with_map(map)
        .with_opacity(SMOKE_OPACITY);
    material.depth_write = false;
    material
}

/// Points uniformly spread over the annulus, jittered in depth.
fn ring_positions<R: Rng>(rng: &mut R) -> Vec<Vec3> {
    (0..RING_PARTICLES)
        .map(|_| {
            let angle = rng.gen_range(0.0..TAU);
            let radius = rng.gen_range(RING_INNER..RING_OUTER);
            let z = rng.gen_range(-RING_JITTER_Z..RING_JITTER_Z);
            Vec3::new(angle.cos() * radius, angle.sin() * radius, z)
        })
        .collect()
}

fn smoke_position<R: Rng>(rng: &mut R) -> Vec3 {
    let angle = rng.gen_range(0.0..TAU);
    let radius = rng.gen_range(0.0..SMOKE_RADIUS);
    Vec3::new(angle.cos() * radius, angle.sin() * radius, -0.5)
}

/// Jagged strip along +X from near the center out to the ring.
fn bolt_points<R: Rng>(rng: &mut R) -> Vec<Vec3> {
    (0..=BOLT_SEGMENTS)
        .map(|i| {
            let t = i as f32 / BOLT_SEGMENTS as f32;
            let x = BOLT_START + t * (RING_INNER - BOLT_START);
            let y = if i == 0 || i == BOLT_SEGMENTS {
                0.0
            } else {
                rng.gen_range(-BOLT_JITTER..BOLT_JITTER)
            };
            Vec3::new(x, y, 0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimmer_assets::{AssetError, Blending, TextureSource};
    use glimmer_kernel::ObjectKind;

    fn particle() -> Texture {
        Texture {
            name: "portal_particle".into(),
            width: 2,
            height: 2,
            source: TextureSource::Pixels(vec![255; 16]),
        }
    }

    fn bootstrapped(seed: u64) -> (PortalScene, SceneContext, glimmer_assets::TextureCompleter) {
        let (completer, pending) = PendingTexture::channel("portal_particle.png");
        let mut program = PortalScene::with_pending(pending);
        let mut ctx = SceneContext::new(Some(seed), 1.0);
        program.bootstrap(&mut ctx).unwrap();
        (program, ctx, completer)
    }

    fn members(ctx: &SceneContext, name: &str) -> usize {
        let id = ctx.scene.group_by_name(name).unwrap();
        ctx.scene.group(id).unwrap().members().len()
    }

    #[test]
    fn groups_registered_in_fixed_order() {
        let (_, ctx, _completer) = bootstrapped(1);
        let names: Vec<&str> = ctx.scene.groups().iter().map(|g| g.name()).collect();
        assert_eq!(
            names,
            [RING_GROUP, SMOKE_GROUP, GLOW_GROUP, LIGHTNING_GROUP, LIGHT_GROUP]
        );
    }

    #[test]
    fn bootstrap_builds_texture_independent_parts() {
        let (program, ctx, _completer) = bootstrapped(1);
        assert!(program.is_loading());
        assert_eq!(members(&ctx, RING_GROUP), 0);
        assert_eq!(members(&ctx, SMOKE_GROUP), 0);
        assert_eq!(members(&ctx, GLOW_GROUP), 1);
        assert_eq!(members(&ctx, LIGHTNING_GROUP), BOLTS);
        assert_eq!(members(&ctx, LIGHT_GROUP), 1);
        assert_eq!(ctx.scene.object_count(), 1 + BOLTS + 1);

        let light = ctx.scene.get(ctx.scene.find("portal-light").unwrap()).unwrap();
        let params = light.light_params().unwrap();
        assert_eq!(params.power, 500.0);
        assert_eq!(params.distance, 20.0);
        assert_eq!(params.color, Color::from_hex(0x8a2be2));

        let glow = ctx.scene.get(ctx.scene.find("center-glow").unwrap()).unwrap();
        let material = ctx.assets.material(glow.material.unwrap()).unwrap();
        assert_eq!(material.blending, Blending::Additive);
    }

    #[test]
    fn bolts_have_distinct_random_orientation() {
        let (_, ctx, _completer) = bootstrapped(5);
        let group = ctx.scene.group_by_name(LIGHTNING_GROUP).unwrap();
        let angles: Vec<f32> = ctx
            .scene
            .group(group)
            .unwrap()
            .members()
            .iter()
            .map(|id| ctx.scene.get(*id).unwrap().transform.rotation.z)
            .collect();
        assert!(angles.iter().all(|a| (0.0..TAU).contains(a)));
        assert!(angles.windows(2).any(|w| w[0] != w[1]));
        for id in ctx.scene.group(group).unwrap().members() {
            assert_eq!(ctx.scene.get(*id).unwrap().kind, ObjectKind::Line);
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let (_, a, _ca) = bootstrapped(9);
        let (_, b, _cb) = bootstrapped(9);
        let za: Vec<f32> = a.scene.objects().map(|(_, o)| o.transform.rotation.z).collect();
        let zb: Vec<f32> = b.scene.objects().map(|(_, o)| o.transform.rotation.z).collect();
        assert_eq!(za, zb);
    }

    #[test]
    fn texture_success_fills_ring_and_smoke() {
        let (mut program, mut ctx, completer) = bootstrapped(2);
        assert_eq!(program.poll_resources(&mut ctx), ResourceStatus::Pending);

        completer.resolve(particle());
        assert_eq!(program.poll_resources(&mut ctx), ResourceStatus::Loaded);
        assert_eq!(program.poll_resources(&mut ctx), ResourceStatus::Ready);
        assert!(!program.is_loading());

        assert_eq!(members(&ctx, RING_GROUP), 1);
        assert_eq!(members(&ctx, SMOKE_GROUP), SMOKE_PUFFS);

        let ring = ctx.scene.get(ctx.scene.find("ring").unwrap()).unwrap();
        let Some(Geometry::Points { positions }) = ctx.assets.geometry(ring.geometry.unwrap()) else {
            panic!("ring should be a point cloud");
        };
        assert_eq!(positions.len(), RING_PARTICLES);
        for p in positions {
            let r = p.truncate().length();
            assert!((RING_INNER - 1e-4..=RING_OUTER + 1e-4).contains(&r), "radius {r}");
            assert!(p.z.abs() <= RING_JITTER_Z);
        }

        let smoke_id = ctx.scene.find("smoke-0").unwrap();
        let smoke = ctx.scene.get(smoke_id).unwrap();
        assert!(smoke.transform.position.truncate().length() <= SMOKE_RADIUS);
        let material = ctx.assets.material(smoke.material.unwrap()).unwrap();
        assert_eq!(material.opacity, SMOKE_OPACITY);
        assert!(material.map.is_some());
        assert_eq!(
            ctx.assets.geometry(smoke.geometry.unwrap()),
            Some(&Geometry::plane(4.0, 4.0))
        );
    }

    #[test]
    fn texture_failure_leaves_groups_empty() {
        let (mut program, mut ctx, completer) = bootstrapped(3);
        completer.reject(AssetError::LoadCancelled("portal_particle.png".into()));
        assert_eq!(program.poll_resources(&mut ctx), ResourceStatus::Failed);
        assert_eq!(program.poll_resources(&mut ctx), ResourceStatus::Ready);
        assert_eq!(members(&ctx, RING_GROUP), 0);
        assert_eq!(members(&ctx, SMOKE_GROUP), 0);
        assert_eq!(ctx.scene.object_count(), 1 + BOLTS + 1);
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal_particle.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([200, 150, 255, 255]))
            .save(&path)
            .unwrap();

        let mut program = PortalScene::new(&path);
        let mut ctx = SceneContext::new(Some(4), 1.0);
        program.bootstrap(&mut ctx).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let status = loop {
            match program.poll_resources(&mut ctx) {
                ResourceStatus::Pending => {
                    assert!(std::time::Instant::now() < deadline, "load timed out");
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                other => break other,
            }
        };
        assert_eq!(status, ResourceStatus::Loaded);
        assert_eq!(ctx.assets.texture_count(), 1);
    }

    #[test]
    fn missing_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let mut program = PortalScene::new(dir.path().join("nope.png"));
        let mut ctx = SceneContext::new(Some(4), 1.0);
        program.bootstrap(&mut ctx).unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while program.poll_resources(&mut ctx) == ResourceStatus::Pending {
            assert!(std::time::Instant::now() < deadline, "load timed out");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(members(&ctx, RING_GROUP), 0);
        assert!(!program.is_loading());
    }
}
