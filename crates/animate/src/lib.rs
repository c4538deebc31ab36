//! Frame updater: the per-tick mutation pass over a scene's animated groups.
//!
//! # Invariants
//! - Groups run in registration order; rules within a group run in order.
//! - Membership is snapshotted at the start of each tick, so objects added
//!   mid-tick are first animated on the following tick.
//! - Random draws are independent per member.
//! - Empty groups and members that left the scene are skipped without error.

use glam::Vec3;
use glimmer_common::ObjectId;
use glimmer_kernel::{AnimationRule, PulseTarget, Scene, SceneObject};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Counters from one [`FrameUpdater::update`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub groups: usize,
    pub mutated: usize,
    pub missing: usize,
}

/// Applies every animated group's rules to its members once per tick.
#[derive(Debug, Clone)]
pub struct FrameUpdater<R: Rng = StdRng> {
    rng: R,
    ticks: u64,
}

impl FrameUpdater<StdRng> {
    /// Updater with a reproducible random stream.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<R: Rng> FrameUpdater<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng, ticks: 0 }
    }

    /// Number of completed updates.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick of every group's rules. Both times are in seconds.
    pub fn update(&mut self, scene: &mut Scene, delta: f32, elapsed: f64) -> UpdateStats {
        let _span = tracing::trace_span!("frame_update", tick = self.ticks).entered();

        let plan: Vec<(Vec<ObjectId>, Vec<AnimationRule>)> = scene
            .groups()
            .iter()
            .map(|g| (g.members().to_vec(), g.rules().to_vec()))
            .collect();

        let mut stats = UpdateStats {
            groups: plan.len(),
            ..UpdateStats::default()
        };

        for (members, rules) in &plan {
            for id in members {
                let Some(object) = scene.get_mut(*id) else {
                    stats.missing += 1;
                    continue;
                };
                for rule in rules {
                    apply_rule(object, rule, delta, elapsed, &mut self.rng);
                }
                stats.mutated += 1;
            }
        }

        self.ticks += 1;
        tracing::trace!(
            groups = stats.groups,
            mutated = stats.mutated,
            missing = stats.missing,
            "frame update complete"
        );
        stats
    }
}

fn apply_rule<R: Rng>(
    object: &mut SceneObject,
    rule: &AnimationRule,
    delta: f32,
    elapsed: f64,
    rng: &mut R,
) {
    match *rule {
        AnimationRule::Rotate { rate, timing } => {
            object.transform.rotation += AnimationRule::rotation_step(rate, timing, delta);
        }
        AnimationRule::Pulse {
            target,
            base,
            amplitude,
            frequency,
        } => {
            let value = AnimationRule::pulse_value(base, amplitude, frequency, elapsed);
            match target {
                PulseTarget::Scale => object.transform.scale = Vec3::splat(value),
                PulseTarget::LightPower => {
                    if let Some(light) = object.light_params_mut() {
                        light.power = value;
                    }
                }
            }
        }
        AnimationRule::Flicker { threshold } => {
            object.visible = rng.r#gen::<f32>() > threshold;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimmer_assets::AssetId;
    use glimmer_common::Color;
    use glimmer_kernel::{GroupId, PointLight, Timing};
    use std::f32::consts::TAU;

    const DT: f32 = 1.0 / 60.0;

    fn mesh(name: &str) -> SceneObject {
        SceneObject::mesh(name, AssetId(1), AssetId(2))
    }

    fn scene_with(rules: Vec<AnimationRule>, count: usize) -> (Scene, GroupId, Vec<ObjectId>) {
        let mut scene = Scene::new();
        let group = scene.add_group("g", rules);
        let ids = (0..count)
            .map(|i| scene.add_to_group(group, mesh(&format!("m{i}"))).unwrap())
            .collect();
        (scene, group, ids)
    }

    fn tumble() -> AnimationRule {
        AnimationRule::Rotate {
            rate: Vec3::new(0.01, 0.01, 0.0),
            timing: Timing::PerTick,
        }
    }

    #[test]
    fn per_tick_rotation_ignores_wall_time() {
        let (mut scene, _, ids) = scene_with(vec![tumble()], 1);
        let mut updater = FrameUpdater::seeded(1);
        let deltas = [0.001, 0.5, 0.016, 2.0, 0.0];
        let mut elapsed = 0.0;
        for i in 0..250 {
            let delta = deltas[i % deltas.len()];
            elapsed += f64::from(delta);
            updater.update(&mut scene, delta, elapsed);
        }
        let rot = scene.get(ids[0]).unwrap().transform.rotation;
        let expected = (250.0 * 0.01f32).rem_euclid(TAU);
        assert!((rot.x.rem_euclid(TAU) - expected).abs() < 1e-3);
        assert!((rot.y.rem_euclid(TAU) - expected).abs() < 1e-3);
        assert_eq!(rot.z, 0.0);
        assert_eq!(updater.ticks(), 250);
    }

    #[test]
    fn hundred_ticks_reach_one_radian() {
        let (mut scene, _, ids) = scene_with(vec![tumble()], 1);
        let mut updater = FrameUpdater::seeded(0);
        for i in 0..100 {
            updater.update(&mut scene, DT, (i + 1) as f64 * f64::from(DT));
        }
        let rot = scene.get(ids[0]).unwrap().transform.rotation;
        assert!((rot.x - 1.0).abs() < 1e-4);
        assert!((rot.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn spin_is_delta_scaled() {
        let (mut scene, _, ids) = scene_with(vec![AnimationRule::spin_z(-1.5)], 3);
        let mut updater = FrameUpdater::seeded(0);
        updater.update(&mut scene, 0.1, 0.1);
        updater.update(&mut scene, 0.3, 0.4);
        for id in ids {
            let z = scene.get(id).unwrap().transform.rotation.z;
            assert!((z - (-1.5 * 0.4)).abs() < 1e-5);
        }
    }

    #[test]
    fn glow_scale_follows_elapsed_only() {
        let glow = AnimationRule::Pulse {
            target: PulseTarget::Scale,
            base: 1.0,
            amplitude: 0.06,
            frequency: 2.0,
        };
        let (mut scene, _, ids) = scene_with(vec![glow], 1);
        let mut updater = FrameUpdater::seeded(0);
        for (delta, elapsed) in [(0.016, 0.016), (0.9, 0.916), (0.004, 0.92), (3.0, 3.92)] {
            updater.update(&mut scene, delta, elapsed);
            let scale = scene.get(ids[0]).unwrap().transform.scale;
            let expected = (1.0 + (2.0 * elapsed).sin() * 0.06) as f32;
            assert!((scale.x - expected).abs() < 1e-6);
            assert_eq!(scale.x, scale.y);
            assert_eq!(scale.y, scale.z);
        }
    }

    #[test]
    fn light_power_stays_in_band() {
        let mut scene = Scene::new();
        let group = scene.add_group(
            "light",
            vec![AnimationRule::Pulse {
                target: PulseTarget::LightPower,
                base: 500.0,
                amplitude: 400.0,
                frequency: 4.0,
            }],
        );
        let id = scene
            .add_to_group(
                group,
                SceneObject::light(
                    "portal-light",
                    PointLight {
                        color: Color::WHITE,
                        power: 500.0,
                        distance: 20.0,
                    },
                ),
            )
            .unwrap();

        let mut updater = FrameUpdater::seeded(0);
        let mut elapsed = 0.0;
        for _ in 0..2_000 {
            elapsed += 0.0137;
            updater.update(&mut scene, 0.0137, elapsed);
            let power = scene.get(id).unwrap().light_params().unwrap().power;
            assert!((100.0..=900.0).contains(&power), "power {power} out of band");
        }
    }

    #[test]
    fn light_pulse_ignores_meshes() {
        let rule = AnimationRule::Pulse {
            target: PulseTarget::LightPower,
            base: 500.0,
            amplitude: 400.0,
            frequency: 4.0,
        };
        let (mut scene, _, ids) = scene_with(vec![rule], 1);
        let before = scene.get(ids[0]).unwrap().clone();
        FrameUpdater::seeded(0).update(&mut scene, DT, 1.0);
        assert_eq!(scene.get(ids[0]).unwrap(), &before);
    }

    #[test]
    fn flicker_is_bernoulli_with_low_probability() {
        let rules = vec![AnimationRule::Flicker { threshold: 0.92 }, AnimationRule::spin_z(2.0)];
        let (mut scene, _, ids) = scene_with(rules, 8);
        let mut updater = FrameUpdater::seeded(42);

        let ticks = 5_000;
        let mut visible = 0usize;
        for i in 0..ticks {
            updater.update(&mut scene, DT, (i + 1) as f64 * f64::from(DT));
            visible += ids
                .iter()
                .filter(|id| scene.get(**id).unwrap().visible)
                .count();
        }
        let p = visible as f64 / (ticks * ids.len()) as f64;
        assert!((p - 0.08).abs() < 0.01, "observed P(visible) = {p}");

        let z = scene.get(ids[0]).unwrap().transform.rotation.z;
        assert!((z - 2.0 * DT * ticks as f32).abs() < 1e-2);
    }

    #[test]
    fn bolts_flicker_independently() {
        let (mut scene, _, ids) = scene_with(vec![AnimationRule::Flicker { threshold: 0.5 }], 16);
        let mut updater = FrameUpdater::seeded(7);
        let mut saw_mixed = false;
        for _ in 0..20 {
            updater.update(&mut scene, DT, 0.0);
            let lit = ids.iter().filter(|id| scene.get(**id).unwrap().visible).count();
            if lit > 0 && lit < ids.len() {
                saw_mixed = true;
            }
        }
        assert!(saw_mixed);
    }

    #[test]
    fn same_seed_same_visibility() {
        let rules = vec![AnimationRule::Flicker { threshold: 0.92 }];
        let (mut a, _, ids_a) = scene_with(rules.clone(), 8);
        let (mut b, _, ids_b) = scene_with(rules, 8);
        let mut ua = FrameUpdater::seeded(99);
        let mut ub = FrameUpdater::seeded(99);
        for _ in 0..50 {
            ua.update(&mut a, DT, 0.0);
            ub.update(&mut b, DT, 0.0);
            let va: Vec<bool> = ids_a.iter().map(|id| a.get(*id).unwrap().visible).collect();
            let vb: Vec<bool> = ids_b.iter().map(|id| b.get(*id).unwrap().visible).collect();
            assert_eq!(va, vb);
        }
    }

    #[test]
    fn empty_groups_are_noops() {
        let mut scene = Scene::new();
        scene.add_group("ring-particles", vec![AnimationRule::spin_z(-1.5)]);
        scene.add_group("smoke", vec![AnimationRule::spin_z(-0.2)]);
        let stats = FrameUpdater::seeded(0).update(&mut scene, DT, f64::from(DT));
        assert_eq!(
            stats,
            UpdateStats {
                groups: 2,
                mutated: 0,
                missing: 0
            }
        );
    }

    #[test]
    fn objects_outside_groups_are_untouched() {
        let (mut scene, _, _) = scene_with(vec![tumble()], 1);
        let loose = scene.add(mesh("loose"));
        FrameUpdater::seeded(0).update(&mut scene, DT, f64::from(DT));
        assert_eq!(scene.get(loose).unwrap().transform.rotation, Vec3::ZERO);
    }

    #[test]
    fn groups_apply_in_registration_order() {
        // Both groups hold the same object; the later scale pulse wins.
        let mut scene = Scene::new();
        let first = scene.add_group(
            "first",
            vec![AnimationRule::Pulse {
                target: PulseTarget::Scale,
                base: 5.0,
                amplitude: 0.0,
                frequency: 0.0,
            }],
        );
        let second = scene.add_group(
            "second",
            vec![AnimationRule::Pulse {
                target: PulseTarget::Scale,
                base: 2.0,
                amplitude: 0.0,
                frequency: 0.0,
            }],
        );
        let id = scene.add_to_group(first, mesh("shared")).unwrap();
        scene.join_group(second, id).unwrap();

        FrameUpdater::seeded(0).update(&mut scene, DT, f64::from(DT));
        assert_eq!(scene.get(id).unwrap().transform.scale, Vec3::splat(2.0));
    }
}
