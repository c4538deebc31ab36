use glam::Vec3;
use glimmer_common::ObjectId;
use serde::{Deserialize, Serialize};

/// Index of an animated group in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub usize);

/// Whether a rotation rate applies once per tick or per second of delta time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timing {
    /// Fixed increment every tick; speed depends on the refresh rate.
    PerTick,
    /// Increment scaled by the tick's delta seconds.
    PerSecond,
}

/// Property driven by a [`AnimationRule::Pulse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseTarget {
    /// Uniform scale on all three axes.
    Scale,
    /// Power of a point light. Ignored on non-light objects.
    LightPower,
}

/// A per-tick mutation applied to every member of a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnimationRule {
    /// `rotation += rate` (per tick) or `rotation += rate * delta` (per second).
    Rotate { rate: Vec3, timing: Timing },
    /// `target = base + sin(elapsed * frequency) * amplitude`.
    Pulse {
        target: PulseTarget,
        base: f32,
        amplitude: f32,
        frequency: f32,
    },
    /// `visible = random() > threshold`, drawn independently per member.
    Flicker { threshold: f32 },
}

impl AnimationRule {
    /// Rotation about Z at `rate` radians per second.
    pub fn spin_z(rate: f32) -> Self {
        Self::Rotate {
            rate: Vec3::new(0.0, 0.0, rate),
            timing: Timing::PerSecond,
        }
    }

    /// Rotation step for one tick.
    pub fn rotation_step(rate: Vec3, timing: Timing, delta: f32) -> Vec3 {
        match timing {
            Timing::PerTick => rate,
            Timing::PerSecond => rate * delta,
        }
    }

    /// The phase is computed in `f64` so it stays accurate after days of
    /// elapsed time.
    pub fn pulse_value(base: f32, amplitude: f32, frequency: f32, elapsed: f64) -> f32 {
        base + (elapsed * f64::from(frequency)).sin() as f32 * amplitude
    }
}

/// A named set of objects sharing one ordered list of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimatedGroup {
    name: String,
    members: Vec<ObjectId>,
    rules: Vec<AnimationRule>,
}

impl AnimatedGroup {
    pub fn new(name: impl Into<String>, rules: Vec<AnimationRule>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            rules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[ObjectId] {
        &self.members
    }

    pub fn rules(&self) -> &[AnimationRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn push(&mut self, id: ObjectId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }
}
