use glimmer_assets::AssetStore;
use glimmer_common::ObjectId;
use glimmer_kernel::{AnimationRule, ObjectKind, Scene};
use serde::Serialize;
use std::fmt;

/// Read-only queries against a scene for debugging and the CLI.
pub struct SceneInspector;

impl SceneInspector {
    pub fn summary(scene: &Scene, assets: &AssetStore) -> SceneSummary {
        SceneSummary {
            objects: scene.object_count(),
            visible: scene.objects().filter(|(_, o)| o.visible).count(),
            lights: scene
                .objects()
                .filter(|(_, o)| matches!(o.kind, ObjectKind::PointLight(_)))
                .count(),
            assets: assets.len(),
            textures: assets.texture_count(),
            groups: scene
                .groups()
                .iter()
                .map(|g| GroupSummary {
                    name: g.name().to_string(),
                    members: g.members().len(),
                    rules: g.rules().iter().map(describe_rule).collect(),
                })
                .collect(),
        }
    }

    pub fn inspect_object(scene: &Scene, id: ObjectId) -> Option<ObjectInfo> {
        scene.get(id).map(|o| ObjectInfo {
            id: id.short(),
            name: o.name.clone(),
            kind: kind_name(&o.kind).to_string(),
            visible: o.visible,
            position: o.transform.position.to_array(),
            rotation: o.transform.rotation.to_array(),
            scale: o.transform.scale.to_array(),
            power: o.light_params().map(|l| l.power),
        })
    }

    /// Every object in draw order.
    pub fn list_objects(scene: &Scene) -> Vec<ObjectInfo> {
        scene
            .objects()
            .filter_map(|(id, _)| Self::inspect_object(scene, id))
            .collect()
    }
}

fn kind_name(kind: &ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Mesh => "mesh",
        ObjectKind::Line => "line",
        ObjectKind::Points => "points",
        ObjectKind::PointLight(_) => "point-light",
    }
}

fn describe_rule(rule: &AnimationRule) -> String {
    match rule {
        AnimationRule::Rotate { rate, timing } => {
            format!("rotate ({:.3}, {:.3}, {:.3}) {timing:?}", rate.x, rate.y, rate.z)
        }
        AnimationRule::Pulse {
            target,
            base,
            amplitude,
            frequency,
        } => format!("pulse {target:?} {base} ± {amplitude} @ {frequency}"),
        AnimationRule::Flicker { threshold } => format!("flicker > {threshold}"),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub members: usize,
    pub rules: Vec<String>,
}

/// Summary of a scene for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub objects: usize,
    pub visible: usize,
    pub lights: usize,
    pub assets: usize,
    pub textures: usize,
    pub groups: Vec<GroupSummary>,
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Scene: objects={} visible={} lights={} assets={} textures={}",
            self.objects, self.visible, self.lights, self.assets, self.textures
        )?;
        for g in &self.groups {
            write!(f, "  group {:<15} members={:<3}", g.name, g.members)?;
            for rule in &g.rules {
                write!(f, " [{rule}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Detailed info about a single object.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectInfo {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub visible: bool,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f32>,
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) pos=({:.2}, {:.2}, {:.2}) rot=({:.3}, {:.3}, {:.3}) scale={:.3}",
            self.id,
            self.name,
            self.kind,
            self.position[0],
            self.position[1],
            self.position[2],
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
            self.scale[0],
        )?;
        if let Some(power) = self.power {
            write!(f, " power={power:.1}")?;
        }
        if !self.visible {
            write!(f, " hidden")?;
        }
        Ok(())
    }
}
