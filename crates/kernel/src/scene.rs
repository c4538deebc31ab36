use glimmer_assets::AssetId;
use glimmer_common::{Color, ObjectId, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::group::{AnimatedGroup, AnimationRule, GroupId};

/// Point light parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub color: Color,
    /// Luminous power in lumens.
    pub power: f32,
    /// Cutoff distance; zero means unlimited.
    pub distance: f32,
}

/// What kind of primitive an object is drawn as.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Mesh,
    Line,
    Points,
    PointLight(PointLight),
}

/// A visual primitive in the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub transform: Transform,
    pub visible: bool,
    pub geometry: Option<AssetId>,
    pub material: Option<AssetId>,
}

impl SceneObject {
    fn drawable(name: impl Into<String>, kind: ObjectKind, geometry: AssetId, material: AssetId) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            visible: true,
            geometry: Some(geometry),
            material: Some(material),
        }
    }

    pub fn mesh(name: impl Into<String>, geometry: AssetId, material: AssetId) -> Self {
        Self::drawable(name, ObjectKind::Mesh, geometry, material)
    }

    pub fn line(name: impl Into<String>, geometry: AssetId, material: AssetId) -> Self {
        Self::drawable(name, ObjectKind::Line, geometry, material)
    }

    pub fn points(name: impl Into<String>, geometry: AssetId, material: AssetId) -> Self {
        Self::drawable(name, ObjectKind::Points, geometry, material)
    }

    pub fn light(name: impl Into<String>, light: PointLight) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::PointLight(light),
            transform: Transform::default(),
            visible: true,
            geometry: None,
            material: None,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn at(mut self, position: glam::Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn rotated_z(mut self, angle: f32) -> Self {
        self.transform.rotation.z = angle;
        self
    }

    pub fn light_params(&self) -> Option<&PointLight> {
        match &self.kind {
            ObjectKind::PointLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn light_params_mut(&mut self) -> Option<&mut PointLight> {
        match &mut self.kind {
            ObjectKind::PointLight(light) => Some(light),
            _ => None,
        }
    }
}

/// Errors from scene graph operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneGraphError {
    #[error("no animated group with id {0:?}")]
    UnknownGroup(GroupId),
    #[error("object {0:?} is not in the scene")]
    UnknownObject(ObjectId),
}

/// The set of objects a renderer draws plus the groups that animate them.
///
/// Objects are stored in a BTreeMap for deterministic lookup and also in
/// insertion order, which is the draw order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,
    order: Vec<ObjectId>,
    groups: Vec<AnimatedGroup>,
    background: Color,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            background: Color::BLACK,
            ..Self::default()
        }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    /// Add an object. Returns its id.
    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId::new();
        tracing::trace!(id = %id.short(), name = %object.name, "object added");
        self.objects.insert(id, object);
        self.order.push(id);
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// First object with the given name.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.objects.get(id).is_some_and(|o| o.name == name))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects in draw (insertion) order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.objects.get(id).map(|o| (*id, o)))
    }

    /// Register an animated group. Groups run in registration order.
    pub fn add_group(&mut self, name: impl Into<String>, rules: Vec<AnimationRule>) -> GroupId {
        let id = GroupId(self.groups.len());
        let group = AnimatedGroup::new(name, rules);
        tracing::debug!(group = %group.name(), rules = group.rules().len(), "animated group registered");
        self.groups.push(group);
        id
    }

    /// Add an existing object to a group.
    pub fn join_group(&mut self, group: GroupId, id: ObjectId) -> Result<(), SceneGraphError> {
        if !self.objects.contains_key(&id) {
            return Err(SceneGraphError::UnknownObject(id));
        }
        let g = self
            .groups
            .get_mut(group.0)
            .ok_or(SceneGraphError::UnknownGroup(group))?;
        g.push(id);
        Ok(())
    }

    /// Add an object and place it in a group in one step.
    pub fn add_to_group(
        &mut self,
        group: GroupId,
        object: SceneObject,
    ) -> Result<ObjectId, SceneGraphError> {
        if group.0 >= self.groups.len() {
            return Err(SceneGraphError::UnknownGroup(group));
        }
        let id = self.add(object);
        self.join_group(group, id)?;
        Ok(id)
    }

    pub fn group(&self, id: GroupId) -> Option<&AnimatedGroup> {
        self.groups.get(id.0)
    }

    pub fn group_by_name(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g.name() == name)
            .map(GroupId)
    }

    /// Groups in evaluation order.
    pub fn groups(&self) -> &[AnimatedGroup] {
        &self.groups
    }

    /// Drop every object and group.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.order.clear();
        self.groups.clear();
    }
}
