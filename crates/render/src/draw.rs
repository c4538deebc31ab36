use glam::{Mat4, Vec3};
use glimmer_assets::{AssetId, AssetStore, Blending, Geometry, Material, TextureSource};
use glimmer_common::{Color, ObjectId};
use glimmer_kernel::{ObjectKind, SceneObject};
use std::collections::BTreeMap;

use crate::RenderView;

/// Shape a backend rasterizes for one draw item.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Unit cube scaled by the item's model matrix.
    Box,
    /// Unit quad in the XY plane scaled by the item's model matrix.
    Plane,
    /// World-space segment endpoints, two per segment.
    Lines(Vec<Vec3>),
    /// World-space point positions.
    Points(Vec<Vec3>),
}

/// One visible object resolved against its assets.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub object: ObjectId,
    pub primitive: Primitive,
    pub model: Mat4,
    /// Material color times texture tint, alpha folded with opacity.
    pub color: [f32; 4],
    pub blending: Blending,
    pub depth_write: bool,
    pub point_size: f32,
    /// Text of a canvas texture bound to the material, if any.
    pub label: Option<String>,
}

impl DrawItem {
    pub fn is_additive(&self) -> bool {
        self.blending == Blending::Additive
    }
}

/// Average texel color per texture, used to tint untextured backends.
#[derive(Debug, Default)]
pub struct TintCache {
    tints: BTreeMap<AssetId, [f32; 4]>,
}

impl TintCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn tint(&mut self, assets: &AssetStore, id: AssetId) -> [f32; 4] {
        if let Some(tint) = self.tints.get(&id) {
            return *tint;
        }
        let tint = match assets.texture(id).map(|t| &t.source) {
            Some(TextureSource::Pixels(px)) => mean_rgba(px),
            Some(TextureSource::Text(label)) => label.fill.0,
            None => Color::WHITE.0,
        };
        self.tints.insert(id, tint);
        tint
    }

    pub fn len(&self) -> usize {
        self.tints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tints.is_empty()
    }

    pub fn clear(&mut self) {
        self.tints.clear();
    }
}

fn mean_rgba(px: &[u8]) -> [f32; 4] {
    let texels = px.len() / 4;
    if texels == 0 {
        return Color::WHITE.0;
    }
    let mut sum = [0u64; 4];
    for texel in px.chunks_exact(4) {
        for (acc, c) in sum.iter_mut().zip(texel) {
            *acc += u64::from(*c);
        }
    }
    sum.map(|s| s as f32 / (texels as f32 * 255.0))
}

/// Flattened, backend-neutral frame description in draw order.
#[derive(Debug, Clone)]
pub struct DrawList {
    pub clear: Color,
    pub view_proj: Mat4,
    pub items: Vec<DrawItem>,
    /// Objects skipped because an asset id did not resolve.
    pub unresolved: usize,
}

impl DrawList {
    /// Resolve every visible drawable object of the view.
    ///
    /// Lights and hidden objects produce no items.
    pub fn build(view: &RenderView<'_>, tints: &mut TintCache) -> Self {
        let mut items = Vec::with_capacity(view.scene.object_count());
        let mut unresolved = 0;

        for (id, object) in view.scene.objects() {
            if !object.visible || matches!(object.kind, ObjectKind::PointLight(_)) {
                continue;
            }
            match resolve(id, object, view.assets, tints) {
                Some(item) => items.push(item),
                None => {
                    tracing::trace!(object = %id.short(), name = %object.name, "unresolved asset, skipped");
                    unresolved += 1;
                }
            }
        }

        Self {
            clear: view.scene.background(),
            view_proj: view.camera.view_projection(),
            items,
            unresolved,
        }
    }

    /// Items drawn with normal blending, then additive ones, each in scene order.
    pub fn ordered(&self) -> impl Iterator<Item = &DrawItem> + '_ {
        let normal = self.items.iter().filter(|i| !i.is_additive());
        let additive = self.items.iter().filter(|i| i.is_additive());
        normal.chain(additive)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn resolve(
    id: ObjectId,
    object: &SceneObject,
    assets: &AssetStore,
    tints: &mut TintCache,
) -> Option<DrawItem> {
    let geometry = assets.geometry(object.geometry?)?;
    let material = assets.material(object.material?)?;
    let world = object.transform.matrix();

    let (primitive, model) = match geometry {
        Geometry::Box {
            width,
            height,
            depth,
        } => (
            Primitive::Box,
            world * Mat4::from_scale(Vec3::new(*width, *height, *depth)),
        ),
        Geometry::Plane { width, height } => (
            Primitive::Plane,
            world * Mat4::from_scale(Vec3::new(*width, *height, 1.0)),
        ),
        Geometry::Polyline { points } => {
            let segments = points
                .windows(2)
                .flat_map(|w| [world.transform_point3(w[0]), world.transform_point3(w[1])])
                .collect();
            (Primitive::Lines(segments), world)
        }
        Geometry::Points { positions } => {
            let points = positions.iter().map(|p| world.transform_point3(*p)).collect();
            (Primitive::Points(points), world)
        }
    };

    let label = material
        .map
        .and_then(|t| assets.texture(t))
        .and_then(|t| match &t.source {
            TextureSource::Text(label) => Some(label.text.clone()),
            TextureSource::Pixels(_) => None,
        });

    Some(DrawItem {
        object: id,
        primitive,
        model,
        color: shade(material, assets, tints),
        blending: material.blending,
        depth_write: material.depth_write,
        point_size: material.point_size,
        label,
    })
}

fn shade(material: &Material, assets: &AssetStore, tints: &mut TintCache) -> [f32; 4] {
    let tint = material
        .map
        .map(|t| tints.tint(assets, t))
        .unwrap_or(Color::WHITE.0);
    let [r, g, b, a] = material.color.0;
    let opacity = if material.transparent {
        material.opacity
    } else {
        1.0
    };
    [r * tint[0], g * tint[1], b * tint[2], a * tint[3] * opacity]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PerspectiveCamera;
    use glimmer_assets::{TextLabel, Texture};
    use glimmer_kernel::{PointLight, Scene};

    fn frame<'a>(scene: &'a Scene, assets: &'a AssetStore, camera: &'a PerspectiveCamera) -> DrawList {
        DrawList::build(
            &RenderView {
                scene,
                assets,
                camera,
            },
            &mut TintCache::new(),
        )
    }

    #[test]
    fn box_model_folds_in_dimensions() {
        let mut assets = AssetStore::new();
        let geo = assets.register_geometry(Geometry::cuboid(2.0, 2.0, 2.0));
        let mat = assets.register_material(Material::basic("orange", Color::from_hex(0xffa500)));
        let mut scene = Scene::new();
        scene.add(SceneObject::mesh("cube", geo, mat).at(Vec3::new(1.0, 0.0, 0.0)));

        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        assert_eq!(list.len(), 1);
        let corner = list.items[0].model.transform_point3(Vec3::splat(0.5));
        assert!((corner - Vec3::new(2.0, 1.0, 1.0)).length() < 1e-5);
        assert_eq!(list.items[0].primitive, Primitive::Box);
    }

    #[test]
    fn hidden_objects_and_lights_are_skipped() {
        let mut assets = AssetStore::new();
        let geo = assets.register_geometry(Geometry::plane(1.0, 1.0));
        let mat = assets.register_material(Material::basic("m", Color::WHITE));
        let mut scene = Scene::new();
        let hidden = scene.add(SceneObject::mesh("hidden", geo, mat));
        scene.get_mut(hidden).unwrap().visible = false;
        scene.add(SceneObject::light(
            "light",
            PointLight {
                color: Color::WHITE,
                power: 1.0,
                distance: 0.0,
            },
        ));

        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        assert!(list.is_empty());
        assert_eq!(list.unresolved, 0);
    }

    #[test]
    fn missing_assets_are_counted() {
        let assets = AssetStore::new();
        let mut scene = Scene::new();
        scene.add(SceneObject::mesh("ghost", AssetId(1), AssetId(2)));
        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        assert!(list.is_empty());
        assert_eq!(list.unresolved, 1);
    }

    #[test]
    fn polyline_expands_to_segment_pairs() {
        let mut assets = AssetStore::new();
        let geo = assets.register_geometry(Geometry::Polyline {
            points: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)],
        });
        let mat = assets.register_material(Material::basic("bolt", Color::WHITE));
        let mut scene = Scene::new();
        scene.add(SceneObject::line("bolt", geo, mat).at(Vec3::new(0.0, 0.0, 1.0)));

        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        let Primitive::Lines(segments) = &list.items[0].primitive else {
            panic!("expected lines");
        };
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[1], segments[2]);
        assert_eq!(segments[3], Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn opacity_and_tint_fold_into_color() {
        let mut assets = AssetStore::new();
        let tex = assets.register_texture(Texture {
            name: "half-grey".into(),
            width: 1,
            height: 1,
            source: TextureSource::Pixels(vec![128, 128, 128, 255]),
        });
        let geo = assets.register_geometry(Geometry::plane(4.0, 4.0));
        let mat = assets.register_material(
            Material::basic("smoke", Color::WHITE)
                .with_map(tex)
                .with_opacity(0.35),
        );
        let mut scene = Scene::new();
        scene.add(SceneObject::mesh("smoke", geo, mat));

        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        let [r, _, _, a] = list.items[0].color;
        assert!((r - 128.0 / 255.0).abs() < 1e-4);
        assert!((a - 0.35).abs() < 1e-6);
        assert!(list.items[0].label.is_none());
    }

    #[test]
    fn canvas_label_is_exposed() {
        let mut assets = AssetStore::new();
        let tex = assets.register_texture(Texture::canvas(
            "label",
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
        let geo = assets.register_geometry(Geometry::plane(5.0, 2.5));
        let mat = assets.register_material(Material::basic("label", Color::WHITE).with_map(tex).transparent());
        let mut scene = Scene::new();
        scene.add(SceneObject::mesh("label", geo, mat));

        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        assert_eq!(list.items[0].label.as_deref(), Some("Hello"));
    }

    #[test]
    fn additive_items_draw_last() {
        let mut assets = AssetStore::new();
        let geo = assets.register_geometry(Geometry::plane(3.0, 3.0));
        let glow = assets.register_material(Material::basic("glow", Color::WHITE).additive());
        let solid = assets.register_material(Material::basic("solid", Color::BLACK));
        let mut scene = Scene::new();
        let a = scene.add(SceneObject::mesh("glow", geo, glow));
        let b = scene.add(SceneObject::mesh("solid", geo, solid));

        let list = frame(&scene, &assets, &PerspectiveCamera::default());
        let order: Vec<ObjectId> = list.ordered().map(|i| i.object).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn tint_cache_memoizes() {
        let mut assets = AssetStore::new();
        let tex = assets.register_texture(Texture {
            name: "p".into(),
            width: 1,
            height: 1,
            source: TextureSource::Pixels(vec![255, 0, 0, 255]),
        });
        let mut cache = TintCache::new();
        assert_eq!(cache.tint(&assets, tex), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(cache.len(), 1);
        assets.clear();
        assert_eq!(cache.tint(&assets, tex), [1.0, 0.0, 0.0, 1.0]);
    }
}
