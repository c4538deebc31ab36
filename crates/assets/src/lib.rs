//! Asset registry: geometry, materials and textures behind content-addressed ids.
//!
//! Scene objects reference assets by [`AssetId`], never by value or file path.
//! Registering the same content twice yields the same id.
//!
//! Textures backed by image files are decoded off the frame loop through
//! [`TextureLoader`]; see the `loader` module.

mod loader;

pub use loader::{PendingTexture, TextureCompleter, TextureLoader, decode_png};

use glam::Vec3;
use glimmer_common::Color;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Content-addressed asset ID computed from the asset data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

/// Vertex layout of a renderable primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Axis-aligned box centered on the origin.
    Box { width: f32, height: f32, depth: f32 },
    /// Quad in the XY plane facing +Z.
    Plane { width: f32, height: f32 },
    /// Unconnected points rendered as sprites.
    Points { positions: Vec<Vec3> },
    /// Connected line strip.
    Polyline { points: Vec<Vec3> },
}

impl Geometry {
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::Box {
            width,
            height,
            depth,
        }
    }

    pub fn plane(width: f32, height: f32) -> Self {
        Self::Plane { width, height }
    }

    /// Number of vertices the primitive expands to.
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Box { .. } => 24,
            Self::Plane { .. } => 4,
            Self::Points { positions } => positions.len(),
            Self::Polyline { points } => points.len(),
        }
    }
}

/// How a material composites over what is already drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Blending {
    #[default]
    Normal,
    Additive,
}

/// Unlit surface description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
    pub blending: Blending,
    /// Texture sampled over the surface.
    pub map: Option<AssetId>,
    pub depth_write: bool,
    /// Sprite size in world units; only meaningful for point geometry.
    pub point_size: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".into(),
            color: Color::WHITE,
            opacity: 1.0,
            transparent: false,
            blending: Blending::Normal,
            map: None,
            depth_write: true,
            point_size: 1.0,
        }
    }
}

impl Material {
    pub fn basic(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
            ..Self::default()
        }
    }

    pub fn with_map(mut self, texture: AssetId) -> Self {
        self.map = Some(texture);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self.transparent = true;
        self
    }

    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    /// Additive blending without depth writes, as used for glows.
    pub fn additive(mut self) -> Self {
        self.blending = Blending::Additive;
        self.transparent = true;
        self.depth_write = false;
        self
    }

    pub fn with_point_size(mut self, size: f32) -> Self {
        self.point_size = size;
        self
    }
}

/// Text drawn into an offscreen canvas and used as a texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLabel {
    pub text: String,
    pub font: String,
    pub font_px: u32,
    pub fill: Color,
    /// Baseline origin of the text inside the canvas, in pixels.
    pub origin: [u32; 2],
}

/// Where a texture's texels come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextureSource {
    /// Decoded RGBA8 pixels, row-major.
    Pixels(Vec<u8>),
    /// Canvas texture the backend rasterizes from a label.
    Text(TextLabel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub source: TextureSource,
}

impl Texture {
    pub fn canvas(name: impl Into<String>, width: u32, height: u32, label: TextLabel) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            source: TextureSource::Text(label),
        }
    }
}

/// An asset entry in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Asset {
    Geometry(Geometry),
    Material(Material),
    Texture(Texture),
}

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),
    #[error("asset not found: {0:?}")]
    NotFound(AssetId),
    #[error("texture load for {0} was dropped before completing")]
    LoadCancelled(String),
}

/// Content-addressed asset registry.
///
/// Assets are indexed by their content hash, so the same geometry or
/// material registered by two objects is stored once.
#[derive(Debug, Clone, Default)]
pub struct AssetStore {
    assets: BTreeMap<AssetId, Asset>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a geometry and return its asset ID.
    pub fn register_geometry(&mut self, geometry: Geometry) -> AssetId {
        let id = content_id(|h| hash_geometry(h, &geometry));
        self.assets.insert(id, Asset::Geometry(geometry));
        id
    }

    /// Register a material and return its asset ID.
    pub fn register_material(&mut self, material: Material) -> AssetId {
        let id = content_id(|h| hash_material(h, &material));
        self.assets.insert(id, Asset::Material(material));
        id
    }

    /// Register a texture and return its asset ID.
    pub fn register_texture(&mut self, texture: Texture) -> AssetId {
        let id = content_id(|h| hash_texture(h, &texture));
        tracing::debug!(name = %texture.name, width = texture.width, height = texture.height, "texture registered");
        self.assets.insert(id, Asset::Texture(texture));
        id
    }

    /// Get an asset by ID.
    pub fn get(&self, id: AssetId) -> Option<&Asset> {
        self.assets.get(&id)
    }

    pub fn geometry(&self, id: AssetId) -> Option<&Geometry> {
        match self.assets.get(&id) {
            Some(Asset::Geometry(g)) => Some(g),
            _ => None,
        }
    }

    pub fn material(&self, id: AssetId) -> Option<&Material> {
        match self.assets.get(&id) {
            Some(Asset::Material(m)) => Some(m),
            _ => None,
        }
    }

    pub fn texture(&self, id: AssetId) -> Option<&Texture> {
        match self.assets.get(&id) {
            Some(Asset::Texture(t)) => Some(t),
            _ => None,
        }
    }

    /// Like [`AssetStore::material`] but reports a missing id as an error.
    pub fn require_material(&self, id: AssetId) -> Result<&Material, AssetError> {
        self.material(id).ok_or(AssetError::NotFound(id))
    }

    /// Number of registered assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn texture_count(&self) -> usize {
        self.assets
            .values()
            .filter(|a| matches!(a, Asset::Texture(_)))
            .count()
    }

    /// Drop every asset. Ids handed out earlier stop resolving.
    pub fn clear(&mut self) {
        self.assets.clear();
    }
}

fn content_id(feed: impl FnOnce(&mut Sha256)) -> AssetId {
    let mut hasher = Sha256::new();
    feed(&mut hasher);
    let result = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[..8]);
    AssetId(u64::from_le_bytes(bytes))
}

fn hash_floats(h: &mut Sha256, values: &[f32]) {
    for v in values {
        h.update(v.to_le_bytes());
    }
}

fn hash_geometry(h: &mut Sha256, geometry: &Geometry) {
    match geometry {
        Geometry::Box {
            width,
            height,
            depth,
        } => {
            h.update(b"box");
            hash_floats(h, &[*width, *height, *depth]);
        }
        Geometry::Plane { width, height } => {
            h.update(b"plane");
            hash_floats(h, &[*width, *height]);
        }
        Geometry::Points { positions } => {
            h.update(b"points");
            for p in positions {
                hash_floats(h, &p.to_array());
            }
        }
        Geometry::Polyline { points } => {
            h.update(b"polyline");
            for p in points {
                hash_floats(h, &p.to_array());
            }
        }
    }
}

fn hash_material(h: &mut Sha256, material: &Material) {
    h.update(b"material");
    hash_str(h, &material.name);
    hash_floats(h, &material.color.0);
    hash_floats(h, &[material.opacity, material.point_size]);
    h.update([
        material.transparent as u8,
        material.blending as u8,
        material.depth_write as u8,
    ]);
    match material.map {
        Some(map) => {
            h.update([1u8]);
            h.update(map.0.to_le_bytes());
        }
        None => h.update([0u8]),
    }
}

/// Length-prefixed so adjacent strings cannot run into each other.
fn hash_str(h: &mut Sha256, s: &str) {
    h.update((s.len() as u64).to_le_bytes());
    h.update(s.as_bytes());
}

fn hash_texture(h: &mut Sha256, texture: &Texture) {
    h.update(b"texture");
    hash_str(h, &texture.name);
    h.update(texture.width.to_le_bytes());
    h.update(texture.height.to_le_bytes());
    match &texture.source {
        TextureSource::Pixels(pixels) => {
            h.update([0u8]);
            h.update((pixels.len() as u64).to_le_bytes());
            h.update(pixels);
        }
        TextureSource::Text(label) => {
            h.update([1u8]);
            hash_str(h, &label.text);
            hash_str(h, &label.font);
            h.update(label.font_px.to_le_bytes());
            hash_floats(h, &label.fill.0);
            h.update(label.origin[0].to_le_bytes());
            h.update(label.origin[1].to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_geometry() {
        let mut store = AssetStore::new();
        let id = store.register_geometry(Geometry::cuboid(2.0, 2.0, 2.0));
        assert_eq!(store.geometry(id).map(Geometry::vertex_count), Some(24));
        assert_eq!(store.len(), 1);
        assert!(store.material(id).is_none());
    }

    #[test]
    fn register_material() {
        let mut store = AssetStore::new();
        let id = store.register_material(Material::basic("orange", Color::from_hex(0xffa500)));
        assert!(store.require_material(id).is_ok());
    }

    #[test]
    fn content_addressed_dedup() {
        let mut store = AssetStore::new();
        let a = store.register_geometry(Geometry::plane(5.0, 2.5));
        let b = store.register_geometry(Geometry::plane(5.0, 2.5));
        let c = store.register_geometry(Geometry::plane(2.5, 5.0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn box_and_plane_do_not_collide() {
        let mut store = AssetStore::new();
        let plane = store.register_geometry(Geometry::plane(1.0, 1.0));
        let cube = store.register_geometry(Geometry::cuboid(1.0, 1.0, 0.0));
        assert_ne!(plane, cube);
    }

    #[test]
    fn material_map_changes_identity() {
        let mut store = AssetStore::new();
        let plain = store.register_material(Material::basic("label", Color::WHITE));
        let mapped =
            store.register_material(Material::basic("label", Color::WHITE).with_map(AssetId(7)));
        assert_ne!(plain, mapped);
    }

    #[test]
    fn builder_flags() {
        let glow = Material::basic("glow", Color::WHITE).additive();
        assert_eq!(glow.blending, Blending::Additive);
        assert!(glow.transparent);
        assert!(!glow.depth_write);

        let smoke = Material::basic("smoke", Color::WHITE).with_opacity(0.35);
        assert!(smoke.transparent);
        assert_eq!(smoke.opacity, 0.35);
    }

    #[test]
    fn missing_material_is_error() {
        let store = AssetStore::new();
        assert!(matches!(
            store.require_material(AssetId(1)),
            Err(AssetError::NotFound(AssetId(1)))
        ));
    }

    fn label(text: &str, font: &str) -> TextLabel {
        TextLabel {
            text: text.into(),
            font: font.into(),
            font_px: 48,
            fill: Color::WHITE,
            origin: [50, 100],
        }
    }

    #[test]
    fn label_text_and_font_do_not_run_together() {
        let mut store = AssetStore::new();
        let hello =
            store.register_texture(Texture::canvas("hello", 512, 256, label("Hello", "Arial")));
        let hell =
            store.register_texture(Texture::canvas("hello", 512, 256, label("Hell", "oArial")));
        assert_ne!(hello, hell);
        assert_eq!(store.texture_count(), 2);
        let TextureSource::Text(kept) = &store.texture(hello).unwrap().source else {
            panic!("expected a canvas texture");
        };
        assert_eq!(kept.text, "Hello");
    }

    #[test]
    fn canvas_texture_registers() {
        let mut store = AssetStore::new();
        let id = store.register_texture(Texture::canvas("hello", 512, 256, label("Hello", "Arial")));
        let tex = store.texture(id).unwrap();
        assert_eq!((tex.width, tex.height), (512, 256));
        assert_eq!(store.texture_count(), 1);

        store.clear();
        assert!(store.is_empty());
        assert!(store.texture(id).is_none());
    }
}
