use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use glimmer_render::{DrawItem, DrawList, Primitive};
use std::ops::Range;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(model: Mat4, color: [f32; 4]) -> Self {
        let cols = model.to_cols_array_2d();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            color,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ColorVertex {
    position: [f32; 3],
    color: [f32; 4],
}

/// Static mesh an instanced batch draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Box,
    Plane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Mesh(Shape),
    Lines,
    Points,
}

/// A run of consecutive draw items sharing one pipeline.
///
/// `range` indexes instances for mesh batches and vertices otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub kind: BatchKind,
    pub additive: bool,
    pub range: Range<u32>,
}

/// CPU-side buffers and draw calls for one frame.
#[derive(Debug, Default)]
pub struct FramePlan {
    pub(crate) instances: Vec<InstanceData>,
    pub(crate) vertices: Vec<ColorVertex>,
    pub batches: Vec<Batch>,
    /// Items dropped because the instance buffer was full.
    pub overflow: usize,
}

impl FramePlan {
    pub fn build(list: &DrawList, max_instances: usize) -> Self {
        let mut plan = Self::default();
        for item in list.ordered() {
            if item.label.is_some() {
                continue;
            }
            plan.push(item, max_instances);
        }
        plan
    }

    fn push(&mut self, item: &DrawItem, max_instances: usize) {
        let additive = item.is_additive();
        match &item.primitive {
            Primitive::Box | Primitive::Plane => {
                if self.instances.len() >= max_instances {
                    self.overflow += 1;
                    return;
                }
                let shape = if item.primitive == Primitive::Box {
                    Shape::Box
                } else {
                    Shape::Plane
                };
                let start = self.instances.len() as u32;
                self.instances.push(InstanceData::new(item.model, item.color));
                self.extend(BatchKind::Mesh(shape), additive, start, 1);
            }
            Primitive::Lines(points) | Primitive::Points(points) => {
                let kind = if matches!(item.primitive, Primitive::Lines(_)) {
                    BatchKind::Lines
                } else {
                    BatchKind::Points
                };
                let start = self.vertices.len() as u32;
                self.vertices.extend(points.iter().map(|p| ColorVertex {
                    position: p.to_array(),
                    color: item.color,
                }));
                self.extend(kind, additive, start, points.len() as u32);
            }
        }
    }

    fn extend(&mut self, kind: BatchKind, additive: bool, start: u32, count: u32) {
        if count == 0 {
            return;
        }
        if let Some(last) = self.batches.last_mut() {
            if last.kind == kind && last.additive == additive && last.range.end == start {
                last.range.end += count;
                return;
            }
        }
        self.batches.push(Batch {
            kind,
            additive,
            range: start..start + count,
        });
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}
