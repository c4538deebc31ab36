use crate::batch::{BatchKind, ColorVertex, FramePlan, InstanceData, Shape};
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use glimmer_render::DrawList;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Uniforms {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
}

/// Unit cube centered on the origin.
fn box_mesh() -> (Vec<Vertex>, Vec<u16>) {
    let p = 0.5_f32;
    #[rustfmt::skip]
    let corners = [
        [-p, -p,  p], [ p, -p,  p], [ p,  p,  p], [-p,  p,  p],
        [-p, -p, -p], [ p, -p, -p], [ p,  p, -p], [-p,  p, -p],
    ];
    #[rustfmt::skip]
    let indices: Vec<u16> = vec![
        0,1,2, 2,3,0, // +Z
        5,4,7, 7,6,5, // -Z
        1,5,6, 6,2,1, // +X
        4,0,3, 3,7,4, // -X
        3,2,6, 6,7,3, // +Y
        4,5,1, 1,0,4, // -Y
    ];
    let vertices = corners.iter().map(|c| Vertex { position: *c }).collect();
    (vertices, indices)
}

/// Unit quad in the XY plane.
fn plane_mesh() -> (Vec<Vertex>, Vec<u16>) {
    let p = 0.5_f32;
    let vertices = vec![
        Vertex { position: [-p, -p, 0.0] },
        Vertex { position: [p, -p, 0.0] },
        Vertex { position: [p, p, 0.0] },
        Vertex { position: [-p, p, 0.0] },
    ];
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

struct MeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn upload(device: &wgpu::Device, name: &str, (verts, indices): (Vec<Vertex>, Vec<u16>)) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name}_vertex_buffer")),
            contents: bytemuck::cast_slice(&verts),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name}_index_buffer")),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices: index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// The same pipeline built for normal and additive blending.
struct PipelinePair {
    normal: wgpu::RenderPipeline,
    additive: wgpu::RenderPipeline,
}

impl PipelinePair {
    fn get(&self, additive: bool) -> &wgpu::RenderPipeline {
        if additive { &self.additive } else { &self.normal }
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    shader: &'a wgpu::ShaderModule,
    vs: &'a str,
    fs: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

fn build_pair(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    spec: &PipelineSpec<'_>,
) -> PipelinePair {
    let build = |additive: bool| {
        let label = format!("{}_{}", spec.label, if additive { "additive" } else { "normal" });
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: spec.shader,
                entry_point: Some(spec.vs),
                compilation_options: Default::default(),
                buffers: spec.buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: spec.shader,
                entry_point: Some(spec.fs),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(if additive {
                        ADDITIVE
                    } else {
                        wgpu::BlendState::ALPHA_BLENDING
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: spec.topology,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: !additive,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    };
    PipelinePair {
        normal: build(false),
        additive: build(true),
    }
}

/// GPU pipelines and buffers for drawing a [`DrawList`].
pub struct SceneRenderer {
    mesh_pipelines: PipelinePair,
    line_pipelines: PipelinePair,
    point_pipelines: PipelinePair,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    box_mesh: MeshBuffers,
    plane_mesh: MeshBuffers,
    instance_buffer: wgpu::Buffer,
    max_instances: u32,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: u64,
    depth_texture: wgpu::TextureView,
    surface_format: wgpu::TextureFormat,
}

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform_buffer"),
            contents: bytemuck::bytes_of(&Uniforms {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::MESH_SHADER.into()),
        });
        let color_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("color_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::COLOR_SHADER.into()),
        });

        let mesh_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<InstanceData>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![
                    1 => Float32x4,
                    2 => Float32x4,
                    3 => Float32x4,
                    4 => Float32x4,
                    5 => Float32x4,
                ],
            },
        ];
        let color_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4],
        }];

        let mesh_pipelines = build_pair(
            device,
            &layout,
            surface_format,
            &PipelineSpec {
                label: "mesh_pipeline",
                shader: &mesh_shader,
                vs: "vs_mesh",
                fs: "fs_mesh",
                buffers: &mesh_buffers,
                topology: wgpu::PrimitiveTopology::TriangleList,
            },
        );
        let line_pipelines = build_pair(
            device,
            &layout,
            surface_format,
            &PipelineSpec {
                label: "line_pipeline",
                shader: &color_shader,
                vs: "vs_color",
                fs: "fs_color",
                buffers: &color_buffers,
                topology: wgpu::PrimitiveTopology::LineList,
            },
        );
        let point_pipelines = build_pair(
            device,
            &layout,
            surface_format,
            &PipelineSpec {
                label: "point_pipeline",
                shader: &color_shader,
                vs: "vs_color",
                fs: "fs_color",
                buffers: &color_buffers,
                topology: wgpu::PrimitiveTopology::PointList,
            },
        );

        // Instance buffer (pre-allocated)
        let max_instances = 10_000u32;
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("instance_buffer"),
            size: u64::from(max_instances) * std::mem::size_of::<InstanceData>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_capacity = 4096;
        let vertex_buffer = Self::create_vertex_buffer(device, vertex_capacity);

        Self {
            mesh_pipelines,
            line_pipelines,
            point_pipelines,
            uniform_buffer,
            uniform_bind_group,
            box_mesh: MeshBuffers::upload(device, "box", box_mesh()),
            plane_mesh: MeshBuffers::upload(device, "plane", plane_mesh()),
            instance_buffer,
            max_instances,
            vertex_buffer,
            vertex_capacity,
            depth_texture: Self::create_depth_texture(device, width, height),
            surface_format,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    /// Record and submit one frame into `target`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        list: &DrawList,
    ) {
        let plan = FramePlan::build(list, self.max_instances as usize);
        if plan.overflow > 0 {
            tracing::warn!(dropped = plan.overflow, "instance buffer full, meshes dropped");
        }

        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                view_proj: list.view_proj.to_cols_array_2d(),
            }),
        );
        if !plan.instances.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&plan.instances));
        }
        if !plan.vertices.is_empty() {
            let needed = plan.vertices.len() as u64;
            if needed > self.vertex_capacity {
                self.vertex_capacity = needed.next_power_of_two();
                self.vertex_buffer = Self::create_vertex_buffer(device, self.vertex_capacity);
                tracing::debug!(capacity = self.vertex_capacity, "vertex buffer grown");
            }
            queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&plan.vertices));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let [r, g, b, a] = list.clear.0;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(r),
                            g: f64::from(g),
                            b: f64::from(b),
                            a: f64::from(a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            for batch in &plan.batches {
                match batch.kind {
                    BatchKind::Mesh(shape) => {
                        let mesh = match shape {
                            Shape::Box => &self.box_mesh,
                            Shape::Plane => &self.plane_mesh,
                        };
                        pass.set_pipeline(self.mesh_pipelines.get(batch.additive));
                        pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
                        pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
                        pass.draw_indexed(0..mesh.index_count, 0, batch.range.clone());
                    }
                    BatchKind::Lines | BatchKind::Points => {
                        let pipelines = if batch.kind == BatchKind::Lines {
                            &self.line_pipelines
                        } else {
                            &self.point_pipelines
                        };
                        pass.set_pipeline(pipelines.get(batch.additive));
                        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                        pass.draw(batch.range.clone(), 0..1);
                    }
                }
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_vertex_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("color_vertex_buffer"),
            size: capacity * std::mem::size_of::<ColorVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_mesh_indices_in_range() {
        let (verts, indices) = box_mesh();
        assert_eq!(verts.len(), 8);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|i| (*i as usize) < verts.len()));
    }

    #[test]
    fn plane_mesh_is_flat_unit_quad() {
        let (verts, indices) = plane_mesh();
        assert_eq!(indices.len(), 6);
        assert!(verts.iter().all(|v| v.position[2] == 0.0));
        assert!(verts.iter().all(|v| v.position[0].abs() == 0.5));
    }
}
