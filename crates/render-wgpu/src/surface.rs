use glimmer_common::Viewport;
use glimmer_render::{DrawList, RenderError, RenderView, Renderer, TintCache};

use crate::gpu::SceneRenderer;

struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: SceneRenderer,
    tints: TintCache,
}

/// A window-backed display surface with its own device and pipelines.
///
/// Dropping it, or calling [`Renderer::release`], frees all GPU resources.
pub struct WgpuSurface {
    gpu: Option<GpuState>,
    backend: &'static str,
}

impl WgpuSurface {
    /// Create a surface for `target` (a window handle) and configure it.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        viewport: Viewport,
    ) -> Result<Self, RenderError> {
        pollster::block_on(Self::init(target.into(), viewport.clamped()))
    }

    async fn init(target: wgpu::SurfaceTarget<'static>, viewport: Viewport) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::Backend(format!("create surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::Backend("no compatible GPU adapter".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("glimmer_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Backend(format!("request device: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Backend("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: viewport.width,
            height: viewport.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = SceneRenderer::new(&device, format, viewport.width, viewport.height);
        let backend = adapter.get_info().backend.to_str();
        tracing::info!("GPU initialized with {backend} backend");

        Ok(Self {
            gpu: Some(GpuState {
                surface,
                device,
                queue,
                config,
                renderer,
                tints: TintCache::new(),
            }),
            backend,
        })
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn is_released(&self) -> bool {
        self.gpu.is_none()
    }
}

impl Renderer for WgpuSurface {
    type Output = ();

    fn render(&mut self, view: &RenderView<'_>) -> Result<(), RenderError> {
        let gpu = self
            .gpu
            .as_mut()
            .ok_or_else(|| RenderError::Backend("surface already released".into()))?;

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(e) => return Err(RenderError::Backend(e.to_string())),
        };
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let list = DrawList::build(view, &mut gpu.tints);
        gpu.renderer.render(&gpu.device, &gpu.queue, &target, &list);
        output.present();
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let viewport = viewport.clamped();
        gpu.config.width = viewport.width;
        gpu.config.height = viewport.height;
        gpu.surface.configure(&gpu.device, &gpu.config);
        gpu.renderer.resize(&gpu.device, viewport.width, viewport.height);
        tracing::debug!(width = viewport.width, height = viewport.height, "surface resized");
    }

    fn release(&mut self) {
        if self.gpu.take().is_some() {
            tracing::info!("GPU surface released");
        }
    }
}
