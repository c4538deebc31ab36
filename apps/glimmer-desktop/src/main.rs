use anyhow::Result;
use clap::Parser;
use glimmer_common::{SurfaceId, Viewport};
use glimmer_render::RenderError;
use glimmer_render_wgpu::WgpuSurface;
use glimmer_scenes::{SceneConfig, SceneKind, SceneProgram, program_for};
use glimmer_stage::{FrameOutcome, FrameRequest, Host, MountTarget, Stage, Subscription};
use glimmer_tools::FrameTimer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const TIMING_REPORT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "glimmer-desktop", about = "Glimmer desktop viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene to show (cube or portal)
    #[arg(short, long)]
    scene: Option<SceneKind>,

    /// YAML scene config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Particle texture for the portal scene
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Scale the cube's rotation by frame time instead of per tick
    #[arg(long)]
    delta_scaled: bool,
}

impl Cli {
    fn scene_config(&self) -> Result<SceneConfig> {
        let mut config = match &self.config {
            Some(path) => SceneConfig::load(path)?,
            None => SceneConfig::default(),
        };
        if let Some(scene) = self.scene {
            config.scene = scene;
        }
        if let Some(texture) = &self.texture {
            config.texture_path = texture.clone();
        }
        config.delta_scaled_primary |= self.delta_scaled;
        Ok(config)
    }
}

/// Host backed by one winit window. Frame requests map to redraw requests.
struct WindowHost {
    window: Arc<Window>,
    next_id: u64,
}

impl WindowHost {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for WindowHost {
    type Surface = WgpuSurface;

    fn viewport(&self) -> Viewport {
        let size = self.window.inner_size();
        Viewport::new(size.width, size.height)
    }

    fn create_surface(&mut self, viewport: Viewport) -> Result<WgpuSurface, RenderError> {
        WgpuSurface::new(self.window.clone(), viewport)
    }

    fn request_frame(&mut self) -> FrameRequest {
        self.window.request_redraw();
        FrameRequest(self.next())
    }

    // winit cannot withdraw a redraw; the stage ignores the stale callback.
    fn cancel_frame(&mut self, _request: FrameRequest) {}

    fn subscribe_resize(&mut self) -> Subscription {
        Subscription(self.next())
    }

    fn unsubscribe_resize(&mut self, _subscription: Subscription) {}
}

/// The window itself is the mount target: mounted means shown.
struct WindowMount {
    window: Arc<Window>,
    mounted: Option<SurfaceId>,
}

impl MountTarget for WindowMount {
    fn insert_surface(&mut self, surface: SurfaceId) {
        self.mounted = Some(surface);
        self.window.set_visible(true);
    }

    fn remove_surface(&mut self, surface: SurfaceId) -> bool {
        if self.mounted != Some(surface) {
            return false;
        }
        self.mounted = None;
        self.window.set_visible(false);
        true
    }
}

type WindowStage = Stage<WindowHost, WindowMount, Box<dyn SceneProgram>>;

struct App {
    config: SceneConfig,
    stage: Option<WindowStage>,
    timer: FrameTimer,
    last_report: Instant,
}

impl App {
    fn new(config: SceneConfig) -> Self {
        Self {
            config,
            stage: None,
            timer: FrameTimer::new(240),
            last_report: Instant::now(),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(format!("Glimmer: {}", self.config.scene))
            .with_inner_size(PhysicalSize::new(1280u32, 720))
            .with_visible(false);
        let window = Arc::new(event_loop.create_window(attrs)?);

        let host = WindowHost {
            window: window.clone(),
            next_id: 0,
        };
        let mount = WindowMount {
            window,
            mounted: None,
        };
        let stage = Stage::attach(host, Some(mount), program_for(&self.config), &self.config)?;
        self.stage = Some(stage);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.stage.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            tracing::error!("failed to start: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(stage) = self.stage.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.timer.log_summary("session");
                // Dropping the stage tears it down.
                self.stage = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(subscription) = stage.resize_subscription() {
                    stage.on_resize(subscription, Viewport::new(size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => {
                if let FrameOutcome::Rendered { time, .. } = stage.step() {
                    self.timer.record_secs(time.delta);
                }
                if self.last_report.elapsed() >= TIMING_REPORT {
                    self.timer.log_summary("last frames");
                    self.last_report = Instant::now();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = cli.scene_config()?;
    tracing::info!(scene = %config.scene, "glimmer-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
