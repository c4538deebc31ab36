use std::time::{Duration, Instant};

use glimmer_animate::FrameUpdater;
use glimmer_common::{SurfaceId, Viewport};
use glimmer_kernel::{Clock, FrameTime, MonotonicTime, TimeSource};
use glimmer_render::{RenderError, RenderView, Renderer};
use glimmer_scenes::{ConfigError, ResourceStatus, SceneConfig, SceneContext, SceneError, SceneProgram};

use crate::frame_loop::FrameLoop;
use crate::host::{FrameRequest, Host, MountTarget, Subscription};

const SETTLE_POLL: Duration = Duration::from_millis(2);

/// Errors from attaching a stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("no mount target to attach the display surface to")]
    MissingMountTarget,
    #[error("display surface error: {0}")]
    Surface(#[from] RenderError),
    #[error("scene bootstrap failed: {0}")]
    Scene(#[from] SceneError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result of dispatching one frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// The request was stale, cancelled, or arrived after teardown.
    Skipped,
    /// A tick ran. `rendered` is false if the surface failed this frame.
    Rendered {
        time: FrameTime,
        rendered: bool,
        resources: ResourceStatus,
    },
}

impl FrameOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, FrameOutcome::Rendered { .. })
    }
}

/// Lifecycle manager: owns one scene on one surface inside one mount target.
///
/// A stage is live from [`Stage::attach`] until [`Stage::teardown`] or drop.
/// Teardown cancels the frame loop, stops resize delivery, unmounts and
/// releases the surface, and drops the scene.
pub struct Stage<H: Host, M: MountTarget, P: SceneProgram> {
    host: H,
    mount: Option<M>,
    surface: Option<H::Surface>,
    surface_id: SurfaceId,
    viewport: Viewport,
    program: P,
    ctx: SceneContext,
    updater: FrameUpdater,
    clock: Clock<Box<dyn TimeSource>>,
    frames: FrameLoop,
    resize: Option<Subscription>,
    last_output: Option<<H::Surface as Renderer>::Output>,
    torn_down: bool,
}

impl<H: Host, M: MountTarget, P: SceneProgram> Stage<H, M, P> {
    /// Attach on wall-clock time.
    pub fn attach(host: H, mount: Option<M>, program: P, config: &SceneConfig) -> Result<Self, StageError> {
        Self::attach_with_time(host, mount, program, config, Box::new(MonotonicTime::new()))
    }

    /// Attach with an explicit time source, e.g. a fixed step for
    /// deterministic runs.
    pub fn attach_with_time(
        mut host: H,
        mount: Option<M>,
        program: P,
        config: &SceneConfig,
        time: Box<dyn TimeSource>,
    ) -> Result<Self, StageError> {
        let Some(mut mount) = mount else {
            tracing::warn!(program = program.name(), "attach without a mount target");
            return Err(StageError::MissingMountTarget);
        };

        let viewport = host.viewport().clamped();
        let surface = host.create_surface(viewport)?;
        let surface_id = SurfaceId::new();
        mount.insert_surface(surface_id);

        let updater = match config.seed {
            Some(seed) => FrameUpdater::seeded(seed),
            None => FrameUpdater::from_entropy(),
        };
        let mut stage = Self {
            host,
            mount: Some(mount),
            surface: Some(surface),
            surface_id,
            viewport,
            program,
            ctx: SceneContext::new(config.seed, viewport.aspect()),
            updater,
            clock: Clock::new(time),
            frames: FrameLoop::new(),
            resize: None,
            last_output: None,
            torn_down: false,
        };

        // On error the stage drops here and unmounts what was mounted.
        stage.program.bootstrap(&mut stage.ctx)?;

        stage.frames.schedule(&mut stage.host);
        stage.resize = Some(stage.host.subscribe_resize());

        tracing::info!(
            program = stage.program.name(),
            width = viewport.width,
            height = viewport.height,
            objects = stage.ctx.scene.object_count(),
            "stage attached"
        );
        Ok(stage)
    }

    /// Run one tick if `request` is the outstanding frame request.
    pub fn on_frame(&mut self, request: FrameRequest) -> FrameOutcome {
        if self.torn_down || !self.frames.accept(request) {
            tracing::trace!(request = request.0, "stale frame request skipped");
            return FrameOutcome::Skipped;
        }
        let Some(surface) = self.surface.as_mut() else {
            return FrameOutcome::Skipped;
        };

        let resources = self.program.poll_resources(&mut self.ctx);
        let time = self.clock.tick();
        let _span = tracing::trace_span!("tick", frame = time.number).entered();

        self.updater
            .update(&mut self.ctx.scene, time.delta, time.elapsed);

        let view = RenderView {
            scene: &self.ctx.scene,
            assets: &self.ctx.assets,
            camera: &self.ctx.camera,
        };
        let rendered = match surface.render(&view) {
            Ok(output) => {
                self.last_output = Some(output);
                true
            }
            Err(RenderError::SurfaceLost) => {
                tracing::debug!(frame = time.number, "surface lost, reconfigured for next frame");
                false
            }
            Err(e) => {
                tracing::warn!(frame = time.number, "render failed: {e}");
                false
            }
        };

        self.frames.schedule(&mut self.host);
        FrameOutcome::Rendered {
            time,
            rendered,
            resources,
        }
    }

    /// Poll deferred resources until none are pending or `timeout` passes.
    /// Does not tick. Fixed-step runs call this before the first frame so
    /// late textures land on the same tick every run.
    pub fn settle_resources(&mut self, timeout: Duration) -> ResourceStatus {
        if self.torn_down {
            return ResourceStatus::Ready;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.program.poll_resources(&mut self.ctx);
            if status != ResourceStatus::Pending {
                tracing::debug!(program = self.program.name(), ?status, "resources settled");
                return status;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    program = self.program.name(),
                    ?timeout,
                    "deferred resources still pending"
                );
                return status;
            }
            std::thread::sleep(SETTLE_POLL);
        }
    }

    /// Dispatch the outstanding frame request, if any.
    pub fn step(&mut self) -> FrameOutcome {
        match self.frames.pending() {
            Some(request) => self.on_frame(request),
            None => FrameOutcome::Skipped,
        }
    }

    /// Apply a new viewport if `subscription` is the live resize registration.
    pub fn on_resize(&mut self, subscription: Subscription, viewport: Viewport) -> bool {
        if self.torn_down || self.resize != Some(subscription) {
            tracing::trace!(subscription = subscription.0, "stale resize ignored");
            return false;
        }
        let viewport = viewport.clamped();
        self.viewport = viewport;
        self.ctx.camera.set_aspect(viewport.aspect());
        if let Some(surface) = self.surface.as_mut() {
            surface.resize(viewport);
        }
        tracing::debug!(width = viewport.width, height = viewport.height, "stage resized");
        true
    }

    /// Stop the loop and give back every host resource. Safe to call twice.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.frames.cancel(&mut self.host);
        if let Some(subscription) = self.resize.take() {
            self.host.unsubscribe_resize(subscription);
        }
        if let Some(mount) = self.mount.as_mut() {
            if !mount.remove_surface(self.surface_id) {
                tracing::debug!("surface was already unmounted");
            }
        }
        if let Some(mut surface) = self.surface.take() {
            surface.release();
        }
        self.last_output = None;
        self.ctx.clear();

        tracing::info!(
            program = self.program.name(),
            frames = self.clock.frames(),
            "stage torn down"
        );
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn mount(&self) -> Option<&M> {
        self.mount.as_ref()
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.frames.pending()
    }

    pub fn resize_subscription(&self) -> Option<Subscription> {
        self.resize
    }

    /// Ticks run so far.
    pub fn frames(&self) -> u64 {
        self.clock.frames()
    }

    /// Output of the most recent successful render.
    pub fn last_output(&self) -> Option<&<H::Surface as Renderer>::Output> {
        self.last_output.as_ref()
    }
}

impl<H: Host, M: MountTarget, P: SceneProgram> Drop for Stage<H, M, P> {
    fn drop(&mut self) {
        self.teardown();
    }
}
