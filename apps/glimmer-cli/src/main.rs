use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glimmer_common::Viewport;
use glimmer_kernel::FixedStep;
use glimmer_scenes::{SceneConfig, SceneKind, SceneProgram, program_for};
use glimmer_stage::{FrameOutcome, HeadlessContainer, HeadlessHost, Stage};
use glimmer_tools::{FrameTimer, SceneInspector};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type HeadlessStage = Stage<HeadlessHost, HeadlessContainer, Box<dyn SceneProgram>>;

/// How long a headless run waits for deferred textures before ticking.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "glimmer-cli", about = "Run glimmer scenes without a window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and available scenes
    Info,
    /// Tick a scene on a fixed step and print the final frame
    Run {
        #[command(flatten)]
        scene: SceneArgs,
        /// Number of ticks to run
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        /// Simulated refresh rate
        #[arg(long, default_value = "60")]
        hz: f64,
        /// Viewport width and height
        #[arg(long, default_value = "800")]
        width: u32,
        #[arg(long, default_value = "600")]
        height: u32,
    },
    /// Bootstrap a scene and describe what it contains
    Inspect {
        #[command(flatten)]
        scene: SceneArgs,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Scene selection shared by `run` and `inspect`. Flags override the
/// config file.
#[derive(Args)]
struct SceneArgs {
    /// Scene to run (cube or portal)
    #[arg(short, long)]
    scene: Option<SceneKind>,
    /// YAML scene config
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// RNG seed for placement and flicker
    #[arg(long)]
    seed: Option<u64>,
    /// Particle texture for the portal scene
    #[arg(long)]
    texture: Option<PathBuf>,
    /// Scale the cube's rotation by frame time instead of per tick
    #[arg(long)]
    delta_scaled: bool,
}

impl SceneArgs {
    fn resolve(&self) -> anyhow::Result<SceneConfig> {
        let mut config = match &self.config {
            Some(path) => SceneConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SceneConfig::default(),
        };
        if let Some(scene) = self.scene {
            config.scene = scene;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(texture) = &self.texture {
            config.texture_path = texture.clone();
        }
        if self.delta_scaled {
            config.delta_scaled_primary = true;
        }
        Ok(config)
    }
}

/// Attach on a fixed step and load deferred resources up front, so the
/// same seed yields the same frames.
fn attach(config: &SceneConfig, viewport: Viewport, hz: f64) -> anyhow::Result<HeadlessStage> {
    let mut stage = Stage::attach_with_time(
        HeadlessHost::new(viewport),
        Some(HeadlessContainer::new()),
        program_for(config),
        config,
        Box::new(FixedStep::hz(hz)),
    )?;
    let resources = stage.settle_resources(SETTLE_TIMEOUT);
    tracing::debug!(?resources, "deferred resources before first tick");
    Ok(stage)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("glimmer-cli v{}", env!("CARGO_PKG_VERSION"));
            let scenes: Vec<&str> = SceneKind::ALL.iter().map(|k| k.as_str()).collect();
            println!("scenes: {}", scenes.join(", "));
            println!("default texture: {}", SceneConfig::default().texture_path.display());
        }
        Commands::Run {
            scene,
            ticks,
            hz,
            width,
            height,
        } => {
            anyhow::ensure!(hz > 0.0, "--hz must be positive");
            let config = scene.resolve()?;
            let mut stage = attach(&config, Viewport::new(width, height), hz)?;
            tracing::info!(scene = %config.scene, ticks, hz, "headless run");

            let mut timer = FrameTimer::new(120);
            let mut failed = 0u64;
            for _ in 0..ticks {
                match stage.step() {
                    FrameOutcome::Rendered { time, rendered, .. } => {
                        timer.record_secs(time.delta);
                        if !rendered {
                            failed += 1;
                        }
                    }
                    FrameOutcome::Skipped => break,
                }
            }

            if let Some(frame) = stage.last_output() {
                print!("{frame}");
            }
            let ctx = stage.context();
            print!("{}", SceneInspector::summary(&ctx.scene, &ctx.assets));
            println!(
                "ticks={} failed_renders={} avg_frame_ms={:.3}",
                stage.frames(),
                failed,
                timer.average().as_secs_f64() * 1e3
            );
        }
        Commands::Inspect { scene, json } => {
            let config = scene.resolve()?;
            let stage = attach(&config, Viewport::new(800, 600), 60.0)?;
            let ctx = stage.context();
            let summary = SceneInspector::summary(&ctx.scene, &ctx.assets);
            let objects = SceneInspector::list_objects(&ctx.scene);

            if json {
                let doc = serde_json::json!({
                    "scene": config.scene.as_str(),
                    "summary": summary,
                    "objects": objects,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("{} scene", config.scene);
                print!("{summary}");
                for object in &objects {
                    println!("  {object}");
                }
            }
        }
    }

    Ok(())
}
