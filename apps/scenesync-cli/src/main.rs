use clap::{Parser, Subcommand};
use glam::Vec3;
use scenesync_arbiter::Arbiter;
use scenesync_backend::Aspect;
use scenesync_common::{NodeId, SceneId};
use scenesync_engine::{AspectEngine, EngineConfig};
use scenesync_input::{AXIS, DeviceState, InputAspect};
use scenesync_kernel::{NodeTree, TreeError};
use scenesync_render::{
    DebugTextRenderer, ENTITY, GEOMETRY_RENDERER, RenderAspect, RenderView, Renderer, TRANSFORM,
};
use scenesync_tools::SceneInspector;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "scenesync-cli", about = "CLI tool for scenesync operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON engine config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of job worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, engine config and aspect registries
    Info,
    /// Build a demo scene, run a few frames and print the result
    Demo {
        /// Number of child entities under the root
        #[arg(short = 'n', long, default_value = "3")]
        children: usize,
        /// Number of frames to run
        #[arg(short, long, default_value = "2")]
        frames: u32,
        /// Dump the root's creation records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that replaying creation records rebuilds the live backend
    Replay {
        /// Number of child entities under the root
        #[arg(short = 'n', long, default_value = "3")]
        children: usize,
    },
}

struct DemoScene {
    scene: SceneId,
    root: NodeId,
    axis: NodeId,
}

/// Root entity with a transform, `children` drawable child entities and an
/// input axis, all announced in one construction batch.
fn build_scene(tree: &mut NodeTree, children: usize) -> Result<DemoScene, TreeError> {
    let scene = tree.create_scene();
    tree.construct(|tree| -> Result<DemoScene, TreeError> {
        let root = tree.create_entity(ENTITY, None)?;
        let transform = tree.create_component(TRANSFORM, None)?;
        tree.set_property(transform, "translation", Vec3::new(0.0, 1.0, 0.0))?;
        tree.add_component(root, transform)?;

        for i in 0..children {
            let child = tree.create_entity(ENTITY, Some(root))?;
            let transform = tree.create_component(TRANSFORM, None)?;
            tree.set_property(transform, "translation", Vec3::new(i as f32 * 2.0, 0.0, 0.0))?;
            let geometry = tree.create_component(GEOMETRY_RENDERER, None)?;
            tree.set_property(geometry, "vertexCount", 36)?;
            tree.add_component(child, transform)?;
            tree.add_component(child, geometry)?;
        }

        let axis = tree.create_node(AXIS, Some(root))?;
        tree.set_property(axis, "channel", "mouse.x")?;
        tree.set_property(axis, "scale", 2.0f64)?;

        tree.set_scene(root, Some(scene))?;
        Ok(DemoScene { scene, root, axis })
    })
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("aspect lock poisoned")
}

fn engine_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(match cli.workers {
        Some(workers) => config.with_workers(workers),
        None => config,
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = engine_config(&cli)?;

    match cli.command {
        Commands::Info => {
            println!("scenesync-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("engine config: {}", config.to_json()?);
            let render = RenderAspect::new();
            let input = InputAspect::new(DeviceState::new());
            for aspect in [&render as &dyn Aspect, &input] {
                let types: Vec<String> = aspect
                    .registry()
                    .node_types()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!("aspect {}: {}", aspect.name(), types.join(", "));
            }
        }
        Commands::Demo {
            children,
            frames,
            json,
        } => {
            let mut engine = AspectEngine::new(config);
            let (_, render) = engine.register_aspect(RenderAspect::new());
            let device = DeviceState::new();
            engine.register_aspect(InputAspect::new(device.clone()));

            let mut tree = NodeTree::new();
            let demo = build_scene(&mut tree, children)?;
            tree.set_arbiter(demo.scene, Some(engine.scene_arbiter()))?;

            if json {
                let records = tree.creation_changes(demo.root)?;
                println!("{}", serde_json::to_string_pretty(&records)?);
            }

            for frame in 0..frames {
                device.set("mouse.x", f64::from(frame) * 0.25);
                let report = engine.step(FRAME)?;
                let applied = engine.apply_backend_changes(&mut tree);
                println!(
                    "frame {}: synced={} jobs={} backend_changes={} applied={}",
                    report.frame,
                    report.changes_synced,
                    report.jobs_run,
                    report.backend_changes,
                    applied
                );
            }

            println!("{}", SceneInspector::summary(&tree));
            print!("{}", SceneInspector::outline(&tree, demo.root));
            if let Some(info) = SceneInspector::inspect_node(&tree, demo.axis) {
                println!("{info}");
            }
            let render = render.lock().map_err(poisoned)?;
            println!("{}", SceneInspector::registry_report(&*render));
            print!(
                "{}",
                DebugTextRenderer::new().render(&render.render_list(), &RenderView::default())
            );
            println!("unrouted changes: {}", engine.postman().unrouted_count());
        }
        Commands::Replay { children } => {
            // Live: the scene is announced to an engine and synced.
            let mut live = AspectEngine::new(config.clone());
            let (_, live_render) = live.register_aspect(RenderAspect::new());
            let mut tree = NodeTree::new();
            let demo = build_scene(&mut tree, children)?;
            tree.set_arbiter(demo.scene, Some(live.scene_arbiter()))?;
            live.step(FRAME)?;

            // Replay: the generator's records fed to a fresh engine.
            let mut replay = AspectEngine::new(config);
            let (_, replay_render) = replay.register_aspect(RenderAspect::new());
            let records = tree.creation_changes(demo.root)?;
            println!("Replaying {} creation records", records.len());
            replay.scene_arbiter().notify_batch(records);
            replay.step(FRAME)?;

            let live_render = live_render.lock().map_err(poisoned)?;
            let replay_render = replay_render.lock().map_err(poisoned)?;
            let same_nodes = live_render.entities().read().ids()
                == replay_render.entities().read().ids()
                && live_render.transforms().read().ids() == replay_render.transforms().read().ids()
                && live_render.geometry_renderers().read().ids()
                    == replay_render.geometry_renderers().read().ids();
            let same_frame = live_render.render_list() == replay_render.render_list();

            println!("Live: {}", SceneInspector::registry_report(&*live_render));
            println!("Replay: {}", SceneInspector::registry_report(&*replay_render));
            if !(same_nodes && same_frame) {
                anyhow::bail!("replayed backend differs from the live one");
            }
            println!("Match: OK");
        }
    }

    Ok(())
}
