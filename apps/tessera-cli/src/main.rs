use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use glam::{Vec2, Vec3};
use tessera_common::{Camera, Projection};
use tessera_map::{LayerConfig, LayerUpdate, MapLayer, TileDataProvider, VisibilityConfig};
use tessera_render::{sprite_geometry, InstancedGeometry, TileSetConfig, TileSpriteRenderer};
use tessera_vertex::VertexObjectPool;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessera-cli", about = "CLI tool for tessera tile layers")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Layer config as JSON; defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the effective layer config
    Info,
    /// Pan a layer across frames and report tile churn
    Pan {
        /// Number of frames to run
        #[arg(short, long, default_value = "10")]
        frames: u32,
        /// Center movement per frame, in map units
        #[arg(long, num_args = 2, value_delimiter = ',', default_values_t = [1.0, 0.0])]
        step: Vec<f32>,
    },
    /// Show what a camera sees of the ground plane
    Survey {
        /// Camera position
        #[arg(long, num_args = 3, value_delimiter = ',', default_values_t = [0.0, 12.0, 10.0])]
        eye: Vec<f32>,
        /// Point the camera looks at
        #[arg(long, num_args = 3, value_delimiter = ',', default_values_t = [0.0, 0.0, 0.0])]
        target: Vec<f32>,
        /// How many of the nearest tiles to list
        #[arg(short, long, default_value = "5")]
        nearest: usize,
    },
    /// Create/free churn on a sprite instance pool
    Pool {
        #[arg(long, default_value = "4096")]
        capacity: usize,
        #[arg(short, long, default_value = "100")]
        rounds: u32,
    },
}

/// Read `path` as a [`LayerConfig`], or the defaults when no path is given.
fn load_config(path: Option<&Path>) -> anyhow::Result<LayerConfig> {
    let Some(path) = path else {
        return Ok(LayerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = LayerConfig::from_json_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "layer config loaded");
    Ok(config)
}

fn vec2(values: &[f32]) -> anyhow::Result<Vec2> {
    match values {
        [x, y] => Ok(Vec2::new(*x, *y)),
        _ => bail!("expected 2 components, got {}", values.len()),
    }
}

fn vec3(values: &[f32]) -> anyhow::Result<Vec3> {
    match values {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => bail!("expected 3 components, got {}", values.len()),
    }
}

/// Sprite renderer over a fresh geometry, fed by the config's pattern.
fn sprite_renderer(
    config: &LayerConfig,
) -> anyhow::Result<(Rc<RefCell<TileSpriteRenderer>>, Rc<RefCell<InstancedGeometry>>)> {
    let geometry = Rc::new(RefCell::new(sprite_geometry(config.capacity)?));
    let provider: Rc<dyn TileDataProvider> = Rc::new(config.pattern.build()?);
    let mut renderer = TileSpriteRenderer::new();
    renderer.set_geometry(geometry.clone())?;
    renderer.set_provider(provider);
    renderer.set_tile_set(Rc::new(TileSetConfig::default().build()?));
    Ok((Rc::new(RefCell::new(renderer)), geometry))
}

/// Build the configured layer. Camera layers get a camera above the center.
fn layer_with_renderer(
    config: &LayerConfig,
) -> anyhow::Result<(MapLayer, Rc<RefCell<InstancedGeometry>>)> {
    let camera = Rc::new(RefCell::new(
        Camera::new(
            Vec3::new(config.center.x, 12.0, config.center.y + 10.0),
            Projection::default(),
        )
        .looking_at(Vec3::new(config.center.x, 0.0, config.center.y)),
    ));
    let mut layer = config.build_layer(Some(&camera))?;
    let (renderer, geometry) = sprite_renderer(config)?;
    layer.add_renderer(renderer);
    Ok((layer, geometry))
}

fn run_pan(config: &LayerConfig, frames: u32, step: Vec2) -> anyhow::Result<()> {
    let (mut layer, geometry) = layer_with_renderer(config)?;
    println!("Pan: frames={frames}, step=({}, {})", step.x, step.y);
    for frame in 0..frames {
        layer.set_center(config.center + step * frame as f32);
        let outcome = layer.update();
        let mut g = geometry.borrow_mut();
        g.update();
        let pool = g.instances();
        match outcome {
            LayerUpdate::Applied {
                created,
                reused,
                removed,
            } => println!(
                "frame {frame:>3}: +{created} ={reused} -{removed}  pool {}/{}",
                pool.used_count(),
                pool.capacity()
            ),
            other => println!("frame {frame:>3}: {other:?}"),
        }
        g.mark_uploaded();
    }
    Ok(())
}

fn run_survey(config: &LayerConfig, eye: Vec3, target: Vec3, nearest: usize) -> anyhow::Result<()> {
    let camera = Rc::new(RefCell::new(
        Camera::new(eye, Projection::default()).looking_at(target),
    ));
    let mut config = config.clone();
    let options = match config.visibility {
        VisibilityConfig::Camera(options) => options,
        VisibilityConfig::Rectangular { .. } => Default::default(),
    };
    config.visibility = VisibilityConfig::Camera(options);
    // room for every tile one walk can collect
    config.capacity = config.capacity.max(options.max_tiles);
    let mut layer = config.build_layer(Some(&camera))?;
    let (renderer, _geometry) = sprite_renderer(&config)?;
    layer.add_renderer(renderer);

    println!("Survey: eye={eye}, target={target}");
    match layer.update() {
        LayerUpdate::Applied { .. } => {
            println!("visible tiles: {}", layer.tiles().len());
            for tile in layer.tiles().iter().take(nearest) {
                println!("  {} at ({}, {})", tile.id(), tile.view.left, tile.view.top);
            }
        }
        other => println!("no ground in view ({other:?})"),
    }
    Ok(())
}

fn run_pool(capacity: usize, rounds: u32) -> anyhow::Result<()> {
    let mut pool = VertexObjectPool::new(tessera_render::sprite_instance_descriptor()?, capacity);
    let offset = pool.attr::<f32>("offset")?;
    let start = Instant::now();
    let mut created = 0usize;
    let mut freed = 0usize;
    for round in 0..rounds {
        while let Some(handle) = pool.create_vo() {
            pool.set(handle, &offset, &[round as f32, 0.0, 0.0])?;
            created += 1;
        }
        let handles: Vec<_> = pool.handles().step_by(2).collect();
        for handle in handles {
            if pool.free_vo(handle) {
                freed += 1;
            }
        }
    }
    let elapsed = start.elapsed();
    println!("Pool churn: capacity={capacity}, rounds={rounds}");
    println!("created={created}, freed={freed}, live={}", pool.used_count());
    println!("elapsed: {elapsed:?}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("tessera-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", tessera_common::crate_info());
            println!("vertex: {}", tessera_vertex::crate_info());
            println!("map: {}", tessera_map::crate_info());
            println!("render: {}", tessera_render::crate_info());
            println!("spatial: {}", tessera_spatial::crate_info());
            println!("render-wgpu: {}", tessera_render_wgpu::crate_info());
            println!("config: {}", config.to_json_string()?);
        }
        Commands::Pan { frames, step } => run_pan(&config, frames, vec2(&step)?)?,
        Commands::Survey {
            eye,
            target,
            nearest,
        } => run_survey(&config, vec3(&eye)?, vec3(&target)?, nearest)?,
        Commands::Pool { capacity, rounds } => run_pool(capacity, rounds)?,
    }

    Ok(())
}
