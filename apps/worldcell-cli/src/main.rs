use clap::{Parser, Subcommand};
use glam::Vec3;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use worldcell_common::{PerceptionMask, VisionCache};
use worldcell_ecs::{
    Collider, ColliderShape, MaterialHandle, MeshHandle, Name, Perceivable, QuestCritical, Renderable,
};
use worldcell_markers::{Bounds, Marker};
use worldcell_perception::StandingTable;
use worldcell_runtime::{PresenceConfig, PresenceRuntime};

#[derive(Parser)]
#[command(name = "worldcell-cli", about = "Drive the worldcell presence runtime from the command line")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Presence config (.yaml, .yml or .json); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and the effective configuration
    Info,
    /// Walk a tracked entity across the grid and report presence sweeps
    Walk {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Distance moved per frame
        #[arg(short, long, default_value = "0.75")]
        speed: f32,
        /// Props spawned per cell
        #[arg(short, long, default_value = "2")]
        props: usize,
    },
    /// Run vision scans for many agents and report query counts
    Scan {
        /// Number of perception subscribers
        #[arg(short, long, default_value = "50")]
        agents: usize,
        /// Simulated seconds at 60 frames per second
        #[arg(short, long, default_value = "2")]
        seconds: u32,
    },
    /// Place markers, toggle them and query by radius
    Markers {
        /// Query radius around the grid center
        #[arg(short, long, default_value = "15")]
        radius: f32,
        /// Print the registry as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => PresenceConfig::from_path(path)?,
        None => PresenceConfig::default(),
    };
    config.validate()?;

    match cli.command {
        Commands::Info => info(&config)?,
        Commands::Walk {
            frames,
            speed,
            props,
        } => walk(&config, frames, speed, props)?,
        Commands::Scan { agents, seconds } => scan(&config, agents, seconds)?,
        Commands::Markers { radius, json } => markers(&config, radius, json)?,
    }

    Ok(())
}

fn info(config: &PresenceConfig) -> anyhow::Result<()> {
    println!("worldcell-cli v{}", env!("CARGO_PKG_VERSION"));
    println!("common: {}", worldcell_common::crate_info());
    println!("kernel: {}", worldcell_kernel::crate_info());
    println!("ecs: {}", worldcell_ecs::crate_info());
    println!("events: {}", worldcell_events::crate_info());
    println!("stream: {}", worldcell_stream::crate_info());
    println!("perception: {}", worldcell_perception::crate_info());
    println!("markers: {}", worldcell_markers::crate_info());
    println!("runtime: {}", worldcell_runtime::crate_info());

    let grid = config.grid()?;
    let scan = config.scan_config()?;
    println!(
        "grid: {}x{} cells of {} ({} total)",
        grid.width(),
        grid.height(),
        grid.cell_size(),
        grid.cell_count()
    );
    let categories: Vec<String> = scan.categories.iter().map(|c| c.to_string()).collect();
    println!(
        "vision: every {:?}, max distance {}, cell-based={}, categories [{}]",
        scan.interval,
        scan.max_distance,
        scan.use_cell_based_scanning,
        categories.join(", ")
    );
    Ok(())
}

/// Fill every cell with renderable props and one quest-critical entity.
fn populate(rt: &mut PresenceRuntime, props: usize) {
    let grid = *rt.grid();
    let scene = rt.scene();
    let step = grid.cell_size() / (props as f32 + 1.0);
    for z in 0..grid.height() {
        for x in 0..grid.width() {
            for i in 0..props {
                let offset = step * (i as f32 + 1.0);
                let position = Vec3::new(
                    x as f32 * grid.cell_size() + offset,
                    0.0,
                    z as f32 * grid.cell_size() + offset,
                );
                let id = rt.spawn(scene.clone(), position);
                let mut registry = rt.registry_mut();
                registry
                    .components
                    .insert(id, Renderable::new(MeshHandle(1), MaterialHandle(1)));
                registry.components.insert(
                    id,
                    Collider {
                        shape: ColliderShape::Sphere { radius: 0.5 },
                        enabled: true,
                    },
                );
                let mask = if i % 2 == 0 {
                    PerceptionMask::ENEMY
                } else {
                    PerceptionMask::INTERACTABLE
                };
                registry.components.insert(id, Perceivable::new(mask));
            }
        }
    }
    let far_corner = Vec3::new(
        grid.width() as f32 * grid.cell_size() - 1.0,
        0.0,
        grid.height() as f32 * grid.cell_size() - 1.0,
    );
    let quest = rt.spawn(scene, far_corner);
    let mut registry = rt.registry_mut();
    registry
        .components
        .insert(quest, Renderable::new(MeshHandle(2), MaterialHandle(2)));
    registry.components.insert(quest, QuestCritical);
    registry.components.insert(quest, Name("Quest Giver".into()));
}

fn walk(config: &PresenceConfig, frames: u32, speed: f32, props: usize) -> anyhow::Result<()> {
    let mut rt = PresenceRuntime::new(config, "overworld")?;
    populate(&mut rt, props);

    let start = Vec3::new(rt.grid().cell_size() * 0.5, 0.0, rt.grid().cell_size() * 0.5);
    let player = rt.spawn("overworld", start);
    {
        let mut registry = rt.registry_mut();
        registry
            .components
            .insert(player, Perceivable::new(PerceptionMask::PLAYER));
        registry.components.insert(player, Name("Player".into()));
    }
    rt.track(player);

    println!(
        "Walking {frames} frames at {speed} units/frame among {} entities",
        rt.registry().world.entity_count()
    );
    let frame_time = Duration::from_secs_f64(1.0 / 60.0);
    for frame in 0..frames {
        let position = start + Vec3::new(1.0, 0.0, 0.6) * speed * frame as f32;
        rt.registry_mut().world.set_position(player, position);
        let report = rt.update(frame_time * frame);

        if let Some(cell) = report.crossed {
            println!("frame {:>4}: entered Cell_{cell}", report.frame);
        }
        for sweep in &report.sweeps {
            println!(
                "            sweep {}: visible={} hidden={} exempt={} toggled={} in {:?}",
                sweep.active_cell,
                sweep.visible,
                sweep.hidden,
                sweep.exempt,
                sweep.subsystems_toggled,
                sweep.elapsed
            );
        }
    }

    let tracker = rt.tracker();
    println!(
        "Done: {} transitions, {} sweeps, {} scans",
        tracker.transitions(),
        rt.visibility().sweep_count(),
        rt.scanner().scan_count()
    );

    let registry = rt.registry();
    for (id, name) in registry.components.iter::<Name>() {
        let scene = registry.world.get(id).map_or("?", |data| data.scene.as_str());
        let rendered = registry
            .components
            .get::<Renderable>(id)
            .is_some_and(|r| r.visible);
        println!(
            "  {} [{}] in {scene}: rendered={rendered} capabilities={:?}",
            name.0,
            id.short(),
            registry.components.capabilities(id)
        );
    }
    Ok(())
}

fn scan(config: &PresenceConfig, agents: usize, seconds: u32) -> anyhow::Result<()> {
    let mut rt = PresenceRuntime::new(config, "overworld")?;
    populate(&mut rt, 2);

    let notifications = Rc::new(Cell::new(0usize));
    for _ in 0..agents {
        let n = Rc::clone(&notifications);
        rt.subscribe_vision(move |_: &VisionCache| n.set(n.get() + 1));
    }
    rt.set_reputation(StandingTable::from_iter([
        ("merchants".to_string(), 0.6),
        ("bandits".to_string(), -0.8),
    ]));

    let center = rt.grid().cell_center(rt.grid().cell_id(Vec3::new(
        rt.grid().width() as f32 * rt.grid().cell_size() * 0.5,
        0.0,
        rt.grid().height() as f32 * rt.grid().cell_size() * 0.5,
    )));
    let player = rt.spawn("overworld", center);
    rt.track(player);

    let frame_time = Duration::from_secs_f64(1.0 / 60.0);
    let frames = seconds * 60;
    let mut scans = 0usize;
    let mut queries = 0usize;
    for frame in 0..frames {
        if let Some(stats) = rt.update(frame_time * frame).scan {
            scans += 1;
            queries += stats.queries;
            tracing::debug!(
                hits = stats.hits,
                notified = stats.subscribers_notified,
                elapsed = ?stats.elapsed,
                "scan"
            );
        }
    }

    println!("{agents} agents, {frames} frames, {scans} scans");
    println!(
        "queries: {queries} ({} per scan), notifications: {}",
        if scans == 0 { 0 } else { queries / scans },
        notifications.get()
    );
    for (category, hits) in rt.scanner().cache().iter() {
        println!("  {category}: {} visible", hits.len());
    }
    Ok(())
}

fn markers(config: &PresenceConfig, radius: f32, json: bool) -> anyhow::Result<()> {
    let mut rt = PresenceRuntime::new(config, "overworld")?;
    let grid = *rt.grid();
    let center = Vec3::new(
        grid.width() as f32 * grid.cell_size() * 0.5,
        0.0,
        grid.height() as f32 * grid.cell_size() * 0.5,
    );

    let places = [
        ("camp", "Camp", center),
        ("forge", "Forge", center + Vec3::new(6.0, 0.0, -4.0)),
        ("well", "Old Well", center + Vec3::new(-12.0, 0.0, 9.0)),
        ("tower", "Watchtower", center + Vec3::new(25.0, 0.0, 25.0)),
    ];
    for (id, name, position) in places {
        rt.place_marker(Marker::new(id, "", name, position).with_icon(format!("icons/{id}.png")));
    }

    let camp_cell = grid.cell_id(center).to_string();
    let toggled = rt.markers_mut().toggle_cell_visibility(&camp_cell);
    println!("toggled {toggled} marker(s) in {camp_cell}");

    let bounds = Bounds::from_center_extents(center, Vec3::new(15.0, 1.0, 15.0));
    let toggled = rt.markers_mut().toggle_markers_in_bounds(&bounds);
    println!("toggled {toggled} marker(s) within {:?}..{:?}", bounds.min, bounds.max);

    for marker in rt.markers_near(center, radius) {
        println!(
            "near: {} ({}) in {} visible={}",
            marker.display_name, marker.id, marker.cell_id, marker.is_visible
        );
    }

    if json {
        let all: Vec<&Marker> = rt.markers().all().collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
    }
    Ok(())
}
