use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use glam::Vec3;
use tilespace_common::{Element, Mesh, TileContent};
use tilespace_geo::{GeoCoordinate, address_of};
use tilespace_kernel::World;
use tilespace_stream::{
    ElevationKind, StreamConfig, TileBuildError, TileBuilder, TileLifecycleDriver, TileRequest,
    WorkerPipeline,
};
use tilespace_tools::ViewpointInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilespace-cli", about = "CLI tool for tilespace operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and the default stream configuration
    Info,
    /// Show the tile containing a point and its neighborhood
    Address {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Level of detail
        #[arg(short, long, default_value = "16")]
        lod: u8,
    },
    /// Fly a viewpoint in a straight line and stream tiles around it
    Fly {
        /// Stream config file (.yaml, .yml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "200")]
        ticks: u32,
        /// Horizontal distance travelled per tick, in meters
        #[arg(short, long, default_value = "25")]
        speed: f32,
        /// Heading in degrees clockwise from north
        #[arg(long, default_value = "90")]
        heading: f32,
        /// Starting height above ground
        #[arg(short, long, default_value = "300")]
        altitude: f32,
        /// Height change per tick
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        climb: f32,
        /// Tile worker threads
        #[arg(short, long, default_value = "2")]
        workers: usize,
        /// Simulated build time per tile, in milliseconds
        #[arg(long, default_value = "0")]
        build_ms: u64,
        /// Print the overlay every N ticks
        #[arg(long, default_value = "20")]
        report_every: u32,
    },
}

/// Stand-in for the map data pipeline: one terrain mesh and one area
/// element per tile.
struct SyntheticTerrain {
    build_time: Duration,
}

impl TileBuilder for SyntheticTerrain {
    fn build(&self, request: &TileRequest) -> Result<Vec<TileContent>, TileBuildError> {
        if !request.address.is_valid() {
            return Err(TileBuildError::NoData(request.address.to_string()));
        }
        if !self.build_time.is_zero() {
            std::thread::sleep(self.build_time);
        }
        let side: u32 = match request.elevation {
            ElevationKind::Flat => 2,
            ElevationKind::Grid => 33,
        };
        Ok(vec![
            TileContent::Mesh(Mesh {
                name: format!("terrain {}", request.address),
                vertex_count: side * side,
                index_count: (side - 1) * (side - 1) * 6,
            }),
            TileContent::Element(Element {
                id: u64::from_str_radix(&request.address.to_quadkey_string(), 4).unwrap_or(0),
                kind: format!("area/{}", request.style),
            }),
        ])
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let config = StreamConfig::default();
            println!("tilespace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "default config: lod={}..={} closest={} rebase_threshold={} origin={} style={} elevation={:?}",
                config.min_lod,
                config.max_lod,
                config.closest_distance,
                config.rebase_threshold,
                config.geo_origin,
                config.style,
                config.elevation
            );
        }
        Commands::Address { lat, lon, lod } => {
            let geo = GeoCoordinate::new(lat, lon);
            anyhow::ensure!(geo.is_valid(), "coordinate out of range: {geo}");
            let key = address_of(geo, lod);
            let (south, west, north, east) = key.bounds();
            println!("point:   {geo}");
            println!("tile:    {key}");
            println!("quadkey: {}", key.to_quadkey_string());
            println!("bounds:  S {south:.6} W {west:.6} N {north:.6} E {east:.6}");
            println!("neighborhood:");
            for neighbor in key.neighborhood() {
                let note = if neighbor.is_valid() { "" } else { " (outside pyramid)" };
                println!("  {neighbor}{note}");
            }
        }
        Commands::Fly {
            config,
            ticks,
            speed,
            heading,
            altitude,
            climb,
            workers,
            build_ms,
            report_every,
        } => {
            let config = match config {
                Some(path) => StreamConfig::load(&path)?,
                None => StreamConfig::default(),
            };
            fly(
                config,
                Flight {
                    ticks,
                    speed,
                    heading,
                    altitude,
                    climb,
                    workers,
                    build_time: Duration::from_millis(build_ms),
                    report_every: report_every.max(1),
                },
            )?;
        }
    }

    Ok(())
}

struct Flight {
    ticks: u32,
    speed: f32,
    heading: f32,
    altitude: f32,
    climb: f32,
    workers: usize,
    build_time: Duration,
    report_every: u32,
}

fn fly(config: StreamConfig, flight: Flight) -> anyhow::Result<()> {
    let pipeline = WorkerPipeline::spawn(
        SyntheticTerrain {
            build_time: flight.build_time,
        },
        flight.workers,
    )?;
    let mut driver = TileLifecycleDriver::new(config, pipeline)?;
    let mut world = World::new();

    let heading = flight.heading.to_radians();
    let step = Vec3::new(heading.sin(), 0.0, heading.cos()) * flight.speed;
    let mut position = Vec3::new(0.0, flight.altitude, 0.0);
    let (mut loads, mut unloads) = (0usize, 0usize);

    println!(
        "Flying {} ticks at {} m/tick, heading {}°",
        flight.ticks, flight.speed, flight.heading
    );
    for tick in 0..flight.ticks {
        let report = driver.tick(&mut world, position);
        if let Some(r) = &report.reconciliation {
            loads += r.loaded.len();
            unloads += r.unloaded.len();
        }
        if let Some(rebase) = report.rebase {
            position -= rebase.displacement;
        }
        if tick % flight.report_every == 0 {
            if let Some(summary) = ViewpointInspector::summary(&driver) {
                println!("[{tick:>5}] {summary}");
            }
        }
        world.drain_events();

        position += step;
        position.y += flight.climb;
    }

    // Let outstanding builds land without moving.
    let deadline = Instant::now() + Duration::from_secs(5);
    while driver.pipeline().in_flight() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
        driver.tick(&mut world, position);
    }
    driver.tick(&mut world, position);

    if let Some(summary) = ViewpointInspector::summary(&driver) {
        println!("final:  {summary}");
    }
    println!("{}", ViewpointInspector::world(&world));
    let timer = driver.timer();
    println!(
        "tiles: loaded={loads} unloaded={unloads} resident={} rebases={}",
        driver.tiles().len(),
        driver.stats().total_rebases
    );
    println!(
        "tick time: avg={:?} min={:?} max={:?} over {} ticks",
        timer.average(),
        timer.min(),
        timer.max(),
        timer.count()
    );
    tracing::debug!(closed = driver.is_pipeline_closed(), "flight finished");
    Ok(())
}
