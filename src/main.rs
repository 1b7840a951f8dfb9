use anyhow::{Context, Result};
use geo::{Coord, Rect};
use log::info;
use std::sync::Arc;
use survey_coverage::core::projection::{lon_lat_to_mercator, mercator_to_lon_lat};
use survey_coverage::{
    AnalysisRun, CameraAssignment, CameraModel, CancelFlag, FlatTerrain, PolygonWithId, Pose,
    RunConfig,
};

const SITE_LON: f64 = 36.80;
const SITE_LAT: f64 = -1.28;
const GROUND_ELEVATION: f64 = 1650.0;
const ALTITUDE_AGL: f64 = 100.0;
const FRONT_OVERLAP: f64 = 0.75;
const SIDE_OVERLAP: f64 = 0.65;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = logic().await {
        eprintln!("{e:#}");
    }
}

/// Serpentine grid of nadir poses over `area`, flight lines running north.
fn lawnmower(
    area: Rect<f64>,
    camera: &CameraModel,
    z: f64,
    ground_z: f64,
    polygon_id: &str,
) -> Result<Vec<Pose>> {
    let corners = Pose::nadir(0.0, 0.0, z).ground_footprint(camera, ground_z);
    let (Some(lo), Some(hi)) = (corners[0], corners[2]) else {
        anyhow::bail!("Nadir footprint does not reach the ground");
    };
    let across = (hi.x - lo.x) * (1.0 - SIDE_OVERLAP);
    let along = (hi.y - lo.y) * (1.0 - FRONT_OVERLAP);

    let lines = (area.width() / across).ceil() as usize + 1;
    let shots = (area.height() / along).ceil() as usize + 1;

    let poses = (0..lines)
        .flat_map(|line| {
            let x = area.min().x + line as f64 * across;
            (0..shots).map(move |shot| {
                let step = if line % 2 == 0 { shot } else { shots - 1 - shot };
                let y = area.min().y + step as f64 * along;
                Pose::nadir(x, y, z)
                    .with_id(format!("L{line:02}-{shot:03}"))
                    .with_polygon(polygon_id)
            })
        })
        .collect();

    Ok(poses)
}

async fn logic() -> Result<()> {
    let camera = CameraModel::new(0.035, 4.88e-6, 6000, 4000);
    let centre = lon_lat_to_mercator(SITE_LON, SITE_LAT);
    let area = Rect::new(
        Coord { x: centre.x - 500.0, y: centre.y - 500.0 },
        Coord { x: centre.x + 500.0, y: centre.y + 500.0 },
    );

    let ring: Vec<(f64, f64)> = area
        .to_polygon()
        .exterior()
        .coords()
        .map(|c| {
            let ll = mercator_to_lon_lat(c.x, c.y);
            (ll.x, ll.y)
        })
        .collect();
    let block = PolygonWithId::with_index(None, ring, 0);
    let poses = lawnmower(
        area,
        &camera,
        GROUND_ELEVATION + ALTITUDE_AGL,
        GROUND_ELEVATION,
        &block.id,
    )?;
    let polygons = vec![block];
    info!("Planned {} poses over a 1 km x 1 km block", poses.len());

    let config = RunConfig {
        show_progress: true,
        ..Default::default()
    };
    let mut run = AnalysisRun::new(config, polygons, poses, CameraAssignment::Single(camera))?;

    let provider = Arc::new(FlatTerrain::new(GROUND_ELEVATION, 256));
    let report = run.execute(provider, &CancelFlag::new()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    for summary in run.polygon_summaries() {
        println!(
            "{}: {} images, {} tiles, {:.2}/{:.2}/{:.2} cm GSD (min/mean/max), {:.0} m² covered",
            summary.polygon_id,
            summary.image_count,
            summary.tile_count,
            summary.stats.min * 100.0,
            summary.stats.mean * 100.0,
            summary.stats.max * 100.0,
            summary.stats.total_area_m2
        );
        let histogram = serde_json::to_string_pretty(&summary.stats.histogram)
            .context("Failed to serialize histogram")?;
        println!("{histogram}");
    }

    Ok(())
}
