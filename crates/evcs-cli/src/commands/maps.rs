use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Result};
use evcs_algo::{CapacityMapBuilder, DemandMapBuilder, LayerWeights};
use evcs_cli::MapsCommands;
use evcs_core::{ChargerType, Meters, Poi};
use evcs_io::{read_ascii_grid, read_pois, read_road_points, write_ascii_grid};
use tracing::info;

use super::telemetry::{manifest_dir, record_run_timed};

pub fn handle(command: &MapsCommands) -> Result<()> {
    match command {
        MapsCommands::Demand {
            grid,
            od,
            pois,
            roads,
            od_weight,
            poi_weight,
            road_weight,
            road_scale,
            out,
        } => {
            let weights = LayerWeights {
                od: *od_weight,
                poi_density: *poi_weight,
                road_proximity: *road_weight,
            };
            demand(
                DemandInputs {
                    grid: grid.as_deref(),
                    od: od.as_deref(),
                    pois: pois.as_deref(),
                    roads: roads.as_deref(),
                },
                weights,
                *road_scale,
                out,
            )
        }
        MapsCommands::Capacity {
            registrations,
            charger,
            growth,
            penetration,
            vehicles_per_port,
            out,
        } => capacity(
            registrations,
            *charger,
            *growth,
            *penetration,
            *vehicles_per_port,
            out,
        ),
    }
}

struct DemandInputs<'a> {
    grid: Option<&'a Path>,
    od: Option<&'a Path>,
    pois: Option<&'a Path>,
    roads: Option<&'a Path>,
}

fn demand(inputs: DemandInputs<'_>, weights: LayerWeights, road_scale: f64, out: &Path) -> Result<()> {
    let start = Instant::now();
    let res = (|| -> Result<()> {
        let od = inputs.od.map(read_ascii_grid).transpose()?;
        let grid = match (inputs.grid, &od) {
            (Some(path), _) => read_ascii_grid(path)?,
            (None, Some(od)) => od.clone(),
            (None, None) => return Err(anyhow!("either --grid or --od must be given")),
        };
        let mut builder = DemandMapBuilder::new(&grid)
            .weights(weights)
            .road_scale(Meters(road_scale));
        if let Some(od) = od {
            builder = builder.od(od)?;
        }
        if let Some(path) = inputs.pois {
            let pois = read_pois(path)?;
            info!(pois = pois.len(), "POI density layer");
            builder = builder.pois(pois.iter().map(Poi::coord));
        }
        if let Some(path) = inputs.roads {
            let roads = read_road_points(path)?;
            info!(points = roads.len(), "road proximity layer");
            builder = builder.roads(roads.iter().map(Poi::coord));
        }
        let map = builder.build()?;
        write_ascii_grid(&map, out)?;
        println!(
            "Wrote {}x{} demand map to {}",
            map.ncols,
            map.nrows,
            out.display()
        );
        Ok(())
    })();
    let show = |p: Option<&Path>| p.map(|p| p.display().to_string()).unwrap_or_default();
    record_run_timed(
        manifest_dir(out),
        "maps demand",
        &[
            ("grid", show(inputs.grid).as_str()),
            ("od", show(inputs.od).as_str()),
            ("pois", show(inputs.pois).as_str()),
            ("roads", show(inputs.roads).as_str()),
            ("weights", format!("{}/{}/{}", weights.od, weights.poi_density, weights.road_proximity).as_str()),
            ("road_scale", road_scale.to_string().as_str()),
        ],
        &[out.display().to_string()],
        start,
        &res,
    );
    res
}

fn capacity(
    registrations: &Path,
    charger: ChargerType,
    growth: f64,
    penetration: f64,
    vehicles_per_port: Option<f64>,
    out: &Path,
) -> Result<()> {
    let start = Instant::now();
    let res = (|| -> Result<()> {
        let reg = read_ascii_grid(registrations)?;
        let map = CapacityMapBuilder::new(reg)
            .growth(growth)
            .penetration(penetration)
            .build(charger, vehicles_per_port)?;
        let total: f64 = map.cells().map(|(_, _, v)| v).sum();
        write_ascii_grid(&map, out)?;
        println!(
            "Wrote {} capacity map ({:.1} ports) to {}",
            charger,
            total,
            out.display()
        );
        Ok(())
    })();
    record_run_timed(
        manifest_dir(out),
        "maps capacity",
        &[
            ("registrations", registrations.display().to_string().as_str()),
            ("charger", charger.as_str()),
            ("growth", growth.to_string().as_str()),
            ("penetration", penetration.to_string().as_str()),
            (
                "vehicles_per_port",
                vehicles_per_port.map(|v| v.to_string()).unwrap_or_default().as_str(),
            ),
        ],
        &[out.display().to_string()],
        start,
        &res,
    );
    res
}
