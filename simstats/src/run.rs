//! Sequences the three metric comparisons for one paired run: trip durations,
//! then edge metrics, then per-vehicle positions. Each phase is timed; a
//! metric whose two sides turn out not to be comparable is skipped with a
//! warning and the run keeps going, with all such warnings repeated together
//! at the end.

use std::collections::BTreeMap;

use anyhow::Result;

use cmputil::Timer;

use crate::cache::MetricCache;
use crate::compare::compare_metric_maps;
use crate::extract::{self, NetstateMode};
use crate::report::write_report;
use crate::spacetime::compare_trajectories;
use crate::{Diff, MetricMap, PositionSeries, SourceKind, TripEdgeIndex};

// Below these, a normalized edge diff is noise when --ignore-small-edge-diffs
// is on
const MIN_DENSITY_DIFF: f64 = 5.0;
const MIN_TRAFFIC_VOLUME_DIFF: f64 = 100.0;

/// Where the pipeline reads and writes, passed in explicitly; nothing in the
/// library consults the current directory.
pub struct Config {
    pub output_root: String,
    pub cache_root: String,
    pub netstate_mode: NetstateMode,
    pub ignore_small_edge_diffs: bool,
}

/// The seven validated input paths for one paired run.
pub struct RunPaths {
    pub ronin_tripinfos: String,
    pub ronin_edgedata: String,
    pub ronin_loadsmatrix: String,
    pub sumo_tripinfos: String,
    pub sumo_edgedata: String,
    pub sumo_vehroute: String,
    pub sumo_netstate: String,
}

pub fn compare_run(paths: &RunPaths, cfg: &Config, timer: &mut Timer) -> Result<()> {
    let ronin_cache = MetricCache::new(&cfg.cache_root, SourceKind::Ronin);
    let sumo_cache = MetricCache::new(&cfg.cache_root, SourceKind::Sumo);

    timer.start("compare trip durations");
    compare_trip_durations(paths, cfg, &ronin_cache, &sumo_cache, timer)?;
    timer.stop("compare trip durations");

    timer.start("compare edge metrics");
    compare_edge_metrics(paths, cfg, &ronin_cache, &sumo_cache, timer)?;
    timer.stop("compare edge metrics");

    timer.start("compare vehicle positions");
    compare_vehicle_positions(paths, cfg, &ronin_cache, &sumo_cache, timer)?;
    timer.stop("compare vehicle positions");

    Ok(())
}

fn compare_trip_durations(
    paths: &RunPaths,
    cfg: &Config,
    ronin_cache: &MetricCache,
    sumo_cache: &MetricCache,
    timer: &mut Timer,
) -> Result<()> {
    let ronin: MetricMap = ronin_cache.get_or_compute(&paths.ronin_tripinfos, "tripinfos", || {
        extract::trip_durations(&paths.ronin_tripinfos)
    })?;
    let sumo: MetricMap = sumo_cache.get_or_compute(&paths.sumo_tripinfos, "tripinfos", || {
        extract::trip_durations(&paths.sumo_tripinfos)
    })?;

    write_comparison(
        timer,
        "trip duration",
        compare_metric_maps(&ronin, &sumo, true, 0.0),
        &format!("{}/duration_trip_comparison.csv", cfg.output_root),
        [
            "idVehicle",
            "(duration trip Ronin - duration trip SUMO) / duration trip SUMO",
        ],
    )
}

fn compare_edge_metrics(
    paths: &RunPaths,
    cfg: &Config,
    ronin_cache: &MetricCache,
    sumo_cache: &MetricCache,
    timer: &mut Timer,
) -> Result<()> {
    let (ronin_density, ronin_volume) =
        edge_metrics_cached(ronin_cache, SourceKind::Ronin, &paths.ronin_edgedata)?;
    let (sumo_density, sumo_volume) =
        edge_metrics_cached(sumo_cache, SourceKind::Sumo, &paths.sumo_edgedata)?;

    let (min_density, min_volume) = if cfg.ignore_small_edge_diffs {
        (MIN_DENSITY_DIFF, MIN_TRAFFIC_VOLUME_DIFF)
    } else {
        (0.0, 0.0)
    };

    write_comparison(
        timer,
        "edge density",
        compare_metric_maps(&ronin_density, &sumo_density, true, min_density),
        &format!("{}/edge_density_comparison.csv", cfg.output_root),
        [
            "idEdge",
            "(average density Ronin - average density SUMO) / average density SUMO",
        ],
    )?;
    write_comparison(
        timer,
        "edge traffic volume",
        compare_metric_maps(&ronin_volume, &sumo_volume, true, min_volume),
        &format!("{}/edge_traffic_volume_comparison.csv", cfg.output_root),
        [
            "idEdge",
            "(average traffic volume Ronin - average traffic volume SUMO) / traffic volume SUMO",
        ],
    )
}

/// One parse fills both per-metric cache entries, mirroring the artifact
/// layout of one file per (source, metric).
fn edge_metrics_cached(
    cache: &MetricCache,
    kind: SourceKind,
    path: &str,
) -> Result<(MetricMap, MetricMap)> {
    if let (Some(density), Some(volume)) = (
        cache.lookup(path, "density")?,
        cache.lookup(path, "trafficVolume")?,
    ) {
        return Ok((density, volume));
    }
    let metrics = extract::edge_metrics(kind, path)?;
    cache.store(path, "density", &metrics.density)?;
    cache.store(path, "trafficVolume", &metrics.traffic_volume)?;
    Ok((metrics.density, metrics.traffic_volume))
}

fn compare_vehicle_positions(
    paths: &RunPaths,
    cfg: &Config,
    ronin_cache: &MetricCache,
    sumo_cache: &MetricCache,
    timer: &mut Timer,
) -> Result<()> {
    let trip_edges: TripEdgeIndex =
        sumo_cache.get_or_compute(&paths.sumo_vehroute, "tripedges", || {
            extract::trip_edges(&paths.sumo_vehroute)
        })?;
    let ronin_positions: PositionSeries =
        ronin_cache.get_or_compute(&paths.ronin_loadsmatrix, "positions", || {
            extract::ronin_positions(&paths.ronin_loadsmatrix, &trip_edges)
        })?;
    let sumo_positions: PositionSeries =
        sumo_cache.get_or_compute(&paths.sumo_netstate, "positions", || {
            extract::sumo_positions(&paths.sumo_netstate, &trip_edges, cfg.netstate_mode)
        })?;

    // Vehicles tracked by only one simulator can't be compared
    let mut vehicles = Vec::new();
    for id in ronin_positions.keys() {
        if sumo_positions.contains_key(id) {
            vehicles.push(id.clone());
        } else {
            timer.warn(format!("vehicle {} has Ronin positions but no SUMO ones", id));
        }
    }
    for id in sumo_positions.keys() {
        if !ronin_positions.contains_key(id) {
            timer.warn(format!("vehicle {} has SUMO positions but no Ronin ones", id));
        }
    }

    // Each vehicle only reads its own two trajectories, so fan out freely;
    // the area map accumulates back on this thread.
    let results = timer.parallelize("compare vehicle positions", vehicles, |id| {
        let comparison =
            compare_trajectories(&ronin_positions[&id], &sumo_positions[&id], true, 0.0);
        (id, comparison)
    });

    let mut areas: BTreeMap<String, Diff> = BTreeMap::new();
    for (id, comparison) in results {
        write_report(
            &format!("{}/positions/veh_{}.csv", cfg.output_root, id),
            ["time", "position Ronin - position SUMO"],
            &comparison.per_step,
        )?;
        areas.insert(id, comparison.area_diff);
    }

    write_report(
        &format!("{}/areas_positions.csv", cfg.output_root),
        ["idVehicle", "(area Ronin - area SUMO) / area SUMO"],
        &areas,
    )
}

/// A cardinality mismatch means this metric's report can't be produced; log
/// it now, repeat it in the end-of-run warning block, and move on.
fn write_comparison(
    timer: &mut Timer,
    metric: &str,
    result: Result<BTreeMap<String, Diff>>,
    path: &str,
    headers: [&str; 2],
) -> Result<()> {
    match result {
        Ok(rows) => write_report(path, headers, &rows),
        Err(err) => {
            warn!("Skipping the {} comparison: {}", metric, err);
            timer.warn(format!("{} comparison skipped: {}", metric, err));
            Ok(())
        }
    }
}
