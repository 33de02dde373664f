//! Tools for cross-validating Ronin traffic simulation runs against SUMO,
//! bundled as a single executable.

mod compare_loads;
mod compare_vehicles;
mod filter_routes;

use std::path::Path;

use anyhow::{bail, Result};
use structopt::StructOpt;

use cmputil::Timer;
use simstats::extract::NetstateMode;
use simstats::run::{compare_run, Config, RunPaths};

#[derive(StructOpt)]
#[structopt(
    name = "simcmp",
    about = "Compare the outputs of paired Ronin and SUMO runs"
)]
enum Command {
    /// Compare trip durations, edge density and traffic volume, and vehicle
    /// positions between one Ronin run and one SUMO run of the same network
    /// and trips. Writes one CSV report per metric, one per vehicle for
    /// positions, and one aggregate spacetime-area report.
    CompareStats {
        /// The path to the tripinfos output file generated by Ronin
        #[structopt(long)]
        ronin_tripinfos: String,
        /// The path to the edgedata output file generated by Ronin
        #[structopt(long)]
        ronin_edgedata: String,
        /// The path to the loads matrix output folder generated by Ronin, one
        /// file per timeslot
        #[structopt(long)]
        ronin_loadsmatrix: String,
        /// The path to the tripinfo output file generated by SUMO
        #[structopt(long)]
        sumo_tripinfos: String,
        /// The path to the edgedata output file generated by SUMO
        #[structopt(long)]
        sumo_edgedata: String,
        /// The path to the vehroute output file generated by SUMO
        #[structopt(long)]
        sumo_vehroute: String,
        /// The path to the netstate output file generated by SUMO
        #[structopt(long)]
        sumo_netstate: String,
        /// The directory to write the comparison reports under
        #[structopt(long, default_value = "output")]
        output: String,
        /// The directory to keep cached extractions under, so reruns skip the
        /// XML parsing. Delete it to force recomputation.
        #[structopt(long, default_value = "cache")]
        cache: String,
        /// Drop edge diffs below the minimum meaningful change (5.0 for
        /// density, 100.0 for traffic volume)
        #[structopt(long)]
        ignore_small_edge_diffs: bool,
        /// How to parse the netstate file: auto, whole-document, or streaming
        #[structopt(long, default_value = "auto")]
        netstate_mode: NetstateMode,
    },
    /// Check whether several XML files containing vehicle elements all cover
    /// the same set of vehicle ids.
    CompareVehicles {
        /// The paths of the XML files to compare
        #[structopt(long, required = true, min_values = 2)]
        files: Vec<String>,
    },
    /// Check whether several loads-matrix folders describe the same
    /// simulation: step by step, every edge must carry the same load.
    CompareLoads {
        /// The loads-matrix folders to compare; light matrices work too
        #[structopt(long, required = true, min_values = 2)]
        folders: Vec<String>,
    },
    /// Copy a SUMO .rou.xml, keeping only the vehicles that appear in a
    /// vehroute output file. Mainly used to scale a scenario down before a
    /// comparison run.
    FilterRoutes {
        /// The path to the .rou.xml file to filter
        #[structopt(long)]
        sumorou: String,
        /// The path to the SUMO vehroute output file naming the vehicles to
        /// keep
        #[structopt(long)]
        vehroute: String,
        /// The path to write. Defaults to sumorou_created.rou.xml, numbered to
        /// avoid clobbering an existing file; a .rou.xml suffix is added if
        /// missing.
        #[structopt(long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    cmputil::logger::setup();

    match Command::from_args() {
        Command::CompareStats {
            ronin_tripinfos,
            ronin_edgedata,
            ronin_loadsmatrix,
            sumo_tripinfos,
            sumo_edgedata,
            sumo_vehroute,
            sumo_netstate,
            output,
            cache,
            ignore_small_edge_diffs,
            netstate_mode,
        } => {
            let paths = RunPaths {
                ronin_tripinfos,
                ronin_edgedata,
                ronin_loadsmatrix,
                sumo_tripinfos,
                sumo_edgedata,
                sumo_vehroute,
                sumo_netstate,
            };
            // Fail on a bad path before any comparison starts
            for path in [
                &paths.ronin_tripinfos,
                &paths.ronin_edgedata,
                &paths.sumo_tripinfos,
                &paths.sumo_edgedata,
                &paths.sumo_vehroute,
                &paths.sumo_netstate,
            ] {
                require_file(path)?;
            }
            require_dir(&paths.ronin_loadsmatrix)?;
            fs_err::create_dir_all(&output)?;
            fs_err::create_dir_all(&cache)?;

            let cfg = Config {
                output_root: output,
                cache_root: cache,
                netstate_mode,
                ignore_small_edge_diffs,
            };
            let mut timer = Timer::new("compare Ronin and SUMO outputs");
            compare_run(&paths, &cfg, &mut timer)?;
        }
        Command::CompareVehicles { files } => {
            for path in &files {
                require_file(path)?;
            }
            compare_vehicles::run(files)?;
        }
        Command::CompareLoads { folders } => {
            for folder in &folders {
                require_dir(folder)?;
            }
            compare_loads::run(folders)?;
        }
        Command::FilterRoutes {
            sumorou,
            vehroute,
            output,
        } => {
            require_file(&sumorou)?;
            require_file(&vehroute)?;
            filter_routes::run(&sumorou, &vehroute, output)?;
        }
    }
    Ok(())
}

fn require_file(path: &str) -> Result<()> {
    if !Path::new(path).is_file() {
        bail!("file {} not found", path);
    }
    Ok(())
}

fn require_dir(path: &str) -> Result<()> {
    if !Path::new(path).is_dir() {
        bail!("folder {} not found", path);
    }
    Ok(())
}
