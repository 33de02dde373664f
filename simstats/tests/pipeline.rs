//! Runs the whole comparison pipeline over a tiny fabricated pair of runs.

use std::path::Path;

use cmputil::Timer;
use simstats::extract::NetstateMode;
use simstats::run::{compare_run, Config, RunPaths};

fn write(path: &Path, contents: &str) -> String {
    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, contents).unwrap();
    path.display().to_string()
}

fn fabricate_inputs(root: &Path) -> RunPaths {
    let ronin_tripinfos = write(
        &root.join("ronin/tripinfos.ti.xml"),
        r#"<tripinfos>
             <tripinfo id="veh1" depart="0.0" duration="11"/>
             <tripinfo id="veh2" depart="0.0" duration="18"/>
             <tripinfo id="veh3" depart="1.0" duration="30"/>
           </tripinfos>"#,
    );
    let sumo_tripinfos = write(
        &root.join("sumo/tripinfo-output.xml"),
        r#"<tripinfos>
             <tripinfo id="veh1" depart="0.0" duration="10"/>
             <tripinfo id="veh2" depart="0.0" duration="20"/>
             <tripinfo id="veh3" depart="1.0" duration="30"/>
           </tripinfos>"#,
    );
    let ronin_edgedata = write(
        &root.join("ronin/edgeData.edd.xml"),
        r#"<meandata>
             <interval begin="0" end="100">
               <edge id="e1" density="2.0" trafficVolume="80.0"/>
               <edge id="e2" density="0.0" trafficVolume="0.0"/>
             </interval>
           </meandata>"#,
    );
    let sumo_edgedata = write(
        &root.join("sumo/edgeData.xml"),
        r#"<meandata>
             <interval begin="0" end="100">
               <edge id="e1" density="2.0" speed="10.0"/>
               <edge id="e2" density="0.0"/>
             </interval>
           </meandata>"#,
    );
    let sumo_vehroute = write(
        &root.join("sumo/vehroute-output.xml"),
        r#"<routes>
             <vehicle id="veh1" depart="0.0"><route edges="e1 e2"/></vehicle>
             <vehicle id="veh2" depart="0.0"><route edges="e2 e1"/></vehicle>
             <vehicle id="veh3" depart="1.0"><route edges="e1"/></vehicle>
           </routes>"#,
    );
    let sumo_netstate = write(
        &root.join("sumo/netstate-dump.xml"),
        r#"<netstate>
             <timestep time="0.0">
               <edge id="e1"><lane id="e1_0"><vehicle id="veh1" pos="0" speed="1"/></lane></edge>
               <edge id="e2"><lane id="e2_0"><vehicle id="veh2" pos="0" speed="1"/></lane></edge>
             </timestep>
             <timestep time="1.0">
               <edge id="e2"><lane id="e2_0"><vehicle id="veh1" pos="0" speed="1"/></lane></edge>
               <edge id="e1"><lane id="e1_0">
                 <vehicle id="veh2" pos="0" speed="1"/>
                 <vehicle id="veh3" pos="0" speed="1"/>
               </lane></edge>
             </timestep>
           </netstate>"#,
    );
    write(
        &root.join("ronin/LoadsMatrix/step_0.llm.xml"),
        r#"<step timeSlot="0.0">
             <edge id="e1"><vehicle id="veh1"/></edge>
             <edge id="e2"><vehicle id="veh2"/></edge>
           </step>"#,
    );
    write(
        &root.join("ronin/LoadsMatrix/step_1.llm.xml"),
        r#"<step timeSlot="1.0">
             <edge id="e2"><vehicle id="veh1"/></edge>
             <edge id="e1"><vehicle id="veh2"/><vehicle id="veh3"/></edge>
           </step>"#,
    );

    RunPaths {
        ronin_tripinfos,
        ronin_edgedata,
        ronin_loadsmatrix: root.join("ronin/LoadsMatrix").display().to_string(),
        sumo_tripinfos,
        sumo_edgedata,
        sumo_vehroute,
        sumo_netstate,
    }
}

#[test]
fn full_run_produces_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let paths = fabricate_inputs(dir.path());
    let cfg = Config {
        output_root: dir.path().join("output").display().to_string(),
        cache_root: dir.path().join("cache").display().to_string(),
        netstate_mode: NetstateMode::Auto,
        ignore_small_edge_diffs: false,
    };

    let mut timer = Timer::new("test full run");
    compare_run(&paths, &cfg, &mut timer).unwrap();
    timer.done();

    let durations =
        fs_err::read_to_string(format!("{}/duration_trip_comparison.csv", cfg.output_root))
            .unwrap();
    let mut lines: Vec<&str> = durations.lines().skip(1).collect();
    lines.sort();
    assert_eq!(lines, vec!["veh1,0.1", "veh2,-0.1", "veh3,0"]);

    let density =
        fs_err::read_to_string(format!("{}/edge_density_comparison.csv", cfg.output_root))
            .unwrap();
    assert!(density.lines().any(|l| l == "e1,0"));
    let volume = fs_err::read_to_string(format!(
        "{}/edge_traffic_volume_comparison.csv",
        cfg.output_root
    ))
    .unwrap();
    // Ronin 80 vs SUMO 10*2*3.6=72: (80-72)/72
    assert!(volume.lines().any(|l| l.starts_with("e1,0.11111111111111")));

    for vehicle in ["veh1", "veh2", "veh3"] {
        assert!(Path::new(&format!(
            "{}/positions/veh_{}.csv",
            cfg.output_root, vehicle
        ))
        .is_file());
    }
    let areas =
        fs_err::read_to_string(format!("{}/areas_positions.csv", cfg.output_root)).unwrap();
    // Identical trajectories on both sides, so every area diff is zero
    let mut lines: Vec<&str> = areas.lines().skip(1).collect();
    lines.sort();
    assert_eq!(lines, vec!["veh1,0", "veh2,0", "veh3,0"]);

    // A second run hits the cache for every extraction and agrees
    let mut timer = Timer::new("test cached rerun");
    compare_run(&paths, &cfg, &mut timer).unwrap();
    timer.done();
    let rerun =
        fs_err::read_to_string(format!("{}/duration_trip_comparison.csv", cfg.output_root))
            .unwrap();
    assert_eq!(rerun, durations);
}
