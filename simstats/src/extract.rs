//! Scrapes the canonical mappings out of each simulator's XML output dialect.
//!
//! Both simulators write `tripinfo` and `edge` elements with mostly shared
//! attribute names; positions come from SUMO's netstate dump (one huge
//! time-indexed document) and from Ronin's loads matrix (a directory with one
//! small document per timeslot). Structural parse failures and malformed
//! numbers on present attributes are fatal; optional attributes default as
//! documented per function.

use std::io::BufRead;
use std::str::FromStr;

use anyhow::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use cmputil::prettyprint_usize;

use crate::{EdgeMetrics, MetricMap, PositionSeries, SourceKind, Timestep, TripEdgeIndex};

/// Above this, `NetstateMode::Auto` switches from loading the whole document
/// to the constant-memory streaming parse.
const STREAM_ABOVE_BYTES: u64 = 256 * 1024 * 1024;

/// Per-vehicle trip duration in seconds, off every `tripinfo` element. Both
/// dialects agree on this record; `id` and `duration` are mandatory.
pub fn trip_durations(path: &str) -> Result<MetricMap> {
    let contents = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)?;

    let mut durations = MetricMap::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("tripinfo")) {
        let id = require_attr(&node, "id", path)?;
        let duration = parse_number(require_attr(&node, "duration", path)?, "duration", id, path)?;
        durations.insert(id.to_string(), duration);
    }
    info!(
        "Read {} tripinfos from {}",
        prettyprint_usize(durations.len()),
        path
    );
    Ok(durations)
}

/// Per-edge average density and traffic volume, off every `edge` element.
/// Missing numeric attributes count as 0. SUMO doesn't write a volume, so it's
/// derived as speed * density * 3.6 (the speed is in m/s, the density per km);
/// Ronin writes `trafficVolume` directly.
pub fn edge_metrics(kind: SourceKind, path: &str) -> Result<EdgeMetrics> {
    let contents = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)?;

    let mut metrics = EdgeMetrics {
        density: MetricMap::new(),
        traffic_volume: MetricMap::new(),
    };
    for node in doc.descendants().filter(|n| n.has_tag_name("edge")) {
        let id = require_attr(&node, "id", path)?;
        let density = optional_number(&node, "density", id, path)?;
        let volume = match kind {
            SourceKind::Sumo => {
                let speed = optional_number(&node, "speed", id, path)?;
                speed * density * 3.6
            }
            SourceKind::Ronin => optional_number(&node, "trafficVolume", id, path)?,
        };
        metrics.density.insert(id.to_string(), density);
        metrics.traffic_volume.insert(id.to_string(), volume);
    }
    info!(
        "Read {} edges from {}",
        prettyprint_usize(metrics.density.len()),
        path
    );
    Ok(metrics)
}

/// Each vehicle's route as edge id -> 0-based position along the route, off
/// SUMO's vehroute output.
pub fn trip_edges(path: &str) -> Result<TripEdgeIndex> {
    let contents = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)?;

    let mut index = TripEdgeIndex::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("vehicle")) {
        let id = require_attr(&node, "id", path)?;
        let route = match node.descendants().find(|n| n.has_tag_name("route")) {
            Some(r) => r,
            None => bail!("vehicle {} in {} has no route", id, path),
        };
        let edges = require_attr(&route, "edges", path)?;
        index.insert(
            id.to_string(),
            edges
                .split_whitespace()
                .enumerate()
                .map(|(position, edge)| (edge.to_string(), position))
                .collect(),
        );
    }
    info!(
        "Read {} vehicle routes from {}",
        prettyprint_usize(index.len()),
        path
    );
    Ok(index)
}

/// How to parse SUMO's netstate dump. Both strategies produce identical
/// output; streaming just never holds the whole document in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetstateMode {
    /// Pick by file size
    Auto,
    WholeDocument,
    Streaming,
}

impl FromStr for NetstateMode {
    type Err = anyhow::Error;

    fn from_str(x: &str) -> Result<NetstateMode> {
        match x {
            "auto" => Ok(NetstateMode::Auto),
            "whole-document" => Ok(NetstateMode::WholeDocument),
            "streaming" => Ok(NetstateMode::Streaming),
            _ => bail!("unknown netstate mode {}; use auto, whole-document, or streaming", x),
        }
    }
}

/// Every vehicle's route position over time, off SUMO's netstate dump: per
/// `timestep`, per `edge`, every `vehicle` seen there is looked up in the trip
/// index. Sightings on edges outside the vehicle's route are counted and
/// dropped, not fatal.
pub fn sumo_positions(
    path: &str,
    index: &TripEdgeIndex,
    mode: NetstateMode,
) -> Result<PositionSeries> {
    let streaming = match mode {
        NetstateMode::WholeDocument => false,
        NetstateMode::Streaming => true,
        NetstateMode::Auto => fs_err::metadata(path)?.len() > STREAM_ABOVE_BYTES,
    };
    let mut recorder = PositionRecorder::new(index);
    if streaming {
        netstate_streaming(path, &mut recorder)?;
    } else {
        netstate_whole_document(path, &mut recorder)?;
    }
    Ok(recorder.finish(path))
}

fn netstate_whole_document(path: &str, recorder: &mut PositionRecorder) -> Result<()> {
    let contents = fs_err::read_to_string(path)?;
    let doc = roxmltree::Document::parse(&contents)?;

    for step in doc.descendants().filter(|n| n.has_tag_name("timestep")) {
        let time = parse_number(require_attr(&step, "time", path)?, "time", "timestep", path)?;
        for edge in step.descendants().filter(|n| n.has_tag_name("edge")) {
            let edge_id = require_attr(&edge, "id", path)?;
            for vehicle in edge.descendants().filter(|n| n.has_tag_name("vehicle")) {
                let vehicle_id = require_attr(&vehicle, "id", path)?;
                recorder.record(vehicle_id, edge_id, time);
            }
        }
    }
    Ok(())
}

fn netstate_streaming(path: &str, recorder: &mut PositionRecorder) -> Result<()> {
    let mut reader = Reader::from_file(path)?;
    reader.trim_text(true);

    let mut current_time: Option<f64> = None;
    let mut current_edge: Option<String> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name() {
                b"timestep" => {
                    let raw = require_xml_attr(&reader, e, "time", path)?;
                    current_time = Some(parse_number(&raw, "time", "timestep", path)?);
                }
                b"edge" => {
                    current_edge = Some(require_xml_attr(&reader, e, "id", path)?);
                }
                b"vehicle" => {
                    record_streamed_vehicle(&reader, e, &current_time, &current_edge, recorder, path)?;
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name() == b"vehicle" {
                    record_streamed_vehicle(&reader, e, &current_time, &current_edge, recorder, path)?;
                }
            }
            Ok(Event::End(ref e)) => match e.name() {
                b"timestep" => current_time = None,
                b"edge" => current_edge = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => bail!(
                "XML error in {} at position {}: {}",
                path,
                reader.buffer_position(),
                err
            ),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn record_streamed_vehicle<R: BufRead>(
    reader: &Reader<R>,
    e: &BytesStart,
    current_time: &Option<f64>,
    current_edge: &Option<String>,
    recorder: &mut PositionRecorder,
    path: &str,
) -> Result<()> {
    // Only vehicles inside a timestep's edge (directly or via a lane) count;
    // netstate has no others, but don't trip over unrelated dialects.
    if let (Some(time), Some(edge)) = (current_time, current_edge) {
        let id = require_xml_attr(reader, e, "id", path)?;
        recorder.record(&id, edge, *time);
    }
    Ok(())
}

/// Every vehicle's route position over time, off Ronin's loads matrix: a
/// directory with one document per timeslot, each rooted at a `step` element
/// with the `timeSlot` attribute and the same edge/vehicle nesting as
/// netstate.
pub fn ronin_positions(dir: &str, index: &TripEdgeIndex) -> Result<PositionSeries> {
    let files = cmputil::list_dir(dir)?;
    let mut recorder = PositionRecorder::new(index);
    for file in &files {
        let contents = fs_err::read_to_string(file)?;
        let doc = roxmltree::Document::parse(&contents)?;
        let step = doc.root_element();
        let time = parse_number(require_attr(&step, "timeSlot", file)?, "timeSlot", "step", file)?;
        for edge in step.descendants().filter(|n| n.has_tag_name("edge")) {
            let edge_id = require_attr(&edge, "id", file)?;
            for vehicle in edge.descendants().filter(|n| n.has_tag_name("vehicle")) {
                let vehicle_id = require_attr(&vehicle, "id", file)?;
                recorder.record(vehicle_id, edge_id, time);
            }
        }
    }
    info!(
        "Read {} loads matrix files from {}",
        prettyprint_usize(files.len()),
        dir
    );
    Ok(recorder.finish(dir))
}

/// Accumulates (vehicle, edge, time) sightings into trajectories, dropping
/// sightings that don't match the trip index.
struct PositionRecorder<'a> {
    index: &'a TripEdgeIndex,
    series: PositionSeries,
    skipped: usize,
}

impl<'a> PositionRecorder<'a> {
    fn new(index: &'a TripEdgeIndex) -> PositionRecorder<'a> {
        PositionRecorder {
            index,
            series: PositionSeries::new(),
            skipped: 0,
        }
    }

    fn record(&mut self, vehicle: &str, edge: &str, time: f64) {
        match self.index.get(vehicle).and_then(|edges| edges.get(edge)) {
            Some(position) => {
                self.series
                    .entry(vehicle.to_string())
                    .or_default()
                    .0
                    .insert(Timestep(time), *position as f64);
            }
            None => {
                self.skipped += 1;
            }
        }
    }

    fn finish(self, source: &str) -> PositionSeries {
        if self.skipped > 0 {
            warn!(
                "Dropped {} position samples from {} that don't match any known route",
                prettyprint_usize(self.skipped),
                source
            );
        }
        self.series
    }
}

fn require_attr<'a>(node: &roxmltree::Node<'a, '_>, attr: &str, path: &str) -> Result<&'a str> {
    match node.attribute(attr) {
        Some(value) => Ok(value),
        None => bail!(
            "a {} element in {} is missing the {} attribute",
            node.tag_name().name(),
            path,
            attr
        ),
    }
}

fn require_xml_attr<R: BufRead>(
    reader: &Reader<R>,
    e: &BytesStart,
    attr: &str,
    path: &str,
) -> Result<String> {
    for candidate in e.attributes() {
        let candidate = candidate?;
        if candidate.key == attr.as_bytes() {
            return Ok(candidate.unescape_and_decode_value(reader)?);
        }
    }
    bail!(
        "a {} element in {} is missing the {} attribute",
        String::from_utf8_lossy(e.name()),
        path,
        attr
    )
}

fn parse_number(raw: &str, attr: &str, owner: &str, path: &str) -> Result<f64> {
    match raw.parse::<f64>() {
        Ok(x) => Ok(x),
        Err(_) => bail!("{} has a malformed {} for {}: {}", path, attr, owner, raw),
    }
}

/// A present attribute must parse; an absent one is 0.
fn optional_number(node: &roxmltree::Node, attr: &str, owner: &str, path: &str) -> Result<f64> {
    match node.attribute(attr) {
        Some(raw) => parse_number(raw, attr, owner, path),
        None => Ok(0.0),
    }
}
