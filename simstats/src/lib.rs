//! This crate compares the outputs of two traffic simulators that ran the same
//! road network and vehicle trips: Ronin, the fast approximate one, against
//! [SUMO](https://www.eclipse.org/sumo/), the reference. Three metric families
//! are compared: per-vehicle trip duration, per-edge density and traffic
//! volume, and per-vehicle position over time, the last reduced to one scalar
//! "spacetime area" per vehicle.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use cmputil::{deserialize_btreemap, serialize_btreemap};

pub mod cache;
pub mod compare;
pub mod extract;
pub mod report;
pub mod run;
pub mod spacetime;

/// Which simulator produced an output file. The two dialects mostly share
/// element names but differ in which attributes they carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Ronin,
    Sumo,
}

impl SourceKind {
    /// The per-simulator subdirectory used for cache artifacts.
    pub fn dir_name(self) -> &'static str {
        match self {
            SourceKind::Ronin => "ronin",
            SourceKind::Sumo => "sumo",
        }
    }
}

/// Entity id (vehicle or edge) mapped to one numeric value.
pub type MetricMap = BTreeMap<String, f64>;

/// Vehicle id -> edge id -> that edge's 0-based position along the vehicle's
/// route. Built once per run from SUMO's vehroute output, read-only after.
pub type TripEdgeIndex = BTreeMap<String, BTreeMap<String, usize>>;

/// A simulation timestep, ordered numerically. The raw XML carries timesteps
/// as strings; sorting those lexically would put "10.00" before "2.00".
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timestep(pub f64);

impl Eq for Timestep {}

impl Ord for Timestep {
    fn cmp(&self, other: &Timestep) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Timestep {
    fn partial_cmp(&self, other: &Timestep) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One vehicle's route position at each timestep where some simulator saw it
/// on an edge of its route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory(
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub BTreeMap<Timestep, f64>,
);

/// Every tracked vehicle's trajectory, from one simulator source.
pub type PositionSeries = BTreeMap<String, Trajectory>;

/// The outcome of one per-key comparison. `Infinite` marks a normalized
/// difference against a zero baseline; it stays a distinct variant all the
/// way into the reports instead of leaking as an IEEE special value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Diff {
    Finite(f64),
    Infinite,
}

impl Diff {
    /// The absolute size of this difference, for threshold filtering.
    /// `Infinite` exceeds any threshold.
    pub fn magnitude(self) -> f64 {
        match self {
            Diff::Finite(x) => x.abs(),
            Diff::Infinite => f64::INFINITY,
        }
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diff::Finite(x) => write!(f, "{}", x),
            Diff::Infinite => write!(f, "inf"),
        }
    }
}

/// Both metrics scraped from one edge-aggregate file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeMetrics {
    pub density: MetricMap,
    pub traffic_volume: MetricMap,
}
