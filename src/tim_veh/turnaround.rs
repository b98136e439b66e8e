//! Durations and distances of empty trips between stops.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::col::{map_new, HashMap};
use crate::error::Result;
use crate::ptn::{Link, Ptn};
use crate::shortest_path::dijkstra::Dijkstra;

/// All-pairs turnaround table of a PTN.
///
/// The time of an empty trip is the shortest path on link lower bounds plus the turnover time,
/// its distance the shortest path on link lengths. A trip from a stop to itself only takes the
/// turnover time. Pairs without connecting path are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Turnarounds {
    time: HashMap<(i64, i64), i64>,
    distance: HashMap<(i64, i64), f64>,
    depot: Option<i64>,
}

impl Turnarounds {
    pub fn compute(ptn: &Ptn, turnover_time: i64, time_units_per_minute: i64, depot: Option<i64>) -> Result<Self> {
        if let Some(depot) = depot {
            ptn.stop(depot)?;
        }
        let graph = ptn.graph();
        let rows = ptn
            .stops()
            .par_iter()
            .map(|stop| -> Result<Vec<((i64, i64), i64, f64)>> {
                let mut by_time = Dijkstra::new(graph, stop.id, |l: &Link| l.lower_bound as f64)?;
                by_time.compute_shortest_paths();
                let mut by_length = Dijkstra::new(graph, stop.id, |l: &Link| l.length)?;
                by_length.compute_shortest_paths();
                let mut row = Vec::new();
                for target in ptn.stops() {
                    if !by_time.reached(target.id) {
                        continue;
                    }
                    let time = by_time.distance(target.id)?.round() as i64 * time_units_per_minute;
                    row.push((
                        (stop.id, target.id),
                        time + turnover_time,
                        by_length.distance(target.id)?,
                    ));
                }
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut time = map_new();
        let mut distance = map_new();
        for (pair, pair_time, pair_distance) in rows.into_iter().flatten() {
            time.insert(pair, pair_time);
            distance.insert(pair, pair_distance);
        }
        Ok(Turnarounds {
            time,
            distance,
            depot,
        })
    }

    pub fn time(&self, from: i64, to: i64) -> Option<i64> {
        self.time.get(&(from, to)).copied()
    }

    pub fn distance(&self, from: i64, to: i64) -> Option<f64> {
        self.distance.get(&(from, to)).copied()
    }

    pub fn depot(&self) -> Option<i64> {
        self.depot
    }

    pub fn from_depot_time(&self, to: i64) -> Option<i64> {
        self.depot.and_then(|depot| self.time(depot, to))
    }

    pub fn to_depot_time(&self, from: i64) -> Option<i64> {
        self.depot.and_then(|depot| self.time(from, depot))
    }

    pub fn from_depot_distance(&self, to: i64) -> Option<f64> {
        self.depot.and_then(|depot| self.distance(depot, to))
    }

    pub fn to_depot_distance(&self, from: i64) -> Option<f64> {
        self.depot.and_then(|depot| self.distance(from, depot))
    }
}
