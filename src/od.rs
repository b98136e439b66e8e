use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Demand between two stops together with the state used by the activation policies.
#[derive(Debug, Clone, PartialEq)]
pub struct OdPair {
    pub origin: i64,
    pub destination: i64,
    /// Passengers per time slice. Periodic planning uses a single slice.
    pub passengers: Vec<f64>,
    pub active: bool,
    pub transfer_in_shortest_paths: bool,
    pub diff_bounds_sp: f64,
}

impl OdPair {
    pub fn new(origin: i64, destination: i64, passengers: f64) -> Self {
        OdPair {
            origin,
            destination,
            passengers: vec![passengers],
            active: true,
            transfer_in_shortest_paths: false,
            diff_bounds_sp: 0.0,
        }
    }

    pub fn total_passengers(&self) -> f64 {
        self.passengers.iter().sum()
    }

    pub fn weighted_diff_bounds_sp(&self) -> f64 {
        self.diff_bounds_sp * self.total_passengers()
    }
}

pub trait Od {
    fn value(&self, origin: i64, destination: i64) -> f64;

    /// Fails for negative values.
    fn set_value(&mut self, origin: i64, destination: i64, value: f64) -> Result<()>;

    /// The entries with non-zero value, ordered by origin and destination.
    fn od_pairs(&self) -> Vec<OdPair>;

    fn number_of_passengers(&self) -> f64 {
        self.od_pairs().iter().map(OdPair::total_passengers).sum()
    }
}

fn check_value(value: f64) -> Result<()> {
    if value < 0.0 || !value.is_finite() {
        return Err(Error::DataIllegalValue {
            field: "od value".into(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Only stores non-zero entries.
#[derive(Debug, Clone, Default)]
pub struct SparseOd {
    values: BTreeMap<(i64, i64), f64>,
}

impl SparseOd {
    pub fn new() -> Self {
        SparseOd {
            values: BTreeMap::new(),
        }
    }
}

impl Od for SparseOd {
    fn value(&self, origin: i64, destination: i64) -> f64 {
        self.values
            .get(&(origin, destination))
            .copied()
            .unwrap_or(0.0)
    }

    fn set_value(&mut self, origin: i64, destination: i64, value: f64) -> Result<()> {
        check_value(value)?;
        if value == 0.0 {
            self.values.remove(&(origin, destination));
        } else {
            self.values.insert((origin, destination), value);
        }
        Ok(())
    }

    fn od_pairs(&self) -> Vec<OdPair> {
        self.values
            .iter()
            .map(|(&(origin, destination), &value)| OdPair::new(origin, destination, value))
            .collect()
    }
}

/// Full matrix over the stops `1..=size`.
#[derive(Debug, Clone)]
pub struct DenseOd {
    size: usize,
    values: Vec<f64>,
}

impl DenseOd {
    pub fn new(size: usize) -> Self {
        DenseOd {
            size,
            values: vec![0.0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn position(&self, origin: i64, destination: i64) -> Result<usize> {
        let in_range = |stop: i64| stop >= 1 && stop as usize <= self.size;
        for stop in [origin, destination] {
            if !in_range(stop) {
                return Err(Error::DataIndexNotFound { kind: "stop", index: stop });
            }
        }
        Ok((origin as usize - 1) * self.size + destination as usize - 1)
    }
}

impl Od for DenseOd {
    fn value(&self, origin: i64, destination: i64) -> f64 {
        self.position(origin, destination)
            .map(|position| self.values[position])
            .unwrap_or(0.0)
    }

    fn set_value(&mut self, origin: i64, destination: i64, value: f64) -> Result<()> {
        check_value(value)?;
        let position = self.position(origin, destination)?;
        self.values[position] = value;
        Ok(())
    }

    fn od_pairs(&self) -> Vec<OdPair> {
        let mut pairs = Vec::new();
        for (position, &value) in self.values.iter().enumerate() {
            if value != 0.0 {
                let origin = (position / self.size) as i64 + 1;
                let destination = (position % self.size) as i64 + 1;
                pairs.push(OdPair::new(origin, destination, value));
            }
        }
        pairs
    }
}
