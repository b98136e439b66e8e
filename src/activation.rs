use std::str::FromStr;

use log::{info, warn};

use crate::config::Config;
use crate::ean::Ean;
use crate::error::{Error, Result};
use crate::od::OdPair;
use crate::ptn::Ptn;
use crate::routing::annotate_od_pairs;
use crate::shuffle::{shuffle, Mt19937};

/// Order in which od pairs are activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivatorKind {
    LargestWeight,
    SmallestWeight,
    LargestDistance,
    LargestWeightWithTransfer,
    Diff,
    Potential,
    Random,
}

impl ActivatorKind {
    /// Whether the kind needs shortest routes through the EAN.
    pub fn needs_routes(self) -> bool {
        matches!(
            self,
            ActivatorKind::LargestWeightWithTransfer | ActivatorKind::Diff | ActivatorKind::Potential
        )
    }
}

impl FromStr for ActivatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LARGEST_WEIGHT" => Ok(ActivatorKind::LargestWeight),
            "SMALLEST_WEIGHT" => Ok(ActivatorKind::SmallestWeight),
            "LARGEST_DISTANCE" => Ok(ActivatorKind::LargestDistance),
            "LARGEST_WEIGHT_WITH_TRANSFER" => Ok(ActivatorKind::LargestWeightWithTransfer),
            "DIFF" => Ok(ActivatorKind::Diff),
            "POTENTIAL" => Ok(ActivatorKind::Potential),
            "RANDOM" => Ok(ActivatorKind::Random),
            other => Err(Error::AlgorithmInfeasibleParameterSettings {
                parameter: "od activator".into(),
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OdActivator {
    pub kind: ActivatorKind,
    /// `-1` activates every pair with positive demand.
    pub number_to_activate: i64,
    pub seed: u64,
    pub change_penalty: f64,
}

impl OdActivator {
    pub fn from_config(config: &Config) -> Result<Self> {
        let kind = if config.contains("tim_pass_od_activator") {
            config.get_string("tim_pass_od_activator")?.parse()?
        } else {
            ActivatorKind::LargestWeight
        };
        Ok(OdActivator {
            kind,
            number_to_activate: config
                .get_optional("tim_pass_number_of_active_od_pairs", Config::get_integer)?
                .unwrap_or(-1),
            seed: config
                .get_optional("random_seed", Config::get_integer)?
                .unwrap_or(0)
                .unsigned_abs(),
            change_penalty: config
                .get_optional("ean_change_penalty", Config::get_double)?
                .unwrap_or(0.0),
        })
    }

    /// Marks the selected pairs active and all others inactive. Returns the number of active
    /// pairs. `ean` is needed by the kinds working on shortest routes.
    pub fn activate(&self, od_pairs: &mut [OdPair], ptn: &Ptn, ean: Option<&Ean>) -> Result<usize> {
        if self.number_to_activate < -1 {
            return Err(Error::AlgorithmInfeasibleParameterSettings {
                parameter: "tim_pass_number_of_active_od_pairs".into(),
                value: self.number_to_activate.to_string(),
            });
        }
        let mut candidates: Vec<usize> = (0..od_pairs.len())
            .filter(|&i| od_pairs[i].total_passengers() > 0.0)
            .collect();

        if self.kind.needs_routes() {
            let Some(ean) = ean else {
                return Err(Error::AlgorithmInfeasibleParameterSettings {
                    parameter: "tim_pass_od_activator".into(),
                    value: format!("{:?} without an EAN", self.kind),
                });
            };
            let mut routed: Vec<OdPair> = candidates.iter().map(|&i| od_pairs[i].clone()).collect();
            annotate_od_pairs(ean, &mut routed, self.change_penalty)?;
            for (&i, pair) in candidates.iter().zip(routed) {
                od_pairs[i] = pair;
            }
        }

        let pairs = &*od_pairs;
        let descending = |key: &dyn Fn(&OdPair) -> f64, candidates: &mut Vec<usize>| {
            candidates.sort_by(|&a, &b| key(&pairs[b]).total_cmp(&key(&pairs[a])));
        };
        match self.kind {
            ActivatorKind::LargestWeight => descending(&OdPair::total_passengers, &mut candidates),
            ActivatorKind::SmallestWeight => candidates
                .sort_by(|&a, &b| pairs[a].total_passengers().total_cmp(&pairs[b].total_passengers())),
            ActivatorKind::LargestDistance => {
                let mut distance = Vec::with_capacity(pairs.len());
                for pair in pairs {
                    let origin = ptn.stop(pair.origin)?;
                    let destination = ptn.stop(pair.destination)?;
                    distance.push(origin.squared_distance(destination));
                }
                candidates.sort_by(|&a, &b| distance[b].total_cmp(&distance[a]));
            }
            ActivatorKind::LargestWeightWithTransfer => {
                candidates.retain(|&i| pairs[i].transfer_in_shortest_paths);
                descending(&OdPair::total_passengers, &mut candidates);
            }
            ActivatorKind::Diff => descending(&|p: &OdPair| p.diff_bounds_sp, &mut candidates),
            ActivatorKind::Potential => descending(&OdPair::weighted_diff_bounds_sp, &mut candidates),
            ActivatorKind::Random => {
                // Candidates are in origin/destination order before the draw.
                shuffle(&mut candidates, &mut Mt19937::new(self.seed));
            }
        }

        let number = if self.number_to_activate == -1 {
            candidates.len()
        } else if self.number_to_activate as usize > candidates.len() {
            warn!(
                "{} od pairs should be activated but only {} qualify, activating all of them",
                self.number_to_activate,
                candidates.len()
            );
            candidates.len()
        } else {
            self.number_to_activate as usize
        };
        for pair in od_pairs.iter_mut() {
            pair.active = false;
        }
        for &i in &candidates[..number] {
            od_pairs[i].active = true;
        }
        info!("Activated {} of {} od pairs ({:?})", number, od_pairs.len(), self.kind);
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::col::{set_new, HashSet};
    use crate::io::{od::read_od, ptn::read_ptn};
    use crate::od::Od;
    use crate::test::sample::grid25_dir;

    fn grid25() -> (Ptn, Vec<OdPair>) {
        let dir = grid25_dir().join("basis");
        let ptn = read_ptn(&dir.join("Stop.giv"), &dir.join("Edge.giv"), false).unwrap();
        let od = read_od(&dir.join("OD.giv")).unwrap();
        (ptn, od.od_pairs())
    }

    fn activator(kind: ActivatorKind, number_to_activate: i64) -> OdActivator {
        OdActivator {
            kind,
            number_to_activate,
            seed: 1,
            change_penalty: 0.0,
        }
    }

    fn active(pairs: &[OdPair]) -> HashSet<(i64, i64)> {
        let mut set = set_new();
        set.extend(
            pairs
                .iter()
                .filter(|p| p.active)
                .map(|p| (p.origin, p.destination)),
        );
        set
    }

    #[test]
    fn test_largest_weight() {
        let (ptn, mut pairs) = grid25();
        let count = activator(ActivatorKind::LargestWeight, 30)
            .activate(&mut pairs, &ptn, None)
            .unwrap();
        assert_eq!(count, 30);
        let active = active(&pairs);
        assert_eq!(active.len(), 30);
        assert!(active.contains(&(12, 13)));
        let smallest_active = pairs
            .iter()
            .filter(|p| p.active)
            .map(|p| p.total_passengers())
            .fold(f64::INFINITY, f64::min);
        assert!(pairs
            .iter()
            .filter(|p| !p.active)
            .all(|p| p.total_passengers() <= smallest_active));
    }

    #[test]
    fn test_random_seed_one() {
        let (ptn, mut pairs) = grid25();
        activator(ActivatorKind::Random, 30)
            .activate(&mut pairs, &ptn, None)
            .unwrap();
        let first = active(&pairs);
        activator(ActivatorKind::Random, 30)
            .activate(&mut pairs, &ptn, None)
            .unwrap();
        assert_eq!(active(&pairs), first);
        assert_eq!(first.len(), 30);
        assert!(first.contains(&(3, 10)));
        assert!(first.contains(&(2, 13)));
        assert!(!first.contains(&(12, 13)));
        let all: HashSet<(i64, i64)> = pairs.iter().map(|p| (p.origin, p.destination)).collect();
        assert!(first.is_subset(&all));
    }

    #[test]
    fn test_too_many_and_all() {
        let (ptn, mut pairs) = grid25();
        let positive = pairs.iter().filter(|p| p.total_passengers() > 0.0).count();
        assert_eq!(
            activator(ActivatorKind::SmallestWeight, 100_000)
                .activate(&mut pairs, &ptn, None)
                .unwrap(),
            positive
        );
        assert_eq!(
            activator(ActivatorKind::LargestDistance, -1)
                .activate(&mut pairs, &ptn, None)
                .unwrap(),
            positive
        );
        assert!(activator(ActivatorKind::Diff, 3)
            .activate(&mut pairs, &ptn, None)
            .is_err());
    }

    #[test]
    fn test_largest_distance() {
        let (ptn, mut pairs) = grid25();
        activator(ActivatorKind::LargestDistance, 1)
            .activate(&mut pairs, &ptn, None)
            .unwrap();
        let (origin, destination) = active(&pairs).into_iter().next().unwrap();
        let distance = ptn
            .stop(origin)
            .unwrap()
            .squared_distance(ptn.stop(destination).unwrap());
        assert!(pairs.iter().all(|p| {
            ptn.stop(p.origin)
                .unwrap()
                .squared_distance(ptn.stop(p.destination).unwrap())
                <= distance
        }));
    }
}
