use std::collections::VecDeque;

use log::info;

use crate::col::{map_new, HashMap};
use crate::ean::{Ean, PeriodicActivity};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::indexer::Indexer;

/// One fundamental cycle: the non-tree activity with sign `+1` and the tree activities of the
/// tree path closing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub non_tree_activity: i64,
    pub entries: Vec<(i64, i8)>,
}

impl Cycle {
    /// Sum of the signed tensions, a multiple of the period for every feasible timetable.
    pub fn signed_sum(&self, tension: impl Fn(i64) -> i64) -> i64 {
        self.entries
            .iter()
            .map(|&(activity, sign)| sign as i64 * tension(activity))
            .sum()
    }
}

/// Spanning forest of the undirected view of an EAN and its fundamental cycles.
#[derive(Debug, Clone)]
pub struct CycleBase {
    tree_activities: Vec<i64>,
    cycles: Vec<Cycle>,
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut element: usize) -> usize {
        while self.parent[element] != element {
            self.parent[element] = self.parent[self.parent[element]];
            element = self.parent[element];
        }
        element
    }

    /// Returns `false` if both elements were already in the same set.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return false;
        }
        match self.rank[a].cmp(&self.rank[b]) {
            std::cmp::Ordering::Less => self.parent[a] = b,
            std::cmp::Ordering::Greater => self.parent[b] = a,
            std::cmp::Ordering::Equal => {
                self.parent[b] = a;
                self.rank[a] += 1;
            }
        }
        true
    }
}

impl CycleBase {
    /// Kruskal on the spans, ties broken by activity order, then one cycle per non-tree activity.
    pub fn compute(ean: &Ean) -> Self {
        let events = Indexer::from_ids(ean.node_slice().iter().map(|e| e.id));
        let mut activities: Vec<&PeriodicActivity> = ean.edge_slice().iter().collect();
        activities.sort_by_key(|a| a.span());

        let mut union_find = UnionFind::new(events.len());
        let mut tree_activities = Vec::new();
        let mut non_tree_activities = Vec::new();
        let mut tree_adjacency: HashMap<i64, Vec<&PeriodicActivity>> = map_new();
        for activity in activities {
            let (Some(left), Some(right)) = (events.get(activity.left), events.get(activity.right))
            else {
                continue;
            };
            if union_find.union(left, right) {
                tree_activities.push(activity.id);
                tree_adjacency.entry(activity.left).or_default().push(activity);
                tree_adjacency.entry(activity.right).or_default().push(activity);
            } else {
                non_tree_activities.push(activity);
            }
        }

        let forest = RootedForest::new(ean, &tree_adjacency);
        let cycles = non_tree_activities
            .iter()
            .map(|activity| Cycle {
                non_tree_activity: activity.id,
                entries: std::iter::once((activity.id, 1))
                    .chain(forest.return_walk(activity.right, activity.left))
                    .collect(),
            })
            .collect();

        CycleBase {
            tree_activities,
            cycles,
        }
    }

    pub fn tree_activities(&self) -> &[i64] {
        &self.tree_activities
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Network matrix entries `(non-tree activity, tree activity) -> sign`.
    pub fn network_matrix(&self) -> HashMap<(i64, i64), i8> {
        let mut matrix = map_new();
        for cycle in &self.cycles {
            for &(activity, sign) in cycle.entries.iter().skip(1) {
                matrix.insert((cycle.non_tree_activity, activity), sign);
            }
        }
        matrix
    }

    /// Event times from activity tensions: BFS along the tree from time 0 at the first event of
    /// each component, then every activity is checked against the result.
    pub fn decode_times(ean: &Ean, tree: &[i64], tension: &HashMap<i64, i64>, period: i64) -> Result<HashMap<i64, i64>> {
        let mut adjacency: HashMap<i64, Vec<&PeriodicActivity>> = map_new();
        for &id in tree {
            if let Some(activity) = ean.edge(id) {
                adjacency.entry(activity.left).or_default().push(activity);
                adjacency.entry(activity.right).or_default().push(activity);
            }
        }
        let mut times: HashMap<i64, i64> = map_new();
        for event in ean.node_slice() {
            if times.contains_key(&event.id) {
                continue;
            }
            times.insert(event.id, 0);
            let mut queue = VecDeque::from([event.id]);
            while let Some(current) = queue.pop_front() {
                let time = times[&current];
                for activity in adjacency.get(&current).map(Vec::as_slice).unwrap_or(&[]) {
                    let x = tension_of(tension, activity.id)?;
                    let (next, next_time) = if activity.left == current {
                        (activity.right, time + x)
                    } else {
                        (activity.left, time - x)
                    };
                    if !times.contains_key(&next) {
                        times.insert(next, next_time.rem_euclid(period));
                        queue.push_back(next);
                    }
                }
            }
        }
        for activity in ean.edge_slice() {
            let x = tension_of(tension, activity.id)?;
            if (times[&activity.right] - times[&activity.left] - x).rem_euclid(period) != 0 {
                return Err(Error::DataInconsistentTimetable(format!("activity {}", activity.id)));
            }
        }
        Ok(times)
    }
}

fn tension_of(tension: &HashMap<i64, i64>, activity: i64) -> Result<i64> {
    tension
        .get(&activity)
        .copied()
        .ok_or(Error::DataIndexNotFound { kind: "tension of activity", index: activity })
}

/// The spanning forest rooted at the first event of each component.
struct RootedForest<'a> {
    parent: HashMap<i64, &'a PeriodicActivity>,
    depth: HashMap<i64, usize>,
}

impl<'a> RootedForest<'a> {
    fn new(ean: &Ean, adjacency: &HashMap<i64, Vec<&'a PeriodicActivity>>) -> Self {
        let mut parent = map_new();
        let mut depth = map_new();
        for event in ean.node_slice() {
            if depth.contains_key(&event.id) {
                continue;
            }
            depth.insert(event.id, 0);
            let mut queue = VecDeque::from([event.id]);
            while let Some(current) = queue.pop_front() {
                for &activity in adjacency.get(&current).map(Vec::as_slice).unwrap_or(&[]) {
                    let next = if activity.left == current {
                        activity.right
                    } else {
                        activity.left
                    };
                    if !depth.contains_key(&next) {
                        depth.insert(next, depth[&current] + 1);
                        parent.insert(next, activity);
                        queue.push_back(next);
                    }
                }
            }
        }
        RootedForest { parent, depth }
    }

    fn up(&self, event: i64) -> (i64, &'a PeriodicActivity) {
        let activity = self.parent[&event];
        let next = if activity.left == event {
            activity.right
        } else {
            activity.left
        };
        (next, activity)
    }

    /// Signed tree activities walked from `from` to `to`: `+1` when walked in their direction.
    fn return_walk(&self, from: i64, to: i64) -> Vec<(i64, i8)> {
        let sign = |activity: &PeriodicActivity, walked_from: i64| -> i8 {
            if activity.left == walked_from {
                1
            } else {
                -1
            }
        };
        let (mut a, mut b) = (from, to);
        let mut head = Vec::new();
        let mut tail = Vec::new();
        while self.depth[&a] > self.depth[&b] {
            let (next, activity) = self.up(a);
            head.push((activity.id, sign(activity, a)));
            a = next;
        }
        while self.depth[&b] > self.depth[&a] {
            let (next, activity) = self.up(b);
            tail.push((activity.id, sign(activity, next)));
            b = next;
        }
        while a != b {
            let (next_a, activity_a) = self.up(a);
            head.push((activity_a.id, sign(activity_a, a)));
            a = next_a;
            let (next_b, activity_b) = self.up(b);
            tail.push((activity_b.id, sign(activity_b, next_b)));
            b = next_b;
        }
        head.extend(tail.into_iter().rev());
        head
    }
}

/// Drops activities with `span >= period - 1` and at most `passenger_cut` passengers. They
/// never restrict a periodic timetable. Returns the number of removed activities.
pub fn remove_light_activities(ean: &mut Ean, period: i64, passenger_cut: f64) -> usize {
    let light: Vec<(i64, f64)> = ean
        .edge_slice()
        .iter()
        .filter(|a| a.span() >= period - 1 && a.passengers <= passenger_cut)
        .map(|a| (a.id, a.passengers))
        .collect();
    let weight: f64 = light.iter().map(|(_, passengers)| passengers).sum();
    for (id, _) in &light {
        ean.remove_edge(*id);
    }
    info!(
        "Removed {} light activities with {} passengers in total, {} activities remain",
        light.len(),
        weight,
        ean.num_edges()
    );
    light.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::sample::{random_ean, small_pesp_ean};

    #[test]
    fn test_tree_and_cycles() {
        let ean = small_pesp_ean();
        let base = CycleBase::compute(&ean);
        assert_eq!(base.tree_activities(), &[5, 1, 3]);
        assert_eq!(base.cycles().len(), 2);
        assert_eq!(
            base.cycles()[0],
            Cycle {
                non_tree_activity: 2,
                entries: vec![(2, 1), (5, -1), (1, 1)],
            }
        );
        assert_eq!(
            base.cycles()[1],
            Cycle {
                non_tree_activity: 4,
                entries: vec![(4, 1), (5, 1), (3, 1)],
            }
        );
        let matrix = base.network_matrix();
        assert_eq!(matrix[&(2, 5)], -1);
        assert_eq!(matrix.len(), 4);
    }

    #[test]
    fn test_cycle_sums_are_multiples_of_the_period() {
        let ean = small_pesp_ean();
        let times: HashMap<i64, i64> = [(1, 7), (2, 0), (3, 9), (4, 3)].into_iter().collect();
        let tension = |id: i64| {
            let a = ean.edge(id).unwrap();
            (times[&a.right] - times[&a.left]).rem_euclid(10)
        };
        for cycle in CycleBase::compute(&ean).cycles() {
            assert_eq!(cycle.signed_sum(tension).rem_euclid(10), 0);
        }
    }

    #[test]
    fn test_decode_round_trip() {
        let ean = small_pesp_ean();
        let base = CycleBase::compute(&ean);
        let times: HashMap<i64, i64> = [(1, 0), (2, 4), (3, 9), (4, 2)].into_iter().collect();
        let tension: HashMap<i64, i64> = ean
            .edge_slice()
            .iter()
            .map(|a| (a.id, (times[&a.right] - times[&a.left]).rem_euclid(10)))
            .collect();
        let decoded = CycleBase::decode_times(&ean, base.tree_activities(), &tension, 10).unwrap();
        assert_eq!(decoded, times);

        let mut broken = tension.clone();
        broken.insert(2, tension[&2] + 1);
        assert!(matches!(
            CycleBase::decode_times(&ean, base.tree_activities(), &broken, 10),
            Err(Error::DataInconsistentTimetable(_))
        ));
    }

    #[test]
    fn test_random_networks() {
        for seed in 0..8 {
            let (ean, times) = random_ean(seed, 12, 30, 20);
            let base = CycleBase::compute(&ean);
            assert_eq!(base.tree_activities().len(), 11);
            assert_eq!(base.cycles().len(), 19);
            let tension: HashMap<i64, i64> = ean
                .edge_slice()
                .iter()
                .map(|a| (a.id, (times[&a.right] - times[&a.left]).rem_euclid(20)))
                .collect();
            for cycle in base.cycles() {
                assert_eq!(cycle.signed_sum(|id| tension[&id]).rem_euclid(20), 0);
            }
            let decoded = CycleBase::decode_times(&ean, base.tree_activities(), &tension, 20).unwrap();
            assert_eq!(decoded, times);
        }
    }

    #[test]
    fn test_remove_light_activities() {
        let mut ean = small_pesp_ean();
        assert_eq!(remove_light_activities(&mut ean, 10, 1.0), 1);
        assert!(ean.edge(4).is_none());
        assert_eq!(remove_light_activities(&mut ean, 10, 100.0), 1);
        assert!(ean.edge(2).is_none());
    }
}
