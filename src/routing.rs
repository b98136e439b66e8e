use itertools::Itertools;
use log::{debug, warn};

use crate::col::{map_new, HashMap};
use crate::ean::{ActivityType, Ean, EventType, PeriodicActivity, PeriodicEvent};
use crate::error::Result;
use crate::graph::{Graph, SparseGraph};
use crate::od::{Od, OdPair};
use crate::shortest_path::dijkstra::Dijkstra;

/// Which activity bound is used as travel time of drive and wait activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

/// A shortest passenger path through the EAN, without the virtual activities.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub origin: i64,
    pub destination: i64,
    pub activities: Vec<i64>,
    pub length: f64,
    pub transfers: usize,
}

fn travel_time(activity: &PeriodicActivity, bound: Bound, change_penalty: f64) -> f64 {
    match (activity.activity_type, bound) {
        (ActivityType::Virtual, _) => 0.0,
        (ActivityType::Change, _) => activity.lower_bound as f64 + change_penalty,
        (ActivityType::Drive | ActivityType::Wait, Bound::Upper) => activity.upper_bound as f64,
        _ => activity.lower_bound as f64,
    }
}

/// Shortest routes for the given `(origin, destination)` stop pairs.
///
/// One Dijkstra run per origin on a copy of the EAN extended by a virtual source event feeding
/// the departures at the origin and a virtual target event per destination collecting its
/// arrivals. Unreachable pairs yield `None`.
pub fn shortest_routes(
    ean: &Ean,
    pairs: &[(i64, i64)],
    bound: Bound,
    change_penalty: f64,
) -> Result<Vec<Option<Route>>> {
    let mut graph = SparseGraph::from_graph(ean)?;
    let mut next_event = ean.node_slice().iter().map(|e| e.id).max().unwrap_or(0) + 1;
    let mut next_activity = ean.edge_slice().iter().map(|a| a.id).max().unwrap_or(0) + 1;

    let mut departures_at: HashMap<i64, Vec<i64>> = map_new();
    let mut arrivals_at: HashMap<i64, Vec<i64>> = map_new();
    for event in ean.node_slice() {
        match event.event_type {
            EventType::Departure => departures_at.entry(event.stop_id).or_default().push(event.id),
            EventType::Arrival => arrivals_at.entry(event.stop_id).or_default().push(event.id),
            _ => {}
        }
    }

    let mut routes = vec![None; pairs.len()];
    let by_origin = pairs
        .iter()
        .enumerate()
        .into_group_map_by(|&(_, pair)| pair.0);
    for origin in by_origin.keys().copied().sorted() {
        let mut virtual_activity = |graph: &mut SparseGraph<PeriodicEvent, PeriodicActivity>,
                                    left: i64,
                                    right: i64|
         -> Result<()> {
            graph.add_edge(PeriodicActivity::new(
                next_activity,
                ActivityType::Virtual,
                left,
                right,
                0,
                0,
                0.0,
            )?)?;
            next_activity += 1;
            Ok(())
        };

        let source = next_event;
        graph.add_node(PeriodicEvent::virtual_event(source, origin))?;
        for &departure in departures_at.get(&origin).map(Vec::as_slice).unwrap_or(&[]) {
            virtual_activity(&mut graph, source, departure)?;
        }
        let mut targets = Vec::new();
        for &(position, &(_, destination)) in &by_origin[&origin] {
            let target = source + 1 + targets.len() as i64;
            graph.add_node(PeriodicEvent::virtual_event(target, destination))?;
            for &arrival in arrivals_at.get(&destination).map(Vec::as_slice).unwrap_or(&[]) {
                virtual_activity(&mut graph, arrival, target)?;
            }
            targets.push((position, target));
        }
        next_event = source + 1 + targets.len() as i64;

        let mut dijkstra = Dijkstra::new(&graph, source, |a: &PeriodicActivity| {
            travel_time(a, bound, change_penalty)
        })?;
        dijkstra.compute_shortest_paths();
        for &(position, target) in &targets {
            if !dijkstra.reached(target) {
                continue;
            }
            let path = dijkstra.path(target)?;
            let activities: Vec<i64> = path
                .edge_ids()
                .filter(|id| {
                    graph
                        .edge(*id)
                        .is_some_and(|a| a.activity_type != ActivityType::Virtual)
                })
                .collect();
            let transfers = activities
                .iter()
                .filter(|id| {
                    graph
                        .edge(**id)
                        .is_some_and(|a| a.activity_type == ActivityType::Change)
                })
                .count();
            let (origin, destination) = pairs[position];
            routes[position] = Some(Route {
                origin,
                destination,
                activities,
                length: dijkstra.distance(target)?,
                transfers,
            });
        }

        remove_virtual_events(
            &mut graph,
            std::iter::once(source).chain(targets.into_iter().map(|(_, target)| target)),
        );
    }
    debug!(
        "Routed {} of {} od pairs",
        routes.iter().filter(|r| r.is_some()).count(),
        pairs.len()
    );
    Ok(routes)
}

/// Drops the virtual events of one origin with their activities and closes the slots they
/// leave, so the copy does not grow with the number of origins.
fn remove_virtual_events(
    graph: &mut SparseGraph<PeriodicEvent, PeriodicActivity>,
    events: impl IntoIterator<Item = i64>,
) {
    for event in events {
        graph.remove_node(event);
    }
    graph.compact();
}

/// Adds the demand of every od pair onto the activities and events of its shortest route.
pub fn route_passengers(ean: &mut Ean, od: &impl Od, change_penalty: f64) -> Result<()> {
    for event in ean.nodes_mut() {
        event.passengers = 0.0;
    }
    for activity in ean.edges_mut() {
        activity.passengers = 0.0;
    }
    let od_pairs = od.od_pairs();
    let pairs: Vec<(i64, i64)> = od_pairs
        .iter()
        .map(|p| (p.origin, p.destination))
        .collect();
    let routes = shortest_routes(ean, &pairs, Bound::Lower, change_penalty)?;
    for (pair, route) in od_pairs.iter().zip(routes) {
        let Some(route) = route else {
            warn!(
                "No route from {} to {}, {} passengers are not routed",
                pair.origin,
                pair.destination,
                pair.total_passengers()
            );
            continue;
        };
        let value = pair.total_passengers();
        let mut events = Vec::with_capacity(route.activities.len() + 1);
        for id in route.activities {
            let Some(activity) = ean.edge_mut(id) else {
                continue;
            };
            activity.passengers += value;
            if events.is_empty() {
                events.push(activity.left);
            }
            events.push(activity.right);
        }
        for id in events {
            if let Some(event) = ean.node_mut(id) {
                event.passengers += value;
            }
        }
    }
    Ok(())
}

/// Fills `transfer_in_shortest_paths` and `diff_bounds_sp` of the od pairs, comparing the
/// routes on lower and upper bounds.
pub fn annotate_od_pairs(ean: &Ean, od_pairs: &mut [OdPair], change_penalty: f64) -> Result<()> {
    let pairs: Vec<(i64, i64)> = od_pairs
        .iter()
        .map(|p| (p.origin, p.destination))
        .collect();
    let lower = shortest_routes(ean, &pairs, Bound::Lower, change_penalty)?;
    let upper = shortest_routes(ean, &pairs, Bound::Upper, change_penalty)?;
    for ((pair, lower), upper) in od_pairs.iter_mut().zip(lower).zip(upper) {
        if let (Some(lower), Some(upper)) = (lower, upper) {
            pair.transfer_in_shortest_paths = lower.transfers > 0;
            pair.diff_bounds_sp = upper.length - lower.length;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ean::LineDirection;
    use crate::od::SparseOd;

    /// Line 1 drives 1 -> 2 -> 3, line 2 drives 2 -> 4 with a change at stop 2.
    fn ean() -> Ean {
        let mut ean = Ean::new();
        let events = [
            (1, EventType::Departure, 1, 1),
            (2, EventType::Arrival, 2, 1),
            (3, EventType::Departure, 2, 1),
            (4, EventType::Arrival, 3, 1),
            (5, EventType::Departure, 2, 2),
            (6, EventType::Arrival, 4, 2),
        ];
        for (id, event_type, stop, line) in events {
            ean.add_node(PeriodicEvent::new(id, event_type, stop, line, LineDirection::Forward, 1))
                .unwrap();
        }
        let activities = [
            (1, ActivityType::Drive, 1, 2, 2, 5),
            (2, ActivityType::Wait, 2, 3, 1, 3),
            (3, ActivityType::Drive, 3, 4, 3, 4),
            (4, ActivityType::Change, 2, 5, 2, 11),
            (5, ActivityType::Drive, 5, 6, 4, 4),
        ];
        for (id, activity_type, left, right, lower, upper) in activities {
            ean.add_edge(PeriodicActivity::new(id, activity_type, left, right, lower, upper, 0.0).unwrap())
                .unwrap();
        }
        ean
    }

    #[test]
    fn test_shortest_routes() {
        let ean = ean();
        let routes = shortest_routes(&ean, &[(1, 3), (1, 4), (3, 1)], Bound::Lower, 5.0).unwrap();
        let direct = routes[0].as_ref().unwrap();
        assert_eq!(direct.activities, vec![1, 2, 3]);
        assert_eq!((direct.length, direct.transfers), (6.0, 0));
        let transfer = routes[1].as_ref().unwrap();
        assert_eq!(transfer.activities, vec![1, 4, 5]);
        assert_eq!((transfer.length, transfer.transfers), (13.0, 1));
        assert!(routes[2].is_none());

        let upper = shortest_routes(&ean, &[(1, 3)], Bound::Upper, 5.0).unwrap();
        assert_eq!(upper[0].as_ref().unwrap().length, 12.0);
    }

    #[test]
    fn test_virtual_events_leave_no_holes() {
        let ean = ean();
        let mut graph = SparseGraph::from_graph(&ean).unwrap();
        graph.add_node(PeriodicEvent::virtual_event(7, 1)).unwrap();
        graph.add_node(PeriodicEvent::virtual_event(8, 3)).unwrap();
        for (id, left, right) in [(6, 7, 1), (7, 4, 8)] {
            graph
                .add_edge(PeriodicActivity::new(id, ActivityType::Virtual, left, right, 0, 0, 0.0).unwrap())
                .unwrap();
        }
        remove_virtual_events(&mut graph, [7, 8]);
        assert_eq!(graph.num_holes(), 0);
        assert_eq!((graph.num_nodes(), graph.num_edges()), (6, 5));
        assert_eq!(graph.incident_edge_ids(1), &[1]);
        let ids: Vec<i64> = graph.edges().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_route_passengers() {
        let mut ean = ean();
        let mut od = SparseOd::new();
        od.set_value(1, 3, 2.0).unwrap();
        od.set_value(1, 4, 3.0).unwrap();
        route_passengers(&mut ean, &od, 0.0).unwrap();
        assert_eq!(ean.edge(1).unwrap().passengers, 5.0);
        assert_eq!(ean.edge(4).unwrap().passengers, 3.0);
        assert_eq!(ean.edge(3).unwrap().passengers, 2.0);
        assert_eq!(ean.node(2).unwrap().passengers, 5.0);
        assert_eq!(ean.node(6).unwrap().passengers, 3.0);
        assert_eq!(ean.num_nodes(), 6);
        assert_eq!(ean.num_edges(), 5);
    }

    #[test]
    fn test_annotate_od_pairs() {
        let ean = ean();
        let mut pairs = vec![OdPair::new(1, 3, 1.0), OdPair::new(1, 4, 1.0)];
        annotate_od_pairs(&ean, &mut pairs, 0.0).unwrap();
        assert!(!pairs[0].transfer_in_shortest_paths);
        assert_eq!(pairs[0].diff_bounds_sp, 6.0);
        assert!(pairs[1].transfer_in_shortest_paths);
        assert_eq!(pairs[1].diff_bounds_sp, 3.0);
    }
}
