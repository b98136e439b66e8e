use std::collections::BinaryHeap;
use std::marker::PhantomData;

use crate::{
    col::{map_new, set_new, HashMap, HashSet},
    error::{Error, Result},
    graph::{Edge, EdgeRef, Graph, Node, Path},
};

#[derive(Debug, Clone, PartialEq)]
struct QueueItem {
    node_id: i64,
    distance: f64,
}
impl Eq for QueueItem {}
impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

/// Single-source shortest paths for non-negative lengths given by a length function.
/// Nodes are settled lazily, so a query for one target stops as soon as it is reached.
pub struct Dijkstra<'a, N: Node, E: Edge, G: Graph<N, E>, L: Fn(&E) -> f64> {
    graph: &'a G,
    source: i64,
    length: L,
    distance: HashMap<i64, f64>,
    predecessor: HashMap<i64, i64>,
    settled: HashSet<i64>,
    queue: BinaryHeap<QueueItem>,
    exhausted: bool,
    phantom: PhantomData<(N, E)>,
}

impl<'a, N: Node, E: Edge, G: Graph<N, E>, L: Fn(&E) -> f64> Dijkstra<'a, N, E, G, L> {
    pub fn new(graph: &'a G, source: i64, length: L) -> Result<Self> {
        if graph.node(source).is_none() {
            return Err(Error::AlgorithmDijkstraUnknownNode(source));
        }
        for edge in graph.edges() {
            let edge_length = length(edge);
            if edge_length < 0.0 {
                return Err(Error::AlgorithmDijkstraNegativeEdgeLength {
                    edge: edge.id(),
                    length: edge_length,
                });
            }
        }
        let mut distance = map_new();
        distance.insert(source, 0.0);
        let mut queue = BinaryHeap::new();
        queue.push(QueueItem {
            node_id: source,
            distance: 0.0,
        });
        Ok(Dijkstra {
            graph,
            source,
            length,
            distance,
            predecessor: map_new(),
            settled: set_new(),
            queue,
            exhausted: false,
            phantom: PhantomData,
        })
    }

    pub fn source(&self) -> i64 {
        self.source
    }

    /// Settles the next node, returns `None` once every reachable node is settled.
    fn settle_next(&mut self) -> Option<i64> {
        let graph = self.graph;
        while let Some(QueueItem { node_id, distance }) = self.queue.pop() {
            if !self.settled.insert(node_id) {
                continue;
            }
            for edge in graph.outgoing_edges(node_id) {
                let Some(next) = edge.other_node(node_id) else {
                    continue;
                };
                if self.settled.contains(&next) {
                    continue;
                }
                let candidate = distance + (self.length)(edge);
                let improves = self
                    .distance
                    .get(&next)
                    .map_or(true, |&known| candidate < known);
                if improves {
                    self.distance.insert(next, candidate);
                    self.predecessor.insert(next, edge.id());
                    self.queue.push(QueueItem {
                        node_id: next,
                        distance: candidate,
                    });
                }
            }
            return Some(node_id);
        }
        self.exhausted = true;
        None
    }

    fn check_node(&self, node: i64) -> Result<()> {
        if self.graph.node(node).is_none() {
            return Err(Error::AlgorithmDijkstraUnknownNode(node));
        }
        Ok(())
    }

    /// Runs until `target` is settled and returns its distance.
    pub fn compute_shortest_path(&mut self, target: i64) -> Result<f64> {
        self.check_node(target)?;
        while !self.settled.contains(&target) {
            if self.settle_next().is_none() {
                return Err(Error::AlgorithmDijkstraNetworkNotConnected {
                    source_node: self.source,
                    target,
                });
            }
        }
        Ok(self.distance[&target])
    }

    /// Settles every node reachable from the source.
    pub fn compute_shortest_paths(&mut self) {
        while self.settle_next().is_some() {}
    }

    fn check_settled(&self, node: i64) -> Result<()> {
        self.check_node(node)?;
        if self.settled.contains(&node) {
            Ok(())
        } else if self.exhausted {
            Err(Error::AlgorithmDijkstraNetworkNotConnected {
                source_node: self.source,
                target: node,
            })
        } else {
            Err(Error::AlgorithmDijkstraQueryBeforeComputation(node))
        }
    }

    pub fn distance(&self, node: i64) -> Result<f64> {
        self.check_settled(node)?;
        Ok(self.distance[&node])
    }

    /// Whether `node` has been settled, i.e. is known to be reachable.
    pub fn reached(&self, node: i64) -> bool {
        self.settled.contains(&node)
    }

    pub fn path(&self, node: i64) -> Result<Path> {
        self.check_settled(node)?;
        let mut nodes = vec![node];
        let mut edges = Vec::new();
        let mut current = node;
        while current != self.source {
            let edge_id = self.predecessor[&current];
            let edge = self
                .graph
                .edge(edge_id)
                .ok_or(Error::DataIndexNotFound { kind: "edge", index: edge_id })?;
            current = if edge.is_directed() {
                edge.left_node()
            } else {
                edge.other_node(current).unwrap_or(current)
            };
            nodes.push(current);
            edges.push(EdgeRef::of(edge));
        }
        nodes.reverse();
        edges.reverse();
        Ok(Path::from_walk(self.graph.is_directed(), nodes, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ptn::{Link, Ptn, Stop};

    fn triangle(length_12: f64, length_32: f64) -> Ptn {
        let mut ptn = Ptn::new();
        for id in 1..=3 {
            ptn.add_stop(Stop::new(id, "", "", 0.0, 0.0)).unwrap();
        }
        ptn.add_link(Link::new(1, 1, 2, length_12, 1, 1, true)).unwrap();
        ptn.add_link(Link::new(2, 1, 3, 1.0, 1, 1, true)).unwrap();
        ptn.add_link(Link::new(3, 3, 2, length_32, 1, 1, true)).unwrap();
        ptn
    }

    #[test]
    fn test_simple() {
        let ptn = triangle(1.0, 1.0);
        let mut dijkstra = Dijkstra::new(ptn.graph(), 1, |l: &Link| l.length).unwrap();
        assert_eq!(dijkstra.compute_shortest_path(2).unwrap(), 1.0);
        let path = dijkstra.path(2).unwrap();
        assert_eq!(path.edge_ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(path.nodes(), &[1, 2]);
    }

    #[test]
    fn test_detour() {
        let ptn = triangle(3.0, 1.0);
        let mut dijkstra = Dijkstra::new(ptn.graph(), 1, |l: &Link| l.length).unwrap();
        dijkstra.compute_shortest_paths();
        assert_eq!(dijkstra.distance(2).unwrap(), 2.0);
        assert_eq!(dijkstra.distance(3).unwrap(), 1.0);
        let path = dijkstra.path(2).unwrap();
        assert_eq!(path.edge_ids().collect::<Vec<_>>(), vec![2, 3]);
        let along: f64 = path
            .edge_ids()
            .map(|id| ptn.link(id).unwrap().length)
            .sum();
        assert_eq!(along, dijkstra.distance(2).unwrap());
    }

    #[test]
    fn test_negative_length() {
        let ptn = triangle(1.0, -1.0);
        assert!(matches!(
            Dijkstra::new(ptn.graph(), 1, |l: &Link| l.length),
            Err(Error::AlgorithmDijkstraNegativeEdgeLength { edge: 3, .. })
        ));
    }

    #[test]
    fn test_query_errors() {
        let ptn = triangle(1.0, 1.0);
        let mut dijkstra = Dijkstra::new(ptn.graph(), 2, |l: &Link| l.length).unwrap();
        assert_eq!(
            dijkstra.distance(1).unwrap_err(),
            Error::AlgorithmDijkstraQueryBeforeComputation(1)
        );
        assert_eq!(
            dijkstra.compute_shortest_path(1).unwrap_err(),
            Error::AlgorithmDijkstraNetworkNotConnected {
                source_node: 2,
                target: 1
            }
        );
        assert!(matches!(
            dijkstra.path(1),
            Err(Error::AlgorithmDijkstraNetworkNotConnected { .. })
        ));
        assert_eq!(
            dijkstra.distance(9).unwrap_err(),
            Error::AlgorithmDijkstraUnknownNode(9)
        );
        assert!(Dijkstra::new(ptn.graph(), 9, |l: &Link| l.length).is_err());
    }

    #[test]
    fn test_undirected_walks_backwards() {
        let mut ptn = Ptn::new();
        for id in 1..=3 {
            ptn.add_stop(Stop::new(id, "", "", 0.0, 0.0)).unwrap();
        }
        ptn.add_link(Link::new(1, 2, 1, 2.0, 1, 1, false)).unwrap();
        ptn.add_link(Link::new(2, 3, 2, 2.0, 1, 1, false)).unwrap();
        let mut dijkstra = Dijkstra::new(ptn.graph(), 1, |l: &Link| l.length).unwrap();
        assert_eq!(dijkstra.compute_shortest_path(3).unwrap(), 4.0);
        assert_eq!(dijkstra.path(3).unwrap().nodes(), &[1, 2, 3]);
    }
}
