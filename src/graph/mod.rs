use std::cmp::Ordering;
use std::fmt::Debug;

use crate::error::Result;

pub mod keyed;
pub mod path;
pub mod sparse;

pub use keyed::IdKeyedGraph;
pub use path::{EdgeRef, Path};
pub use sparse::SparseGraph;

pub trait Node: Clone + Debug + PartialEq {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

/// An edge refers to its endpoints by node id, the graph owns the nodes.
pub trait Edge: Clone + Debug + PartialEq {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn left_node(&self) -> i64;
    fn right_node(&self) -> i64;
    fn set_nodes(&mut self, left: i64, right: i64);
    fn is_directed(&self) -> bool;

    /// The endpoint that is not `node`, if `node` is an endpoint at all.
    fn other_node(&self, node: i64) -> Option<i64> {
        if self.left_node() == node {
            Some(self.right_node())
        } else if self.right_node() == node {
            Some(self.left_node())
        } else {
            None
        }
    }
}

pub trait Graph<N: Node, E: Edge> {
    /// Returns `false` if an equal node is already present.
    fn add_node(&mut self, node: N) -> Result<bool>;

    /// Fails if an endpoint is missing. Returns `false` for a duplicate edge.
    fn add_edge(&mut self, edge: E) -> Result<bool>;

    /// Removes the node and all incident edges.
    fn remove_node(&mut self, id: i64) -> bool;

    fn remove_edge(&mut self, id: i64) -> bool;

    fn node(&self, id: i64) -> Option<&N>;
    fn node_mut(&mut self, id: i64) -> Option<&mut N>;
    fn edge(&self, id: i64) -> Option<&E>;
    fn edge_mut(&mut self, id: i64) -> Option<&mut E>;

    fn nodes(&self) -> Vec<&N>;
    fn edges(&self) -> Vec<&E>;
    fn num_nodes(&self) -> usize;
    fn num_edges(&self) -> usize;

    /// Edge ids incident to `node`, in edge iteration order.
    fn incident_edge_ids(&self, node: i64) -> &[i64];

    /// Stable sort of the nodes by `compare`.
    fn order_nodes(&mut self, compare: &mut dyn FnMut(&N, &N) -> Ordering);

    /// Stable sort of the edges by `compare`.
    fn order_edges(&mut self, compare: &mut dyn FnMut(&E, &E) -> Ordering);

    fn node_by(&self, predicate: &mut dyn FnMut(&N) -> bool) -> Option<&N> {
        self.nodes().into_iter().find(|n| predicate(n))
    }

    fn edge_by(&self, predicate: &mut dyn FnMut(&E) -> bool) -> Option<&E> {
        self.edges().into_iter().find(|e| predicate(e))
    }

    fn incident_edges(&self, node: i64) -> Vec<&E> {
        self.incident_edge_ids(node)
            .iter()
            .filter_map(|&id| self.edge(id))
            .collect()
    }

    /// Edges leaving `node`. Undirected edges count in both directions.
    fn outgoing_edges(&self, node: i64) -> Vec<&E> {
        self.incident_edges(node)
            .into_iter()
            .filter(|e| e.left_node() == node || !e.is_directed())
            .collect()
    }

    fn incoming_edges(&self, node: i64) -> Vec<&E> {
        self.incident_edges(node)
            .into_iter()
            .filter(|e| e.right_node() == node || !e.is_directed())
            .collect()
    }

    fn is_directed(&self) -> bool {
        self.edges().iter().any(|e| e.is_directed())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct TestNode {
        pub id: i64,
        pub label: &'static str,
    }

    impl Node for TestNode {
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct TestEdge {
        pub id: i64,
        pub left: i64,
        pub right: i64,
        pub directed: bool,
    }

    impl Edge for TestEdge {
        fn id(&self) -> i64 {
            self.id
        }
        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
        fn left_node(&self) -> i64 {
            self.left
        }
        fn right_node(&self) -> i64 {
            self.right
        }
        fn set_nodes(&mut self, left: i64, right: i64) {
            self.left = left;
            self.right = right;
        }
        fn is_directed(&self) -> bool {
            self.directed
        }
    }

    pub fn node(id: i64, label: &'static str) -> TestNode {
        TestNode { id, label }
    }

    pub fn edge(id: i64, left: i64, right: i64, directed: bool) -> TestEdge {
        TestEdge {
            id,
            left,
            right,
            directed,
        }
    }

    /// Checks that every edge's endpoints are nodes of the graph and that incidence matches.
    pub fn assert_consistent<G: Graph<TestNode, TestEdge>>(graph: &G) {
        for e in graph.edges() {
            assert!(graph.node(e.left).is_some());
            assert!(graph.node(e.right).is_some());
            assert!(graph.incident_edge_ids(e.left).contains(&e.id));
            assert!(graph.incident_edge_ids(e.right).contains(&e.id));
        }
        for n in graph.nodes() {
            for &id in graph.incident_edge_ids(n.id) {
                let e = graph.edge(id).unwrap();
                assert!(e.left == n.id || e.right == n.id);
            }
        }
    }
}
