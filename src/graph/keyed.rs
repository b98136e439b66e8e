use std::cmp::Ordering;

use crate::col::{map_new, HashMap};
use crate::error::{Error, Result};

use super::{Edge, Graph, Node};

/// Graph keyed by node and edge ids. Iteration follows insertion order, or the rank order after
/// [`Graph::order_nodes`] / [`Graph::order_edges`], which also reassign ids `1..=n`.
#[derive(Debug, Clone)]
pub struct IdKeyedGraph<N: Node, E: Edge> {
    nodes: Vec<N>,
    node_index: HashMap<i64, usize>,
    edges: Vec<E>,
    edge_index: HashMap<i64, usize>,
    incidence: HashMap<i64, Vec<i64>>,
}

impl<N: Node, E: Edge> Default for IdKeyedGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Node, E: Edge> IdKeyedGraph<N, E> {
    pub fn new() -> Self {
        IdKeyedGraph {
            nodes: Vec::new(),
            node_index: map_new(),
            edges: Vec::new(),
            edge_index: map_new(),
            incidence: map_new(),
        }
    }

    pub fn node_slice(&self) -> &[N] {
        &self.nodes
    }

    pub fn edge_slice(&self) -> &[E] {
        &self.edges
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut N> {
        self.nodes.iter_mut()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.edges.iter_mut()
    }

    fn rebuild_indices(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, n)| (n.id(), index))
            .collect();
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(index, e)| (e.id(), index))
            .collect();
        self.incidence = self.nodes.iter().map(|n| (n.id(), Vec::new())).collect();
        for e in &self.edges {
            self.incidence
                .entry(e.left_node())
                .or_default()
                .push(e.id());
            if e.right_node() != e.left_node() {
                self.incidence
                    .entry(e.right_node())
                    .or_default()
                    .push(e.id());
            }
        }
    }
}

impl<N: Node, E: Edge> Graph<N, E> for IdKeyedGraph<N, E> {
    fn add_node(&mut self, node: N) -> Result<bool> {
        if let Some(&index) = self.node_index.get(&node.id()) {
            if self.nodes[index] == node {
                return Ok(false);
            }
            return Err(Error::GraphNodeIdMultiplyAssigned(node.id()));
        }
        self.node_index.insert(node.id(), self.nodes.len());
        self.incidence.insert(node.id(), Vec::new());
        self.nodes.push(node);
        Ok(true)
    }

    fn add_edge(&mut self, edge: E) -> Result<bool> {
        for node in [edge.left_node(), edge.right_node()] {
            if !self.node_index.contains_key(&node) {
                return Err(Error::GraphIncidentNodeNotFound {
                    edge: edge.id(),
                    node,
                });
            }
        }
        if self.edge_index.contains_key(&edge.id()) {
            return Ok(false);
        }
        let (id, left, right) = (edge.id(), edge.left_node(), edge.right_node());
        self.edge_index.insert(id, self.edges.len());
        self.edges.push(edge);
        self.incidence.entry(left).or_default().push(id);
        if right != left {
            self.incidence.entry(right).or_default().push(id);
        }
        Ok(true)
    }

    fn remove_node(&mut self, id: i64) -> bool {
        let Some(&index) = self.node_index.get(&id) else {
            return false;
        };
        self.nodes.remove(index);
        self.edges
            .retain(|e| e.left_node() != id && e.right_node() != id);
        self.rebuild_indices();
        true
    }

    fn remove_edge(&mut self, id: i64) -> bool {
        let Some(&index) = self.edge_index.get(&id) else {
            return false;
        };
        let edge = self.edges.remove(index);
        for node in [edge.left_node(), edge.right_node()] {
            if let Some(incident) = self.incidence.get_mut(&node) {
                incident.retain(|&e| e != id);
            }
        }
        self.edge_index.remove(&id);
        for (position, e) in self.edges.iter().enumerate().skip(index) {
            self.edge_index.insert(e.id(), position);
        }
        true
    }

    fn node(&self, id: i64) -> Option<&N> {
        self.node_index.get(&id).map(|&index| &self.nodes[index])
    }

    fn node_mut(&mut self, id: i64) -> Option<&mut N> {
        self.node_index.get(&id).map(|&index| &mut self.nodes[index])
    }

    fn edge(&self, id: i64) -> Option<&E> {
        self.edge_index.get(&id).map(|&index| &self.edges[index])
    }

    fn edge_mut(&mut self, id: i64) -> Option<&mut E> {
        self.edge_index.get(&id).map(|&index| &mut self.edges[index])
    }

    fn nodes(&self) -> Vec<&N> {
        self.nodes.iter().collect()
    }

    fn edges(&self) -> Vec<&E> {
        self.edges.iter().collect()
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn incident_edge_ids(&self, node: i64) -> &[i64] {
        self.incidence.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    fn order_nodes(&mut self, compare: &mut dyn FnMut(&N, &N) -> Ordering) {
        self.nodes.sort_by(|a, b| compare(a, b));
        let mut new_id: HashMap<i64, i64> = map_new();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            new_id.insert(node.id(), index as i64 + 1);
            node.set_id(index as i64 + 1);
        }
        for edge in self.edges.iter_mut() {
            edge.set_nodes(new_id[&edge.left_node()], new_id[&edge.right_node()]);
        }
        self.rebuild_indices();
    }

    fn order_edges(&mut self, compare: &mut dyn FnMut(&E, &E) -> Ordering) {
        self.edges.sort_by(|a, b| compare(a, b));
        for (index, edge) in self.edges.iter_mut().enumerate() {
            edge.set_id(index as i64 + 1);
        }
        self.rebuild_indices();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{assert_consistent, edge, node, TestEdge, TestNode};

    fn sample() -> IdKeyedGraph<TestNode, TestEdge> {
        let mut graph = IdKeyedGraph::new();
        for (id, label) in [(3, "a"), (1, "c"), (2, "b")] {
            assert!(graph.add_node(node(id, label)).unwrap());
        }
        assert!(graph.add_edge(edge(10, 3, 1, true)).unwrap());
        assert!(graph.add_edge(edge(11, 1, 2, false)).unwrap());
        assert!(graph.add_edge(edge(12, 2, 3, true)).unwrap());
        graph
    }

    #[test]
    fn test_add_and_duplicates() {
        let mut graph = sample();
        assert_eq!(graph.num_nodes(), 3);
        assert!(!graph.add_node(node(1, "c")).unwrap());
        assert_eq!(
            graph.add_node(node(1, "other")).unwrap_err(),
            Error::GraphNodeIdMultiplyAssigned(1)
        );
        assert!(!graph.add_edge(edge(10, 1, 2, true)).unwrap());
        assert_eq!(
            graph.add_edge(edge(20, 1, 7, true)).unwrap_err(),
            Error::GraphIncidentNodeNotFound { edge: 20, node: 7 }
        );
        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.num_edges(), 3);
        assert_consistent(&graph);
    }

    #[test]
    fn test_incidence() {
        let graph = sample();
        let ids = |edges: Vec<&TestEdge>| edges.iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(graph.incident_edges(1)), vec![10, 11]);
        assert_eq!(ids(graph.outgoing_edges(1)), vec![11]);
        assert_eq!(ids(graph.incoming_edges(1)), vec![10, 11]);
        assert!(graph.is_directed());
        assert_eq!(graph.node_by(&mut |n| n.label == "b").unwrap().id, 2);
    }

    #[test]
    fn test_remove_cascades() {
        let mut graph = sample();
        assert!(graph.remove_node(1));
        assert!(!graph.remove_node(1));
        assert_eq!(graph.num_edges(), 1);
        assert_eq!(graph.edges()[0].id, 12);
        assert!(graph.remove_edge(12));
        assert!(graph.incident_edges(2).is_empty());
        assert_consistent(&graph);
    }

    #[test]
    fn test_order_reassigns_ids() {
        let mut graph = sample();
        graph.order_nodes(&mut |a, b| a.label.cmp(b.label));
        let labels: Vec<_> = graph.nodes().iter().map(|n| (n.id, n.label)).collect();
        assert_eq!(labels, vec![(1, "a"), (2, "b"), (3, "c")]);
        // edge 10 connected a -> c
        let e = graph.edge(10).unwrap();
        assert_eq!((e.left, e.right), (1, 3));
        assert_consistent(&graph);

        graph.order_edges(&mut |a, b| b.left.cmp(&a.left));
        let order: Vec<_> = graph.edges().iter().map(|e| (e.id, e.left, e.right)).collect();
        assert_eq!(order, vec![(1, 3, 2), (2, 2, 1), (3, 1, 3)]);

        let before: Vec<_> = graph.edges().iter().map(|e| (e.left, e.right)).collect();
        graph.order_edges(&mut |a, b| b.left.cmp(&a.left));
        let after: Vec<_> = graph.edges().iter().map(|e| (e.left, e.right)).collect();
        assert_eq!(before, after);
        assert_consistent(&graph);
    }
}
