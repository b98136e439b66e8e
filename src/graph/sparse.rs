use std::cmp::Ordering;

use crate::col::{map_new, HashMap};
use crate::error::{Error, Result};

use super::{Edge, Graph, Node};

/// Graph on dense slot arrays. Removal leaves holes until [`SparseGraph::compact`] or one of the
/// ordering operations runs. Ids are never reassigned.
#[derive(Debug, Clone)]
pub struct SparseGraph<N: Node, E: Edge> {
    nodes: Vec<Option<N>>,
    node_slot: HashMap<i64, usize>,
    edges: Vec<Option<E>>,
    edge_slot: HashMap<i64, usize>,
    incidence: HashMap<i64, Vec<i64>>,
}

impl<N: Node, E: Edge> Default for SparseGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Node, E: Edge> SparseGraph<N, E> {
    pub fn new() -> Self {
        SparseGraph {
            nodes: Vec::new(),
            node_slot: map_new(),
            edges: Vec::new(),
            edge_slot: map_new(),
            incidence: map_new(),
        }
    }

    /// Copies nodes and edges of another graph, keeping its iteration order.
    pub fn from_graph(graph: &impl Graph<N, E>) -> Result<Self> {
        let mut sparse = Self::new();
        for node in graph.nodes() {
            sparse.add_node(node.clone())?;
        }
        for edge in graph.edges() {
            sparse.add_edge(edge.clone())?;
        }
        Ok(sparse)
    }

    pub fn num_holes(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_none()).count()
            + self.edges.iter().filter(|e| e.is_none()).count()
    }

    /// Removes the holes left by removals.
    pub fn compact(&mut self) {
        self.nodes.retain(Option::is_some);
        self.edges.retain(Option::is_some);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.node_slot = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, n)| n.as_ref().map(|n| (n.id(), slot)))
            .collect();
        self.edge_slot = self
            .edges
            .iter()
            .enumerate()
            .filter_map(|(slot, e)| e.as_ref().map(|e| (e.id(), slot)))
            .collect();
        // Incident edges follow the edge order.
        let edge_slot = &self.edge_slot;
        for incident in self.incidence.values_mut() {
            incident.sort_by_key(|id| edge_slot.get(id).copied().unwrap_or(usize::MAX));
        }
    }
}

impl<N: Node, E: Edge> Graph<N, E> for SparseGraph<N, E> {
    fn add_node(&mut self, node: N) -> Result<bool> {
        if self.node_slot.contains_key(&node.id()) {
            return Ok(false);
        }
        self.node_slot.insert(node.id(), self.nodes.len());
        self.incidence.insert(node.id(), Vec::new());
        self.nodes.push(Some(node));
        Ok(true)
    }

    fn add_edge(&mut self, edge: E) -> Result<bool> {
        for node in [edge.left_node(), edge.right_node()] {
            if !self.node_slot.contains_key(&node) {
                return Err(Error::GraphIncidentNodeNotFound {
                    edge: edge.id(),
                    node,
                });
            }
        }
        if self.edge_slot.contains_key(&edge.id()) {
            return Ok(false);
        }
        let (id, left, right) = (edge.id(), edge.left_node(), edge.right_node());
        self.edge_slot.insert(id, self.edges.len());
        self.edges.push(Some(edge));
        self.incidence.entry(left).or_default().push(id);
        if right != left {
            self.incidence.entry(right).or_default().push(id);
        }
        Ok(true)
    }

    fn remove_node(&mut self, id: i64) -> bool {
        let Some(slot) = self.node_slot.remove(&id) else {
            return false;
        };
        self.nodes[slot] = None;
        for edge in self.incidence.remove(&id).unwrap_or_default() {
            self.remove_edge(edge);
        }
        true
    }

    fn remove_edge(&mut self, id: i64) -> bool {
        let Some(slot) = self.edge_slot.remove(&id) else {
            return false;
        };
        if let Some(edge) = self.edges[slot].take() {
            for node in [edge.left_node(), edge.right_node()] {
                if let Some(incident) = self.incidence.get_mut(&node) {
                    incident.retain(|&e| e != id);
                }
            }
        }
        true
    }

    fn node(&self, id: i64) -> Option<&N> {
        self.node_slot
            .get(&id)
            .and_then(|&slot| self.nodes[slot].as_ref())
    }

    fn node_mut(&mut self, id: i64) -> Option<&mut N> {
        self.node_slot
            .get(&id)
            .and_then(|&slot| self.nodes[slot].as_mut())
    }

    fn edge(&self, id: i64) -> Option<&E> {
        self.edge_slot
            .get(&id)
            .and_then(|&slot| self.edges[slot].as_ref())
    }

    fn edge_mut(&mut self, id: i64) -> Option<&mut E> {
        self.edge_slot
            .get(&id)
            .and_then(|&slot| self.edges[slot].as_mut())
    }

    fn nodes(&self) -> Vec<&N> {
        self.nodes.iter().flatten().collect()
    }

    fn edges(&self) -> Vec<&E> {
        self.edges.iter().flatten().collect()
    }

    fn num_nodes(&self) -> usize {
        self.node_slot.len()
    }

    fn num_edges(&self) -> usize {
        self.edge_slot.len()
    }

    fn incident_edge_ids(&self, node: i64) -> &[i64] {
        self.incidence.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    fn order_nodes(&mut self, compare: &mut dyn FnMut(&N, &N) -> Ordering) {
        self.nodes.retain(Option::is_some);
        self.nodes.sort_by(|a, b| match (a, b) {
            (Some(a), Some(b)) => compare(a, b),
            _ => Ordering::Equal,
        });
        self.reindex();
    }

    fn order_edges(&mut self, compare: &mut dyn FnMut(&E, &E) -> Ordering) {
        self.edges.retain(Option::is_some);
        self.edges.sort_by(|a, b| match (a, b) {
            (Some(a), Some(b)) => compare(a, b),
            _ => Ordering::Equal,
        });
        self.reindex();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{assert_consistent, edge, node, TestEdge, TestNode};

    fn sample() -> SparseGraph<TestNode, TestEdge> {
        let mut graph = SparseGraph::new();
        for (id, label) in [(5, "x"), (7, "y"), (9, "z")] {
            assert!(graph.add_node(node(id, label)).unwrap());
        }
        assert!(graph.add_edge(edge(1, 5, 7, false)).unwrap());
        assert!(graph.add_edge(edge(2, 7, 9, false)).unwrap());
        assert!(graph.add_edge(edge(3, 9, 5, false)).unwrap());
        graph
    }

    #[test]
    fn test_duplicates_return_false() {
        let mut graph = sample();
        assert!(!graph.add_node(node(5, "other")).unwrap());
        assert!(!graph.add_edge(edge(1, 7, 9, false)).unwrap());
        assert!(graph.add_edge(edge(4, 5, 8, false)).is_err());
        assert!(!graph.is_directed());
        assert_eq!(graph.outgoing_edges(5).len(), 2);
        assert_eq!(graph.incoming_edges(5).len(), 2);
    }

    #[test]
    fn test_holes_and_compact() {
        let mut graph = sample();
        assert!(graph.remove_node(7));
        assert_eq!(graph.num_nodes(), 2);
        assert_eq!(graph.num_edges(), 1);
        assert_eq!(graph.num_holes(), 3);
        assert!(graph.edge(1).is_none());
        assert_consistent(&graph);

        graph.compact();
        assert_eq!(graph.num_holes(), 0);
        let ids: Vec<_> = graph.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![5, 9]);
        assert_eq!(graph.edge(3).unwrap().left, 9);
        assert_consistent(&graph);
    }

    #[test]
    fn test_order_keeps_ids() {
        let mut graph = sample();
        graph.remove_edge(2);
        graph.order_nodes(&mut |a, b| b.label.cmp(a.label));
        let ids: Vec<_> = graph.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![9, 7, 5]);
        graph.order_edges(&mut |a, b| b.id.cmp(&a.id));
        let ids: Vec<_> = graph.edges().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(graph.num_holes(), 0);
        assert_consistent(&graph);
    }

    #[test]
    fn test_order_edges_reorders_incidence() {
        let mut graph = sample();
        assert_eq!(graph.incident_edge_ids(5), &[1, 3]);
        graph.order_edges(&mut |a, b| b.id.cmp(&a.id));
        assert_eq!(graph.incident_edge_ids(5), &[3, 1]);
        assert_eq!(graph.incident_edge_ids(7), &[2, 1]);
        let outgoing: Vec<_> = graph.outgoing_edges(9).iter().map(|e| e.id).collect();
        assert_eq!(outgoing, vec![3, 2]);

        graph.order_edges(&mut |a, b| a.id.cmp(&b.id));
        assert_eq!(graph.incident_edge_ids(9), &[2, 3]);
    }

    #[test]
    fn test_copy_from_keyed() {
        let mut keyed = crate::graph::IdKeyedGraph::new();
        keyed.add_node(node(2, "b")).unwrap();
        keyed.add_node(node(1, "a")).unwrap();
        keyed.add_edge(edge(8, 2, 1, true)).unwrap();
        let sparse: SparseGraph<TestNode, TestEdge> = SparseGraph::from_graph(&keyed).unwrap();
        let ids: Vec<_> = sparse.nodes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(sparse.is_directed());
    }
}
