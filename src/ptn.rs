use crate::col::{map_new, HashMap};
use crate::error::{Error, Result};
use crate::graph::{Edge, Graph, IdKeyedGraph, Node};

#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: i64,
    pub short_name: String,
    pub long_name: String,
    pub x: f64,
    pub y: f64,
}

impl Stop {
    pub fn new(id: i64, short_name: &str, long_name: &str, x: f64, y: f64) -> Self {
        Stop {
            id,
            short_name: short_name.into(),
            long_name: long_name.into(),
            x,
            y,
        }
    }

    pub fn squared_distance(&self, other: &Stop) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }
}

impl Node for Stop {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: i64,
    pub left: i64,
    pub right: i64,
    pub length: f64,
    pub lower_bound: i64,
    pub upper_bound: i64,
    pub directed: bool,
    pub load: f64,
    pub lower_frequency: i64,
    pub upper_frequency: i64,
}

impl Link {
    pub fn new(
        id: i64,
        left: i64,
        right: i64,
        length: f64,
        lower_bound: i64,
        upper_bound: i64,
        directed: bool,
    ) -> Self {
        Link {
            id,
            left,
            right,
            length,
            lower_bound,
            upper_bound,
            directed,
            load: 0.0,
            lower_frequency: 0,
            upper_frequency: i64::MAX,
        }
    }

    /// The same link with negated id and swapped endpoints.
    pub fn backward(&self) -> Link {
        Link {
            id: -self.id,
            left: self.right,
            right: self.left,
            ..self.clone()
        }
    }
}

impl Edge for Link {
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

/// The physical network. Every undirected link `l` has a synthesized backward link `-l`.
#[derive(Debug, Clone, Default)]
pub struct Ptn {
    graph: IdKeyedGraph<Stop, Link>,
    backward: HashMap<i64, Link>,
}

impl Ptn {
    pub fn new() -> Self {
        Ptn {
            graph: IdKeyedGraph::new(),
            backward: map_new(),
        }
    }

    pub fn graph(&self) -> &IdKeyedGraph<Stop, Link> {
        &self.graph
    }

    pub fn add_stop(&mut self, stop: Stop) -> Result<()> {
        let id = stop.id;
        if !self.graph.add_node(stop)? {
            return Err(Error::GraphNodeIdMultiplyAssigned(id));
        }
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> Result<()> {
        let id = link.id;
        let backward = (!link.directed).then(|| link.backward());
        if !self.graph.add_edge(link)? {
            return Err(Error::GraphEdgeIdMultiplyAssigned(id));
        }
        if let Some(backward) = backward {
            self.backward.insert(id, backward);
        }
        Ok(())
    }

    pub fn stops(&self) -> &[Stop] {
        self.graph.node_slice()
    }

    pub fn links(&self) -> &[Link] {
        self.graph.edge_slice()
    }

    pub fn stop(&self, id: i64) -> Result<&Stop> {
        self.graph
            .node(id)
            .ok_or(Error::DataIndexNotFound { kind: "stop", index: id })
    }

    /// Resolves forward ids and the negative ids of backward links.
    pub fn link(&self, id: i64) -> Result<&Link> {
        let link = if id < 0 {
            self.backward.get(&-id)
        } else {
            self.graph.edge(id)
        };
        link.ok_or(Error::DataIndexNotFound { kind: "link", index: id })
    }

    /// Sets load and frequency bounds of a link and its backward link.
    pub fn set_load(&mut self, id: i64, load: f64, lower_frequency: i64, upper_frequency: i64) -> Result<()> {
        let link = self
            .graph
            .edge_mut(id)
            .ok_or(Error::DataIndexNotFound { kind: "link", index: id })?;
        link.load = load;
        link.lower_frequency = lower_frequency;
        link.upper_frequency = upper_frequency;
        if let Some(backward) = self.backward.get_mut(&id) {
            backward.load = load;
            backward.lower_frequency = lower_frequency;
            backward.upper_frequency = upper_frequency;
        }
        Ok(())
    }

    pub fn backward_link(&self, id: i64) -> Option<&Link> {
        self.backward.get(&id)
    }

    /// The forward link a backward link was synthesized from.
    pub fn forward_link(&self, backward_id: i64) -> Option<&Link> {
        if backward_id < 0 && self.backward.contains_key(&-backward_id) {
            self.graph.edge(-backward_id)
        } else {
            None
        }
    }

    pub fn is_directed(&self) -> bool {
        self.graph.is_directed()
    }

    /// Links connecting `left` and `right` in this direction, backward links included.
    pub fn links_between(&self, left: i64, right: i64) -> Vec<&Link> {
        self.graph
            .incident_edges(left)
            .into_iter()
            .filter_map(|link| {
                if link.left == left && link.right == right {
                    Some(link)
                } else if link.right == left && link.left == right && !link.directed {
                    self.backward.get(&link.id)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_links() {
        let mut ptn = Ptn::new();
        ptn.add_stop(Stop::new(1, "A", "Alpha", 0.0, 0.0)).unwrap();
        ptn.add_stop(Stop::new(2, "B", "Beta", 3.0, 4.0)).unwrap();
        ptn.add_stop(Stop::new(3, "C", "Gamma", 0.0, 1.0)).unwrap();
        ptn.add_link(Link::new(1, 1, 2, 5.0, 2, 4, false)).unwrap();
        ptn.add_link(Link::new(2, 2, 3, 1.0, 1, 1, true)).unwrap();

        let backward = ptn.link(-1).unwrap();
        assert_eq!((backward.left, backward.right), (2, 1));
        assert_eq!(ptn.forward_link(-1).unwrap().id, 1);
        assert!(ptn.backward_link(2).is_none());
        assert!(ptn.link(-2).is_err());
        assert_eq!(ptn.links_between(2, 1)[0].id, -1);
        assert!(ptn.links_between(3, 2).is_empty());
        assert_eq!(ptn.stop(1).unwrap().squared_distance(ptn.stop(2).unwrap()), 25.0);
        assert!(ptn.is_directed());
    }

    #[test]
    fn test_duplicate_ids() {
        let mut ptn = Ptn::new();
        ptn.add_stop(Stop::new(1, "A", "A", 0.0, 0.0)).unwrap();
        assert_eq!(
            ptn.add_stop(Stop::new(1, "A", "A", 0.0, 0.0)).unwrap_err(),
            Error::GraphNodeIdMultiplyAssigned(1)
        );
        ptn.add_stop(Stop::new(2, "B", "B", 0.0, 0.0)).unwrap();
        ptn.add_link(Link::new(1, 1, 2, 1.0, 1, 1, false)).unwrap();
        assert_eq!(
            ptn.add_link(Link::new(1, 2, 1, 1.0, 1, 1, false)).unwrap_err(),
            Error::GraphEdgeIdMultiplyAssigned(1)
        );
        assert!(matches!(
            ptn.add_link(Link::new(5, 1, 9, 1.0, 1, 1, false)),
            Err(Error::GraphIncidentNodeNotFound { edge: 5, node: 9 })
        ));
    }
}
