use super::Edge;

/// What a path remembers of an edge. The edge itself stays owned by its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    pub id: i64,
    pub left: i64,
    pub right: i64,
    pub directed: bool,
}

impl EdgeRef {
    pub fn of(edge: &impl Edge) -> Self {
        EdgeRef {
            id: edge.id(),
            left: edge.left_node(),
            right: edge.right_node(),
            directed: edge.is_directed(),
        }
    }

    fn is_loop(&self) -> bool {
        self.left == self.right
    }
}

/// Ordered node and edge sequence with `nodes.len() == edges.len() + 1` unless empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    directed: bool,
    nodes: Vec<i64>,
    edges: Vec<EdgeRef>,
}

impl Path {
    pub fn new(directed: bool) -> Self {
        Path {
            directed,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// A path from a walk computed elsewhere, `nodes[i]` and `nodes[i + 1]` being the ends of
    /// `edges[i]`.
    pub(crate) fn from_walk(directed: bool, nodes: Vec<i64>, edges: Vec<EdgeRef>) -> Self {
        debug_assert!(edges.is_empty() || nodes.len() == edges.len() + 1);
        let nodes = if edges.is_empty() { Vec::new() } else { nodes };
        Path {
            directed,
            nodes,
            edges,
        }
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn nodes(&self) -> &[i64] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeRef] {
        &self.edges
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.edges.iter().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains_edge(&self, id: i64) -> bool {
        self.edges.iter().any(|e| e.id == id)
    }

    pub fn contains_node(&self, id: i64) -> bool {
        self.nodes.contains(&id)
    }

    /// The same edges walked in the opposite order.
    pub fn reversed(&self) -> Path {
        Path {
            directed: self.directed,
            nodes: self.nodes.iter().rev().copied().collect(),
            edges: self.edges.iter().rev().copied().collect(),
        }
    }

    /// The node reached when walking `edge` from `from`, if that is allowed.
    fn step(&self, edge: &EdgeRef, from: i64) -> Option<i64> {
        if edge.left == from {
            Some(edge.right)
        } else if edge.right == from && !self.directed && !edge.directed {
            Some(edge.left)
        } else {
            None
        }
    }

    /// The node reached when walking `edge` backwards into `to`.
    fn step_back(&self, edge: &EdgeRef, to: i64) -> Option<i64> {
        if edge.right == to {
            Some(edge.left)
        } else if edge.left == to && !self.directed && !edge.directed {
            Some(edge.right)
        } else {
            None
        }
    }

    fn first_edge_flippable(&self) -> bool {
        self.edges.len() == 1 && !self.directed && !self.edges[0].directed
    }

    pub fn add_last_edge(&mut self, edge: &impl Edge) -> bool {
        self.push_last(EdgeRef::of(edge))
    }

    fn push_last(&mut self, edge: EdgeRef) -> bool {
        if self.contains_edge(edge.id) {
            return false;
        }
        if self.edges.is_empty() {
            self.nodes = vec![edge.left, edge.right];
            self.edges.push(edge);
            return true;
        }
        let last = *self.nodes.last().unwrap_or(&edge.left);
        if let Some(next) = self.step(&edge, last) {
            self.nodes.push(next);
            self.edges.push(edge);
            return true;
        }
        if self.first_edge_flippable() {
            if let Some(next) = self.step(&edge, self.nodes[0]) {
                self.nodes.reverse();
                self.nodes.push(next);
                self.edges.push(edge);
                return true;
            }
        }
        false
    }

    pub fn add_first_edge(&mut self, edge: &impl Edge) -> bool {
        self.push_first(EdgeRef::of(edge))
    }

    fn push_first(&mut self, edge: EdgeRef) -> bool {
        if self.contains_edge(edge.id) {
            return false;
        }
        if self.edges.is_empty() {
            self.nodes = vec![edge.left, edge.right];
            self.edges.push(edge);
            return true;
        }
        if let Some(previous) = self.step_back(&edge, self.nodes[0]) {
            self.nodes.insert(0, previous);
            self.edges.insert(0, edge);
            return true;
        }
        if self.first_edge_flippable() {
            let last = self.nodes[1];
            if let Some(previous) = self.step_back(&edge, last) {
                self.nodes.reverse();
                self.nodes.insert(0, previous);
                self.edges.insert(0, edge);
                return true;
            }
        }
        false
    }

    /// Appends all edges or none of them.
    pub fn add_last<'a, E: Edge + 'a>(&mut self, edges: impl IntoIterator<Item = &'a E>) -> bool {
        let snapshot = (self.nodes.clone(), self.edges.clone());
        for edge in edges {
            if !self.add_last_edge(edge) {
                (self.nodes, self.edges) = snapshot;
                return false;
            }
        }
        true
    }

    /// Prepends all edges, keeping their order, or none of them.
    pub fn add_first<'a, E: Edge + 'a>(&mut self, edges: impl IntoIterator<Item = &'a E>) -> bool {
        let snapshot = (self.nodes.clone(), self.edges.clone());
        let edges: Vec<&E> = edges.into_iter().collect();
        for edge in edges.into_iter().rev() {
            if !self.add_first_edge(edge) {
                (self.nodes, self.edges) = snapshot;
                return false;
            }
        }
        true
    }

    /// Removes the edge if it is the first or last one, or a loop.
    pub fn remove_edge(&mut self, id: i64) -> bool {
        let Some(position) = self.edges.iter().position(|e| e.id == id) else {
            return false;
        };
        if position == 0 {
            self.edges.remove(0);
            self.nodes.remove(0);
        } else if position == self.edges.len() - 1 {
            self.edges.pop();
            self.nodes.pop();
        } else if self.edges[position].is_loop() {
            self.edges.remove(position);
            self.nodes.remove(position + 1);
        } else {
            return false;
        }
        if self.edges.is_empty() {
            self.nodes.clear();
        }
        true
    }

    /// Removes a prefix or suffix given by its edge ids in path order.
    pub fn remove(&mut self, ids: &[i64]) -> bool {
        if ids.is_empty() {
            return true;
        }
        if ids.len() > self.edges.len() {
            return false;
        }
        let own: Vec<i64> = self.edge_ids().collect();
        if own[..ids.len()] == *ids {
            self.edges.drain(..ids.len());
            self.nodes.drain(..ids.len());
        } else if own[own.len() - ids.len()..] == *ids {
            self.edges.truncate(own.len() - ids.len());
            self.nodes.truncate(self.edges.len() + 1);
        } else {
            return false;
        }
        if self.edges.is_empty() {
            self.nodes.clear();
        }
        true
    }

    /// Whether the edges of `other` appear consecutively in this path, in either direction for
    /// undirected paths.
    pub fn contains(&self, other: &Path) -> bool {
        if other.is_empty() {
            return true;
        }
        let own: Vec<i64> = self.edge_ids().collect();
        let sub: Vec<i64> = other.edge_ids().collect();
        if own.windows(sub.len()).any(|w| w == sub.as_slice()) {
            return true;
        }
        if self.directed {
            return false;
        }
        let reversed: Vec<i64> = sub.iter().rev().copied().collect();
        own.windows(sub.len()).any(|w| w == reversed.as_slice())
    }
}
