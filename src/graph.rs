//! Change graphs
//!
//! A [`Graph`] records observed transitions between values, such as the
//! successive versions of one file. Nodes live in an arena; node 0 is the
//! synthetic start node and carries no value. Value nodes are found by a
//! caller-supplied equality, so the same value observed in several sequences
//! maps to one node and the graph may contain cycles (a file restored to an
//! earlier version). [`Graph::to_acyclic`] unrolls those cycles for display.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type GraphNodeId = usize;

type Equality<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
struct GraphNode<T> {
    value: Option<T>,
    /// Ordered, without duplicates
    successors: Vec<GraphNodeId>,
}

pub struct Graph<T> {
    nodes: Vec<GraphNode<T>>,
    eq: Equality<T>,
}

impl<T: PartialEq + 'static> Graph<T> {
    pub fn new() -> Self {
        Self::with_eq(|a: &T, b: &T| a == b)
    }
}

impl<T: PartialEq + 'static> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Graph<T> {
    pub const START: GraphNodeId = 0;

    pub fn with_eq(eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            nodes: vec![GraphNode {
                value: None,
                successors: Vec::new(),
            }],
            eq: Arc::new(eq),
        }
    }

    /// Number of value nodes (the start node is not counted)
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value of a node; `None` for the start node or an unknown id
    pub fn value(&self, id: GraphNodeId) -> Option<&T> {
        self.nodes.get(id).and_then(|n| n.value.as_ref())
    }

    pub fn successors(&self, id: GraphNodeId) -> &[GraphNodeId] {
        self.nodes
            .get(id)
            .map(|n| n.successors.as_slice())
            .unwrap_or(&[])
    }

    /// Value nodes in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = GraphNodeId> {
        1..self.nodes.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter().filter_map(|n| n.value.as_ref())
    }

    /// First value node equal to `value`
    pub fn find(&self, value: &T) -> Option<GraphNodeId> {
        self.node_ids()
            .find(|&id| self.value(id).map_or(false, |v| (self.eq)(v, value)))
    }

    fn push_node(&mut self, value: T) -> GraphNodeId {
        self.nodes.push(GraphNode {
            value: Some(value),
            successors: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn node_for(&mut self, value: T) -> GraphNodeId {
        match self.find(&value) {
            Some(id) => id,
            None => self.push_node(value),
        }
    }

    fn link(&mut self, from: GraphNodeId, to: GraphNodeId) {
        let successors = &mut self.nodes[from].successors;
        if !successors.contains(&to) {
            successors.push(to);
        }
    }

    pub fn add_edge(&mut self, from: T, to: T) {
        let from = self.node_for(from);
        let to = self.node_for(to);
        self.link(from, to);
    }

    pub fn add_edge_from_start(&mut self, to: T) {
        let to = self.node_for(to);
        self.link(Self::START, to);
    }
}

impl<T: Clone> Graph<T> {
    /// Unroll cycles by depth-first traversal from the start node.
    ///
    /// Nodes reached again off the current path are shared. An edge back into
    /// the current path is redirected to a fresh copy of its target, and that
    /// copy gets no successors, so `0 -> 1 -> 2 -> 1` becomes the four nodes
    /// `0, 1, 2, 1`.
    pub fn to_acyclic(&self) -> Graph<T> {
        let mut out = Graph {
            nodes: vec![GraphNode {
                value: None,
                successors: Vec::new(),
            }],
            eq: self.eq.clone(),
        };
        let mut mapped: HashMap<GraphNodeId, GraphNodeId> = HashMap::new();
        let mut on_path = vec![false; self.nodes.len()];
        mapped.insert(Self::START, Self::START);

        // explicit stack of (original node, copy, next successor position)
        let mut stack: Vec<(GraphNodeId, GraphNodeId, usize)> = vec![(Self::START, Self::START, 0)];
        on_path[Self::START] = true;
        while let Some(frame) = stack.last_mut() {
            let (original, copy, position) = *frame;
            let Some(&next) = self.nodes[original].successors.get(position) else {
                on_path[original] = false;
                stack.pop();
                continue;
            };
            frame.2 += 1;

            if on_path[next] {
                let value = self.nodes[next].value.clone();
                let clone = match value {
                    Some(value) => out.push_node(value),
                    // an edge back to the start cannot be drawn as a value
                    None => continue,
                };
                out.link(copy, clone);
            } else if let Some(&existing) = mapped.get(&next) {
                out.link(copy, existing);
            } else {
                let value = self.nodes[next].value.clone();
                let Some(value) = value else { continue };
                let created = out.push_node(value);
                mapped.insert(next, created);
                out.link(copy, created);
                on_path[next] = true;
                stack.push((next, created, 0));
            }
        }
        out
    }
}

impl<T: Clone> Clone for Graph<T> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            eq: self.eq.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Graph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph").field("nodes", &self.nodes).finish()
    }
}
