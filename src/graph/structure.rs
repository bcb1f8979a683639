//! The `GraphStructure` snapshot handed to the evaluator, plus its
//! structural accessors. Pure data; mutation is gated externally by the
//! `validation` module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::edge::Edge;
use super::node::{NodeSettings, NodeType};

/// Visual position, carried through for the editor but never read by
/// computation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A typed computation unit in the grading graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default)]
    pub position: Position,
}

/// Title and settings attached to a node, keyed separately from the node
/// list in the persisted structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub title: String,
    #[serde(default)]
    pub settings: Option<NodeSettings>,
}

/// An immutable snapshot of one grading-model graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStructure {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub node_data: HashMap<String, NodeData>,
}

impl GraphStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_data(&self, id: &str) -> Option<&NodeData> {
        self.node_data.get(id)
    }

    /// All edges leaving `node`, in declaration order.
    pub fn output_edges_of<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == node)
    }

    /// The edge bound to `(node, handle)`, if any. At most one exists in a
    /// well-formed graph.
    pub fn input_edge_of(&self, node: &str, handle: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == node && e.resolved_target_handle() == handle)
    }

    pub fn sink(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeType::Sink)
    }

    pub fn source_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind == NodeType::Source)
    }

    /// Appends a node with its data entry. Convenience for callers building
    /// a structure programmatically; persistence normally deserializes the
    /// whole snapshot instead.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: NodeType,
        title: impl Into<String>,
        settings: Option<NodeSettings>,
    ) {
        let id = id.into();
        self.node_data.insert(
            id.clone(),
            NodeData {
                title: title.into(),
                settings,
            },
        );
        self.nodes.push(Node {
            id,
            kind,
            position: Position::default(),
        });
    }

    /// Appends an edge as-is. Run the candidate through
    /// [`is_valid_connection`](crate::validation::is_valid_connection)
    /// first; this method does not re-check.
    pub fn connect(
        &mut self,
        source: impl Into<String>,
        source_handle: Option<&str>,
        target: impl Into<String>,
        target_handle: Option<&str>,
    ) {
        self.edges
            .push(Edge::new(source, source_handle, target, target_handle));
    }
}
