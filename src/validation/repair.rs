//! Consistency repair for passthrough nodes after structural deletions.
//!
//! Require and Substitute nodes expose one input/output handle pair per
//! connected predecessor. Deleting a predecessor (or its edge) leaves the
//! mirrored output edges referencing handles that no longer exist; those
//! edges must be pruned before the next evaluation pass reads stale handle
//! bindings.

use std::collections::HashSet;

use crate::graph::{mirrored_input_handle, Edge, GraphStructure};

/// Computes the set of edges left dangling on Require/Substitute
/// passthrough outputs. The caller removes them from the structure and
/// re-runs evaluation; this function does not mutate anything.
pub fn find_disconnected_edges(graph: &GraphStructure) -> Vec<Edge> {
    let passthrough: HashSet<&str> = graph
        .nodes
        .iter()
        .filter(|n| n.kind.is_passthrough())
        .map(|n| n.id.as_str())
        .collect();

    // Rebuild the connected-set from the live edges; any handle the
    // bookkeeping remembers but no edge targets is gone.
    let mut connected: HashSet<(&str, &str)> = HashSet::new();
    for edge in &graph.edges {
        if passthrough.contains(edge.target.as_str()) {
            connected.insert((edge.target.as_str(), edge.resolved_target_handle()));
        }
    }

    let mut disconnected = Vec::new();
    for edge in &graph.edges {
        if !passthrough.contains(edge.source.as_str()) {
            continue;
        }
        let mirrored = edge
            .resolved_source_handle()
            .and_then(mirrored_input_handle);
        let alive = match mirrored {
            Some(handle) => connected.contains(&(edge.source.as_str(), handle)),
            // Passthrough nodes have no node-level output handle.
            None => false,
        };
        if !alive {
            disconnected.push(edge.clone());
        }
    }
    disconnected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;

    /// source-1 and source-2 feed a require node whose two passthrough
    /// outputs feed an addition node.
    fn require_graph() -> GraphStructure {
        let mut graph = GraphStructure::new();
        graph.add_node("source-1", NodeType::Source, "Exam", None);
        graph.add_node("source-2", NodeType::Source, "Project", None);
        graph.add_node("req", NodeType::Require, "Require", None);
        graph.add_node("add", NodeType::Addition, "Addition", None);
        graph.connect("source-1", Some("source-1-source"), "req", Some("req-0"));
        graph.connect("source-2", Some("source-2-source"), "req", Some("req-1"));
        graph.connect("req", Some("req-0-source"), "add", Some("add-0"));
        graph.connect("req", Some("req-1-source"), "add", Some("add-1"));
        graph
    }

    #[test]
    fn intact_graph_reports_nothing() {
        assert!(find_disconnected_edges(&require_graph()).is_empty());
    }

    #[test]
    fn removing_a_predecessor_edge_orphans_the_mirror() {
        let mut graph = require_graph();
        // Drop the source-2 -> req edge; req-1 no longer exists.
        graph.edges.retain(|e| e.source != "source-2");

        let bad = find_disconnected_edges(&graph);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].source_handle.as_deref(), Some("req-1-source"));

        // After the caller prunes it, the structure is consistent again.
        graph.edges.retain(|e| !bad.contains(e));
        assert!(find_disconnected_edges(&graph).is_empty());
    }

    #[test]
    fn deleting_a_node_orphans_all_its_mirrors() {
        let mut graph = require_graph();
        graph.nodes.retain(|n| n.id != "source-1" && n.id != "source-2");
        graph
            .edges
            .retain(|e| e.source != "source-1" && e.source != "source-2");

        let bad = find_disconnected_edges(&graph);
        assert_eq!(bad.len(), 2);
        assert!(bad.iter().all(|e| e.source == "req"));
    }

    #[test]
    fn non_passthrough_sources_are_ignored() {
        let mut graph = GraphStructure::new();
        graph.add_node("avg", NodeType::Average, "Average", None);
        graph.add_node("final", NodeType::Sink, "Final grade", None);
        // Average has a single aggregate output; nothing to mirror.
        graph.connect("avg", Some("avg-source"), "final", None);
        assert!(find_disconnected_edges(&graph).is_empty());
    }
}
