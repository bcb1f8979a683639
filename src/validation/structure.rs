//! The structural audit run before every evaluation pass.
//!
//! The evaluator rejects invalid snapshots instead of repairing them:
//! repair is an explicit caller step (`find_disconnected_edges`), and a
//! snapshot that still violates an invariant here is a caller bug, not a
//! grading outcome.

use std::collections::{HashMap, HashSet};

use super::error::StructuralError;
use crate::graph::{mirrored_input_handle, GraphStructure, NodeType};

/// Checks every invariant the propagator depends on, except acyclicity,
/// which the propagator itself detects as Kahn residue.
///
/// Verified here:
/// - exactly one Sink node exists;
/// - every edge references nodes present in the snapshot;
/// - no `(target, handle)` pair is bound by more than one edge;
/// - no edge targets a Source node, and edges into single-input nodes bind
///   the node-level handle;
/// - every Require/Substitute passthrough output mirrors an input handle
///   that is actually bound.
pub fn check_structure(graph: &GraphStructure) -> Result<(), StructuralError> {
    let sinks = graph
        .nodes
        .iter()
        .filter(|n| n.kind == NodeType::Sink)
        .count();
    match sinks {
        0 => return Err(StructuralError::MissingSink),
        1 => {}
        n => return Err(StructuralError::MultipleSinks(n)),
    }

    let kinds: HashMap<&str, NodeType> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.kind))
        .collect();

    let mut bound_inputs: HashSet<(&str, &str)> = HashSet::new();
    for edge in &graph.edges {
        if !kinds.contains_key(edge.source.as_str()) {
            return Err(StructuralError::UnknownNode(edge.source.clone()));
        }
        let Some(&target_kind) = kinds.get(edge.target.as_str()) else {
            return Err(StructuralError::UnknownNode(edge.target.clone()));
        };

        let handle = edge.resolved_target_handle();
        let single_input_only = target_kind.has_single_input();
        if target_kind == NodeType::Source || (single_input_only && handle != edge.target) {
            return Err(StructuralError::UnknownHandle {
                node: edge.target.clone(),
                handle: handle.to_owned(),
            });
        }

        if !bound_inputs.insert((edge.target.as_str(), handle)) {
            return Err(StructuralError::DuplicateTargetBinding {
                node: edge.target.clone(),
                handle: handle.to_owned(),
            });
        }
    }

    // Passthrough outputs must mirror a bound input handle. `bound_inputs`
    // is complete at this point.
    for edge in &graph.edges {
        if kinds
            .get(edge.source.as_str())
            .is_some_and(|k| k.is_passthrough())
        {
            let mirrored = edge
                .resolved_source_handle()
                .and_then(mirrored_input_handle);
            let alive = mirrored
                .is_some_and(|h| bound_inputs.contains(&(edge.source.as_str(), h)));
            if !alive {
                return Err(StructuralError::DanglingHandle {
                    node: edge.source.clone(),
                    handle: edge
                        .resolved_source_handle()
                        .unwrap_or_default()
                        .to_owned(),
                });
            }
        }
    }

    Ok(())
}
