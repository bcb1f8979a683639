//! The connection gate: decides whether a candidate edge may be committed.
//!
//! Called by the editor before accepting a user-drawn edge, so every check
//! is against the edge set as it exists now. Pure predicate, no side
//! effects.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::Edge;

/// Returns whether `candidate` may be added to `edges`.
///
/// Rejected when any of these holds:
/// - the candidate is a self-loop;
/// - the candidate's target handle is already bound (with an unset handle,
///   any existing edge into the target node counts as the binding);
/// - an identical `(source, source handle, target)` edge already exists;
/// - the candidate would close a cycle, i.e. the candidate's source is
///   forward-reachable from its target.
pub fn is_valid_connection(candidate: &Edge, edges: &[Edge]) -> bool {
    if candidate.source == candidate.target {
        return false;
    }

    for edge in edges {
        match candidate.target_handle.as_deref() {
            None if edge.target == candidate.target => return false,
            Some(handle)
                if edge.target == candidate.target
                    && edge.target_handle.as_deref() == Some(handle) =>
            {
                return false;
            }
            _ => {}
        }
        if edge.source == candidate.source
            && edge.source_handle == candidate.source_handle
            && edge.target == candidate.target
        {
            return false;
        }
    }

    !creates_cycle(candidate, edges)
}

/// Forward reachability search from the candidate's target. Iterative on
/// purpose: user-authored graphs can chain deep enough that a recursive
/// walk risks the stack.
fn creates_cycle(candidate: &Edge, edges: &[Edge]) -> bool {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        outgoing
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([candidate.target.as_str()]);
    while let Some(node) = queue.pop_front() {
        if node == candidate.source {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(targets) = outgoing.get(node) {
            queue.extend(targets.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str) -> Edge {
        Edge::new(
            source,
            Some(&format!("{source}-source")),
            target,
            Some(&format!("{target}-0")),
        )
    }

    #[test]
    fn rejects_self_loop() {
        assert!(!is_valid_connection(&edge("a", "a"), &[]));
    }

    #[test]
    fn rejects_already_bound_target_handle() {
        let existing = vec![edge("a", "c")];
        // Same handle, different source.
        assert!(!is_valid_connection(&edge("b", "c"), &existing));
        // Different handle on the same node is fine.
        let other_handle = Edge::new("b", Some("b-source"), "c", Some("c-1"));
        assert!(is_valid_connection(&other_handle, &existing));
    }

    #[test]
    fn unset_target_handle_blocks_on_any_existing_edge() {
        let existing = vec![edge("a", "c")];
        let node_level = Edge::new("b", Some("b-source"), "c", None);
        assert!(!is_valid_connection(&node_level, &existing));
    }

    #[test]
    fn rejects_duplicate_parallel_edge() {
        let existing = vec![Edge::new("a", Some("a-source"), "c", Some("c-0"))];
        let parallel = Edge::new("a", Some("a-source"), "c", Some("c-1"));
        assert!(!is_valid_connection(&parallel, &existing));
    }

    #[test]
    fn rejects_edge_closing_a_cycle() {
        // a -> b -> c; connecting c back to a would close the loop.
        let existing = vec![edge("a", "b"), edge("b", "c")];
        assert!(!is_valid_connection(&edge("c", "a"), &existing));
        // The other direction is still fine.
        let forward = Edge::new("a", Some("a-source"), "c", Some("c-1"));
        assert!(is_valid_connection(&forward, &existing));
    }

    #[test]
    fn rejects_cycle_through_a_longer_path() {
        let existing = vec![
            edge("a", "b"),
            edge("b", "c"),
            edge("c", "d"),
            edge("d", "e"),
        ];
        // A free handle, so only the reachability check can reject it.
        let closing = Edge::new("e", Some("e-source"), "b", Some("b-1"));
        assert!(!is_valid_connection(&closing, &existing));
    }

    #[test]
    fn accepts_a_plain_new_connection() {
        let existing = vec![edge("a", "b")];
        assert!(is_valid_connection(&edge("a", "c"), &existing));
    }
}
