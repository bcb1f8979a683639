//! Defines the `Edge` type and the handle-naming conventions edges rely on.
//!
//! Handles are named attachment points on a node. The conventions are part
//! of the persisted format and load-bearing for Require/Substitute nodes:
//!
//! - the node-level output handle of `n` is `"{n}-source"`;
//! - the node-level input handle of a single-input node is the node id
//!   itself (edges may leave `targetHandle` unset to mean this);
//! - a Require/Substitute passthrough output handle is its mirrored input
//!   handle plus the `-source` suffix;
//! - Substitute input handles carry an `exercise` or `substitute` marker as
//!   their second-to-last `-`-separated segment.

use serde::{Deserialize, Serialize};

/// A directed binding from one node's output handle to another node's input
/// handle. Edges are the only carriers of values between nodes.
///
/// Invariant (enforced by `validation`): a given `(target, target handle)`
/// pair is bound by at most one edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: String,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        source_handle: Option<&str>,
        target: impl Into<String>,
        target_handle: Option<&str>,
    ) -> Self {
        Self {
            source: source.into(),
            source_handle: source_handle.map(str::to_owned),
            target: target.into(),
            target_handle: target_handle.map(str::to_owned),
        }
    }

    /// The input handle this edge binds on its target; an unset handle
    /// resolves to the node-level input handle.
    pub fn resolved_target_handle(&self) -> &str {
        self.target_handle.as_deref().unwrap_or(&self.target)
    }

    /// The output handle this edge leaves from; an unset handle resolves to
    /// the node-level `"{source}-source"` handle, which has no mirror.
    pub fn resolved_source_handle(&self) -> Option<&str> {
        self.source_handle.as_deref()
    }
}

/// The node-level output handle id of `node_id`.
pub fn output_handle(node_id: &str) -> String {
    format!("{node_id}-source")
}

/// Recovers the input handle a passthrough output handle mirrors, i.e.
/// strips the `-source` suffix. Returns `None` for handles that are not
/// outputs at all.
pub fn mirrored_input_handle(source_handle: &str) -> Option<&str> {
    source_handle.strip_suffix("-source")
}

/// Classification of a Substitute node's input handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleRole {
    Exercise,
    Substitute,
}

/// Reads the role marker out of a Substitute input handle id. Handles
/// without a recognizable marker count as exercises, matching the original
/// data where only `substitute` was ever checked for.
pub fn handle_role(handle: &str) -> HandleRole {
    let mut segments = handle.rsplit('-');
    segments.next();
    match segments.next() {
        Some("substitute") => HandleRole::Substitute,
        _ => HandleRole::Exercise,
    }
}
