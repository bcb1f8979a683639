//! Defines the error types for graph validation and evaluation.
//!
//! Two kinds, with very different severities: a [`StructuralError`] means
//! the snapshot violates a graph invariant and the evaluation call is
//! aborted; a [`SettingsError`] is local to one node, surfaced so an editor
//! can highlight it, and only taints the subgraph downstream of that node.
//!
//! A failing grade is neither: `Value::Fail` is an ordinary computation
//! outcome.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// The graph violates an invariant the evaluator depends on. Always fatal
/// to the evaluation call; repair is an explicit caller-invoked step, never
/// automatic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("cycle detected among nodes reachable from a source node")]
    CycleDetected,
    #[error("graph has no sink node")]
    MissingSink,
    #[error("graph has {0} sink nodes, expected exactly one")]
    MultipleSinks(usize),
    #[error("edge references unknown node '{0}'")]
    UnknownNode(String),
    #[error("input handle '{handle}' on node '{node}' is bound by more than one edge")]
    DuplicateTargetBinding { node: String, handle: String },
    #[error("edge binds handle '{handle}' which does not exist on node '{node}'")]
    UnknownHandle { node: String, handle: String },
    #[error("edge leaves node '{node}' through handle '{handle}' whose input is no longer connected")]
    DanglingHandle { node: String, handle: String },
}

/// One node's settings are individually invalid. Collected per node in the
/// evaluation state; unrelated subgraphs keep evaluating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("node '{node}' has no settings but its variant requires them")]
    Missing { node: String },
    #[error("node '{node}' carries {found} settings, expected {expected}")]
    WrongShape {
        node: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("node '{node}' requires a point threshold but none is set")]
    MissingThreshold { node: String },
    #[error("average node '{node}': weight for handle '{handle}' is not finite")]
    NonFiniteWeight { node: String, handle: String },
    #[error("average node '{node}': percentage weights sum to {sum}, expected 100")]
    WeightSumNot100 { node: String, sum: f64 },
    #[error("stepper node '{node}': breakpoints must be strictly increasing")]
    BreakpointsNotIncreasing { node: String },
    #[error("stepper node '{node}': expected {expected} breakpoints, found {found}")]
    BreakpointCountMismatch {
        node: String,
        expected: usize,
        found: usize,
    },
    #[error("stepper node '{node}': expected {expected} output values, found {found}")]
    OutputCountMismatch {
        node: String,
        expected: usize,
        found: usize,
    },
    #[error("substitute node '{node}': no substitute value for exercise index {index}")]
    SubstituteValueMissing { node: String, index: usize },
}

impl SettingsError {
    /// The node the error should be attributed to in an editor.
    pub fn node_id(&self) -> &str {
        match self {
            SettingsError::Missing { node }
            | SettingsError::WrongShape { node, .. }
            | SettingsError::MissingThreshold { node }
            | SettingsError::NonFiniteWeight { node, .. }
            | SettingsError::WeightSumNot100 { node, .. }
            | SettingsError::BreakpointsNotIncreasing { node }
            | SettingsError::BreakpointCountMismatch { node, .. }
            | SettingsError::OutputCountMismatch { node, .. }
            | SettingsError::SubstituteValueMissing { node, .. } => node,
        }
    }
}

/// Serialized as `{ "node": ..., "message": ... }` so an editor can attach
/// the warning to the offending node without parsing the message text.
impl Serialize for SettingsError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("SettingsError", 2)?;
        st.serialize_field("node", self.node_id())?;
        st.serialize_field("message", &self.to_string())?;
        st.end()
    }
}
