//! The per-pass evaluation state: node outputs keyed by node id, rebuilt
//! fresh for every snapshot and never mutated across passes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::graph::{mirrored_input_handle, Edge};
use crate::validation::SettingsError;

/// The runtime output of a node: a finite number of points, or the `Fail`
/// sentinel meaning "did not meet a requirement".
///
/// `Fail` is not a number and never takes part in arithmetic; every node
/// rule states explicitly what it does with a failed input. It is also not
/// an error: a student failing a course is an ordinary, expected outcome.
///
/// Serializes as a JSON number or the string `"fail"`, matching the
/// persisted shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Fail,
}

impl Value {
    pub fn is_fail(self) -> bool {
        matches!(self, Value::Fail)
    }

    pub fn as_number(self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n),
            Value::Fail => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Fail => serializer.serialize_str("fail"),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or the string \"fail\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
                Ok(Value::Number(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Number(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
                Ok(Value::Number(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
                if v == "fail" {
                    Ok(Value::Fail)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// What a node emitted during one pass.
///
/// Most variants have a single aggregate output; Require and Substitute
/// emit one value per retained input handle, keyed by the mirrored input
/// handle id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeOutput {
    Single(Value),
    PerHandle(BTreeMap<String, Value>),
}

/// One node's slot in the evaluation state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeEntry {
    pub output: NodeOutput,
    /// The node raised the whole-graph fail condition during this pass.
    pub course_fail: bool,
    /// The node sits downstream of a node with invalid settings; its
    /// output was forced to `Fail`.
    pub tainted: bool,
    /// Input handles bound during this pass, in binding order.
    pub connected: SmallVec<[String; 4]>,
}

impl NodeEntry {
    /// Resolves the value an edge leaving this node carries. Passthrough
    /// outputs are looked up by their mirrored input handle; a handle the
    /// node did not emit reads as `Fail`.
    pub fn value_for_edge(&self, edge: &Edge) -> Value {
        match &self.output {
            NodeOutput::Single(v) => *v,
            NodeOutput::PerHandle(values) => edge
                .resolved_source_handle()
                .and_then(mirrored_input_handle)
                .and_then(|handle| values.get(handle).copied())
                .unwrap_or(Value::Fail),
        }
    }
}

/// The result of one evaluation pass over one graph snapshot.
///
/// Only nodes actually evaluated appear; nodes unreachable from the source
/// side of the graph leave no entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationState {
    entries: HashMap<String, NodeEntry>,
    /// Derived summary: some node raised the whole-graph fail condition.
    pub course_fail: bool,
    /// Per-node settings problems found during the pass. Non-fatal; the
    /// offending nodes and their downstream evaluated to `Fail`.
    pub warnings: Vec<SettingsError>,
}

impl EvaluationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node_id: String, entry: NodeEntry) {
        self.entries.insert(node_id, entry);
    }

    pub fn entry(&self, node_id: &str) -> Option<&NodeEntry> {
        self.entries.get(node_id)
    }

    /// The aggregate value of a single-output node.
    pub fn value_of(&self, node_id: &str) -> Option<Value> {
        match &self.entries.get(node_id)?.output {
            NodeOutput::Single(v) => Some(*v),
            NodeOutput::PerHandle(_) => None,
        }
    }

    /// The value a passthrough node emitted for one of its handles.
    pub fn value_on(&self, node_id: &str, input_handle: &str) -> Option<Value> {
        match &self.entries.get(node_id)?.output {
            NodeOutput::Single(_) => None,
            NodeOutput::PerHandle(values) => values.get(input_handle).copied(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
