//! Defines the closed set of node variants and their per-variant settings.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The variant tag of a node in the grading graph.
///
/// This is a closed set: every variant has exactly one evaluation rule in
/// `computation::rules`, and the settings it may carry are fixed by the
/// variant (see [`NodeSettings`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Leaf node injecting one student's raw attainment points.
    Source,
    /// Terminal node whose value is the final course grade.
    Sink,
    Addition,
    Average,
    Max,
    /// Threshold gate: passes its input through unless it is below a
    /// configured minimum.
    MinPoints,
    /// Gate counting failed inputs; passes everything through 1:1 while the
    /// count stays within the configured allowance.
    Require,
    Round,
    /// Maps a continuous input into one of a fixed set of output buckets.
    Stepper,
    /// Replaces failed exercise inputs with configured substitution values,
    /// consuming substitute slots in order.
    Substitute,
}

impl NodeType {
    /// Require and Substitute expose one output handle per retained input
    /// handle instead of a single aggregate output.
    pub fn is_passthrough(self) -> bool {
        matches!(self, NodeType::Require | NodeType::Substitute)
    }

    /// Variants that grow a fresh input handle per connection.
    pub fn has_dynamic_inputs(self) -> bool {
        matches!(
            self,
            NodeType::Addition
                | NodeType::Average
                | NodeType::Max
                | NodeType::Require
                | NodeType::Substitute
        )
    }

    /// Variants with exactly one input handle, named after the node itself.
    pub fn has_single_input(self) -> bool {
        matches!(
            self,
            NodeType::MinPoints | NodeType::Round | NodeType::Stepper | NodeType::Sink
        )
    }
}

/// What happens when a threshold or requirement is not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailSetting {
    /// The node itself outputs [`Value::Fail`](crate::computation::Value::Fail).
    #[serde(rename = "fail")]
    Fail,
    /// The student fails the whole course regardless of other branches.
    /// The original data persisted both spellings.
    #[serde(rename = "coursefail", alias = "fullfail")]
    CourseFail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rounding {
    #[serde(rename = "round-up")]
    Up,
    #[serde(rename = "round-closest")]
    Closest,
    #[serde(rename = "round-down")]
    Down,
}

/// One entry of a Stepper's output table: either a fixed value or the
/// keyword `"same"`, meaning "emit the input unchanged for this bucket".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepperOutput {
    Fixed(f64),
    Same,
}

impl Serialize for StepperOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StepperOutput::Fixed(v) => serializer.serialize_f64(*v),
            StepperOutput::Same => serializer.serialize_str("same"),
        }
    }
}

impl<'de> Deserialize<'de> for StepperOutput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OutputVisitor;

        impl<'de> Visitor<'de> for OutputVisitor {
            type Value = StepperOutput;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or the string \"same\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<StepperOutput, E> {
                Ok(StepperOutput::Fixed(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<StepperOutput, E> {
                Ok(StepperOutput::Fixed(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<StepperOutput, E> {
                Ok(StepperOutput::Fixed(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<StepperOutput, E> {
                if v == "same" {
                    Ok(StepperOutput::Same)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(OutputVisitor)
    }
}

/// Shared settings shape for Source and MinPoints nodes.
///
/// The two are identical on the wire; Source nodes may leave the threshold
/// unset, MinPoints nodes must not (checked at evaluation time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThresholdSettings {
    pub min_points: Option<f64>,
    pub on_fail_setting: FailSetting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AverageSettings {
    /// Weight per input handle id. Inputs without a defined weight are
    /// ignored by the average.
    pub weights: HashMap<String, f64>,
    /// Display/validation affectation only: weights are meant to sum to
    /// 100. The formula still normalizes by the actual weight sum.
    #[serde(default)]
    pub percentage_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MaxSettings {
    /// Floor constant included in the maximum regardless of inputs.
    pub min_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequireSettings {
    /// Number of failed inputs tolerated before the gate trips.
    pub num_fail: usize,
    pub on_fail_setting: FailSetting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoundSettings {
    pub rounding_setting: Rounding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepperSettings {
    pub num_steps: usize,
    /// One output per bucket, `num_steps` in total.
    pub output_values: Vec<StepperOutput>,
    /// `num_steps - 1` strictly increasing breakpoints. The bucket for an
    /// input `x` is the smallest `i` with `x <= middle_points[i]`.
    pub middle_points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubstituteSettings {
    pub max_substitutions: usize,
    /// Replacement value per exercise handle, in exercise handle order.
    pub substitute_values: Vec<f64>,
}

/// Variant-specific settings, persisted as a bare JSON object.
///
/// The shapes are mutually disjoint field-wise (`deny_unknown_fields` on
/// every struct), so an untagged union deserializes unambiguously; Source
/// and MinPoints deliberately share [`ThresholdSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeSettings {
    Average(AverageSettings),
    Threshold(ThresholdSettings),
    Max(MaxSettings),
    Require(RequireSettings),
    Round(RoundSettings),
    Stepper(StepperSettings),
    Substitute(SubstituteSettings),
}

impl NodeSettings {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeSettings::Average(_) => "average",
            NodeSettings::Threshold(_) => "threshold",
            NodeSettings::Max(_) => "max",
            NodeSettings::Require(_) => "require",
            NodeSettings::Round(_) => "round",
            NodeSettings::Stepper(_) => "stepper",
            NodeSettings::Substitute(_) => "substitute",
        }
    }
}
