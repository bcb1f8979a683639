//! One pure evaluation rule per node variant.
//!
//! Every rule is a function of the node's settings and the values already
//! computed on its input handles; nothing here touches the graph or the
//! evaluation state. `Fail` handling is explicit per variant: aggregations
//! that exclude failed inputs say so, everything else states what a failed
//! input turns into.

use std::collections::BTreeMap;

use crate::computation::ledger::{NodeOutput, Value};
use crate::graph::{
    handle_role, AverageSettings, FailSetting, HandleRole, MaxSettings, Node, NodeData,
    NodeSettings, NodeType, RequireSettings, RoundSettings, Rounding, StepperOutput,
    StepperSettings, SubstituteSettings, ThresholdSettings,
};
use crate::validation::SettingsError;

/// Values on a node's bound input handles, in binding order. The handle id
/// is kept because Average weights and Substitute roles key off it.
pub type NodeInputs = [(String, Value)];

/// What one rule produced.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub output: NodeOutput,
    /// The node raised the whole-graph fail condition.
    pub course_fail: bool,
    /// Non-fatal settings complaint (evaluation still produced a value).
    pub warning: Option<SettingsError>,
}

impl NodeOutcome {
    fn single(value: Value) -> Self {
        Self {
            output: NodeOutput::Single(value),
            course_fail: false,
            warning: None,
        }
    }

    fn single_with_flag(value: Value, course_fail: bool) -> Self {
        Self {
            output: NodeOutput::Single(value),
            course_fail,
            warning: None,
        }
    }
}

/// Evaluates one node. `injected` carries the student's raw points for
/// Source nodes and is ignored elsewhere.
///
/// A `SettingsError` means the node could not be evaluated at all; the
/// caller records the warning and treats the node's outputs as `Fail`.
pub fn evaluate_node(
    node: &Node,
    data: Option<&NodeData>,
    inputs: &NodeInputs,
    injected: Option<f64>,
) -> Result<NodeOutcome, SettingsError> {
    let settings = data.and_then(|d| d.settings.as_ref());
    match node.kind {
        NodeType::Source => eval_source(node, settings, injected),
        NodeType::Sink => Ok(NodeOutcome::single(single_input(inputs))),
        NodeType::Addition => Ok(eval_addition(inputs)),
        NodeType::Average => eval_average(node, require_settings(node, settings)?, inputs),
        NodeType::Max => eval_max(node, require_settings(node, settings)?, inputs),
        NodeType::MinPoints => {
            eval_min_points(node, require_settings(node, settings)?, inputs)
        }
        NodeType::Require => eval_require(node, require_settings(node, settings)?, inputs),
        NodeType::Round => eval_round(node, require_settings(node, settings)?, inputs),
        NodeType::Stepper => eval_stepper(node, require_settings(node, settings)?, inputs),
        NodeType::Substitute => {
            eval_substitute(node, require_settings(node, settings)?, inputs)
        }
    }
}

/// Audits Stepper settings without evaluating. Exposed so the editor can
/// run the same checks at settings-edit time that the evaluator runs
/// defensively.
pub fn validate_stepper_settings(
    node_id: &str,
    settings: &StepperSettings,
) -> Result<(), SettingsError> {
    // A stepper needs at least one bucket to emit anything.
    if settings.num_steps == 0 {
        return Err(SettingsError::OutputCountMismatch {
            node: node_id.to_owned(),
            expected: 1,
            found: 0,
        });
    }
    if settings.middle_points.len() != settings.num_steps - 1 {
        return Err(SettingsError::BreakpointCountMismatch {
            node: node_id.to_owned(),
            expected: settings.num_steps - 1,
            found: settings.middle_points.len(),
        });
    }
    if settings.output_values.len() != settings.num_steps {
        return Err(SettingsError::OutputCountMismatch {
            node: node_id.to_owned(),
            expected: settings.num_steps,
            found: settings.output_values.len(),
        });
    }
    if settings.middle_points.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SettingsError::BreakpointsNotIncreasing {
            node: node_id.to_owned(),
        });
    }
    Ok(())
}

fn require_settings<'a>(
    node: &Node,
    settings: Option<&'a NodeSettings>,
) -> Result<&'a NodeSettings, SettingsError> {
    settings.ok_or_else(|| SettingsError::Missing {
        node: node.id.clone(),
    })
}

fn wrong_shape(node: &Node, expected: &'static str, found: &NodeSettings) -> SettingsError {
    SettingsError::WrongShape {
        node: node.id.clone(),
        expected,
        found: found.kind_name(),
    }
}

/// The single bound input of a fixed-arity node. An unbound input reads as
/// zero so a half-built graph still previews.
fn single_input(inputs: &NodeInputs) -> Value {
    inputs
        .first()
        .map(|(_, v)| *v)
        .unwrap_or(Value::Number(0.0))
}

fn eval_source(
    node: &Node,
    settings: Option<&NodeSettings>,
    injected: Option<f64>,
) -> Result<NodeOutcome, SettingsError> {
    let raw = injected.unwrap_or(0.0);
    let threshold = match settings {
        Some(NodeSettings::Threshold(t)) => Some(t),
        Some(other) => return Err(wrong_shape(node, "threshold", other)),
        None => None,
    };

    if let Some(ThresholdSettings {
        min_points: Some(min),
        on_fail_setting,
    }) = threshold
    {
        if raw < *min {
            // The whole-graph flag is surfaced to the caller; downstream
            // nodes still receive an ordinary Fail.
            let course_fail = *on_fail_setting == FailSetting::CourseFail;
            return Ok(NodeOutcome::single_with_flag(Value::Fail, course_fail));
        }
    }
    Ok(NodeOutcome::single(Value::Number(raw)))
}

/// Sum of all connected inputs; any failed input fails the sum.
fn eval_addition(inputs: &NodeInputs) -> NodeOutcome {
    let mut sum = 0.0;
    for (_, value) in inputs {
        match value {
            Value::Fail => return NodeOutcome::single(Value::Fail),
            Value::Number(n) => sum += n,
        }
    }
    NodeOutcome::single(Value::Number(sum))
}

/// Weighted average over connected inputs with a defined weight. Failed
/// inputs contribute to neither the numerator nor the denominator: the
/// points are simply lost.
fn eval_average(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Average(AverageSettings {
        weights,
        percentage_mode,
    }) = settings
    else {
        return Err(wrong_shape(node, "average", settings));
    };

    let mut value_sum = 0.0;
    let mut weight_sum = 0.0;
    for (handle, value) in inputs {
        let Some(&weight) = weights.get(handle) else {
            continue;
        };
        if !weight.is_finite() {
            return Err(SettingsError::NonFiniteWeight {
                node: node.id.clone(),
                handle: handle.clone(),
            });
        }
        if let Value::Number(n) = value {
            value_sum += n * weight;
            weight_sum += weight;
        }
    }
    let value = if weight_sum == 0.0 {
        0.0
    } else {
        value_sum / weight_sum
    };

    // In percentage mode the authored weights are meant to sum to 100.
    // The formula normalizes either way; this is a validation nit for the
    // editor, not a computation error.
    let warning = if *percentage_mode {
        let total: f64 = weights.values().sum();
        ((total - 100.0).abs() > 1e-9).then(|| SettingsError::WeightSumNot100 {
            node: node.id.clone(),
            sum: total,
        })
    } else {
        None
    };

    Ok(NodeOutcome {
        output: NodeOutput::Single(Value::Number(value)),
        course_fail: false,
        warning,
    })
}

/// Maximum of the floor constant and all connected non-failed inputs.
fn eval_max(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Max(MaxSettings { min_value }) = settings else {
        return Err(wrong_shape(node, "max", settings));
    };
    let mut best = *min_value;
    for (_, value) in inputs {
        if let Value::Number(n) = value {
            best = best.max(*n);
        }
    }
    Ok(NodeOutcome::single(Value::Number(best)))
}

/// Threshold gate. A failed input passes through untouched: whoever failed
/// it upstream already decided that outcome, and re-triggering the policy
/// here would double-count it.
fn eval_min_points(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Threshold(ThresholdSettings {
        min_points,
        on_fail_setting,
    }) = settings
    else {
        return Err(wrong_shape(node, "threshold", settings));
    };
    let min = min_points.ok_or_else(|| SettingsError::MissingThreshold {
        node: node.id.clone(),
    })?;

    match single_input(inputs) {
        Value::Fail => Ok(NodeOutcome::single(Value::Fail)),
        Value::Number(n) if n < min => match on_fail_setting {
            FailSetting::Fail => Ok(NodeOutcome::single(Value::Fail)),
            FailSetting::CourseFail => {
                Ok(NodeOutcome::single_with_flag(Value::Fail, true))
            }
        },
        value => Ok(NodeOutcome::single(value)),
    }
}

/// Counts failed inputs against the allowance. Within the allowance every
/// output handle passes its input through unchanged, failed or not; over
/// it, the policy either fails every output or raises the whole-graph
/// flag while the values keep flowing for preview.
fn eval_require(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Require(RequireSettings {
        num_fail,
        on_fail_setting,
    }) = settings
    else {
        return Err(wrong_shape(node, "require", settings));
    };

    let failed = inputs.iter().filter(|(_, v)| v.is_fail()).count();
    let mut values: BTreeMap<String, Value> =
        inputs.iter().map(|(h, v)| (h.clone(), *v)).collect();
    let mut course_fail = false;

    if failed > *num_fail {
        match on_fail_setting {
            FailSetting::Fail => {
                for value in values.values_mut() {
                    *value = Value::Fail;
                }
            }
            FailSetting::CourseFail => course_fail = true,
        }
    }

    Ok(NodeOutcome {
        output: NodeOutput::PerHandle(values),
        course_fail,
        warning: None,
    })
}

fn eval_round(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Round(RoundSettings { rounding_setting }) = settings else {
        return Err(wrong_shape(node, "round", settings));
    };
    let value = match single_input(inputs) {
        Value::Fail => Value::Fail,
        Value::Number(n) => Value::Number(match rounding_setting {
            Rounding::Up => n.ceil(),
            Rounding::Closest => n.round(),
            Rounding::Down => n.floor(),
        }),
    };
    Ok(NodeOutcome::single(value))
}

/// Buckets a continuous input. The breakpoint is inclusive to the lower
/// bucket: with breakpoints `[2, 4]`, an input of exactly 2 lands in
/// bucket 0.
fn eval_stepper(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Stepper(stepper) = settings else {
        return Err(wrong_shape(node, "stepper", settings));
    };
    validate_stepper_settings(&node.id, stepper)?;

    let x = match single_input(inputs) {
        Value::Fail => return Ok(NodeOutcome::single(Value::Fail)),
        Value::Number(n) => n,
    };

    let bucket = stepper
        .middle_points
        .iter()
        .position(|&bp| x <= bp)
        .unwrap_or(stepper.num_steps - 1);
    let value = match stepper.output_values[bucket] {
        StepperOutput::Same => x,
        StepperOutput::Fixed(v) => v,
    };
    Ok(NodeOutcome::single(Value::Number(value)))
}

/// Replaces failed exercise inputs with configured substitution values.
///
/// The budget is the smallest of: connected non-failed substitute slots,
/// failing exercises, and the configured maximum. Failing exercises consume
/// it in handle order and emit `substitute_values[exercise index]`;
/// consumed substitute slots emit `Fail` so their points cannot be counted
/// twice downstream.
fn eval_substitute(
    node: &Node,
    settings: &NodeSettings,
    inputs: &NodeInputs,
) -> Result<NodeOutcome, SettingsError> {
    let NodeSettings::Substitute(SubstituteSettings {
        max_substitutions,
        substitute_values,
    }) = settings
    else {
        return Err(wrong_shape(node, "substitute", settings));
    };

    let mut slots_available = 0usize;
    let mut failing_exercises = 0usize;
    for (handle, value) in inputs {
        match handle_role(handle) {
            HandleRole::Substitute if !value.is_fail() => slots_available += 1,
            HandleRole::Exercise if value.is_fail() => failing_exercises += 1,
            _ => {}
        }
    }
    let budget = slots_available
        .min(failing_exercises)
        .min(*max_substitutions);
    let mut slots_to_consume = budget;
    let mut exercises_to_replace = budget;

    let mut values = BTreeMap::new();
    let mut exercise_index = 0usize;
    for (handle, value) in inputs {
        match handle_role(handle) {
            HandleRole::Substitute => {
                if !value.is_fail() && slots_to_consume > 0 {
                    slots_to_consume -= 1;
                    values.insert(handle.clone(), Value::Fail);
                } else {
                    values.insert(handle.clone(), *value);
                }
            }
            HandleRole::Exercise => {
                if value.is_fail() && exercises_to_replace > 0 {
                    let Some(&replacement) = substitute_values.get(exercise_index) else {
                        return Err(SettingsError::SubstituteValueMissing {
                            node: node.id.clone(),
                            index: exercise_index,
                        });
                    };
                    exercises_to_replace -= 1;
                    values.insert(handle.clone(), Value::Number(replacement));
                } else {
                    values.insert(handle.clone(), *value);
                }
                exercise_index += 1;
            }
        }
    }

    Ok(NodeOutcome {
        output: NodeOutput::PerHandle(values),
        course_fail: false,
        warning: None,
    })
}
