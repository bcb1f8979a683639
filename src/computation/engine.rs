//! The topological propagator: one synchronous pass over one snapshot.
//!
//! Kahn's algorithm over the edge relation, seeded with every node that has
//! no bound inputs. Node rules are pure and order-independent once their
//! inputs are resolved, so any valid order yields the same state; iteration
//! follows the snapshot's declaration order to keep passes reproducible
//! byte for byte.

use std::collections::{HashMap, VecDeque};

use log::debug;
use smallvec::SmallVec;

use super::ledger::{EvaluationState, NodeEntry, NodeOutput, Value};
use super::rules;
use crate::graph::{Edge, GraphStructure, Node, NodeType};
use crate::validation::{check_structure, StructuralError};

/// Runs one full evaluation pass.
///
/// `source_values` maps Source node ids to the student's raw points;
/// sources without an entry read as zero. The snapshot is audited first and
/// rejected on any structural violation; a cycle that survived mutation
/// gating is caught here as Kahn residue rather than looping.
///
/// Settings problems never abort the pass: the offending node and its
/// downstream evaluate to `Fail`, a warning per offending node is
/// collected, and unrelated subgraphs are untouched.
pub fn evaluate(
    graph: &GraphStructure,
    source_values: &HashMap<String, f64>,
) -> Result<EvaluationState, StructuralError> {
    check_structure(graph)?;

    let nodes_by_id: HashMap<&str, &Node> =
        graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut incoming: HashMap<&str, Vec<&Edge>> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for edge in &graph.edges {
        incoming.entry(edge.target.as_str()).or_default().push(edge);
        outgoing.entry(edge.source.as_str()).or_default().push(edge);
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&Node> = graph
        .nodes
        .iter()
        .filter(|n| in_degree.get(n.id.as_str()).copied().unwrap_or(0) == 0)
        .collect();

    let mut state = EvaluationState::new();
    let mut course_fail = false;
    let mut processed = 0usize;

    while let Some(node) = queue.pop_front() {
        processed += 1;

        // Kahn guarantees every predecessor already has an entry.
        let mut inputs: SmallVec<[(String, Value); 4]> = SmallVec::new();
        let mut tainted = false;
        if let Some(edges_in) = incoming.get(node.id.as_str()) {
            for edge in edges_in {
                if let Some(entry) = state.entry(&edge.source) {
                    tainted |= entry.tainted;
                    inputs.push((
                        edge.resolved_target_handle().to_owned(),
                        entry.value_for_edge(edge),
                    ));
                }
            }
        }
        let connected: SmallVec<[String; 4]> =
            inputs.iter().map(|(handle, _)| handle.clone()).collect();

        let entry = if tainted {
            // Downstream of invalid settings: forced Fail, no extra warning.
            NodeEntry {
                output: NodeOutput::Single(Value::Fail),
                course_fail: false,
                tainted: true,
                connected,
            }
        } else {
            let data = graph.node_data(&node.id);
            let injected = (node.kind == NodeType::Source)
                .then(|| source_values.get(node.id.as_str()).copied())
                .flatten();
            match rules::evaluate_node(node, data, &inputs, injected) {
                Ok(outcome) => {
                    if let Some(warning) = outcome.warning {
                        state.warnings.push(warning);
                    }
                    course_fail |= outcome.course_fail;
                    NodeEntry {
                        output: outcome.output,
                        course_fail: outcome.course_fail,
                        tainted: false,
                        connected,
                    }
                }
                Err(error) => {
                    state.warnings.push(error);
                    NodeEntry {
                        output: NodeOutput::Single(Value::Fail),
                        course_fail: false,
                        tainted: true,
                        connected,
                    }
                }
            }
        };
        state.insert(node.id.clone(), entry);

        if let Some(edges_out) = outgoing.get(node.id.as_str()) {
            for edge in edges_out {
                if let Some(degree) = in_degree.get_mut(edge.target.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some(&target) = nodes_by_id.get(edge.target.as_str()) {
                            queue.push_back(target);
                        }
                    }
                }
            }
        }
    }

    // Residue means an edge cycle survived mutation gating.
    if processed != graph.nodes.len() {
        return Err(StructuralError::CycleDetected);
    }

    state.course_fail = course_fail;
    if !state.warnings.is_empty() {
        debug!(
            "evaluation pass finished with {} settings warning(s)",
            state.warnings.len()
        );
    }
    Ok(state)
}

/// The final course grade of one pass: the Sink node's value, overridden
/// by `Fail` when any node raised the whole-graph fail condition.
pub fn final_grade(graph: &GraphStructure, state: &EvaluationState) -> Value {
    if state.course_fail {
        return Value::Fail;
    }
    graph
        .sink()
        .and_then(|sink| state.value_of(&sink.id))
        .unwrap_or(Value::Fail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        AverageSettings, FailSetting, NodeSettings, StepperOutput, StepperSettings,
        ThresholdSettings,
    };

    fn source_settings(min_points: Option<f64>, on_fail: FailSetting) -> NodeSettings {
        NodeSettings::Threshold(ThresholdSettings {
            min_points,
            on_fail_setting: on_fail,
        })
    }

    fn grade_stepper() -> NodeSettings {
        NodeSettings::Stepper(StepperSettings {
            num_steps: 3,
            output_values: vec![
                StepperOutput::Fixed(0.0),
                StepperOutput::Fixed(1.0),
                StepperOutput::Fixed(2.0),
            ],
            middle_points: vec![10.0, 20.0],
        })
    }

    /// Two sources averaged, stepped into a grade, into the sink.
    fn model_graph() -> GraphStructure {
        let mut graph = GraphStructure::new();
        graph.add_node("source-1", NodeType::Source, "Exam", None);
        graph.add_node("source-2", NodeType::Source, "Project", None);
        graph.add_node(
            "avg",
            NodeType::Average,
            "Average",
            Some(NodeSettings::Average(AverageSettings {
                weights: [("avg-0".to_owned(), 1.0), ("avg-1".to_owned(), 1.0)]
                    .into_iter()
                    .collect(),
                percentage_mode: false,
            })),
        );
        graph.add_node("stepper", NodeType::Stepper, "To grade", Some(grade_stepper()));
        graph.add_node("final", NodeType::Sink, "Final grade", None);
        graph.connect("source-1", Some("source-1-source"), "avg", Some("avg-0"));
        graph.connect("source-2", Some("source-2-source"), "avg", Some("avg-1"));
        graph.connect("avg", Some("avg-source"), "stepper", None);
        graph.connect("stepper", Some("stepper-source"), "final", None);
        graph
    }

    fn points(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(id, v)| (id.to_string(), *v))
            .collect()
    }

    #[test]
    fn propagates_through_the_whole_pipeline() {
        let graph = model_graph();
        let state =
            evaluate(&graph, &points(&[("source-1", 12.0), ("source-2", 24.0)])).unwrap();
        // avg = 18, stepper bucket 1 -> grade 1.
        assert_eq!(state.value_of("avg"), Some(Value::Number(18.0)));
        assert_eq!(state.value_of("final"), Some(Value::Number(1.0)));
        assert_eq!(final_grade(&graph, &state), Value::Number(1.0));
        assert!(!state.course_fail);
        assert!(state.warnings.is_empty());
    }

    #[test]
    fn identical_arguments_yield_identical_state() {
        let graph = model_graph();
        let values = points(&[("source-1", 12.0), ("source-2", 24.0)]);
        let a = evaluate(&graph, &values).unwrap();
        let b = evaluate(&graph, &values).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_source_values_read_as_zero() {
        let graph = model_graph();
        let state = evaluate(&graph, &HashMap::new()).unwrap();
        assert_eq!(state.value_of("avg"), Some(Value::Number(0.0)));
        assert_eq!(state.value_of("final"), Some(Value::Number(0.0)));
    }

    #[test]
    fn course_fail_overrides_the_sink_value() {
        let mut graph = model_graph();
        graph
            .node_data
            .get_mut("source-1")
            .unwrap()
            .settings = Some(source_settings(Some(10.0), FailSetting::CourseFail));

        let state =
            evaluate(&graph, &points(&[("source-1", 5.0), ("source-2", 24.0)])).unwrap();
        assert!(state.course_fail);
        assert!(state.entry("source-1").unwrap().course_fail);
        // Downstream arithmetic still ran on the surviving branch.
        assert_eq!(state.value_of("avg"), Some(Value::Number(24.0)));
        assert_eq!(final_grade(&graph, &state), Value::Fail);
    }

    #[test]
    fn settings_error_taints_downstream_only() {
        let mut graph = model_graph();
        // Break the stepper: breakpoints not increasing.
        graph.node_data.get_mut("stepper").unwrap().settings =
            Some(NodeSettings::Stepper(StepperSettings {
                num_steps: 3,
                output_values: vec![
                    StepperOutput::Fixed(0.0),
                    StepperOutput::Fixed(1.0),
                    StepperOutput::Fixed(2.0),
                ],
                middle_points: vec![20.0, 10.0],
            }));

        let state =
            evaluate(&graph, &points(&[("source-1", 12.0), ("source-2", 24.0)])).unwrap();
        // The average upstream is untouched.
        assert_eq!(state.value_of("avg"), Some(Value::Number(18.0)));
        // One warning for the stepper; the sink is tainted without another.
        assert_eq!(state.warnings.len(), 1);
        assert_eq!(state.warnings[0].node_id(), "stepper");
        assert!(state.entry("stepper").unwrap().tainted);
        assert!(state.entry("final").unwrap().tainted);
        assert_eq!(state.value_of("final"), Some(Value::Fail));
    }

    #[test]
    fn cycle_residue_fails_fast() {
        let mut graph = model_graph();
        // Bypass the connection gate and wire the stepper back into the
        // average.
        graph.connect("stepper", Some("stepper-source"), "avg", Some("avg-2"));
        let err = evaluate(&graph, &HashMap::new()).unwrap_err();
        assert_eq!(err, StructuralError::CycleDetected);
    }

    #[test]
    fn structurally_invalid_snapshots_are_rejected_not_repaired() {
        let mut graph = model_graph();
        graph.nodes.retain(|n| n.kind != NodeType::Sink);
        assert_eq!(
            evaluate(&graph, &HashMap::new()),
            Err(StructuralError::MissingSink)
        );
    }

    #[test]
    fn passthrough_values_flow_per_handle() {
        let mut graph = GraphStructure::new();
        graph.add_node("source-1", NodeType::Source, "A", None);
        graph.add_node("source-2", NodeType::Source, "B", None);
        graph.add_node(
            "req",
            NodeType::Require,
            "Require",
            Some(NodeSettings::Require(crate::graph::RequireSettings {
                num_fail: 0,
                on_fail_setting: FailSetting::Fail,
            })),
        );
        graph.add_node("add", NodeType::Addition, "Addition", None);
        graph.add_node("final", NodeType::Sink, "Final grade", None);
        graph.connect("source-1", Some("source-1-source"), "req", Some("req-0"));
        graph.connect("source-2", Some("source-2-source"), "req", Some("req-1"));
        graph.connect("req", Some("req-0-source"), "add", Some("add-0"));
        graph.connect("req", Some("req-1-source"), "add", Some("add-1"));
        graph.connect("add", Some("add-source"), "final", None);

        let state =
            evaluate(&graph, &points(&[("source-1", 3.0), ("source-2", 4.0)])).unwrap();
        assert_eq!(state.value_on("req", "req-0"), Some(Value::Number(3.0)));
        assert_eq!(state.value_on("req", "req-1"), Some(Value::Number(4.0)));
        assert_eq!(state.value_of("final"), Some(Value::Number(7.0)));

        // Connected-handle bookkeeping is part of the state.
        let entry = state.entry("req").unwrap();
        assert_eq!(entry.connected.as_slice(), ["req-0", "req-1"]);
    }

    #[test]
    fn disconnected_nodes_still_preview() {
        let mut graph = model_graph();
        // An orphan addition node: no inputs, no outputs.
        graph.add_node("orphan", NodeType::Addition, "Addition", None);
        let state = evaluate(&graph, &HashMap::new()).unwrap();
        assert_eq!(state.value_of("orphan"), Some(Value::Number(0.0)));
    }
}
