//! # gradegraph — grading-model graph evaluator
//!
//! Turns per-student raw attainment points into a final course grade
//! according to a user-authored graph of typed computation nodes
//! (averages, thresholds, steppers, requirement gates, substitutions).
//!
//! The evaluator is a pure function of `(graph, per-node settings, source
//! inputs)`: no I/O, no locks, no hidden state. Its collaborators — the
//! visual editor, the persistence layer, the final-grade job — talk to it
//! through four operations:
//!
//! - [`is_valid_connection`]: gate a candidate edge before committing it;
//! - [`find_disconnected_edges`]: compute the repair set after a deletion;
//! - [`evaluate`]: one pass over one snapshot, for live preview;
//! - [`batch_evaluate`]: the same pass once per student, in parallel.
//!
//! A failing grade is modeled by the non-numeric [`Value::Fail`] sentinel,
//! which is an ordinary computation outcome, never an error.
//!
//! ```
//! use gradegraph::{evaluate, final_grade, GraphStructure, NodeType, Value};
//! use std::collections::HashMap;
//!
//! let mut graph = GraphStructure::new();
//! graph.add_node("source-1", NodeType::Source, "Exam", None);
//! graph.add_node("final", NodeType::Sink, "Final grade", None);
//! graph.connect("source-1", Some("source-1-source"), "final", None);
//!
//! let points = HashMap::from([("source-1".to_string(), 4.0)]);
//! let state = evaluate(&graph, &points)?;
//! assert_eq!(final_grade(&graph, &state), Value::Number(4.0));
//! # Ok::<(), gradegraph::StructuralError>(())
//! ```

pub mod batch;
pub mod computation;
pub mod graph;
pub mod validation;

pub use batch::{batch_evaluate, FinalGrade, StudentPoints};
pub use computation::{
    evaluate, final_grade, validate_stepper_settings, EvaluationState, NodeEntry,
    NodeOutput, Value,
};
pub use graph::{
    AverageSettings, Edge, FailSetting, GraphStructure, MaxSettings, Node, NodeData,
    NodeSettings, NodeType, Position, RequireSettings, RoundSettings, Rounding,
    StepperOutput, StepperSettings, SubstituteSettings, ThresholdSettings,
};
pub use validation::{
    check_structure, find_disconnected_edges, is_valid_connection, SettingsError,
    StructuralError,
};
