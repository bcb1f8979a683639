//! A synchronous, single-threaded evaluation pass over one graph snapshot.
pub mod engine;
pub mod ledger;
pub mod rules;

pub use engine::{evaluate, final_grade};
pub use ledger::{EvaluationState, NodeEntry, NodeOutput, Value};
pub use rules::{evaluate_node, validate_stepper_settings, NodeOutcome};
