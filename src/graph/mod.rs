//! Defines the core data structures for the grading graph.
pub mod edge;
pub mod node;
pub mod structure;

pub use edge::{handle_role, mirrored_input_handle, output_handle, Edge, HandleRole};
pub use node::{
    AverageSettings, FailSetting, MaxSettings, NodeSettings, NodeType, RequireSettings,
    RoundSettings, Rounding, StepperOutput, StepperSettings, SubstituteSettings,
    ThresholdSettings,
};
pub use structure::{GraphStructure, Node, NodeData, Position};
