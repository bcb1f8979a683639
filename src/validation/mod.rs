//! Gates graph mutation and audits snapshots before evaluation.
//!
//! Three entry points with distinct jobs: [`is_valid_connection`] vets a
//! candidate edge before the editor commits it, [`find_disconnected_edges`]
//! computes the repair set after a deletion, and [`check_structure`] is the
//! hard audit the evaluator runs on every snapshot it is handed.

pub mod connection;
pub mod error;
pub mod repair;
pub mod structure;

pub use connection::is_valid_connection;
pub use error::{SettingsError, StructuralError};
pub use repair::find_disconnected_edges;
pub use structure::check_structure;
