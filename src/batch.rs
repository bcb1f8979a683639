//! Batch grade calculation: one graph applied to many students.
//!
//! Each student's pass is independent — the snapshot is shared read-only
//! and every pass builds its own state — so the batch fans out across the
//! rayon pool with nothing to merge but the result vector.

use std::collections::HashMap;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::computation::{evaluate, final_grade, Value};
use crate::graph::GraphStructure;
use crate::validation::{check_structure, StructuralError};

/// One student's raw points, keyed by Source node id. Picking the best
/// attempt among repeated submissions is the caller's job; this module
/// only sees the value to inject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentPoints {
    pub student: String,
    pub points: HashMap<String, f64>,
}

/// One student's computed grade. `Fail` is a legitimate final result;
/// `course_fail` records that it came from the whole-graph fail condition
/// rather than the sink value itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGrade {
    pub student: String,
    pub grade: Value,
    pub course_fail: bool,
}

/// Grades every student against `graph`. Results come back in input order.
///
/// The snapshot is audited once up front; per-student passes re-audit
/// cheaply but can no longer fail structurally, so the only per-student
/// variation is the injected points.
pub fn batch_evaluate(
    graph: &GraphStructure,
    students: &[StudentPoints],
) -> Result<Vec<FinalGrade>, StructuralError> {
    check_structure(graph)?;
    debug!(
        "batch grading {} student(s) over {} node(s)",
        students.len(),
        graph.nodes.len()
    );

    students
        .par_iter()
        .map(|row| {
            let state = evaluate(graph, &row.points)?;
            Ok(FinalGrade {
                student: row.student.clone(),
                grade: final_grade(graph, &state),
                course_fail: state.course_fail,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        FailSetting, NodeSettings, NodeType, StepperOutput, StepperSettings,
        ThresholdSettings,
    };

    /// One source stepped into a 0..=2 grade.
    fn graph() -> GraphStructure {
        let mut graph = GraphStructure::new();
        graph.add_node(
            "source-1",
            NodeType::Source,
            "Exam",
            Some(NodeSettings::Threshold(ThresholdSettings {
                min_points: Some(5.0),
                on_fail_setting: FailSetting::CourseFail,
            })),
        );
        graph.add_node(
            "stepper",
            NodeType::Stepper,
            "To grade",
            Some(NodeSettings::Stepper(StepperSettings {
                num_steps: 3,
                output_values: vec![
                    StepperOutput::Fixed(0.0),
                    StepperOutput::Fixed(1.0),
                    StepperOutput::Fixed(2.0),
                ],
                middle_points: vec![10.0, 20.0],
            })),
        );
        graph.add_node("final", NodeType::Sink, "Final grade", None);
        graph.connect("source-1", Some("source-1-source"), "stepper", None);
        graph.connect("stepper", Some("stepper-source"), "final", None);
        graph
    }

    fn student(name: &str, exam: f64) -> StudentPoints {
        StudentPoints {
            student: name.to_owned(),
            points: [("source-1".to_owned(), exam)].into_iter().collect(),
        }
    }

    #[test]
    fn grades_match_individual_evaluation() {
        let graph = graph();
        let students = vec![
            student("alice", 25.0),
            student("bob", 12.0),
            student("carol", 2.0), // below the source threshold
        ];
        let grades = batch_evaluate(&graph, &students).unwrap();

        assert_eq!(grades.len(), 3);
        for (row, grade) in students.iter().zip(&grades) {
            let state = evaluate(&graph, &row.points).unwrap();
            assert_eq!(grade.student, row.student);
            assert_eq!(grade.grade, final_grade(&graph, &state));
            assert_eq!(grade.course_fail, state.course_fail);
        }
    }

    #[test]
    fn results_preserve_input_order() {
        let graph = graph();
        let students: Vec<StudentPoints> = (0..64)
            .map(|i| student(&format!("s{i}"), i as f64))
            .collect();
        let grades = batch_evaluate(&graph, &students).unwrap();
        let names: Vec<&str> = grades.iter().map(|g| g.student.as_str()).collect();
        let expected: Vec<String> = (0..64).map(|i| format!("s{i}")).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn whole_graph_fail_forces_the_reported_grade() {
        let graph = graph();
        let grades = batch_evaluate(&graph, &[student("dora", 3.0)]).unwrap();
        assert_eq!(grades[0].grade, Value::Fail);
        assert!(grades[0].course_fail);
    }

    #[test]
    fn structural_problems_surface_before_any_student_runs() {
        let mut graph = graph();
        graph.nodes.retain(|n| n.kind != NodeType::Sink);
        assert_eq!(
            batch_evaluate(&graph, &[student("alice", 25.0)]),
            Err(StructuralError::MissingSink)
        );
    }

    #[test]
    fn empty_batches_are_fine() {
        assert_eq!(batch_evaluate(&graph(), &[]).unwrap(), vec![]);
    }
}
