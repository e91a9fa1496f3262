//! IO helpers: human-readable rendering of a class assignment and debug-time
//! consistency checks.

pub mod simple;

use crate::graph::{ForbiddenPairs, FriendshipGraph};
use crate::Classes;
use std::fmt::Write;

/// Format a class assignment into a human readable String (e.g. to print it
/// to stdout).
///
/// The output format will look like
/// ```text
/// ===== Class 1 =====
/// (3 students)
/// - Anna Average
/// - Bert Beispiel
/// - Carla Clown (no friend in class)
///
/// ===== Class 2 =====
/// …
/// ```
pub fn format_assignment(graph: &FriendshipGraph, classes: &Classes) -> String {
    let mut result = String::new();
    for (i, class) in classes.iter().enumerate() {
        write!(result, "\n===== Class {} =====\n", i + 1).unwrap();
        writeln!(result, "({} students)", class.len()).unwrap();
        for &s in class {
            writeln!(
                result,
                "- {}{}",
                graph.name(s),
                if graph.friends_in_class(s, class) == 0 {
                    " (no friend in class)"
                } else {
                    ""
                }
            )
            .unwrap();
        }
    }
    result
}

pub fn debug_list_of_students(graph: &FriendshipGraph) -> String {
    (0..graph.len())
        .map(|s| format!("{:02} {}", s, graph.name(s)))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Assert that a built graph/forbidden-pairs structure is consistent (in
/// terms of indexes and cross references)
pub fn assert_data_consistency(graph: &FriendshipGraph, forbidden: &ForbiddenPairs) {
    for (i, student) in graph.students().iter().enumerate() {
        assert_eq!(i, student.index, "Index of {}. student is {}", i, student.index);
        assert_eq!(
            graph.index_of(&student.name),
            Some(i),
            "Name lookup of {}. student is inconsistent",
            i
        );
        for &friend in graph.friends(i) {
            assert!(
                friend < graph.len(),
                "Friend {} of {}. student is invalid",
                friend,
                i
            );
            assert!(
                graph.friends(friend).contains(&i),
                "Friendship {}-{} is not symmetric",
                i,
                friend
            );
        }
    }
    let (rows, cols) = forbidden.matrix().dim();
    assert_eq!(rows, graph.len(), "Forbidden matrix has {} rows", rows);
    assert_eq!(cols, graph.len(), "Forbidden matrix has {} columns", cols);
    for a in 0..rows {
        for b in 0..cols {
            assert_eq!(
                forbidden.forbids(a, b),
                forbidden.forbids(b, a),
                "Forbidden matrix is not symmetric at ({}, {})",
                a,
                b
            );
        }
    }
}
