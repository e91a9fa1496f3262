//! The friendship graph builder.
//!
//! From a validated student table it produces the undirected friendship graph
//! (adjacency lists keyed by a dense student index, with a side table
//! index↔name) and the forbidden-pairs map. Both are built once per assignment
//! call and shared immutably by the strategies and the evaluator.

use crate::Student;
use std::collections::{BTreeSet, HashMap};

/// Undirected friendship graph over the validated student table.
///
/// Vertices are dense indices 0..N-1 in input order; vertex payloads are the
/// [`Student`] records. A friendship declared by either endpoint yields a
/// single undirected edge; duplicates collapse and self-references are
/// dropped.
#[derive(Debug, Clone)]
pub struct FriendshipGraph {
    students: Vec<Student>,
    index_by_name: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
}

impl FriendshipGraph {
    /// Number of students (vertices)
    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, index: usize) -> &Student {
        &self.students[index]
    }

    pub fn name(&self, index: usize) -> &str {
        &self.students[index].name
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    /// Neighbors of a student, sorted ascending
    pub fn friends(&self, index: usize) -> &[usize] {
        &self.adjacency[index]
    }

    pub fn degree(&self, index: usize) -> usize {
        self.adjacency[index].len()
    }

    /// Number of undirected friendship edges
    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(|n| n.len()).sum::<usize>() / 2
    }

    /// All undirected friendship edges as (low index, high index) pairs
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges = Vec::with_capacity(self.num_edges());
        for (s, neighbors) in self.adjacency.iter().enumerate() {
            for &t in neighbors {
                if s < t {
                    edges.push((s, t));
                }
            }
        }
        edges
    }

    /// Count of s's friends that are members of the given class
    pub fn friends_in_class(&self, s: usize, class: &BTreeSet<usize>) -> usize {
        self.adjacency[s]
            .iter()
            .filter(|f| class.contains(*f))
            .count()
    }
}

/// The "not with" relation over the validated student table.
///
/// The declared entries are kept verbatim by name (entries naming non-existent
/// students are retained but have no effect). At constraint time the relation
/// is treated symmetrically: if A forbids B, neither may be placed with the
/// other, regardless of which side declared it.
#[derive(Debug, Clone)]
pub struct ForbiddenPairs {
    by_name: HashMap<String, Vec<String>>,
    matrix: ndarray::Array2<bool>,
}

impl ForbiddenPairs {
    /// Whether students a and b must not share a class (symmetric)
    pub fn forbids(&self, a: usize, b: usize) -> bool {
        self.matrix[[a, b]]
    }

    /// Whether placing the student into the given class would violate a
    /// forbidden pair
    pub fn violates(&self, student: usize, class: &BTreeSet<usize>) -> bool {
        class.iter().any(|&other| self.matrix[[student, other]])
    }

    /// The declared "not with" entries of one student, by name
    pub fn declared_for(&self, name: &str) -> &[String] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The symmetric dense forbidden matrix over student indices
    pub fn matrix(&self) -> &ndarray::Array2<bool> {
        &self.matrix
    }

    /// Number of unordered forbidden pairs that resolve to known students
    pub fn num_pairs(&self) -> usize {
        let n = self.matrix.dim().0;
        let mut count = 0;
        for a in 0..n {
            for b in (a + 1)..n {
                if self.matrix[[a, b]] {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Build the friendship graph and the forbidden-pairs map from a validated
/// student table.
///
/// Friend names are guaranteed to resolve by the input validator; "not with"
/// names are resolved best-effort and unresolvable entries stay inert.
pub fn build(students: Vec<Student>) -> (FriendshipGraph, ForbiddenPairs) {
    let n = students.len();
    let index_by_name: HashMap<String, usize> = students
        .iter()
        .map(|s| (s.name.clone(), s.index))
        .collect();

    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for student in &students {
        for friend_name in &student.friends {
            if let Some(friend) = index_by_name.get(friend_name).copied() {
                if friend != student.index {
                    adjacency[student.index].insert(friend);
                    adjacency[friend].insert(student.index);
                }
            }
        }
    }

    let mut by_name = HashMap::new();
    let mut matrix = ndarray::Array2::from_elem([n, n], false);
    for student in &students {
        if student.not_with.is_empty() {
            continue;
        }
        by_name.insert(student.name.clone(), student.not_with.clone());
        for other_name in &student.not_with {
            if let Some(other) = index_by_name.get(other_name).copied() {
                if other != student.index {
                    matrix[[student.index, other]] = true;
                    matrix[[other, student.index]] = true;
                }
            }
        }
    }

    let graph = FriendshipGraph {
        students,
        index_by_name,
        adjacency: adjacency
            .into_iter()
            .map(|neighbors| neighbors.into_iter().collect())
            .collect(),
    };
    let forbidden = ForbiddenPairs { by_name, matrix };
    (graph, forbidden)
}
