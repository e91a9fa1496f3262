//! Input validation for the assignment core.
//!
//! Rejects ill-formed or socially impossible inputs before any strategy runs.
//! Checks run in a fixed order and the first failure stops validation, so
//! callers get one precise error at a time.

use crate::error::AssignmentError;
use crate::graph::FriendshipGraph;
use crate::{Gender, Performance, Student, StudentRecord};
use std::collections::{HashMap, HashSet};

const REQUIRED_FIELDS: [&str; 4] = [
    "name",
    "gender",
    "academicPerformance",
    "behavioralPerformance",
];

/// Validate the raw student table and produce the typed student list.
///
/// Check order: non-empty table, required fields present, enumeration values
/// well-formed, names unique, every student lists at least one friend, every
/// listed friend exists. The graph-level isolation check runs separately on
/// the built graph (see [`ensure_no_isolated_students`]).
pub fn validate_student_records(
    records: &[StudentRecord],
) -> Result<Vec<Student>, AssignmentError> {
    if records.is_empty() {
        return Err(AssignmentError::EmptyStudentData);
    }

    let mut missing: Vec<String> = Vec::new();
    for field in &REQUIRED_FIELDS {
        let absent = records.iter().any(|r| match *field {
            "name" => r.name.as_deref().map_or(true, |n| n.trim().is_empty()),
            "gender" => r.gender.is_none(),
            "academicPerformance" => r.academic_performance.is_none(),
            "behavioralPerformance" => r.behavioral_performance.is_none(),
            _ => unreachable!(),
        });
        if absent {
            missing.push(field.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(AssignmentError::MissingRequiredFields { fields: missing });
    }

    let mut students = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let name = record.name.as_deref().unwrap_or("").trim().to_string();

        let gender_raw = record.gender.as_deref().unwrap_or("").trim();
        let gender = Gender::parse(gender_raw).ok_or_else(|| AssignmentError::InvalidStudentData {
            student_name: name.clone(),
            field: "gender".into(),
            value: gender_raw.into(),
        })?;
        let academic_raw = record.academic_performance.as_deref().unwrap_or("").trim();
        let academic =
            Performance::parse(academic_raw).ok_or_else(|| AssignmentError::InvalidStudentData {
                student_name: name.clone(),
                field: "academicPerformance".into(),
                value: academic_raw.into(),
            })?;
        let behavioral_raw = record.behavioral_performance.as_deref().unwrap_or("").trim();
        let behavioral =
            Performance::parse(behavioral_raw).ok_or_else(|| AssignmentError::InvalidStudentData {
                student_name: name.clone(),
                field: "behavioralPerformance".into(),
                value: behavioral_raw.into(),
            })?;

        let friends: Vec<String> = record
            .friend_slots()
            .iter()
            .filter_map(|slot| slot.as_deref())
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        let not_with: Vec<String> = record
            .not_with
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect();

        students.push(Student {
            index,
            name,
            gender,
            academic,
            behavioral,
            friends,
            not_with,
            cluster: record.cluster_id,
        });
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for student in &students {
        *seen.entry(student.name.as_str()).or_insert(0) += 1;
    }
    let duplicates: Vec<String> = students
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| seen[name] > 1)
        .collect::<HashSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    if !duplicates.is_empty() {
        let mut names = duplicates;
        names.sort();
        return Err(AssignmentError::DuplicateStudentNames { names });
    }

    for student in &students {
        if student.friends.is_empty() {
            return Err(AssignmentError::StudentNoFriends {
                student_name: student.name.clone(),
            });
        }
    }

    let known: HashSet<&str> = students.iter().map(|s| s.name.as_str()).collect();
    for student in &students {
        for friend in &student.friends {
            if !known.contains(friend.as_str()) {
                return Err(AssignmentError::UnknownFriend {
                    student_name: student.name.clone(),
                    friend_name: friend.clone(),
                });
            }
        }
    }

    Ok(students)
}

/// Reject tables whose friendship graph contains isolated vertices.
///
/// With the record-level checks above this can only happen through degenerate
/// declarations (e.g. a student naming only themself), but the strategies rely
/// on every vertex having a neighbor, so the invariant is enforced here.
pub fn ensure_no_isolated_students(graph: &FriendshipGraph) -> Result<(), AssignmentError> {
    let isolated: Vec<String> = (0..graph.len())
        .filter(|&s| graph.degree(s) == 0)
        .map(|s| graph.name(s).to_string())
        .collect();
    if !isolated.is_empty() {
        return Err(AssignmentError::IsolatedStudents { names: isolated });
    }
    Ok(())
}

/// Validate the per-run assignment parameters
pub fn validate_assignment_parameters(
    num_students: usize,
    num_classes: usize,
) -> Result<(), AssignmentError> {
    if num_classes == 0 {
        return Err(AssignmentError::InvalidClassCount {
            num_classes: num_classes as i64,
        });
    }
    if num_students == 0 {
        return Err(AssignmentError::InvalidStudentCount {
            num_students: num_students as i64,
        });
    }
    if num_classes > num_students {
        return Err(AssignmentError::TooManyClasses {
            num_students,
            num_classes,
        });
    }
    if num_students / num_classes < 1 {
        return Err(AssignmentError::ClassSizeTooSmall {
            num_students,
            num_classes,
        });
    }
    Ok(())
}
