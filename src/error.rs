//! Error taxonomy of the assignment core.
//!
//! Every user-visible failure carries a stable machine `code` (intended for
//! client-side translation), a `params` map used to interpolate a localized
//! template, and an English debug `message`. The HTTP wrapper builds its
//! response envelope from [`AssignmentError::envelope`]; request-shape and
//! localization codes live in that wrapper, not here.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignmentError {
    #[error("student data is empty")]
    EmptyStudentData,
    #[error("missing required fields: {fields:?}")]
    MissingRequiredFields { fields: Vec<String> },
    #[error("duplicate student names found: {names:?}")]
    DuplicateStudentNames { names: Vec<String> },
    #[error("student '{student_name}' has invalid value '{value}' for field '{field}'")]
    InvalidStudentData {
        student_name: String,
        field: String,
        value: String,
    },
    #[error("student '{student_name}' has no friends listed; all students must have at least one friend")]
    StudentNoFriends { student_name: String },
    #[error("student '{student_name}' lists unknown friend '{friend_name}'")]
    UnknownFriend {
        student_name: String,
        friend_name: String,
    },
    #[error("students with no valid friendships: {names:?}")]
    IsolatedStudents { names: Vec<String> },
    #[error("number of classes must be positive, got {num_classes}")]
    InvalidClassCount { num_classes: i64 },
    #[error("number of students must be positive, got {num_students}")]
    InvalidStudentCount { num_students: i64 },
    #[error("cannot create {num_classes} classes with only {num_students} students")]
    TooManyClasses {
        num_students: usize,
        num_classes: usize,
    },
    #[error("class size too small for {num_students} students in {num_classes} classes")]
    ClassSizeTooSmall {
        num_students: usize,
        num_classes: usize,
    },
    #[error("assignment failed: {reason}")]
    AssignmentFailed { reason: String },
    #[error("no feasible assignment satisfies the friendship and separation constraints")]
    NoSolutionFound,
    #[error("optimizer hit the {timeout_seconds}s deadline without finding a solution")]
    OptimizationTimeout { timeout_seconds: u64 },
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl AssignmentError {
    /// The stable machine identifier of this error kind
    pub fn code(&self) -> &'static str {
        use AssignmentError::*;
        match self {
            EmptyStudentData => "EMPTY_STUDENT_DATA",
            MissingRequiredFields { .. } => "MISSING_REQUIRED_FIELDS",
            DuplicateStudentNames { .. } => "DUPLICATE_STUDENT_NAMES",
            InvalidStudentData { .. } => "INVALID_STUDENT_DATA",
            StudentNoFriends { .. } => "STUDENT_NO_FRIENDS",
            UnknownFriend { .. } => "UNKNOWN_FRIEND",
            IsolatedStudents { .. } => "ISOLATED_STUDENTS",
            InvalidClassCount { .. } => "INVALID_CLASS_COUNT",
            InvalidStudentCount { .. } => "INVALID_STUDENT_COUNT",
            TooManyClasses { .. } => "TOO_MANY_CLASSES",
            ClassSizeTooSmall { .. } => "CLASS_SIZE_TOO_SMALL",
            AssignmentFailed { .. } => "ASSIGNMENT_FAILED",
            NoSolutionFound => "NO_SOLUTION_FOUND",
            OptimizationTimeout { .. } => "OPTIMIZATION_TIMEOUT",
            Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Parameters for interpolating a localized message template.
    ///
    /// Keys are camelCase, matching the templates shipped with the (external)
    /// endpoint layer.
    pub fn params(&self) -> Map<String, Value> {
        use AssignmentError::*;
        let mut params = Map::new();
        match self {
            EmptyStudentData | NoSolutionFound => {}
            MissingRequiredFields { fields } => {
                params.insert("missingFields".into(), json!(fields));
            }
            DuplicateStudentNames { names } => {
                params.insert("duplicateNames".into(), json!(names));
            }
            InvalidStudentData {
                student_name,
                field,
                value,
            } => {
                params.insert("studentName".into(), json!(student_name));
                params.insert("field".into(), json!(field));
                params.insert("value".into(), json!(value));
            }
            StudentNoFriends { student_name } => {
                params.insert("studentName".into(), json!(student_name));
            }
            UnknownFriend {
                student_name,
                friend_name,
            } => {
                params.insert("studentName".into(), json!(student_name));
                params.insert("friendName".into(), json!(friend_name));
            }
            IsolatedStudents { names } => {
                params.insert("isolatedStudents".into(), json!(names));
            }
            InvalidClassCount { num_classes } => {
                params.insert("numClasses".into(), json!(num_classes));
            }
            InvalidStudentCount { num_students } => {
                params.insert("numStudents".into(), json!(num_students));
            }
            TooManyClasses {
                num_students,
                num_classes,
            }
            | ClassSizeTooSmall {
                num_students,
                num_classes,
            } => {
                params.insert("numStudents".into(), json!(num_students));
                params.insert("numClasses".into(), json!(num_classes));
            }
            AssignmentFailed { reason } | Internal { reason } => {
                params.insert("reason".into(), json!(reason));
            }
            OptimizationTimeout { timeout_seconds } => {
                params.insert("timeoutSeconds".into(), json!(timeout_seconds));
            }
        }
        params
    }

    /// Build the serializable `{code, params, message}` envelope
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code(),
            params: self.params(),
            message: self.to_string(),
        }
    }
}

/// The wire shape of a user-visible error
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub params: Map<String, Value>,
    pub message: String,
}
