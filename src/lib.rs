
pub mod bab;
pub mod config;
pub mod cpsat;
pub mod error;
pub mod evaluate;
pub mod graph;
pub mod greedy;
pub mod io;
pub mod service;
pub mod strategy;
pub mod summary;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A student's gender, as declared in the input table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "MALE")]
    Male,
    #[serde(rename = "FEMALE")]
    Female,
}

impl Gender {
    /// Parse the wire representation ("MALE"/"FEMALE"). Any other value is
    /// rejected by the input validator.
    pub fn parse(value: &str) -> Option<Gender> {
        match value {
            "MALE" => Some(Gender::Male),
            "FEMALE" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// A three-level performance grade (academic or behavioral)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Performance {
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
}

impl Performance {
    pub fn parse(value: &str) -> Option<Performance> {
        match value {
            "LOW" => Some(Performance::Low),
            "MEDIUM" => Some(Performance::Medium),
            "HIGH" => Some(Performance::High),
            _ => None,
        }
    }

    /// Numeric grade value used for class averages (LOW→1, MEDIUM→2, HIGH→3)
    pub fn points(&self) -> u32 {
        match self {
            Performance::Low => 1,
            Performance::Medium => 2,
            Performance::High => 3,
        }
    }
}

/// One row of the student input table, as it comes off the wire.
///
/// All required fields are `Option`al at this layer: the input validator — not
/// the deserializer — decides whether a table is usable and reports which
/// fields are missing. Opaque fields (`school`, `comments`) are carried along
/// untouched so exported class lists reproduce the input records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, rename = "academicPerformance")]
    pub academic_performance: Option<String>,
    #[serde(default, rename = "behavioralPerformance")]
    pub behavioral_performance: Option<String>,
    #[serde(default)]
    pub friend1: Option<String>,
    #[serde(default)]
    pub friend2: Option<String>,
    #[serde(default)]
    pub friend3: Option<String>,
    #[serde(default)]
    pub friend4: Option<String>,
    #[serde(default, rename = "notWith")]
    pub not_with: Option<String>,
    #[serde(default, rename = "clusterId")]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl StudentRecord {
    /// The four declared friend slots, in order
    pub fn friend_slots(&self) -> [&Option<String>; 4] {
        [&self.friend1, &self.friend2, &self.friend3, &self.friend4]
    }
}

/// A validated student, as used by the graph builder and the strategies
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    /// Dense index of the student in the validated table (0..N-1)
    pub index: usize,
    /// Unique student name, the external identifier
    pub name: String,
    pub gender: Gender,
    pub academic: Performance,
    pub behavioral: Performance,
    /// Declared friend names (trimmed, non-empty; all exist in the table)
    pub friends: Vec<String>,
    /// Declared "not with" names (trimmed; may name unknown students, which
    /// are retained but have no effect)
    pub not_with: Vec<String>,
    /// Optional cluster label, used only for diagnostics
    pub cluster: Option<i64>,
}

/// A class assignment: one set of student indices per class, indexed 0..K-1.
///
/// `BTreeSet` keeps members in dense-index order, which is the input order of
/// the student table; everything downstream (output shaping, tie-breaking)
/// relies on that deterministic iteration.
pub type Classes = Vec<BTreeSet<usize>>;
