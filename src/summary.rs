//! Output shaping for callers: per-class summaries, the classes map with the
//! original input records, cluster diagnostics and the backward-compatible
//! class detail rows.

use crate::graph::{ForbiddenPairs, FriendshipGraph};
use crate::{Classes, Gender, StudentRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One per-class summary row of the output structure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_number: usize,
    pub students_count: usize,
    pub males_count: usize,
    pub average_academic_performance: f64,
    pub average_behavioural_performance: f64,
    /// Students without any declared friend in this class
    pub without_friends: usize,
    /// Students sharing the class with someone they declared "not with"
    pub unwanted_matches: usize,
}

/// The full output structure: classes numbered 1..K mapping to the member
/// records in input order, plus one summary per class
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentOutput {
    pub classes: BTreeMap<usize, Vec<StudentRecord>>,
    pub summaries: Vec<ClassSummary>,
}

/// Build the output structure for a computed assignment
pub fn generate_class_summaries(
    graph: &FriendshipGraph,
    forbidden: &ForbiddenPairs,
    classes: &Classes,
    records: &[StudentRecord],
) -> AssignmentOutput {
    let mut classes_map = BTreeMap::new();
    let mut summaries = Vec::with_capacity(classes.len());

    for (i, class) in classes.iter().enumerate() {
        let class_number = i + 1;
        let member_names: HashSet<&str> = class.iter().map(|&s| graph.name(s)).collect();

        let class_records: Vec<StudentRecord> = records
            .iter()
            .filter(|r| {
                r.name
                    .as_deref()
                    .map_or(false, |name| member_names.contains(name.trim()))
            })
            .cloned()
            .collect();
        classes_map.insert(class_number, class_records);

        let males_count = class
            .iter()
            .filter(|&&s| graph.student(s).gender == Gender::Male)
            .count();
        let without_friends = class
            .iter()
            .filter(|&&s| graph.friends_in_class(s, class) == 0)
            .count();
        let unwanted_matches = class
            .iter()
            .filter(|&&s| {
                forbidden
                    .declared_for(graph.name(s))
                    .iter()
                    .any(|unwanted| class.iter().any(|&other| graph.name(other) == unwanted))
            })
            .count();

        summaries.push(ClassSummary {
            class_number,
            students_count: class.len(),
            males_count,
            average_academic_performance: average_points(graph, class, true),
            average_behavioural_performance: average_points(graph, class, false),
            without_friends,
            unwanted_matches,
        });
    }

    AssignmentOutput {
        classes: classes_map,
        summaries,
    }
}

fn average_points(graph: &FriendshipGraph, class: &BTreeSet<usize>, academic: bool) -> f64 {
    if class.is_empty() {
        return 0.0;
    }
    let sum: u32 = class
        .iter()
        .map(|&s| {
            let student = graph.student(s);
            if academic {
                student.academic.points()
            } else {
                student.behavioral.points()
            }
        })
        .sum();
    sum as f64 / class.len() as f64
}

/// Cluster diagnostics over a class assignment. Clusters are soft labels:
/// splitting one across classes is reported, never prevented. Students
/// without a declared cluster form one group of their own, which counts (and
/// can break) like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterStats {
    pub total_clusters: usize,
    /// Clusters spanning at least two classes
    pub broken_clusters: usize,
    /// Clusters spanning at least three classes
    pub badly_broken_clusters: usize,
}

pub fn analyze_cluster_distribution(graph: &FriendshipGraph, classes: &Classes) -> ClusterStats {
    let mut cluster_classes: BTreeMap<Option<i64>, BTreeSet<usize>> = BTreeMap::new();
    for (i, class) in classes.iter().enumerate() {
        for &s in class {
            cluster_classes
                .entry(graph.student(s).cluster)
                .or_default()
                .insert(i);
        }
    }
    ClusterStats {
        total_clusters: cluster_classes.len(),
        broken_clusters: cluster_classes.values().filter(|c| c.len() > 1).count(),
        badly_broken_clusters: cluster_classes.values().filter(|c| c.len() > 2).count(),
    }
}

/// Backward-compatible per-class detail row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDetail {
    #[serde(rename = "class")]
    pub class_number: usize,
    pub size: usize,
    pub male_ratio: f64,
    pub academic_score: f64,
    pub behavioral_score: f64,
    /// Human-readable cluster membership lines, e.g. "Cluster 3: 2 students"
    pub clusters: Vec<String>,
    /// Member names, sorted alphabetically
    pub students: Vec<String>,
}

pub fn class_details(graph: &FriendshipGraph, classes: &Classes) -> Vec<ClassDetail> {
    classes
        .iter()
        .enumerate()
        .map(|(i, class)| {
            let males = class
                .iter()
                .filter(|&&s| graph.student(s).gender == Gender::Male)
                .count();
            let mut cluster_members: BTreeMap<i64, usize> = BTreeMap::new();
            for &s in class {
                if let Some(cluster) = graph.student(s).cluster {
                    *cluster_members.entry(cluster).or_insert(0) += 1;
                }
            }
            let mut students: Vec<String> =
                class.iter().map(|&s| graph.name(s).to_string()).collect();
            students.sort();

            ClassDetail {
                class_number: i + 1,
                size: class.len(),
                male_ratio: if class.is_empty() {
                    0.0
                } else {
                    males as f64 / class.len() as f64
                },
                academic_score: average_points(graph, class, true),
                behavioral_score: average_points(graph, class, false),
                clusters: cluster_members
                    .iter()
                    .map(|(cluster, count)| format!("Cluster {}: {} students", cluster, count))
                    .collect(),
                students,
            }
        })
        .collect()
}
