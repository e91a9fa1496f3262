//! The solution evaluator: a pure function from (graph, forbidden pairs,
//! classes) to a metrics record.
//!
//! The evaluator never fails; hard-constraint violations are reported as data
//! so that even a degraded heuristic result can be returned with an honest
//! quality assessment. Running it twice on the same inputs yields identical
//! metrics.

use crate::graph::{ForbiddenPairs, FriendshipGraph};
use crate::{Classes, Gender, Performance};
use serde::Serialize;

/// Target mean grade value of a perfectly mixed class
const TARGET_GRADE_AVERAGE: f64 = 2.0;

/// A student placed in a class holding none of their declared friends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriendlessStudent {
    pub student: String,
    #[serde(rename = "class")]
    pub class_number: usize,
}

/// A student sharing a class with someone they declared "not with"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotWithViolation {
    pub student: String,
    pub unwanted_classmates: Vec<String>,
    #[serde(rename = "class")]
    pub class_number: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassFriendships {
    #[serde(rename = "class")]
    pub class_number: usize,
    /// Friendship edges with both endpoints in this class
    pub total_friendships_in_class: usize,
    pub avg_friends_per_student: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSize {
    #[serde(rename = "class")]
    pub class_number: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderBalance {
    #[serde(rename = "class")]
    pub class_number: usize,
    pub male_count: usize,
    pub female_count: usize,
    pub male_ratio: f64,
    pub balance_deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceBalance {
    #[serde(rename = "class")]
    pub class_number: usize,
    pub average_score: f64,
    pub low_count: usize,
    pub medium_count: usize,
    pub high_count: usize,
}

/// The full metrics record of one candidate solution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub students_without_friends: Vec<FriendlessStudent>,
    pub not_with_violations: Vec<NotWithViolation>,
    pub unassigned_students: Vec<String>,
    pub multiply_assigned_students: Vec<String>,
    pub friendship_satisfaction_rate: f64,
    pub total_satisfied_friendships: usize,
    pub total_possible_friendships: usize,
    pub friendship_distribution: Vec<ClassFriendships>,
    pub size_variance: usize,
    pub average_size: f64,
    pub size_distribution: Vec<ClassSize>,
    pub gender_distribution: Vec<GenderBalance>,
    pub average_gender_deviation: f64,
    pub academic_distribution: Vec<PerformanceBalance>,
    pub average_academic_deviation: f64,
    pub behavioral_distribution: Vec<PerformanceBalance>,
    pub average_behavioral_deviation: f64,
    /// Combined quality score, clamped to 0..100
    pub overall_score: f64,
}

/// Compute all metrics for a candidate class assignment
pub fn evaluate(
    graph: &FriendshipGraph,
    forbidden: &ForbiddenPairs,
    classes: &Classes,
) -> Evaluation {
    // Hard-constraint counters
    let mut assigned_count = vec![0usize; graph.len()];
    let mut multiply_assigned_students = Vec::new();
    for class in classes {
        for &s in class {
            if assigned_count[s] > 0 {
                multiply_assigned_students.push(graph.name(s).to_string());
            }
            assigned_count[s] += 1;
        }
    }
    let unassigned_students: Vec<String> = (0..graph.len())
        .filter(|&s| assigned_count[s] == 0)
        .map(|s| graph.name(s).to_string())
        .collect();

    let mut students_without_friends = Vec::new();
    for (i, class) in classes.iter().enumerate() {
        for &s in class {
            if graph.friends_in_class(s, class) == 0 {
                students_without_friends.push(FriendlessStudent {
                    student: graph.name(s).to_string(),
                    class_number: i + 1,
                });
            }
        }
    }

    let mut not_with_violations = Vec::new();
    for (i, class) in classes.iter().enumerate() {
        for &s in class {
            let declared = forbidden.declared_for(graph.name(s));
            if declared.is_empty() {
                continue;
            }
            let unwanted_classmates: Vec<String> = class
                .iter()
                .filter(|&&other| other != s)
                .map(|&other| graph.name(other))
                .filter(|name| declared.iter().any(|d| d == name))
                .map(|name| name.to_string())
                .collect();
            if !unwanted_classmates.is_empty() {
                not_with_violations.push(NotWithViolation {
                    student: graph.name(s).to_string(),
                    unwanted_classmates,
                    class_number: i + 1,
                });
            }
        }
    }

    // Friendship metrics
    let mut total_possible_friendships = 0;
    let mut total_satisfied_friendships = 0;
    let mut friendship_distribution = Vec::with_capacity(classes.len());
    for (i, class) in classes.iter().enumerate() {
        let mut class_friendships = 0;
        for &s in class {
            total_possible_friendships += graph.degree(s);
            let satisfied = graph.friends_in_class(s, class);
            total_satisfied_friendships += satisfied;
            class_friendships += satisfied;
        }
        friendship_distribution.push(ClassFriendships {
            class_number: i + 1,
            total_friendships_in_class: class_friendships / 2,
            avg_friends_per_student: if class.is_empty() {
                0.0
            } else {
                class_friendships as f64 / class.len() as f64
            },
        });
    }
    let friendship_satisfaction_rate = if total_possible_friendships > 0 {
        total_satisfied_friendships as f64 / total_possible_friendships as f64
    } else {
        0.0
    };

    // Balance metrics
    let sizes: Vec<usize> = classes.iter().map(|c| c.len()).collect();
    let size_variance = match (sizes.iter().max(), sizes.iter().min()) {
        (Some(max), Some(min)) => max - min,
        _ => 0,
    };
    let average_size = if sizes.is_empty() {
        0.0
    } else {
        sizes.iter().sum::<usize>() as f64 / sizes.len() as f64
    };
    let size_distribution = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| ClassSize {
            class_number: i + 1,
            size,
        })
        .collect();

    let mut gender_distribution = Vec::new();
    for (i, class) in classes.iter().enumerate() {
        if class.is_empty() {
            continue;
        }
        let male_count = class
            .iter()
            .filter(|&&s| graph.student(s).gender == Gender::Male)
            .count();
        let male_ratio = male_count as f64 / class.len() as f64;
        gender_distribution.push(GenderBalance {
            class_number: i + 1,
            male_count,
            female_count: class.len() - male_count,
            male_ratio,
            balance_deviation: (0.5 - male_ratio).abs(),
        });
    }
    let average_gender_deviation = mean(gender_distribution.iter().map(|g| g.balance_deviation));

    let academic_distribution = performance_balance(graph, classes, |s| graph.student(s).academic);
    let average_academic_deviation = mean(
        academic_distribution
            .iter()
            .map(|p| (p.average_score - TARGET_GRADE_AVERAGE).abs()),
    );
    let behavioral_distribution =
        performance_balance(graph, classes, |s| graph.student(s).behavioral);
    let average_behavioral_deviation = mean(
        behavioral_distribution
            .iter()
            .map(|p| (p.average_score - TARGET_GRADE_AVERAGE).abs()),
    );

    // Overall quality score: heavy penalties for hard violations, moderate
    // ones for imbalance, a bonus for satisfied friendships.
    let mut overall_score = 100.0;
    overall_score -= students_without_friends.len() as f64 * 20.0;
    overall_score -= not_with_violations.len() as f64 * 25.0;
    overall_score -= unassigned_students.len() as f64 * 30.0;
    overall_score -= multiply_assigned_students.len() as f64 * 30.0;
    overall_score -= size_variance as f64 * 2.0;
    overall_score -= average_gender_deviation * 10.0;
    overall_score -= average_academic_deviation * 5.0;
    overall_score -= average_behavioral_deviation * 5.0;
    overall_score += friendship_satisfaction_rate * 10.0;
    let overall_score = overall_score.max(0.0).min(100.0);

    Evaluation {
        students_without_friends,
        not_with_violations,
        unassigned_students,
        multiply_assigned_students,
        friendship_satisfaction_rate,
        total_satisfied_friendships,
        total_possible_friendships,
        friendship_distribution,
        size_variance,
        average_size,
        size_distribution,
        gender_distribution,
        average_gender_deviation,
        academic_distribution,
        average_academic_deviation,
        behavioral_distribution,
        average_behavioral_deviation,
        overall_score,
    }
}

fn performance_balance<F: Fn(usize) -> Performance>(
    graph: &FriendshipGraph,
    classes: &Classes,
    grade: F,
) -> Vec<PerformanceBalance> {
    let mut balance = Vec::new();
    for (i, class) in classes.iter().enumerate() {
        if class.is_empty() {
            continue;
        }
        let mut counts = [0usize; 3];
        let mut sum = 0u32;
        for &s in class {
            let g = grade(s);
            counts[g.points() as usize - 1] += 1;
            sum += g.points();
        }
        balance.push(PerformanceBalance {
            class_number: i + 1,
            average_score: sum as f64 / class.len() as f64,
            low_count: counts[0],
            medium_count: counts[1],
            high_count: counts[2],
        });
    }
    balance
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}
