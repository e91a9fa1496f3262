use super::{CpSatStrategy, Model};
use crate::graph::{self, ForbiddenPairs, FriendshipGraph};
use crate::strategy::AssignmentStrategy;
use crate::validate::validate_student_records;
use crate::{Classes, StudentRecord};

fn record(
    name: &str,
    gender: &str,
    academic: &str,
    behavioral: &str,
    friends: [&str; 4],
    not_with: &str,
) -> StudentRecord {
    StudentRecord {
        name: Some(name.to_string()),
        gender: Some(gender.to_string()),
        academic_performance: Some(academic.to_string()),
        behavioral_performance: Some(behavioral.to_string()),
        friend1: Some(friends[0].to_string()),
        friend2: Some(friends[1].to_string()),
        friend3: Some(friends[2].to_string()),
        friend4: Some(friends[3].to_string()),
        not_with: Some(not_with.to_string()),
        cluster_id: None,
        school: None,
        comments: None,
    }
}

/// Six students: the Alice-Bob-Charlie-David clique-ish group, the Eve-Frank
/// pair, and a Charlie/Eve conflict.
fn six_students() -> Vec<StudentRecord> {
    vec![
        record("Alice", "FEMALE", "HIGH", "MEDIUM", ["Bob", "Charlie", "", ""], ""),
        record("Bob", "MALE", "MEDIUM", "HIGH", ["Alice", "David", "", ""], ""),
        record("Charlie", "MALE", "LOW", "MEDIUM", ["Alice", "David", "", ""], "Eve"),
        record("David", "MALE", "HIGH", "LOW", ["Bob", "Charlie", "", ""], ""),
        record("Eve", "FEMALE", "MEDIUM", "HIGH", ["Frank", "", "", ""], "Charlie"),
        record("Frank", "MALE", "LOW", "MEDIUM", ["Eve", "", "", ""], ""),
    ]
}

/// Nine students forming three separate friendship triangles
fn three_triangles() -> Vec<StudentRecord> {
    let mut records = Vec::new();
    for triangle in 0..3 {
        for member in 0..3 {
            let name = format!("T{}{}", triangle, member);
            let first = format!("T{}{}", triangle, (member + 1) % 3);
            let second = format!("T{}{}", triangle, (member + 2) % 3);
            records.push(record(
                &name,
                if member == 0 { "FEMALE" } else { "MALE" },
                ["LOW", "MEDIUM", "HIGH"][member],
                ["HIGH", "LOW", "MEDIUM"][member],
                [first.as_str(), second.as_str(), "", ""],
                "",
            ));
        }
    }
    records
}

fn build(records: &[StudentRecord]) -> (FriendshipGraph, ForbiddenPairs) {
    let students = validate_student_records(records).unwrap();
    graph::build(students)
}

fn assert_hard_constraints(graph: &FriendshipGraph, forbidden: &ForbiddenPairs, classes: &Classes) {
    let mut seen = std::collections::HashSet::new();
    for class in classes {
        for &s in class {
            assert!(seen.insert(s), "student {} assigned twice", graph.name(s));
        }
    }
    assert_eq!(seen.len(), graph.len(), "not all students assigned");

    for (i, class) in classes.iter().enumerate() {
        for &s in class {
            assert!(
                graph.friends_in_class(s, class) > 0,
                "{} has no friend in class {}",
                graph.name(s),
                i
            );
            for &other in class {
                assert!(
                    !forbidden.forbids(s, other),
                    "{} and {} share class {} despite a forbidden pair",
                    graph.name(s),
                    graph.name(other),
                    i
                );
            }
        }
    }
}

#[test]
fn test_model_dimensions() {
    let (graph, forbidden) = build(&six_students());
    let model = Model::build(&graph, &forbidden, 2);

    assert_eq!(model.num_students, 6);
    assert_eq!(model.num_classes, 2);
    // 6·2 assignment booleans plus 5·2 linking booleans
    assert_eq!(model.num_variables, 22);
    // 6 assignment rows + 12 friendship implications + 2 separation
    // inequalities + 4 size bounds + 30 linking inequalities
    assert_eq!(model.num_constraints, 54);
    assert_eq!(model.min_size, 2);
    assert_eq!(model.max_size, 5);

    // Eve is hardest to place: one friend and a declared conflict
    let eve = graph.index_of("Eve").unwrap();
    assert_eq!(model.order[0], eve);

    // Every edge is open at the root and decided at full depth
    assert_eq!(model.open_edges[0], 5);
    assert_eq!(model.open_edges[6], 0);
}

#[test]
fn test_branch_order_is_a_permutation() {
    let (graph, forbidden) = build(&three_triangles());
    let model = Model::build(&graph, &forbidden, 3);
    let mut sorted = model.order.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..9).collect::<Vec<_>>());
    for (pos, &s) in model.order.iter().enumerate() {
        assert_eq!(model.position[s], pos);
    }
}

#[test]
fn test_solves_six_students_to_optimality() {
    let (graph, forbidden) = build(&six_students());
    let strategy = CpSatStrategy::with_workers(30, 2);
    let result = strategy.assign(&graph, &forbidden, 2).unwrap();

    assert_eq!(result.classes.len(), 2);
    assert_hard_constraints(&graph, &forbidden, &result.classes);

    let solver = result.metadata.solver.as_ref().expect("solver metadata");
    assert_eq!(solver.solver_status, "OPTIMAL");
    // All five friendship edges can be kept intra-class: {Alice, Bob,
    // Charlie, David} and {Eve, Frank}.
    assert_eq!(solver.objective_value, 5);
    assert_eq!(solver.num_variables, 22);
    assert_eq!(solver.num_constraints, 54);
    assert_eq!(solver.timeout_used, 30);
    assert_eq!(result.metadata.algorithm, "cp_sat");

    for class in &result.classes {
        assert!(class.len() >= 2 && class.len() <= 5);
    }
}

#[test]
fn test_three_triangles_stay_intact() {
    let (graph, forbidden) = build(&three_triangles());
    let strategy = CpSatStrategy::with_workers(30, 4);
    let result = strategy.assign(&graph, &forbidden, 3).unwrap();

    assert_hard_constraints(&graph, &forbidden, &result.classes);
    let solver = result.metadata.solver.as_ref().unwrap();
    assert_eq!(solver.solver_status, "OPTIMAL");
    // Nine edges total; the size bounds only allow one triangle per class,
    // and keeping each triangle together preserves all of them.
    assert_eq!(solver.objective_value, 9);
    for class in &result.classes {
        assert_eq!(class.len(), 3);
    }
}

#[test]
fn test_separation_constraints_hold_under_pressure() {
    let mut records = six_students();
    // David also refuses Frank, declared one-way only
    records[3].not_with = Some("Frank".to_string());
    let (graph, forbidden) = build(&records);
    let strategy = CpSatStrategy::with_workers(30, 2);
    let result = strategy.assign(&graph, &forbidden, 2).unwrap();
    assert_hard_constraints(&graph, &forbidden, &result.classes);
}

#[test]
fn test_mutually_forbidden_only_friends_is_infeasible() {
    // Alice and Bob are each other's only friends but must be separated;
    // no assignment can satisfy both constraints.
    let records = vec![
        record("Alice", "FEMALE", "HIGH", "MEDIUM", ["Bob", "", "", ""], "Bob"),
        record("Bob", "MALE", "MEDIUM", "HIGH", ["Alice", "", "", ""], "Alice"),
    ];
    let (graph, forbidden) = build(&records);
    let strategy = CpSatStrategy::with_workers(30, 2);
    let err = strategy.assign(&graph, &forbidden, 2).unwrap_err();
    assert_eq!(err.code(), "NO_SOLUTION_FOUND");
}

#[test]
fn test_zero_timeout_reports_optimization_timeout() {
    let (graph, forbidden) = build(&six_students());
    let strategy = CpSatStrategy::with_workers(0, 2);
    let err = strategy.assign(&graph, &forbidden, 2).unwrap_err();
    assert_eq!(err.code(), "OPTIMIZATION_TIMEOUT");
    assert_eq!(err.params()["timeoutSeconds"], 0);
}

#[test]
fn test_single_class_keeps_everyone_together() {
    // Without a forbidden pair, one class holding everybody is the optimum.
    let records = vec![
        record("Alice", "FEMALE", "HIGH", "MEDIUM", ["Bob", "", "", ""], ""),
        record("Bob", "MALE", "MEDIUM", "HIGH", ["Alice", "Carol", "", ""], ""),
        record("Carol", "FEMALE", "LOW", "LOW", ["Bob", "", "", ""], ""),
    ];
    let (graph, forbidden) = build(&records);
    let strategy = CpSatStrategy::with_workers(30, 1);
    let result = strategy.assign(&graph, &forbidden, 1).unwrap();
    assert_eq!(result.classes.len(), 1);
    assert_eq!(result.classes[0].len(), 3);
    assert_eq!(
        result.metadata.solver.as_ref().unwrap().objective_value,
        2
    );
}
