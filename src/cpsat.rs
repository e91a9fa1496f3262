//! The CP-SAT assignment strategy: an exact constraint solver over the
//! boolean assignment model, run on the generic `bab` engine.
//!
//! The model has one boolean x[s,c] per student and class plus one linking
//! boolean per friendship edge and class. The search branches on the class of
//! one student at a time, hardest-to-place students first, and bounds each
//! branch by the intra-class friendship edges already achieved plus all
//! edges still undecided. Hard constraints — exactly one class per student,
//! at least one friend in the own class, forbidden pairs separated, class
//! sizes within `[max(1, ⌊N/K⌋−1), ⌊N/K⌋+2]` — prune the tree directly, so a
//! completed search proves optimality and an exhausted one proves
//! infeasibility. The wall-clock deadline turns an unfinished search into a
//! best-effort (FEASIBLE) result or a timeout error.

use crate::bab::{self, NodeResult};
use crate::error::AssignmentError;
use crate::graph::{ForbiddenPairs, FriendshipGraph};
use crate::strategy::{AssignmentMetadata, AssignmentResult, AssignmentStrategy, SolverMetadata};
use crate::Classes;
use log::{debug, info};
use std::cmp::{max, Reverse};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time;

#[cfg(test)]
mod tests;

/// Objective value: number of friendship edges with both endpoints in the
/// same class
type Score = u32;

/// The exact optimization strategy, with a configurable wall-clock timeout
#[derive(Debug)]
pub struct CpSatStrategy {
    timeout: time::Duration,
    num_workers: u32,
}

impl CpSatStrategy {
    pub fn new(timeout_seconds: u64) -> CpSatStrategy {
        CpSatStrategy {
            timeout: time::Duration::from_secs(timeout_seconds),
            num_workers: num_cpus::get() as u32,
        }
    }

    /// Override the worker count (mainly useful for tests)
    pub fn with_workers(timeout_seconds: u64, num_workers: u32) -> CpSatStrategy {
        CpSatStrategy {
            timeout: time::Duration::from_secs(timeout_seconds),
            num_workers,
        }
    }
}

impl AssignmentStrategy for CpSatStrategy {
    fn name(&self) -> &'static str {
        "cp_sat"
    }

    fn supports_timeout(&self) -> bool {
        true
    }

    fn assign(
        &self,
        graph: &FriendshipGraph,
        forbidden: &ForbiddenPairs,
        num_classes: usize,
    ) -> Result<AssignmentResult, AssignmentError> {
        let tic = time::Instant::now();
        let model = Arc::new(Model::build(graph, forbidden, num_classes));
        info!(
            "Solving assignment model with {} variables and {} constraints for {} students in {} classes",
            model.num_variables,
            model.num_constraints,
            model.num_students,
            num_classes
        );

        let deadline = time::Instant::now() + self.timeout;
        let search_model = model.clone();
        let outcome = bab::solve(
            move |node| expand_node(&search_model, node),
            SearchNode {
                assigned: Vec::new(),
                intra_edges: 0,
            },
            self.num_workers,
            deadline,
        );
        info!("Search finished: {}", outcome.statistics);

        match outcome.best {
            Some((assignment, objective)) => {
                let solver_status = if outcome.timed_out {
                    "FEASIBLE"
                } else {
                    "OPTIMAL"
                };
                info!(
                    "Solver status {} with {} intra-class friendships",
                    solver_status, objective
                );
                let mut metadata = AssignmentMetadata::new(
                    self.name(),
                    tic.elapsed().as_secs_f64(),
                    num_classes,
                    model.num_students,
                );
                metadata.solver = Some(SolverMetadata {
                    solver_status: solver_status.to_string(),
                    solver_time: outcome.statistics.total_time.as_secs_f64(),
                    objective_value: objective,
                    num_variables: model.num_variables,
                    num_constraints: model.num_constraints,
                    timeout_used: self.timeout.as_secs(),
                });
                Ok(AssignmentResult {
                    classes: extract_classes(&assignment, num_classes),
                    metadata,
                })
            }
            None if outcome.timed_out => Err(AssignmentError::OptimizationTimeout {
                timeout_seconds: self.timeout.as_secs(),
            }),
            None => Err(AssignmentError::NoSolutionFound),
        }
    }
}

/// The precomputed problem description, shared read-only by all workers
struct Model {
    num_students: usize,
    num_classes: usize,
    /// Adjacency lists of the friendship graph
    friends: Vec<Vec<usize>>,
    /// Symmetric forbidden matrix over student indices
    forbidden: ndarray::Array2<bool>,
    /// Hard class size bounds: `max(1, ⌊N/K⌋−1)` and `⌊N/K⌋+2`
    min_size: usize,
    max_size: usize,
    /// Branch order over the students: hardest to place first
    order: Vec<usize>,
    /// Position of each student in `order`
    position: Vec<usize>,
    /// For each depth d: friendship edges not yet decided when the first d
    /// students of `order` are fixed
    open_edges: Vec<u32>,
    /// Model dimensions per the boolean formulation, reported in metadata
    num_variables: usize,
    num_constraints: usize,
}

impl Model {
    fn build(graph: &FriendshipGraph, forbidden: &ForbiddenPairs, num_classes: usize) -> Model {
        let n = graph.len();
        let friends: Vec<Vec<usize>> = (0..n).map(|s| graph.friends(s).to_vec()).collect();
        let matrix = forbidden.matrix().clone();

        let target = if num_classes > 0 { n / num_classes } else { 0 };
        let min_size = max(1, target.saturating_sub(1));
        let max_size = target + 2;

        // Branch on students with few friends and many conflicts first;
        // committing them early keeps the subtrees below them small.
        let conflict_count = |s: usize| matrix.row(s).iter().filter(|&&flag| flag).count();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&s| (friends[s].len(), Reverse(conflict_count(s)), s));
        let mut position = vec![0usize; n];
        for (pos, &s) in order.iter().enumerate() {
            position[s] = pos;
        }

        // An edge is decided once both endpoints are fixed, i.e. at the depth
        // one past the later endpoint's position.
        let edges = graph.edges();
        let mut decided_at = vec![0u32; n + 1];
        for &(a, b) in &edges {
            decided_at[max(position[a], position[b]) + 1] += 1;
        }
        let mut open_edges = vec![0u32; n + 1];
        let mut decided = 0u32;
        for depth in 0..=n {
            decided += decided_at[depth];
            open_edges[depth] = edges.len() as u32 - decided;
        }

        // Dimensions of the boolean formulation: assignment booleans x[s,c]
        // plus one linking boolean per edge and class; assignment rows,
        // per-student friendship implications, separation inequalities, size
        // bounds, and three linking inequalities per linking boolean.
        let num_pairs = forbidden.num_pairs();
        let num_variables = n * num_classes + edges.len() * num_classes;
        let num_constraints = n
            + n * num_classes
            + num_pairs * num_classes
            + 2 * num_classes
            + 3 * edges.len() * num_classes;

        Model {
            num_students: n,
            num_classes,
            friends,
            forbidden: matrix,
            min_size,
            max_size,
            order,
            position,
            open_edges,
            num_variables,
            num_constraints,
        }
    }
}

/// One node of the search tree: the classes of the first `assigned.len()`
/// students in branch order, plus the friendship edges already achieved.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SearchNode {
    assigned: Vec<u32>,
    intra_edges: u32,
}

// Deeper nodes order higher, for the pseudo-depth-first queue
impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.assigned.len().cmp(&other.assigned.len())
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Expand one search node: prune infeasible partial assignments, emit a leaf
/// as a solution, or branch the next student over the admissible classes.
fn expand_node(model: &Model, node: SearchNode) -> NodeResult<SearchNode, Vec<u32>, Score> {
    let depth = node.assigned.len();
    let n = model.num_students;
    let k = model.num_classes;

    let mut sizes = vec![0usize; k];
    for &c in &node.assigned {
        sizes[c as usize] += 1;
    }

    // Friendship propagation: a fixed student whose friends are all fixed in
    // other classes can never satisfy the friendship constraint again.
    for (pos, &c) in node.assigned.iter().enumerate() {
        let s = model.order[pos];
        let satisfiable = model.friends[s].iter().any(|&f| {
            let fpos = model.position[f];
            fpos >= depth || node.assigned[fpos] == c
        });
        if !satisfiable {
            debug!(
                "Pruning: student {} can no longer get a friend into class {}",
                s, c
            );
            return NodeResult::NoSolution;
        }
    }

    // Size feasibility: the remaining students must be able to fill every
    // class to its minimum without overflowing any maximum.
    let remaining = n - depth;
    let deficit: usize = sizes
        .iter()
        .map(|&size| model.min_size.saturating_sub(size))
        .sum();
    if deficit > remaining {
        return NodeResult::NoSolution;
    }
    let capacity: usize = sizes.iter().map(|&size| model.max_size - size).sum();
    if capacity < remaining {
        return NodeResult::NoSolution;
    }

    if depth == n {
        let mut assignment = vec![0u32; n];
        for (pos, &c) in node.assigned.iter().enumerate() {
            assignment[model.order[pos]] = c;
        }
        return NodeResult::Feasible(assignment, node.intra_edges);
    }

    let bound = node.intra_edges + model.open_edges[depth];
    let student = model.order[depth];

    let mut children: Vec<(u32, SearchNode)> = Vec::new();
    let mut seen_empty_class = false;
    for c in 0..k {
        if sizes[c] >= model.max_size {
            continue;
        }
        // Empty classes are interchangeable; opening more than the first one
        // only repeats symmetric subtrees.
        if sizes[c] == 0 {
            if seen_empty_class {
                continue;
            }
            seen_empty_class = true;
        }
        let conflict = node.assigned.iter().enumerate().any(|(pos, &cc)| {
            cc as usize == c && model.forbidden[[student, model.order[pos]]]
        });
        if conflict {
            continue;
        }

        let mut friends_here = 0u32;
        let mut all_friends_fixed = true;
        for &f in &model.friends[student] {
            let fpos = model.position[f];
            if fpos < depth {
                if node.assigned[fpos] as usize == c {
                    friends_here += 1;
                }
            } else {
                all_friends_fixed = false;
            }
        }
        // With every friend already placed elsewhere, this class would leave
        // the student friendless for good.
        if all_friends_fixed && friends_here == 0 {
            continue;
        }

        let mut assigned = node.assigned.clone();
        assigned.push(c as u32);
        children.push((
            friends_here,
            SearchNode {
                assigned,
                intra_edges: node.intra_edges + friends_here,
            },
        ));
    }

    if children.is_empty() {
        return NodeResult::NoSolution;
    }
    // Most promising first: classes already holding friends of the student.
    // The sort is stable, so ties keep the ascending class order.
    children.sort_by(|a, b| b.0.cmp(&a.0));
    NodeResult::Branched(children.into_iter().map(|(_, node)| node).collect(), bound)
}

/// Turn a per-student class vector into class sets
fn extract_classes(assignment: &[u32], num_classes: usize) -> Classes {
    let mut classes: Classes = vec![BTreeSet::new(); num_classes];
    for (student, &class) in assignment.iter().enumerate() {
        classes[class as usize].insert(student);
    }
    classes
}
