//! The strategy seam of the assignment core: a capability trait implemented
//! by the two algorithms, a tagged variant for dispatch, and the metadata
//! types every strategy run produces.

use crate::cpsat::CpSatStrategy;
use crate::error::AssignmentError;
use crate::evaluate::Evaluation;
use crate::graph::{ForbiddenPairs, FriendshipGraph};
use crate::greedy::GreedyStrategy;
use crate::Classes;
use serde::Serialize;

/// Common interface of the assignment algorithms
pub trait AssignmentStrategy {
    /// Canonical strategy name, used in metadata and logs
    fn name(&self) -> &'static str;
    /// Whether the strategy honors a wall-clock timeout
    fn supports_timeout(&self) -> bool;
    /// Partition the students of the shared graph into `num_classes` classes
    fn assign(
        &self,
        graph: &FriendshipGraph,
        forbidden: &ForbiddenPairs,
        num_classes: usize,
    ) -> Result<AssignmentResult, AssignmentError>;
}

/// Which algorithm to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Greedy,
    CpSat,
}

/// All accepted strategy names, including backward-compatibility aliases
pub const STRATEGY_ALIASES: [&str; 5] = ["greedy", "cp_sat", "cpsat", "legacy", "legacy_greedy"];

impl StrategyKind {
    /// Resolve a strategy name or alias, case-insensitively
    pub fn from_name(name: &str) -> Option<StrategyKind> {
        match name.trim().to_lowercase().as_str() {
            "greedy" | "legacy" | "legacy_greedy" => Some(StrategyKind::Greedy),
            "cp_sat" | "cpsat" => Some(StrategyKind::CpSat),
            _ => None,
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            StrategyKind::Greedy => "greedy",
            StrategyKind::CpSat => "cp_sat",
        }
    }
}

/// The configured strategy, tagged by algorithm
pub enum Strategy {
    Greedy(GreedyStrategy),
    CpSat(CpSatStrategy),
}

impl Strategy {
    /// Instantiate a strategy of the given kind. The timeout only applies to
    /// strategies that support one.
    pub fn new(kind: StrategyKind, timeout_seconds: u64) -> Strategy {
        match kind {
            StrategyKind::Greedy => Strategy::Greedy(GreedyStrategy::new()),
            StrategyKind::CpSat => Strategy::CpSat(CpSatStrategy::new(timeout_seconds)),
        }
    }
}

impl AssignmentStrategy for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Greedy(s) => s.name(),
            Strategy::CpSat(s) => s.name(),
        }
    }

    fn supports_timeout(&self) -> bool {
        match self {
            Strategy::Greedy(s) => s.supports_timeout(),
            Strategy::CpSat(s) => s.supports_timeout(),
        }
    }

    fn assign(
        &self,
        graph: &FriendshipGraph,
        forbidden: &ForbiddenPairs,
        num_classes: usize,
    ) -> Result<AssignmentResult, AssignmentError> {
        match self {
            Strategy::Greedy(s) => s.assign(graph, forbidden, num_classes),
            Strategy::CpSat(s) => s.assign(graph, forbidden, num_classes),
        }
    }
}

/// A computed class assignment together with its run metadata
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub classes: Classes,
    pub metadata: AssignmentMetadata,
}

/// Metadata describing one strategy run.
///
/// The solver and fallback blocks are flattened into the serialized record,
/// so callers see the flat shape the metadata always had.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentMetadata {
    pub algorithm: String,
    /// Wall-clock seconds spent in the strategy
    pub execution_time: f64,
    pub num_classes: usize,
    pub num_students: usize,
    #[serde(flatten)]
    pub solver: Option<SolverMetadata>,
    #[serde(flatten)]
    pub fallback: Option<FallbackInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl AssignmentMetadata {
    pub fn new(
        algorithm: &str,
        execution_time: f64,
        num_classes: usize,
        num_students: usize,
    ) -> AssignmentMetadata {
        AssignmentMetadata {
            algorithm: algorithm.to_string(),
            execution_time,
            num_classes,
            num_students,
            solver: None,
            fallback: None,
            evaluation: None,
        }
    }
}

/// Extra metadata of an optimizer run
#[derive(Debug, Clone, Serialize)]
pub struct SolverMetadata {
    /// "OPTIMAL" when the search was exhausted, "FEASIBLE" when the deadline
    /// cut it short with an incumbent
    pub solver_status: String,
    /// Seconds spent inside the solver
    pub solver_time: f64,
    /// Number of intra-class friendship edges achieved
    pub objective_value: u32,
    pub num_variables: usize,
    pub num_constraints: usize,
    /// The configured wall-clock timeout in seconds
    pub timeout_used: u64,
}

/// Marks a result that was produced by the fallback strategy
#[derive(Debug, Clone, Serialize)]
pub struct FallbackInfo {
    pub fallback_used: bool,
    pub original_strategy: String,
    pub fallback_reason: String,
}
