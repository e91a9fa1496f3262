//! The assignment coordinator and public facade.
//!
//! A service instance owns the validated student table, the shared friendship
//! graph and forbidden pairs, and the configured strategy. Each `assign` call
//! validates the run parameters, executes the strategy, falls back from the
//! optimizer to the heuristic if configured, attaches the evaluation to the
//! run metadata and records the outcome as the last result.
//!
//! The service holds no shared process state; wrappers that serve concurrent
//! requests should construct one instance per request. On a shared instance,
//! `last_assignment_info` reflects the most recently completed call.

use crate::config::ServiceConfig;
use crate::error::AssignmentError;
use crate::evaluate;
use crate::graph::{self, ForbiddenPairs, FriendshipGraph};
use crate::strategy::{
    AssignmentMetadata, AssignmentStrategy, FallbackInfo, Strategy, StrategyKind, STRATEGY_ALIASES,
};
use crate::summary::{self, AssignmentOutput, ClassDetail};
use crate::validate;
use crate::{Classes, StudentRecord};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeSet;

/// The public facade over the assignment core
#[derive(Debug)]
pub struct AssignmentService {
    records: Vec<StudentRecord>,
    graph: FriendshipGraph,
    forbidden: ForbiddenPairs,
    strategy_kind: StrategyKind,
    timeout_seconds: u64,
    fallback_enabled: bool,
    last: Option<AssignmentInfo>,
}

/// Record of the most recent completed assignment call
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentInfo {
    /// Canonical name of the strategy that produced the result (the fallback
    /// strategy, if a fallback happened)
    pub strategy_used: String,
    pub num_classes: usize,
    pub metadata: AssignmentMetadata,
}

impl AssignmentService {
    /// Construct a service for the given student table, configured from the
    /// process environment (read once, here).
    ///
    /// The table is validated and the shared graph is built up front, so an
    /// unusable table fails construction rather than the first `assign` call.
    pub fn new(records: Vec<StudentRecord>) -> Result<AssignmentService, AssignmentError> {
        Self::with_config(records, ServiceConfig::from_env())
    }

    /// Construct a service with an explicit configuration
    pub fn with_config(
        records: Vec<StudentRecord>,
        config: ServiceConfig,
    ) -> Result<AssignmentService, AssignmentError> {
        let students = validate::validate_student_records(&records)?;
        let (graph, forbidden) = graph::build(students);
        validate::ensure_no_isolated_students(&graph)?;
        info!(
            "Assignment service ready: {} students, {} friendships, {} forbidden pairs, strategy {}",
            graph.len(),
            graph.num_edges(),
            forbidden.num_pairs(),
            config.strategy.canonical_name()
        );
        Ok(AssignmentService {
            records,
            graph,
            forbidden,
            strategy_kind: config.strategy,
            timeout_seconds: config.timeout_seconds,
            fallback_enabled: config.fallback_enabled,
            last: None,
        })
    }

    /// Partition the students into `num_classes` classes.
    ///
    /// Returns one name list per class, in input order. The annotated
    /// metadata of the run is available via [`AssignmentService::last_assignment_info`].
    pub fn assign(&mut self, num_classes: usize) -> Result<Vec<Vec<String>>, AssignmentError> {
        validate::validate_assignment_parameters(self.graph.len(), num_classes)?;

        let strategy = Strategy::new(self.strategy_kind, self.timeout_seconds);
        info!(
            "Running {} strategy for {} students in {} classes",
            strategy.name(),
            self.graph.len(),
            num_classes
        );

        let mut result = match strategy.assign(&self.graph, &self.forbidden, num_classes) {
            Ok(result) => result,
            Err(err) if self.strategy_kind == StrategyKind::CpSat && self.fallback_enabled => {
                warn!("Optimizer failed ({}), falling back to greedy strategy", err);
                let fallback = Strategy::new(StrategyKind::Greedy, self.timeout_seconds);
                // A greedy failure is never auto-recovered
                let mut result = fallback.assign(&self.graph, &self.forbidden, num_classes)?;
                result.metadata.fallback = Some(FallbackInfo {
                    fallback_used: true,
                    original_strategy: StrategyKind::CpSat.canonical_name().to_string(),
                    fallback_reason: err.to_string(),
                });
                result
            }
            Err(err) => return Err(err),
        };

        let evaluation = evaluate::evaluate(&self.graph, &self.forbidden, &result.classes);
        info!(
            "Assignment complete with overall quality score {:.1}",
            evaluation.overall_score
        );
        result.metadata.evaluation = Some(evaluation);

        let class_names = self.class_names(&result.classes);
        self.last = Some(AssignmentInfo {
            strategy_used: result.metadata.algorithm.clone(),
            num_classes,
            metadata: result.metadata,
        });
        Ok(class_names)
    }

    /// Metadata of the most recent completed call, if any
    pub fn last_assignment_info(&self) -> Option<&AssignmentInfo> {
        self.last.as_ref()
    }

    /// All accepted strategy names, including aliases
    pub fn available_strategies(&self) -> &'static [&'static str] {
        &STRATEGY_ALIASES
    }

    /// Canonical name of the currently configured strategy
    pub fn strategy_name(&self) -> &'static str {
        self.strategy_kind.canonical_name()
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Switch the configured strategy (and optionally the timeout) for
    /// subsequent calls
    pub fn switch_strategy(
        &mut self,
        name: &str,
        timeout_seconds: Option<u64>,
    ) -> Result<(), AssignmentError> {
        let kind = StrategyKind::from_name(name).ok_or_else(|| AssignmentError::AssignmentFailed {
            reason: format!(
                "unknown strategy '{}'; available: {}",
                name,
                STRATEGY_ALIASES.join(", ")
            ),
        })?;
        self.strategy_kind = kind;
        if let Some(timeout) = timeout_seconds {
            self.timeout_seconds = timeout;
        }
        info!("Switched strategy to {}", kind.canonical_name());
        Ok(())
    }

    /// Full output shape for callers: classes as record lists plus per-class
    /// summaries
    pub fn summarize(&self, classes: &[Vec<String>]) -> AssignmentOutput {
        summary::generate_class_summaries(
            &self.graph,
            &self.forbidden,
            &self.to_index_classes(classes),
            &self.records,
        )
    }

    /// Backward-compatible per-class detail rows
    pub fn class_details(&self, classes: &[Vec<String>]) -> Vec<ClassDetail> {
        summary::class_details(&self.graph, &self.to_index_classes(classes))
    }

    pub fn graph(&self) -> &FriendshipGraph {
        &self.graph
    }

    /// Resolve name-based class lists back to dense-index class sets, e.g.
    /// for rendering or diagnostics. Unknown names are silently dropped.
    pub fn index_classes(&self, classes: &[Vec<String>]) -> Classes {
        self.to_index_classes(classes)
    }

    fn class_names(&self, classes: &Classes) -> Vec<Vec<String>> {
        classes
            .iter()
            .map(|class| class.iter().map(|&s| self.graph.name(s).to_string()).collect())
            .collect()
    }

    fn to_index_classes(&self, classes: &[Vec<String>]) -> Classes {
        classes
            .iter()
            .map(|class| {
                class
                    .iter()
                    .filter_map(|name| self.graph.index_of(name))
                    .collect::<BTreeSet<usize>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::AssignmentService;
    use crate::config::ServiceConfig;
    use crate::strategy::StrategyKind;
    use crate::StudentRecord;

    fn record(
        name: &str,
        gender: &str,
        academic: &str,
        behavioral: &str,
        friends: [&str; 4],
        not_with: &str,
        cluster_id: i64,
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
            cluster_id: Some(cluster_id),
            school: Some("Test School".to_string()),
            comments: None,
        }
    }

    fn six_students() -> Vec<StudentRecord> {
        vec![
            record("Alice", "FEMALE", "HIGH", "MEDIUM", ["Bob", "Charlie", "", ""], "", 1),
            record("Bob", "MALE", "MEDIUM", "HIGH", ["Alice", "David", "", ""], "", 1),
            record("Charlie", "MALE", "LOW", "MEDIUM", ["Alice", "David", "", ""], "Eve", 2),
            record("David", "MALE", "HIGH", "LOW", ["Bob", "Charlie", "", ""], "", 2),
            record("Eve", "FEMALE", "MEDIUM", "HIGH", ["Frank", "", "", ""], "Charlie", 3),
            record("Frank", "MALE", "LOW", "MEDIUM", ["Eve", "", "", ""], "", 3),
        ]
    }

    fn config(strategy: StrategyKind, timeout_seconds: u64, fallback: bool) -> ServiceConfig {
        ServiceConfig {
            strategy,
            timeout_seconds,
            fallback_enabled: fallback,
        }
    }

    fn assert_valid_partition(classes: &[Vec<String>], n: usize) {
        let mut all: Vec<&str> = classes
            .iter()
            .flat_map(|c| c.iter().map(String::as_str))
            .collect();
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before, "a student appears twice");
        assert_eq!(all.len(), n, "not all students assigned");
    }

    fn class_of(classes: &[Vec<String>], name: &str) -> usize {
        classes
            .iter()
            .position(|c| c.iter().any(|s| s == name))
            .unwrap()
    }

    #[test]
    fn test_greedy_assignment_end_to_end() {
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::Greedy, 30, true))
                .unwrap();
        let classes = service.assign(2).unwrap();

        assert_eq!(classes.len(), 2);
        assert_valid_partition(&classes, 6);
        assert_ne!(class_of(&classes, "Charlie"), class_of(&classes, "Eve"));

        let info = service.last_assignment_info().unwrap();
        assert_eq!(info.strategy_used, "greedy");
        assert_eq!(info.num_classes, 2);
        let evaluation = info.metadata.evaluation.as_ref().unwrap();
        assert!(evaluation.overall_score >= 0.0 && evaluation.overall_score <= 100.0);
        assert!(evaluation.not_with_violations.is_empty());
    }

    #[test]
    fn test_cp_sat_assignment_end_to_end() {
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::CpSat, 30, false))
                .unwrap();
        let classes = service.assign(2).unwrap();

        assert_valid_partition(&classes, 6);
        assert_ne!(class_of(&classes, "Charlie"), class_of(&classes, "Eve"));

        let info = service.last_assignment_info().unwrap();
        assert_eq!(info.strategy_used, "cp_sat");
        let solver = info.metadata.solver.as_ref().unwrap();
        assert_eq!(solver.solver_status, "OPTIMAL");
        let evaluation = info.metadata.evaluation.as_ref().unwrap();
        assert!(evaluation.students_without_friends.is_empty());
    }

    #[test]
    fn test_too_many_classes_is_rejected() {
        let records = six_students()[..4].to_vec();
        let mut service =
            AssignmentService::with_config(records, config(StrategyKind::Greedy, 30, true))
                .unwrap();
        let err = service.assign(10).unwrap_err();
        assert_eq!(err.code(), "TOO_MANY_CLASSES");
        assert!(service.last_assignment_info().is_none());
    }

    #[test]
    fn test_construction_rejects_invalid_table() {
        let err = AssignmentService::with_config(
            Vec::new(),
            config(StrategyKind::Greedy, 30, true),
        )
        .unwrap_err();
        assert_eq!(err.code(), "EMPTY_STUDENT_DATA");
    }

    #[test]
    fn test_fallback_on_solver_failure() {
        // A zero timeout forces the optimizer to fail immediately
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::CpSat, 0, true))
                .unwrap();
        let classes = service.assign(2).unwrap();
        assert_valid_partition(&classes, 6);

        let info = service.last_assignment_info().unwrap();
        assert_eq!(info.strategy_used, "greedy");
        let fallback = info.metadata.fallback.as_ref().expect("fallback info");
        assert!(fallback.fallback_used);
        assert_eq!(fallback.original_strategy, "cp_sat");
        assert!(!fallback.fallback_reason.is_empty());
        assert!(info.metadata.evaluation.is_some());
    }

    #[test]
    fn test_no_fallback_when_disabled() {
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::CpSat, 0, false))
                .unwrap();
        let err = service.assign(2).unwrap_err();
        assert_eq!(err.code(), "OPTIMIZATION_TIMEOUT");
        assert!(service.last_assignment_info().is_none());
    }

    #[test]
    fn test_greedy_failure_is_not_recovered() {
        // Fallback only covers the optimizer; parameter errors on the greedy
        // path surface directly.
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::Greedy, 30, true))
                .unwrap();
        assert_eq!(service.assign(0).unwrap_err().code(), "INVALID_CLASS_COUNT");
    }

    #[test]
    fn test_strategy_switching_and_introspection() {
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::Greedy, 30, true))
                .unwrap();
        assert_eq!(service.strategy_name(), "greedy");
        assert!(service.available_strategies().contains(&"cp_sat"));
        assert!(service.available_strategies().contains(&"legacy_greedy"));

        service.switch_strategy("cpsat", Some(10)).unwrap();
        assert_eq!(service.strategy_name(), "cp_sat");
        assert_eq!(service.timeout_seconds(), 10);

        let err = service.switch_strategy("quantum", None).unwrap_err();
        assert_eq!(err.code(), "ASSIGNMENT_FAILED");
        // The previous configuration stays in effect
        assert_eq!(service.strategy_name(), "cp_sat");
    }

    #[test]
    fn test_last_result_reflects_most_recent_call() {
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::Greedy, 30, true))
                .unwrap();
        service.assign(2).unwrap();
        assert_eq!(service.last_assignment_info().unwrap().num_classes, 2);
        service.assign(3).unwrap();
        assert_eq!(service.last_assignment_info().unwrap().num_classes, 3);
    }

    #[test]
    fn test_summaries_and_details() {
        let mut service =
            AssignmentService::with_config(six_students(), config(StrategyKind::Greedy, 30, true))
                .unwrap();
        let classes = service.assign(2).unwrap();

        let output = service.summarize(&classes);
        assert_eq!(output.summaries.len(), 2);
        assert_eq!(
            output.classes.values().map(Vec::len).sum::<usize>(),
            6
        );

        let details = service.class_details(&classes);
        assert_eq!(details.len(), 2);
        for detail in &details {
            assert_eq!(detail.size, detail.students.len());
        }
    }
}
