//! A generic deadline-aware branch and bound engine with a parallel
//! pseudo-depth-first search.
//!
//! Worker threads share a priority queue of open search nodes, ordered by
//! their depth in the search tree, so the workers prefer digging deep (which
//! yields incumbent solutions early) while still exploring in parallel. The
//! best solution found so far is kept in the shared state; its score bounds
//! all open branches — a node whose upper bound cannot beat the incumbent is
//! discarded unexpanded.
//!
//! The search stops when either all branches are expanded or pruned, or the
//! wall-clock deadline passes. In the latter case the incumbent (if any) is
//! returned and the outcome is flagged as timed out, so the caller can
//! distinguish a proven optimum from a best-effort result.

use log::debug;
use num_traits::bounds::Bounded;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};
use std::{fmt, thread, time};

/// Result of expanding a single search node
#[derive(Debug)]
pub enum NodeResult<Node, Solution, Score> {
    /// The node's subproblem has no solution at all
    NoSolution,
    /// The node is no leaf: continue with the given child nodes. The score is
    /// an upper bound for every solution below this node; children likely to
    /// score well should come first in the vector.
    Branched(Vec<Node>, Score),
    /// A complete solution with its exact score
    Feasible(Solution, Score),
}

/// Counters collected over one search run
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    /// Number of nodes handed to the expansion callback
    pub num_expanded: u32,
    /// Nodes that turned out to have no solution
    pub num_no_solution: u32,
    /// Nodes that produced child nodes
    pub num_branched: u32,
    /// Nodes that produced a complete solution
    pub num_feasible: u32,
    /// How often the incumbent was replaced by a better solution
    pub num_new_incumbent: u32,
    /// Nodes discarded unexpanded because their bound could not beat the
    /// incumbent
    pub num_pruned: u32,
    /// Wall-clock time of the whole search
    pub total_time: time::Duration,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expanded {} nodes ({} branched, {} feasible, {} dead ends), \
             pruned {}, improved the incumbent {} times in {:.3}s",
            self.num_expanded,
            self.num_branched,
            self.num_feasible,
            self.num_no_solution,
            self.num_pruned,
            self.num_new_incumbent,
            self.total_time.as_millis() as f32 / 1000f32,
        )
    }
}

/// Final state of a search run
#[derive(Debug)]
pub struct SearchOutcome<Solution, Score> {
    /// The best solution found, with its score
    pub best: Option<(Solution, Score)>,
    /// Whether the deadline cut the search short. If false, `best` is a
    /// proven optimum (or the problem is proven infeasible).
    pub timed_out: bool,
    pub statistics: Statistics,
}

/// An open node together with its parent's bound, ordered for the shared
/// queue: deeper nodes first, then better parent bounds.
#[derive(PartialOrd, Ord, PartialEq, Eq)]
struct QueuedNode<Node, Score>(Node, Score);

/// Shared state of the worker threads
struct SharedState<Node: Ord, Solution, Score: Ord> {
    queue: BinaryHeap<QueuedNode<Node, Score>>,
    /// Number of workers currently expanding a node. The search is finished
    /// when the queue is empty and no worker is busy.
    busy_workers: u32,
    best_solution: Option<Solution>,
    best_score: Score,
    timed_out: bool,
    statistics: Statistics,
}

struct Search<Node: Ord, Solution, Score: Ord> {
    shared: Mutex<SharedState<Node, Solution, Score>>,
    wakeup: Condvar,
}

/// Run a branch and bound search.
///
/// `expand` is called for every open node and either returns a complete
/// solution, reports a dead end, or branches into child nodes (see
/// [`NodeResult`]). The `Node` ordering must reflect tree depth: `a > b`
/// means a lies deeper in the tree, and deeper nodes are expanded first.
///
/// The search runs on `num_workers` threads until exhaustion or `deadline`,
/// whichever comes first.
pub fn solve<Node, Solution, Score, F>(
    expand: F,
    root: Node,
    num_workers: u32,
    deadline: time::Instant,
) -> SearchOutcome<Solution, Score>
where
    Node: 'static + Ord + Send + fmt::Debug,
    Solution: 'static + Send,
    Score: 'static + Ord + Bounded + Send + Copy + fmt::Display,
    F: 'static + (Fn(Node) -> NodeResult<Node, Solution, Score>) + Send + Sync,
{
    let mut queue = BinaryHeap::new();
    queue.push(QueuedNode(root, Score::max_value()));
    let search = Arc::new(Search {
        shared: Mutex::new(SharedState {
            queue,
            busy_workers: 0,
            best_solution: None,
            best_score: Score::min_value(),
            timed_out: false,
            statistics: Statistics::default(),
        }),
        wakeup: Condvar::new(),
    });

    let tic = time::Instant::now();

    let expand = Arc::new(expand);
    let mut workers = Vec::with_capacity(num_workers as usize);
    for i in 0..num_workers {
        let search = search.clone();
        let expand = expand.clone();
        let handle = thread::Builder::new()
            .name(format!("search worker {}", i))
            .spawn(move || worker(search, expand, deadline))
            .expect("failed to spawn search worker");
        workers.push(handle);
    }
    for handle in workers {
        handle.join().expect("search worker panicked");
    }

    let total_time = tic.elapsed();

    let mut shared = Arc::try_unwrap(search)
        .map_err(|_| ())
        .expect("search state still referenced after workers finished")
        .shared
        .into_inner()
        .expect("search state mutex poisoned");
    shared.statistics.total_time = total_time;

    let best_score = shared.best_score;
    SearchOutcome {
        best: shared.best_solution.map(|solution| (solution, best_score)),
        timed_out: shared.timed_out,
        statistics: shared.statistics,
    }
}

/// Body of one worker thread
fn worker<Node, Solution, Score>(
    search: Arc<Search<Node, Solution, Score>>,
    expand: Arc<dyn Fn(Node) -> NodeResult<Node, Solution, Score>>,
    deadline: time::Instant,
) where
    Node: Ord + Send + fmt::Debug,
    Solution: Send,
    Score: Ord + Copy + fmt::Display,
{
    let mut shared = search.shared.lock().unwrap();
    loop {
        if time::Instant::now() >= deadline {
            // Work was left undone, so any result is only best-effort
            if !shared.queue.is_empty() || shared.busy_workers > 0 {
                shared.timed_out = true;
            }
            search.wakeup.notify_all();
            break;
        }

        if let Some(QueuedNode(node, parent_bound)) = shared.queue.pop() {
            // The bound may have become obsolete while the node sat in the
            // queue; re-check against the current incumbent.
            if parent_bound > shared.best_score {
                shared.busy_workers += 1;

                std::mem::drop(shared);
                debug!("Expanding node {:?}", node);
                let result = expand(node);

                shared = search.shared.lock().unwrap();
                shared.busy_workers -= 1;
                shared.statistics.num_expanded += 1;
                match result {
                    NodeResult::NoSolution => {
                        shared.statistics.num_no_solution += 1;
                    }
                    NodeResult::Feasible(solution, score) => {
                        shared.statistics.num_feasible += 1;
                        if score > shared.best_score {
                            debug!("New incumbent with score {}", score);
                            shared.statistics.num_new_incumbent += 1;
                            shared.best_solution = Some(solution);
                            shared.best_score = score;
                        }
                    }
                    NodeResult::Branched(children, bound) => {
                        shared.statistics.num_branched += 1;
                        for (i, child) in children.into_iter().enumerate() {
                            shared.queue.push(QueuedNode(child, bound));
                            // Other workers can pick up all but the first
                            // child right away
                            if i != 0 {
                                search.wakeup.notify_one();
                            }
                        }
                    }
                }
            } else {
                shared.statistics.num_pruned += 1;
            }

            if shared.queue.is_empty() && shared.busy_workers == 0 {
                search.wakeup.notify_all();
                break;
            }
        } else if shared.busy_workers > 0 {
            // Idle, but busy workers may still branch. Sleep until woken, at
            // most until the deadline.
            let remaining = deadline.saturating_duration_since(time::Instant::now());
            let (guard, _) = search.wakeup.wait_timeout(shared, remaining).unwrap();
            shared = guard;
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{solve, NodeResult};
    use std::time;

    /// Toy problem: maximize the value of a subset of items whose weights fit
    /// a capacity. Nodes fix a prefix of include/exclude decisions.
    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Node(Vec<bool>);

    impl Ord for Node {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            self.0.len().cmp(&other.0.len())
        }
    }
    impl PartialOrd for Node {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    const WEIGHTS: [u32; 5] = [4, 3, 2, 5, 1];
    const VALUES: [u32; 5] = [7, 5, 3, 8, 2];
    const CAPACITY: u32 = 8;

    fn expand(node: Node) -> NodeResult<Node, Vec<bool>, u32> {
        let weight: u32 = node
            .0
            .iter()
            .zip(WEIGHTS.iter())
            .filter(|(take, _)| **take)
            .map(|(_, w)| w)
            .sum();
        if weight > CAPACITY {
            return NodeResult::NoSolution;
        }
        let value: u32 = node
            .0
            .iter()
            .zip(VALUES.iter())
            .filter(|(take, _)| **take)
            .map(|(_, v)| v)
            .sum();
        if node.0.len() == WEIGHTS.len() {
            return NodeResult::Feasible(node.0, value);
        }
        // Optimistic bound: everything still undecided fits
        let bound = value + VALUES[node.0.len()..].iter().sum::<u32>();
        let mut take = node.0.clone();
        take.push(true);
        let mut leave = node.0;
        leave.push(false);
        NodeResult::Branched(vec![Node(take), Node(leave)], bound)
    }

    fn far_deadline() -> time::Instant {
        time::Instant::now() + time::Duration::from_secs(60)
    }

    #[test]
    fn test_finds_the_optimum() {
        let outcome = solve(expand, Node(Vec::new()), 1, far_deadline());
        let (solution, score) = outcome.best.expect("expected a solution");
        assert_eq!(score, 14);
        assert_eq!(solution, vec![true, true, false, false, true]);
        assert!(!outcome.timed_out);
        assert!(outcome.statistics.num_expanded > 0);
        assert!(
            outcome.statistics.num_expanded < 2u32.pow(6) - 1,
            "bounding should cut off part of the tree"
        );
    }

    #[test]
    fn test_parallel_workers_agree() {
        let outcome = solve(expand, Node(Vec::new()), 4, far_deadline());
        let (_, score) = outcome.best.expect("expected a solution");
        assert_eq!(score, 14);
        assert!(!outcome.timed_out);
    }

    #[test]
    fn test_expired_deadline_stops_immediately() {
        let deadline = time::Instant::now() - time::Duration::from_millis(1);
        let outcome = solve(expand, Node(Vec::new()), 2, deadline);
        assert!(outcome.best.is_none());
        assert!(outcome.timed_out);
        assert_eq!(outcome.statistics.num_expanded, 0);
    }
}
