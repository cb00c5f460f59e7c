//! Multi-threaded LP-based branch-and-cut driver.
//!
//! ```text
//!             ┌────────── Mutex<Search> ───────────┐
//!             │ best-bound queue, incumbent, stats │◄──── Condvar wake-ups
//!             └─────────────────┬──────────────────┘
//!        ┌──────────────┬───────┴──────┬──────────────┐
//!    thread 0       thread 1       thread 2       thread k      std::thread::scope
//!    Worker 0       Worker 1       Worker 2       Worker k      (GenericCallback::thread_up)
//!        └──────────────┴───────┬──────┴──────────────┘
//!                     RwLock<CutPool>   global cut pool (deduplicated)
//! ```
//!
//! Each thread pops the node with the smallest LP bound, solves its relaxation
//! with every pooled cut, then either branches on the most fractional integral
//! column, adds user cuts from the relaxation hook, or hands an integral point
//! to the candidate hook. A rejected candidate adds lazy cuts to the pool and
//! the node is re-solved.

use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::callback::{CallbackContext, ContextKind, CutBatch, GenericCallback, WorkerGuard};
use super::cut_pool::CutPool;
use super::model::{MipModel, Row};
use super::node::{most_fractional, Node};
use super::relaxation::{solve_relaxation, LpOutcome};
use super::MipError;
use crate::lp::LpSolverKind;

const POLL: Duration = Duration::from_millis(50);
const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MipConfig {
    /// Search threads, each owning one callback worker
    pub threads: usize,
    pub time_limit_secs: Option<f64>,
    pub relative_gap: f64,
    pub absolute_gap: f64,
    pub integrality_tol: f64,
    pub feasibility_tol: f64,
    pub lp_solver: LpSolverKind,
    /// Relaxation separation rounds per node
    pub max_cut_rounds: usize,
    /// Consecutive rejections without a violated cut before a node is dropped
    pub stall_limit: usize,
}

impl Default for MipConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            time_limit_secs: None,
            relative_gap: 1e-6,
            absolute_gap: 1e-6,
            integrality_tol: 1e-5,
            feasibility_tol: 1e-6,
            lp_solver: LpSolverKind::default(),
            max_cut_rounds: 10,
            stall_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MipStatus {
    /// Search tree exhausted
    Optimal,
    /// Incumbent found but part of the tree was dropped
    Feasible,
    Infeasible,
    TimeLimit,
}

impl MipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MipStatus::Optimal => "optimal",
            MipStatus::Feasible => "feasible",
            MipStatus::Infeasible => "infeasible",
            MipStatus::TimeLimit => "time_limit",
        }
    }
}

impl std::fmt::Display for MipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MipStats {
    pub nodes: usize,
    pub lp_solves: usize,
    pub lazy_cuts: usize,
    pub user_cuts: usize,
    /// Cuts already in the pool with an equal or tighter right-hand side
    pub duplicate_cuts: usize,
    pub rejected_candidates: usize,
    pub stalled_candidates: usize,
    pub pruned: usize,
    pub accepted_starts: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct MipSolution {
    pub status: MipStatus,
    pub objective: Option<f64>,
    pub values: Option<Vec<f64>>,
    /// Lower bound on the optimal objective
    pub best_bound: f64,
    pub stats: MipStats,
}

impl MipSolution {
    /// Relative gap between incumbent and bound, `None` without incumbent.
    pub fn gap(&self) -> Option<f64> {
        self.objective.map(|obj| {
            let diff = (obj - self.best_bound).max(0.0);
            diff / obj.abs().max(1e-10)
        })
    }
}

/// Branch-and-cut driver over LP relaxations.
#[derive(Debug, Clone, Default)]
pub struct BranchAndCut {
    config: MipConfig,
}

struct Incumbent {
    objective: f64,
    values: Vec<f64>,
}

#[derive(Default)]
struct Search {
    queue: BinaryHeap<Node>,
    active: usize,
    incumbent: Option<Incumbent>,
    stats: MipStats,
    failure: Option<MipError>,
    finished: bool,
    timed_out: bool,
    dropped_nodes: bool,
}

impl Search {
    fn cutoff(&self, config: &MipConfig) -> f64 {
        match &self.incumbent {
            Some(inc) => {
                let tol = config
                    .absolute_gap
                    .max(config.relative_gap * inc.objective.abs());
                inc.objective - tol
            }
            None => f64::INFINITY,
        }
    }
}

enum NodeResult {
    Children(Node, Node),
    Requeue(Node),
    Closed,
}

struct Shared<'a, C> {
    model: &'a MipModel,
    callback: &'a C,
    config: &'a MipConfig,
    search: Mutex<Search>,
    wake: Condvar,
    cuts: RwLock<CutPool>,
    deadline: Option<Instant>,
    start: Instant,
}

impl BranchAndCut {
    pub fn new(config: MipConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MipConfig {
        &self.config
    }

    /// Solve `model`, calling `callback` from every search thread.
    ///
    /// `starts` are full column assignments. Feasible ones are offered to the
    /// candidate hook before the search begins and become the first incumbent
    /// when accepted. Any callback error stops all threads and is returned.
    pub fn solve<C: GenericCallback>(
        &self,
        model: &MipModel,
        callback: &C,
        starts: &[Vec<f64>],
    ) -> Result<MipSolution, MipError> {
        model.validate().map_err(MipError::InvalidModel)?;
        let start = Instant::now();
        let shared = Shared {
            model,
            callback,
            config: &self.config,
            search: Mutex::new(Search::default()),
            wake: Condvar::new(),
            cuts: RwLock::new(CutPool::new()),
            deadline: self
                .config
                .time_limit_secs
                .map(|secs| start + Duration::from_secs_f64(secs.max(0.0))),
            start,
        };

        if !starts.is_empty() {
            shared.process_starts(starts)?;
        }

        let threads = self.config.threads.max(1);
        info!(
            columns = model.n_columns(),
            rows = model.n_rows(),
            threads,
            "starting branch-and-cut"
        );
        shared.lock().queue.push(Node::root(model));

        thread::scope(|scope| {
            for index in 0..threads {
                let shared = &shared;
                scope.spawn(move || shared.run_worker(index));
            }
        });

        shared.into_solution()
    }
}

impl<'a, C: GenericCallback> Shared<'a, C> {
    fn lock(&self) -> MutexGuard<'_, Search> {
        self.search.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn pooled_cuts(&self) -> Arc<Vec<Row>> {
        self.cuts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    fn add_cuts(&self, cuts: Vec<Row>, kind: ContextKind) {
        if cuts.is_empty() {
            return;
        }
        let count = cuts.len();
        let stored = self
            .cuts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(cuts);
        let mut search = self.lock();
        search.stats.duplicate_cuts += count - stored;
        match kind {
            ContextKind::Candidate => search.stats.lazy_cuts += count,
            ContextKind::Relaxation => search.stats.user_cuts += count,
        }
    }

    fn offer_incumbent(&self, objective: f64, values: Vec<f64>) {
        let mut search = self.lock();
        let improves = search
            .incumbent
            .as_ref()
            .map_or(true, |inc| objective < inc.objective - 1e-9);
        if improves {
            info!(
                objective,
                elapsed = ?self.start.elapsed(),
                "new incumbent"
            );
            search.incumbent = Some(Incumbent { objective, values });
        }
    }

    fn process_starts(&self, starts: &[Vec<f64>]) -> Result<(), MipError> {
        let mut guard = WorkerGuard::up(self.callback, 0)?;
        for (k, values) in starts.iter().enumerate() {
            if !self.model.is_feasible(values, self.config.feasibility_tol) {
                debug!(start = k, "skipping infeasible MIP start");
                continue;
            }
            let objective = self.model.objective_value(values);
            let ctx = CallbackContext::candidate_at(values, objective);
            let CutBatch { cuts, reject } = self.callback.candidate(&ctx, guard.get())?;
            self.add_cuts(cuts, ContextKind::Candidate);
            if reject {
                debug!(start = k, "MIP start rejected by callback");
                continue;
            }
            self.lock().stats.accepted_starts += 1;
            self.offer_incumbent(objective, values.clone());
        }
        Ok(())
    }

    fn run_worker(&self, index: usize) {
        let mut guard = match WorkerGuard::up(self.callback, index) {
            Ok(guard) => guard,
            Err(err) => {
                self.fail(err.into());
                return;
            }
        };
        while let Some(node) = self.next_node() {
            let result = self.process(node, index, guard.get());
            self.finish_node(result);
        }
    }

    fn fail(&self, err: MipError) {
        let mut search = self.lock();
        if search.failure.is_none() {
            search.failure = Some(err);
        }
        search.finished = true;
        self.wake.notify_all();
    }

    fn next_node(&self) -> Option<Node> {
        let mut search = self.lock();
        loop {
            if search.finished {
                return None;
            }
            if self.expired() {
                search.timed_out = true;
                search.finished = true;
                self.wake.notify_all();
                return None;
            }
            if let Some(node) = search.queue.pop() {
                if node.bound >= search.cutoff(self.config) {
                    search.stats.pruned += 1;
                    continue;
                }
                search.active += 1;
                search.stats.nodes += 1;
                if search.stats.nodes % PROGRESS_EVERY == 0 {
                    debug!(
                        nodes = search.stats.nodes,
                        open = search.queue.len(),
                        bound = node.bound,
                        incumbent = search.incumbent.as_ref().map(|i| i.objective),
                        "branch-and-cut progress"
                    );
                }
                return Some(node);
            }
            if search.active == 0 {
                search.finished = true;
                self.wake.notify_all();
                return None;
            }
            search = match self.wake.wait_timeout(search, POLL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn finish_node(&self, result: Result<NodeResult, MipError>) {
        let mut search = self.lock();
        search.active -= 1;
        match result {
            Ok(NodeResult::Children(down, up)) => {
                search.queue.push(down);
                search.queue.push(up);
            }
            Ok(NodeResult::Requeue(node)) => search.queue.push(node),
            Ok(NodeResult::Closed) => {}
            Err(err) => {
                if search.failure.is_none() {
                    search.failure = Some(err);
                }
                search.finished = true;
            }
        }
        self.wake.notify_all();
    }

    fn process(
        &self,
        mut node: Node,
        thread: usize,
        worker: &mut C::Worker,
    ) -> Result<NodeResult, MipError> {
        let config = self.config;
        let mut cut_rounds = 0;
        let mut stalls = 0;
        loop {
            if self.expired() {
                return Ok(NodeResult::Requeue(node));
            }
            let cuts = self.pooled_cuts();
            let outcome = solve_relaxation(
                self.model,
                &cuts,
                &node.lower,
                &node.upper,
                config.lp_solver,
                config.feasibility_tol,
            )?;
            self.lock().stats.lp_solves += 1;

            let (values, objective) = match outcome {
                LpOutcome::Infeasible => return Ok(NodeResult::Closed),
                LpOutcome::Unbounded => {
                    let ctx = CallbackContext {
                        kind: ContextKind::Candidate,
                        values: &[],
                        objective: f64::NEG_INFINITY,
                        candidate_point: false,
                        thread,
                        depth: node.depth,
                    };
                    self.callback.candidate(&ctx, worker)?;
                    return Err(MipError::Unbounded);
                }
                LpOutcome::Optimal { values, objective } => (values, objective),
            };

            {
                let mut search = self.lock();
                if objective >= search.cutoff(config) {
                    search.stats.pruned += 1;
                    return Ok(NodeResult::Closed);
                }
            }
            node.bound = node.bound.max(objective);

            match most_fractional(self.model, &values, config.integrality_tol) {
                None => {
                    let ctx = CallbackContext {
                        kind: ContextKind::Candidate,
                        values: &values,
                        objective,
                        candidate_point: true,
                        thread,
                        depth: node.depth,
                    };
                    let CutBatch { cuts, reject } = self.callback.candidate(&ctx, worker)?;
                    let violated = cuts
                        .iter()
                        .any(|c| c.violation(&values) > config.feasibility_tol);
                    self.add_cuts(cuts, ContextKind::Candidate);
                    if !reject {
                        self.offer_incumbent(objective, values);
                        return Ok(NodeResult::Closed);
                    }
                    let mut search = self.lock();
                    search.stats.rejected_candidates += 1;
                    if violated {
                        stalls = 0;
                    } else {
                        stalls += 1;
                        if stalls >= config.stall_limit {
                            warn!(
                                depth = node.depth,
                                objective,
                                "candidate rejected without a violated cut, dropping node"
                            );
                            search.stats.stalled_candidates += 1;
                            search.dropped_nodes = true;
                            return Ok(NodeResult::Closed);
                        }
                    }
                }
                Some((j, value)) => {
                    if self.callback.separates_relaxations() && cut_rounds < config.max_cut_rounds {
                        let ctx = CallbackContext {
                            kind: ContextKind::Relaxation,
                            values: &values,
                            objective,
                            candidate_point: true,
                            thread,
                            depth: node.depth,
                        };
                        let batch = self.callback.relaxation(&ctx, worker)?;
                        let violated: Vec<Row> = batch
                            .cuts
                            .into_iter()
                            .filter(|c| c.violation(&values) > config.feasibility_tol)
                            .collect();
                        if !violated.is_empty() {
                            cut_rounds += 1;
                            self.add_cuts(violated, ContextKind::Relaxation);
                            continue;
                        }
                    }
                    let (down, up) = node.branch(j, value, node.bound);
                    return Ok(NodeResult::Children(down, up));
                }
            }
        }
    }

    fn into_solution(self) -> Result<MipSolution, MipError> {
        let elapsed = self.start.elapsed();
        let mut search = self
            .search
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = search.failure.take() {
            return Err(err);
        }
        search.stats.elapsed = elapsed;

        let incumbent_objective = search.incumbent.as_ref().map(|i| i.objective);
        let status = if search.timed_out {
            MipStatus::TimeLimit
        } else if incumbent_objective.is_some() {
            if search.dropped_nodes {
                MipStatus::Feasible
            } else {
                MipStatus::Optimal
            }
        } else {
            MipStatus::Infeasible
        };

        let open_bound = search
            .queue
            .iter()
            .map(|n| n.bound)
            .fold(f64::INFINITY, f64::min);
        let best_bound = match status {
            MipStatus::TimeLimit => open_bound.min(incumbent_objective.unwrap_or(f64::INFINITY)),
            _ => incumbent_objective.unwrap_or(f64::INFINITY),
        };

        info!(
            %status,
            objective = incumbent_objective,
            best_bound,
            nodes = search.stats.nodes,
            lazy_cuts = search.stats.lazy_cuts,
            user_cuts = search.stats.user_cuts,
            elapsed = ?elapsed,
            "branch-and-cut finished"
        );

        let (objective, values) = match search.incumbent {
            Some(inc) => (Some(inc.objective), Some(inc.values)),
            None => (None, None),
        };
        Ok(MipSolution {
            status,
            objective,
            values,
            best_bound,
            stats: search.stats,
        })
    }
}
