//! Mutable solver state shared by all search threads.
//!
//! The instance never changes during a solve; everything that accumulates
//! (bounds, the cut archive, the separation mask, visited selections and
//! counters) lives here behind one mutex owned by the callback.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::cut::BendersCut;

/// Observable events raised while separating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolverEvent {
    /// A candidate's exact cost exceeded the master objective although no
    /// separated cut was violated; the candidate was rejected anyway.
    ConsistencyRejection {
        accounting: f64,
        objective: f64,
        forced_cuts: usize,
    },
    UpperBoundImproved {
        value: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverCounters {
    /// Worker LP solves
    pub n_dual_subproblems: usize,
    /// Separation rounds
    pub n_dual_iterations: usize,
    pub time_duals: Duration,
    pub candidates: usize,
    pub rejected_candidates: usize,
    pub lazy_cuts: usize,
    pub user_cuts: usize,
    pub presolve_cuts: usize,
    pub subset_cuts: usize,
}

#[derive(Debug, Clone)]
pub struct SolverState {
    /// Best exact cost seen at any candidate, never increases
    pub upper_bound: f64,
    pub lower_bound: f64,
    pub added_presolve_cuts: bool,
    pub list_cuts: Vec<BendersCut>,
    /// Cells flagged for separation at the latest candidate
    pub generate_cut: Vec<bool>,
    /// Every selection examined at a candidate, in order
    pub all_y: Vec<Vec<bool>>,
    pub best_selection: Option<Vec<bool>>,
    pub counters: SolverCounters,
    pub events: Vec<SolverEvent>,
}

impl SolverState {
    pub fn new(n_cells: usize, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            upper_bound,
            lower_bound,
            added_presolve_cuts: false,
            list_cuts: Vec::new(),
            generate_cut: vec![false; n_cells],
            all_y: Vec::new(),
            best_selection: None,
            counters: SolverCounters::default(),
            events: Vec::new(),
        }
    }

    /// Record the exact cost of a candidate selection, returning whether it
    /// improved the upper bound.
    pub fn record_candidate(&mut self, open: &[bool], cost: f64) -> bool {
        self.counters.candidates += 1;
        self.all_y.push(open.to_vec());
        let improved = cost < self.upper_bound;
        if improved {
            self.upper_bound = cost;
            self.best_selection = Some(open.to_vec());
            self.events.push(SolverEvent::UpperBoundImproved { value: cost });
        }
        improved
    }

    pub fn consistency_rejections(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, SolverEvent::ConsistencyRejection { .. }))
            .count()
    }
}
