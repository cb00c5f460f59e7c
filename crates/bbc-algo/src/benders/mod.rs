//! Branch-and-Benders-cut engine.
//!
//! ```text
//!   ChoiceInstance ──► presolve ──► master (obj, z, z_nr, y [, retained x])
//!                                        │
//!                     BranchAndCut ◄─────┘
//!                       │  candidate / relaxation
//!                       ▼
//!                 BendersCallback ──► WorkerPool (one per thread)
//!                       │                 └─ WorkerLp per (n, r) ──► duals ──► BendersCut
//!                       └─ SolverState (UB, LB, cut archive, counters, events)
//! ```
//!
//! The master minimizes `fixed costs - revenue`; every Benders cell `(n, r)`
//! has an epigraph column `z_nr` bounded below by optimality cuts built from
//! the worker LP of that cell. Draws kept explicit in the master (partial
//! Benders) carry the primal choice rows instead.

pub mod callback;
pub mod cut;
pub mod evaluate;
pub mod master;
pub mod solution;
pub mod state;
pub mod subset;
pub mod worker;

use std::time::Instant;

use bbc_core::{BbcError, ChoiceInstance};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::BendersConfig;
use crate::mip::{BranchAndCut, MipError, MipStatus};
use crate::presolve::run_presolve;

pub use callback::BendersCallback;
pub use cut::{BendersCut, CutTarget};
pub use evaluate::{cell_value, chosen_alternative, evaluate_selection, selection_cost, Evaluation};
pub use master::{build_master, objective_lower_bound, warm_start, MasterLayout, ObjectiveBounds};
pub use solution::{BendersSolution, OpenAlternative, Timing};
pub use state::{SolverCounters, SolverEvent, SolverState};
pub use subset::{subset_cuts, SubsetCut};
pub use worker::{DualValues, WorkerLp, WorkerPool};

#[derive(Debug, Error)]
pub enum BendersError {
    #[error(transparent)]
    Mip(#[from] MipError),

    #[error("instance error: {0}")]
    Instance(#[from] BbcError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Search ended without any feasible selection
    #[error("no feasible selection found (status {status})")]
    NoSolution { status: MipStatus },
}

fn validate_config(config: &BendersConfig) -> Result<(), BendersError> {
    if config.eps_slack < 0.0 || !config.eps_slack.is_finite() {
        return Err(BendersError::InvalidConfig(format!(
            "eps_slack must be a non-negative number, got {}",
            config.eps_slack
        )));
    }
    let fraction = config.presolve.presolve_cut_fraction;
    if !(0.0..=1.0).contains(&fraction) {
        return Err(BendersError::InvalidConfig(format!(
            "presolve_cut_fraction must lie in [0, 1], got {}",
            fraction
        )));
    }
    if (config.presolve.clustering || config.presolve.partial_benders) && config.presolve.n_medoids == 0 {
        return Err(BendersError::InvalidConfig(
            "clustering needs at least one medoid".into(),
        ));
    }
    if config.mip.time_limit_secs.is_some_and(|t| t < 0.0) {
        return Err(BendersError::InvalidConfig("time limit must be non-negative".into()));
    }
    Ok(())
}

/// Solve `inst` with Branch-and-Benders-cut.
///
/// Runs presolve, builds the master, offers pool selections as MIP starts
/// and drives the branch-and-cut search with [`BendersCallback`]. The
/// reported selection is re-evaluated exactly; when the search stops early it
/// is the cheapest of the incumbent, the best candidate the callback saw and
/// the best pool selection.
pub fn branch_and_benders_cut(inst: &ChoiceInstance, config: &BendersConfig) -> Result<BendersSolution, BendersError> {
    validate_config(config)?;
    let started = Instant::now();
    info!(
        customers = inst.n_customers(),
        draws = inst.n_draws(),
        alternatives = inst.n_expanded(),
        threads = config.mip.threads,
        "starting branch-and-Benders-cut"
    );

    let presolve = run_presolve(inst, &config.presolve, &config.mip)?;

    let build_started = Instant::now();
    let mut retained = vec![false; inst.n_draws()];
    if config.presolve.partial_benders {
        for &r in presolve.medoids() {
            retained[r] = true;
        }
    }
    let lower = objective_lower_bound(inst);
    let bounds = ObjectiveBounds {
        lower,
        upper: presolve.upper_bound,
    };
    let (model, layout) = build_master(inst, &retained, bounds, &presolve.incompatible);

    let starts: Vec<Vec<f64>> = if config.presolve.warm_start {
        presolve
            .pool
            .sorted()
            .into_iter()
            .take(config.presolve.max_warm_starts)
            .map(|e| warm_start(inst, &layout, &model, &e.open))
            .collect()
    } else {
        Vec::new()
    };
    let presolve_selections: Vec<Vec<bool>> = presolve
        .pool
        .best_fraction(config.presolve.presolve_cut_fraction)
        .into_iter()
        .map(|e| e.open.clone())
        .collect();
    let presolve_draws = if config.presolve.medoid_cuts_only {
        presolve.clustering.as_ref().map(|c| c.medoid_mask(inst.n_draws()))
    } else {
        None
    };
    let build = build_started.elapsed();
    debug!(
        columns = model.n_columns(),
        rows = model.n_rows(),
        retained_draws = retained.iter().filter(|&&r| r).count(),
        starts = starts.len(),
        "master built"
    );

    let state = SolverState::new(inst.n_cells(), lower, presolve.upper_bound);
    let callback =
        BendersCallback::new(inst, &layout, config, state).with_presolve_cuts(presolve_selections, presolve_draws);

    let search_started = Instant::now();
    let mip = BranchAndCut::new(config.mip.clone()).solve(&model, &callback, &starts)?;
    let branch_and_cut = search_started.elapsed();
    let state = callback.into_state();

    let mut candidates: Vec<Vec<bool>> = Vec::new();
    if let Some(values) = &mip.values {
        candidates.push(evaluate::selection_from_values(layout.y_values(values)));
    }
    candidates.extend(state.best_selection.clone());
    candidates.extend(presolve.pool.best().map(|e| e.open.clone()));
    let selection = candidates
        .into_iter()
        .map(|open| (selection_cost(inst, &open), open))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, open)| open)
        .ok_or(BendersError::NoSolution { status: mip.status })?;

    let status = match mip.status {
        MipStatus::Infeasible => MipStatus::Feasible,
        status => status,
    };
    if let Some(objective) = mip.objective {
        let exact = selection_cost(inst, &selection);
        if (objective - exact).abs() > 1e-6 * objective.abs().max(1.0) {
            debug!(master = objective, exact, "master objective differs from exact evaluation");
        }
    }

    let mut solution = BendersSolution::from_selection(inst, status, selection, mip.best_bound);
    solution.timing = Timing {
        presolve: presolve.elapsed,
        build,
        branch_and_cut,
        total: started.elapsed(),
    };
    solution.counters = state.counters;
    solution.events = state.events;
    solution.mip = mip.stats;
    solution.pool_size = presolve.pool.len();
    solution.incompatibility_cuts = presolve.incompatible.len();
    solution.medoids = presolve.medoids().to_vec();

    let rejections = solution.consistency_rejections();
    if rejections > 0 {
        warn!(rejections, "consistency rejections occurred during the search");
    }
    info!(
        status = %solution.status,
        profit = solution.profit,
        gap = ?solution.gap,
        nodes = solution.mip.nodes,
        elapsed = ?solution.timing.total,
        "branch-and-Benders-cut finished"
    );
    Ok(solution)
}
