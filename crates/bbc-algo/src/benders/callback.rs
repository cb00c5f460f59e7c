//! Lazy-constraint and user-cut separation of Benders cuts.
//!
//! Each search thread owns a [`WorkerPool`] with one worker LP per Benders
//! cell; the solver state (bounds, cut archive, counters) is shared behind a
//! mutex. At an integral candidate the exact cost of the rounded selection is
//! recorded as an upper bound, then cells whose epigraph estimate is too low
//! are separated.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bbc_core::ChoiceInstance;
use tracing::{debug, warn};

use super::cut::BendersCut;
use super::evaluate::{cell_value, selection_cost, selection_from_values};
use super::master::MasterLayout;
use super::state::{SolverEvent, SolverState};
use super::subset::subset_cuts;
use super::worker::WorkerPool;
use crate::config::{BendersConfig, CutGeneration};
use crate::mip::{CallbackContext, CallbackError, CutBatch, GenericCallback, Row};

pub struct BendersCallback<'a> {
    inst: &'a ChoiceInstance,
    layout: &'a MasterLayout,
    config: &'a BendersConfig,
    /// Selections whose cuts are added at the first candidate
    presolve_selections: Vec<Vec<bool>>,
    /// Draws receiving presolve cuts, all when `None`
    presolve_draws: Option<Vec<bool>>,
    state: Mutex<SolverState>,
}

/// Cuts produced by one separation pass.
#[derive(Default)]
struct Separated {
    rows: Vec<Row>,
    cuts: Vec<BendersCut>,
    violated: usize,
}

impl Separated {
    fn push(&mut self, inst: &ChoiceInstance, layout: &MasterLayout, cut: BendersCut, violated: bool) {
        if violated {
            self.violated += 1;
        }
        self.rows.push(cut.to_row(layout, inst));
        self.cuts.push(cut);
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

fn as_point(open: &[bool]) -> Vec<f64> {
    open.iter().map(|&o| if o { 1.0 } else { 0.0 }).collect()
}

impl<'a> BendersCallback<'a> {
    pub fn new(
        inst: &'a ChoiceInstance,
        layout: &'a MasterLayout,
        config: &'a BendersConfig,
        state: SolverState,
    ) -> Self {
        Self {
            inst,
            layout,
            config,
            presolve_selections: Vec::new(),
            presolve_draws: None,
            state: Mutex::new(state),
        }
    }

    /// Separate cuts at `selections` once, when the first candidate arrives.
    pub fn with_presolve_cuts(mut self, selections: Vec<Vec<bool>>, draws: Option<Vec<bool>>) -> Self {
        self.presolve_selections = selections;
        self.presolve_draws = draws;
        self
    }

    pub fn into_state(self) -> SolverState {
        self.state.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, SolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Benders cells as `(flat index, n, r, epigraph column)`.
    fn benders_cells(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> + '_ {
        self.inst
            .cells()
            .enumerate()
            .filter_map(|(cell, (n, r))| self.layout.z_cell(cell).map(|col| (cell, n, r, col)))
    }

    fn take_presolve_selections(&self) -> Vec<Vec<bool>> {
        let mut state = self.lock();
        if state.added_presolve_cuts {
            return Vec::new();
        }
        state.added_presolve_cuts = true;
        self.presolve_selections.clone()
    }

    fn presolve_cuts(
        &self,
        values: &[f64],
        y: &[f64],
        pool: &mut WorkerPool,
        out: &mut Separated,
    ) -> Result<(), CallbackError> {
        let selections = self.take_presolve_selections();
        if selections.is_empty() {
            return Ok(());
        }
        let eps = self.config.eps_slack;
        for open in &selections {
            let point = as_point(open);
            if self.config.disaggregated_cuts {
                for (cell, n, r, col) in self.benders_cells() {
                    if self.presolve_draws.as_ref().is_some_and(|d| !d[r]) {
                        continue;
                    }
                    let duals = pool.solve(cell, &point)?;
                    let cut = BendersCut::from_duals(self.inst, n, r, &duals);
                    let violated = cut.is_violated(y, values[col], eps);
                    out.push(self.inst, self.layout, cut, violated);
                }
            } else {
                let cut = self.aggregate_cut(&point, pool)?;
                let violated = cut.is_violated(y, values[self.layout.z], eps);
                out.push(self.inst, self.layout, cut, violated);
            }
        }
        debug!(selections = selections.len(), cuts = out.len(), "added presolve cuts");
        Ok(())
    }

    fn aggregate_cut(&self, point: &[f64], pool: &mut WorkerPool) -> Result<BendersCut, CallbackError> {
        let mut cuts = Vec::new();
        for (cell, n, r, _) in self.benders_cells() {
            let duals = pool.solve(cell, point)?;
            cuts.push(BendersCut::from_duals(self.inst, n, r, &duals));
        }
        Ok(BendersCut::aggregate(&cuts, self.inst.n_expanded()))
    }

    /// Separate every flagged cell at `point`, keeping violated cuts and,
    /// when `keep_all` is set, every other cut as well.
    #[allow(clippy::too_many_arguments)]
    fn separate(
        &self,
        values: &[f64],
        y: &[f64],
        point: &[f64],
        flagged: &[bool],
        keep_all: bool,
        pool: &mut WorkerPool,
        out: &mut Separated,
    ) -> Result<(), CallbackError> {
        let eps = self.config.eps_slack;
        if self.config.disaggregated_cuts {
            for (cell, n, r, col) in self.benders_cells() {
                if !flagged[cell] {
                    continue;
                }
                let duals = pool.solve(cell, point)?;
                let cut = BendersCut::from_duals(self.inst, n, r, &duals);
                let violated = cut.is_violated(y, values[col], eps);
                if violated || keep_all {
                    out.push(self.inst, self.layout, cut, violated);
                }
            }
        } else if flagged.iter().any(|&f| f) {
            let cut = self.aggregate_cut(point, pool)?;
            let violated = cut.is_violated(y, values[self.layout.z], eps);
            if violated || keep_all {
                out.push(self.inst, self.layout, cut, violated);
            }
        }
        Ok(())
    }

    /// Cells whose epigraph estimate lies more than `slack` below `φ`.
    fn flag_cells(&self, values: &[f64], phi: &[f64], slack: f64) -> Vec<bool> {
        let mut flagged = vec![false; self.inst.n_cells()];
        if self.config.disaggregated_cuts {
            for (cell, _, _, col) in self.benders_cells() {
                flagged[cell] = phi[cell] > values[col] + slack;
            }
        } else {
            let total: f64 = self.benders_cells().map(|(cell, ..)| phi[cell]).sum();
            if total > values[self.layout.z] + slack {
                for (cell, ..) in self.benders_cells() {
                    flagged[cell] = true;
                }
            }
        }
        flagged
    }
}

impl GenericCallback for BendersCallback<'_> {
    type Worker = WorkerPool;

    fn thread_up(&self, index: usize) -> Result<WorkerPool, CallbackError> {
        let pool = WorkerPool::new(self.inst, self.layout.retained_draws(), self.config.mip.lp_solver);
        debug!(thread = index, worker_lps = pool.len(), "worker pool ready");
        Ok(pool)
    }

    fn separates_relaxations(&self) -> bool {
        self.config.separate_fractional
    }

    fn relaxation(&self, ctx: &CallbackContext<'_>, pool: &mut WorkerPool) -> Result<CutBatch, CallbackError> {
        let values = ctx.values();
        let y = self.layout.y_values(values);
        let started = Instant::now();
        let solves = pool.solves;

        let all = vec![true; self.inst.n_cells()];
        let mut out = Separated::default();
        self.separate(values, y, y, &all, false, pool, &mut out)?;

        let mut state = self.lock();
        state.counters.n_dual_iterations += 1;
        state.counters.n_dual_subproblems += pool.solves - solves;
        state.counters.time_duals += started.elapsed();
        state.counters.user_cuts += out.len();
        state.list_cuts.extend(out.cuts);
        Ok(CutBatch {
            cuts: out.rows,
            reject: false,
        })
    }

    fn candidate(&self, ctx: &CallbackContext<'_>, pool: &mut WorkerPool) -> Result<CutBatch, CallbackError> {
        if !ctx.is_candidate_point() {
            return Err(CallbackError::UnboundedCandidate);
        }
        let values = ctx.values();
        let y = self.layout.y_values(values);
        let open = selection_from_values(y);
        let point = as_point(&open);
        let started = Instant::now();
        let solves = pool.solves;

        let phi: Vec<f64> = self
            .inst
            .cells()
            .map(|(n, r)| cell_value(self.inst, n, r, &open))
            .collect();
        let accounting = selection_cost(self.inst, &open);
        self.lock().record_candidate(&open, accounting);

        let mut out = Separated::default();
        self.presolve_cuts(values, y, pool, &mut out)?;
        let presolve_cuts = out.len();

        let flagged = self.flag_cells(values, &phi, self.config.eps_slack);
        let keep_all = self.config.cut_generation == CutGeneration::AllGenerated;
        self.separate(values, y, &point, &flagged, keep_all, pool, &mut out)?;

        let mut subset = Vec::new();
        if self.config.subset_cuts {
            subset = subset_cuts(self.inst, &open, self.config.subset_max_depth, self.config.subset_widen);
        }
        let subset_violated = subset.iter().any(|c| c.is_violated(y, self.config.eps_slack));
        let mut reject = out.violated > 0 || subset_violated;

        let mut forced = None;
        if !reject && accounting > ctx.objective() + self.config.eps_slack {
            let all_short = self.flag_cells(values, &phi, 0.0);
            let before = out.len();
            self.separate(values, y, &point, &all_short, true, pool, &mut out)?;
            forced = Some(out.len() - before);
            reject = true;
        }

        let mut state = self.lock();
        if let Some(forced_cuts) = forced {
            warn!(
                accounting,
                objective = ctx.objective(),
                forced_cuts,
                "candidate cost exceeds master objective without a violated cut, rejecting"
            );
            state.events.push(SolverEvent::ConsistencyRejection {
                accounting,
                objective: ctx.objective(),
                forced_cuts,
            });
        }
        state.generate_cut = flagged;
        state.counters.n_dual_iterations += 1;
        state.counters.n_dual_subproblems += pool.solves - solves;
        state.counters.time_duals += started.elapsed();
        state.counters.presolve_cuts += presolve_cuts;
        state.counters.lazy_cuts += out.len() - presolve_cuts;
        state.counters.subset_cuts += subset.len();
        if reject {
            state.counters.rejected_candidates += 1;
        }
        state.list_cuts.extend(out.cuts);
        drop(state);

        let mut cuts = out.rows;
        cuts.extend(subset.iter().map(|c| c.to_row(self.layout)));
        Ok(CutBatch { cuts, reject })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benders::master::{build_master, objective_lower_bound, warm_start, ObjectiveBounds};
    use bbc_core::test_utils::toy_instance;

    fn no_bounds(inst: &ChoiceInstance) -> ObjectiveBounds {
        ObjectiveBounds {
            lower: objective_lower_bound(inst),
            upper: f64::INFINITY,
        }
    }

    #[test]
    fn exact_start_is_accepted() {
        let inst = toy_instance();
        let config = BendersConfig::default();
        let (model, layout) = build_master(&inst, &[false, false], no_bounds(&inst), &[]);
        let state = SolverState::new(inst.n_cells(), objective_lower_bound(&inst), f64::INFINITY);
        let callback = BendersCallback::new(&inst, &layout, &config, state);
        let mut pool = callback.thread_up(0).unwrap();

        let values = warm_start(&inst, &layout, &model, &[true, true, true]);
        let ctx = CallbackContext::candidate_at(&values, model.objective_value(&values));
        let batch = callback.candidate(&ctx, &mut pool).unwrap();
        assert!(!batch.reject);

        let state = callback.into_state();
        assert!((state.upper_bound + 35.0).abs() < 1e-9);
        assert_eq!(state.counters.candidates, 1);
    }

    #[test]
    fn underestimated_cells_are_cut() {
        let inst = toy_instance();
        let config = BendersConfig::default();
        let (model, layout) = build_master(&inst, &[false, false], no_bounds(&inst), &[]);
        let state = SolverState::new(inst.n_cells(), objective_lower_bound(&inst), f64::INFINITY);
        let callback = BendersCallback::new(&inst, &layout, &config, state);
        let mut pool = callback.thread_up(0).unwrap();

        let mut values = warm_start(&inst, &layout, &model, &[true, true, true]);
        // pretend every cell earns 100
        let mut z = 0.0;
        for cell in 0..inst.n_cells() {
            let col = layout.z_cell(cell).unwrap();
            values[col] = -100.0;
            z -= 100.0;
        }
        values[layout.z] = z;
        values[layout.obj] = 5.0 + z;
        let objective = values[layout.obj];
        let ctx = CallbackContext::candidate_at(&values, objective);
        let batch = callback.candidate(&ctx, &mut pool).unwrap();
        assert!(batch.reject);
        assert_eq!(batch.cuts.len(), inst.n_cells());
        for row in &batch.cuts {
            assert!(row.violation(&values) > 0.0);
        }
        let state = callback.into_state();
        assert_eq!(state.counters.lazy_cuts, inst.n_cells());
        assert_eq!(state.counters.rejected_candidates, 1);
        assert!(state.generate_cut.iter().all(|&g| g));
    }

    #[test]
    fn unbounded_candidate_is_an_error() {
        let inst = toy_instance();
        let config = BendersConfig::default();
        let (_, layout) = build_master(&inst, &[false, false], no_bounds(&inst), &[]);
        let state = SolverState::new(inst.n_cells(), -100.0, f64::INFINITY);
        let callback = BendersCallback::new(&inst, &layout, &config, state);
        let mut pool = callback.thread_up(0).unwrap();
        let ctx = CallbackContext {
            candidate_point: false,
            ..CallbackContext::candidate_at(&[], f64::NEG_INFINITY)
        };
        assert!(matches!(
            callback.candidate(&ctx, &mut pool),
            Err(CallbackError::UnboundedCandidate)
        ));
    }

    #[test]
    fn presolve_cuts_are_added_once() {
        let inst = toy_instance();
        let config = BendersConfig::default();
        let (model, layout) = build_master(&inst, &[false, false], no_bounds(&inst), &[]);
        let state = SolverState::new(inst.n_cells(), objective_lower_bound(&inst), f64::INFINITY);
        let callback = BendersCallback::new(&inst, &layout, &config, state)
            .with_presolve_cuts(vec![vec![true, false, true]], None);
        let mut pool = callback.thread_up(0).unwrap();

        let values = warm_start(&inst, &layout, &model, &[true, true, true]);
        let ctx = CallbackContext::candidate_at(&values, model.objective_value(&values));
        let first = callback.candidate(&ctx, &mut pool).unwrap();
        // valid cuts never cut off an exact point
        assert!(!first.reject);
        assert_eq!(first.cuts.len(), inst.n_cells());
        let second = callback.candidate(&ctx, &mut pool).unwrap();
        assert!(second.cuts.is_empty());

        let state = callback.into_state();
        assert_eq!(state.counters.presolve_cuts, inst.n_cells());
        assert!(state.added_presolve_cuts);
    }

    #[test]
    fn summed_shortfall_forces_a_consistency_rejection() {
        let inst = toy_instance();
        let config = BendersConfig::default();
        let (model, layout) = build_master(&inst, &[false, false], no_bounds(&inst), &[]);
        let state = SolverState::new(inst.n_cells(), objective_lower_bound(&inst), f64::INFINITY);
        let callback = BendersCallback::new(&inst, &layout, &config, state);
        let mut pool = callback.thread_up(0).unwrap();

        // every cell underestimates by less than eps_slack, the sum by more
        let shortfall = 0.9 * config.eps_slack;
        let mut values = warm_start(&inst, &layout, &model, &[true, true, true]);
        for cell in 0..inst.n_cells() {
            let col = layout.z_cell(cell).unwrap();
            values[col] -= shortfall;
        }
        let total = shortfall * inst.n_cells() as f64;
        assert!(total > config.eps_slack);
        values[layout.z] -= total;
        values[layout.obj] -= total;
        let objective = model.objective_value(&values);
        let ctx = CallbackContext::candidate_at(&values, objective);

        let batch = callback.candidate(&ctx, &mut pool).unwrap();
        assert!(batch.reject);
        assert_eq!(batch.cuts.len(), inst.n_cells());
        for row in &batch.cuts {
            assert!(row.violation(&values) > 0.0);
        }

        let state = callback.into_state();
        assert_eq!(state.consistency_rejections(), 1);
        let forced = state.events.iter().find_map(|e| match e {
            SolverEvent::ConsistencyRejection { forced_cuts, .. } => Some(*forced_cuts),
            _ => None,
        });
        assert_eq!(forced, Some(inst.n_cells()));
        assert_eq!(state.counters.rejected_candidates, 1);
    }

    #[test]
    fn shortfall_within_tolerance_is_accepted() {
        let inst = toy_instance();
        let config = BendersConfig::default();
        let (model, layout) = build_master(&inst, &[false, false], no_bounds(&inst), &[]);
        let state = SolverState::new(inst.n_cells(), objective_lower_bound(&inst), f64::INFINITY);
        let callback = BendersCallback::new(&inst, &layout, &config, state);
        let mut pool = callback.thread_up(0).unwrap();

        let shortfall = 0.1 * config.eps_slack / inst.n_cells() as f64;
        let mut values = warm_start(&inst, &layout, &model, &[true, true, true]);
        for cell in 0..inst.n_cells() {
            let col = layout.z_cell(cell).unwrap();
            values[col] -= shortfall;
        }
        let total = shortfall * inst.n_cells() as f64;
        values[layout.z] -= total;
        values[layout.obj] -= total;
        let ctx = CallbackContext::candidate_at(&values, model.objective_value(&values));

        assert!(!callback.candidate(&ctx, &mut pool).unwrap().reject);
        assert_eq!(callback.into_state().consistency_rejections(), 0);
    }
}
