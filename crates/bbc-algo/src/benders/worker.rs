//! Worker LP: the dual of one cell's customer-choice LP.
//!
//! For cell `(n, r)` and a trial selection `y`, the primal chooses `x_i` to
//! minimize `Σ -w·rev_i·x_i` subject to
//!
//! ```text
//!   α1     Σ x_i            ≤ 1
//!   α2_i   x_i              ≤ y_i
//!   γ1_i   -u - v_i         ≤ -U_i
//!   γ2     u - Σ s_i        ≤ 0
//!   δ1_i   s_i - U_i x_i    ≤ 0
//!   δ2_i   v_i              ≤ M_i (1 - y_i)
//!   δ3_i   s_i              ≤ M_i y_i
//! ```
//!
//! The worker LP maximizes `α1 + Σ y_i α2_i - Σ U_i γ1_i + Σ M_i (1-y_i) δ2_i
//! + Σ M_i y_i δ3_i` over non-positive multipliers. Only the objective depends
//! on `y`; the constraint matrix is fixed per cell. With `U > 0` and `M ≥ U` the
//! primal is feasible and bounded for every `y ∈ [0,1]`, so the worker LP is
//! always optimal and anything else is reported as an error.
//!
//! At a binary `y` the optimal face is unbounded (`δ2_i` of open and `δ3_i`,
//! `α2_i` of closed alternatives have zero objective weight). A tiny pull of
//! every multiplier toward zero selects a bounded point of that face, which
//! keeps simplex vertices and interior-point solutions finite.

use std::time::{Duration, Instant};

use bbc_core::ChoiceInstance;

use crate::lp::{Direction, LinearProgram, LpSolverKind};
use crate::mip::{CallbackError, Sense};

/// Relative weight of the pull toward zero.
const DUAL_PULL: f64 = 1e-8;

/// Optimal multipliers of one worker LP.
#[derive(Debug, Clone, PartialEq)]
pub struct DualValues {
    pub alpha1: f64,
    pub alpha2: Vec<f64>,
    pub gamma1: Vec<f64>,
    pub gamma2: f64,
    pub delta1: Vec<f64>,
    pub delta2: Vec<f64>,
    pub delta3: Vec<f64>,
    pub objective: f64,
}

/// Static data of one cell's worker LP; the LP itself is rebuilt per solve.
#[derive(Debug, Clone)]
pub struct WorkerLp {
    n: usize,
    r: usize,
    weight: f64,
    revenue: Vec<f64>,
    utility: Vec<f64>,
    big_m: Vec<f64>,
}

impl WorkerLp {
    pub fn new(inst: &ChoiceInstance, n: usize, r: usize) -> Self {
        Self {
            n,
            r,
            weight: inst.weight(n),
            revenue: (0..inst.n_expanded()).map(|i| inst.revenue(i)).collect(),
            utility: inst.utilities().cell(n, r).to_vec(),
            big_m: inst.big_m_tensor().cell(n, r).to_vec(),
        }
    }

    pub fn cell(&self) -> (usize, usize) {
        (self.n, self.r)
    }

    /// Solve for the trial selection `y`.
    pub fn solve(&self, y: &[f64], kind: LpSolverKind) -> Result<DualValues, CallbackError> {
        let len = self.utility.len();
        let pull = DUAL_PULL * self.scale();
        let mut lp = LinearProgram::new(Direction::Maximise);
        let mut block = |coeff: &dyn Fn(usize) -> f64| -> Vec<usize> {
            (0..len).map(|i| lp.add_column(f64::NEG_INFINITY, 0.0, coeff(i))).collect()
        };
        let alpha2 = block(&|i| y[i] + pull);
        let gamma1 = block(&|i| pull - self.utility[i]);
        let delta1 = block(&|_| pull);
        let delta2 = block(&|i| self.big_m[i] * (1.0 - y[i]) + pull);
        let delta3 = block(&|i| self.big_m[i] * y[i] + pull);
        let alpha1 = lp.add_column(f64::NEG_INFINITY, 0.0, 1.0 + pull);
        let gamma2 = lp.add_column(f64::NEG_INFINITY, 0.0, pull);

        let mut gamma_sum = vec![(gamma2, 1.0)];
        for i in 0..len {
            // column x_i
            lp.add_row(
                vec![(alpha1, 1.0), (alpha2[i], 1.0), (delta1[i], -self.utility[i])],
                Sense::Le,
                -self.weight * self.revenue[i],
            );
            // column v_i
            lp.add_row(vec![(delta2[i], 1.0), (gamma1[i], -1.0)], Sense::Le, 0.0);
            // column s_i
            lp.add_row(vec![(delta1[i], 1.0), (delta3[i], 1.0), (gamma2, -1.0)], Sense::Le, 0.0);
            gamma_sum.push((gamma1[i], -1.0));
        }
        // column u
        lp.add_row(gamma_sum, Sense::Le, 0.0);

        let solution = lp.solve(kind).map_err(|e| CallbackError::WorkerLp {
            customer: self.n,
            draw: self.r,
            reason: e.to_string(),
        })?;

        let values = |cols: &[usize]| -> Vec<f64> { cols.iter().map(|&j| solution[j].min(0.0)).collect() };
        let mut duals = DualValues {
            alpha1: solution[alpha1].min(0.0),
            alpha2: values(&alpha2),
            gamma1: values(&gamma1),
            gamma2: solution[gamma2].min(0.0),
            delta1: values(&delta1),
            delta2: values(&delta2),
            delta3: values(&delta3),
            objective: 0.0,
        };
        duals.objective = self.dual_objective(&duals, y);
        Ok(duals)
    }

    fn scale(&self) -> f64 {
        let max_revenue = self.revenue.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));
        (self.weight * max_revenue).max(1.0)
    }

    /// Worker LP objective of `duals` at `y`.
    pub fn dual_objective(&self, duals: &DualValues, y: &[f64]) -> f64 {
        let mut value = duals.alpha1;
        for i in 0..self.utility.len() {
            let m = self.big_m[i];
            value += y[i] * duals.alpha2[i] - self.utility[i] * duals.gamma1[i]
                + m * (1.0 - y[i]) * duals.delta2[i]
                + m * y[i] * duals.delta3[i];
        }
        value
    }

    /// Largest violation of the dual constraints, zero when feasible.
    pub fn dual_infeasibility(&self, duals: &DualValues) -> f64 {
        let mut worst: f64 = 0.0;
        let mut gamma_sum = duals.gamma2;
        for i in 0..self.utility.len() {
            let x_row = duals.alpha1 + duals.alpha2[i] - self.utility[i] * duals.delta1[i]
                + self.weight * self.revenue[i];
            let v_row = duals.delta2[i] - duals.gamma1[i];
            let s_row = duals.delta1[i] + duals.delta3[i] - duals.gamma2;
            worst = worst.max(x_row).max(v_row).max(s_row);
            gamma_sum -= duals.gamma1[i];
        }
        worst.max(gamma_sum)
    }
}

/// Worker LPs of one search thread, indexed by flat cell index.
///
/// The pool owns the per-cell data (utilities, Big-M, weight, revenue) for
/// the lifetime of the thread, not solver handles: `good_lp` cannot change
/// objective coefficients of a built model, so every [`WorkerPool::solve`]
/// assembles a fresh [`LinearProgram`] for the cell at the trial `y` and drops
/// it afterwards. Cells retained in the master have no worker LP.
#[derive(Debug)]
pub struct WorkerPool {
    lps: Vec<Option<WorkerLp>>,
    kind: LpSolverKind,
    pub solves: usize,
    pub time: Duration,
}

impl WorkerPool {
    pub fn new(inst: &ChoiceInstance, retained: &[bool], kind: LpSolverKind) -> Self {
        let lps = inst
            .cells()
            .map(|(n, r)| (!retained[r]).then(|| WorkerLp::new(inst, n, r)))
            .collect();
        Self {
            lps,
            kind,
            solves: 0,
            time: Duration::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.lps.iter().filter(|lp| lp.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, cell: usize) -> Option<&WorkerLp> {
        self.lps.get(cell).and_then(Option::as_ref)
    }

    /// Solve the worker LP of `cell` at `y`.
    pub fn solve(&mut self, cell: usize, y: &[f64]) -> Result<DualValues, CallbackError> {
        let lp = self
            .lps
            .get(cell)
            .and_then(Option::as_ref)
            .ok_or_else(|| CallbackError::Failed(format!("cell {} has no worker LP", cell)))?;
        let started = Instant::now();
        let duals = lp.solve(y, self.kind)?;
        self.solves += 1;
        self.time += started.elapsed();
        Ok(duals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benders::cut::BendersCut;
    use crate::benders::evaluate::cell_value;
    use bbc_core::preprocess::{get_data, SyntheticParams};
    use bbc_core::test_utils::toy_instance;
    use bbc_core::AlternativeClass;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn worker_lp_value_equals_cell_value() {
        let inst = toy_instance();
        for (a, b) in [(false, false), (true, false), (false, true), (true, true)] {
            let open = [true, a, b];
            let y: Vec<f64> = open.iter().map(|&o| if o { 1.0 } else { 0.0 }).collect();
            for (n, r) in inst.cells() {
                let lp = WorkerLp::new(&inst, n, r);
                let duals = lp.solve(&y, LpSolverKind::default()).unwrap();
                let expected = cell_value(&inst, n, r, &open);
                assert!(
                    (duals.objective - expected).abs() < 1e-4,
                    "cell ({}, {}) y={:?}: {} vs {}",
                    n,
                    r,
                    y,
                    duals.objective,
                    expected
                );
                assert!(lp.dual_infeasibility(&duals) < 1e-5);
            }
        }
    }

    #[test]
    fn worker_lp_is_optimal_at_fractional_points() {
        let inst = toy_instance();
        let lp = WorkerLp::new(&inst, 1, 0);
        for y in [[1.0, 0.5, 0.5], [1.0, 0.1, 0.9], [0.3, 0.3, 0.3]] {
            assert!(lp.solve(&y, LpSolverKind::default()).is_ok());
        }
    }

    fn random_selection(inst: &ChoiceInstance, rng: &mut StdRng) -> Vec<bool> {
        let mut open = inst.base_selection();
        for a in 0..inst.n_alternatives() {
            if inst.class(a) != AlternativeClass::Endogenous {
                continue;
            }
            let levels = inst.price_levels(a);
            if rng.gen_bool(0.6) {
                open[levels[rng.gen_range(0..levels.len())]] = true;
            }
        }
        open
    }

    #[test]
    fn random_points_stay_optimal_and_cuts_stay_valid() {
        let params = SyntheticParams {
            n_customers: 4,
            n_draws: 3,
            n_facilities: 3,
            n_price_levels: 2,
            competitor: true,
        };
        let mut rng = StdRng::seed_from_u64(17);
        for seed in 0..3 {
            let inst = get_data(seed, &params).unwrap();
            let binaries: Vec<Vec<bool>> = (0..6).map(|_| random_selection(&inst, &mut rng)).collect();
            for _ in 0..8 {
                let n = rng.gen_range(0..inst.n_customers());
                let r = rng.gen_range(0..inst.n_draws());
                let lp = WorkerLp::new(&inst, n, r);

                let y: Vec<f64> = (0..inst.n_expanded()).map(|_| rng.gen::<f64>()).collect();
                let duals = lp.solve(&y, LpSolverKind::default()).unwrap();
                assert!(lp.dual_infeasibility(&duals) < 1e-6, "cell ({}, {}) y={:?}", n, r, y);

                let source = &binaries[rng.gen_range(0..binaries.len())];
                let y_sol: Vec<f64> = source.iter().map(|&o| if o { 1.0 } else { 0.0 }).collect();
                let duals = lp.solve(&y_sol, LpSolverKind::default()).unwrap();
                assert!(lp.dual_infeasibility(&duals) < 1e-6);
                let cut = BendersCut::from_duals(&inst, n, r, &duals);
                let tight = cell_value(&inst, n, r, source);
                assert!(cut.violation(&y_sol, tight).abs() < 1e-4);
                for open in &binaries {
                    let y: Vec<f64> = open.iter().map(|&o| if o { 1.0 } else { 0.0 }).collect();
                    let z_true = cell_value(&inst, n, r, open);
                    assert!(
                        cut.violation(&y, z_true) <= 1e-4,
                        "seed {} cell ({}, {}): cut from {:?} cuts off {:?}",
                        seed,
                        n,
                        r,
                        source,
                        open
                    );
                }
            }
        }
    }

    #[test]
    fn pool_skips_retained_draws() {
        let inst = toy_instance();
        let mut pool = WorkerPool::new(&inst, &[true, false], LpSolverKind::default());
        assert_eq!(pool.len(), 2);
        assert!(pool.get(inst.cell_index(0, 0)).is_none());
        assert!(pool.get(inst.cell_index(0, 1)).is_some());
        assert!(pool.solve(inst.cell_index(1, 0), &[1.0, 0.0, 0.0]).is_err());
        pool.solve(inst.cell_index(1, 1), &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(pool.solves, 1);
    }

    #[test]
    fn repeated_solves_do_not_carry_state() {
        let inst = toy_instance();
        let mut pool = WorkerPool::new(&inst, &[false, false], LpSolverKind::default());
        let cell = inst.cell_index(1, 0);
        let first = pool.solve(cell, &[1.0, 1.0, 0.0]).unwrap();
        pool.solve(cell, &[1.0, 0.0, 1.0]).unwrap();
        let again = pool.solve(cell, &[1.0, 1.0, 0.0]).unwrap();
        assert!((first.objective - again.objective).abs() < 1e-9);
        assert_eq!(pool.solves, 3);
    }
}
