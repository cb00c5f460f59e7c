//! Benders optimality cuts assembled from worker LP multipliers.
//!
//! A cut for cell `(n, r)` reads `Σ coeff_i·y_i - z_nr ≤ rhs` with
//!
//! ```text
//!   coeff_i = α2_i - M_i δ2_i + M_i δ3_i
//!   rhs     = -(α1 - Σ U_i γ1_i + Σ M_i δ2_i)
//! ```
//!
//! which is the worker LP objective written as an affine function of `y`.
//! Any dual feasible point gives a valid cut; the optimal one is tight at the
//! selection it was separated from.

use bbc_core::ChoiceInstance;
use serde::{Deserialize, Serialize};

use super::master::MasterLayout;
use super::worker::DualValues;
use crate::mip::Row;

/// Epigraph variable a cut bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutTarget {
    Cell { n: usize, r: usize },
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BendersCut {
    pub target: CutTarget,
    /// Dense coefficients over expanded alternatives
    pub coefficients: Vec<f64>,
    pub rhs: f64,
}

impl BendersCut {
    pub fn from_duals(inst: &ChoiceInstance, n: usize, r: usize, duals: &DualValues) -> Self {
        let utility = inst.utilities().cell(n, r);
        let big_m = inst.big_m_tensor().cell(n, r);
        let mut constant = duals.alpha1;
        let coefficients = (0..inst.n_expanded())
            .map(|i| {
                constant += -utility[i] * duals.gamma1[i] + big_m[i] * duals.delta2[i];
                duals.alpha2[i] - big_m[i] * duals.delta2[i] + big_m[i] * duals.delta3[i]
            })
            .collect();
        Self {
            target: CutTarget::Cell { n, r },
            coefficients,
            rhs: -constant,
        }
    }

    /// Sum of per-cell cuts over the aggregate epigraph `z = Σ z_nr`.
    ///
    /// Only valid when `cuts` covers every Benders cell exactly once.
    pub fn aggregate(cuts: &[BendersCut], n_expanded: usize) -> Self {
        let mut coefficients = vec![0.0; n_expanded];
        let mut rhs = 0.0;
        for cut in cuts {
            for (acc, c) in coefficients.iter_mut().zip(&cut.coefficients) {
                *acc += c;
            }
            rhs += cut.rhs;
        }
        Self {
            target: CutTarget::Aggregate,
            coefficients,
            rhs,
        }
    }

    /// `Σ coeff_i·y_i`.
    pub fn affine_part(&self, y: &[f64]) -> f64 {
        self.coefficients.iter().zip(y).map(|(c, v)| c * v).sum()
    }

    /// Lower bound the cut implies on its epigraph variable at `y`.
    pub fn bound_at(&self, y: &[f64]) -> f64 {
        self.affine_part(y) - self.rhs
    }

    /// `Σ coeff_i·y_i - z`.
    pub fn lhs(&self, y: &[f64], z: f64) -> f64 {
        self.affine_part(y) - z
    }

    pub fn violation(&self, y: &[f64], z: f64) -> f64 {
        self.lhs(y, z) - self.rhs
    }

    pub fn is_violated(&self, y: &[f64], z: f64, eps: f64) -> bool {
        self.violation(y, z) > eps
    }

    /// Master row, dropping negligible coefficients.
    pub fn to_row(&self, layout: &MasterLayout, inst: &ChoiceInstance) -> Row {
        let epigraph = match self.target {
            CutTarget::Cell { n, r } => layout
                .z_cell(inst.cell_index(n, r))
                .unwrap_or(layout.z),
            CutTarget::Aggregate => layout.z,
        };
        let mut terms: Vec<(usize, f64)> = self
            .coefficients
            .iter()
            .enumerate()
            .filter(|(_, c)| c.abs() > 1e-12)
            .map(|(i, &c)| (layout.y(i), c))
            .collect();
        terms.push((epigraph, -1.0));
        Row::le(terms, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benders::evaluate::cell_value;
    use crate::benders::worker::WorkerLp;
    use crate::lp::LpSolverKind;
    use bbc_core::test_utils::toy_instance;

    fn selections() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0],
        ]
    }

    #[test]
    fn cut_is_tight_at_its_selection() {
        let inst = toy_instance();
        for y in selections() {
            let open: Vec<bool> = y.iter().map(|&v| v > 0.5).collect();
            for (n, r) in inst.cells() {
                let duals = WorkerLp::new(&inst, n, r).solve(&y, LpSolverKind::default()).unwrap();
                let cut = BendersCut::from_duals(&inst, n, r, &duals);
                let z_true = cell_value(&inst, n, r, &open);
                assert!(cut.violation(&y, z_true).abs() < 1e-4, "y={:?} cell=({}, {})", y, n, r);
            }
        }
    }

    #[test]
    fn cut_is_valid_everywhere() {
        let inst = toy_instance();
        for y_sol in selections() {
            for (n, r) in inst.cells() {
                let duals = WorkerLp::new(&inst, n, r)
                    .solve(&y_sol, LpSolverKind::default())
                    .unwrap();
                let cut = BendersCut::from_duals(&inst, n, r, &duals);
                for y in selections() {
                    let open: Vec<bool> = y.iter().map(|&v| v > 0.5).collect();
                    let z_true = cell_value(&inst, n, r, &open);
                    assert!(cut.violation(&y, z_true) <= 1e-4);
                }
            }
        }
    }

    #[test]
    fn aggregate_sums_coefficients() {
        let a = BendersCut {
            target: CutTarget::Cell { n: 0, r: 0 },
            coefficients: vec![1.0, 2.0],
            rhs: 0.5,
        };
        let b = BendersCut {
            target: CutTarget::Cell { n: 0, r: 1 },
            coefficients: vec![-1.0, 1.0],
            rhs: 1.0,
        };
        let agg = BendersCut::aggregate(&[a, b], 2);
        assert_eq!(agg.target, CutTarget::Aggregate);
        assert_eq!(agg.coefficients, vec![0.0, 3.0]);
        assert_eq!(agg.rhs, 1.5);
        assert!((agg.bound_at(&[1.0, 1.0]) - 1.5).abs() < 1e-12);
    }
}
