//! LP relaxation of a node.
//!
//! Columns whose bounds coincide are substituted as constants before the LP is
//! handed to the backend, which keeps fixed mandatory alternatives and branched
//! variables out of the backend's iterations.

use good_lp::ResolutionError;

use super::model::{MipModel, Row, Sense};
use super::MipError;
use crate::lp::{Direction, LinearProgram, LpSolverKind};

const FIXED_TOL: f64 = 1e-12;

/// Result of one relaxation solve.
#[derive(Debug, Clone)]
pub enum LpOutcome {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
}

enum Slot {
    Fixed(f64),
    Free(usize),
}

/// Solve `min c·x` over the model rows plus `cuts`, with node bounds.
///
/// A backend that fails numerically is retried on the other compiled-in
/// backends before the error is returned.
pub fn solve_relaxation(
    model: &MipModel,
    cuts: &[Row],
    lower: &[f64],
    upper: &[f64],
    kind: LpSolverKind,
    tol: f64,
) -> Result<LpOutcome, MipError> {
    let mut lp = LinearProgram::new(Direction::Minimise);
    let mut slots = Vec::with_capacity(model.n_columns());
    for ((&lo, &hi), col) in lower.iter().zip(upper).zip(model.columns()) {
        if lo > hi + tol {
            return Ok(LpOutcome::Infeasible);
        }
        if (hi - lo).abs() <= FIXED_TOL {
            slots.push(Slot::Fixed(lo));
        } else {
            slots.push(Slot::Free(lp.add_column(lo, hi, col.objective)));
        }
    }

    for row in model.rows().iter().chain(cuts) {
        let mut terms = Vec::new();
        let mut rhs = row.rhs;
        for (j, a) in row.terms() {
            match slots[j] {
                Slot::Fixed(v) => rhs -= a * v,
                Slot::Free(k) => terms.push((k, a)),
            }
        }
        if terms.is_empty() {
            let satisfied = match row.sense {
                Sense::Le => 0.0 <= rhs + tol,
                Sense::Ge => 0.0 >= rhs - tol,
                Sense::Eq => rhs.abs() <= tol,
            };
            if !satisfied {
                return Ok(LpOutcome::Infeasible);
            }
            continue;
        }
        lp.add_row(terms, row.sense, rhs);
    }

    let solved = if lp.n_columns() == 0 {
        Ok(Vec::new())
    } else {
        lp.solve(kind)
    };
    match solved {
        Ok(free_values) => {
            let values: Vec<f64> = slots
                .iter()
                .zip(lower.iter().zip(upper))
                .map(|(s, (&lo, &hi))| match s {
                    Slot::Fixed(v) => *v,
                    // interior-point values can stray outside their bounds
                    Slot::Free(k) => free_values[*k].clamp(lo, hi),
                })
                .collect();
            let objective = model.objective_value(&values);
            Ok(LpOutcome::Optimal { values, objective })
        }
        Err(ResolutionError::Infeasible) => Ok(LpOutcome::Infeasible),
        Err(ResolutionError::Unbounded) => Ok(LpOutcome::Unbounded),
        Err(e) => Err(MipError::Lp(e.to_string())),
    }
}
