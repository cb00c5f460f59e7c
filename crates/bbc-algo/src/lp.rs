//! LP backend selection on top of `good_lp`.
//!
//! Node relaxations and worker LPs are continuous. They are solved with the
//! pure-Rust primal simplex of `microlp` by default; Clarabel (interior point,
//! `solver-clarabel`) and HiGHS (`solver-highs`) can be selected instead.
//!
//! A [`LinearProgram`] keeps its columns and rows independent of any backend,
//! so a solve that fails numerically is rebuilt and retried on the next
//! available backend. Infeasible and unbounded verdicts are final.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
#[cfg(feature = "solver-clarabel")]
use good_lp::solvers::clarabel::clarabel as clarabel_solver;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as highs_solver;
use good_lp::solvers::microlp::microlp as microlp_solver;
use good_lp::{constraint, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::mip::Sense;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LpSolverKind {
    #[default]
    Microlp,
    #[cfg(feature = "solver-clarabel")]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Microlp => "microlp",
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }

    /// `self` first, then every other compiled-in backend.
    pub fn fallback_chain(self) -> Vec<LpSolverKind> {
        let mut chain = vec![self];
        for kind in ALL_LP_SOLVERS {
            if *kind != self {
                chain.push(*kind);
            }
        }
        chain
    }
}

impl fmt::Display for LpSolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ALL_LP_SOLVERS: &[LpSolverKind] = &[
    LpSolverKind::Microlp,
    #[cfg(feature = "solver-clarabel")]
    LpSolverKind::Clarabel,
    #[cfg(feature = "solver-highs")]
    LpSolverKind::Highs,
];

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "microlp",
    #[cfg(feature = "solver-clarabel")]
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

fn unknown_solver_error(label: &str) -> anyhow::Error {
    anyhow!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    )
}

impl FromStr for LpSolverKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "microlp" | "simplex" => Ok(LpSolverKind::Microlp),
            "clarabel" => {
                #[cfg(feature = "solver-clarabel")]
                {
                    Ok(LpSolverKind::Clarabel)
                }
                #[cfg(not(feature = "solver-clarabel"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            other => Err(unknown_solver_error(other)),
        }
    }
}

/// Optimization direction of a [`LinearProgram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimise,
    Maximise,
}

#[derive(Debug, Clone)]
struct LpRow {
    terms: Vec<(usize, f64)>,
    sense: Sense,
    rhs: f64,
}

/// Backend-neutral continuous LP.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    direction: Direction,
    bounds: Vec<(f64, f64)>,
    objective: Vec<f64>,
    rows: Vec<LpRow>,
}

impl LinearProgram {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            bounds: Vec::new(),
            objective: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a column; infinite bounds leave that side free.
    pub fn add_column(&mut self, lower: f64, upper: f64, objective: f64) -> usize {
        self.bounds.push((lower, upper));
        self.objective.push(objective);
        self.bounds.len() - 1
    }

    pub fn add_row(&mut self, terms: Vec<(usize, f64)>, sense: Sense, rhs: f64) {
        self.rows.push(LpRow { terms, sense, rhs });
    }

    pub fn n_columns(&self) -> usize {
        self.bounds.len()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.iter().zip(values).map(|(c, v)| c * v).sum()
    }

    fn to_good_lp(&self) -> (ProblemVariables, Vec<Variable>, Expression, Vec<Constraint>) {
        let mut vars = ProblemVariables::new();
        let columns: Vec<Variable> = self
            .bounds
            .iter()
            .map(|&(lo, hi)| {
                let mut def = variable();
                if lo.is_finite() {
                    def = def.min(lo);
                }
                if hi.is_finite() {
                    def = def.max(hi);
                }
                vars.add(def)
            })
            .collect();

        let mut objective = Expression::from(0.0);
        for (&c, &var) in self.objective.iter().zip(&columns) {
            if c != 0.0 {
                objective += c * var;
            }
        }

        let constraints = self
            .rows
            .iter()
            .map(|row| {
                let mut expr = Expression::from(0.0);
                for &(j, a) in &row.terms {
                    expr += a * columns[j];
                }
                let rhs = row.rhs;
                match row.sense {
                    Sense::Le => constraint!(expr <= rhs),
                    Sense::Ge => constraint!(expr >= rhs),
                    Sense::Eq => constraint!(expr == rhs),
                }
            })
            .collect();
        (vars, columns, objective, constraints)
    }

    /// Solve with exactly one backend and return the column values.
    pub fn solve_with(&self, kind: LpSolverKind) -> Result<Vec<f64>, ResolutionError> {
        let (vars, columns, objective, constraints) = self.to_good_lp();
        let unsolved = match self.direction {
            Direction::Minimise => vars.minimise(objective),
            Direction::Maximise => vars.maximise(objective),
        };
        match kind {
            LpSolverKind::Microlp => finish(unsolved.using(microlp_solver), constraints, &columns),
            #[cfg(feature = "solver-clarabel")]
            LpSolverKind::Clarabel => finish(unsolved.using(clarabel_solver), constraints, &columns),
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => finish(unsolved.using(highs_solver), constraints, &columns),
        }
    }

    /// Solve with `kind`, retrying the other backends on numerical failure.
    pub fn solve(&self, kind: LpSolverKind) -> Result<Vec<f64>, ResolutionError> {
        let mut last = None;
        for backend in kind.fallback_chain() {
            match self.solve_with(backend) {
                Ok(values) => return Ok(values),
                Err(e @ (ResolutionError::Infeasible | ResolutionError::Unbounded)) => return Err(e),
                Err(e) => {
                    warn!(backend = %backend, error = %e, "LP backend failed, trying the next one");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| ResolutionError::Str("no LP backend available".into())))
    }
}

fn finish<M>(mut model: M, constraints: Vec<Constraint>, columns: &[Variable]) -> Result<Vec<f64>, ResolutionError>
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in constraints {
        model = model.with(c);
    }
    let solution = model.solve()?;
    Ok(columns.iter().map(|&v| solution.value(v)).collect())
}
