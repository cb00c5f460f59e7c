//! Solver-independent MIP description.
//!
//! Columns and rows are addressed by their insertion index. Callers allocate
//! columns in a fixed order and keep index ranges on their side, so there is
//! no name lookup anywhere on the hot path; names only serve diagnostics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Continuous,
    Binary,
    Integer,
}

impl ColumnKind {
    pub fn is_integral(self) -> bool {
        !matches!(self, ColumnKind::Continuous)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub lower: f64,
    pub upper: f64,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

/// Sparse linear row `Σ coefficients[k] · x[indices[k]]  (sense)  rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub indices: Vec<usize>,
    pub coefficients: Vec<f64>,
    pub sense: Sense,
    pub rhs: f64,
}

impl Row {
    pub fn new(terms: Vec<(usize, f64)>, sense: Sense, rhs: f64) -> Self {
        let (indices, coefficients) = terms.into_iter().unzip();
        Self {
            indices,
            coefficients,
            sense,
            rhs,
        }
    }

    pub fn le(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self::new(terms, Sense::Le, rhs)
    }

    pub fn eq(terms: Vec<(usize, f64)>, rhs: f64) -> Self {
        Self::new(terms, Sense::Eq, rhs)
    }

    pub fn terms(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.coefficients.iter().copied())
    }

    /// Left-hand side evaluated at `x`.
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.terms().map(|(j, a)| a * x[j]).sum()
    }

    /// Amount by which `x` violates the row, zero when satisfied.
    pub fn violation(&self, x: &[f64]) -> f64 {
        let lhs = self.activity(x);
        match self.sense {
            Sense::Le => (lhs - self.rhs).max(0.0),
            Sense::Ge => (self.rhs - lhs).max(0.0),
            Sense::Eq => (lhs - self.rhs).abs(),
        }
    }
}

/// Minimization MIP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MipModel {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl MipModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column and return its index.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        kind: ColumnKind,
        lower: f64,
        upper: f64,
        objective: f64,
    ) -> usize {
        let (lower, upper) = match kind {
            ColumnKind::Binary => (lower.max(0.0), upper.min(1.0)),
            _ => (lower, upper),
        };
        self.columns.push(Column {
            name: name.into(),
            kind,
            lower,
            upper,
            objective,
        });
        self.columns.len() - 1
    }

    pub fn add_row(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn set_bounds(&mut self, column: usize, lower: f64, upper: f64) {
        let col = &mut self.columns[column];
        col.lower = lower;
        col.upper = upper;
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, j: usize) -> &Column {
        &self.columns[j]
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.lower).collect()
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        self.columns.iter().map(|c| c.upper).collect()
    }

    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.columns
            .iter()
            .zip(x)
            .map(|(c, v)| c.objective * v)
            .sum()
    }

    /// Check a full assignment against bounds, integrality and rows.
    pub fn is_feasible(&self, x: &[f64], tol: f64) -> bool {
        if x.len() != self.columns.len() {
            return false;
        }
        let columns_ok = self.columns.iter().zip(x).all(|(c, &v)| {
            v >= c.lower - tol
                && v <= c.upper + tol
                && (!c.kind.is_integral() || (v - v.round()).abs() <= tol)
        });
        columns_ok && self.rows.iter().all(|r| r.violation(x) <= tol)
    }

    /// Reject rows that reference unknown columns.
    pub fn validate(&self) -> Result<(), String> {
        for (k, row) in self.rows.iter().enumerate() {
            if row.indices.len() != row.coefficients.len() {
                return Err(format!("row {} has mismatched indices and coefficients", k));
            }
            if let Some(j) = row.indices.iter().find(|&&j| j >= self.columns.len()) {
                return Err(format!("row {} references unknown column {}", k, j));
            }
        }
        for (j, col) in self.columns.iter().enumerate() {
            if col.lower > col.upper {
                return Err(format!(
                    "column '{}' ({}) has empty domain [{}, {}]",
                    col.name, j, col.lower, col.upper
                ));
            }
        }
        Ok(())
    }
}
