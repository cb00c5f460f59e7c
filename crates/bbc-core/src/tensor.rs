//! Dense utility tensor indexed by (alternative, customer, draw).
//!
//! Values are stored cell-major: all alternatives of one `(n, r)` cell are
//! contiguous, so the Benders separator can borrow a whole cell as a slice.

use crate::error::{BbcError, BbcResult};

/// Three-dimensional `[i][n][r]` tensor of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct UtilityTensor {
    n_alternatives: usize,
    n_customers: usize,
    n_draws: usize,
    data: Vec<f64>,
}

impl UtilityTensor {
    /// Tensor filled with zeros.
    pub fn zeros(n_alternatives: usize, n_customers: usize, n_draws: usize) -> Self {
        Self {
            n_alternatives,
            n_customers,
            n_draws,
            data: vec![0.0; n_alternatives * n_customers * n_draws],
        }
    }

    /// Build from nested `[i][n][r]` vectors (the upstream JSON layout).
    pub fn from_nested(nested: &[Vec<Vec<f64>>]) -> BbcResult<Self> {
        let n_alternatives = nested.len();
        let n_customers = nested.first().map_or(0, |v| v.len());
        let n_draws = nested
            .first()
            .and_then(|v| v.first())
            .map_or(0, |v| v.len());

        let mut tensor = Self::zeros(n_alternatives, n_customers, n_draws);
        for (i, per_customer) in nested.iter().enumerate() {
            if per_customer.len() != n_customers {
                return Err(BbcError::Validation(format!(
                    "alternative {} has {} customers, expected {}",
                    i,
                    per_customer.len(),
                    n_customers
                )));
            }
            for (n, per_draw) in per_customer.iter().enumerate() {
                if per_draw.len() != n_draws {
                    return Err(BbcError::Validation(format!(
                        "alternative {} customer {} has {} draws, expected {}",
                        i,
                        n,
                        per_draw.len(),
                        n_draws
                    )));
                }
                for (r, value) in per_draw.iter().enumerate() {
                    tensor.set(i, n, r, *value);
                }
            }
        }
        Ok(tensor)
    }

    /// Export as nested `[i][n][r]` vectors.
    pub fn to_nested(&self) -> Vec<Vec<Vec<f64>>> {
        (0..self.n_alternatives)
            .map(|i| {
                (0..self.n_customers)
                    .map(|n| (0..self.n_draws).map(|r| self.get(i, n, r)).collect())
                    .collect()
            })
            .collect()
    }

    /// Dimensions `(alternatives, customers, draws)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.n_alternatives, self.n_customers, self.n_draws)
    }

    #[inline]
    fn offset(&self, n: usize, r: usize) -> usize {
        (n * self.n_draws + r) * self.n_alternatives
    }

    #[inline]
    pub fn get(&self, i: usize, n: usize, r: usize) -> f64 {
        self.data[self.offset(n, r) + i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, n: usize, r: usize, value: f64) {
        let offset = self.offset(n, r);
        self.data[offset + i] = value;
    }

    /// All alternatives of cell `(n, r)`.
    pub fn cell(&self, n: usize, r: usize) -> &[f64] {
        let start = self.offset(n, r);
        &self.data[start..start + self.n_alternatives]
    }

    /// Smallest entry, `+inf` when empty.
    pub fn min_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Apply `f` to every entry in place.
    pub fn map_in_place(&mut self, f: impl Fn(f64) -> f64) {
        for value in &mut self.data {
            *value = f(*value);
        }
    }

    /// Pairwise check `self >= other` over every entry.
    pub fn dominates(&self, other: &UtilityTensor) -> bool {
        self.dims() == other.dims()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| *a >= *b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_round_trip_keeps_indexing() {
        let nested = vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![5.0, 6.0], vec![7.0, 8.0]],
            vec![vec![9.0, 10.0], vec![11.0, 12.0]],
        ];
        let tensor = UtilityTensor::from_nested(&nested).unwrap();
        assert_eq!(tensor.dims(), (3, 2, 2));
        assert_eq!(tensor.get(2, 1, 0), 11.0);
        assert_eq!(tensor.get(0, 0, 1), 2.0);
        assert_eq!(tensor.to_nested(), nested);
    }

    #[test]
    fn test_cell_is_contiguous_over_alternatives() {
        let nested = vec![
            vec![vec![1.0, 2.0]],
            vec![vec![3.0, 4.0]],
            vec![vec![5.0, 6.0]],
        ];
        let tensor = UtilityTensor::from_nested(&nested).unwrap();
        assert_eq!(tensor.cell(0, 1), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_ragged_input_rejected() {
        let nested = vec![vec![vec![1.0, 2.0]], vec![vec![3.0]]];
        assert!(UtilityTensor::from_nested(&nested).is_err());
    }

    #[test]
    fn test_dominates() {
        let mut a = UtilityTensor::zeros(2, 1, 1);
        let b = UtilityTensor::zeros(2, 1, 1);
        assert!(a.dominates(&b));
        a.set(0, 0, 0, -1.0);
        assert!(!a.dominates(&b));
    }
}
