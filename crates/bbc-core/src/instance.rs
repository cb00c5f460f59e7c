//! Immutable choice-based facility location and pricing instance.
//!
//! An instance holds everything the Benders engine reads during a solve:
//! the expanded alternatives (one per original alternative and discrete
//! price level), the utility tensor `U[i,n,r]`, its Big-M companion, the
//! population weights and the cost terms. It never changes once built and is
//! shared between solver threads behind an `Arc`.
//!
//! ```text
//!   original alternative a ──► price levels {i : alt[i] = a}
//!
//!   a < I_opt_out                  opt-out       exactly one level open
//!   operator[a] != supplier        competitor    exactly one level open
//!   otherwise                      endogenous    at most one level open
//! ```
//!
//! Revenue of expanded alternative `i` is its markup `p[i] - customer_cost[a]`
//! when the supplier operates `a`, and zero otherwise.

use serde::{Deserialize, Serialize};

use crate::error::{BbcError, BbcResult};
use crate::tensor::UtilityTensor;

/// Operator id of the supplier whose decisions are optimized.
pub const DEFAULT_SUPPLIER: usize = 1;

/// One (original alternative, price level) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpandedAlternative {
    /// Original alternative id
    pub alt: usize,
    /// Price charged at this level
    pub price: f64,
}

/// Role of an original alternative in the master problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternativeClass {
    /// Outside option, always available
    OptOut,
    /// Operated by someone other than the supplier, always available
    Competitor,
    /// Supplier facility whose opening and price level are decided
    Endogenous,
}

impl AlternativeClass {
    /// Whether exactly one price level must be active.
    pub fn is_mandatory(self) -> bool {
        !matches!(self, AlternativeClass::Endogenous)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlternativeClass::OptOut => "opt_out",
            AlternativeClass::Competitor => "competitor",
            AlternativeClass::Endogenous => "endogenous",
        }
    }
}

/// Raw parts of an instance, validated by [`ChoiceInstance::new`].
#[derive(Debug, Clone)]
pub struct InstanceParts {
    pub n_customers: usize,
    pub n_draws: usize,
    pub n_opt_out: usize,
    pub supplier: usize,
    pub alternatives: Vec<ExpandedAlternative>,
    pub fixed_cost: Vec<f64>,
    pub customer_cost: Vec<f64>,
    pub operator: Vec<usize>,
    pub population: Vec<f64>,
    pub utilities: UtilityTensor,
    pub big_m: UtilityTensor,
}

/// Validated, read-only problem instance.
#[derive(Debug, Clone)]
pub struct ChoiceInstance {
    n_customers: usize,
    n_draws: usize,
    n_opt_out: usize,
    supplier: usize,
    alternatives: Vec<ExpandedAlternative>,
    fixed_cost: Vec<f64>,
    customer_cost: Vec<f64>,
    operator: Vec<usize>,
    population: Vec<f64>,
    utilities: UtilityTensor,
    big_m: UtilityTensor,
    // derived
    classes: Vec<AlternativeClass>,
    levels: Vec<Vec<usize>>,
    revenue: Vec<f64>,
    endogenous: Vec<usize>,
    n_out_expanded: usize,
}

impl ChoiceInstance {
    /// Validate the parts and derive the alternative classes.
    pub fn new(parts: InstanceParts) -> BbcResult<Self> {
        let InstanceParts {
            n_customers,
            n_draws,
            n_opt_out,
            supplier,
            alternatives,
            fixed_cost,
            customer_cost,
            operator,
            population,
            utilities,
            big_m,
        } = parts;

        let n_alternatives = fixed_cost.len();
        if n_customers == 0 || n_draws == 0 {
            return Err(BbcError::Validation(
                "instance needs at least one customer and one draw".into(),
            ));
        }
        if customer_cost.len() != n_alternatives || operator.len() != n_alternatives {
            return Err(BbcError::Validation(format!(
                "fixed_cost, customer_cost and operator must all have {} entries",
                n_alternatives
            )));
        }
        if n_opt_out == 0 || n_opt_out > n_alternatives {
            return Err(BbcError::Validation(format!(
                "I_opt_out must be in 1..={}, got {}",
                n_alternatives, n_opt_out
            )));
        }
        if population.len() != n_customers {
            return Err(BbcError::Validation(format!(
                "popN has {} entries, expected {}",
                population.len(),
                n_customers
            )));
        }
        if population.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(BbcError::Validation(
                "population weights must be finite and non-negative".into(),
            ));
        }

        let expected = (alternatives.len(), n_customers, n_draws);
        if utilities.dims() != expected {
            return Err(BbcError::Validation(format!(
                "U has dimensions {:?}, expected {:?}",
                utilities.dims(),
                expected
            )));
        }
        if big_m.dims() != expected {
            return Err(BbcError::Validation(format!(
                "M has dimensions {:?}, expected {:?}",
                big_m.dims(),
                expected
            )));
        }
        if !(utilities.min_value() > 0.0) {
            return Err(BbcError::Validation(
                "utilities must be strictly positive; shift them during preprocessing".into(),
            ));
        }
        if !big_m.dominates(&utilities) {
            return Err(BbcError::Validation(
                "Big-M must be at least the utility in every cell".into(),
            ));
        }

        let classes: Vec<AlternativeClass> = (0..n_alternatives)
            .map(|a| {
                if a < n_opt_out {
                    AlternativeClass::OptOut
                } else if operator[a] != supplier {
                    AlternativeClass::Competitor
                } else {
                    AlternativeClass::Endogenous
                }
            })
            .collect();

        let mut levels = vec![Vec::new(); n_alternatives];
        for (i, expanded) in alternatives.iter().enumerate() {
            if expanded.alt >= n_alternatives {
                return Err(BbcError::Validation(format!(
                    "expanded alternative {} refers to unknown alternative {}",
                    i, expanded.alt
                )));
            }
            levels[expanded.alt].push(i);
        }
        if let Some(a) = levels.iter().position(|l| l.is_empty()) {
            return Err(BbcError::Validation(format!(
                "alternative {} has no price level",
                a
            )));
        }

        let n_out_expanded = alternatives
            .iter()
            .take_while(|e| e.alt < n_opt_out)
            .count();
        if alternatives[n_out_expanded..].iter().any(|e| e.alt < n_opt_out) {
            return Err(BbcError::Validation(
                "opt-out price levels must come first in the expanded alternatives".into(),
            ));
        }

        let revenue = alternatives
            .iter()
            .map(|e| {
                if operator[e.alt] == supplier && e.alt >= n_opt_out {
                    e.price - customer_cost[e.alt]
                } else {
                    0.0
                }
            })
            .collect();

        let endogenous = alternatives
            .iter()
            .enumerate()
            .filter(|(_, e)| classes[e.alt] == AlternativeClass::Endogenous)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            n_customers,
            n_draws,
            n_opt_out,
            supplier,
            alternatives,
            fixed_cost,
            customer_cost,
            operator,
            population,
            utilities,
            big_m,
            classes,
            levels,
            revenue,
            endogenous,
            n_out_expanded,
        })
    }

    /// Number of customer segments (`N`).
    pub fn n_customers(&self) -> usize {
        self.n_customers
    }

    /// Number of draws/scenarios (`R`).
    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    /// Number of original alternatives (`I_tot`).
    pub fn n_alternatives(&self) -> usize {
        self.fixed_cost.len()
    }

    /// Number of expanded alternatives (`I_tot_exp`).
    pub fn n_expanded(&self) -> usize {
        self.alternatives.len()
    }

    /// Number of original opt-out alternatives (`I_opt_out`).
    pub fn n_opt_out(&self) -> usize {
        self.n_opt_out
    }

    /// Number of expanded opt-out alternatives (`I_out_exp`).
    pub fn n_out_expanded(&self) -> usize {
        self.n_out_expanded
    }

    pub fn supplier(&self) -> usize {
        self.supplier
    }

    pub fn alternatives(&self) -> &[ExpandedAlternative] {
        &self.alternatives
    }

    pub fn alternative(&self, i: usize) -> ExpandedAlternative {
        self.alternatives[i]
    }

    pub fn price(&self, i: usize) -> f64 {
        self.alternatives[i].price
    }

    /// Price minus the customer cost of the original alternative.
    pub fn markup(&self, i: usize) -> f64 {
        let e = self.alternatives[i];
        e.price - self.customer_cost[e.alt]
    }

    /// Revenue the supplier collects when a customer picks `i`.
    pub fn revenue(&self, i: usize) -> f64 {
        self.revenue[i]
    }

    /// Largest supplier revenue over all expanded alternatives (at least zero).
    pub fn max_revenue(&self) -> f64 {
        self.revenue.iter().copied().fold(0.0, f64::max)
    }

    /// Smallest supplier revenue over all expanded alternatives (at most zero).
    pub fn min_revenue(&self) -> f64 {
        self.revenue.iter().copied().fold(0.0, f64::min)
    }

    /// Fixed cost of original alternative `alt`.
    pub fn fixed_cost(&self, alt: usize) -> f64 {
        self.fixed_cost[alt]
    }

    /// Fixed cost paid when expanded alternative `i` is active.
    pub fn fixed_cost_of(&self, i: usize) -> f64 {
        self.fixed_cost[self.alternatives[i].alt]
    }

    pub fn customer_cost(&self, alt: usize) -> f64 {
        self.customer_cost[alt]
    }

    pub fn operator(&self, alt: usize) -> usize {
        self.operator[alt]
    }

    pub fn class(&self, alt: usize) -> AlternativeClass {
        self.classes[alt]
    }

    /// Class of the original alternative behind expanded alternative `i`.
    pub fn class_of(&self, i: usize) -> AlternativeClass {
        self.classes[self.alternatives[i].alt]
    }

    /// Expanded indices of every price level of original alternative `alt`.
    pub fn price_levels(&self, alt: usize) -> &[usize] {
        &self.levels[alt]
    }

    /// Expanded indices of endogenous alternatives, ascending.
    pub fn endogenous(&self) -> &[usize] {
        &self.endogenous
    }

    /// Expanded alternatives that are open in every feasible solution.
    ///
    /// These are the mandatory alternatives with a single price level.
    pub fn always_open(&self) -> Vec<usize> {
        (0..self.n_alternatives())
            .filter(|&a| self.classes[a].is_mandatory() && self.levels[a].len() == 1)
            .map(|a| self.levels[a][0])
            .collect()
    }

    pub fn population(&self, n: usize) -> f64 {
        self.population[n]
    }

    pub fn total_population(&self) -> f64 {
        self.population.iter().sum()
    }

    /// Objective weight of every cell of customer `n`: `popN[n] / R`.
    pub fn weight(&self, n: usize) -> f64 {
        self.population[n] / self.n_draws as f64
    }

    pub fn utility(&self, i: usize, n: usize, r: usize) -> f64 {
        self.utilities.get(i, n, r)
    }

    pub fn big_m(&self, i: usize, n: usize, r: usize) -> f64 {
        self.big_m.get(i, n, r)
    }

    pub fn utilities(&self) -> &UtilityTensor {
        &self.utilities
    }

    pub fn big_m_tensor(&self) -> &UtilityTensor {
        &self.big_m
    }

    /// Number of `(n, r)` cells.
    pub fn n_cells(&self) -> usize {
        self.n_customers * self.n_draws
    }

    /// Flat index of cell `(n, r)`.
    #[inline]
    pub fn cell_index(&self, n: usize, r: usize) -> usize {
        n * self.n_draws + r
    }

    /// Iterate over all `(n, r)` cells in flat-index order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n_customers).flat_map(move |n| (0..self.n_draws).map(move |r| (n, r)))
    }

    /// Sub-instance restricted to the given customers and draws.
    ///
    /// Population weights are rescaled so that the restricted instance carries
    /// the same total demand, which keeps fixed costs and revenue comparable.
    pub fn restrict(&self, customers: &[usize], draws: &[usize]) -> BbcResult<Self> {
        if customers.is_empty() || draws.is_empty() {
            return Err(BbcError::Validation(
                "restriction needs at least one customer and one draw".into(),
            ));
        }
        if let Some(n) = customers.iter().find(|&&n| n >= self.n_customers) {
            return Err(BbcError::Validation(format!("unknown customer {}", n)));
        }
        if let Some(r) = draws.iter().find(|&&r| r >= self.n_draws) {
            return Err(BbcError::Validation(format!("unknown draw {}", r)));
        }

        let kept: f64 = customers.iter().map(|&n| self.population[n]).sum();
        let scale = if kept > 0.0 {
            self.total_population() / kept
        } else {
            1.0
        };

        let n_expanded = self.n_expanded();
        let mut utilities = UtilityTensor::zeros(n_expanded, customers.len(), draws.len());
        let mut big_m = UtilityTensor::zeros(n_expanded, customers.len(), draws.len());
        for (new_n, &n) in customers.iter().enumerate() {
            for (new_r, &r) in draws.iter().enumerate() {
                for i in 0..n_expanded {
                    utilities.set(i, new_n, new_r, self.utilities.get(i, n, r));
                    big_m.set(i, new_n, new_r, self.big_m.get(i, n, r));
                }
            }
        }

        Self::new(InstanceParts {
            n_customers: customers.len(),
            n_draws: draws.len(),
            n_opt_out: self.n_opt_out,
            supplier: self.supplier,
            alternatives: self.alternatives.clone(),
            fixed_cost: self.fixed_cost.clone(),
            customer_cost: self.customer_cost.clone(),
            operator: self.operator.clone(),
            population: customers
                .iter()
                .map(|&n| self.population[n] * scale)
                .collect(),
            utilities,
            big_m,
        })
    }

    /// Selection vector with the first price level of each mandatory
    /// alternative open and everything else closed.
    pub fn base_selection(&self) -> Vec<bool> {
        let mut open = vec![false; self.n_expanded()];
        for a in 0..self.n_alternatives() {
            if self.classes[a].is_mandatory() {
                open[self.levels[a][0]] = true;
            }
        }
        open
    }

    /// Whether `open` satisfies the one-level-per-alternative rules.
    pub fn is_feasible_selection(&self, open: &[bool]) -> bool {
        if open.len() != self.n_expanded() {
            return false;
        }
        (0..self.n_alternatives()).all(|a| {
            let active = self.levels[a].iter().filter(|&&i| open[i]).count();
            if self.classes[a].is_mandatory() {
                active == 1
            } else {
                active <= 1
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::toy_instance;

    fn parts() -> InstanceParts {
        let utilities = UtilityTensor::from_nested(&[
            vec![vec![1.0]],
            vec![vec![2.0]],
            vec![vec![3.0]],
        ])
        .unwrap();
        InstanceParts {
            n_customers: 1,
            n_draws: 1,
            n_opt_out: 1,
            supplier: DEFAULT_SUPPLIER,
            alternatives: vec![
                ExpandedAlternative { alt: 0, price: 0.0 },
                ExpandedAlternative { alt: 1, price: 2.0 },
                ExpandedAlternative { alt: 1, price: 3.0 },
            ],
            fixed_cost: vec![0.0, 4.0],
            customer_cost: vec![0.0, 0.5],
            operator: vec![0, 1],
            population: vec![10.0],
            big_m: utilities.clone(),
            utilities,
        }
    }

    #[test]
    fn test_classes_and_levels() {
        let inst = ChoiceInstance::new(parts()).unwrap();
        assert_eq!(inst.class(0), AlternativeClass::OptOut);
        assert_eq!(inst.class(1), AlternativeClass::Endogenous);
        assert_eq!(inst.price_levels(1), &[1, 2]);
        assert_eq!(inst.endogenous(), &[1, 2]);
        assert_eq!(inst.n_out_expanded(), 1);
        assert_eq!(inst.always_open(), vec![0]);
    }

    #[test]
    fn test_revenue_is_supplier_markup() {
        let inst = ChoiceInstance::new(parts()).unwrap();
        assert_eq!(inst.revenue(0), 0.0);
        assert!((inst.revenue(1) - 1.5).abs() < 1e-12);
        assert!((inst.revenue(2) - 2.5).abs() < 1e-12);
        assert!((inst.max_revenue() - 2.5).abs() < 1e-12);
        assert_eq!(inst.fixed_cost_of(2), 4.0);
    }

    #[test]
    fn test_competitor_earns_no_revenue() {
        let mut p = parts();
        p.operator = vec![0, 2];
        let inst = ChoiceInstance::new(p).unwrap();
        assert_eq!(inst.class(1), AlternativeClass::Competitor);
        assert_eq!(inst.revenue(1), 0.0);
        assert!(inst.endogenous().is_empty());
    }

    #[test]
    fn test_non_positive_utility_rejected() {
        let mut p = parts();
        p.utilities.set(1, 0, 0, 0.0);
        let err = ChoiceInstance::new(p).unwrap_err();
        assert!(matches!(err, BbcError::Validation(_)));
    }

    #[test]
    fn test_big_m_below_utility_rejected() {
        let mut p = parts();
        p.big_m.set(2, 0, 0, 1.0);
        assert!(ChoiceInstance::new(p).is_err());
    }

    #[test]
    fn test_alternative_without_price_level_rejected() {
        let mut p = parts();
        p.fixed_cost.push(1.0);
        p.customer_cost.push(0.0);
        p.operator.push(1);
        assert!(ChoiceInstance::new(p).is_err());
    }

    #[test]
    fn test_feasible_selection_rules() {
        let inst = ChoiceInstance::new(parts()).unwrap();
        assert!(inst.is_feasible_selection(&[true, false, false]));
        assert!(inst.is_feasible_selection(&[true, true, false]));
        assert!(!inst.is_feasible_selection(&[true, true, true]));
        assert!(!inst.is_feasible_selection(&[false, true, false]));
        assert_eq!(inst.base_selection(), vec![true, false, false]);
    }

    #[test]
    fn test_restrict_preserves_total_population() {
        let inst = toy_instance();
        let sub = inst.restrict(&[1], &[0]).unwrap();
        assert_eq!(sub.n_customers(), 1);
        assert_eq!(sub.n_draws(), 1);
        assert!((sub.total_population() - inst.total_population()).abs() < 1e-9);
        assert_eq!(sub.utility(2, 0, 0), inst.utility(2, 1, 0));
    }

    #[test]
    fn test_cells_follow_flat_index() {
        let inst = toy_instance();
        let cells: Vec<_> = inst.cells().collect();
        assert_eq!(cells.len(), inst.n_cells());
        for (k, (n, r)) in cells.into_iter().enumerate() {
            assert_eq!(inst.cell_index(n, r), k);
        }
    }
}
