//! Exact evaluation of a facility/price selection.
//!
//! For a binary selection every customer simply takes the open alternative
//! with the highest utility. Exact ties go to the alternative that pays the
//! supplier most, then to the lowest index, which matches the value of the
//! customer choice LP.

use bbc_core::{AlternativeClass, ChoiceInstance};

/// Alternative chosen in cell `(n, r)`, `None` when nothing is open.
pub fn chosen_alternative(inst: &ChoiceInstance, n: usize, r: usize, open: &[bool]) -> Option<usize> {
    let utilities = inst.utilities().cell(n, r);
    let mut best: Option<usize> = None;
    for (i, &u) in utilities.iter().enumerate() {
        if !open[i] {
            continue;
        }
        best = match best {
            None => Some(i),
            Some(b) => {
                let ub = utilities[b];
                if u > ub || (u == ub && inst.revenue(i) > inst.revenue(b)) {
                    Some(i)
                } else {
                    Some(b)
                }
            }
        };
    }
    best
}

/// Subproblem value `φ_nr(y) = -w[n] · rev[chosen]`.
pub fn cell_value(inst: &ChoiceInstance, n: usize, r: usize, open: &[bool]) -> f64 {
    chosen_alternative(inst, n, r, open).map_or(0.0, |i| -inst.weight(n) * inst.revenue(i))
}

/// Fixed costs the supplier pays for the open endogenous alternatives.
pub fn fixed_costs(inst: &ChoiceInstance, open: &[bool]) -> f64 {
    inst.endogenous()
        .iter()
        .filter(|&&i| open[i])
        .map(|&i| inst.fixed_cost_of(i))
        .sum()
}

/// Master objective of a selection: fixed costs minus realized revenue.
pub fn selection_cost(inst: &ChoiceInstance, open: &[bool]) -> f64 {
    let recourse: f64 = inst.cells().map(|(n, r)| cell_value(inst, n, r, open)).sum();
    fixed_costs(inst, open) + recourse
}

/// Round master values to a selection.
pub fn selection_from_values(values: &[f64]) -> Vec<bool> {
    values.iter().map(|&v| v > 0.5).collect()
}

/// Per-alternative outcome of a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub cost: f64,
    pub fixed_cost: f64,
    pub revenue: f64,
    /// Expected demand captured by every expanded alternative
    pub demand: Vec<f64>,
}

impl Evaluation {
    pub fn profit(&self) -> f64 {
        -self.cost
    }
}

pub fn evaluate_selection(inst: &ChoiceInstance, open: &[bool]) -> Evaluation {
    let mut demand = vec![0.0; inst.n_expanded()];
    let mut revenue = 0.0;
    for (n, r) in inst.cells() {
        if let Some(i) = chosen_alternative(inst, n, r, open) {
            let w = inst.weight(n);
            demand[i] += w;
            revenue += w * inst.revenue(i);
        }
    }
    let fixed_cost = fixed_costs(inst, open);
    Evaluation {
        cost: fixed_cost - revenue,
        fixed_cost,
        revenue,
        demand,
    }
}

/// Force mandatory single-level alternatives open and drop extra levels so
/// that `open` satisfies the price-level rules.
pub fn repair_selection(inst: &ChoiceInstance, open: &[bool]) -> Vec<bool> {
    let mut repaired = open.to_vec();
    for a in 0..inst.n_alternatives() {
        let levels = inst.price_levels(a);
        let first_open = levels.iter().copied().find(|&i| repaired[i]);
        for &i in levels {
            repaired[i] = false;
        }
        match (first_open, inst.class(a)) {
            (Some(i), _) => repaired[i] = true,
            (None, AlternativeClass::OptOut | AlternativeClass::Competitor) => repaired[levels[0]] = true,
            (None, AlternativeClass::Endogenous) => {}
        }
    }
    repaired
}
