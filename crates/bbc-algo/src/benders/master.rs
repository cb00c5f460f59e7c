//! Master MIP over facility/price selections.
//!
//! Column order is fixed: `obj`, `z`, one `z_nr` per Benders cell, one binary
//! `y_i` per expanded alternative, then the choice block `(x, u, v, s)` of every
//! cell whose draw is retained in the master.
//!
//! ```text
//!   min obj
//!   obj - Σ fc_i y_i - z + Σ_retained w·rev_i·x_i = 0
//!   z - Σ z_nr                                    = 0
//!   Σ_{levels of a} y_i = 1      a mandatory
//!   Σ_{levels of a} y_i ≤ 1      a endogenous
//!   LB ≤ obj ≤ UB,  z_nr ≥ -w·max rev
//! ```

use bbc_core::{AlternativeClass, ChoiceInstance};

use super::evaluate::chosen_alternative;
use crate::mip::{ColumnKind, MipModel, Row};

/// Column of each retained cell's choice block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedBlock {
    pub n: usize,
    pub r: usize,
    /// First of `n_expanded` choice columns
    pub x: usize,
    pub u: usize,
    /// First of `n_expanded` unavailability slacks
    pub v: usize,
    /// First of `n_expanded` chosen-utility columns
    pub s: usize,
}

/// Index map of the master columns.
#[derive(Debug, Clone)]
pub struct MasterLayout {
    pub obj: usize,
    pub z: usize,
    z_cells: Vec<Option<usize>>,
    y_start: usize,
    n_expanded: usize,
    retained_draws: Vec<bool>,
    retained: Vec<RetainedBlock>,
}

impl MasterLayout {
    pub fn y(&self, i: usize) -> usize {
        self.y_start + i
    }

    /// Epigraph column of a Benders cell, `None` for retained cells.
    pub fn z_cell(&self, cell: usize) -> Option<usize> {
        self.z_cells.get(cell).copied().flatten()
    }

    pub fn is_retained(&self, r: usize) -> bool {
        self.retained_draws[r]
    }

    pub fn retained_draws(&self) -> &[bool] {
        &self.retained_draws
    }

    pub fn retained_blocks(&self) -> &[RetainedBlock] {
        &self.retained
    }

    pub fn n_benders_cells(&self) -> usize {
        self.z_cells.iter().filter(|z| z.is_some()).count()
    }

    /// `y` slice of a master point.
    pub fn y_values<'v>(&self, values: &'v [f64]) -> &'v [f64] {
        &values[self.y_start..self.y_start + self.n_expanded]
    }
}

/// Bounds placed on the `obj` column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Valid lower bound on the master objective: every cell earns at most the
/// best revenue and negative fixed costs are all collected.
pub fn objective_lower_bound(inst: &ChoiceInstance) -> f64 {
    let best_cell: f64 = (0..inst.n_customers())
        .map(|n| -inst.weight(n) * inst.max_revenue() * inst.n_draws() as f64)
        .sum();
    let fixed: f64 = (0..inst.n_alternatives())
        .filter(|&a| inst.class(a) == AlternativeClass::Endogenous)
        .map(|a| inst.fixed_cost(a).min(0.0))
        .sum();
    best_cell + fixed
}

/// Build the master.
///
/// `incompatible` lists sets of expanded alternatives that are never open
/// together in an optimal selection.
pub fn build_master(
    inst: &ChoiceInstance,
    retained_draws: &[bool],
    bounds: ObjectiveBounds,
    incompatible: &[Vec<usize>],
) -> (MipModel, MasterLayout) {
    let n_exp = inst.n_expanded();
    let mut model = MipModel::new();

    let upper = if bounds.upper.is_finite() {
        bounds.upper + 1e-6_f64.max(1e-6 * bounds.upper.abs())
    } else {
        f64::INFINITY
    };
    let obj = model.add_column("obj", ColumnKind::Continuous, bounds.lower, upper, 1.0);
    let z = model.add_column("z", ColumnKind::Continuous, f64::NEG_INFINITY, f64::INFINITY, 0.0);

    let z_cells: Vec<Option<usize>> = inst
        .cells()
        .map(|(n, r)| {
            (!retained_draws[r]).then(|| {
                let w = inst.weight(n);
                model.add_column(
                    format!("z[{}][{}]", n, r),
                    ColumnKind::Continuous,
                    -w * inst.max_revenue(),
                    -w * inst.min_revenue(),
                    0.0,
                )
            })
        })
        .collect();

    let y_start = model.n_columns();
    for (i, e) in inst.alternatives().iter().enumerate() {
        let col = model.add_column(format!("y[{}]", i), ColumnKind::Binary, 0.0, 1.0, 0.0);
        let class = inst.class(e.alt);
        if class.is_mandatory() && inst.price_levels(e.alt).len() == 1 {
            model.set_bounds(col, 1.0, 1.0);
        }
    }

    let mut retained = Vec::new();
    for (n, r) in inst.cells().filter(|&(_, r)| retained_draws[r]) {
        let mut block = |prefix: &str| {
            let first = model.n_columns();
            for i in 0..n_exp {
                model.add_column(
                    format!("{}[{}][{}][{}]", prefix, i, n, r),
                    ColumnKind::Continuous,
                    0.0,
                    f64::INFINITY,
                    0.0,
                );
            }
            first
        };
        let x = block("x");
        let v = block("v");
        let s = block("s");
        let u = model.add_column(format!("u[{}][{}]", n, r), ColumnKind::Continuous, 0.0, f64::INFINITY, 0.0);
        retained.push(RetainedBlock { n, r, x, u, v, s });
    }

    let layout = MasterLayout {
        obj,
        z,
        z_cells,
        y_start,
        n_expanded: n_exp,
        retained_draws: retained_draws.to_vec(),
        retained,
    };

    // objective link
    let mut terms = vec![(obj, 1.0), (z, -1.0)];
    for &i in inst.endogenous() {
        let fc = inst.fixed_cost_of(i);
        if fc != 0.0 {
            terms.push((layout.y(i), -fc));
        }
    }
    for block in &layout.retained {
        let w = inst.weight(block.n);
        for i in 0..n_exp {
            let rev = inst.revenue(i);
            if rev != 0.0 {
                terms.push((block.x + i, w * rev));
            }
        }
    }
    model.add_row(Row::eq(terms, 0.0));

    // aggregate epigraph
    let mut terms = vec![(z, 1.0)];
    terms.extend(layout.z_cells.iter().flatten().map(|&c| (c, -1.0)));
    model.add_row(Row::eq(terms, 0.0));

    // price levels
    for a in 0..inst.n_alternatives() {
        let terms: Vec<(usize, f64)> = inst.price_levels(a).iter().map(|&i| (layout.y(i), 1.0)).collect();
        if inst.class(a).is_mandatory() {
            model.add_row(Row::eq(terms, 1.0));
        } else if terms.len() > 1 {
            model.add_row(Row::le(terms, 1.0));
        }
    }

    for block in &layout.retained {
        add_choice_rows(&mut model, inst, &layout, block);
    }

    for members in incompatible {
        let terms = members.iter().map(|&i| (layout.y(i), 1.0)).collect();
        model.add_row(Row::le(terms, members.len() as f64 - 1.0));
    }

    (model, layout)
}

/// Primal choice rows of a retained cell, with `y` as master variables.
fn add_choice_rows(model: &mut MipModel, inst: &ChoiceInstance, layout: &MasterLayout, b: &RetainedBlock) {
    let n_exp = inst.n_expanded();
    let utility = inst.utilities().cell(b.n, b.r);
    let big_m = inst.big_m_tensor().cell(b.n, b.r);

    model.add_row(Row::le((0..n_exp).map(|i| (b.x + i, 1.0)).collect(), 1.0));
    let mut max_row = vec![(b.u, 1.0)];
    for i in 0..n_exp {
        let y = layout.y(i);
        // x_i ≤ y_i
        model.add_row(Row::le(vec![(b.x + i, 1.0), (y, -1.0)], 0.0));
        // u + v_i ≥ U_i
        model.add_row(Row::le(vec![(b.u, -1.0), (b.v + i, -1.0)], -utility[i]));
        // s_i ≤ U_i x_i
        model.add_row(Row::le(vec![(b.s + i, 1.0), (b.x + i, -utility[i])], 0.0));
        // v_i ≤ M_i (1 - y_i)
        model.add_row(Row::le(vec![(b.v + i, 1.0), (y, big_m[i])], big_m[i]));
        // s_i ≤ M_i y_i
        model.add_row(Row::le(vec![(b.s + i, 1.0), (y, -big_m[i])], 0.0));
        max_row.push((b.s + i, -1.0));
    }
    // u ≤ Σ s_i
    model.add_row(Row::le(max_row, 0.0));
}

/// Full master point for a feasible selection, usable as a MIP start.
pub fn warm_start(inst: &ChoiceInstance, layout: &MasterLayout, model: &MipModel, open: &[bool]) -> Vec<f64> {
    let mut values = vec![0.0; model.n_columns()];
    let mut z_total = 0.0;
    let mut retained_revenue = 0.0;

    for (cell, (n, r)) in inst.cells().enumerate() {
        let chosen = chosen_alternative(inst, n, r, open);
        let w = inst.weight(n);
        match layout.z_cell(cell) {
            Some(col) => {
                let phi = chosen.map_or(0.0, |i| -w * inst.revenue(i));
                values[col] = phi;
                z_total += phi;
            }
            None => {
                let block = layout
                    .retained
                    .iter()
                    .find(|b| b.n == n && b.r == r)
                    .cloned();
                if let Some(b) = block {
                    let big_m = inst.big_m_tensor().cell(n, r);
                    for i in 0..inst.n_expanded() {
                        if !open[i] {
                            values[b.v + i] = big_m[i];
                        }
                    }
                    if let Some(k) = chosen {
                        let u = inst.utility(k, n, r);
                        values[b.x + k] = 1.0;
                        values[b.u] = u;
                        values[b.s + k] = u;
                        retained_revenue += w * inst.revenue(k);
                    }
                }
            }
        }
    }

    let mut fixed = 0.0;
    for (i, &is_open) in open.iter().enumerate() {
        if is_open {
            values[layout.y(i)] = 1.0;
        }
    }
    for &i in inst.endogenous() {
        if open[i] {
            fixed += inst.fixed_cost_of(i);
        }
    }
    values[layout.z] = z_total;
    values[layout.obj] = fixed + z_total - retained_revenue;
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benders::evaluate::selection_cost;
    use crate::mip::{BranchAndCut, MipStatus, NoCallback};
    use bbc_core::test_utils::toy_instance;

    fn unbounded() -> ObjectiveBounds {
        ObjectiveBounds {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    #[test]
    fn layout_orders_columns() {
        let inst = toy_instance();
        let (model, layout) = build_master(&inst, &[false, false], unbounded(), &[]);
        assert_eq!(layout.obj, 0);
        assert_eq!(layout.z, 1);
        assert_eq!(layout.n_benders_cells(), 4);
        assert_eq!(layout.y(0), 6);
        assert_eq!(model.n_columns(), 9);
        // the opt-out is fixed open
        assert_eq!(model.column(layout.y(0)).lower, 1.0);
    }

    #[test]
    fn warm_start_is_feasible_and_exact() {
        let inst = toy_instance();
        for retained in [[false, false], [true, false], [true, true]] {
            let (model, layout) = build_master(&inst, &retained, unbounded(), &[]);
            for open in [[true, false, false], [true, true, false], [true, true, true]] {
                let start = warm_start(&inst, &layout, &model, &open);
                assert!(model.is_feasible(&start, 1e-9), "retained={:?} open={:?}", retained, open);
                let cost = selection_cost(&inst, &open);
                assert!((model.objective_value(&start) - cost).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn fully_retained_master_is_exact() {
        let inst = toy_instance();
        let lb = objective_lower_bound(&inst);
        let (model, _) = build_master(
            &inst,
            &[true, true],
            ObjectiveBounds {
                lower: lb,
                upper: f64::INFINITY,
            },
            &[],
        );
        let solution = BranchAndCut::default().solve(&model, &NoCallback, &[]).unwrap();
        assert_eq!(solution.status, MipStatus::Optimal);
        assert!((solution.objective.unwrap() + 35.0).abs() < 1e-4);
    }

    #[test]
    fn incompatibility_rows_exclude_pairs() {
        let inst = toy_instance();
        let (model, layout) = build_master(&inst, &[true, true], unbounded(), &[vec![1, 2]]);
        let start = warm_start(&inst, &layout, &model, &[true, true, true]);
        assert!(!model.is_feasible(&start, 1e-9));
    }

    #[test]
    fn lower_bound_is_below_every_selection() {
        let inst = toy_instance();
        let lb = objective_lower_bound(&inst);
        assert!(lb <= selection_cost(&inst, &[true, true, true]));
        // 4 cells of weight 5 at best revenue 3
        assert!((lb + 60.0).abs() < 1e-12);
    }
}
