//! Single-customer and single-scenario MIPs.
//!
//! Each customer (or draw) is solved on its own as a small master with every
//! choice variable kept explicit, so no Benders cuts are needed. The optimal
//! selection of each sub-instance is then re-evaluated on the full instance
//! and joins the solution pool.

use bbc_core::ChoiceInstance;
use rayon::prelude::*;
use tracing::debug;

use super::pool::PoolEntry;
use crate::benders::evaluate::{repair_selection, selection_from_values};
use crate::benders::master::{build_master, objective_lower_bound, ObjectiveBounds};
use crate::benders::BendersError;
use crate::mip::{BranchAndCut, MipConfig, NoCallback};

/// Solve `sub` exactly with its choice block in the master.
///
/// Returns `None` when no incumbent was found within the time limit.
pub fn solve_explicit(sub: &ChoiceInstance, mip: &MipConfig) -> Result<Option<Vec<bool>>, BendersError> {
    let retained = vec![true; sub.n_draws()];
    let bounds = ObjectiveBounds {
        lower: objective_lower_bound(sub),
        upper: f64::INFINITY,
    };
    let (model, layout) = build_master(sub, &retained, bounds, &[]);
    let solution = BranchAndCut::new(mip.clone()).solve(&model, &NoCallback, &[])?;
    Ok(solution
        .values
        .map(|values| repair_selection(sub, &selection_from_values(layout.y_values(&values)))))
}

fn sub_config(mip: &MipConfig, time_limit_secs: Option<f64>) -> MipConfig {
    MipConfig {
        threads: 1,
        time_limit_secs,
        ..mip.clone()
    }
}

fn solve_restrictions(
    inst: &ChoiceInstance,
    restrictions: Vec<(Vec<usize>, Vec<usize>)>,
    mip: &MipConfig,
) -> Result<Vec<PoolEntry>, BendersError> {
    let found: Vec<Option<Vec<bool>>> = restrictions
        .into_par_iter()
        .map(|(customers, draws)| {
            let sub = inst.restrict(&customers, &draws)?;
            solve_explicit(&sub, mip)
        })
        .collect::<Result<_, BendersError>>()?;
    Ok(found
        .into_iter()
        .flatten()
        .map(|open| PoolEntry::evaluate(inst, open))
        .collect())
}

/// One selection per customer, optimal for that customer over all draws.
pub fn single_customer_solutions(
    inst: &ChoiceInstance,
    mip: &MipConfig,
    time_limit_secs: Option<f64>,
) -> Result<Vec<PoolEntry>, BendersError> {
    let draws: Vec<usize> = (0..inst.n_draws()).collect();
    let restrictions = (0..inst.n_customers()).map(|n| (vec![n], draws.clone())).collect();
    let entries = solve_restrictions(inst, restrictions, &sub_config(mip, time_limit_secs))?;
    debug!(solutions = entries.len(), "single-customer presolve");
    Ok(entries)
}

/// One selection per draw, optimal for that draw over all customers.
pub fn single_scenario_solutions(
    inst: &ChoiceInstance,
    mip: &MipConfig,
    time_limit_secs: Option<f64>,
) -> Result<Vec<PoolEntry>, BendersError> {
    let customers: Vec<usize> = (0..inst.n_customers()).collect();
    let restrictions = (0..inst.n_draws()).map(|r| (customers.clone(), vec![r])).collect();
    let entries = solve_restrictions(inst, restrictions, &sub_config(mip, time_limit_secs))?;
    debug!(solutions = entries.len(), "single-scenario presolve");
    Ok(entries)
}
