//! Subset cuts: combinatorial cuts ruling out sets of open facilities.
//!
//! Starting from a candidate selection, the endogenous facility whose removal
//! lowers the cost most is dropped, and the search continues on the reduced
//! selection until no removal helps or the depth cap is hit. Every level of
//! that chain yields a cut `Σ_{i ∈ S} y_i ≤ |S| - 1` over the facilities open
//! at that level; deeper levels have smaller `S` and are emitted first.
//!
//! The dominance is only checked at the visited selection, so these cuts are
//! a heuristic and may exclude optimal selections on adversarial instances.

use bbc_core::ChoiceInstance;

use super::evaluate::selection_cost;
use super::master::MasterLayout;
use crate::mip::Row;

const IMPROVEMENT_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SubsetCut {
    pub members: Vec<usize>,
    pub rhs: f64,
}

impl SubsetCut {
    pub fn lhs(&self, y: &[f64]) -> f64 {
        self.members.iter().map(|&i| y[i]).sum()
    }

    pub fn is_violated(&self, y: &[f64], eps: f64) -> bool {
        self.lhs(y) > self.rhs + eps
    }

    pub fn to_row(&self, layout: &MasterLayout) -> Row {
        Row::le(
            self.members.iter().map(|&i| (layout.y(i), 1.0)).collect(),
            self.rhs,
        )
    }
}

struct Level {
    open_endogenous: Vec<usize>,
    removed: usize,
    reduced: Vec<bool>,
    reduced_cost: f64,
}

/// Subset cuts for `open`, deepest level first.
pub fn subset_cuts(inst: &ChoiceInstance, open: &[bool], max_depth: usize, widen: bool) -> Vec<SubsetCut> {
    let mut chain: Vec<Level> = Vec::new();
    let mut current = open.to_vec();
    let mut cost = selection_cost(inst, &current);

    while chain.len() < max_depth {
        let open_endogenous: Vec<usize> = inst.endogenous().iter().copied().filter(|&i| current[i]).collect();
        let mut best: Option<(usize, f64, Vec<bool>)> = None;
        for &b in &open_endogenous {
            let mut trial = current.clone();
            trial[b] = false;
            let trial_cost = selection_cost(inst, &trial);
            let threshold = best.as_ref().map_or(cost - IMPROVEMENT_TOL, |(_, c, _)| *c);
            if trial_cost < threshold {
                best = Some((b, trial_cost, trial));
            }
        }
        let Some((removed, reduced_cost, reduced)) = best else {
            break;
        };
        current = reduced.clone();
        cost = reduced_cost;
        chain.push(Level {
            open_endogenous,
            removed,
            reduced,
            reduced_cost,
        });
    }

    chain
        .iter()
        .rev()
        .map(|level| {
            let mut members = level.open_endogenous.clone();
            let rhs = members.len() as f64 - 1.0;
            if widen {
                let alt = inst.alternative(level.removed).alt;
                for &sibling in inst.price_levels(alt) {
                    if sibling == level.removed {
                        continue;
                    }
                    let mut trial = level.reduced.clone();
                    trial[sibling] = true;
                    if selection_cost(inst, &trial) > level.reduced_cost + IMPROVEMENT_TOL {
                        members.push(sibling);
                    }
                }
            }
            SubsetCut { members, rhs }
        })
        .collect()
}
