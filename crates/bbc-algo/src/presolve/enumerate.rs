//! Brute-force enumeration of small facility sets and incompatibility cuts.
//!
//! Both walk combinations of endogenous expanded alternatives that belong to
//! distinct facilities, smallest sets first, and stop at a caller-supplied
//! limit so that large instances stay cheap.

use bbc_core::ChoiceInstance;
use rayon::prelude::*;
use tracing::debug;

use super::pool::PoolEntry;

/// Largest facility set an incompatibility cut may cover.
pub const MAX_INCOMPATIBLE_SET: usize = 3;

const DOMINANCE_TOL: f64 = 1e-9;

/// Sets of endogenous alternatives with distinct facilities, of size
/// `1..=max_size`, in lexicographic order by size. At most `limit` sets.
pub fn facility_sets(inst: &ChoiceInstance, max_size: usize, limit: usize) -> Vec<Vec<usize>> {
    let endogenous = inst.endogenous();
    let mut sets = Vec::new();
    for size in 1..=max_size {
        let mut stack: Vec<usize> = Vec::with_capacity(size);
        collect_sets(inst, endogenous, 0, size, &mut stack, &mut sets, limit);
        if sets.len() >= limit {
            break;
        }
    }
    sets
}

fn collect_sets(
    inst: &ChoiceInstance,
    candidates: &[usize],
    start: usize,
    size: usize,
    stack: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
    limit: usize,
) {
    if out.len() >= limit {
        return;
    }
    if stack.len() == size {
        out.push(stack.clone());
        return;
    }
    for k in start..candidates.len() {
        let i = candidates[k];
        let alt = inst.alternative(i).alt;
        if stack.iter().any(|&j| inst.alternative(j).alt == alt) {
            continue;
        }
        stack.push(i);
        collect_sets(inst, candidates, k + 1, size, stack, out, limit);
        stack.pop();
        if out.len() >= limit {
            return;
        }
    }
}

/// Evaluate the base selection plus every facility set of up to `max_size`
/// members opened on top of it.
pub fn enumerate_selections(inst: &ChoiceInstance, max_size: usize, limit: usize) -> Vec<PoolEntry> {
    let base = inst.base_selection();
    let mut selections = vec![base.clone()];
    selections.extend(facility_sets(inst, max_size, limit.saturating_sub(1)).into_iter().map(|set| {
        let mut open = base.clone();
        for i in set {
            open[i] = true;
        }
        open
    }));
    let entries: Vec<PoolEntry> = selections
        .into_par_iter()
        .map(|open| PoolEntry::evaluate(inst, open))
        .collect();
    debug!(selections = entries.len(), max_size, "enumerated facility sets");
    entries
}

/// Upper bound on the profit `b` can add to any selection containing
/// `others`: every cell where `b` beats the best of `others` and the
/// always-open alternatives switches to `b` at the largest possible gain.
fn best_gain(inst: &ChoiceInstance, b: usize, others: &[usize], always_open: &[usize]) -> f64 {
    let floor = inst.min_revenue().min(0.0);
    let gain_per_unit = inst.revenue(b) - floor;
    if gain_per_unit <= 0.0 {
        return 0.0;
    }
    inst.cells()
        .filter(|&(n, r)| {
            let u_b = inst.utility(b, n, r);
            others
                .iter()
                .chain(always_open)
                .all(|&j| u_b >= inst.utility(j, n, r))
        })
        .map(|(n, _)| inst.weight(n) * gain_per_unit)
        .sum()
}

/// Facility sets that never appear together in an optimal selection.
///
/// A set `A ∪ {b}` is incompatible when the fixed cost of `b` exceeds the
/// largest profit `b` can capture while `A` is open: closing `b` then
/// strictly improves every selection containing the set. Supersets of sets
/// already found are skipped.
pub fn incompatibility_cuts(inst: &ChoiceInstance, limit: usize) -> Vec<Vec<usize>> {
    let always_open = inst.always_open();
    let sets = facility_sets(inst, MAX_INCOMPATIBLE_SET, limit);

    let mut cuts: Vec<Vec<usize>> = Vec::new();
    for size in 1..=MAX_INCOMPATIBLE_SET {
        let found: Vec<Vec<usize>> = sets
            .par_iter()
            .filter(|set| set.len() == size)
            .filter(|set| !cuts.iter().any(|cut| cut.iter().all(|i| set.contains(i))))
            .filter(|set| {
                set.iter().any(|&b| {
                    let others: Vec<usize> = set.iter().copied().filter(|&j| j != b).collect();
                    inst.fixed_cost_of(b) > best_gain(inst, b, &others, &always_open) + DOMINANCE_TOL
                })
            })
            .cloned()
            .collect();
        cuts.extend(found);
    }
    debug!(cuts = cuts.len(), tested = sets.len(), "incompatibility cuts");
    cuts
}
