//! Pool of feasible selections collected before branch-and-cut.

use bbc_core::ChoiceInstance;
use serde::Serialize;

use crate::benders::evaluate::{repair_selection, selection_cost};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolEntry {
    pub open: Vec<bool>,
    /// Exact master objective of `open`
    pub cost: f64,
}

impl PoolEntry {
    pub fn evaluate(inst: &ChoiceInstance, open: Vec<bool>) -> Self {
        let cost = selection_cost(inst, &open);
        Self { open, cost }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SolutionPool {
    entries: Vec<PoolEntry>,
}

impl SolutionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PoolEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = PoolEntry>) {
        self.entries.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    /// Drop repeated selections, keeping the first occurrence of each.
    /// Returns the number of removed entries.
    pub fn remove_duplicates(&mut self) -> usize {
        let before = self.entries.len();
        let mut kept: Vec<PoolEntry> = Vec::with_capacity(before);
        for entry in self.entries.drain(..) {
            if !kept.iter().any(|k| k.open == entry.open) {
                kept.push(entry);
            }
        }
        self.entries = kept;
        before - self.entries.len()
    }

    /// Entries ordered by cost, ties in pool order.
    pub fn sorted(&self) -> Vec<&PoolEntry> {
        let mut sorted: Vec<&PoolEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        sorted
    }

    pub fn best(&self) -> Option<&PoolEntry> {
        self.entries.iter().min_by(|a, b| a.cost.total_cmp(&b.cost))
    }

    /// The best `ceil(fraction · len)` entries, at least one when non-empty.
    pub fn best_fraction(&self, fraction: f64) -> Vec<&PoolEntry> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let count = ((fraction.clamp(0.0, 1.0) * self.entries.len() as f64).ceil() as usize).max(1);
        self.sorted().into_iter().take(count).collect()
    }

    /// Add selections until every endogenous alternative is open in at least
    /// `min_with_i` entries.
    ///
    /// New selections take the best existing entries in turn and switch the
    /// missing alternative on, replacing any other price level of the same
    /// facility. Returns the number of entries added.
    pub fn additional_solutions(&mut self, inst: &ChoiceInstance, min_with_i: usize) -> usize {
        let mut added = 0;
        for &i in inst.endogenous() {
            let mut count = self.entries.iter().filter(|e| e.open[i]).count();
            if count >= min_with_i {
                continue;
            }
            let mut bases: Vec<Vec<bool>> = self
                .sorted()
                .into_iter()
                .filter(|e| !e.open[i])
                .map(|e| e.open.clone())
                .collect();
            bases.push(inst.base_selection());

            for mut open in bases {
                if count >= min_with_i {
                    break;
                }
                for &level in inst.price_levels(inst.alternative(i).alt) {
                    open[level] = false;
                }
                open[i] = true;
                let open = repair_selection(inst, &open);
                if self.entries.iter().any(|e| e.open == open) {
                    continue;
                }
                self.entries.push(PoolEntry::evaluate(inst, open));
                count += 1;
                added += 1;
            }
        }
        added
    }
}

/// Unique selections in first-seen order.
pub fn remove_duplicates(selections: Vec<Vec<bool>>) -> Vec<Vec<bool>> {
    let mut unique: Vec<Vec<bool>> = Vec::with_capacity(selections.len());
    for open in selections {
        if !unique.contains(&open) {
            unique.push(open);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbc_core::test_utils::toy_instance;

    #[test]
    fn duplicates_keep_first_seen_order() {
        let a = vec![true, false, false];
        let b = vec![true, true, false];
        let c = vec![true, false, true];
        let unique = remove_duplicates(vec![b.clone(), a.clone(), b.clone(), c.clone(), a.clone()]);
        assert_eq!(unique, vec![b, a, c]);
    }

    #[test]
    fn pool_deduplication_counts_removed() {
        let inst = toy_instance();
        let mut pool = SolutionPool::new();
        for open in [[true, true, false], [true, false, true], [true, true, false]] {
            pool.push(PoolEntry::evaluate(&inst, open.to_vec()));
        }
        assert_eq!(pool.remove_duplicates(), 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.entries()[0].open, vec![true, true, false]);
        assert_eq!(pool.entries()[1].open, vec![true, false, true]);
    }

    #[test]
    fn best_fraction_rounds_up() {
        let inst = toy_instance();
        let mut pool = SolutionPool::new();
        for (a, b) in [(false, false), (true, false), (false, true), (true, true)] {
            pool.push(PoolEntry::evaluate(&inst, vec![true, a, b]));
        }
        let best = pool.best_fraction(0.1);
        assert_eq!(best.len(), 1);
        assert!((best[0].cost + 35.0).abs() < 1e-9);
        assert_eq!(pool.best_fraction(0.5).len(), 2);
        assert!((pool.best().unwrap().cost + 35.0).abs() < 1e-9);
    }

    #[test]
    fn additional_solutions_cover_every_facility() {
        let inst = toy_instance();
        let mut pool = SolutionPool::new();
        pool.push(PoolEntry::evaluate(&inst, inst.base_selection()));
        let added = pool.additional_solutions(&inst, 1);
        assert_eq!(added, 2);
        for &i in inst.endogenous() {
            assert!(pool.entries().iter().any(|e| e.open[i]));
        }
        for e in pool.entries() {
            assert!(inst.is_feasible_selection(&e.open));
        }
    }
}
