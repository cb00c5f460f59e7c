//! Scenario clustering with k-medoids.
//!
//! Every draw is described by its opportunity-cost profile: for each pool
//! selection, how much worse that selection does on the draw than the best
//! pool selection for the same draw. Draws with similar profiles react alike
//! to facility decisions, so a medoid stands in for its cluster when choosing
//! which draws receive presolve cuts or stay explicit in the master.
//!
//! Without pool selections the raw utilities of every customer serve as the
//! profile instead.

use bbc_core::ChoiceInstance;
use serde::Serialize;
use tracing::debug;

use super::pool::SolutionPool;
use crate::benders::evaluate::cell_value;

const MAX_SWAP_ROUNDS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clustering {
    /// Medoid draws, ascending
    pub medoids: Vec<usize>,
    /// Medoid draw of every draw
    pub assignment: Vec<usize>,
    /// Sum of profile distances to the assigned medoid
    pub cost: f64,
}

impl Clustering {
    /// Membership mask over draws.
    pub fn medoid_mask(&self, n_draws: usize) -> Vec<bool> {
        let mut mask = vec![false; n_draws];
        for &m in &self.medoids {
            mask[m] = true;
        }
        mask
    }
}

/// Opportunity-cost profile of every draw.
pub fn draw_profiles(inst: &ChoiceInstance, pool: &SolutionPool) -> Vec<Vec<f64>> {
    if pool.is_empty() {
        return utility_profiles(inst);
    }
    (0..inst.n_draws())
        .map(|r| {
            let costs: Vec<f64> = pool
                .entries()
                .iter()
                .map(|e| {
                    (0..inst.n_customers())
                        .map(|n| cell_value(inst, n, r, &e.open))
                        .sum()
                })
                .collect();
            let best = costs.iter().copied().fold(f64::INFINITY, f64::min);
            costs.into_iter().map(|c| c - best).collect()
        })
        .collect()
}

fn utility_profiles(inst: &ChoiceInstance) -> Vec<Vec<f64>> {
    (0..inst.n_draws())
        .map(|r| {
            (0..inst.n_customers())
                .flat_map(|n| (0..inst.n_expanded()).map(move |i| (i, n)))
                .map(|(i, n)| inst.utility(i, n, r))
                .collect()
        })
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

fn total_cost(dist: &[Vec<f64>], medoids: &[usize]) -> f64 {
    (0..dist.len())
        .map(|p| {
            medoids
                .iter()
                .map(|&m| dist[p][m])
                .fold(f64::INFINITY, f64::min)
        })
        .sum()
}

/// Partition the profiles around `k` medoids.
///
/// Greedy build followed by best-improvement swaps; deterministic for a given
/// input. `k` is clamped to the number of profiles.
pub fn k_medoids(profiles: &[Vec<f64>], k: usize) -> Clustering {
    let n = profiles.len();
    let k = k.clamp(1, n.max(1));
    if n == 0 {
        return Clustering {
            medoids: Vec::new(),
            assignment: Vec::new(),
            cost: 0.0,
        };
    }
    let dist: Vec<Vec<f64>> = profiles
        .iter()
        .map(|a| profiles.iter().map(|b| distance(a, b)).collect())
        .collect();

    let mut medoids: Vec<usize> = Vec::with_capacity(k);
    while medoids.len() < k {
        let next = (0..n)
            .filter(|p| !medoids.contains(p))
            .map(|p| {
                let mut trial = medoids.clone();
                trial.push(p);
                (p, total_cost(&dist, &trial))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match next {
            Some((p, _)) => medoids.push(p),
            None => break,
        }
    }

    let mut cost = total_cost(&dist, &medoids);
    for _ in 0..MAX_SWAP_ROUNDS {
        let mut best: Option<(usize, usize, f64)> = None;
        for slot in 0..medoids.len() {
            for p in (0..n).filter(|p| !medoids.contains(p)) {
                let mut trial = medoids.clone();
                trial[slot] = p;
                let trial_cost = total_cost(&dist, &trial);
                if trial_cost < best.map_or(cost - 1e-12, |b| b.2) {
                    best = Some((slot, p, trial_cost));
                }
            }
        }
        match best {
            Some((slot, p, trial_cost)) => {
                medoids[slot] = p;
                cost = trial_cost;
            }
            None => break,
        }
    }

    medoids.sort_unstable();
    let assignment = (0..n)
        .map(|p| {
            medoids
                .iter()
                .copied()
                .min_by(|&a, &b| dist[p][a].total_cmp(&dist[p][b]))
                .unwrap_or(p)
        })
        .collect();
    debug!(k, cost, medoids = ?medoids, "k-medoids clustering");
    Clustering {
        medoids,
        assignment,
        cost,
    }
}

/// Cluster the draws of `inst` into `k` groups.
pub fn scenario_clustering(inst: &ChoiceInstance, pool: &SolutionPool, k: usize) -> Clustering {
    k_medoids(&draw_profiles(inst, pool), k)
}
