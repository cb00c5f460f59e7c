//! Presolve and acceleration layer.
//!
//! ```text
//!   base selection ─┐
//!   enumeration ────┤
//!   single customer ├──► SolutionPool ──► dedup ──► UB, warm starts, presolve cuts
//!   single scenario ┘                       │
//!                                           └──► k-medoids over draws ──► partial Benders
//!   dominance test ──────────────────────────────► incompatibility rows
//! ```

pub mod clustering;
pub mod enumerate;
pub mod pool;
pub mod single;

use std::time::{Duration, Instant};

use bbc_core::ChoiceInstance;
use tracing::info;

use crate::benders::BendersError;
use crate::config::PresolveConfig;
use crate::mip::MipConfig;

pub use clustering::{k_medoids, scenario_clustering, Clustering};
pub use enumerate::{enumerate_selections, facility_sets, incompatibility_cuts};
pub use pool::{remove_duplicates, PoolEntry, SolutionPool};
pub use single::{single_customer_solutions, single_scenario_solutions, solve_explicit};

/// Everything presolve hands to the master.
#[derive(Debug, Clone)]
pub struct PresolveOutcome {
    pub pool: SolutionPool,
    /// Sets of expanded alternatives never open together
    pub incompatible: Vec<Vec<usize>>,
    pub clustering: Option<Clustering>,
    /// Best pool cost, infinite when the pool is empty
    pub upper_bound: f64,
    pub elapsed: Duration,
}

impl PresolveOutcome {
    pub fn empty() -> Self {
        Self {
            pool: SolutionPool::new(),
            incompatible: Vec::new(),
            clustering: None,
            upper_bound: f64::INFINITY,
            elapsed: Duration::ZERO,
        }
    }

    pub fn medoids(&self) -> &[usize] {
        match &self.clustering {
            Some(c) => &c.medoids,
            None => &[],
        }
    }
}

pub fn run_presolve(
    inst: &ChoiceInstance,
    config: &PresolveConfig,
    mip: &MipConfig,
) -> Result<PresolveOutcome, BendersError> {
    if !config.enabled {
        return Ok(PresolveOutcome::empty());
    }
    let started = Instant::now();

    let mut pool = SolutionPool::new();
    pool.push(PoolEntry::evaluate(inst, inst.base_selection()));
    if config.enumerate {
        pool.extend(enumerate_selections(inst, config.enumeration_size, config.enumeration_limit));
    }
    if config.single_customers {
        pool.extend(single_customer_solutions(inst, mip, config.single_time_limit_secs)?);
    }
    if config.single_scenarios {
        pool.extend(single_scenario_solutions(inst, mip, config.single_time_limit_secs)?);
    }
    pool.remove_duplicates();
    let added = pool.additional_solutions(inst, config.min_solutions_with_i);

    let incompatible = if config.incompatibility_cuts {
        incompatibility_cuts(inst, config.enumeration_limit)
    } else {
        Vec::new()
    };

    let clustering = (config.clustering || config.partial_benders)
        .then(|| scenario_clustering(inst, &pool, config.n_medoids));

    let upper_bound = pool.best().map_or(f64::INFINITY, |e| e.cost);
    let elapsed = started.elapsed();
    info!(
        pool = pool.len(),
        added,
        incompatible = incompatible.len(),
        upper_bound,
        elapsed = ?elapsed,
        "presolve finished"
    );
    Ok(PresolveOutcome {
        pool,
        incompatible,
        clustering,
        upper_bound,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbc_core::test_utils::toy_instance;

    #[test]
    fn default_presolve_finds_toy_optimum() {
        let inst = toy_instance();
        let outcome = run_presolve(&inst, &PresolveConfig::default(), &MipConfig::default()).unwrap();
        assert!((outcome.upper_bound + 35.0).abs() < 1e-9);
        assert_eq!(outcome.pool.len(), 4);
        assert!(outcome.incompatible.is_empty());
        assert!(outcome.clustering.is_none());
    }

    #[test]
    fn disabled_presolve_is_empty() {
        let inst = toy_instance();
        let outcome = run_presolve(&inst, &PresolveConfig::disabled(), &MipConfig::default()).unwrap();
        assert!(outcome.pool.is_empty());
        assert!(outcome.upper_bound.is_infinite());
    }

    #[test]
    fn partial_benders_clusters_draws() {
        let inst = toy_instance();
        let config = PresolveConfig {
            partial_benders: true,
            n_medoids: 1,
            ..PresolveConfig::default()
        };
        let outcome = run_presolve(&inst, &config, &MipConfig::default()).unwrap();
        assert_eq!(outcome.medoids().len(), 1);
    }
}
