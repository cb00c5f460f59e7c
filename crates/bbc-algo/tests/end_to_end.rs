//! End-to-end Branch-and-Benders-cut runs checked against brute force.

use bbc_algo::benders::evaluate::selection_cost;
use bbc_algo::{branch_and_benders_cut, BendersConfig, CutGeneration, LpSolverKind, MipStatus, PresolveConfig};
use bbc_core::preprocess::{get_data, SyntheticParams};
use bbc_core::test_utils::{toy_instance, TOY_PROFITS};
use bbc_core::{AlternativeClass, ChoiceInstance};

/// Every feasible selection of `inst`.
fn all_selections(inst: &ChoiceInstance) -> Vec<Vec<bool>> {
    let mut selections = vec![vec![false; inst.n_expanded()]];
    for a in 0..inst.n_alternatives() {
        let levels = inst.price_levels(a);
        let mut next = Vec::new();
        for open in &selections {
            if inst.class(a) == AlternativeClass::Endogenous {
                next.push(open.clone());
            }
            for &i in levels {
                let mut with_level = open.clone();
                with_level[i] = true;
                next.push(with_level);
            }
        }
        selections = next;
    }
    selections
}

fn brute_force_profit(inst: &ChoiceInstance) -> f64 {
    all_selections(inst)
        .iter()
        .map(|open| -selection_cost(inst, open))
        .fold(f64::NEG_INFINITY, f64::max)
}

fn small_synthetic(seed: u64) -> ChoiceInstance {
    synthetic(seed, 4, 3, 2, 2)
}

fn synthetic(seed: u64, customers: usize, draws: usize, facilities: usize, levels: usize) -> ChoiceInstance {
    let params = SyntheticParams {
        n_customers: customers,
        n_draws: draws,
        n_facilities: facilities,
        n_price_levels: levels,
        competitor: true,
    };
    get_data(seed, &params).unwrap()
}

/// 5 customers x 3 draws with three facilities at two levels, and two at three.
fn wider_instances() -> Vec<ChoiceInstance> {
    let mut instances = Vec::new();
    for seed in [11, 12, 13] {
        instances.push(synthetic(seed, 5, 3, 3, 2));
        instances.push(synthetic(seed, 5, 3, 2, 3));
    }
    instances
}

fn assert_optimal(inst: &ChoiceInstance, config: &BendersConfig) {
    let expected = brute_force_profit(inst);
    let solution = branch_and_benders_cut(inst, config).unwrap();
    assert_eq!(solution.status, MipStatus::Optimal);
    assert!(
        (solution.profit - expected).abs() < 1e-4,
        "profit {} vs brute force {}",
        solution.profit,
        expected
    );
    assert!(inst.is_feasible_selection(&solution.selection));
}

#[test]
fn toy_instance_reaches_brute_force_optimum() {
    let inst = toy_instance();
    let best = TOY_PROFITS.iter().map(|(_, p)| *p).fold(f64::NEG_INFINITY, f64::max);
    let solution = branch_and_benders_cut(&inst, &BendersConfig::default()).unwrap();
    assert_eq!(solution.status, MipStatus::Optimal);
    assert!((solution.profit - best).abs() < 1e-6);
    assert_eq!(solution.endogenous_open().count(), 2);
}

#[test]
fn brute_force_enumerates_toy() {
    assert_eq!(all_selections(&toy_instance()).len(), 4);
}

#[test]
fn synthetic_default_config() {
    for seed in [1, 2] {
        assert_optimal(&small_synthetic(seed), &BendersConfig::default());
    }
}

#[test]
fn synthetic_without_presolve_on_two_threads() {
    let mut config = BendersConfig {
        presolve: PresolveConfig::disabled(),
        ..BendersConfig::default()
    };
    config.mip.threads = 2;
    assert_optimal(&small_synthetic(3), &config);
}

#[test]
fn synthetic_with_fractional_separation() {
    let config = BendersConfig {
        separate_fractional: true,
        presolve: PresolveConfig::disabled(),
        ..BendersConfig::default()
    };
    assert_optimal(&small_synthetic(4), &config);
}

#[test]
fn synthetic_with_partial_benders() {
    let config = BendersConfig {
        presolve: PresolveConfig {
            partial_benders: true,
            clustering: true,
            n_medoids: 1,
            medoid_cuts_only: true,
            ..PresolveConfig::default()
        },
        ..BendersConfig::default()
    };
    let inst = small_synthetic(5);
    assert_optimal(&inst, &config);
    let solution = branch_and_benders_cut(&inst, &config).unwrap();
    assert_eq!(solution.medoids.len(), 1);
}

#[test]
fn synthetic_with_aggregated_cuts() {
    let config = BendersConfig {
        disaggregated_cuts: false,
        cut_generation: CutGeneration::AllGenerated,
        presolve: PresolveConfig::disabled(),
        ..BendersConfig::default()
    };
    assert_optimal(&small_synthetic(6), &config);
}

#[test]
fn single_customer_presolve_seeds_the_pool() {
    let config = BendersConfig {
        presolve: PresolveConfig {
            single_customers: true,
            single_scenarios: true,
            enumerate: false,
            ..PresolveConfig::default()
        },
        ..BendersConfig::default()
    };
    assert_optimal(&small_synthetic(7), &config);
}

#[test]
fn subset_cuts_return_a_feasible_selection() {
    let inst = small_synthetic(8);
    let config = BendersConfig {
        subset_cuts: true,
        subset_widen: true,
        ..BendersConfig::default()
    };
    let solution = branch_and_benders_cut(&inst, &config).unwrap();
    assert!(inst.is_feasible_selection(&solution.selection));
    assert!(solution.profit <= brute_force_profit(&inst) + 1e-6);
    assert!((solution.profit + selection_cost(&inst, &solution.selection)).abs() < 1e-9);
}

#[test]
fn zero_time_limit_reports_the_warm_start() {
    let inst = small_synthetic(9);
    let mut config = BendersConfig::default();
    config.mip.time_limit_secs = Some(0.0);
    let solution = branch_and_benders_cut(&inst, &config).unwrap();
    assert_eq!(solution.status, MipStatus::TimeLimit);
    assert!(solution.mip.accepted_starts >= 1);
    assert!(inst.is_feasible_selection(&solution.selection));
}

#[test]
fn wider_instances_default_config() {
    for inst in wider_instances() {
        assert_optimal(&inst, &BendersConfig::default());
    }
}

#[test]
fn wider_instances_without_presolve_on_two_threads() {
    let mut config = BendersConfig {
        presolve: PresolveConfig::disabled(),
        ..BendersConfig::default()
    };
    config.mip.threads = 2;
    for inst in wider_instances() {
        assert_optimal(&inst, &config);
    }
}

#[test]
fn wider_instances_with_fractional_separation() {
    let config = BendersConfig {
        separate_fractional: true,
        presolve: PresolveConfig::disabled(),
        ..BendersConfig::default()
    };
    for inst in wider_instances() {
        assert_optimal(&inst, &config);
    }
}

#[test]
fn wider_instances_with_aggregated_cuts() {
    let config = BendersConfig {
        disaggregated_cuts: false,
        cut_generation: CutGeneration::AllGenerated,
        presolve: PresolveConfig::disabled(),
        ..BendersConfig::default()
    };
    for inst in wider_instances() {
        assert_optimal(&inst, &config);
    }
}

#[test]
fn every_lp_backend_reaches_the_optimum() {
    let inst = synthetic(14, 5, 3, 3, 2);
    for name in LpSolverKind::available() {
        let mut config = BendersConfig::default();
        config.mip.lp_solver = name.parse().unwrap();
        assert_optimal(&inst, &config);
    }
}
