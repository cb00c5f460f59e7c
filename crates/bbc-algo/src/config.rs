//! Solver configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a TOML file only
//! needs the keys it changes.

use serde::{Deserialize, Serialize};

use crate::mip::MipConfig;

/// Which separated cuts are added at a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutGeneration {
    /// Only cuts violated by the candidate
    #[default]
    ViolatedOnly,
    /// Every separated cut, violated or not
    AllGenerated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BendersConfig {
    pub mip: MipConfig,
    /// Slack below which a cell's estimate counts as exact
    pub eps_slack: f64,
    pub cut_generation: CutGeneration,
    /// Separate Benders cuts at fractional nodes as user cuts
    pub separate_fractional: bool,
    /// One cut per cell instead of one cut over the aggregate epigraph
    pub disaggregated_cuts: bool,
    pub subset_cuts: bool,
    pub subset_max_depth: usize,
    /// Widen subset cuts with sibling price levels that are also dominated
    pub subset_widen: bool,
    pub presolve: PresolveConfig,
}

impl Default for BendersConfig {
    fn default() -> Self {
        Self {
            mip: MipConfig::default(),
            eps_slack: 1e-4,
            cut_generation: CutGeneration::default(),
            separate_fractional: false,
            disaggregated_cuts: true,
            subset_cuts: false,
            subset_max_depth: 4,
            subset_widen: false,
            presolve: PresolveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresolveConfig {
    pub enabled: bool,
    /// Enumerate every selection of up to `enumeration_size` facilities
    pub enumerate: bool,
    pub enumeration_size: usize,
    /// Upper limit on enumerated selections
    pub enumeration_limit: usize,
    pub incompatibility_cuts: bool,
    pub single_customers: bool,
    pub single_scenarios: bool,
    pub single_time_limit_secs: Option<f64>,
    /// Every endogenous alternative is open in at least this many pool solutions
    pub min_solutions_with_i: usize,
    /// Share of the best pool solutions turned into cuts at the first candidate
    pub presolve_cut_fraction: f64,
    pub clustering: bool,
    pub n_medoids: usize,
    /// Only separate presolve cuts for medoid draws
    pub medoid_cuts_only: bool,
    /// Keep the medoid draws' choice variables in the master
    pub partial_benders: bool,
    pub warm_start: bool,
    pub max_warm_starts: usize,
}

impl Default for PresolveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enumerate: true,
            enumeration_size: 2,
            enumeration_limit: 2000,
            incompatibility_cuts: true,
            single_customers: false,
            single_scenarios: false,
            single_time_limit_secs: Some(10.0),
            min_solutions_with_i: 1,
            presolve_cut_fraction: 0.1,
            clustering: false,
            n_medoids: 2,
            medoid_cuts_only: false,
            partial_benders: false,
            warm_start: true,
            max_warm_starts: 5,
        }
    }
}

impl PresolveConfig {
    /// Presolve switched off entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: BendersConfig =
            serde_json::from_str(r#"{"eps_slack": 0.01, "presolve": {"clustering": true}}"#).unwrap();
        assert_eq!(cfg.eps_slack, 0.01);
        assert!(cfg.presolve.clustering);
        assert!(cfg.presolve.enumerate);
        assert!(cfg.disaggregated_cuts);
        assert_eq!(cfg.mip.threads, 1);
    }

    #[test]
    fn cut_generation_names() {
        let json = serde_json::to_string(&CutGeneration::AllGenerated).unwrap();
        assert_eq!(json, "\"all_generated\"");
    }
}
