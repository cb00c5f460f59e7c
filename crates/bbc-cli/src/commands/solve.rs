use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bbc_algo::{branch_and_benders_cut, BendersConfig, LpSolverKind, PresolveConfig};
use bbc_core::load_instance;
use bbc_cli::OutputFormat;
use tracing::info;

use crate::commands::util::configure_threads;

/// Flag overrides applied on top of the configuration file.
#[derive(Debug, Default)]
pub struct SolveOverrides {
    pub threads: String,
    pub time_limit: Option<f64>,
    pub lp_solver: Option<String>,
    pub no_presolve: bool,
    pub separate_fractional: bool,
    pub aggregated: bool,
    pub subset_cuts: bool,
    pub partial_benders: bool,
}

pub fn load_config(path: Option<&Path>) -> Result<BendersConfig> {
    match path {
        None => Ok(BendersConfig::default()),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config '{}'", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config '{}'", path.display()))
        }
    }
}

pub fn apply_overrides(mut config: BendersConfig, flags: &SolveOverrides) -> Result<BendersConfig> {
    config.mip.threads = configure_threads(&flags.threads)?;
    if flags.time_limit.is_some() {
        config.mip.time_limit_secs = flags.time_limit;
    }
    if let Some(name) = &flags.lp_solver {
        config.mip.lp_solver = name.parse::<LpSolverKind>()?;
    }
    if flags.no_presolve {
        config.presolve = PresolveConfig::disabled();
    }
    if flags.partial_benders {
        config.presolve.partial_benders = true;
    }
    config.separate_fractional |= flags.separate_fractional;
    config.subset_cuts |= flags.subset_cuts;
    if flags.aggregated {
        config.disaggregated_cuts = false;
    }
    Ok(config)
}

pub fn handle(
    instance: &Path,
    config_path: Option<&Path>,
    flags: &SolveOverrides,
    out: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let inst = load_instance(instance)?;
    let config = apply_overrides(load_config(config_path)?, flags)?;
    info!(
        threads = config.mip.threads,
        lp_solver = %config.mip.lp_solver,
        presolve = config.presolve.enabled,
        "solving {}",
        instance.display()
    );

    let solution = branch_and_benders_cut(&inst, &config).context("branch-and-Benders-cut failed")?;

    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&solution).context("serializing solution")?;
        fs::write(path, json).with_context(|| format!("writing solution '{}'", path.display()))?;
        info!("solution written to {}", path.display());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&solution)?),
        OutputFormat::Plain => print!("{}", solution.summary()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbc_algo::CutGeneration;
    use std::io::Write as _;

    #[test]
    fn toml_config_keeps_unset_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bbc.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "cut_generation = \"all_generated\"\n\n[presolve]\nn_medoids = 4").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cut_generation, CutGeneration::AllGenerated);
        assert_eq!(config.presolve.n_medoids, 4);
        assert!(config.presolve.enumerate);
    }

    #[test]
    fn flags_override_the_file() {
        let flags = SolveOverrides {
            threads: "1".into(),
            time_limit: Some(5.0),
            lp_solver: Some("clarabel".into()),
            no_presolve: true,
            aggregated: true,
            ..SolveOverrides::default()
        };
        let config = apply_overrides(BendersConfig::default(), &flags).unwrap();
        assert_eq!(config.mip.time_limit_secs, Some(5.0));
        assert!(!config.presolve.enabled);
        assert!(!config.disaggregated_cuts);
        assert_eq!(config.mip.threads, 1);
    }

    #[test]
    fn unknown_lp_solver_is_rejected() {
        let flags = SolveOverrides {
            threads: "1".into(),
            lp_solver: Some("simplex9000".into()),
            ..SolveOverrides::default()
        };
        assert!(apply_overrides(BendersConfig::default(), &flags).is_err());
    }
}
