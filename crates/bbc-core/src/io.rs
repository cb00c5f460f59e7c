//! JSON exchange format for instances.
//!
//! The on-disk layout keeps the upstream data-provider key names so that
//! instances produced by external preprocessing can be loaded unchanged.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{BbcError, BbcResult};
use crate::instance::{ChoiceInstance, ExpandedAlternative, InstanceParts, DEFAULT_SUPPLIER};
use crate::tensor::UtilityTensor;

/// Upstream data-provider record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInstance {
    #[serde(rename = "N")]
    pub n: usize,
    #[serde(rename = "R")]
    pub r: usize,
    #[serde(rename = "I_tot")]
    pub i_tot: usize,
    #[serde(rename = "I_tot_exp")]
    pub i_tot_exp: usize,
    #[serde(rename = "I_opt_out")]
    pub i_opt_out: usize,
    #[serde(rename = "I_out_exp")]
    pub i_out_exp: usize,
    /// Utilities `[i][n][r]`
    #[serde(rename = "U")]
    pub u: Vec<Vec<Vec<f64>>>,
    /// Big-M `[i][n][r]`, defaults to `U`
    #[serde(rename = "M", default, skip_serializing_if = "Option::is_none")]
    pub m: Option<Vec<Vec<Vec<f64>>>>,
    pub p: Vec<f64>,
    pub fixed_cost: Vec<f64>,
    pub customer_cost: Vec<f64>,
    #[serde(rename = "popN")]
    pub pop_n: Vec<f64>,
    pub alt: Vec<usize>,
    pub operator: Vec<usize>,
    #[serde(default = "default_supplier")]
    pub supplier: usize,
}

fn default_supplier() -> usize {
    DEFAULT_SUPPLIER
}

impl TryFrom<RawInstance> for ChoiceInstance {
    type Error = BbcError;

    fn try_from(raw: RawInstance) -> BbcResult<Self> {
        if raw.p.len() != raw.i_tot_exp || raw.alt.len() != raw.i_tot_exp {
            return Err(BbcError::Validation(format!(
                "p and alt must have I_tot_exp = {} entries (got {} and {})",
                raw.i_tot_exp,
                raw.p.len(),
                raw.alt.len()
            )));
        }
        if raw.fixed_cost.len() != raw.i_tot {
            return Err(BbcError::Validation(format!(
                "fixed_cost must have I_tot = {} entries, got {}",
                raw.i_tot,
                raw.fixed_cost.len()
            )));
        }

        let utilities = UtilityTensor::from_nested(&raw.u)?;
        let big_m = match &raw.m {
            Some(m) => UtilityTensor::from_nested(m)?,
            None => utilities.clone(),
        };

        let alternatives = raw
            .alt
            .iter()
            .zip(&raw.p)
            .map(|(&alt, &price)| ExpandedAlternative { alt, price })
            .collect();

        let instance = ChoiceInstance::new(InstanceParts {
            n_customers: raw.n,
            n_draws: raw.r,
            n_opt_out: raw.i_opt_out,
            supplier: raw.supplier,
            alternatives,
            fixed_cost: raw.fixed_cost,
            customer_cost: raw.customer_cost,
            operator: raw.operator,
            population: raw.pop_n,
            utilities,
            big_m,
        })?;

        if instance.n_out_expanded() != raw.i_out_exp {
            return Err(BbcError::Validation(format!(
                "I_out_exp is {} but the first {} expanded alternatives are opt-outs",
                raw.i_out_exp,
                instance.n_out_expanded()
            )));
        }
        Ok(instance)
    }
}

impl From<&ChoiceInstance> for RawInstance {
    fn from(inst: &ChoiceInstance) -> Self {
        let m = if inst.big_m_tensor() == inst.utilities() {
            None
        } else {
            Some(inst.big_m_tensor().to_nested())
        };
        let n_alt = inst.n_alternatives();
        Self {
            n: inst.n_customers(),
            r: inst.n_draws(),
            i_tot: n_alt,
            i_tot_exp: inst.n_expanded(),
            i_opt_out: inst.n_opt_out(),
            i_out_exp: inst.n_out_expanded(),
            u: inst.utilities().to_nested(),
            m,
            p: inst.alternatives().iter().map(|e| e.price).collect(),
            fixed_cost: (0..n_alt).map(|a| inst.fixed_cost(a)).collect(),
            customer_cost: (0..n_alt).map(|a| inst.customer_cost(a)).collect(),
            pop_n: (0..inst.n_customers()).map(|n| inst.population(n)).collect(),
            alt: inst.alternatives().iter().map(|e| e.alt).collect(),
            operator: (0..n_alt).map(|a| inst.operator(a)).collect(),
            supplier: inst.supplier(),
        }
    }
}

/// Load and validate an instance from a JSON file.
pub fn load_instance(path: &Path) -> Result<ChoiceInstance> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening instance '{}'", path.display()))?;
    let raw: RawInstance = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing instance '{}'", path.display()))?;
    ChoiceInstance::try_from(raw)
        .with_context(|| format!("validating instance '{}'", path.display()))
}

/// Write an instance as JSON, creating parent directories as needed.
pub fn save_instance(path: &Path, instance: &ChoiceInstance) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory '{}'", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(&RawInstance::from(instance))
        .context("serializing instance to JSON")?;
    fs::write(path, json).with_context(|| format!("writing instance '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::toy_instance;
    use tempfile::tempdir;

    #[test]
    fn instance_writes_and_reads_back() {
        let inst = toy_instance();
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("toy.json");
        save_instance(&path, &inst).unwrap();
        let loaded = load_instance(&path).unwrap();
        assert_eq!(RawInstance::from(&loaded), RawInstance::from(&inst));
    }

    #[test]
    fn upstream_keys_are_preserved() {
        let json = serde_json::to_value(RawInstance::from(&toy_instance())).unwrap();
        for key in ["N", "R", "I_tot", "I_tot_exp", "I_opt_out", "I_out_exp", "U", "popN"] {
            assert!(json.get(key).is_some(), "missing key {}", key);
        }
        // M equals U and is omitted
        assert!(json.get("M").is_none());
    }

    #[test]
    fn missing_supplier_defaults() {
        let mut json = serde_json::to_value(RawInstance::from(&toy_instance())).unwrap();
        json.as_object_mut().unwrap().remove("supplier");
        let raw: RawInstance = serde_json::from_value(json).unwrap();
        assert_eq!(raw.supplier, DEFAULT_SUPPLIER);
    }

    #[test]
    fn wrong_opt_out_count_rejected() {
        let mut raw = RawInstance::from(&toy_instance());
        raw.i_out_exp = 2;
        let err = ChoiceInstance::try_from(raw).unwrap_err();
        assert!(matches!(err, BbcError::Validation(_)));
    }

    #[test]
    fn mismatched_price_vector_rejected() {
        let mut raw = RawInstance::from(&toy_instance());
        raw.p.pop();
        assert!(ChoiceInstance::try_from(raw).is_err());
    }
}
