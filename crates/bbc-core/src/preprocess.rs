//! Preprocessing from a raw choice model to a solver-ready instance.
//!
//! The pipeline is deliberately small: every original alternative is copied
//! once per discrete price level, then a random-utility draw is generated per
//! (alternative, customer, draw). The error term is shared by all price copies
//! of one original alternative so that copies differ only by the price term.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{BbcError, BbcResult};
use crate::instance::{ChoiceInstance, ExpandedAlternative, InstanceParts, DEFAULT_SUPPLIER};
use crate::tensor::UtilityTensor;

/// An original alternative before price-level expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAlternative {
    pub name: String,
    /// Alternative-specific constant
    pub asc: f64,
    /// Discrete price levels, at least one
    pub prices: Vec<f64>,
    pub fixed_cost: f64,
    pub customer_cost: f64,
    pub operator: usize,
}

/// A customer segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub population: f64,
    /// Marginal utility of price, normally negative
    pub price_sensitivity: f64,
    /// Scale of the Gumbel error term
    #[serde(default = "default_scale")]
    pub error_scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

/// Logit model with discrete prices, before expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChoiceModel {
    /// Opt-out alternatives must come first
    pub alternatives: Vec<RawAlternative>,
    pub n_opt_out: usize,
    pub segments: Vec<Segment>,
    #[serde(default = "default_supplier")]
    pub supplier: usize,
}

fn default_supplier() -> usize {
    DEFAULT_SUPPLIER
}

/// Copy every original alternative once per price level.
///
/// The output preserves original alternative order, so opt-out copies come first.
pub fn duplicate_price_alternatives(model: &RawChoiceModel) -> BbcResult<Vec<ExpandedAlternative>> {
    let mut expanded = Vec::new();
    for (a, alternative) in model.alternatives.iter().enumerate() {
        if alternative.prices.is_empty() {
            return Err(BbcError::Validation(format!(
                "alternative '{}' has no price level",
                alternative.name
            )));
        }
        expanded.extend(
            alternative
                .prices
                .iter()
                .map(|&price| ExpandedAlternative { alt: a, price }),
        );
    }
    Ok(expanded)
}

/// Draw utilities for every expanded alternative.
///
/// Returns `(U, M)` with `M = U`. Utilities are shifted so that the smallest
/// one equals 1 whenever any draw is non-positive; a common shift leaves every
/// customer's ranking of open alternatives unchanged.
pub fn duplicated_utilities(
    model: &RawChoiceModel,
    expanded: &[ExpandedAlternative],
    n_draws: usize,
    seed: u64,
) -> BbcResult<(UtilityTensor, UtilityTensor)> {
    let n_alt = model.alternatives.len();
    let n_customers = model.segments.len();
    if n_draws == 0 || n_customers == 0 {
        return Err(BbcError::Validation(
            "utility draws need at least one customer and one draw".into(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    // epsilon[a][n][r], one draw per original alternative
    let mut epsilon = vec![0.0; n_alt * n_customers * n_draws];
    for a in 0..n_alt {
        for (n, segment) in model.segments.iter().enumerate() {
            for r in 0..n_draws {
                epsilon[(a * n_customers + n) * n_draws + r] = segment.error_scale * gumbel(&mut rng);
            }
        }
    }

    let mut utilities = UtilityTensor::zeros(expanded.len(), n_customers, n_draws);
    for (i, e) in expanded.iter().enumerate() {
        let alternative = model.alternatives.get(e.alt).ok_or_else(|| {
            BbcError::Validation(format!("expanded alternative {} has unknown origin {}", i, e.alt))
        })?;
        for (n, segment) in model.segments.iter().enumerate() {
            let deterministic = alternative.asc + segment.price_sensitivity * e.price;
            for r in 0..n_draws {
                let value = deterministic + epsilon[(e.alt * n_customers + n) * n_draws + r];
                utilities.set(i, n, r, value);
            }
        }
    }

    let min = utilities.min_value();
    if min <= 0.0 {
        let shift = 1.0 - min;
        utilities.map_in_place(|u| u + shift);
    }
    let big_m = utilities.clone();
    Ok((utilities, big_m))
}

fn gumbel(rng: &mut StdRng) -> f64 {
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    -(-u.ln()).ln()
}

/// Expand prices, draw utilities and validate the result.
pub fn build_instance(model: &RawChoiceModel, n_draws: usize, seed: u64) -> BbcResult<ChoiceInstance> {
    let expanded = duplicate_price_alternatives(model)?;
    let (utilities, big_m) = duplicated_utilities(model, &expanded, n_draws, seed)?;
    ChoiceInstance::new(InstanceParts {
        n_customers: model.segments.len(),
        n_draws,
        n_opt_out: model.n_opt_out,
        supplier: model.supplier,
        alternatives: expanded,
        fixed_cost: model.alternatives.iter().map(|a| a.fixed_cost).collect(),
        customer_cost: model.alternatives.iter().map(|a| a.customer_cost).collect(),
        operator: model.alternatives.iter().map(|a| a.operator).collect(),
        population: model.segments.iter().map(|s| s.population).collect(),
        utilities,
        big_m,
    })
}

/// Shape of a synthetic parking-style case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    pub n_customers: usize,
    pub n_draws: usize,
    /// Supplier-operated facilities
    pub n_facilities: usize,
    /// Price levels per facility
    pub n_price_levels: usize,
    /// Add an always-available facility run by a competitor
    pub competitor: bool,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            n_customers: 10,
            n_draws: 10,
            n_facilities: 2,
            n_price_levels: 2,
            competitor: true,
        }
    }
}

/// Raw model of a parking-style case: an opt-out, an optional competitor
/// lot and `n_facilities` supplier lots with increasing price levels.
pub fn synthetic_model(seed: u64, params: &SyntheticParams) -> BbcResult<RawChoiceModel> {
    if params.n_facilities == 0 || params.n_price_levels == 0 {
        return Err(BbcError::Config(
            "synthetic case needs at least one facility and one price level".into(),
        ));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let competitor_operator = DEFAULT_SUPPLIER + 1;

    let mut alternatives = vec![RawAlternative {
        name: "opt-out".into(),
        asc: 0.0,
        prices: vec![0.0],
        fixed_cost: 0.0,
        customer_cost: 0.0,
        operator: 0,
    }];
    if params.competitor {
        alternatives.push(RawAlternative {
            name: "competitor".into(),
            asc: rng.gen_range(-0.5..0.5),
            prices: vec![rng.gen_range(0.5..1.5)],
            fixed_cost: 0.0,
            customer_cost: 0.0,
            operator: competitor_operator,
        });
    }
    for k in 0..params.n_facilities {
        let base = rng.gen_range(0.4..0.8);
        let step = rng.gen_range(0.2..0.5);
        alternatives.push(RawAlternative {
            name: format!("lot-{}", k + 1),
            asc: rng.gen_range(0.0..1.5),
            prices: (0..params.n_price_levels)
                .map(|l| base + step * l as f64)
                .collect(),
            fixed_cost: rng.gen_range(0.0..2.0) * params.n_customers as f64,
            customer_cost: rng.gen_range(0.0..0.3),
            operator: DEFAULT_SUPPLIER,
        });
    }

    let segments = (0..params.n_customers)
        .map(|_| Segment {
            population: rng.gen_range(5.0..15.0),
            price_sensitivity: -rng.gen_range(0.5..2.5),
            error_scale: 1.0,
        })
        .collect();

    Ok(RawChoiceModel {
        alternatives,
        n_opt_out: 1,
        segments,
        supplier: DEFAULT_SUPPLIER,
    })
}

/// Deterministic synthetic instance for `seed`.
pub fn get_data(seed: u64, params: &SyntheticParams) -> BbcResult<ChoiceInstance> {
    let model = synthetic_model(seed, params)?;
    build_instance(&model, params.n_draws, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::AlternativeClass;

    fn two_level_model() -> RawChoiceModel {
        RawChoiceModel {
            alternatives: vec![
                RawAlternative {
                    name: "out".into(),
                    asc: 0.0,
                    prices: vec![0.0],
                    fixed_cost: 0.0,
                    customer_cost: 0.0,
                    operator: 0,
                },
                RawAlternative {
                    name: "lot".into(),
                    asc: 1.0,
                    prices: vec![1.0, 2.0],
                    fixed_cost: 3.0,
                    customer_cost: 0.5,
                    operator: DEFAULT_SUPPLIER,
                },
            ],
            n_opt_out: 1,
            segments: vec![
                Segment {
                    population: 4.0,
                    price_sensitivity: -1.0,
                    error_scale: 1.0,
                },
                Segment {
                    population: 6.0,
                    price_sensitivity: -0.5,
                    error_scale: 1.0,
                },
            ],
            supplier: DEFAULT_SUPPLIER,
        }
    }

    #[test]
    fn test_duplicate_price_alternatives() {
        let expanded = duplicate_price_alternatives(&two_level_model()).unwrap();
        let alts: Vec<usize> = expanded.iter().map(|e| e.alt).collect();
        assert_eq!(alts, vec![0, 1, 1]);
        assert_eq!(expanded[2].price, 2.0);
    }

    #[test]
    fn test_empty_price_list_rejected() {
        let mut model = two_level_model();
        model.alternatives[1].prices.clear();
        assert!(duplicate_price_alternatives(&model).is_err());
    }

    #[test]
    fn test_price_copies_share_error_term() {
        let model = two_level_model();
        let expanded = duplicate_price_alternatives(&model).unwrap();
        let (u, m) = duplicated_utilities(&model, &expanded, 3, 7).unwrap();
        assert_eq!(u, m);
        assert!(u.min_value() > 0.0);
        for (n, segment) in model.segments.iter().enumerate() {
            for r in 0..3 {
                // copies differ only by beta * (p2 - p1)
                let diff = u.get(2, n, r) - u.get(1, n, r);
                assert!((diff - segment.price_sensitivity).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_synthetic_instance_classes() {
        let params = SyntheticParams {
            n_customers: 3,
            n_draws: 2,
            n_facilities: 2,
            n_price_levels: 2,
            competitor: true,
        };
        let inst = get_data(11, &params).unwrap();
        assert_eq!(inst.n_alternatives(), 4);
        assert_eq!(inst.n_expanded(), 1 + 1 + 2 * 2);
        assert_eq!(inst.class(1), AlternativeClass::Competitor);
        assert_eq!(inst.endogenous().len(), 4);
        assert_eq!(inst.always_open().len(), 2);
    }

    #[test]
    fn test_synthetic_rejects_empty_shape() {
        let params = SyntheticParams {
            n_facilities: 0,
            ..SyntheticParams::default()
        };
        assert!(matches!(get_data(1, &params), Err(BbcError::Config(_))));
    }
}
