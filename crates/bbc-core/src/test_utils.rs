//! Small hand-checked instances shared by unit and integration tests.

use crate::instance::{ChoiceInstance, ExpandedAlternative, InstanceParts, DEFAULT_SUPPLIER};
use crate::tensor::UtilityTensor;

/// Two customers, two draws, one opt-out and two supplier facilities.
///
/// | open       | profit |
/// |------------|--------|
/// | opt-out    | 0      |
/// | + A        | 20     |
/// | + B        | 25     |
/// | + A + B    | 35     |
///
/// A is priced at 2 with no fixed cost, B at 3 with fixed cost 5. Every cell
/// weighs `10 / 2 = 5`.
pub fn toy_instance() -> ChoiceInstance {
    let utilities = UtilityTensor::from_nested(&[
        vec![vec![1.0, 1.0], vec![2.0, 2.0]],
        vec![vec![2.0, 3.0], vec![1.5, 1.0]],
        vec![vec![3.0, 0.5], vec![2.5, 1.5]],
    ])
    .expect("toy utilities are rectangular");
    ChoiceInstance::new(InstanceParts {
        n_customers: 2,
        n_draws: 2,
        n_opt_out: 1,
        supplier: DEFAULT_SUPPLIER,
        alternatives: vec![
            ExpandedAlternative { alt: 0, price: 0.0 },
            ExpandedAlternative { alt: 1, price: 2.0 },
            ExpandedAlternative { alt: 2, price: 3.0 },
        ],
        fixed_cost: vec![0.0, 0.0, 5.0],
        customer_cost: vec![0.0, 0.0, 0.0],
        operator: vec![0, DEFAULT_SUPPLIER, DEFAULT_SUPPLIER],
        population: vec![10.0, 10.0],
        big_m: utilities.clone(),
        utilities,
    })
    .expect("toy instance is valid")
}

/// Profit of every selection of the toy instance, indexed by `(A open, B open)`.
pub const TOY_PROFITS: [((bool, bool), f64); 4] = [
    ((false, false), 0.0),
    ((true, false), 20.0),
    ((false, true), 25.0),
    ((true, true), 35.0),
];
