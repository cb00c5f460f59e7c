use bbc_core::preprocess::{build_instance, duplicate_price_alternatives, duplicated_utilities, synthetic_model, SyntheticParams};
use bbc_core::{load_instance, save_instance, RawInstance};
use tempfile::tempdir;

#[test]
fn preprocessing_is_idempotent_under_a_seed() {
    let params = SyntheticParams::default();
    let model = synthetic_model(5, &params).unwrap();

    let first = duplicate_price_alternatives(&model).unwrap();
    let (u_first, _) = duplicated_utilities(&model, &first, params.n_draws, 99).unwrap();
    let second = duplicate_price_alternatives(&model).unwrap();
    let (u_second, _) = duplicated_utilities(&model, &second, params.n_draws, 99).unwrap();

    assert_eq!(first, second);
    assert_eq!(u_first, u_second);
}

#[test]
fn different_seeds_give_different_draws() {
    let params = SyntheticParams::default();
    let model = synthetic_model(5, &params).unwrap();
    let a = build_instance(&model, params.n_draws, 1).unwrap();
    let b = build_instance(&model, params.n_draws, 2).unwrap();
    assert_ne!(a.utilities(), b.utilities());
}

#[test]
fn synthetic_instance_survives_json() {
    let params = SyntheticParams {
        n_customers: 4,
        n_draws: 3,
        ..SyntheticParams::default()
    };
    let instance = bbc_core::preprocess::get_data(21, &params).unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("case.json");
    save_instance(&path, &instance).unwrap();
    let loaded = load_instance(&path).unwrap();
    assert_eq!(RawInstance::from(&loaded), RawInstance::from(&instance));
}
