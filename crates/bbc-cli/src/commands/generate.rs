use std::path::Path;

use anyhow::{Context, Result};
use bbc_core::preprocess::{get_data, SyntheticParams};
use bbc_core::save_instance;
use tracing::info;

pub fn handle(seed: u64, params: SyntheticParams, out: &Path) -> Result<()> {
    let instance = get_data(seed, &params).context("generating synthetic instance")?;
    save_instance(out, &instance)?;
    info!(
        customers = instance.n_customers(),
        draws = instance.n_draws(),
        expanded = instance.n_expanded(),
        "wrote instance to {}",
        out.display()
    );
    println!(
        "Instance written to {} ({} customers x {} draws, {} expanded alternatives)",
        out.display(),
        instance.n_customers(),
        instance.n_draws(),
        instance.n_expanded()
    );
    Ok(())
}
