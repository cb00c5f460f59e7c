use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};
use bbc_algo::benders::evaluate::evaluate_selection;
use bbc_core::load_instance;
use bbc_cli::OutputFormat;
use serde::Serialize;
use tabwriter::TabWriter;

use crate::commands::util::parse_indices;

#[derive(Debug, Serialize)]
struct EvaluationOutput {
    profit: f64,
    revenue: f64,
    fixed_cost: f64,
    open: Vec<usize>,
    demand: Vec<f64>,
}

pub fn handle(instance: &Path, open: &str, format: OutputFormat) -> Result<()> {
    let inst = load_instance(instance)?;
    let mut selection = inst.base_selection();
    for i in parse_indices(open)? {
        if i >= inst.n_expanded() {
            bail!("alternative {} out of range (instance has {})", i, inst.n_expanded());
        }
        selection[i] = true;
    }
    if !inst.is_feasible_selection(&selection) {
        bail!("selection opens more than one price level of the same facility");
    }

    let eval = evaluate_selection(&inst, &selection);
    let output = EvaluationOutput {
        profit: eval.profit(),
        revenue: eval.revenue,
        fixed_cost: eval.fixed_cost,
        open: (0..selection.len()).filter(|&i| selection[i]).collect(),
        demand: eval.demand.clone(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Plain => {
            println!("Profit: {:.4}", output.profit);
            println!("  Revenue: {:.4}", output.revenue);
            println!("  Fixed cost: {:.4}", output.fixed_cost);
            let mut writer = TabWriter::new(io::stdout()).padding(2);
            writeln!(writer, "INDEX\tALT\tCLASS\tPRICE\tDEMAND")?;
            for &i in &output.open {
                let e = inst.alternative(i);
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{:.2}\t{:.4}",
                    i,
                    e.alt,
                    inst.class(e.alt).as_str(),
                    e.price,
                    output.demand[i]
                )?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
