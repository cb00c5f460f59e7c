use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use bbc_core::load_instance;
use bbc_cli::OutputFormat;
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Debug, Serialize)]
struct InstanceSummary {
    customers: usize,
    draws: usize,
    alternatives: usize,
    expanded: usize,
    opt_out: usize,
    supplier: usize,
    total_population: f64,
    rows: Vec<AlternativeRow>,
}

#[derive(Debug, Serialize)]
struct AlternativeRow {
    index: usize,
    alt: usize,
    class: &'static str,
    price: f64,
    fixed_cost: f64,
    operator: usize,
}

pub fn handle(instance: &Path, format: OutputFormat) -> Result<()> {
    let inst = load_instance(instance)?;
    let rows = (0..inst.n_expanded())
        .map(|i| {
            let e = inst.alternative(i);
            AlternativeRow {
                index: i,
                alt: e.alt,
                class: inst.class(e.alt).as_str(),
                price: e.price,
                fixed_cost: inst.fixed_cost_of(i),
                operator: inst.operator(e.alt),
            }
        })
        .collect();
    let summary = InstanceSummary {
        customers: inst.n_customers(),
        draws: inst.n_draws(),
        alternatives: inst.n_alternatives(),
        expanded: inst.n_expanded(),
        opt_out: inst.n_opt_out(),
        supplier: inst.supplier(),
        total_population: inst.total_population(),
        rows,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            println!(
                "{} customers x {} draws, {} alternatives ({} expanded), supplier {}",
                summary.customers, summary.draws, summary.alternatives, summary.expanded, summary.supplier
            );
            println!("Total population: {:.2}", summary.total_population);
            let mut writer = TabWriter::new(io::stdout()).padding(2);
            writeln!(writer, "INDEX\tALT\tCLASS\tPRICE\tFIXED COST\tOPERATOR")?;
            for row in &summary.rows {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{:.2}\t{:.2}\t{}",
                    row.index, row.alt, row.class, row.price, row.fixed_cost, row.operator
                )?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
