use std::process;

use anyhow::Result;
use bbc_cli::{Cli, Commands};
use bbc_core::preprocess::SyntheticParams;
use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::solve::SolveOverrides;

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate {
            seed,
            customers,
            draws,
            facilities,
            price_levels,
            no_competitor,
            out,
        } => {
            let params = SyntheticParams {
                n_customers: customers,
                n_draws: draws,
                n_facilities: facilities,
                n_price_levels: price_levels,
                competitor: !no_competitor,
            };
            commands::generate::handle(seed, params, &out)
        }
        Commands::Inspect { instance, format } => commands::inspect::handle(&instance, format),
        Commands::Evaluate {
            instance,
            open,
            format,
        } => commands::evaluate::handle(&instance, &open, format),
        Commands::Solve {
            instance,
            config,
            threads,
            time_limit,
            lp_solver,
            no_presolve,
            separate_fractional,
            aggregated,
            subset_cuts,
            partial_benders,
            out,
            format,
        } => {
            let flags = SolveOverrides {
                threads,
                time_limit,
                lp_solver,
                no_presolve,
                separate_fractional,
                aggregated,
                subset_cuts,
                partial_benders,
            };
            commands::solve::handle(&instance, config.as_deref(), &flags, out.as_deref(), format)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        process::exit(1);
    }
}
