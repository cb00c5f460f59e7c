use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bbc", author, version, about = "Branch-and-Benders-cut for choice-based facility location and pricing", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned console tables
    #[default]
    Plain,
    /// Pretty-printed JSON on stdout
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a synthetic parking-style instance
    Generate {
        /// Seed of the utility draws
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Number of customer segments
        #[arg(long, default_value_t = 10)]
        customers: usize,
        /// Number of utility draws per customer
        #[arg(long, default_value_t = 10)]
        draws: usize,
        /// Supplier facilities
        #[arg(long, default_value_t = 2)]
        facilities: usize,
        /// Discrete price levels per facility
        #[arg(long, default_value_t = 2)]
        price_levels: usize,
        /// Leave out the competitor facility
        #[arg(long)]
        no_competitor: bool,
        /// Output instance file (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
    },
    /// Summarize an instance file
    Inspect {
        /// Instance file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Evaluate a fixed facility/price selection exactly
    Evaluate {
        /// Instance file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
        /// Expanded alternatives to open on top of the mandatory ones (comma separated)
        #[arg(long, default_value = "")]
        open: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// Solve an instance with branch-and-Benders-cut
    Solve {
        /// Instance file (JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        instance: PathBuf,
        /// Solver configuration (TOML); flags override its values
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Number of search threads ("auto" or a count)
        #[arg(long, default_value = "1")]
        threads: String,
        /// Wall-clock limit of the branch-and-cut search in seconds
        #[arg(long)]
        time_limit: Option<f64>,
        /// LP solver for node relaxations and worker LPs (microlp, clarabel, highs)
        #[arg(long)]
        lp_solver: Option<String>,
        /// Skip presolve entirely
        #[arg(long)]
        no_presolve: bool,
        /// Separate Benders cuts at fractional nodes
        #[arg(long)]
        separate_fractional: bool,
        /// One cut over the aggregate epigraph instead of one per cell
        #[arg(long)]
        aggregated: bool,
        /// Add combinatorial subset cuts at candidates
        #[arg(long)]
        subset_cuts: bool,
        /// Keep the medoid draws explicit in the master
        #[arg(long)]
        partial_benders: bool,
        /// Write the full solution report (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
}
