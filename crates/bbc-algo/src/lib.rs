//! # bbc-algo: Branch-and-Benders-cut for choice-based facility location and pricing
//!
//! A supplier decides which facilities to open and at which discrete price
//! level; customers then pick the open alternative with the highest utility
//! in every simulated draw. This crate solves the resulting bilevel program
//! by Benders decomposition inside a branch-and-cut search.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`mip`] | Generic MIP boundary: model, LP relaxations, thread-aware branch-and-cut with lazy-constraint and user-cut hooks |
//! | [`benders`] | Worker LPs, optimality cuts, master builder, separation callback, subset cuts, solution report |
//! | [`presolve`] | Solution pool, enumeration, incompatibility cuts, single customer/scenario MIPs, k-medoids clustering |
//! | [`config`] | Serde-backed solver configuration |
//! | [`lp`] | LP backend selection over `good_lp` |
//!
//! ## Example
//!
//! ```ignore
//! use bbc_algo::{branch_and_benders_cut, BendersConfig};
//! use bbc_core::preprocess::{get_data, SyntheticParams};
//!
//! let instance = get_data(7, &SyntheticParams::default())?;
//! let solution = branch_and_benders_cut(&instance, &BendersConfig::default())?;
//! println!("{}", solution.summary());
//! ```

pub mod benders;
pub mod config;
pub mod lp;
pub mod mip;
pub mod presolve;

pub use benders::{branch_and_benders_cut, BendersError, BendersSolution};
pub use config::{BendersConfig, CutGeneration, PresolveConfig};
pub use lp::LpSolverKind;
pub use mip::{BranchAndCut, MipConfig, MipError, MipStatus};
pub use presolve::{run_presolve, PresolveOutcome};
