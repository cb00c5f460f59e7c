//! Generic MIP boundary: model description, LP relaxations and a thread-aware
//! branch-and-cut driver with lazy-constraint and user-cut hooks.

pub mod branch_and_cut;
pub mod callback;
pub mod cut_pool;
pub mod model;
pub mod node;
pub mod relaxation;

use thiserror::Error;

pub use branch_and_cut::{BranchAndCut, MipConfig, MipSolution, MipStats, MipStatus};
pub use cut_pool::{CutPool, Insertion};
pub use callback::{CallbackContext, CallbackError, ContextKind, CutBatch, GenericCallback, NoCallback};
pub use model::{Column, ColumnKind, MipModel, Row, Sense};

#[derive(Debug, Error)]
pub enum MipError {
    #[error("LP relaxation failed: {0}")]
    Lp(String),

    #[error("LP relaxation is unbounded")]
    Unbounded,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("callback failed: {0}")]
    Callback(#[from] CallbackError),
}
