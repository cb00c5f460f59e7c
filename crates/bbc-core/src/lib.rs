//! # bbc-core: choice-based facility location and pricing instances
//!
//! Data side of the branch-and-Benders-cut engine. A [`ChoiceInstance`] holds
//! the expanded alternatives (one per facility and price level), the utility
//! tensor `U[i,n,r]` with its Big-M companion, population weights and costs.
//! It is validated once and read concurrently by every solver thread.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bbc_core::preprocess::{get_data, SyntheticParams};
//!
//! let instance = get_data(42, &SyntheticParams::default()).unwrap();
//! println!(
//!     "{} customers x {} draws, {} expanded alternatives",
//!     instance.n_customers(),
//!     instance.n_draws(),
//!     instance.n_expanded()
//! );
//! ```

pub mod error;
pub mod instance;
pub mod io;
pub mod preprocess;
pub mod tensor;
pub mod test_utils;

pub use error::{BbcError, BbcResult};
pub use instance::{AlternativeClass, ChoiceInstance, ExpandedAlternative, InstanceParts, DEFAULT_SUPPLIER};
pub use io::{load_instance, save_instance, RawInstance};
pub use tensor::UtilityTensor;
