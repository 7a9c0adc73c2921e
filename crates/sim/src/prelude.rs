//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use allevo_sim::prelude::*;
//!
//! let allele = Allele::parse("ACGT").unwrap();
//! assert_eq!(allele.len(), 4);
//! ```

pub use crate::base::{Allele, Nucleotide};
pub use crate::config::{
    Bottleneck, Digest, FoundingPopulation, MigrationInput, MigrationTopology, MutationModel,
    OutputOptions, Regime, Settings,
};
pub use crate::errors;
pub use crate::executor::Executor;
pub use crate::simulation::{AlleleTable, DemeMatrix, MigrationMatrix, Simulation, TransitionMatrix};
