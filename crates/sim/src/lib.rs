//! # allevo core
//!
//! Forward-in-time population-genetics simulation of allele frequencies.
//! A founding population — a multiset of haploid allele sequences read from
//! FASTA — evolves over discrete generations under one of five regimes:
//! pure drift, drift with per-site mutation, per-allele selection,
//! inter-deme migration on a fixed graph, or a timed population bottleneck.
//! Replicates run in parallel and stream per-generation frequencies into a
//! single generation-ordered result file.
//!
//! Modules:
//! - [`base`]: nucleotides and alleles
//! - [`random`]: sampling primitives, including the conditional-binomial
//!   multinomial the drift kernel is built on
//! - [`config`]: settings parsing, FASTA ingest, and the immutable digest
//! - [`simulation`]: the per-replicate state machine and derived lookups
//! - [`executor`]: parallel replicate execution and the ordered writer

pub mod base;
pub mod config;
pub mod errors;
pub mod executor;
pub mod prelude;
pub mod random;
pub mod simulation;

pub use base::{Allele, Nucleotide};
pub use config::Digest;
pub use executor::Executor;
pub use simulation::Simulation;

use rand::Rng;

/// Draw a master seed from operating-system entropy.
///
/// Used by front ends when no explicit seed is given; recording the drawn
/// value is what makes a run repeatable.
pub fn entropy_seed() -> u64 {
    rand::rng().random()
}
