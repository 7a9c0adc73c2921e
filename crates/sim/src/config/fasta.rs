//! FASTA ingest: founder sequences projected onto the marker sites.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::base::{Allele, Nucleotide};
use crate::errors::FastaError;

/// The founding population: unique alleles with their multiplicities.
///
/// The allele ordering is the lexicographically sorted order of the unique
/// projected sequences; it anchors the output columns of every replicate.
#[derive(Debug, Clone)]
pub struct FoundingPopulation {
    /// Number of `>` headers seen, i.e. the population size.
    pub population_size: u64,
    /// Unique founding alleles in sorted order.
    pub alleles: Vec<Allele>,
    /// Multiplicity of each allele, parallel to `alleles`.
    pub counts: Vec<u64>,
}

impl FoundingPopulation {
    /// Read founders from a FASTA file, resolving unknown bases with a
    /// generator seeded from the master seed.
    pub fn from_path_seeded(
        path: impl AsRef<Path>,
        marker_sites: &[usize],
        seed: u64,
    ) -> Result<Self, FastaError> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        Self::from_path(path, marker_sites, &mut rng)
    }

    /// Read founders from a FASTA file on disk.
    pub fn from_path<R: Rng + ?Sized>(
        path: impl AsRef<Path>,
        marker_sites: &[usize],
        rng: &mut R,
    ) -> Result<Self, FastaError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), marker_sites, rng)
    }

    /// Read founders from any line-oriented reader.
    ///
    /// Each `>` header increments the population count; every other
    /// non-empty line contributes one founding allele obtained by reading
    /// the 1-based `marker_sites` positions. Characters outside the
    /// alphabet are resolved to a uniform random base.
    pub fn from_reader<R: Rng + ?Sized>(
        reader: impl BufRead,
        marker_sites: &[usize],
        rng: &mut R,
    ) -> Result<Self, FastaError> {
        let mut population_size = 0u64;
        let mut sequences: Vec<Allele> = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if line.starts_with('>') {
                population_size += 1;
                continue;
            }

            let bytes = line.as_bytes();
            let mut bases = Vec::with_capacity(marker_sites.len());
            for &site in marker_sites {
                let byte = site
                    .checked_sub(1)
                    .and_then(|idx| bytes.get(idx))
                    .copied()
                    .ok_or(FastaError::MarkerOutOfRange {
                        site,
                        len: bytes.len(),
                    })?;
                let base = match Nucleotide::from_ascii(byte) {
                    Some(base) => base,
                    None => Nucleotide::random(rng),
                };
                bases.push(base);
            }

            let allele =
                Allele::from_bases(bases).map_err(|_| FastaError::NoSequences)?;
            sequences.push(allele);
        }

        if sequences.is_empty() {
            return Err(FastaError::NoSequences);
        }

        Ok(Self::tally(population_size, sequences))
    }

    /// Collapse the projected sequences into a sorted unique table with
    /// multiplicities.
    fn tally(population_size: u64, mut sequences: Vec<Allele>) -> Self {
        sequences.sort();

        let mut alleles: Vec<Allele> = Vec::new();
        let mut counts: Vec<u64> = Vec::new();
        for seq in sequences {
            match alleles.last() {
                Some(last) if *last == seq => *counts.last_mut().expect("parallel vecs") += 1,
                _ => {
                    alleles.push(seq);
                    counts.push(1);
                }
            }
        }

        Self {
            population_size,
            alleles,
            counts,
        }
    }
}
