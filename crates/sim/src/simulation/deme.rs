use rand::Rng;

use super::lookups::MigrationMatrix;
use crate::base::Allele;
use crate::random;

/// Subpopulation state of the migration regime: a D x K matrix of counts
/// over a shared allele ordering.
///
/// Row sums are invariant under [`DemeMatrix::migrate`] — every individual
/// leaving a deme is replaced by an arrival or a stayer drawn from the same
/// generation.
#[derive(Debug, Clone)]
pub struct DemeMatrix {
    identifiers: Vec<Allele>,
    rows: Vec<Vec<u64>>,
    sizes: Vec<u64>,
}

impl DemeMatrix {
    /// Build a deme matrix from explicit rows.
    pub fn new(identifiers: Vec<Allele>, rows: Vec<Vec<u64>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == identifiers.len()));
        let sizes = rows.iter().map(|row| row.iter().sum()).collect();
        Self {
            identifiers,
            rows,
            sizes,
        }
    }

    /// The executor's initial layout: founding allele k fully occupies
    /// deme k, so D = K and size[k] = counts[k].
    pub fn diagonal(identifiers: Vec<Allele>, counts: &[u64]) -> Self {
        let k = identifiers.len();
        debug_assert_eq!(k, counts.len());
        let rows = counts
            .iter()
            .enumerate()
            .map(|(d, &count)| {
                let mut row = vec![0; k];
                row[d] = count;
                row
            })
            .collect();
        Self::new(identifiers, rows)
    }

    /// D, the number of demes.
    pub fn deme_count(&self) -> usize {
        self.rows.len()
    }

    /// K, the number of alleles in the shared ordering.
    pub fn allele_count(&self) -> usize {
        self.identifiers.len()
    }

    pub fn identifiers(&self) -> &[Allele] {
        &self.identifiers
    }

    /// Counts of deme `d`, in allele order.
    pub fn row(&self, d: usize) -> &[u64] {
        &self.rows[d]
    }

    /// Constant size of deme `d`.
    pub fn size(&self, d: usize) -> u64 {
        self.sizes[d]
    }

    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Total population across demes.
    pub fn total(&self) -> u64 {
        self.sizes.iter().sum()
    }

    /// Column sums: the whole-population count of each allele.
    pub fn aggregated_counts(&self) -> Vec<u64> {
        let mut totals = vec![0; self.allele_count()];
        for row in &self.rows {
            for (acc, &count) in totals.iter_mut().zip(row) {
                *acc += count;
            }
        }
        totals
    }

    /// One generation of exchange along the migration graph.
    ///
    /// All outgoing groups and the stay group of a deme are drawn from its
    /// pre-update row; the new matrix is assembled only after every source
    /// has been processed, so simultaneous exchange is well defined.
    pub fn migrate<R: Rng + ?Sized>(&mut self, migration: &MigrationMatrix, rng: &mut R) {
        let d = self.deme_count();
        let k = self.allele_count();
        let mut next: Vec<Vec<u64>> = vec![vec![0; k]; d];

        for source in 0..d {
            let row = &self.rows[source];
            let gone: u64 = (0..d).map(|dest| migration.rate(source, dest)).sum();
            debug_assert!(gone <= self.sizes[source]);

            for dest in 0..d {
                let emigrants = migration.rate(source, dest);
                if emigrants == 0 {
                    continue;
                }
                let outgoing = random::multinomial(rng, row, emigrants);
                for (acc, moved) in next[dest].iter_mut().zip(outgoing) {
                    *acc += moved;
                }
            }

            let staying = random::multinomial(rng, row, self.sizes[source] - gone);
            for (acc, stayed) in next[source].iter_mut().zip(staying) {
                *acc += stayed;
            }
        }

        self.rows = next;

        // row sums are preserved by construction
        for (d, row) in self.rows.iter().enumerate() {
            assert_eq!(row.iter().sum::<u64>(), self.sizes[d]);
        }
    }
}
