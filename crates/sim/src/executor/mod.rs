//! The replicate executor: lookup derivation, parallel fan-out, ordered
//! fan-in.
//!
//! One worker task per replicate. Every worker buffers its full run — the
//! initial frequencies, one row per generation, and the identifier header —
//! before submitting anything, because under the mutation regime earlier
//! rows must be re-padded once the final column count is known.

mod sink;
mod writer;

pub use sink::ResultSink;
pub use writer::OrderedWriter;

use std::io::Write;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::config::{Digest, Regime};
use crate::errors::ExecutorError;
use crate::simulation::{
    AlleleTable, DemeMatrix, MigrationMatrix, Simulation, TransitionMatrix,
};

/// Runs the whole experiment described by a digest.
///
/// Construction derives the per-regime lookup tables and the per-worker
/// seeds; [`execute`](Executor::execute) then fans the replicates out over
/// rayon and joins them into a single ordered result stream.
#[derive(Debug)]
pub struct Executor {
    digest: Digest,
    transition: Option<Arc<TransitionMatrix>>,
    migration: Option<Arc<MigrationMatrix>>,
    initial_demes: Option<DemeMatrix>,
    worker_seeds: Vec<u64>,
}

impl Executor {
    /// Derive lookups and worker seeds from a validated digest.
    ///
    /// Worker seeds are drawn up front from a master generator seeded with
    /// the digest seed, so reproducibility is independent of thread
    /// scheduling.
    pub fn new(digest: Digest) -> Self {
        let mut master = Xoshiro256PlusPlus::seed_from_u64(digest.seed());

        let mut transition = None;
        let mut migration = None;
        let mut initial_demes = None;
        match digest.regime() {
            Regime::Mutation => {
                transition = Some(Arc::new(TransitionMatrix::from_model(
                    digest.mutation_model(),
                )));
            }
            Regime::Migration => {
                let demes = DemeMatrix::diagonal(
                    digest.initial_alleles().to_vec(),
                    digest.initial_counts(),
                );
                migration = Some(Arc::new(MigrationMatrix::derive(
                    digest.migration_topology(),
                    digest.migration_input(),
                    demes.sizes(),
                    &mut master,
                )));
                initial_demes = Some(demes);
            }
            Regime::Drift | Regime::Selection | Regime::Bottleneck => {}
        }

        let worker_seeds = (0..digest.replicates()).map(|_| master.random()).collect();

        Self {
            digest,
            transition,
            migration,
            initial_demes,
            worker_seeds,
        }
    }

    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// The derived migration-rate matrix, in the migration regime.
    pub fn migration_matrix(&self) -> Option<&MigrationMatrix> {
        self.migration.as_deref()
    }

    /// Run every replicate and stream the combined rows into `out`.
    ///
    /// Synchronous from the caller's view: returns once all workers have
    /// joined and the sink is flushed. Any worker failure aborts the run.
    pub fn execute<W: Write + Send>(&self, out: W) -> Result<W, ExecutorError> {
        let sink = ResultSink::new(out, self.digest.generations());
        let writer = OrderedWriter::new(sink, self.digest.replicates());

        (0..self.digest.replicates())
            .into_par_iter()
            .try_for_each(|replicate| self.run_replicate(replicate, &writer))?;

        Ok(writer.finish()?)
    }

    /// One worker: simulate, buffer all T+2 rows, pad, submit in order.
    fn run_replicate<W: Write>(
        &self,
        replicate: usize,
        writer: &OrderedWriter<W>,
    ) -> Result<(), ExecutorError> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.worker_seeds[replicate]);
        let mut simulation = self.build_simulation();
        let generations = self.digest.generations();

        let mut states = Vec::with_capacity(generations + 2);
        states.push(simulation.allele_frequencies_string());
        for t in 0..generations {
            simulation.update(t, &mut rng)?;
            states.push(simulation.allele_frequencies_string());
        }
        states.push(simulation.allele_identifiers_string());

        if self.digest.regime() == Regime::Mutation {
            pad_to_final_width(
                &mut states,
                simulation.allele_count(),
                simulation.precision(),
            );
        }

        for (step, line) in states.into_iter().enumerate() {
            writer.submit(line, replicate, step)?;
        }
        Ok(())
    }

    fn build_simulation(&self) -> Simulation {
        let output = self.digest.output();
        match self.digest.regime() {
            Regime::Drift => Simulation::drift(self.founder_table(), output),
            Regime::Mutation => Simulation::mutation(
                self.founder_table(),
                self.digest.mutation_rates().to_vec(),
                Arc::clone(self.transition.as_ref().expect("derived for mutation regime")),
                output,
            ),
            Regime::Selection => Simulation::selection(
                self.founder_table(),
                self.digest.selection_coefficients().to_vec(),
                output,
            ),
            Regime::Migration => Simulation::migration(
                self.initial_demes
                    .clone()
                    .expect("derived for migration regime"),
                Arc::clone(self.migration.as_ref().expect("derived for migration regime")),
                output,
            ),
            Regime::Bottleneck => {
                Simulation::bottleneck(self.founder_table(), self.digest.bottleneck(), output)
            }
        }
    }

    fn founder_table(&self) -> AlleleTable {
        AlleleTable::new(
            self.digest.initial_alleles().to_vec(),
            self.digest.initial_counts().to_vec(),
        )
    }
}

/// Right-pad frequency rows written before new alleles appeared with
/// zero-frequency columns, so every row spans the final table width. The
/// identifier header is generated last and already spans every column.
fn pad_to_final_width(states: &mut [String], final_columns: usize, precision: usize) {
    let zero_column = format!("|{:.precision$}", 0.0);
    let (_, frequency_rows) = states.split_last_mut().expect("at least the header row");
    for row in frequency_rows {
        let mut columns = row.matches('|').count() + 1;
        while columns < final_columns {
            row.push_str(&zero_column);
            columns += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Allele;
    use crate::config::{MigrationInput, MigrationTopology, MutationModel};

    fn drift_digest(generations: usize, replicates: usize) -> Digest {
        Digest::builder()
            .population_size(21)
            .generations(generations)
            .replicates(replicates)
            .founders(
                vec![
                    Allele::parse("AAAA").unwrap(),
                    Allele::parse("ACGT").unwrap(),
                ],
                vec![9, 12],
            )
            .regime(Regime::Drift)
            .seed(42)
            .build()
            .unwrap()
    }

    #[test]
    fn test_execute_produces_expected_shape() {
        let executor = Executor::new(drift_digest(10, 3));
        let out = executor.execute(Vec::new()).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 12); // T + 2
        for (i, line) in lines.iter().enumerate() {
            let columns: Vec<&str> = line.split('\t').collect();
            assert_eq!(columns.len(), 4); // step + 3 replicates
            assert_eq!(columns[0], i.to_string());
        }
        // identifier header closes the file
        assert!(lines[11].contains("AAAA |ACGT "));
    }

    #[test]
    fn test_execute_is_reproducible() {
        let digest = drift_digest(50, 8);
        let first = Executor::new(digest.clone()).execute(Vec::new()).unwrap();
        let second = Executor::new(digest).execute(Vec::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let digest_a = drift_digest(50, 4);
        let digest_b = Digest::builder()
            .population_size(21)
            .generations(50)
            .replicates(4)
            .founders(
                vec![
                    Allele::parse("AAAA").unwrap(),
                    Allele::parse("ACGT").unwrap(),
                ],
                vec![9, 12],
            )
            .seed(43)
            .build()
            .unwrap();
        let first = Executor::new(digest_a).execute(Vec::new()).unwrap();
        let second = Executor::new(digest_b).execute(Vec::new()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_mutation_rows_share_one_width() {
        let digest = Digest::builder()
            .population_size(40)
            .generations(40)
            .replicates(2)
            .founders(vec![Allele::parse("AAAA").unwrap()], vec![40])
            .regime(Regime::Mutation)
            .mutation_rates(vec![0.2; 4])
            .mutation_model(MutationModel::JukesCantor)
            .seed(7)
            .build()
            .unwrap();

        let out = Executor::new(digest).execute(Vec::new()).unwrap();
        let text = String::from_utf8(out).unwrap();

        for line in text.lines() {
            let cells: Vec<&str> = line.split('\t').skip(1).collect();
            let widths: Vec<usize> = cells.iter().map(|c| c.matches('|').count()).collect();
            // all rows of one replicate column share the final width
            assert_eq!(cells.len(), 2);
            assert!(widths[0] > 0, "aggressive mutation must widen the table");
        }

        // every row of a replicate has the same column count as its header
        let lines: Vec<&str> = text.lines().collect();
        let header_cells: Vec<&str> = lines.last().unwrap().split('\t').skip(1).collect();
        for (r, header) in header_cells.iter().enumerate() {
            let expected = header.matches('|').count();
            for line in &lines {
                let cell = line.split('\t').nth(r + 1).unwrap();
                assert_eq!(cell.matches('|').count(), expected);
            }
        }
    }

    #[test]
    fn test_migration_matrix_is_derived_once() {
        let digest = Digest::builder()
            .population_size(60)
            .generations(5)
            .replicates(2)
            .founders(
                vec![
                    Allele::parse("AAAA").unwrap(),
                    Allele::parse("CCCC").unwrap(),
                    Allele::parse("GGGG").unwrap(),
                ],
                vec![10, 20, 30],
            )
            .regime(Regime::Migration)
            .migration(
                MigrationTopology::CompleteGraph,
                MigrationInput::User(vec![3, 5, 6]),
            )
            .seed(11)
            .build()
            .unwrap();

        let executor = Executor::new(digest);
        let matrix = executor.migration_matrix().unwrap();
        assert_eq!(matrix.rate(0, 1), 3);
        assert_eq!(matrix.rate(0, 2), 5);
        assert_eq!(matrix.rate(1, 2), 6);

        let out = executor.execute(Vec::new()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 7);
        // detailed migration output: three deme groups per replicate cell
        let first_cell = text.lines().next().unwrap().split('\t').nth(1).unwrap();
        assert_eq!(first_cell.split("  ").count(), 3);
    }
}
