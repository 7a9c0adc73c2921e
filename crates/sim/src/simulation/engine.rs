//! One replicate's simulation: state, update laws, and output formatting.
//!
//! The five regimes share the drift kernel — one multinomial re-sampling of
//! the population per generation, expressed as conditional binomials — and
//! differ in the extra law layered on top (mutation pass, weighted
//! resampling, inter-deme exchange, population-size edges).

use std::sync::Arc;

use rand::Rng;

use super::{AlleleTable, DemeMatrix, MigrationMatrix, TransitionMatrix};
use crate::base::Allele;
use crate::config::{Bottleneck, OutputOptions};
use crate::errors::ModelError;
use crate::random;

/// Separator between allele columns inside one replicate cell.
const FREQUENCY_SEPARATOR: char = '|';

/// Separator between deme groups in detailed migration output.
const DEME_SEPARATOR: &str = "  ";

/// Regime-specific state. Each variant carries only what its update law
/// needs; lookup tables are shared between workers through `Arc`.
#[derive(Debug, Clone)]
enum RegimeState {
    Drift {
        table: AlleleTable,
    },
    Mutation {
        table: AlleleTable,
        rates: Vec<f64>,
        matrix: Arc<TransitionMatrix>,
    },
    Selection {
        table: AlleleTable,
        coefficients: Vec<f64>,
    },
    Migration {
        demes: DemeMatrix,
        migration: Arc<MigrationMatrix>,
    },
    Bottleneck {
        table: AlleleTable,
        window: Bottleneck,
    },
}

/// State machine for a single replicate.
#[derive(Debug, Clone)]
pub struct Simulation {
    population_size: u64,
    precision: usize,
    identifier_padding: usize,
    per_deme_columns: bool,
    state: RegimeState,
}

impl Simulation {
    /// Pure genetic drift.
    pub fn drift(table: AlleleTable, output: OutputOptions) -> Self {
        Self::with_state(RegimeState::Drift { table }, output)
    }

    /// Drift plus per-site nucleotide mutation.
    pub fn mutation(
        table: AlleleTable,
        rates: Vec<f64>,
        matrix: Arc<TransitionMatrix>,
        output: OutputOptions,
    ) -> Self {
        Self::with_state(
            RegimeState::Mutation {
                table,
                rates,
                matrix,
            },
            output,
        )
    }

    /// Weighted resampling under per-allele selection coefficients.
    pub fn selection(
        table: AlleleTable,
        coefficients: Vec<f64>,
        output: OutputOptions,
    ) -> Self {
        debug_assert_eq!(table.len(), coefficients.len());
        Self::with_state(
            RegimeState::Selection {
                table,
                coefficients,
            },
            output,
        )
    }

    /// Inter-deme migration on a fixed graph.
    pub fn migration(
        demes: DemeMatrix,
        migration: Arc<MigrationMatrix>,
        output: OutputOptions,
    ) -> Self {
        debug_assert_eq!(demes.deme_count(), migration.deme_count());
        Self::with_state(RegimeState::Migration { demes, migration }, output)
    }

    /// Drift with a timed population bottleneck.
    pub fn bottleneck(table: AlleleTable, window: Bottleneck, output: OutputOptions) -> Self {
        Self::with_state(RegimeState::Bottleneck { table, window }, output)
    }

    fn with_state(state: RegimeState, output: OutputOptions) -> Self {
        let (population_size, identifier_len) = match &state {
            RegimeState::Drift { table }
            | RegimeState::Mutation { table, .. }
            | RegimeState::Selection { table, .. }
            | RegimeState::Bottleneck { table, .. } => {
                (table.total(), table.identifier(0).len())
            }
            RegimeState::Migration { demes, .. } => {
                (demes.total(), demes.identifiers()[0].len())
            }
        };

        // '0.' takes two characters; identifiers shorter than the numeric
        // columns are padded, longer ones widen the precision instead
        let precision = if identifier_len <= output.min_precision + 2 {
            output.min_precision
        } else {
            identifier_len - 2
        };
        let identifier_padding = (precision + 2).saturating_sub(identifier_len);

        Self {
            population_size,
            precision,
            identifier_padding,
            per_deme_columns: output.per_deme_columns,
            state,
        }
    }

    /// Advance one generation. `t` is the 0-based generation index; only
    /// the bottleneck regime reads it.
    pub fn update<R: Rng + ?Sized>(&mut self, t: usize, rng: &mut R) -> Result<(), ModelError> {
        match &mut self.state {
            RegimeState::Drift { table } => {
                drift_kernel(table, self.population_size, rng);
                Ok(())
            }
            RegimeState::Mutation {
                table,
                rates,
                matrix,
            } => {
                drift_kernel(table, self.population_size, rng);
                mutation_pass(table, rates, matrix, rng)
            }
            RegimeState::Selection {
                table,
                coefficients,
            } => {
                selection_kernel(table, coefficients, self.population_size, rng);
                Ok(())
            }
            RegimeState::Migration { demes, migration } => {
                demes.migrate(migration, rng);
                Ok(())
            }
            RegimeState::Bottleneck { table, window } => {
                if t == window.start {
                    self.population_size =
                        (self.population_size as f64 / window.reduction) as u64;
                }
                if t == window.end {
                    self.population_size =
                        (self.population_size as f64 * window.reduction) as u64;
                }
                drift_kernel(table, self.population_size, rng);
                Ok(())
            }
        }
    }

    /// Fractional allele frequencies of the current generation, pipe
    /// separated in table order. The migration regime emits one group per
    /// deme (or a single aggregated group) over the shared ordering.
    pub fn allele_frequencies_string(&self) -> String {
        match &self.state {
            RegimeState::Drift { table }
            | RegimeState::Mutation { table, .. }
            | RegimeState::Selection { table, .. }
            | RegimeState::Bottleneck { table, .. } => {
                format_frequencies(table.counts(), self.population_size, self.precision)
            }
            RegimeState::Migration { demes, .. } => {
                if self.per_deme_columns {
                    let groups: Vec<String> = (0..demes.deme_count())
                        .map(|d| {
                            format_frequencies(demes.row(d), self.population_size, self.precision)
                        })
                        .collect();
                    groups.join(DEME_SEPARATOR)
                } else {
                    format_frequencies(
                        &demes.aggregated_counts(),
                        self.population_size,
                        self.precision,
                    )
                }
            }
        }
    }

    /// The identifier header, pipe separated, padded to the width of the
    /// frequency columns.
    pub fn allele_identifiers_string(&self) -> String {
        let identifiers = self.identifiers();
        let padding = " ".repeat(self.identifier_padding);
        identifiers
            .iter()
            .map(|id| format!("{id}{padding}"))
            .collect::<Vec<_>>()
            .join(&FREQUENCY_SEPARATOR.to_string())
    }

    /// Number of fractional digits in the frequency output.
    pub fn precision(&self) -> usize {
        self.precision
    }

    /// Current population size (varies only in the bottleneck regime).
    pub fn population_size(&self) -> u64 {
        self.population_size
    }

    /// Number of allele columns currently in the output.
    pub fn allele_count(&self) -> usize {
        self.identifiers().len()
    }

    fn identifiers(&self) -> &[Allele] {
        match &self.state {
            RegimeState::Drift { table }
            | RegimeState::Mutation { table, .. }
            | RegimeState::Selection { table, .. }
            | RegimeState::Bottleneck { table, .. } => table.identifiers(),
            RegimeState::Migration { demes, .. } => demes.identifiers(),
        }
    }

    /// The allele table, for regimes that carry one.
    pub fn table(&self) -> Option<&AlleleTable> {
        match &self.state {
            RegimeState::Drift { table }
            | RegimeState::Mutation { table, .. }
            | RegimeState::Selection { table, .. }
            | RegimeState::Bottleneck { table, .. } => Some(table),
            RegimeState::Migration { .. } => None,
        }
    }

    /// The deme matrix, in the migration regime.
    pub fn demes(&self) -> Option<&DemeMatrix> {
        match &self.state {
            RegimeState::Migration { demes, .. } => Some(demes),
            _ => None,
        }
    }
}

/// One multinomial re-sampling of the whole population.
fn drift_kernel<R: Rng + ?Sized>(table: &mut AlleleTable, population_size: u64, rng: &mut R) {
    let next = random::multinomial(rng, table.counts(), population_size);
    table.set_counts(next);
}

/// Post-drift mutation pass: per site, per allele row, a binomial number
/// of copies mutate to a target drawn from the transition matrix. New
/// identifiers are appended to the table, growing the output width.
fn mutation_pass<R: Rng + ?Sized>(
    table: &mut AlleleTable,
    rates: &[f64],
    matrix: &TransitionMatrix,
    rng: &mut R,
) -> Result<(), ModelError> {
    for (site, &mu) in rates.iter().enumerate() {
        if mu <= 0.0 {
            continue;
        }

        // rows appended while scanning this site are not re-candidates
        let rows_at_entry = table.len();
        for i in 0..rows_at_entry {
            let copies = table.count(i);
            if copies == 0 {
                continue;
            }

            let mutations = random::binomial(rng, copies, mu);
            for _ in 0..mutations {
                let source = table
                    .identifier(i)
                    .site(site)
                    .expect("site within allele length");
                let target = matrix.draw_target(source, rng)?;
                let mutant = table.identifier(i).with_substitution(site, target);
                table.decrement(i);
                table.merge_mutant(mutant);
            }
        }
    }
    Ok(())
}

/// Weighted conditional-binomial resampling under selection.
///
/// Suffix sums keep the last surviving bucket's probability at exactly 1,
/// so the residual population always drains to zero.
fn selection_kernel<R: Rng + ?Sized>(
    table: &mut AlleleTable,
    coefficients: &[f64],
    population_size: u64,
    rng: &mut R,
) {
    let k = table.len();
    let weights: Vec<f64> = (0..k)
        .map(|i| table.count(i) as f64 * (1.0 + coefficients[i]))
        .collect();

    let mut suffix = vec![0.0; k + 1];
    for i in (0..k).rev() {
        suffix[i] = weights[i] + suffix[i + 1];
    }

    let mut remaining = population_size;
    let mut next = Vec::with_capacity(k);
    for i in 0..k {
        let drawn = if weights[i] <= 0.0 || suffix[i] <= 0.0 {
            0
        } else {
            random::binomial(rng, remaining, (weights[i] / suffix[i]).min(1.0))
        };
        next.push(drawn);
        remaining -= drawn;
    }

    // the weighted gene pool must absorb the whole next generation
    assert_eq!(remaining, 0);
    table.set_counts(next);
}

fn format_frequencies(counts: &[u64], population_size: u64, precision: usize) -> String {
    let mut out = String::new();
    for (i, &count) in counts.iter().enumerate() {
        if i > 0 {
            out.push(FREQUENCY_SEPARATOR);
        }
        let frequency = count as f64 / population_size as f64;
        out.push_str(&format!("{frequency:.precision$}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationInput, MigrationTopology};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    fn table() -> AlleleTable {
        AlleleTable::new(
            vec![
                Allele::parse("AAAA").unwrap(),
                Allele::parse("ACGT").unwrap(),
            ],
            vec![9, 12],
        )
    }

    fn output() -> OutputOptions {
        OutputOptions::default()
    }

    #[test]
    fn test_drift_conserves_population_size() {
        let mut sim = Simulation::drift(table(), output());
        let mut r = rng(1);
        for t in 0..200 {
            sim.update(t, &mut r).unwrap();
            assert_eq!(sim.table().unwrap().total(), 21);
        }
    }

    #[test]
    fn test_initial_frequencies_format() {
        let sim = Simulation::drift(table(), output());
        assert_eq!(sim.precision(), 3);
        assert_eq!(sim.allele_frequencies_string(), "0.429|0.571");
    }

    #[test]
    fn test_identifier_header_is_padded_to_column_width() {
        let sim = Simulation::drift(table(), output());
        // numeric columns are 5 wide ("0.429"), identifiers are 4 long
        assert_eq!(sim.allele_identifiers_string(), "AAAA |ACGT ");
    }

    #[test]
    fn test_long_identifiers_widen_precision() {
        let ids = vec![
            Allele::parse("AAAAAAA").unwrap(),
            Allele::parse("CCCCCCC").unwrap(),
        ];
        let sim = Simulation::drift(AlleleTable::new(ids, vec![1, 3]), output());
        assert_eq!(sim.precision(), 5);
        assert_eq!(sim.allele_frequencies_string(), "0.25000|0.75000");
        assert_eq!(sim.allele_identifiers_string(), "AAAAAAA|CCCCCCC");
    }

    #[test]
    fn test_mutation_with_zero_rate_is_pure_drift() {
        let matrix = Arc::new(TransitionMatrix::from_model(
            &crate::config::MutationModel::JukesCantor,
        ));
        let mut sim = Simulation::mutation(table(), vec![0.0; 4], matrix, output());
        let mut r = rng(2);
        for t in 0..100 {
            sim.update(t, &mut r).unwrap();
            let table = sim.table().unwrap();
            assert_eq!(table.len(), 2, "no new alleles may appear");
            assert_eq!(table.total(), 21);
        }
    }

    #[test]
    fn test_mutation_appends_new_alleles() {
        let matrix = Arc::new(TransitionMatrix::from_model(
            &crate::config::MutationModel::JukesCantor,
        ));
        let mut sim = Simulation::mutation(table(), vec![0.3; 4], matrix, output());
        let mut r = rng(3);
        for t in 0..30 {
            sim.update(t, &mut r).unwrap();
            assert_eq!(sim.table().unwrap().total(), 21);
        }
        assert!(
            sim.table().unwrap().len() > 2,
            "aggressive mutation must discover new alleles"
        );
        // the founding identifiers keep their columns
        assert_eq!(sim.table().unwrap().identifier(0).to_string(), "AAAA");
        assert_eq!(sim.table().unwrap().identifier(1).to_string(), "ACGT");
    }

    #[test]
    fn test_lethal_allele_dies_in_one_generation() {
        let mut sim = Simulation::selection(table(), vec![0.1, -1.0], output());
        let mut r = rng(4);
        sim.update(0, &mut r).unwrap();
        let table = sim.table().unwrap();
        assert_eq!(table.count(1), 0);
        assert_eq!(table.count(0), 21);
        assert_eq!(sim.allele_frequencies_string(), "1.000|0.000");
    }

    #[test]
    fn test_selection_conserves_population_size() {
        let mut sim = Simulation::selection(table(), vec![0.1, -0.8], output());
        let mut r = rng(5);
        for t in 0..200 {
            sim.update(t, &mut r).unwrap();
            assert_eq!(sim.table().unwrap().total(), 21);
        }
    }

    #[test]
    fn test_bottleneck_population_size_trajectory() {
        let ids = vec![
            Allele::parse("AAAA").unwrap(),
            Allele::parse("CCCC").unwrap(),
        ];
        let window = Bottleneck {
            start: 20,
            end: 40,
            reduction: 2.0,
        };
        let mut sim = Simulation::bottleneck(
            AlleleTable::new(ids, vec![10, 10]),
            window,
            output(),
        );
        let mut r = rng(6);

        for t in 0..60 {
            sim.update(t, &mut r).unwrap();
            let expected = if (20..40).contains(&t) { 10 } else { 20 };
            assert_eq!(sim.population_size(), expected, "at generation {t}");
            assert_eq!(sim.table().unwrap().total(), expected);
        }
    }

    #[test]
    fn test_bottleneck_restoration_keeps_floor_residue() {
        let window = Bottleneck {
            start: 0,
            end: 1,
            reduction: 2.0,
        };
        let mut sim = Simulation::bottleneck(table(), window, output());
        let mut r = rng(7);

        sim.update(0, &mut r).unwrap();
        assert_eq!(sim.population_size(), 10); // floor(21 / 2)
        sim.update(1, &mut r).unwrap();
        assert_eq!(sim.population_size(), 20); // restored from the floor
    }

    #[test]
    fn test_migration_update_and_detailed_output() {
        let ids: Vec<Allele> = ["AAAA", "CCCC", "GGGG"]
            .iter()
            .map(|s| Allele::parse(s).unwrap())
            .collect();
        let demes = DemeMatrix::diagonal(ids, &[10, 20, 30]);
        let migration = Arc::new(MigrationMatrix::with_center(
            MigrationTopology::CompleteGraph,
            0,
            &MigrationInput::User(vec![3, 5, 6]),
            demes.sizes(),
            &mut rng(8),
        ));
        let mut sim = Simulation::migration(demes, migration, output());

        // three groups separated by double spaces, denominators global
        let first = sim.allele_frequencies_string();
        assert_eq!(first, "0.167|0.000|0.000  0.000|0.333|0.000  0.000|0.000|0.500");

        let mut r = rng(9);
        for t in 0..100 {
            sim.update(t, &mut r).unwrap();
            let demes = sim.demes().unwrap();
            assert_eq!(demes.sizes(), &[10, 20, 30]);
        }
    }

    #[test]
    fn test_migration_aggregated_output() {
        let ids: Vec<Allele> = ["AAAA", "CCCC"]
            .iter()
            .map(|s| Allele::parse(s).unwrap())
            .collect();
        let demes = DemeMatrix::diagonal(ids, &[30, 30]);
        let migration = Arc::new(MigrationMatrix::from_rows(vec![vec![0, 3], vec![3, 0]]));
        let opts = OutputOptions {
            per_deme_columns: false,
            ..OutputOptions::default()
        };
        let sim = Simulation::migration(demes, migration, opts);
        assert_eq!(sim.allele_frequencies_string(), "0.500|0.500");
    }
}
