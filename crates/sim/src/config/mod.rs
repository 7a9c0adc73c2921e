//! Run configuration: raw settings, founder ingest, and the immutable digest.
//!
//! The [`Digest`] is the single value a run needs. It is assembled once at
//! program start — either from a parsed [`Settings`] + [`FoundingPopulation`]
//! pair via [`Digest::from_input`], or directly through [`Digest::builder`]
//! in tests — validated on construction, and read-only afterwards.

mod fasta;
mod settings;

pub use fasta::FoundingPopulation;
pub use settings::Settings;

use serde::{Deserialize, Serialize};

use crate::base::Allele;
use crate::errors::ConfigError;

/// Default per-site mutation rate when MUT is absent.
pub const DEFAULT_MUTATION_RATE: f64 = 1e-6;

/// Default bottleneck window and reduction when MODE=8 omits them.
pub const DEFAULT_BOTTLENECK_START: usize = 20;
pub const DEFAULT_BOTTLENECK_END: usize = 40;
pub const DEFAULT_REDUCTION: f64 = 2.0;

/// Default minimum number of fractional digits in frequency output.
pub const DEFAULT_MIN_PRECISION: usize = 3;

/// The execution regime of a run. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Pure genetic drift.
    Drift,
    /// Drift plus per-site nucleotide mutation.
    Mutation,
    /// Drift through inter-deme migration on a fixed graph.
    Migration,
    /// Drift with per-allele selection.
    Selection,
    /// Drift with a timed population bottleneck.
    Bottleneck,
}

impl Regime {
    /// Map the MODE tag (0 none, 1 mutations, 2 migration, 4 selection,
    /// 8 bottleneck) to a regime.
    pub fn from_mode(mode: u32) -> Result<Self, ConfigError> {
        match mode {
            0 => Ok(Self::Drift),
            1 => Ok(Self::Mutation),
            2 => Ok(Self::Migration),
            4 => Ok(Self::Selection),
            8 => Ok(Self::Bottleneck),
            other => Err(ConfigError::UnknownRegime(other)),
        }
    }

    /// The MODE tag of this regime.
    pub fn mode(self) -> u32 {
        match self {
            Self::Drift => 0,
            Self::Mutation => 1,
            Self::Migration => 2,
            Self::Selection => 4,
            Self::Bottleneck => 8,
        }
    }
}

/// Parameterization of the 4x4 nucleotide-transition matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationModel {
    /// Uniform 1/3 off-diagonals.
    JukesCantor,
    /// Transition probability `delta`, transversions `(1 - delta) / 2`.
    Kimura { delta: f64 },
    /// Normalized equilibrium constants, one per base.
    Felsenstein { constants: [f64; 4] },
}

impl MutationModel {
    /// Pick the model from the raw settings values.
    ///
    /// A Kimura delta within [1/3, 1] wins; otherwise four Felsenstein
    /// constants are normalized (negatives clipped to absolute value, a
    /// deficit to 1 spread equally) and accepted unless their clipped sum
    /// already exceeds 1, in which case the model falls back to
    /// Jukes-Cantor.
    pub fn select(kimura_delta: Option<f64>, felsenstein: Option<&[f64]>) -> Self {
        if let Some(delta) = kimura_delta {
            if (1.0 / 3.0..=1.0).contains(&delta) {
                return Self::Kimura { delta };
            }
        }

        if let Some(raw) = felsenstein {
            if raw.len() == 4 {
                let mut constants = [0.0f64; 4];
                for (slot, &c) in constants.iter_mut().zip(raw) {
                    *slot = c.abs();
                }
                let sum: f64 = constants.iter().sum();
                if sum < 1.0 {
                    for c in &mut constants {
                        *c += (1.0 - sum) / 4.0;
                    }
                }
                if sum <= 1.0 && constants.iter().all(|c| *c < 1.0) {
                    return Self::Felsenstein { constants };
                }
            }
        }

        Self::JukesCantor
    }
}

/// Shape of the migration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationTopology {
    /// Every pair of demes exchanges migrants.
    CompleteGraph,
    /// All exchange passes through one hub deme.
    Star,
    /// Each deme exchanges with its two neighbours on a cycle.
    Ring,
}

impl MigrationTopology {
    /// Map the MIG_MODEL tag (0 complete, 1 star, 2 ring).
    pub fn from_model(model: u32) -> Result<Self, ConfigError> {
        match model {
            0 => Ok(Self::CompleteGraph),
            1 => Ok(Self::Star),
            2 => Ok(Self::Ring),
            other => Err(ConfigError::UnknownTopology(other)),
        }
    }
}

/// Where per-edge migration magnitudes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationInput {
    /// One magnitude per topology edge, in edge order; reused cyclically
    /// when fewer values than edges are supplied.
    User(Vec<u64>),
    /// Drawn uniformly, bounded by the smallest feasible subgroup.
    Random,
}

/// Timed population bottleneck: reduce by `reduction` at `start`, restore
/// at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub start: usize,
    pub end: usize,
    pub reduction: f64,
}

impl Default for Bottleneck {
    fn default() -> Self {
        Self {
            start: DEFAULT_BOTTLENECK_START,
            end: DEFAULT_BOTTLENECK_END,
            reduction: DEFAULT_REDUCTION,
        }
    }
}

/// Output-shape switches carried by the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Lower bound on the number of fractional digits.
    pub min_precision: usize,
    /// Migration regime: emit one frequency group per deme (true) or a
    /// single aggregated group (false).
    pub per_deme_columns: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            min_precision: DEFAULT_MIN_PRECISION,
            per_deme_columns: true,
        }
    }
}

/// Immutable description of one experiment.
///
/// Built once, validated on construction, then shared read-only with the
/// executor and every replicate worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    population_size: u64,
    generations: usize,
    replicates: usize,
    marker_sites: Vec<usize>,
    initial_alleles: Vec<Allele>,
    initial_counts: Vec<u64>,
    regime: Regime,
    mutation_rates: Vec<f64>,
    mutation_model: MutationModel,
    selection_coefficients: Vec<f64>,
    migration_topology: MigrationTopology,
    migration_input: MigrationInput,
    bottleneck: Bottleneck,
    seed: u64,
    output: OutputOptions,
}

impl Digest {
    /// Start building a digest field by field.
    pub fn builder() -> DigestBuilder {
        DigestBuilder::default()
    }

    /// Assemble a digest from parsed settings and an ingested founding
    /// population, applying the documented defaults.
    pub fn from_input(
        settings: &Settings,
        founders: FoundingPopulation,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let regime = Regime::from_mode(settings.mode.unwrap_or(0))?;
        let mutation_model = MutationModel::select(
            settings.kimura_delta,
            settings.felsenstein_constants.as_deref(),
        );
        let topology = MigrationTopology::from_model(settings.migration_model.unwrap_or(0))?;
        let migration_input = match settings.migration_mode.unwrap_or(0) {
            0 => MigrationInput::User(settings.migration_rates.clone().unwrap_or_default()),
            _ => MigrationInput::Random,
        };
        let bottleneck = Bottleneck {
            start: settings.bottleneck_start.unwrap_or(DEFAULT_BOTTLENECK_START),
            end: settings.bottleneck_end.unwrap_or(DEFAULT_BOTTLENECK_END),
            reduction: settings.reduction.unwrap_or(DEFAULT_REDUCTION),
        };

        let mut builder = Self::builder()
            .population_size(founders.population_size)
            .generations(settings.generations.unwrap_or(0))
            .replicates(settings.replicates.unwrap_or(0))
            .marker_sites(settings.marker_sites.clone())
            .founders(founders.alleles, founders.counts)
            .regime(regime)
            .mutation_model(mutation_model)
            .migration(topology, migration_input)
            .bottleneck(bottleneck)
            .seed(seed);

        if let Some(rates) = &settings.mutation_rates {
            builder = builder.mutation_rates(rates.clone());
        }
        if let Some(coefficients) = &settings.selection_coefficients {
            builder = builder.selection_coefficients(coefficients.clone());
        }

        builder.build()
    }

    pub fn population_size(&self) -> u64 {
        self.population_size
    }

    pub fn generations(&self) -> usize {
        self.generations
    }

    pub fn replicates(&self) -> usize {
        self.replicates
    }

    /// 1-based marker-site indices into the ingested sequences.
    pub fn marker_sites(&self) -> &[usize] {
        &self.marker_sites
    }

    /// L, the number of marker sites.
    pub fn marker_len(&self) -> usize {
        self.marker_sites.len()
    }

    /// Founding allele identifiers, in table order.
    pub fn initial_alleles(&self) -> &[Allele] {
        &self.initial_alleles
    }

    /// Founding allele multiplicities, parallel to `initial_alleles`.
    pub fn initial_counts(&self) -> &[u64] {
        &self.initial_counts
    }

    /// K, the number of founding alleles.
    pub fn allele_count(&self) -> usize {
        self.initial_alleles.len()
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    /// Per-site mutation rates, length L.
    pub fn mutation_rates(&self) -> &[f64] {
        &self.mutation_rates
    }

    pub fn mutation_model(&self) -> &MutationModel {
        &self.mutation_model
    }

    /// Per-allele selection coefficients, length K.
    pub fn selection_coefficients(&self) -> &[f64] {
        &self.selection_coefficients
    }

    pub fn migration_topology(&self) -> MigrationTopology {
        self.migration_topology
    }

    pub fn migration_input(&self) -> &MigrationInput {
        &self.migration_input
    }

    pub fn bottleneck(&self) -> Bottleneck {
        self.bottleneck
    }

    /// Master seed every worker seed derives from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn output(&self) -> OutputOptions {
        self.output
    }
}

/// Field-by-field construction of a [`Digest`], validated in [`build`].
///
/// [`build`]: DigestBuilder::build
#[derive(Debug, Default)]
pub struct DigestBuilder {
    population_size: u64,
    generations: usize,
    replicates: usize,
    marker_sites: Vec<usize>,
    initial_alleles: Vec<Allele>,
    initial_counts: Vec<u64>,
    regime: Option<Regime>,
    mutation_rates: Option<Vec<f64>>,
    mutation_model: Option<MutationModel>,
    selection_coefficients: Option<Vec<f64>>,
    migration: Option<(MigrationTopology, MigrationInput)>,
    bottleneck: Option<Bottleneck>,
    seed: u64,
    output: Option<OutputOptions>,
}

impl DigestBuilder {
    pub fn population_size(mut self, n: u64) -> Self {
        self.population_size = n;
        self
    }

    pub fn generations(mut self, t: usize) -> Self {
        self.generations = t;
        self
    }

    pub fn replicates(mut self, n: usize) -> Self {
        self.replicates = n;
        self
    }

    pub fn marker_sites(mut self, sites: Vec<usize>) -> Self {
        self.marker_sites = sites;
        self
    }

    pub fn founders(mut self, alleles: Vec<Allele>, counts: Vec<u64>) -> Self {
        self.initial_alleles = alleles;
        self.initial_counts = counts;
        self
    }

    pub fn regime(mut self, regime: Regime) -> Self {
        self.regime = Some(regime);
        self
    }

    pub fn mutation_rates(mut self, rates: Vec<f64>) -> Self {
        self.mutation_rates = Some(rates);
        self
    }

    pub fn mutation_model(mut self, model: MutationModel) -> Self {
        self.mutation_model = Some(model);
        self
    }

    pub fn selection_coefficients(mut self, coefficients: Vec<f64>) -> Self {
        self.selection_coefficients = Some(coefficients);
        self
    }

    pub fn migration(mut self, topology: MigrationTopology, input: MigrationInput) -> Self {
        self.migration = Some((topology, input));
        self
    }

    pub fn bottleneck(mut self, bottleneck: Bottleneck) -> Self {
        self.bottleneck = Some(bottleneck);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn output(mut self, output: OutputOptions) -> Self {
        self.output = Some(output);
        self
    }

    /// Validate the assembled fields and freeze them into a [`Digest`].
    pub fn build(self) -> Result<Digest, ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::NonPositive("population size"));
        }
        if self.generations == 0 {
            return Err(ConfigError::NonPositive("generations"));
        }
        if self.replicates == 0 {
            return Err(ConfigError::NonPositive("replicates"));
        }
        if self.initial_alleles.is_empty() {
            return Err(ConfigError::NonPositive("founding alleles"));
        }
        if self.initial_alleles.len() != self.initial_counts.len() {
            return Err(ConfigError::LengthMismatch {
                what: "founding allele counts",
                expected: self.initial_alleles.len(),
                found: self.initial_counts.len(),
            });
        }

        // marker sites default to 1..=L when the digest is built directly
        let marker_len = self.initial_alleles[0].len();
        let marker_sites = if self.marker_sites.is_empty() {
            (1..=marker_len).collect()
        } else {
            self.marker_sites
        };
        if marker_sites.is_empty() {
            return Err(ConfigError::NoMarkerSites);
        }
        if marker_sites.len() != marker_len {
            return Err(ConfigError::AlleleLength {
                expected: marker_sites.len(),
                found: marker_len,
            });
        }

        for allele in &self.initial_alleles {
            if allele.len() != marker_sites.len() {
                return Err(ConfigError::AlleleLength {
                    expected: marker_sites.len(),
                    found: allele.len(),
                });
            }
        }
        for (i, allele) in self.initial_alleles.iter().enumerate() {
            if self.initial_alleles[..i].contains(allele) {
                return Err(ConfigError::DuplicateAllele(allele.to_string()));
            }
        }

        let total: u64 = self.initial_counts.iter().sum();
        if total != self.population_size {
            return Err(ConfigError::CountMismatch {
                expected: self.population_size,
                found: total,
            });
        }

        let mutation_rates = self
            .mutation_rates
            .unwrap_or_else(|| vec![DEFAULT_MUTATION_RATE; marker_sites.len()]);
        if mutation_rates.len() != marker_sites.len() {
            return Err(ConfigError::LengthMismatch {
                what: "per-site mutation rates",
                expected: marker_sites.len(),
                found: mutation_rates.len(),
            });
        }
        for &mu in &mutation_rates {
            if !(0.0..1.0).contains(&mu) {
                return Err(ConfigError::InvalidMutationRate(mu));
            }
        }

        let allele_count = self.initial_alleles.len();
        let mut selection_coefficients = self.selection_coefficients.unwrap_or_default();
        if selection_coefficients.len() > allele_count {
            return Err(ConfigError::LengthMismatch {
                what: "selection coefficients",
                expected: allele_count,
                found: selection_coefficients.len(),
            });
        }
        selection_coefficients.resize(allele_count, 0.0);
        for &s in &selection_coefficients {
            if s < -1.0 {
                return Err(ConfigError::InvalidSelectionCoefficient(s));
            }
        }

        let bottleneck = self.bottleneck.unwrap_or_default();
        if bottleneck.start > bottleneck.end {
            return Err(ConfigError::InvalidBottleneckWindow {
                start: bottleneck.start,
                end: bottleneck.end,
            });
        }
        if bottleneck.reduction <= 0.0 {
            return Err(ConfigError::InvalidReduction(bottleneck.reduction));
        }

        let (migration_topology, migration_input) = self
            .migration
            .unwrap_or((MigrationTopology::CompleteGraph, MigrationInput::Random));

        Ok(Digest {
            population_size: self.population_size,
            generations: self.generations,
            replicates: self.replicates,
            marker_sites,
            initial_alleles: self.initial_alleles,
            initial_counts: self.initial_counts,
            regime: self.regime.unwrap_or(Regime::Drift),
            mutation_rates,
            mutation_model: self.mutation_model.unwrap_or(MutationModel::JukesCantor),
            selection_coefficients,
            migration_topology,
            migration_input,
            bottleneck,
            seed: self.seed,
            output: self.output.unwrap_or_default(),
        })
    }
}
