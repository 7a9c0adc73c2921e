//! Read-only tables derived once per run and shared by every worker:
//! the nucleotide-transition matrix and the migration-rate matrix.

use rand::Rng;

use crate::base::Nucleotide;
use crate::config::{MigrationInput, MigrationTopology, MutationModel};
use crate::errors::ModelError;
use crate::random;

/// Row-stochastic 4x4 matrix of per-mutation target probabilities, with a
/// zero diagonal. Indexed by the stable nucleotide indices.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix([[f64; 4]; 4]);

impl TransitionMatrix {
    /// Derive the matrix from the configured mutation model.
    pub fn from_model(model: &MutationModel) -> Self {
        match model {
            MutationModel::JukesCantor => Self::jukes_cantor(),
            MutationModel::Kimura { delta } => Self::kimura(*delta),
            MutationModel::Felsenstein { constants } => Self::felsenstein(constants),
        }
    }

    fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(rows)
    }

    /// Uniform 1/3 off-diagonals.
    fn jukes_cantor() -> Self {
        let mut rows = [[1.0 / 3.0; 4]; 4];
        for (x, row) in rows.iter_mut().enumerate() {
            row[x] = 0.0;
        }
        Self::from_rows(rows)
    }

    /// Transition partner (A<->G, C<->T) gets `delta`, the two
    /// transversions share the remainder.
    fn kimura(delta: f64) -> Self {
        let transversion = (1.0 - delta) / 2.0;
        let mut rows = [[transversion; 4]; 4];
        for (x, row) in rows.iter_mut().enumerate() {
            row[x] = 0.0;
            // A=0 pairs with G=2, C=1 pairs with T=3
            row[x ^ 2] = delta;
        }
        Self::from_rows(rows)
    }

    /// Rows are `c_j / (1 - c_j)` over the targets, then normalized.
    fn felsenstein(constants: &[f64; 4]) -> Self {
        let weights: Vec<f64> = constants.iter().map(|&c| c / (1.0 - c)).collect();
        let mut rows = [[0.0; 4]; 4];
        for (x, row) in rows.iter_mut().enumerate() {
            let norm: f64 = weights
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != x)
                .map(|(_, w)| w)
                .sum();
            for (j, &w) in weights.iter().enumerate() {
                if j != x {
                    row[j] = w / norm;
                }
            }
        }
        Self::from_rows(rows)
    }

    /// Target distribution for a mutating base of kind `from`.
    #[inline]
    pub fn row(&self, from: Nucleotide) -> &[f64; 4] {
        &self.0[from.to_index() as usize]
    }

    /// Draw a mutation target from the row of `from` by cumulative scan.
    ///
    /// A row that never reaches the drawn value (all zero, or deficient)
    /// cannot resolve a target; that is a fatal model error.
    pub fn draw_target<R: Rng + ?Sized>(
        &self,
        from: Nucleotide,
        rng: &mut R,
    ) -> Result<Nucleotide, ModelError> {
        let draw = random::uniform_real(rng, 0.0, 1.0);
        let mut cumulative = 0.0;
        for (j, &p) in self.row(from).iter().enumerate() {
            cumulative += p;
            if draw <= cumulative {
                return Ok(Nucleotide::from_index(j as u8).expect("index within alphabet"));
            }
        }
        Err(ModelError::UnresolvedMutationTarget {
            base: from.to_char(),
        })
    }
}

/// D x D matrix of fixed per-generation emigrant counts, zero diagonal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationMatrix {
    rates: Vec<Vec<u64>>,
}

impl MigrationMatrix {
    /// Build from explicit rows (tests and the executor's derivation).
    pub fn from_rows(rates: Vec<Vec<u64>>) -> Self {
        debug_assert!(rates
            .iter()
            .enumerate()
            .all(|(i, row)| row.len() == rates.len() && row[i] == 0));
        Self { rates }
    }

    /// Derive the matrix for a topology, choosing the star hub uniformly.
    pub fn derive<R: Rng + ?Sized>(
        topology: MigrationTopology,
        input: &MigrationInput,
        sizes: &[u64],
        rng: &mut R,
    ) -> Self {
        let center = match topology {
            MigrationTopology::Star if sizes.len() > 1 => {
                random::uniform_int(rng, 0, sizes.len() - 1)
            }
            _ => 0,
        };
        Self::with_center(topology, center, input, sizes, rng)
    }

    /// Derive the matrix with an explicit star hub.
    ///
    /// User magnitudes are consumed in edge order and reused cyclically;
    /// randomized magnitudes are drawn in [0, cap] where cap is the
    /// smallest deme size divided by the topology's largest vertex degree.
    /// Rows whose outgoing sum exceeds their deme size are trimmed.
    pub fn with_center<R: Rng + ?Sized>(
        topology: MigrationTopology,
        center: usize,
        input: &MigrationInput,
        sizes: &[u64],
        rng: &mut R,
    ) -> Self {
        let d = sizes.len();
        let edges = Self::edges(topology, center, d);

        let degree = Self::max_degree(topology, d);
        let cap = if degree == 0 {
            0
        } else {
            sizes.iter().copied().min().unwrap_or(0) / degree as u64
        };

        let mut rates = vec![vec![0u64; d]; d];
        for (e, &(i, j)) in edges.iter().enumerate() {
            let magnitude = match input {
                MigrationInput::User(values) if values.is_empty() => 0,
                MigrationInput::User(values) => values[e % values.len()],
                MigrationInput::Random => random::uniform_int(rng, 0, cap),
            };
            rates[i][j] = magnitude;
            rates[j][i] = magnitude;
        }

        let mut matrix = Self { rates };
        matrix.trim(sizes);
        matrix
    }

    /// Undirected edge list of a topology, in the order user magnitudes
    /// are consumed.
    pub fn edges(topology: MigrationTopology, center: usize, d: usize) -> Vec<(usize, usize)> {
        match topology {
            MigrationTopology::CompleteGraph => {
                let mut edges = Vec::with_capacity(d * (d.saturating_sub(1)) / 2);
                for i in 0..d {
                    for j in (i + 1)..d {
                        edges.push((i, j));
                    }
                }
                edges
            }
            MigrationTopology::Star => (0..d).filter(|&j| j != center).map(|j| (center, j)).collect(),
            MigrationTopology::Ring => {
                if d < 2 {
                    Vec::new()
                } else if d == 2 {
                    vec![(0, 1)]
                } else {
                    (0..d).map(|i| (i, (i + 1) % d)).collect()
                }
            }
        }
    }

    fn max_degree(topology: MigrationTopology, d: usize) -> usize {
        if d < 2 {
            return 0;
        }
        match topology {
            MigrationTopology::CompleteGraph | MigrationTopology::Star => d - 1,
            MigrationTopology::Ring => 2.min(d - 1),
        }
    }

    /// Clamp every row's outgoing sum to its deme size by repeatedly
    /// decrementing the largest positive entry.
    fn trim(&mut self, sizes: &[u64]) {
        for (i, row) in self.rates.iter_mut().enumerate() {
            loop {
                let sum: u64 = row.iter().sum();
                if sum <= sizes[i] {
                    break;
                }
                let largest = row
                    .iter()
                    .enumerate()
                    .max_by_key(|&(_, &r)| r)
                    .map(|(j, _)| j)
                    .expect("non-empty row");
                row[largest] -= 1;
            }
        }
    }

    /// D, the number of demes.
    pub fn deme_count(&self) -> usize {
        self.rates.len()
    }

    /// Fixed number of individuals leaving deme `i` for deme `j` each
    /// generation.
    #[inline]
    pub fn rate(&self, i: usize, j: usize) -> u64 {
        self.rates[i][j]
    }

    /// Total emigrants leaving deme `i` each generation.
    pub fn outgoing(&self, i: usize) -> u64 {
        self.rates[i].iter().sum()
    }
}
