//! Sampling primitives shared by every regime.
//!
//! All functions are generic over `rand::Rng` so each replicate worker can
//! drive them with its own Xoshiro256++ generator, seeded from the master
//! seed. Nothing in here is shared between threads.

use rand::distr::uniform::SampleUniform;
use rand::Rng;
use rand_distr::{Binomial, Distribution};

/// Uniform integer in the closed range {low, ..., high}.
#[inline]
pub fn uniform_int<R, T>(rng: &mut R, low: T, high: T) -> T
where
    R: Rng + ?Sized,
    T: SampleUniform + PartialOrd,
{
    rng.random_range(low..=high)
}

/// Uniform real in the half-open range [low, high).
#[inline]
pub fn uniform_real<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    rng.random_range(low..high)
}

/// Binomial draw in {0, ..., n}. Degenerate probabilities short-circuit.
#[inline]
pub fn binomial<R: Rng + ?Sized>(rng: &mut R, n: u64, p: f64) -> u64 {
    if n == 0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    Binomial::new(n, p)
        .expect("probability within (0, 1)")
        .sample(rng)
}

/// Redistribute `n` trials over the buckets of `counts`, preserving order.
///
/// The returned vector is a draw from Multinomial(n, counts / sum(counts)),
/// produced by the conditional-binomial decomposition: bucket i receives a
/// binomial draw of the still-unassigned trials with success probability
/// counts[i] / (weight not yet consumed). The ordering of the buckets and
/// the paired `total`/`remaining` decrements are what make the marginals
/// exact; both loop updates must stay in lockstep.
///
/// A zero weight vector yields all zeros (callers pass `n == 0` alongside).
pub fn multinomial<R: Rng + ?Sized>(rng: &mut R, counts: &[u64], n: u64) -> Vec<u64> {
    let mut total: u64 = counts.iter().sum();
    let mut remaining = n;
    let mut redistributed = Vec::with_capacity(counts.len());

    for &weight in counts {
        if total == 0 {
            // only reachable when every remaining bucket is empty
            debug_assert_eq!(weight, 0);
            redistributed.push(0);
            continue;
        }

        let p = weight as f64 / total as f64;
        let drawn = binomial(rng, remaining, p);
        redistributed.push(drawn);

        total -= weight;
        remaining -= drawn;
    }

    // residual gene pool and residual offspring must both be exhausted
    assert_eq!(total, 0);
    assert!(remaining == 0 || counts.iter().all(|&c| c == 0));

    redistributed
}
