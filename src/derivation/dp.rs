//! (ε, δ)-differential privacy via (k, β)-sampled distorted generalization
//!
//! Releasing only classes of at least `k` records, after each record was
//! kept independently with probability `β`, satisfies (ε, δ)-DP when
//!
//! ```text
//! β = 1 − e^(−ε)
//! γ = 1 − e^(−ε) + β·e^(−ε)
//! δ(k) = max_{n ≥ ⌈k/γ − 1⌉} P[Bin(n, β) > ⌊n·γ⌋]  ≤  δ
//! ```
//!
//! The maximum is taken over `n` until the Chernoff bound
//! `exp(−n·(γ·ln(γ/β) − (γ − β)))` on all later terms drops below it.

use crate::config::RandomConfig;
use crate::data::DataSubset;
use crate::error::{Error, Result};
use crate::numeric::probability::binomial_upper_tail;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;

/// Largest class size the search will consider.
pub const MAX_K: usize = 100_000;

/// Largest sample size evaluated while bounding δ(k).
const MAX_N: u64 = 10_000_000;

/// Derived SDGS parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DpParameters {
    /// Minimal class size
    pub k: usize,
    /// Per-record sampling probability
    pub beta: f64,
}

/// Memoized δ(k) evaluation for one ε.
struct DeltaSearch {
    beta: f64,
    gamma: f64,
    exponent: f64,
    tails: HashMap<u64, f64>,
}

impl DeltaSearch {
    fn new(epsilon: f64) -> Self {
        let beta = 1.0 - (-epsilon).exp();
        let gamma = 1.0 - (-epsilon).exp() + beta * (-epsilon).exp();
        let exponent = gamma * (gamma / beta).ln() - (gamma - beta);
        Self {
            beta,
            gamma,
            exponent,
            tails: HashMap::new(),
        }
    }

    /// P[Bin(n, β) > ⌊n·γ⌋]
    fn tail(&mut self, n: u64) -> f64 {
        let (beta, gamma) = (self.beta, self.gamma);
        *self.tails.entry(n).or_insert_with(|| {
            let threshold = (n as f64 * gamma).floor() as u64;
            binomial_upper_tail(n, threshold + 1, beta)
        })
    }

    fn chernoff(&self, n: u64) -> f64 {
        (-(n as f64) * self.exponent).exp()
    }

    fn delta(&mut self, k: usize) -> Result<f64> {
        let start = ((k as f64 / self.gamma) - 1.0).ceil().max(0.0) as u64;
        let mut max = 0.0f64;
        let mut n = start;
        loop {
            max = max.max(self.tail(n));
            if self.chernoff(n) <= max || max >= 1.0 {
                return Ok(max);
            }
            n += 1;
            if n > MAX_N {
                return Err(Error::Config(format!(
                    "δ({}) did not converge within {} records",
                    k, MAX_N
                )));
            }
        }
    }
}

fn validate(epsilon: f64, delta: f64) -> Result<()> {
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(Error::Config(format!(
            "Differential privacy requires ε > 0, got {}",
            epsilon
        )));
    }
    if !(delta > 0.0 && delta < 1.0) {
        return Err(Error::Config(format!(
            "Differential privacy requires 0 < δ < 1, got {}",
            delta
        )));
    }
    Ok(())
}

/// Smallest `k` (and the matching `β`) for which SDGS satisfies (ε, δ)-DP.
pub fn derive_dp_parameters(epsilon: f64, delta: f64) -> Result<DpParameters> {
    validate(epsilon, delta)?;
    let mut search = DeltaSearch::new(epsilon);
    for k in 1..=MAX_K {
        if search.delta(k)? <= delta {
            return Ok(DpParameters {
                k,
                beta: search.beta,
            });
        }
    }
    Err(Error::Config(format!(
        "No class size up to {} satisfies ({}, {})-differential privacy",
        MAX_K, epsilon, delta
    )))
}

/// Draw the record subset: every record independently with probability `beta`.
///
/// Deterministic mode seeds a `StdRng`; otherwise the operating system's
/// RNG is used.
pub fn sample_subset(record_count: usize, beta: f64, random: &RandomConfig) -> Result<DataSubset> {
    if !(0.0..=1.0).contains(&beta) {
        return Err(Error::Config(format!(
            "Sampling probability must be in [0, 1], got {}",
            beta
        )));
    }
    let members = if random.deterministic {
        draw(&mut StdRng::seed_from_u64(random.seed), record_count, beta)
    } else {
        draw(&mut OsRng, record_count, beta)
    };
    Ok(DataSubset::from_members(members))
}

fn draw<R: Rng>(rng: &mut R, record_count: usize, beta: f64) -> Vec<bool> {
    (0..record_count).map(|_| rng.gen_bool(beta)).collect()
}
