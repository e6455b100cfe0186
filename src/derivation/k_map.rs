//! k-map class size estimation
//!
//! A sample class of size `c` corresponds to a population cell whose size
//! is modelled as `Poisson(k · π)`, π being the sampling fraction. The
//! derived sample threshold is the smallest `c + 1` such that a cell of
//! population size `k` would be sampled at most `c` times with probability
//! at least `1 − α`.

use crate::error::{Error, Result};
use crate::numeric::probability::poisson_pmf;
use serde::Serialize;

/// Derived sample class size and the estimator's type-I error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KMapEstimate {
    pub k: usize,
    pub type_one_error: f64,
}

impl KMapEstimate {
    /// Estimate that keeps the population threshold as is.
    pub fn exact(k: usize) -> Self {
        Self {
            k,
            type_one_error: 0.0,
        }
    }
}

fn validate(k: usize, sampling_fraction: f64, significance: f64) -> Result<()> {
    if k == 0 {
        return Err(Error::Config("k-map requires k >= 1".to_string()));
    }
    if !(sampling_fraction > 0.0 && sampling_fraction <= 1.0) {
        return Err(Error::Config(format!(
            "Sampling fraction must be in (0, 1], got {}",
            sampling_fraction
        )));
    }
    if !(significance > 0.0 && significance < 1.0) {
        return Err(Error::Config(format!(
            "Significance level must be in (0, 1), got {}",
            significance
        )));
    }
    Ok(())
}

/// Poisson estimator.
pub fn poisson_estimate(k: usize, sampling_fraction: f64, significance: f64) -> Result<KMapEstimate> {
    validate(k, sampling_fraction, significance)?;
    let lambda = k as f64 * sampling_fraction;
    let mut cdf = 0.0;
    for c in 0..k {
        cdf += poisson_pmf(c as u64, lambda);
        if c + 1 >= k {
            break;
        }
        if cdf >= 1.0 - significance {
            return Ok(KMapEstimate {
                k: c + 1,
                type_one_error: (1.0 - cdf).max(0.0),
            });
        }
    }
    Ok(KMapEstimate::exact(k))
}

/// Zero-truncated Poisson estimator: only cells with at least one sampled
/// record are observable.
pub fn zero_truncated_poisson_estimate(
    k: usize,
    sampling_fraction: f64,
    significance: f64,
) -> Result<KMapEstimate> {
    validate(k, sampling_fraction, significance)?;
    let lambda = k as f64 * sampling_fraction;
    let empty = poisson_pmf(0, lambda);
    let observable = 1.0 - empty;
    if observable <= 0.0 {
        return Ok(KMapEstimate::exact(k));
    }
    let mut cdf = empty;
    for c in 1..k {
        cdf += poisson_pmf(c as u64, lambda);
        if c + 1 >= k {
            break;
        }
        let conditional = (cdf - empty) / observable;
        if conditional >= 1.0 - significance {
            return Ok(KMapEstimate {
                k: c + 1,
                type_one_error: (1.0 - conditional).max(0.0),
            });
        }
    }
    Ok(KMapEstimate::exact(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poisson_estimate() {
        // λ = 0.5: P(X <= 2) = 0.9856
        let estimate = poisson_estimate(5, 0.1, 0.05).unwrap();
        assert_eq!(estimate.k, 3);
        assert!(estimate.type_one_error > 0.0 && estimate.type_one_error <= 0.05);
        assert!((estimate.type_one_error - 0.0144).abs() < 1e-3);
    }

    #[test]
    fn test_zero_truncated_estimate() {
        // P(X <= 2 | X >= 1) = 0.9634
        let estimate = zero_truncated_poisson_estimate(5, 0.1, 0.05).unwrap();
        assert_eq!(estimate.k, 3);
        assert!((estimate.type_one_error - 0.0366).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_capped_at_k() {
        // full sample: λ = 3, P(X <= 1) is far below 0.95
        assert_eq!(poisson_estimate(3, 1.0, 0.05).unwrap(), KMapEstimate::exact(3));
        assert_eq!(
            zero_truncated_poisson_estimate(3, 1.0, 0.05).unwrap(),
            KMapEstimate::exact(3)
        );
        assert_eq!(poisson_estimate(1, 0.01, 0.05).unwrap(), KMapEstimate::exact(1));
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert!(poisson_estimate(0, 0.5, 0.05).is_err());
        assert!(poisson_estimate(5, 0.0, 0.05).is_err());
        assert!(poisson_estimate(5, 1.5, 0.05).is_err());
        assert!(zero_truncated_poisson_estimate(5, 0.5, 1.0).is_err());
    }
}
