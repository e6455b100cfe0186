//! Discrete probability helpers
//!
//! Probabilities are computed in log space and exponentiated as late as
//! possible so large counts do not overflow factorials.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;

const LANCZOS_COEFFICIENTS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural logarithm of the gamma function (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut series = LANCZOS_COEFFICIENTS[0];
    for (i, coefficient) in LANCZOS_COEFFICIENTS.iter().enumerate().skip(1) {
        series += coefficient / (x + i as f64);
    }
    let t = x + LANCZOS_G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `ln(n!)`
pub fn ln_factorial(n: u64) -> f64 {
    if n < 2 {
        return 0.0;
    }
    ln_gamma(n as f64 + 1.0)
}

/// `ln(n choose k)`; `-inf` when `k > n`.
pub fn ln_binomial_coefficient(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// `P[X = k]` for `X ~ Poisson(lambda)`.
pub fn poisson_pmf(k: u64, lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    (k as f64 * lambda.ln() - lambda - ln_factorial(k)).exp()
}

/// `P[X <= k]` for `X ~ Poisson(lambda)`.
pub fn poisson_cdf(k: u64, lambda: f64) -> f64 {
    let sum: f64 = (0..=k).map(|i| poisson_pmf(i, lambda)).sum();
    sum.min(1.0)
}

/// `P[X = k]` for `X ~ Binomial(n, p)`.
pub fn binomial_pmf(n: u64, k: u64, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    (ln_binomial_coefficient(n, k) + k as f64 * p.ln() + (n - k) as f64 * (1.0 - p).ln()).exp()
}

/// `P[X >= from]` for `X ~ Binomial(n, p)`.
///
/// The largest term, at `max(from, mode)`, is evaluated in log space and the
/// others are reached from it by the ratio recurrence
/// `pmf(j+1) = pmf(j) * (n-j)/(j+1) * p/(1-p)`, upward to `n` and downward
/// to `from`. Starting at the peak keeps the seed term from underflowing
/// when `from` lies far below the mode.
pub fn binomial_upper_tail(n: u64, from: u64, p: f64) -> f64 {
    if from > n {
        return 0.0;
    }
    if from == 0 {
        return 1.0;
    }
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let odds = p / (1.0 - p);
    let mode = (((n + 1) as f64 * p).floor() as u64).min(n);
    let start = from.max(mode);
    let peak = binomial_pmf(n, start, p);

    let mut sum = peak;
    let mut term = peak;
    for j in start..n {
        term *= (n - j) as f64 / (j + 1) as f64 * odds;
        sum += term;
    }
    let mut term = peak;
    for j in (from + 1..=start).rev() {
        term *= j as f64 / ((n - j + 1) as f64 * odds);
        sum += term;
    }
    sum.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn test_ln_gamma_matches_factorials() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(2.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-10));
        assert!(close(ln_gamma(11.0), 3_628_800f64.ln(), 1e-9));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln(), 1e-10));
    }

    #[test]
    fn test_poisson() {
        assert!(close(poisson_pmf(0, 2.0), (-2.0f64).exp(), 1e-12));
        assert!(close(poisson_pmf(2, 2.0), 2.0 * (-2.0f64).exp(), 1e-12));
        assert_eq!(poisson_pmf(0, 0.0), 1.0);
        assert_eq!(poisson_pmf(3, 0.0), 0.0);
        let cdf = poisson_cdf(2, 2.0);
        assert!(close(cdf, 5.0 * (-2.0f64).exp(), 1e-12));
        assert!(poisson_cdf(100, 2.0) <= 1.0);
    }

    #[test]
    fn test_binomial_pmf_sums_to_one() {
        let total: f64 = (0..=20).map(|k| binomial_pmf(20, k, 0.3)).sum();
        assert!(close(total, 1.0, 1e-10));
    }

    #[test]
    fn test_binomial_upper_tail() {
        // P[Bin(4, 0.5) >= 3] = (4 + 1) / 16
        assert!(close(binomial_upper_tail(4, 3, 0.5), 5.0 / 16.0, 1e-12));
        assert_eq!(binomial_upper_tail(4, 5, 0.5), 0.0);
        assert_eq!(binomial_upper_tail(4, 0, 0.5), 1.0);
        let direct: f64 = (7..=30).map(|k| binomial_pmf(30, k, 0.2)).sum();
        assert!(close(binomial_upper_tail(30, 7, 0.2), direct, 1e-10));
    }

    #[test]
    fn test_binomial_upper_tail_below_mode() {
        // pmf(2000, 1, 0.5) underflows; the tail is still essentially 1
        assert_eq!(binomial_pmf(2000, 1, 0.5), 0.0);
        assert!(close(binomial_upper_tail(2000, 1, 0.5), 1.0, 1e-9));

        // symmetric around the mode of Bin(2000, 0.5)
        let above = (1.0 - binomial_pmf(2000, 1000, 0.5)) / 2.0;
        assert!(close(binomial_upper_tail(2000, 1001, 0.5), above, 1e-9));
        assert!(close(binomial_upper_tail(2000, 1000, 0.5), 1.0 - above, 1e-9));

        let direct: f64 = (2..=40).map(|k| binomial_pmf(40, k, 0.3)).sum();
        assert!(close(binomial_upper_tail(40, 2, 0.3), direct, 1e-10));
    }
}
