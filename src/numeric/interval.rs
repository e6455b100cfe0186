//! Outward-rounded interval arithmetic
//!
//! Every operation widens its result outward so the true real-valued result
//! is always enclosed: one ulp on each side for the correctly rounded
//! arithmetic operators, two for `ln`, which libm only computes to within an
//! ulp. Comparisons return `None` when the
//! intervals overlap; callers resolve that conservatively.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A closed interval `[lower, upper]` of `f64` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    lower: f64,
    upper: f64,
}

impl Interval {
    /// Create an interval from its bounds.
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(lower <= upper || lower.is_nan() || upper.is_nan());
        Self { lower, upper }
    }

    /// Degenerate interval `[value, value]` for an exactly representable value.
    pub fn exact(value: f64) -> Self {
        Self::new(value, value)
    }

    /// Enclosure of a value that is itself the result of a rounded computation.
    pub fn around(value: f64) -> Self {
        Self::new(next_down(value), next_up(value))
    }

    /// Enclosure of `numerator / denominator` for exact integer counts.
    pub fn ratio(numerator: usize, denominator: usize) -> Self {
        Self::exact(numerator as f64) / Self::exact(denominator as f64)
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Whether the interval contains zero.
    pub fn contains_zero(&self) -> bool {
        self.lower <= 0.0 && self.upper >= 0.0
    }

    /// Natural logarithm. Non-positive lower bounds map to `-inf`.
    pub fn ln(self) -> Self {
        let lower = if self.lower <= 0.0 {
            f64::NEG_INFINITY
        } else {
            next_down(next_down(self.lower.ln()))
        };
        let upper = if self.upper <= 0.0 {
            f64::NEG_INFINITY
        } else {
            next_up(next_up(self.upper.ln()))
        };
        Self::new(lower, upper)
    }

    /// Base-2 logarithm.
    pub fn log2(self) -> Self {
        self.ln() / Self::around(std::f64::consts::LN_2)
    }

    /// Absolute value.
    pub fn abs(self) -> Self {
        if self.lower >= 0.0 {
            self
        } else if self.upper <= 0.0 {
            -self
        } else {
            Self::new(0.0, (-self.lower).max(self.upper))
        }
    }

    /// Pointwise minimum of two intervals.
    pub fn min(self, other: Self) -> Self {
        Self::new(self.lower.min(other.lower), self.upper.min(other.upper))
    }

    /// `Some(true)` if every value of `self` is `<=` every value of `other`,
    /// `Some(false)` if every value is greater, `None` if undecidable.
    pub fn le(&self, other: &Self) -> Option<bool> {
        if self.upper <= other.lower {
            Some(true)
        } else if self.lower > other.upper {
            Some(false)
        } else {
            None
        }
    }

    /// Strict variant of [`Interval::le`].
    pub fn lt(&self, other: &Self) -> Option<bool> {
        if self.upper < other.lower {
            Some(true)
        } else if self.lower >= other.upper {
            Some(false)
        } else {
            None
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

impl Neg for Interval {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.upper, -self.lower)
    }
}

impl Add for Interval {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            next_down(self.lower + rhs.lower),
            next_up(self.upper + rhs.upper),
        )
    }
}

impl Sub for Interval {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(
            next_down(self.lower - rhs.upper),
            next_up(self.upper - rhs.lower),
        )
    }
}

impl Mul for Interval {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let products = [
            self.lower * rhs.lower,
            self.lower * rhs.upper,
            self.upper * rhs.lower,
            self.upper * rhs.upper,
        ];
        bounds_of(&products)
    }
}

impl Div for Interval {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        if rhs.contains_zero() {
            return Self::new(f64::NEG_INFINITY, f64::INFINITY);
        }
        let quotients = [
            self.lower / rhs.lower,
            self.lower / rhs.upper,
            self.upper / rhs.lower,
            self.upper / rhs.upper,
        ];
        bounds_of(&quotients)
    }
}

fn bounds_of(values: &[f64; 4]) -> Interval {
    let lower = values.iter().copied().fold(f64::INFINITY, f64::min);
    let upper = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Interval::new(next_down(lower), next_up(upper))
}

/// Smallest `f64` strictly greater than `x`.
pub fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits + 1)
    } else {
        f64::from_bits(bits - 1)
    }
}

/// Largest `f64` strictly smaller than `x`.
pub fn next_down(x: f64) -> f64 {
    -next_up(-x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_up_down() {
        assert!(next_up(1.0) > 1.0);
        assert!(next_down(1.0) < 1.0);
        assert!(next_up(0.0) > 0.0);
        assert!(next_down(0.0) < 0.0);
        assert!(next_up(-1.0) > -1.0);
        assert_eq!(next_up(f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_ratio_encloses_value() {
        let third = Interval::ratio(1, 3);
        assert!(third.lower() <= 1.0 / 3.0);
        assert!(third.upper() >= 1.0 / 3.0);
        assert!(third.lower() < third.upper());
    }

    #[test]
    fn test_arithmetic_encloses() {
        let a = Interval::exact(0.1);
        let b = Interval::exact(0.2);
        let sum = a + b;
        assert!(sum.lower() <= 0.30000000000000004);
        assert!(sum.upper() >= 0.3);

        let diff = b - a;
        assert!(diff.lower() <= 0.1 && diff.upper() >= 0.1);

        let prod = Interval::new(-2.0, 3.0) * Interval::new(4.0, 5.0);
        assert!(prod.lower() <= -10.0 && prod.upper() >= 15.0);
    }

    #[test]
    fn test_division_by_zero_interval_is_unbounded() {
        let q = Interval::exact(1.0) / Interval::new(-1.0, 1.0);
        assert_eq!(q.lower(), f64::NEG_INFINITY);
        assert_eq!(q.upper(), f64::INFINITY);
    }

    #[test]
    fn test_ln_of_zero() {
        let l = Interval::new(0.0, 1.0).ln();
        assert_eq!(l.lower(), f64::NEG_INFINITY);
        assert!(l.upper() >= 0.0);
    }

    #[test]
    fn test_ln_widens_two_ulps() {
        for value in [0.25f64, 0.3, 1.0 / 3.0, 2.0, 1e-12] {
            let computed = value.ln();
            let l = Interval::exact(value).ln();
            assert!(l.lower() <= next_down(next_down(computed)));
            assert!(l.upper() >= next_up(next_up(computed)));
        }
        // log2 inherits the wider enclosure
        let two = Interval::exact(2.0).log2();
        assert!(two.lower() < 1.0 && two.upper() > 1.0);
    }

    #[test]
    fn test_abs() {
        assert_eq!(Interval::new(-3.0, -1.0).abs(), Interval::new(1.0, 3.0));
        assert_eq!(Interval::new(-1.0, 2.0).abs(), Interval::new(0.0, 2.0));
        assert_eq!(Interval::new(1.0, 2.0).abs(), Interval::new(1.0, 2.0));
    }

    #[test]
    fn test_comparisons() {
        let small = Interval::new(0.0, 1.0);
        let large = Interval::new(2.0, 3.0);
        let overlap = Interval::new(0.5, 2.5);
        assert_eq!(small.le(&large), Some(true));
        assert_eq!(large.le(&small), Some(false));
        assert_eq!(small.le(&overlap), None);
        assert_eq!(small.lt(&large), Some(true));
        assert_eq!(Interval::exact(1.0).lt(&Interval::exact(1.0)), Some(false));
        assert_eq!(Interval::exact(1.0).le(&Interval::exact(1.0)), Some(true));
    }
}
