//! Numeric building blocks shared by the criteria and the derivation routines
//!
//! - [`Interval`]: outward-rounded interval arithmetic for the reliable
//!   (float-robust) criterion variants
//! - [`probability`]: log-gamma, Poisson and binomial probabilities

pub mod interval;
pub mod probability;

pub use interval::Interval;
