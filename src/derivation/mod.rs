//! Parameter derivation
//!
//! Translates high-level privacy budgets into the low-level thresholds the
//! per-class tests evaluate:
//!
//! - [`dp`]: (ε, δ)-differential privacy → minimal class size `k` and
//!   sampling probability `β`
//! - [`k_map`]: target population cell size → sample class size
//! - [`game`]: adversary gain and cost → no-attack class size

pub mod dp;
pub mod game;
pub mod k_map;

pub use dp::{derive_dp_parameters, sample_subset, DpParameters};
pub use game::no_attack_k;
pub use k_map::{poisson_estimate, zero_truncated_poisson_estimate, KMapEstimate};
