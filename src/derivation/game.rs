//! No-attack class size for the game-theoretic models

use crate::error::{Error, Result};

/// Smallest class size at which an attack no longer pays off.
///
/// An attack on a class of size `k` yields `gain / k − cost`, so the
/// publisher is safe from `k = ⌈gain / cost⌉` on.
pub fn no_attack_k(adversary_gain: f64, adversary_cost: f64) -> Result<usize> {
    if !adversary_gain.is_finite() || adversary_gain < 0.0 {
        return Err(Error::Config(format!(
            "Adversary gain must be a finite non-negative amount, got {}",
            adversary_gain
        )));
    }
    if !adversary_cost.is_finite() || adversary_cost < 0.0 {
        return Err(Error::Config(format!(
            "Adversary cost must be a finite non-negative amount, got {}",
            adversary_cost
        )));
    }
    if adversary_gain == 0.0 {
        return Ok(1);
    }
    if adversary_cost == 0.0 {
        return Err(Error::Config(
            "A free attack with positive gain cannot be prevented by any class size".to_string(),
        ));
    }
    let k = (adversary_gain / adversary_cost).ceil();
    if k > u32::MAX as f64 {
        return Err(Error::Config(format!(
            "Derived class size {} is out of range",
            k
        )));
    }
    Ok((k as usize).max(1))
}
