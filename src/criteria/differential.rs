//! (ε, δ)-differential privacy

use super::k_anonymity::MinimumClassSize;
use super::{Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::DataContext;
use crate::derivation::dp::{derive_dp_parameters, sample_subset};
use crate::error::{Error, Result};

/// Differential privacy realized as sampling followed by k-anonymous release.
///
/// Initialization derives `(k, β)` from the budget and samples each record
/// with probability `β`; the grouping engine counts only sampled records
/// (see [`Criterion::subset`]).
#[derive(Debug, Clone, PartialEq)]
pub struct EdDifferentialPrivacy {
    epsilon: f64,
    delta: f64,
}

impl EdDifferentialPrivacy {
    pub fn new(epsilon: f64, delta: f64) -> Result<Self> {
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
        Ok(Self { epsilon, delta })
    }
}

impl PrivacyModel for EdDifferentialPrivacy {
    fn name(&self) -> &'static str {
        "differential-privacy"
    }

    fn render(&self) -> String {
        format!("({}, {})-differential privacy", self.epsilon, self.delta)
    }

    fn discipline(&self) -> Discipline {
        Discipline::ImplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn is_local_recoding_supported(&self) -> bool {
        false
    }

    fn initialize(&self, context: &DataContext, settings: &Settings) -> Result<Criterion> {
        let params = derive_dp_parameters(self.epsilon, self.delta)?;
        let subset = sample_subset(context.record_count(), params.beta, &settings.random)?;
        tracing::info!(
            k = params.k,
            beta = params.beta,
            sampled = subset.size(),
            records = context.record_count(),
            deterministic = settings.random.deterministic,
            "Derived differential privacy parameters"
        );
        Ok(Criterion::implicit(self, MinimumClassSize { k: params.k })
            .with_subset(subset)
            .with_parameter("k", params.k as f64)
            .with_parameter("beta", params.beta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RandomConfig;

    fn settings(seed: u64) -> Settings {
        Settings {
            random: RandomConfig {
                deterministic: true,
                seed,
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_deterministic_initialization_is_reproducible() {
        let ctx = DataContext::builder().records(500).build().unwrap();
        let model = EdDifferentialPrivacy::new(2.0, 1e-5).unwrap();
        let a = model.initialize(&ctx, &settings(7)).unwrap();
        let b = model.initialize(&ctx, &settings(7)).unwrap();
        assert_eq!(a.subset(), b.subset());
        assert_eq!(a.parameter("k"), b.parameter("k"));
        assert_eq!(a.parameter("beta"), b.parameter("beta"));
        assert_eq!(a.subset().map(|s| s.record_count()), Some(500));
        assert!(!a.is_local_recoding_supported());
    }

    #[test]
    fn test_rejects_invalid_budget() {
        assert!(EdDifferentialPrivacy::new(-1.0, 1e-5).is_err());
        assert!(EdDifferentialPrivacy::new(1.0, 2.0).is_err());
    }
}
