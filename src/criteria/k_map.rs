//! k-map

use super::k_anonymity::{MinimumClassSize, MinimumPopulationSize};
use super::{Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::DataContext;
use crate::derivation::k_map::{poisson_estimate, zero_truncated_poisson_estimate, KMapEstimate};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// How population cell sizes are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KMapEstimator {
    /// Population counts are known from the research subset's superset
    #[default]
    Exact,
    /// Poisson model of the population cell size
    Poisson { significance: f64 },
    /// Zero-truncated Poisson model of the population cell size
    ZeroTruncatedPoisson { significance: f64 },
}

/// Every class maps to at least `k` individuals of the population.
#[derive(Debug, Clone, PartialEq)]
pub struct KMap {
    k: usize,
    estimator: KMapEstimator,
}

impl KMap {
    pub fn new(k: usize, estimator: KMapEstimator) -> Result<Self> {
        if k == 0 {
            return Err(Error::Config("k-map requires k >= 1".to_string()));
        }
        match estimator {
            KMapEstimator::Poisson { significance }
            | KMapEstimator::ZeroTruncatedPoisson { significance }
                if !(significance > 0.0 && significance < 1.0) =>
            {
                return Err(Error::Config(format!(
                    "k-map significance must be in (0, 1), got {}",
                    significance
                )));
            }
            _ => {}
        }
        Ok(Self { k, estimator })
    }

    fn estimate(&self, context: &DataContext) -> Result<KMapEstimate> {
        let sampling_fraction = || {
            context.sampling_fraction().ok_or_else(|| {
                Error::Config("Estimated k-map requires a population size".to_string())
            })
        };
        match self.estimator {
            KMapEstimator::Exact => Ok(KMapEstimate::exact(self.k)),
            KMapEstimator::Poisson { significance } => {
                poisson_estimate(self.k, sampling_fraction()?, significance)
            }
            KMapEstimator::ZeroTruncatedPoisson { significance } => {
                zero_truncated_poisson_estimate(self.k, sampling_fraction()?, significance)
            }
        }
    }
}

impl PrivacyModel for KMap {
    fn name(&self) -> &'static str {
        "k-map"
    }

    fn render(&self) -> String {
        match self.estimator {
            KMapEstimator::Exact => format!("{}-map", self.k),
            KMapEstimator::Poisson { significance } => {
                format!("{}-map (poisson, α={})", self.k, significance)
            }
            KMapEstimator::ZeroTruncatedPoisson { significance } => {
                format!("{}-map (zero-truncated poisson, α={})", self.k, significance)
            }
        }
    }

    fn discipline(&self) -> Discipline {
        Discipline::ImplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        match self.estimator {
            KMapEstimator::Exact => Requirements::COUNT | Requirements::POPULATION_COUNT,
            _ => Requirements::COUNT,
        }
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let estimate = self.estimate(context)?;
        tracing::debug!(
            k = self.k,
            derived_k = estimate.k,
            type_one_error = estimate.type_one_error,
            "Derived k-map class size"
        );
        let criterion = match self.estimator {
            KMapEstimator::Exact => {
                let subset = context.research_subset().cloned().ok_or_else(|| {
                    Error::Config("Exact k-map requires a research subset".to_string())
                })?;
                Criterion::implicit(self, MinimumPopulationSize { k: self.k }).with_subset(subset)
            }
            _ => Criterion::implicit(self, MinimumClassSize { k: estimate.k }),
        };
        Ok(criterion
            .with_parameter("k", estimate.k as f64)
            .with_parameter("type_one_error", estimate.type_one_error))
    }
}
