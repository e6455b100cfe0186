//! Risk-based models enforced over the whole class distribution
//!
//! These models state a global condition rather than a per-class test.
//! Enforcement suppresses the riskiest classes first until the condition
//! holds (see [`crate::data::ClassDistribution::suppress_until`]).

use super::{Criterion, Discipline, DistributionCriterion, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, EquivalenceClass, RetainedView};
use crate::error::{Error, Result};
use crate::numeric::Interval;

fn validate_threshold(model: &str, threshold: f64) -> Result<()> {
    if !(0.0..1.0).contains(&threshold) {
        return Err(Error::Config(format!(
            "{} threshold must be in [0, 1), got {}",
            model, threshold
        )));
    }
    Ok(())
}

/// Prosecutor risk of one record in `entry`; empty classes go first.
fn reidentification_risk(entry: &EquivalenceClass) -> f64 {
    match entry.count() {
        0 => f64::INFINITY,
        count => 1.0 / count as f64,
    }
}

fn sample_uniques(retained: &RetainedView<'_>) -> usize {
    retained.iter().filter(|entry| entry.count() == 1).count()
}

/// Average re-identification risk: retained classes per retained record.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageReidentificationRisk {
    threshold: f64,
    reliable: bool,
}

impl AverageReidentificationRisk {
    pub fn new(threshold: f64) -> Result<Self> {
        validate_threshold("Average risk", threshold)?;
        Ok(Self {
            threshold,
            reliable: false,
        })
    }

    /// Compare with interval arithmetic; ambiguous results fail.
    pub fn reliable(mut self) -> Self {
        self.reliable = true;
        self
    }
}

#[derive(Debug)]
struct AverageRiskCondition {
    threshold: f64,
    reliable: bool,
}

impl DistributionCriterion for AverageRiskCondition {
    fn risk(&self, entry: &EquivalenceClass) -> f64 {
        reidentification_risk(entry)
    }

    fn is_satisfied(&self, retained: &RetainedView<'_>) -> bool {
        if retained.record_count() == 0 {
            return true;
        }
        if self.reliable {
            Interval::ratio(retained.class_count(), retained.record_count())
                .le(&Interval::exact(self.threshold))
                .unwrap_or(false)
        } else {
            retained.class_count() as f64 / retained.record_count() as f64 <= self.threshold
        }
    }
}

impl PrivacyModel for AverageReidentificationRisk {
    fn name(&self) -> &'static str {
        "average-reidentification-risk"
    }

    fn render(&self) -> String {
        let mode = if self.reliable { "reliable " } else { "" };
        format!("{}average re-identification risk <= {}", mode, self.threshold)
    }

    fn discipline(&self) -> Discipline {
        Discipline::Distribution
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

    fn initialize(&self, _context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        Ok(Criterion::distribution(
            self,
            AverageRiskCondition {
                threshold: self.threshold,
                reliable: self.reliable,
            },
        ))
    }
}

/// Share of retained records that are unique in the sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleUniqueness {
    threshold: f64,
}

impl SampleUniqueness {
    pub fn new(threshold: f64) -> Result<Self> {
        validate_threshold("Sample uniqueness", threshold)?;
        Ok(Self { threshold })
    }
}

#[derive(Debug)]
struct SampleUniquenessCondition {
    threshold: f64,
}

impl DistributionCriterion for SampleUniquenessCondition {
    fn risk(&self, entry: &EquivalenceClass) -> f64 {
        reidentification_risk(entry)
    }

    fn is_satisfied(&self, retained: &RetainedView<'_>) -> bool {
        if retained.record_count() == 0 {
            return true;
        }
        sample_uniques(retained) as f64 / retained.record_count() as f64 <= self.threshold
    }
}

impl PrivacyModel for SampleUniqueness {
    fn name(&self) -> &'static str {
        "sample-uniqueness"
    }

    fn render(&self) -> String {
        format!("sample uniqueness <= {}", self.threshold)
    }

    fn discipline(&self) -> Discipline {
        Discipline::Distribution
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

    fn initialize(&self, _context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        Ok(Criterion::distribution(
            self,
            SampleUniquenessCondition {
                threshold: self.threshold,
            },
        ))
    }
}

/// Estimated share of the population that is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationUniqueness {
    threshold: f64,
}

impl PopulationUniqueness {
    pub fn new(threshold: f64) -> Result<Self> {
        validate_threshold("Population uniqueness", threshold)?;
        Ok(Self { threshold })
    }
}

#[derive(Debug)]
struct PopulationUniquenessCondition {
    threshold: f64,
    /// P(unique in population | unique in sample)
    unique_probability: f64,
    population_size: f64,
}

impl DistributionCriterion for PopulationUniquenessCondition {
    fn risk(&self, entry: &EquivalenceClass) -> f64 {
        reidentification_risk(entry)
    }

    fn is_satisfied(&self, retained: &RetainedView<'_>) -> bool {
        let estimated = sample_uniques(retained) as f64 * self.unique_probability;
        estimated / self.population_size <= self.threshold
    }
}

impl PrivacyModel for PopulationUniqueness {
    fn name(&self) -> &'static str {
        "population-uniqueness"
    }

    fn render(&self) -> String {
        format!("population uniqueness <= {}", self.threshold)
    }

    fn discipline(&self) -> Discipline {
        Discipline::Distribution
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

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let (population_size, pi) = match (context.population_size(), context.sampling_fraction()) {
            (Some(size), Some(pi)) if size > 0 => (size as f64, pi),
            _ => {
                return Err(Error::Config(
                    "Population uniqueness requires a population size".to_string(),
                ))
            }
        };
        let unique_probability = if pi > 0.0 {
            (-(1.0 - pi) / pi).exp()
        } else {
            0.0
        };
        tracing::debug!(pi, unique_probability, "Population uniqueness model");
        Ok(Criterion::distribution(
            self,
            PopulationUniquenessCondition {
                threshold: self.threshold,
                unique_probability,
                population_size,
            },
        )
        .with_parameter("sampling_fraction", pi))
    }
}
