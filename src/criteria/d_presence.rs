//! δ-presence

use super::{ClassCriterion, Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, EquivalenceClass, Transformation};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;

/// Bounds the probability that a population record is in the research subset.
#[derive(Debug, Clone, PartialEq)]
pub struct DPresence {
    d_min: f64,
    d_max: f64,
}

impl DPresence {
    pub fn new(d_min: f64, d_max: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&d_min) || !(0.0..=1.0).contains(&d_max) || d_min > d_max {
            return Err(Error::Config(format!(
                "δ-presence requires 0 <= d_min <= d_max <= 1, got ({}, {})",
                d_min, d_max
            )));
        }
        Ok(Self { d_min, d_max })
    }
}

#[derive(Debug)]
struct PresenceTest {
    d_min: f64,
    d_max: f64,
}

impl ClassCriterion for PresenceTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        _interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let Some(population) = entry.population_count() else {
            return Ok(false);
        };
        if population == 0 {
            return Ok(false);
        }
        let delta = entry.count() as f64 / population as f64;
        Ok(self.d_min <= delta && delta <= self.d_max)
    }
}

impl PrivacyModel for DPresence {
    fn name(&self) -> &'static str {
        "d-presence"
    }

    fn render(&self) -> String {
        format!("({}, {})-presence", self.d_min, self.d_max)
    }

    fn discipline(&self) -> Discipline {
        Discipline::ImplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT | Requirements::POPULATION_COUNT
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    /// Suppressing records can push a class below `d_min`.
    fn is_monotonic_with_suppression(&self) -> bool {
        self.d_min == 0.0
    }

    fn is_local_recoding_supported(&self) -> bool {
        false
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let subset = context.research_subset().cloned().ok_or_else(|| {
            Error::Config("δ-presence requires a research subset".to_string())
        })?;
        Ok(Criterion::implicit(
            self,
            PresenceTest {
                d_min: self.d_min,
                d_max: self.d_max,
            },
        )
        .with_subset(subset))
    }
}
