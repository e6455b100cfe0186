//! Privacy criteria
//!
//! Every model has a two-phase lifecycle. A [`PrivacyModel`] holds the
//! validated configuration; [`PrivacyModel::initialize`] reads the whole
//! table once and yields an immutable [`Criterion`] that can be evaluated on
//! many lattice nodes concurrently.
//!
//! ## Disciplines
//!
//! ```text
//!                       PrivacyModel (config)
//!                               │ initialize(&DataContext, &Settings)
//!                               ▼
//!                          Criterion
//!        ┌──────────────┬───────┴──────┬──────────────────┐
//!   ExplicitPerClass ImplicitPerClass Distribution       Matrix
//!        └──── is_anonymous ───┘  enforce_distribution  enforce_matrix
//! ```
//!
//! Calling the operation of another discipline fails with
//! [`Error::Discipline`].

pub mod b_likeness;
pub mod d_disclosure;
pub mod d_presence;
pub mod differential;
pub mod game_theoretic;
pub mod k_anonymity;
pub mod k_map;
pub mod l_diversity;
pub mod requirements;
pub mod risk;
pub mod t_closeness;
pub mod unique_keys;

pub use b_likeness::{BasicBLikeness, EnhancedBLikeness};
pub use d_disclosure::DDisclosurePrivacy;
pub use d_presence::DPresence;
pub use differential::EdDifferentialPrivacy;
pub use game_theoretic::{AttackerModel, CostBenefit, Profitability};
pub use k_anonymity::KAnonymity;
pub use k_map::{KMap, KMapEstimator};
pub use l_diversity::{DistinctLDiversity, EntropyLDiversity, RecursiveClDiversity};
pub use requirements::Requirements;
pub use risk::{AverageReidentificationRisk, PopulationUniqueness, SampleUniqueness};
pub use t_closeness::{EqualDistanceTCloseness, HierarchicalDistanceTCloseness, OrderedDistanceTCloseness};
pub use unique_keys::UniqueKeySuppression;

use crate::config::Settings;
use crate::data::{
    ClassDistribution, DataContext, DataSubset, EnforcementOutcome, EquivalenceClass,
    RecordMatrix, RetainedView, SearchStrategy, SensitiveAttribute, Transformation,
};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// How a criterion is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// Per-class test reading the sensitive-value distribution
    ExplicitPerClass,
    /// Per-class test reading only counts
    ImplicitPerClass,
    /// Global condition enforced by suppressing whole classes
    Distribution,
    /// Global condition enforced by suppressing individual rows
    Matrix,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExplicitPerClass => "explicit per-class",
            Self::ImplicitPerClass => "implicit per-class",
            Self::Distribution => "distribution enforcement",
            Self::Matrix => "matrix enforcement",
        };
        f.write_str(name)
    }
}

/// A configured privacy model.
///
/// Everything except [`PrivacyModel::initialize`] is a pure function of the
/// configuration and may be called before the job has seen any data.
pub trait PrivacyModel: Send + Sync + fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Human-readable description including parameters.
    fn render(&self) -> String;

    fn discipline(&self) -> Discipline;

    /// Statistics the grouping engine must materialize for this model.
    fn requirements(&self) -> Requirements;

    /// Whether anonymity is preserved by further generalization.
    fn is_monotonic_with_generalization(&self) -> bool;

    /// Whether anonymity is preserved by further suppression.
    fn is_monotonic_with_suppression(&self) -> bool;

    fn is_local_recoding_supported(&self) -> bool {
        true
    }

    /// Precompute whole-table caches and derived parameters.
    fn initialize(&self, context: &DataContext, settings: &Settings) -> Result<Criterion>;
}

/// Per-class test of an initialized criterion.
pub trait ClassCriterion: Send + Sync + fmt::Debug {
    /// Whether one (non-outlier) class satisfies the criterion at `node`.
    fn is_anonymous(
        &self,
        node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool>;
}

/// Global condition over the retained classes of a node.
pub trait DistributionCriterion: Send + Sync + fmt::Debug {
    /// Risk contribution of one class; higher is suppressed first.
    fn risk(&self, entry: &EquivalenceClass) -> f64;

    /// Whether the retained classes satisfy the condition.
    fn is_satisfied(&self, retained: &RetainedView<'_>) -> bool;

    fn strategy(&self) -> SearchStrategy {
        SearchStrategy::Binary
    }
}

/// Global condition enforced row by row.
pub trait MatrixCriterion: Send + Sync + fmt::Debug {
    fn enforce(
        &self,
        matrix: &mut RecordMatrix,
        max_suppressed: usize,
        interrupt: &InterruptFlag,
    ) -> Result<EnforcementOutcome>;
}

#[derive(Debug)]
enum Evaluator {
    ExplicitPerClass(Box<dyn ClassCriterion>),
    ImplicitPerClass(Box<dyn ClassCriterion>),
    Distribution(Box<dyn DistributionCriterion>),
    Matrix(Box<dyn MatrixCriterion>),
}

/// An initialized, immutable criterion.
#[derive(Debug)]
pub struct Criterion {
    name: &'static str,
    description: String,
    requirements: Requirements,
    monotonic_with_generalization: bool,
    monotonic_with_suppression: bool,
    local_recoding: bool,
    evaluator: Evaluator,
    subset: Option<DataSubset>,
    parameters: BTreeMap<&'static str, f64>,
}

impl Criterion {
    fn from_model(model: &dyn PrivacyModel, evaluator: Evaluator) -> Self {
        Self {
            name: model.name(),
            description: model.render(),
            requirements: model.requirements(),
            monotonic_with_generalization: model.is_monotonic_with_generalization(),
            monotonic_with_suppression: model.is_monotonic_with_suppression(),
            local_recoding: model.is_local_recoding_supported(),
            evaluator,
            subset: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Per-class criterion that reads sensitive-value distributions.
    pub fn explicit(model: &dyn PrivacyModel, test: impl ClassCriterion + 'static) -> Self {
        Self::from_model(model, Evaluator::ExplicitPerClass(Box::new(test)))
    }

    /// Per-class criterion that reads only counts.
    pub fn implicit(model: &dyn PrivacyModel, test: impl ClassCriterion + 'static) -> Self {
        Self::from_model(model, Evaluator::ImplicitPerClass(Box::new(test)))
    }

    pub fn distribution(
        model: &dyn PrivacyModel,
        condition: impl DistributionCriterion + 'static,
    ) -> Self {
        Self::from_model(model, Evaluator::Distribution(Box::new(condition)))
    }

    pub fn matrix(model: &dyn PrivacyModel, condition: impl MatrixCriterion + 'static) -> Self {
        Self::from_model(model, Evaluator::Matrix(Box::new(condition)))
    }

    /// Attach the record subset this criterion is defined on.
    pub fn with_subset(mut self, subset: DataSubset) -> Self {
        self.subset = Some(subset);
        self
    }

    /// Record a derived parameter (k, beta, type-I error, ...).
    pub fn with_parameter(mut self, name: &'static str, value: f64) -> Self {
        self.parameters.insert(name, value);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn render(&self) -> &str {
        &self.description
    }

    pub fn discipline(&self) -> Discipline {
        match self.evaluator {
            Evaluator::ExplicitPerClass(_) => Discipline::ExplicitPerClass,
            Evaluator::ImplicitPerClass(_) => Discipline::ImplicitPerClass,
            Evaluator::Distribution(_) => Discipline::Distribution,
            Evaluator::Matrix(_) => Discipline::Matrix,
        }
    }

    pub fn requirements(&self) -> Requirements {
        self.requirements
    }

    pub fn is_monotonic_with_generalization(&self) -> bool {
        self.monotonic_with_generalization
    }

    pub fn is_monotonic_with_suppression(&self) -> bool {
        self.monotonic_with_suppression
    }

    pub fn is_local_recoding_supported(&self) -> bool {
        self.local_recoding
    }

    /// Research subset or sampled subset, if the criterion is defined on one.
    pub fn subset(&self) -> Option<&DataSubset> {
        self.subset.as_ref()
    }

    /// Derived parameter by name.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    pub fn parameters(&self) -> &BTreeMap<&'static str, f64> {
        &self.parameters
    }

    /// Per-class evaluation. Outlier entries always pass.
    pub fn is_anonymous(
        &self,
        node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool> {
        match &self.evaluator {
            Evaluator::ExplicitPerClass(test) | Evaluator::ImplicitPerClass(test) => {
                interrupt.check()?;
                if entry.is_outlier() {
                    return Ok(true);
                }
                test.is_anonymous(node, entry, interrupt)
            }
            _ => Err(self.wrong_discipline("is_anonymous")),
        }
    }

    /// Suppress classes of `distribution` until the condition holds.
    pub fn enforce_distribution(
        &self,
        distribution: &mut ClassDistribution,
        max_suppressed: usize,
        interrupt: &InterruptFlag,
    ) -> Result<EnforcementOutcome> {
        match &self.evaluator {
            Evaluator::Distribution(condition) => {
                let ranking = distribution.rank_by(|entry| condition.risk(entry));
                distribution.suppress_until(
                    &ranking,
                    |retained| condition.is_satisfied(retained),
                    max_suppressed,
                    condition.strategy(),
                    interrupt,
                )
            }
            _ => Err(self.wrong_discipline("enforce_distribution")),
        }
    }

    /// Suppress rows of `matrix` until the condition holds.
    pub fn enforce_matrix(
        &self,
        matrix: &mut RecordMatrix,
        max_suppressed: usize,
        interrupt: &InterruptFlag,
    ) -> Result<EnforcementOutcome> {
        match &self.evaluator {
            Evaluator::Matrix(condition) => condition.enforce(matrix, max_suppressed, interrupt),
            _ => Err(self.wrong_discipline("enforce_matrix")),
        }
    }

    fn wrong_discipline(&self, operation: &'static str) -> Error {
        Error::Discipline {
            criterion: self.description.clone(),
            operation,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Resolve a sensitive attribute by name.
pub(crate) fn sensitive_attribute<'a>(
    context: &'a DataContext,
    name: &str,
) -> Result<(usize, &'a SensitiveAttribute)> {
    context
        .sensitive_index(name)
        .and_then(|index| context.sensitive(index).map(|attribute| (index, attribute)))
        .ok_or_else(|| Error::Config(format!("Unknown sensitive attribute '{}'", name)))
}

/// Table-wide relative frequencies of one attribute, by value code.
pub(crate) fn table_frequencies(attribute: &SensitiveAttribute) -> BTreeMap<u32, f64> {
    attribute
        .frequencies()
        .iter()
        .map(|(value, _)| (value, attribute.frequency(value)))
        .collect()
}
