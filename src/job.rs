//! Anonymization job lifecycle
//!
//! A job owns the configured models, initializes them exactly once against
//! the whole table and then evaluates lattice nodes. Evaluation takes `&self`,
//! so one initialized job can be shared behind an `Arc` and used from many
//! threads at once.
//!
//! ## Node evaluation
//!
//! ```text
//! classes ──► per-class criteria ──► failing classes become outliers
//!                                            │ (counted against the budget)
//!                                            ▼
//!                              distribution criteria (suppress classes)
//!                                            │
//!                                            ▼
//!             matrix rows of suppressed classes are suppressed first
//!                                            │
//!                                            ▼
//!                                matrix criteria (suppress rows)
//! ```

use crate::config::{JobConfig, Settings};
use crate::criteria::{Criterion, Discipline, PrivacyModel, Requirements};
use crate::data::{
    ClassDistribution, DataContext, DataSubset, EnforcementOutcome, EquivalenceClass,
    RecordMatrix, Transformation,
};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use uuid::Uuid;

/// Criteria produced by initialization, with the table size they saw.
#[derive(Debug)]
struct Initialized {
    criteria: Vec<Criterion>,
    record_count: usize,
}

/// Verdict on one lattice node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeVerdict {
    pub node: Transformation,
    /// Whether every criterion holds within the suppression budget
    pub anonymous: bool,
    /// Per-class result of the per-class criteria, in input order
    pub class_verdicts: Vec<bool>,
    /// Indices of suppressed classes, outliers included
    pub suppressed_classes: Vec<usize>,
    /// Suppressed records after enforcement
    pub suppressed_records: usize,
    pub budget: usize,
    pub budget_exceeded: bool,
}

/// Privacy models applied together to one table.
#[derive(Debug)]
pub struct AnonymizationJob {
    id: Uuid,
    settings: Settings,
    models: Vec<Box<dyn PrivacyModel>>,
    state: OnceLock<Initialized>,
    interrupt: InterruptFlag,
}

impl AnonymizationJob {
    /// Create a job from already validated models.
    pub fn new(settings: Settings, models: Vec<Box<dyn PrivacyModel>>) -> Result<Self> {
        settings.validate()?;
        if models.is_empty() {
            return Err(Error::Config("A job needs at least one criterion".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            settings,
            models,
            state: OnceLock::new(),
            interrupt: InterruptFlag::new(),
        })
    }

    pub fn from_config(config: &JobConfig) -> Result<Self> {
        Self::new(config.settings(), config.build_models()?)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn models(&self) -> &[Box<dyn PrivacyModel>] {
        &self.models
    }

    /// Observe a flag owned by the caller instead of a fresh one.
    pub fn with_interrupt_flag(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Flag shared with every evaluation of this job.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Union of the statistics every model needs from the grouping engine.
    pub fn requirements(&self) -> Requirements {
        self.models
            .iter()
            .fold(Requirements::NONE, |acc, model| acc | model.requirements())
    }

    pub fn is_monotonic_with_generalization(&self) -> bool {
        self.models
            .iter()
            .all(|model| model.is_monotonic_with_generalization())
    }

    pub fn is_monotonic_with_suppression(&self) -> bool {
        self.models
            .iter()
            .all(|model| model.is_monotonic_with_suppression())
    }

    pub fn is_local_recoding_supported(&self) -> bool {
        self.models
            .iter()
            .all(|model| model.is_local_recoding_supported())
    }

    /// Initialize every model against the table. Allowed once per job.
    pub fn initialize(&self, context: &DataContext) -> Result<()> {
        if self.state.get().is_some() {
            return Err(Error::AlreadyInitialized(format!("job {}", self.id)));
        }
        let mut criteria = Vec::with_capacity(self.models.len());
        for model in &self.models {
            self.interrupt.check()?;
            let criterion = model.initialize(context, &self.settings)?;
            tracing::info!(
                job = %self.id,
                criterion = %criterion,
                discipline = %criterion.discipline(),
                requirements = %criterion.requirements(),
                parameters = ?criterion.parameters(),
                "Initialized criterion"
            );
            criteria.push(criterion);
        }
        self.state
            .set(Initialized {
                criteria,
                record_count: context.record_count(),
            })
            .map_err(|_| Error::AlreadyInitialized(format!("job {}", self.id)))
    }

    fn state(&self) -> Result<&Initialized> {
        self.state
            .get()
            .ok_or_else(|| Error::Uninitialized(format!("job {}", self.id)))
    }

    /// Initialized criteria, in configuration order.
    pub fn criteria(&self) -> Result<&[Criterion]> {
        Ok(&self.state()?.criteria)
    }

    /// Subsets the initialized criteria are defined on (research or sampled).
    pub fn data_subsets(&self) -> Result<Vec<&DataSubset>> {
        Ok(self
            .criteria()?
            .iter()
            .filter_map(Criterion::subset)
            .collect())
    }

    /// Suppression budget for a table of `records` rows.
    pub fn max_suppressed(&self, records: usize) -> usize {
        self.settings.suppression.max_suppressed(records)
    }

    /// Whether one class satisfies every per-class criterion.
    pub fn is_anonymous(&self, node: &Transformation, entry: &EquivalenceClass) -> Result<bool> {
        for criterion in self.per_class()? {
            if !criterion.is_anonymous(node, entry, &self.interrupt)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn per_class(&self) -> Result<impl Iterator<Item = &Criterion>> {
        Ok(self.criteria()?.iter().filter(|criterion| {
            matches!(
                criterion.discipline(),
                Discipline::ExplicitPerClass | Discipline::ImplicitPerClass
            )
        }))
    }

    fn with_discipline(&self, discipline: Discipline) -> Result<Vec<&Criterion>> {
        Ok(self
            .criteria()?
            .iter()
            .filter(|criterion| criterion.discipline() == discipline)
            .collect())
    }

    /// Evaluate all criteria on one node.
    ///
    /// `matrix` holds the generalized rows of the node and is required as
    /// soon as one matrix criterion is configured.
    pub fn evaluate_node(
        &self,
        node: &Transformation,
        classes: Vec<EquivalenceClass>,
        matrix: Option<RecordMatrix>,
    ) -> Result<NodeVerdict> {
        let result = self.evaluate(node, classes, matrix);
        if let Err(Error::Interrupted) = &result {
            tracing::warn!(job = %self.id, node = ?node.levels(), "Node evaluation interrupted");
        }
        result
    }

    fn evaluate(
        &self,
        node: &Transformation,
        classes: Vec<EquivalenceClass>,
        matrix: Option<RecordMatrix>,
    ) -> Result<NodeVerdict> {
        let state = self.state()?;
        self.interrupt.check()?;

        let matrix_criteria = self.with_discipline(Discipline::Matrix)?;
        if !matrix_criteria.is_empty() && matrix.is_none() {
            return Err(Error::Config(
                "Matrix criteria need the record matrix of the node".to_string(),
            ));
        }

        let budget = self.max_suppressed(state.record_count);
        let mut class_verdicts = Vec::with_capacity(classes.len());
        let mut entries = Vec::with_capacity(classes.len());
        for entry in classes {
            let anonymous = self.is_anonymous(node, &entry)?;
            class_verdicts.push(anonymous);
            entries.push(if anonymous { entry } else { entry.as_outlier() });
        }

        let mut distribution = ClassDistribution::new(entries);
        let mut verdict = NodeVerdict {
            node: node.clone(),
            anonymous: true,
            class_verdicts,
            suppressed_classes: Vec::new(),
            suppressed_records: distribution.suppressed_records(),
            budget,
            budget_exceeded: false,
        };

        if distribution.suppressed_records() > budget {
            tracing::warn!(
                node = ?node.levels(),
                suppressed = distribution.suppressed_records(),
                budget,
                "Failing classes exceed the suppression budget"
            );
            return Ok(self.finish(verdict, &distribution, None, false));
        }

        for criterion in self.with_discipline(Discipline::Distribution)? {
            let outcome = criterion.enforce_distribution(&mut distribution, budget, &self.interrupt)?;
            if !self.accept(criterion, node, outcome) {
                return Ok(self.finish(verdict, &distribution, None, false));
            }
        }

        let mut matrix = matrix;
        if let Some(matrix) = matrix.as_mut().filter(|_| !matrix_criteria.is_empty()) {
            let suppressed_keys: HashSet<&[u32]> = (0..distribution.len())
                .filter(|&index| distribution.is_suppressed(index))
                .filter_map(|index| distribution.class(index))
                .map(|entry| entry.key().codes())
                .collect();
            matrix.suppress_matching(|row| suppressed_keys.contains(row));

            for criterion in &matrix_criteria {
                let outcome = criterion.enforce_matrix(matrix, budget, &self.interrupt)?;
                if !self.accept(criterion, node, outcome) {
                    return Ok(self.finish(verdict, &distribution, Some(&*matrix), false));
                }
            }
            verdict = self.finish(verdict, &distribution, Some(&*matrix), true);
        } else {
            verdict = self.finish(verdict, &distribution, None, true);
        }

        tracing::debug!(
            node = ?verdict.node.levels(),
            anonymous = verdict.anonymous,
            suppressed_records = verdict.suppressed_records,
            "Evaluated node"
        );
        Ok(verdict)
    }

    fn accept(&self, criterion: &Criterion, node: &Transformation, outcome: EnforcementOutcome) -> bool {
        match outcome {
            EnforcementOutcome::Satisfied {
                suppressed_classes,
                suppressed_records,
            } => {
                tracing::debug!(
                    criterion = %criterion,
                    node = ?node.levels(),
                    suppressed_classes,
                    suppressed_records,
                    "Criterion enforced"
                );
                true
            }
            EnforcementOutcome::BudgetExceeded {
                suppressed_records,
                budget,
            } => {
                tracing::warn!(
                    criterion = %criterion,
                    node = ?node.levels(),
                    suppressed_records,
                    budget,
                    "Suppression budget exhausted"
                );
                false
            }
        }
    }

    fn finish(
        &self,
        mut verdict: NodeVerdict,
        distribution: &ClassDistribution,
        matrix: Option<&RecordMatrix>,
        anonymous: bool,
    ) -> NodeVerdict {
        verdict.anonymous = anonymous;
        verdict.budget_exceeded = !anonymous;
        verdict.suppressed_classes = (0..distribution.len())
            .filter(|&index| distribution.is_suppressed(index))
            .collect();
        verdict.suppressed_records = match matrix {
            Some(matrix) => matrix.suppressed_rows(),
            None => distribution.suppressed_records(),
        };
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuppressionConfig;
    use crate::criteria::{
        AverageReidentificationRisk, DistributionCriterion, EntropyLDiversity, KAnonymity,
        UniqueKeySuppression,
    };
    use crate::data::{Distribution, RetainedView, SearchStrategy, SensitiveAttribute};
    use std::sync::Arc;
    use std::time::Duration;

    fn settings(limit: f64) -> Settings {
        Settings {
            suppression: SuppressionConfig { limit },
            ..Settings::default()
        }
    }

    fn k_anonymity(k: usize) -> Box<dyn PrivacyModel> {
        Box::new(KAnonymity::new(k).unwrap())
    }

    fn context(records: usize) -> DataContext {
        DataContext::builder().records(records).build().unwrap()
    }

    fn classes(counts: &[usize]) -> Vec<EquivalenceClass> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| EquivalenceClass::new(vec![i as u32], count))
            .collect()
    }

    fn node() -> Transformation {
        Transformation::new(vec![1])
    }

    /// Rows grouped by the full key: (0,0,5)x2 (1,0,5)x2 (1,1,5)x1 (0,1,5)x2
    fn matrix_rows() -> Vec<Vec<u32>> {
        vec![
            vec![0, 0, 5],
            vec![0, 0, 5],
            vec![1, 0, 5],
            vec![1, 0, 5],
            vec![1, 1, 5],
            vec![0, 1, 5],
            vec![0, 1, 5],
        ]
    }

    fn matrix_classes() -> Vec<EquivalenceClass> {
        vec![
            EquivalenceClass::new(vec![0, 0, 5], 2),
            EquivalenceClass::new(vec![1, 0, 5], 2),
            EquivalenceClass::new(vec![1, 1, 5], 1),
            EquivalenceClass::new(vec![0, 1, 5], 2),
        ]
    }

    #[test]
    fn test_lifecycle() {
        let job = AnonymizationJob::new(settings(0.0), vec![k_anonymity(2)]).unwrap();
        assert!(matches!(job.criteria(), Err(Error::Uninitialized(_))));
        assert!(matches!(
            job.evaluate_node(&node(), classes(&[2]), None),
            Err(Error::Uninitialized(_))
        ));

        job.initialize(&context(2)).unwrap();
        assert_eq!(job.criteria().unwrap().len(), 1);
        assert!(matches!(
            job.initialize(&context(2)),
            Err(Error::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_empty_job_rejected() {
        assert!(AnonymizationJob::new(Settings::default(), Vec::new()).is_err());
        assert!(AnonymizationJob::new(settings(2.0), vec![k_anonymity(2)]).is_err());
    }

    #[test]
    fn test_aggregates() {
        let job = AnonymizationJob::new(
            settings(0.1),
            vec![
                k_anonymity(2),
                Box::new(UniqueKeySuppression::new(2).unwrap()),
            ],
        )
        .unwrap();
        assert_eq!(job.requirements(), Requirements::COUNT);
        assert!(job.is_monotonic_with_generalization());
        assert!(!job.is_monotonic_with_suppression());
        assert!(!job.is_local_recoding_supported());
        assert_eq!(job.max_suppressed(99), 9);
    }

    #[test]
    fn test_per_class_failures_within_budget() {
        let job = AnonymizationJob::new(settings(0.2), vec![k_anonymity(3)]).unwrap();
        job.initialize(&context(10)).unwrap();
        let verdict = job.evaluate_node(&node(), classes(&[5, 3, 2]), None).unwrap();
        assert!(verdict.anonymous);
        assert_eq!(verdict.class_verdicts, vec![true, true, false]);
        assert_eq!(verdict.suppressed_classes, vec![2]);
        assert_eq!(verdict.suppressed_records, 2);
        assert_eq!(verdict.budget, 2);
    }

    #[test]
    fn test_per_class_failures_over_budget() {
        let job = AnonymizationJob::new(settings(0.1), vec![k_anonymity(3)]).unwrap();
        job.initialize(&context(10)).unwrap();
        let verdict = job.evaluate_node(&node(), classes(&[5, 3, 2]), None).unwrap();
        assert!(!verdict.anonymous);
        assert!(verdict.budget_exceeded);
    }

    #[test]
    fn test_distribution_criterion_after_per_class() {
        // k=2 drops the singleton; 4 classes / 17 records then exceeds 0.2,
        // so the next smallest class is suppressed as well: 3 / 15.
        let job = AnonymizationJob::new(
            settings(0.3),
            vec![
                k_anonymity(2),
                Box::new(AverageReidentificationRisk::new(0.2).unwrap()),
            ],
        )
        .unwrap();
        job.initialize(&context(18)).unwrap();
        let verdict = job
            .evaluate_node(&node(), classes(&[1, 5, 2, 4, 6]), None)
            .unwrap();
        assert!(verdict.anonymous);
        assert_eq!(verdict.suppressed_classes, vec![0, 2]);
        assert_eq!(verdict.suppressed_records, 3);
    }

    #[test]
    fn test_matrix_rows_follow_suppressed_classes() {
        let job = AnonymizationJob::new(
            settings(0.2),
            vec![
                k_anonymity(2),
                Box::new(UniqueKeySuppression::new(2).unwrap()),
            ],
        )
        .unwrap();
        job.initialize(&context(7)).unwrap();
        let matrix = RecordMatrix::new(matrix_rows()).unwrap();
        let verdict = job
            .evaluate_node(&node(), matrix_classes(), Some(matrix))
            .unwrap();
        assert!(verdict.anonymous);
        assert_eq!(verdict.class_verdicts, vec![true, true, false, true]);
        assert_eq!(verdict.suppressed_records, 1);
    }

    #[test]
    fn test_matrix_criterion_alone() {
        let job = AnonymizationJob::new(
            settings(0.2),
            vec![Box::new(UniqueKeySuppression::new(2).unwrap())],
        )
        .unwrap();
        job.initialize(&context(7)).unwrap();

        let matrix = RecordMatrix::new(matrix_rows()).unwrap();
        let verdict = job
            .evaluate_node(&node(), matrix_classes(), Some(matrix))
            .unwrap();
        assert!(verdict.anonymous);
        assert_eq!(verdict.suppressed_records, 1);

        assert!(matches!(
            job.evaluate_node(&node(), matrix_classes(), None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_raised_flag_interrupts() {
        let job = AnonymizationJob::new(settings(0.0), vec![k_anonymity(2)]).unwrap();
        job.initialize(&context(4)).unwrap();
        job.interrupt_flag().raise();
        assert!(matches!(
            job.evaluate_node(&node(), classes(&[2, 2]), None),
            Err(Error::Interrupted)
        ));
        assert!(matches!(
            job.is_anonymous(&node(), &EquivalenceClass::new(vec![0], 2)),
            Err(Error::Interrupted)
        ));

        job.interrupt_flag().clear();
        assert!(job.evaluate_node(&node(), classes(&[2, 2]), None).is_ok());
    }

    #[test]
    fn test_interrupt_from_another_thread() {
        let job = AnonymizationJob::new(settings(0.0), vec![k_anonymity(2)]).unwrap();
        job.initialize(&context(4)).unwrap();
        let flag = job.interrupt_flag();
        std::thread::spawn(move || flag.raise()).join().unwrap();
        assert!(matches!(
            job.evaluate_node(&node(), classes(&[2, 2]), None),
            Err(Error::Interrupted)
        ));
    }

    /// Never satisfied; raises the flag the first time the search consults it.
    #[derive(Debug)]
    struct RaisingCondition {
        flag: InterruptFlag,
    }

    impl DistributionCriterion for RaisingCondition {
        fn risk(&self, entry: &EquivalenceClass) -> f64 {
            1.0 / entry.count() as f64
        }

        fn is_satisfied(&self, _retained: &RetainedView<'_>) -> bool {
            self.flag.raise();
            false
        }

        fn strategy(&self) -> SearchStrategy {
            SearchStrategy::Linear
        }
    }

    #[derive(Debug)]
    struct RaisingModel {
        flag: InterruptFlag,
    }

    impl PrivacyModel for RaisingModel {
        fn name(&self) -> &'static str {
            "raising"
        }

        fn render(&self) -> String {
            "raising condition".to_string()
        }

        fn discipline(&self) -> Discipline {
            Discipline::Distribution
        }

        fn requirements(&self) -> Requirements {
            Requirements::COUNT
        }

        fn is_monotonic_with_generalization(&self) -> bool {
            false
        }

        fn is_monotonic_with_suppression(&self) -> bool {
            true
        }

        fn initialize(&self, _context: &DataContext, _settings: &Settings) -> Result<Criterion> {
            Ok(Criterion::distribution(
                self,
                RaisingCondition {
                    flag: self.flag.clone(),
                },
            ))
        }
    }

    #[test]
    fn test_flag_raised_during_suppression_search() {
        let flag = InterruptFlag::new();
        let job = AnonymizationJob::new(
            settings(1.0),
            vec![Box::new(RaisingModel { flag: flag.clone() })],
        )
        .unwrap()
        .with_interrupt_flag(flag.clone());
        job.initialize(&context(9)).unwrap();

        // The flag is lowered when evaluation starts and raised by the first
        // prefix test, so only the polling inside the search can notice it.
        assert!(!flag.is_raised());
        assert!(matches!(
            job.evaluate_node(&node(), classes(&[1, 3, 5]), None),
            Err(Error::Interrupted)
        ));
        assert!(flag.is_raised());
    }

    #[test]
    fn test_flag_raised_while_evaluating_large_class() {
        let values = 1_000_000u32;
        let table = Distribution::from_counts((0..values).map(|value| (value, 1)));
        let ctx = DataContext::builder()
            .sensitive(SensitiveAttribute::from_frequencies("disease", table.clone()))
            .build()
            .unwrap();
        let job = AnonymizationJob::new(
            settings(0.0),
            vec![Box::new(EntropyLDiversity::new("disease", 2.0).unwrap())],
        )
        .unwrap();
        job.initialize(&ctx).unwrap();
        let entry = EquivalenceClass::new(vec![0], values as usize).with_distributions(vec![table]);

        // Inputs are built up front so the raise lands inside evaluation
        // rather than while a class is being cloned.
        let mut inputs = vec![vec![entry.clone()], vec![entry.clone()]];
        let flag = job.interrupt_flag();
        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            flag.raise();
        });

        // Almost all of each evaluation is spent in the entropy loop; repeat
        // until the raise lands and make sure it ends in an error.
        let outcome = loop {
            let classes = inputs.pop().unwrap_or_else(|| vec![entry.clone()]);
            match job.evaluate_node(&node(), classes, None) {
                Ok(verdict) => assert!(verdict.anonymous),
                Err(err) => break err,
            }
        };
        raiser.join().unwrap();
        assert!(matches!(outcome, Error::Interrupted));
    }

    #[tokio::test]
    async fn test_shared_job_evaluates_nodes_concurrently() {
        let job = Arc::new(AnonymizationJob::new(settings(0.0), vec![k_anonymity(3)]).unwrap());
        job.initialize(&context(12)).unwrap();

        let handles: Vec<_> = [vec![6, 6], vec![4, 4, 4], vec![10, 2]]
            .into_iter()
            .map(|counts| {
                let job = Arc::clone(&job);
                tokio::task::spawn_blocking(move || {
                    job.evaluate_node(&node(), classes(&counts), None)
                })
            })
            .collect();

        let mut verdicts = Vec::new();
        for handle in handles {
            verdicts.push(handle.await.unwrap().unwrap().anonymous);
        }
        assert_eq!(verdicts, vec![true, true, false]);
    }
}
