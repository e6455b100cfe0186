//! k-anonymity

use super::{ClassCriterion, Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, EquivalenceClass, Transformation};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;

/// Every class contains at least `k` records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KAnonymity {
    k: usize,
}

impl KAnonymity {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::Config("k-anonymity requires k >= 1".to_string()));
        }
        Ok(Self { k })
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

/// Shared minimum-class-size test, also used by models that derive a k.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MinimumClassSize {
    pub k: usize,
}

impl ClassCriterion for MinimumClassSize {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        _interrupt: &InterruptFlag,
    ) -> Result<bool> {
        Ok(entry.count() >= self.k)
    }
}

/// Minimum population count, for models defined on a research subset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MinimumPopulationSize {
    pub k: usize,
}

impl ClassCriterion for MinimumPopulationSize {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        _interrupt: &InterruptFlag,
    ) -> Result<bool> {
        Ok(entry
            .population_count()
            .map(|population| population >= self.k)
            .unwrap_or(false))
    }
}

impl PrivacyModel for KAnonymity {
    fn name(&self) -> &'static str {
        "k-anonymity"
    }

    fn render(&self) -> String {
        format!("{}-anonymity", self.k)
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

    fn initialize(&self, _context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        Ok(Criterion::implicit(self, MinimumClassSize { k: self.k }).with_parameter("k", self.k as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn criterion(k: usize) -> Criterion {
        let ctx = DataContext::builder().records(10).build().unwrap();
        KAnonymity::new(k)
            .unwrap()
            .initialize(&ctx, &Settings::default())
            .unwrap()
    }

    #[test]
    fn test_three_anonymity_verdicts() {
        let criterion = criterion(3);
        let node = Transformation::new(vec![1]);
        let verdicts: Vec<bool> = [5, 3, 2]
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                criterion
                    .is_anonymous(
                        &node,
                        &EquivalenceClass::new(vec![i as u32], count),
                        &InterruptFlag::new(),
                    )
                    .unwrap()
            })
            .collect();
        assert_eq!(verdicts, vec![true, true, false]);
    }

    #[test]
    fn test_rejects_zero_k() {
        assert!(KAnonymity::new(0).is_err());
    }

    #[test]
    fn test_render_and_parameter() {
        let model = KAnonymity::new(4).unwrap();
        assert_eq!(model.render(), "4-anonymity");
        assert_eq!(criterion(4).parameter("k"), Some(4.0));
    }

    proptest! {
        /// Merging two classes never turns an anonymous class non-anonymous.
        #[test]
        fn prop_merge_preserves_anonymity(k in 1usize..20, a in 0usize..40, b in 0usize..40) {
            let criterion = criterion(k);
            let node = Transformation::new(vec![0]);
            let interrupt = InterruptFlag::new();
            let left = EquivalenceClass::new(vec![0], a);
            let right = EquivalenceClass::new(vec![1], b);
            let merged = left.merged(&right, vec![9]);

            let left_ok = criterion.is_anonymous(&node, &left, &interrupt).unwrap();
            let right_ok = criterion.is_anonymous(&node, &right, &interrupt).unwrap();
            let merged_ok = criterion.is_anonymous(&node, &merged, &interrupt).unwrap();
            prop_assert!(!(left_ok || right_ok) || merged_ok);
        }
    }
}
