//! l-diversity variants

use super::{sensitive_attribute, ClassCriterion, Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, EquivalenceClass, Transformation};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;

/// Tolerance for the entropy comparison.
const ENTROPY_TOLERANCE: f64 = 1e-10;

/// Each class holds at least `l` distinct sensitive values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctLDiversity {
    attribute: String,
    l: usize,
}

impl DistinctLDiversity {
    pub fn new(attribute: impl Into<String>, l: usize) -> Result<Self> {
        if l == 0 {
            return Err(Error::Config("distinct l-diversity requires l >= 1".to_string()));
        }
        Ok(Self {
            attribute: attribute.into(),
            l,
        })
    }
}

#[derive(Debug)]
struct DistinctTest {
    index: usize,
    l: usize,
}

impl ClassCriterion for DistinctTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        _interrupt: &InterruptFlag,
    ) -> Result<bool> {
        Ok(entry
            .distribution(self.index)
            .map(|d| d.distinct() >= self.l)
            .unwrap_or(false))
    }
}

impl PrivacyModel for DistinctLDiversity {
    fn name(&self) -> &'static str {
        "distinct-l-diversity"
    }

    fn render(&self) -> String {
        format!("distinct-{}-diversity for attribute '{}'", self.l, self.attribute)
    }

    fn discipline(&self) -> Discipline {
        Discipline::ExplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT | Requirements::DISTRIBUTION
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let (index, _) = sensitive_attribute(context, &self.attribute)?;
        Ok(Criterion::explicit(self, DistinctTest { index, l: self.l }))
    }
}

/// The entropy of each class's sensitive values is at least `log2(l)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntropyLDiversity {
    attribute: String,
    l: f64,
}

impl EntropyLDiversity {
    pub fn new(attribute: impl Into<String>, l: f64) -> Result<Self> {
        if !l.is_finite() || l < 1.0 {
            return Err(Error::Config(format!(
                "entropy l-diversity requires a finite l >= 1, got {}",
                l
            )));
        }
        Ok(Self {
            attribute: attribute.into(),
            l,
        })
    }
}

/// Shannon entropy (bits) of a frequency vector.
///
/// Counts are summed in descending order so the result does not depend on
/// the order the values were encountered in.
pub(crate) fn entropy(counts: &[usize], interrupt: &InterruptFlag) -> Result<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return Ok(0.0);
    }
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let total = total as f64;
    let mut entropy = 0.0;
    for (i, &count) in sorted.iter().enumerate() {
        interrupt.check_every(i)?;
        if count > 0 {
            let p = count as f64 / total;
            entropy -= p * p.log2();
        }
    }
    Ok(entropy)
}

#[derive(Debug)]
struct EntropyTest {
    index: usize,
    log_l: f64,
}

impl ClassCriterion for EntropyTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let Some(distribution) = entry.distribution(self.index) else {
            return Ok(false);
        };
        if distribution.is_empty() {
            return Ok(false);
        }
        let counts: Vec<usize> = distribution.iter().map(|(_, count)| count).collect();
        Ok(entropy(&counts, interrupt)? >= self.log_l - ENTROPY_TOLERANCE)
    }
}

impl PrivacyModel for EntropyLDiversity {
    fn name(&self) -> &'static str {
        "entropy-l-diversity"
    }

    fn render(&self) -> String {
        format!("entropy-{}-diversity for attribute '{}'", self.l, self.attribute)
    }

    fn discipline(&self) -> Discipline {
        Discipline::ExplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT | Requirements::DISTRIBUTION
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let (index, _) = sensitive_attribute(context, &self.attribute)?;
        Ok(Criterion::explicit(
            self,
            EntropyTest {
                index,
                log_l: self.l.log2(),
            },
        ))
    }
}

/// The most frequent value is rarer than `c` times the tail from the l-th value on.
#[derive(Debug, Clone, PartialEq)]
pub struct RecursiveClDiversity {
    attribute: String,
    c: f64,
    l: usize,
}

impl RecursiveClDiversity {
    pub fn new(attribute: impl Into<String>, c: f64, l: usize) -> Result<Self> {
        if !c.is_finite() || c <= 0.0 {
            return Err(Error::Config(format!(
                "recursive (c,l)-diversity requires c > 0, got {}",
                c
            )));
        }
        if l < 2 {
            return Err(Error::Config(
                "recursive (c,l)-diversity requires l >= 2".to_string(),
            ));
        }
        Ok(Self {
            attribute: attribute.into(),
            c,
            l,
        })
    }
}

#[derive(Debug)]
struct RecursiveTest {
    index: usize,
    c: f64,
    l: usize,
}

impl ClassCriterion for RecursiveTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let Some(distribution) = entry.distribution(self.index) else {
            return Ok(false);
        };
        let counts = distribution.counts_descending();
        if counts.len() < self.l {
            return Ok(false);
        }
        let mut tail = 0usize;
        for (i, count) in counts[self.l - 1..].iter().enumerate() {
            interrupt.check_every(i)?;
            tail += count;
        }
        Ok((counts[0] as f64) < self.c * tail as f64)
    }
}

impl PrivacyModel for RecursiveClDiversity {
    fn name(&self) -> &'static str {
        "recursive-cl-diversity"
    }

    fn render(&self) -> String {
        format!(
            "recursive-({},{})-diversity for attribute '{}'",
            self.c, self.l, self.attribute
        )
    }

    fn discipline(&self) -> Discipline {
        Discipline::ExplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT | Requirements::DISTRIBUTION
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let (index, _) = sensitive_attribute(context, &self.attribute)?;
        Ok(Criterion::explicit(
            self,
            RecursiveTest {
                index,
                c: self.c,
                l: self.l,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Distribution, SensitiveAttribute};
    use proptest::prelude::*;

    fn context() -> DataContext {
        DataContext::builder()
            .quasi_identifier("zip", None)
            .sensitive(SensitiveAttribute::from_column("disease", &[1, 1, 2, 2, 3, 4]))
            .build()
            .unwrap()
    }

    fn class(values: &[u32]) -> EquivalenceClass {
        EquivalenceClass::new(vec![0], values.len())
            .with_distributions(vec![Distribution::from_values(values.iter().copied())])
    }

    fn check(model: &dyn PrivacyModel, entry: &EquivalenceClass) -> bool {
        model
            .initialize(&context(), &Settings::default())
            .unwrap()
            .is_anonymous(&Transformation::new(vec![0]), entry, &InterruptFlag::new())
            .unwrap()
    }

    #[test]
    fn test_distinct() {
        let model = DistinctLDiversity::new("disease", 2).unwrap();
        assert!(check(&model, &class(&[1, 2])));
        assert!(!check(&model, &class(&[1, 1, 1])));
    }

    #[test]
    fn test_missing_distribution_is_not_anonymous() {
        let model = DistinctLDiversity::new("disease", 1).unwrap();
        assert!(!check(&model, &EquivalenceClass::new(vec![0], 5)));
    }

    #[test]
    fn test_unknown_attribute_rejected_at_initialize() {
        let model = DistinctLDiversity::new("salary", 2).unwrap();
        assert!(model.initialize(&context(), &Settings::default()).is_err());
    }

    #[test]
    fn test_entropy_boundary() {
        // Two equally frequent values: entropy is exactly 1 bit.
        let model = EntropyLDiversity::new("disease", 2.0).unwrap();
        assert!(check(&model, &class(&[1, 2, 1, 2])));
        assert!(!check(&model, &class(&[1, 1, 1, 2])));
        assert!(EntropyLDiversity::new("disease", 0.5).is_err());
        assert!(EntropyLDiversity::new("disease", f64::NAN).is_err());
    }

    #[test]
    fn test_recursive() {
        let model = RecursiveClDiversity::new("disease", 2.0, 2).unwrap();
        // sorted [3,2,1]: 3 < 2 * (2 + 1)
        assert!(check(&model, &class(&[1, 1, 1, 2, 2, 3])));
        // sorted [5,1]: 5 >= 2 * 1
        assert!(!check(&model, &class(&[1, 1, 1, 1, 1, 2])));
        // fewer than l values
        assert!(!check(&model, &class(&[1, 1])));
        assert!(RecursiveClDiversity::new("disease", 0.0, 2).is_err());
        assert!(RecursiveClDiversity::new("disease", 1.0, 1).is_err());
    }

    proptest! {
        /// Entropy does not depend on the order of (value, frequency) pairs.
        #[test]
        fn prop_entropy_permutation_invariant(
            counts in prop::collection::vec(1usize..50, 1..12),
            seed in any::<u64>(),
        ) {
            let interrupt = InterruptFlag::new();
            let mut shuffled = counts.clone();
            let len = shuffled.len();
            let mut state = seed;
            for i in (1..len).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }
            let a = entropy(&counts, &interrupt).unwrap();
            let b = entropy(&shuffled, &interrupt).unwrap();
            prop_assert_eq!(a.to_bits(), b.to_bits());
        }
    }
}
