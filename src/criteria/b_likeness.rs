//! β-likeness (basic and enhanced)
//!
//! Both variants bound the relative gain in confidence about a sensitive
//! value, `(p − f) / f`, where `p` is the value's frequency inside a class
//! and `f` its table-wide frequency. Only values present in the class are
//! checked.

use super::{sensitive_attribute, ClassCriterion, Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, Distribution, EquivalenceClass, Transformation};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use crate::numeric::Interval;

fn validate_b(b: f64) -> Result<()> {
    if !b.is_finite() || b <= 0.0 {
        return Err(Error::Config(format!("β-likeness requires β > 0, got {}", b)));
    }
    Ok(())
}

/// β-likeness with a fixed bound on the relative gain.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBLikeness {
    attribute: String,
    b: f64,
}

impl BasicBLikeness {
    pub fn new(attribute: impl Into<String>, b: f64) -> Result<Self> {
        validate_b(b)?;
        Ok(Self {
            attribute: attribute.into(),
            b,
        })
    }
}

/// β-likeness whose bound tightens to `-ln f` for frequent values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedBLikeness {
    attribute: String,
    b: f64,
    reliable: bool,
}

impl EnhancedBLikeness {
    pub fn new(attribute: impl Into<String>, b: f64) -> Result<Self> {
        validate_b(b)?;
        Ok(Self {
            attribute: attribute.into(),
            b,
            reliable: false,
        })
    }

    /// Evaluate with interval arithmetic; ambiguous comparisons fail.
    pub fn reliable(mut self) -> Self {
        self.reliable = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Basic,
    Enhanced,
}

#[derive(Debug)]
struct LikenessTest {
    index: usize,
    b: f64,
    bound: Bound,
    reliable: bool,
    table: Distribution,
}

impl LikenessTest {
    fn value_passes(&self, value: u32, count: usize, class_total: usize) -> bool {
        let table_count = self.table.get(value);
        if table_count == 0 || class_total == 0 {
            return false;
        }
        if self.reliable {
            let p = Interval::ratio(count, class_total);
            let f = Interval::ratio(table_count, self.table.total());
            let gain = (p - f) / f;
            let limit = match self.bound {
                Bound::Basic => Interval::exact(self.b),
                Bound::Enhanced => Interval::exact(self.b).min(-f.ln()),
            };
            gain.le(&limit).unwrap_or(false)
        } else {
            let p = count as f64 / class_total as f64;
            let f = table_count as f64 / self.table.total() as f64;
            let limit = match self.bound {
                Bound::Basic => self.b,
                Bound::Enhanced => self.b.min(-f.ln()),
            };
            (p - f) / f <= limit
        }
    }
}

impl ClassCriterion for LikenessTest {
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
        for (i, (value, count)) in distribution.iter().enumerate() {
            interrupt.check_every(i)?;
            if !self.value_passes(value, count, distribution.total()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl PrivacyModel for BasicBLikeness {
    fn name(&self) -> &'static str {
        "basic-b-likeness"
    }

    fn render(&self) -> String {
        format!("basic-{}-likeness for attribute '{}'", self.b, self.attribute)
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
        let (index, attribute) = sensitive_attribute(context, &self.attribute)?;
        Ok(Criterion::explicit(
            self,
            LikenessTest {
                index,
                b: self.b,
                bound: Bound::Basic,
                reliable: false,
                table: attribute.frequencies().clone(),
            },
        ))
    }
}

impl PrivacyModel for EnhancedBLikeness {
    fn name(&self) -> &'static str {
        "enhanced-b-likeness"
    }

    fn render(&self) -> String {
        let mode = if self.reliable { "reliable " } else { "" };
        format!(
            "{}enhanced-{}-likeness for attribute '{}'",
            mode, self.b, self.attribute
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
        let (index, attribute) = sensitive_attribute(context, &self.attribute)?;
        Ok(Criterion::explicit(
            self,
            LikenessTest {
                index,
                b: self.b,
                bound: Bound::Enhanced,
                reliable: self.reliable,
                table: attribute.frequencies().clone(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SensitiveAttribute;
    use proptest::prelude::*;

    fn context() -> DataContext {
        // f(1) = 0.5, f(2) = 0.25, f(3) = 0.25
        DataContext::builder()
            .sensitive(SensitiveAttribute::from_column("d", &[1, 1, 2, 3]))
            .build()
            .unwrap()
    }

    fn check(model: &dyn PrivacyModel, values: &[u32]) -> bool {
        let entry = EquivalenceClass::new(vec![0], values.len())
            .with_distributions(vec![Distribution::from_values(values.iter().copied())]);
        model
            .initialize(&context(), &Settings::default())
            .unwrap()
            .is_anonymous(&Transformation::new(vec![0]), &entry, &InterruptFlag::new())
            .unwrap()
    }

    #[test]
    fn test_basic_bound() {
        let model = BasicBLikeness::new("d", 1.0).unwrap();
        // p(2) = 0.5: gain (0.5 - 0.25) / 0.25 = 1
        assert!(check(&model, &[1, 2]));
        // p(2) = 1: gain 3
        assert!(!check(&model, &[2, 2]));
        // value unknown to the table
        assert!(!check(&model, &[9]));
    }

    #[test]
    fn test_enhanced_bound_tightens_for_frequent_values() {
        // p(1) = 1: gain 1, -ln 0.5 = 0.69 < 1
        let basic = BasicBLikeness::new("d", 1.0).unwrap();
        let enhanced = EnhancedBLikeness::new("d", 1.0).unwrap();
        assert!(check(&basic, &[1, 1]));
        assert!(!check(&enhanced, &[1, 1]));
    }

    #[test]
    fn test_reliable_mode_is_conservative_at_the_boundary() {
        // gain exactly equals β: the interval enclosure cannot decide.
        let plain = EnhancedBLikeness::new("d", 1.0).unwrap();
        let reliable = EnhancedBLikeness::new("d", 1.0).unwrap().reliable();
        assert!(check(&plain, &[1, 2]));
        assert!(!check(&reliable, &[1, 2]));
        assert!(check(&reliable, &[1, 2, 3, 1]));
        assert!(reliable.render().starts_with("reliable"));
    }

    #[test]
    fn test_rejects_non_positive_b() {
        assert!(BasicBLikeness::new("d", 0.0).is_err());
        assert!(EnhancedBLikeness::new("d", -1.0).is_err());
    }

    proptest! {
        /// A class with exactly the table distribution passes for any β > 0.
        #[test]
        fn prop_table_distribution_passes(b in 1e-6f64..10.0, scale in 1usize..8) {
            let model = BasicBLikeness::new("d", b).unwrap();
            let values: Vec<u32> = [1, 1, 2, 3]
                .iter()
                .flat_map(|&v| std::iter::repeat(v).take(scale))
                .collect();
            prop_assert!(check(&model, &values));
        }
    }
}
