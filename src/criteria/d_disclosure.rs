//! δ-disclosure privacy

use super::{sensitive_attribute, ClassCriterion, Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, Distribution, EquivalenceClass, Transformation};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use crate::numeric::Interval;

/// For every value present in a class, `|log2(p / f)| < d`.
#[derive(Debug, Clone, PartialEq)]
pub struct DDisclosurePrivacy {
    attribute: String,
    d: f64,
    reliable: bool,
}

impl DDisclosurePrivacy {
    pub fn new(attribute: impl Into<String>, d: f64) -> Result<Self> {
        if !d.is_finite() || d <= 0.0 {
            return Err(Error::Config(format!(
                "δ-disclosure privacy requires d > 0, got {}",
                d
            )));
        }
        Ok(Self {
            attribute: attribute.into(),
            d,
            reliable: false,
        })
    }

    /// Evaluate with interval arithmetic; ambiguous comparisons fail.
    pub fn reliable(mut self) -> Self {
        self.reliable = true;
        self
    }
}

#[derive(Debug)]
struct DisclosureTest {
    index: usize,
    d: f64,
    reliable: bool,
    table: Distribution,
}

impl DisclosureTest {
    fn value_passes(&self, value: u32, count: usize, class_total: usize) -> bool {
        let table_count = self.table.get(value);
        if table_count == 0 || count == 0 {
            return false;
        }
        if self.reliable {
            let p = Interval::ratio(count, class_total);
            let f = Interval::ratio(table_count, self.table.total());
            (p / f)
                .log2()
                .abs()
                .lt(&Interval::exact(self.d))
                .unwrap_or(false)
        } else {
            let p = count as f64 / class_total as f64;
            let f = table_count as f64 / self.table.total() as f64;
            (p / f).log2().abs() < self.d
        }
    }
}

impl ClassCriterion for DisclosureTest {
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

impl PrivacyModel for DDisclosurePrivacy {
    fn name(&self) -> &'static str {
        "d-disclosure-privacy"
    }

    fn render(&self) -> String {
        let mode = if self.reliable { "reliable " } else { "" };
        format!(
            "{}{}-disclosure privacy for attribute '{}'",
            mode, self.d, self.attribute
        )
    }

    fn discipline(&self) -> Discipline {
        Discipline::ExplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT | Requirements::DISTRIBUTION
    }

    /// Merging classes can make a rare value rarer relative to the table.
    fn is_monotonic_with_generalization(&self) -> bool {
        false
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let (index, attribute) = sensitive_attribute(context, &self.attribute)?;
        Ok(Criterion::explicit(
            self,
            DisclosureTest {
                index,
                d: self.d,
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

    fn check(model: &DDisclosurePrivacy, values: &[u32]) -> bool {
        // f(1) = 0.5, f(2) = 0.25, f(3) = 0.25
        let ctx = DataContext::builder()
            .sensitive(SensitiveAttribute::from_column("d", &[1, 1, 2, 3]))
            .build()
            .unwrap();
        let entry = EquivalenceClass::new(vec![0], values.len())
            .with_distributions(vec![Distribution::from_values(values.iter().copied())]);
        model
            .initialize(&ctx, &Settings::default())
            .unwrap()
            .is_anonymous(&Transformation::new(vec![0]), &entry, &InterruptFlag::new())
            .unwrap()
    }

    #[test]
    fn test_disclosure_bound() {
        let model = DDisclosurePrivacy::new("d", 1.5).unwrap();
        // every ratio is 1
        assert!(check(&model, &[1, 1, 2, 3]));
        // p(2) = 0.5: log2(2) = 1
        assert!(check(&model, &[1, 2]));
        // p(2) = 1: log2(4) = 2
        assert!(!check(&model, &[2, 2]));
    }

    #[test]
    fn test_bound_is_strict() {
        let model = DDisclosurePrivacy::new("d", 1.0).unwrap();
        assert!(!check(&model, &[1, 2]));
        let reliable = DDisclosurePrivacy::new("d", 1.0).unwrap().reliable();
        assert!(!check(&reliable, &[1, 2]));
        assert!(check(&reliable, &[1, 1, 2, 3]));
    }

    #[test]
    fn test_monotonicity_flags() {
        let model = DDisclosurePrivacy::new("d", 1.0).unwrap();
        assert!(!model.is_monotonic_with_generalization());
        assert!(model.is_monotonic_with_suppression());
        assert!(DDisclosurePrivacy::new("d", 0.0).is_err());
    }
}
