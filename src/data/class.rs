//! Equivalence classes and their per-class statistics

use crate::criteria::Requirements;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Generalized quasi-identifier codes identifying a class at one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QiKey(Vec<u32>);

impl QiKey {
    pub fn new(codes: Vec<u32>) -> Self {
        Self(codes)
    }

    pub fn codes(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u32>> for QiKey {
    fn from(codes: Vec<u32>) -> Self {
        Self(codes)
    }
}

/// A lattice node: one generalization level per quasi-identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transformation {
    levels: Vec<usize>,
}

impl Transformation {
    pub fn new(levels: Vec<usize>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    /// Level of the given quasi-identifier (0 when out of range).
    pub fn level(&self, dimension: usize) -> usize {
        self.levels.get(dimension).copied().unwrap_or(0)
    }

    /// Whether `self` generalizes `other` on every dimension.
    pub fn generalizes(&self, other: &Transformation) -> bool {
        self.levels.len() == other.levels.len()
            && self
                .levels
                .iter()
                .zip(other.levels.iter())
                .all(|(a, b)| a >= b)
    }
}

/// Frequency table of one sensitive attribute (value code → count).
///
/// Iteration is ordered by value code so every evaluation is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    counts: BTreeMap<u32, usize>,
    total: usize,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every occurrence in a column of value codes.
    pub fn from_values<I: IntoIterator<Item = u32>>(values: I) -> Self {
        let mut distribution = Self::new();
        for value in values {
            distribution.add(value, 1);
        }
        distribution
    }

    /// Build from `(value, count)` pairs; repeated values are summed.
    pub fn from_counts<I: IntoIterator<Item = (u32, usize)>>(pairs: I) -> Self {
        let mut distribution = Self::new();
        for (value, count) in pairs {
            distribution.add(value, count);
        }
        distribution
    }

    /// Add `count` occurrences of `value`. Zero counts are ignored.
    pub fn add(&mut self, value: u32, count: usize) {
        if count == 0 {
            return;
        }
        *self.counts.entry(value).or_insert(0) += count;
        self.total += count;
    }

    /// Occurrences of `value`.
    pub fn get(&self, value: u32) -> usize {
        self.counts.get(&value).copied().unwrap_or(0)
    }

    /// Number of distinct values.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Total number of occurrences.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// `(value, count)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.counts.iter().map(|(value, count)| (*value, *count))
    }

    /// Counts only, sorted descending.
    pub fn counts_descending(&self) -> Vec<usize> {
        let mut counts: Vec<usize> = self.counts.values().copied().collect();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        counts
    }

    /// Sum of two distributions.
    pub fn merged(&self, other: &Distribution) -> Distribution {
        let mut merged = self.clone();
        for (value, count) in other.iter() {
            merged.add(value, count);
        }
        merged
    }
}

/// One equivalence class at one lattice node.
///
/// Only the statistics named by [`EquivalenceClass::provided`] are
/// meaningful; the others read as absent.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalenceClass {
    key: QiKey,
    count: usize,
    population_count: Option<usize>,
    distributions: Vec<Distribution>,
    outlier: bool,
    provided: Requirements,
}

impl EquivalenceClass {
    /// Create a class with its sample count.
    pub fn new(key: impl Into<QiKey>, count: usize) -> Self {
        Self {
            key: key.into(),
            count,
            population_count: None,
            distributions: Vec::new(),
            outlier: false,
            provided: Requirements::COUNT,
        }
    }

    /// Attach the population (research-subset superset) count.
    pub fn with_population_count(mut self, population_count: usize) -> Self {
        debug_assert!(population_count >= self.count || self.count == 0);
        self.population_count = Some(population_count);
        self.provided |= Requirements::POPULATION_COUNT;
        self
    }

    /// Attach one distribution per sensitive attribute, in context order.
    pub fn with_distributions(mut self, distributions: Vec<Distribution>) -> Self {
        self.distributions = distributions;
        self.provided |= Requirements::DISTRIBUTION;
        self
    }

    /// Mark the class as already suppressed.
    pub fn as_outlier(mut self) -> Self {
        self.outlier = true;
        self
    }

    pub fn key(&self) -> &QiKey {
        &self.key
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn population_count(&self) -> Option<usize> {
        if self.provided.contains(Requirements::POPULATION_COUNT) {
            self.population_count
        } else {
            None
        }
    }

    /// Distribution of the sensitive attribute at `index`.
    pub fn distribution(&self, index: usize) -> Option<&Distribution> {
        if self.provided.contains(Requirements::DISTRIBUTION) {
            self.distributions.get(index)
        } else {
            None
        }
    }

    pub fn is_outlier(&self) -> bool {
        self.outlier
    }

    /// Statistics materialized for this entry.
    pub fn provided(&self) -> Requirements {
        self.provided
    }

    /// Class obtained by generalizing `self` and `other` into one key.
    pub fn merged(&self, other: &EquivalenceClass, key: impl Into<QiKey>) -> EquivalenceClass {
        let population_count = match (self.population_count(), other.population_count()) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
        let distributions = if self.provided.contains(Requirements::DISTRIBUTION)
            && other.provided.contains(Requirements::DISTRIBUTION)
        {
            self.distributions
                .iter()
                .zip(other.distributions.iter())
                .map(|(a, b)| a.merged(b))
                .collect()
        } else {
            Vec::new()
        };
        let mut provided = Requirements::COUNT;
        if population_count.is_some() {
            provided |= Requirements::POPULATION_COUNT;
        }
        if !distributions.is_empty() {
            provided |= Requirements::DISTRIBUTION;
        }
        EquivalenceClass {
            key: key.into(),
            count: self.count + other.count,
            population_count,
            distributions,
            outlier: false,
            provided,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_counts() {
        let d = Distribution::from_values([3, 1, 3, 2, 3]);
        assert_eq!(d.total(), 5);
        assert_eq!(d.distinct(), 3);
        assert_eq!(d.get(3), 3);
        assert_eq!(d.get(9), 0);
        assert_eq!(d.counts_descending(), vec![3, 1, 1]);
        let values: Vec<u32> = d.iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_distribution_ignores_zero_counts() {
        let d = Distribution::from_counts([(1, 0), (2, 4)]);
        assert_eq!(d.distinct(), 1);
        assert_eq!(d.total(), 4);
    }

    #[test]
    fn test_class_requirements_gate_reads() {
        let class = EquivalenceClass::new(vec![1, 2], 4);
        assert_eq!(class.provided(), Requirements::COUNT);
        assert!(class.population_count().is_none());
        assert!(class.distribution(0).is_none());

        let class = class
            .with_population_count(10)
            .with_distributions(vec![Distribution::from_values([1, 1, 2, 2])]);
        assert_eq!(class.population_count(), Some(10));
        assert_eq!(class.distribution(0).map(|d| d.total()), Some(4));
        assert!(class.provided().contains(Requirements::DISTRIBUTION));
    }

    #[test]
    fn test_merge_sums_statistics() {
        let a = EquivalenceClass::new(vec![1], 2)
            .with_population_count(5)
            .with_distributions(vec![Distribution::from_values([1, 2])]);
        let b = EquivalenceClass::new(vec![2], 3)
            .with_population_count(4)
            .with_distributions(vec![Distribution::from_values([2, 2, 3])]);
        let merged = a.merged(&b, vec![9]);
        assert_eq!(merged.count(), 5);
        assert_eq!(merged.population_count(), Some(9));
        assert_eq!(merged.distribution(0).map(|d| d.get(2)), Some(3));
        assert_eq!(merged.key().codes(), &[9]);
    }

    #[test]
    fn test_transformation_generalizes() {
        let low = Transformation::new(vec![0, 1]);
        let high = Transformation::new(vec![1, 1]);
        assert!(high.generalizes(&low));
        assert!(!low.generalizes(&high));
        assert_eq!(high.level(5), 0);
    }
}
