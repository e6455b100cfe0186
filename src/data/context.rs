//! Whole-table statistics computed once per job

use super::class::Distribution;
use super::hierarchy::{DomainShares, Hierarchy};
use super::subset::DataSubset;
use crate::error::{Error, Result};

/// A sensitive attribute and its table-wide statistics.
#[derive(Debug, Clone)]
pub struct SensitiveAttribute {
    name: String,
    frequencies: Distribution,
    hierarchy: Option<Hierarchy>,
    order: Option<Vec<u32>>,
}

impl SensitiveAttribute {
    /// Build from the attribute's column of value codes.
    pub fn from_column(name: impl Into<String>, column: &[u32]) -> Self {
        Self::from_frequencies(name, Distribution::from_values(column.iter().copied()))
    }

    /// Build from precomputed table-wide counts.
    pub fn from_frequencies(name: impl Into<String>, frequencies: Distribution) -> Self {
        Self {
            name: name.into(),
            frequencies,
            hierarchy: None,
            order: None,
        }
    }

    /// Attach a generalization hierarchy (hierarchical-distance t-closeness).
    pub fn with_hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = Some(hierarchy);
        self
    }

    /// Attach a total order of the value codes (ordered-distance t-closeness).
    pub fn with_order(mut self, order: Vec<u32>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table-wide value counts.
    pub fn frequencies(&self) -> &Distribution {
        &self.frequencies
    }

    /// Relative table-wide frequency of `value` (0 when absent).
    pub fn frequency(&self, value: u32) -> f64 {
        let total = self.frequencies.total();
        if total == 0 {
            0.0
        } else {
            self.frequencies.get(value) as f64 / total as f64
        }
    }

    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        self.hierarchy.as_ref()
    }

    pub fn order(&self) -> Option<&[u32]> {
        self.order.as_deref()
    }
}

/// Read-only table-wide context every criterion initializes from.
#[derive(Debug, Clone)]
pub struct DataContext {
    quasi_identifiers: Vec<String>,
    hierarchies: Vec<Option<Hierarchy>>,
    domain_shares: Vec<Option<DomainShares>>,
    sensitive: Vec<SensitiveAttribute>,
    record_count: usize,
    population_size: Option<u64>,
    research_subset: Option<DataSubset>,
}

impl DataContext {
    pub fn builder() -> DataContextBuilder {
        DataContextBuilder::default()
    }

    pub fn quasi_identifiers(&self) -> &[String] {
        &self.quasi_identifiers
    }

    /// Hierarchy of the quasi-identifier at `dimension`.
    pub fn hierarchy(&self, dimension: usize) -> Option<&Hierarchy> {
        self.hierarchies.get(dimension).and_then(Option::as_ref)
    }

    /// Domain shares of the quasi-identifier at `dimension`.
    pub fn domain_shares(&self, dimension: usize) -> Option<&DomainShares> {
        self.domain_shares.get(dimension).and_then(Option::as_ref)
    }

    pub fn sensitive_attributes(&self) -> &[SensitiveAttribute] {
        &self.sensitive
    }

    /// Position of a sensitive attribute; class distributions use the same index.
    pub fn sensitive_index(&self, name: &str) -> Option<usize> {
        self.sensitive.iter().position(|a| a.name == name)
    }

    pub fn sensitive(&self, index: usize) -> Option<&SensitiveAttribute> {
        self.sensitive.get(index)
    }

    /// Number of records in the (sample) table.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Size of the underlying population, when modelled.
    pub fn population_size(&self) -> Option<u64> {
        self.population_size
    }

    /// `record_count / population_size`, when a population is modelled.
    pub fn sampling_fraction(&self) -> Option<f64> {
        self.population_size
            .filter(|size| *size > 0)
            .map(|size| self.record_count as f64 / size as f64)
    }

    pub fn research_subset(&self) -> Option<&DataSubset> {
        self.research_subset.as_ref()
    }
}

/// Builder for [`DataContext`]
#[derive(Debug, Default)]
pub struct DataContextBuilder {
    quasi_identifiers: Vec<(String, Option<Hierarchy>)>,
    sensitive: Vec<SensitiveAttribute>,
    record_count: Option<usize>,
    population_size: Option<u64>,
    research_subset: Option<DataSubset>,
}

impl DataContextBuilder {
    /// Add a quasi-identifier, optionally with its hierarchy.
    pub fn quasi_identifier(mut self, name: impl Into<String>, hierarchy: Option<Hierarchy>) -> Self {
        self.quasi_identifiers.push((name.into(), hierarchy));
        self
    }

    /// Add a sensitive attribute.
    pub fn sensitive(mut self, attribute: SensitiveAttribute) -> Self {
        self.sensitive.push(attribute);
        self
    }

    /// Number of records; defaults to the size of the first sensitive column.
    pub fn records(mut self, record_count: usize) -> Self {
        self.record_count = Some(record_count);
        self
    }

    pub fn population_size(mut self, size: u64) -> Self {
        self.population_size = Some(size);
        self
    }

    pub fn research_subset(mut self, subset: DataSubset) -> Self {
        self.research_subset = Some(subset);
        self
    }

    /// Validate and build the context.
    pub fn build(self) -> Result<DataContext> {
        let record_count = self
            .record_count
            .or_else(|| self.sensitive.first().map(|a| a.frequencies.total()))
            .ok_or_else(|| Error::Config("Record count is required".to_string()))?;

        for attribute in &self.sensitive {
            if attribute.frequencies.total() != record_count {
                return Err(Error::Config(format!(
                    "Sensitive attribute '{}' covers {} records, table has {}",
                    attribute.name,
                    attribute.frequencies.total(),
                    record_count
                )));
            }
        }

        let mut names: Vec<&str> = self
            .quasi_identifiers
            .iter()
            .map(|(name, _)| name.as_str())
            .chain(self.sensitive.iter().map(|a| a.name.as_str()))
            .collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::Config(format!("Duplicate attribute '{}'", pair[0])));
        }

        if let Some(size) = self.population_size {
            if size < record_count as u64 {
                return Err(Error::Config(format!(
                    "Population size {} is smaller than the {} sampled records",
                    size, record_count
                )));
            }
        }

        if let Some(subset) = &self.research_subset {
            if subset.record_count() != record_count {
                return Err(Error::Config(format!(
                    "Research subset spans {} records, table has {}",
                    subset.record_count(),
                    record_count
                )));
            }
        }

        let domain_shares = self
            .quasi_identifiers
            .iter()
            .map(|(_, hierarchy)| hierarchy.as_ref().map(Hierarchy::domain_shares))
            .collect();
        let (quasi_identifiers, hierarchies): (Vec<String>, Vec<Option<Hierarchy>>) =
            self.quasi_identifiers.into_iter().unzip();

        Ok(DataContext {
            quasi_identifiers,
            hierarchies,
            domain_shares,
            sensitive: self.sensitive,
            record_count,
            population_size: self.population_size,
            research_subset: self.research_subset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context() {
        let hierarchy = Hierarchy::new(vec![vec![0, 9], vec![1, 9]]).unwrap();
        let ctx = DataContext::builder()
            .quasi_identifier("age", Some(hierarchy))
            .quasi_identifier("zip", None)
            .sensitive(SensitiveAttribute::from_column("disease", &[1, 1, 2, 3]))
            .population_size(40)
            .build()
            .unwrap();

        assert_eq!(ctx.record_count(), 4);
        assert_eq!(ctx.sensitive_index("disease"), Some(0));
        assert_eq!(ctx.sensitive_index("age"), None);
        assert!((ctx.sensitive(0).unwrap().frequency(1) - 0.5).abs() < 1e-12);
        assert_eq!(ctx.sensitive(0).unwrap().frequency(7), 0.0);
        assert_eq!(ctx.domain_shares(0).and_then(|s| s.share(1, 9)), Some(1.0));
        assert!(ctx.domain_shares(1).is_none());
        assert!((ctx.sampling_fraction().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_inconsistent_record_counts() {
        let err = DataContext::builder()
            .sensitive(SensitiveAttribute::from_column("a", &[1, 2]))
            .sensitive(SensitiveAttribute::from_column("b", &[1]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_rejects_small_population() {
        let err = DataContext::builder().records(10).population_size(5).build();
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = DataContext::builder()
            .quasi_identifier("x", None)
            .sensitive(SensitiveAttribute::from_column("x", &[1]))
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn test_requires_record_count() {
        assert!(DataContext::builder().quasi_identifier("x", None).build().is_err());
    }
}
