//! JSON table/node snapshots
//!
//! A snapshot is what the grouping engine would hand over for a handful of
//! lattice nodes: whole-table statistics plus, per node, its equivalence
//! classes and optionally its generalized record matrix. The CLI evaluates
//! snapshots; tests use them as readable fixtures.

use crate::data::{
    DataContext, DataSubset, Distribution, EquivalenceClass, Hierarchy, RecordMatrix,
    SensitiveAttribute, Transformation,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Quasi-identifier and its optional hierarchy (leaf × level codes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuasiIdentifierSnapshot {
    pub name: String,
    #[serde(default)]
    pub hierarchy: Option<Vec<Vec<u32>>>,
}

/// Sensitive attribute given either as a column or as value counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveSnapshot {
    pub name: String,
    #[serde(default)]
    pub column: Option<Vec<u32>>,
    #[serde(default)]
    pub frequencies: Option<BTreeMap<u32, usize>>,
    #[serde(default)]
    pub hierarchy: Option<Vec<Vec<u32>>>,
    #[serde(default)]
    pub order: Option<Vec<u32>>,
}

impl SensitiveSnapshot {
    fn to_attribute(&self) -> Result<SensitiveAttribute> {
        let mut attribute = match (&self.column, &self.frequencies) {
            (Some(column), None) => SensitiveAttribute::from_column(self.name.clone(), column),
            (None, Some(frequencies)) => SensitiveAttribute::from_frequencies(
                self.name.clone(),
                Distribution::from_counts(frequencies.iter().map(|(&v, &c)| (v, c))),
            ),
            _ => {
                return Err(Error::Config(format!(
                    "Sensitive attribute '{}' needs exactly one of column or frequencies",
                    self.name
                )))
            }
        };
        if let Some(rows) = &self.hierarchy {
            attribute = attribute.with_hierarchy(Hierarchy::new(rows.clone())?);
        }
        if let Some(order) = &self.order {
            attribute = attribute.with_order(order.clone());
        }
        Ok(attribute)
    }
}

/// One equivalence class as produced by the grouping engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSnapshot {
    pub key: Vec<u32>,
    pub count: usize,
    #[serde(default)]
    pub population_count: Option<usize>,
    /// One value → count table per sensitive attribute, in table order
    #[serde(default)]
    pub distributions: Option<Vec<BTreeMap<u32, usize>>>,
    #[serde(default)]
    pub outlier: bool,
}

impl ClassSnapshot {
    fn to_class(&self) -> Result<EquivalenceClass> {
        let mut entry = EquivalenceClass::new(self.key.clone(), self.count);
        if let Some(population_count) = self.population_count {
            if population_count < self.count {
                return Err(Error::Config(format!(
                    "Class {:?} has population count {} below its count {}",
                    self.key, population_count, self.count
                )));
            }
            entry = entry.with_population_count(population_count);
        }
        if let Some(distributions) = &self.distributions {
            entry = entry.with_distributions(
                distributions
                    .iter()
                    .map(|table| Distribution::from_counts(table.iter().map(|(&v, &c)| (v, c))))
                    .collect(),
            );
        }
        if self.outlier {
            entry = entry.as_outlier();
        }
        Ok(entry)
    }
}

/// One lattice node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub levels: Vec<usize>,
    pub classes: Vec<ClassSnapshot>,
    #[serde(default)]
    pub matrix: Option<Vec<Vec<u32>>>,
}

/// Evaluation input of one node
#[derive(Debug, Clone)]
pub struct NodeInput {
    pub node: Transformation,
    pub classes: Vec<EquivalenceClass>,
    pub matrix: Option<RecordMatrix>,
}

impl NodeSnapshot {
    pub fn to_input(&self) -> Result<NodeInput> {
        let classes = self
            .classes
            .iter()
            .map(ClassSnapshot::to_class)
            .collect::<Result<Vec<_>>>()?;
        let matrix = self.matrix.clone().map(RecordMatrix::new).transpose()?;
        Ok(NodeInput {
            node: Transformation::new(self.levels.clone()),
            classes,
            matrix,
        })
    }
}

/// Table statistics plus the nodes to evaluate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub quasi_identifiers: Vec<QuasiIdentifierSnapshot>,
    #[serde(default)]
    pub sensitive: Vec<SensitiveSnapshot>,
    /// Defaults to the size of the first sensitive attribute
    #[serde(default)]
    pub records: Option<usize>,
    #[serde(default)]
    pub population_size: Option<u64>,
    /// Indices of released records within the table
    #[serde(default)]
    pub research_subset: Option<Vec<usize>>,
    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
}

impl Snapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Explicit record count, else the size of the first sensitive attribute.
    fn record_count(&self) -> Option<usize> {
        self.records.or_else(|| {
            self.sensitive.first().map(|sensitive| match (&sensitive.column, &sensitive.frequencies) {
                (Some(column), _) => column.len(),
                (None, Some(frequencies)) => frequencies.values().sum(),
                (None, None) => 0,
            })
        })
    }

    /// Build the whole-table context.
    pub fn context(&self) -> Result<DataContext> {
        let mut builder = DataContext::builder();
        for qi in &self.quasi_identifiers {
            let hierarchy = qi.hierarchy.clone().map(Hierarchy::new).transpose()?;
            builder = builder.quasi_identifier(qi.name.clone(), hierarchy);
        }
        for sensitive in &self.sensitive {
            builder = builder.sensitive(sensitive.to_attribute()?);
        }
        if let Some(records) = self.records {
            builder = builder.records(records);
        }
        if let Some(size) = self.population_size {
            builder = builder.population_size(size);
        }
        if let Some(indices) = &self.research_subset {
            let total = self.record_count().ok_or_else(|| {
                Error::Config("A research subset requires a record count".to_string())
            })?;
            builder = builder.research_subset(DataSubset::from_indices(
                total,
                indices.iter().copied(),
            )?);
        }
        builder.build()
    }
}
