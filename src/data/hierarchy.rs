//! Generalization hierarchies and domain shares

use crate::error::{Error, Result};
use std::collections::HashMap;

/// A generalization hierarchy: one row per leaf value, one column per level.
///
/// Column 0 holds the leaf code itself; column `l` holds the code the leaf is
/// generalized to at level `l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    rows: Vec<Vec<u32>>,
    height: usize,
}

impl Hierarchy {
    /// Create a hierarchy, validating that all rows have the same height.
    pub fn new(rows: Vec<Vec<u32>>) -> Result<Self> {
        let height = rows
            .first()
            .map(|row| row.len())
            .ok_or_else(|| Error::Config("Hierarchy must contain at least one leaf".to_string()))?;
        if height == 0 {
            return Err(Error::Config(
                "Hierarchy rows must contain at least the leaf level".to_string(),
            ));
        }
        if let Some(index) = rows.iter().position(|row| row.len() != height) {
            return Err(Error::Config(format!(
                "Hierarchy row {} has {} levels, expected {}",
                index,
                rows[index].len(),
                height
            )));
        }
        Ok(Self { rows, height })
    }

    /// Number of levels including the leaf level.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of leaf values (domain size).
    pub fn leaves(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }

    /// Code of `leaf_row` at `level`.
    pub fn generalize(&self, leaf_row: usize, level: usize) -> Option<u32> {
        self.rows.get(leaf_row).and_then(|row| row.get(level)).copied()
    }

    /// Fraction of the leaf domain covered by each generalized value.
    pub fn domain_shares(&self) -> DomainShares {
        let leaves = self.rows.len() as f64;
        let levels = (0..self.height)
            .map(|level| {
                let mut covered: HashMap<u32, usize> = HashMap::new();
                for row in &self.rows {
                    *covered.entry(row[level]).or_insert(0) += 1;
                }
                covered
                    .into_iter()
                    .map(|(code, count)| (code, count as f64 / leaves))
                    .collect()
            })
            .collect();
        DomainShares {
            levels,
            domain_size: self.rows.len(),
        }
    }
}

/// Domain shares of one quasi-identifier, per (level, code).
#[derive(Debug, Clone, PartialEq)]
pub struct DomainShares {
    levels: Vec<HashMap<u32, f64>>,
    domain_size: usize,
}

impl DomainShares {
    /// Share of the domain collapsed into `code` at `level`.
    pub fn share(&self, level: usize, code: u32) -> Option<f64> {
        self.levels.get(level).and_then(|shares| shares.get(&code)).copied()
    }

    pub fn domain_size(&self) -> usize {
        self.domain_size
    }
}
