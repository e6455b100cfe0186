//! Record subsets (research subsets and differentially private samples)

use crate::error::{Error, Result};

/// Membership bitmap over the records of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSubset {
    members: Vec<bool>,
    size: usize,
}

impl DataSubset {
    /// Build from the indices of the member records.
    pub fn from_indices<I: IntoIterator<Item = usize>>(record_count: usize, indices: I) -> Result<Self> {
        let mut members = vec![false; record_count];
        for index in indices {
            let slot = members.get_mut(index).ok_or_else(|| {
                Error::Config(format!(
                    "Subset index {} out of range for {} records",
                    index, record_count
                ))
            })?;
            *slot = true;
        }
        Ok(Self::from_members(members))
    }

    /// Build from a membership bitmap.
    pub fn from_members(members: Vec<bool>) -> Self {
        let size = members.iter().filter(|m| **m).count();
        Self { members, size }
    }

    /// Whether record `index` belongs to the subset.
    pub fn contains(&self, index: usize) -> bool {
        self.members.get(index).copied().unwrap_or(false)
    }

    /// Number of member records.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of records in the underlying table.
    pub fn record_count(&self) -> usize {
        self.members.len()
    }

    /// Indices of the member records, ascending.
    pub fn indices(&self) -> Vec<usize> {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.then_some(i))
            .collect()
    }

    /// `size / record_count`.
    pub fn fraction(&self) -> f64 {
        if self.members.is_empty() {
            0.0
        } else {
            self.size as f64 / self.members.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subset_membership() {
        let subset = DataSubset::from_indices(5, [0, 3, 3]).unwrap();
        assert_eq!(subset.size(), 2);
        assert_eq!(subset.record_count(), 5);
        assert!(subset.contains(3));
        assert!(!subset.contains(1));
        assert!(!subset.contains(42));
        assert_eq!(subset.indices(), vec![0, 3]);
        assert!((subset.fraction() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_subset_rejects_out_of_range() {
        assert!(DataSubset::from_indices(2, [2]).is_err());
    }
}
