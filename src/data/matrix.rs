//! Generalized record matrix with row suppression and minimal-key search

use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use std::collections::{BTreeMap, BTreeSet};

/// Generalized quasi-identifier rows of the whole table at one node.
#[derive(Debug, Clone)]
pub struct RecordMatrix {
    rows: Vec<Vec<u32>>,
    width: usize,
    suppressed: Vec<bool>,
    suppressed_count: usize,
}

/// A combination of attributes whose values match exactly one retained row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MinimalKey {
    /// Row identified by the key
    pub row: usize,
    /// Attribute (column) indices, ascending
    pub attributes: Vec<usize>,
}

impl RecordMatrix {
    /// Create a matrix; all rows must have the same width.
    pub fn new(rows: Vec<Vec<u32>>) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(index) = rows.iter().position(|row| row.len() != width) {
            return Err(Error::Config(format!(
                "Row {} has {} columns, expected {}",
                index,
                rows[index].len(),
                width
            )));
        }
        let suppressed = vec![false; rows.len()];
        Ok(Self {
            rows,
            width,
            suppressed,
            suppressed_count: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of attributes per row.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, index: usize) -> Option<&[u32]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn is_suppressed(&self, index: usize) -> bool {
        self.suppressed.get(index).copied().unwrap_or(false)
    }

    /// Number of suppressed rows.
    pub fn suppressed_rows(&self) -> usize {
        self.suppressed_count
    }

    /// Suppress one row. Returns `false` if it already was or does not exist.
    pub fn suppress_row(&mut self, index: usize) -> bool {
        match self.suppressed.get_mut(index) {
            Some(flag) if !*flag => {
                *flag = true;
                self.suppressed_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Suppress every retained row matching `predicate`; returns how many.
    pub fn suppress_matching<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&[u32]) -> bool,
    {
        let matching: Vec<usize> = self
            .retained()
            .filter(|&index| predicate(&self.rows[index]))
            .collect();
        matching
            .into_iter()
            .filter(|&index| self.suppress_row(index))
            .count()
    }

    fn retained(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows.len()).filter(move |&index| !self.suppressed[index])
    }

    /// All minimal keys of at most `max_key_size` attributes among retained rows.
    ///
    /// A key is minimal when no proper subset of its attributes identifies
    /// the same row.
    pub fn minimal_keys(
        &self,
        max_key_size: usize,
        interrupt: &InterruptFlag,
    ) -> Result<Vec<MinimalKey>> {
        let mut found = Vec::new();
        if max_key_size == 0 {
            return Ok(found);
        }
        let group: Vec<usize> = self.retained().collect();
        let mut combination = Vec::with_capacity(max_key_size);
        self.refine(
            &group,
            0,
            &mut combination,
            max_key_size,
            &mut found,
            interrupt,
        )?;

        let mut by_row: BTreeMap<usize, Vec<Vec<usize>>> = BTreeMap::new();
        for key in found {
            by_row.entry(key.row).or_default().push(key.attributes);
        }

        let mut minimal = Vec::new();
        for (row, mut keys) in by_row {
            keys.sort_by_key(Vec::len);
            let mut kept: Vec<Vec<usize>> = Vec::new();
            for key in keys {
                if !kept.iter().any(|shorter| is_subset(shorter, &key)) {
                    kept.push(key);
                }
            }
            minimal.extend(kept.into_iter().map(|attributes| MinimalKey { row, attributes }));
        }
        minimal.sort();
        Ok(minimal)
    }

    /// Retained rows that carry at least one key of at most `max_key_size` attributes.
    pub fn unique_rows(&self, max_key_size: usize, interrupt: &InterruptFlag) -> Result<Vec<usize>> {
        let rows: BTreeSet<usize> = self
            .minimal_keys(max_key_size, interrupt)?
            .into_iter()
            .map(|key| key.row)
            .collect();
        Ok(rows.into_iter().collect())
    }

    /// Partition `group` (rows agreeing on `combination`) by each further attribute.
    fn refine(
        &self,
        group: &[usize],
        first_attribute: usize,
        combination: &mut Vec<usize>,
        max_key_size: usize,
        found: &mut Vec<MinimalKey>,
        interrupt: &InterruptFlag,
    ) -> Result<()> {
        for attribute in first_attribute..self.width {
            let mut partition: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (i, &row) in group.iter().enumerate() {
                interrupt.check_every(i)?;
                partition
                    .entry(self.rows[row][attribute])
                    .or_default()
                    .push(row);
            }
            interrupt.check()?;

            combination.push(attribute);
            for members in partition.values() {
                if members.len() == 1 {
                    found.push(MinimalKey {
                        row: members[0],
                        attributes: combination.clone(),
                    });
                } else if combination.len() < max_key_size {
                    self.refine(
                        members,
                        attribute + 1,
                        combination,
                        max_key_size,
                        found,
                        interrupt,
                    )?;
                }
            }
            combination.pop();
        }
        Ok(())
    }
}

/// Both slices are ascending.
fn is_subset(small: &[usize], large: &[usize]) -> bool {
    small.iter().all(|a| large.binary_search(a).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn matrix() -> RecordMatrix {
        // Row 4 is the only row with (a=1, b=1); every single value is shared.
        RecordMatrix::new(vec![
            vec![0, 0, 5],
            vec![0, 0, 5],
            vec![1, 0, 5],
            vec![1, 0, 5],
            vec![1, 1, 5],
            vec![0, 1, 5],
            vec![0, 1, 5],
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = RecordMatrix::new(vec![vec![1, 2], vec![3]]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(RecordMatrix::new(vec![]).unwrap().width(), 0);
    }

    #[test]
    fn test_minimal_key_of_two_attributes() {
        let keys = matrix().minimal_keys(3, &InterruptFlag::new()).unwrap();
        assert_eq!(
            keys,
            vec![MinimalKey {
                row: 4,
                attributes: vec![0, 1]
            }]
        );
    }

    #[test]
    fn test_keys_longer_than_limit_are_ignored() {
        let keys = matrix().minimal_keys(1, &InterruptFlag::new()).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_single_attribute_key_hides_supersets() {
        let m = RecordMatrix::new(vec![vec![7, 1], vec![8, 1], vec![8, 1]]).unwrap();
        let keys = m.minimal_keys(2, &InterruptFlag::new()).unwrap();
        assert_eq!(
            keys,
            vec![MinimalKey {
                row: 0,
                attributes: vec![0]
            }]
        );
    }

    #[test]
    fn test_suppressed_rows_are_ignored() {
        let mut m = matrix();
        assert!(m.suppress_row(4));
        assert!(!m.suppress_row(4));
        assert!(m.unique_rows(3, &InterruptFlag::new()).unwrap().is_empty());
        assert_eq!(m.suppressed_rows(), 1);
    }

    #[test]
    fn test_suppression_can_expose_new_keys() {
        let mut m = matrix();
        m.suppress_row(3);
        assert_eq!(m.unique_rows(3, &InterruptFlag::new()).unwrap(), vec![2, 4]);
    }

    #[test]
    fn test_suppress_matching() {
        let mut m = matrix();
        assert_eq!(m.suppress_matching(|row| row[1] == 1), 3);
        assert_eq!(m.suppress_matching(|row| row[1] == 1), 0);
        assert_eq!(m.suppressed_rows(), 3);
    }

    #[test]
    fn test_interrupt_aborts_search() {
        let interrupt = InterruptFlag::new();
        interrupt.raise();
        let result = matrix().minimal_keys(3, &interrupt);
        assert!(matches!(result, Err(Error::Interrupted)));
    }
}
