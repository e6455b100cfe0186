//! Per-node class distribution with in-place suppression
//!
//! The distribution owns every class of one lattice node in an arena.
//! Suppression flips a status bit; indices stay stable for the whole
//! enforcement call.
//!
//! ## Enforcement schedule
//!
//! ```text
//! rank retained classes by risk (desc, ties by index)
//!        ↓
//! budget → largest affordable prefix of the ranking
//!        ↓
//! probe prefixes 1, 2, 4, … (Binary) or 1, 2, 3, … (Linear)
//!        ↓
//! bisect between last failing and first passing probe
//!        ↓
//! suppress the minimal passing prefix, or report BudgetExceeded
//! ```

use super::class::EquivalenceClass;
use crate::error::Result;
use crate::interrupt::InterruptFlag;
use serde::{Deserialize, Serialize};

/// How the minimal suppression prefix is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Probe every prefix length in turn
    Linear,
    /// Galloping probes followed by bisection
    #[default]
    Binary,
}

/// Result of an enforcement call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnforcementOutcome {
    /// The global condition holds after suppressing `suppressed_classes` more classes
    Satisfied {
        /// Classes (or rows) newly suppressed by this call
        suppressed_classes: usize,
        /// Total suppressed records after the call
        suppressed_records: usize,
    },
    /// The condition cannot be met within the suppression budget
    BudgetExceeded {
        /// Suppressed records when the call gave up
        suppressed_records: usize,
        /// Maximum number of suppressed records allowed
        budget: usize,
    },
}

impl EnforcementOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    pub fn suppressed_records(&self) -> usize {
        match self {
            Self::Satisfied {
                suppressed_records, ..
            }
            | Self::BudgetExceeded {
                suppressed_records, ..
            } => *suppressed_records,
        }
    }
}

/// Read-only view of the classes that would remain after a probe.
#[derive(Debug)]
pub struct RetainedView<'a> {
    classes: &'a [EquivalenceClass],
    excluded: &'a [bool],
    class_count: usize,
    record_count: usize,
}

impl<'a> RetainedView<'a> {
    fn new(classes: &'a [EquivalenceClass], excluded: &'a [bool]) -> Self {
        let (class_count, record_count) = classes
            .iter()
            .zip(excluded.iter())
            .filter(|(_, excluded)| !**excluded)
            .fold((0, 0), |(c, r), (class, _)| (c + 1, r + class.count()));
        Self {
            classes,
            excluded,
            class_count,
            record_count,
        }
    }

    /// Retained classes.
    pub fn iter(&self) -> impl Iterator<Item = &'a EquivalenceClass> + '_ {
        self.classes
            .iter()
            .zip(self.excluded.iter())
            .filter(|(_, excluded)| !**excluded)
            .map(|(class, _)| class)
    }

    /// Number of retained classes.
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Number of retained records.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

/// All classes of one lattice node plus their suppression state.
#[derive(Debug, Clone)]
pub struct ClassDistribution {
    classes: Vec<EquivalenceClass>,
    suppressed: Vec<bool>,
    suppressed_records: usize,
}

impl ClassDistribution {
    /// Take ownership of a node's classes. Outlier classes start suppressed.
    pub fn new(classes: Vec<EquivalenceClass>) -> Self {
        let suppressed: Vec<bool> = classes.iter().map(EquivalenceClass::is_outlier).collect();
        let suppressed_records = classes
            .iter()
            .filter(|c| c.is_outlier())
            .map(EquivalenceClass::count)
            .sum();
        Self {
            classes,
            suppressed,
            suppressed_records,
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[EquivalenceClass] {
        &self.classes
    }

    pub fn class(&self, index: usize) -> Option<&EquivalenceClass> {
        self.classes.get(index)
    }

    pub fn is_suppressed(&self, index: usize) -> bool {
        self.suppressed.get(index).copied().unwrap_or(false)
    }

    /// Records in suppressed classes.
    pub fn suppressed_records(&self) -> usize {
        self.suppressed_records
    }

    /// All records of the node.
    pub fn record_count(&self) -> usize {
        self.classes.iter().map(EquivalenceClass::count).sum()
    }

    /// View over the classes that are currently not suppressed.
    pub fn retained(&self) -> RetainedView<'_> {
        RetainedView::new(&self.classes, &self.suppressed)
    }

    /// Suppress the class at `index`. Returns `false` if it already was.
    pub fn suppress(&mut self, index: usize) -> bool {
        match self.suppressed.get_mut(index) {
            Some(flag) if !*flag => {
                *flag = true;
                self.suppressed_records += self.classes[index].count();
                true
            }
            _ => false,
        }
    }

    /// Indices of retained classes ordered by descending risk, ties by index.
    pub fn rank_by<F>(&self, risk: F) -> Vec<usize>
    where
        F: Fn(&EquivalenceClass) -> f64,
    {
        let mut ranked: Vec<(usize, f64)> = self
            .classes
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.suppressed[*i])
            .map(|(i, class)| (i, risk(class)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.into_iter().map(|(i, _)| i).collect()
    }

    /// Suppress the shortest prefix of `ranking` after which `predicate`
    /// holds, without exceeding `max_suppressed` records in total.
    ///
    /// The budget covers records suppressed before the call (outliers and
    /// earlier criteria). A distribution already over budget yields
    /// `BudgetExceeded` even when `predicate` holds without further
    /// suppression.
    ///
    /// `predicate` must be monotone in the prefix length for the binary
    /// strategy to agree with the linear one.
    pub fn suppress_until<P>(
        &mut self,
        ranking: &[usize],
        predicate: P,
        max_suppressed: usize,
        strategy: SearchStrategy,
        interrupt: &InterruptFlag,
    ) -> Result<EnforcementOutcome>
    where
        P: Fn(&RetainedView<'_>) -> bool,
    {
        let mut prefix_records = Vec::with_capacity(ranking.len() + 1);
        prefix_records.push(0usize);
        for &index in ranking {
            let last = prefix_records[prefix_records.len() - 1];
            prefix_records.push(last + self.classes[index].count());
        }

        let affordable = prefix_records
            .iter()
            .rposition(|records| self.suppressed_records + records <= max_suppressed);

        let minimal = match affordable {
            None => None,
            Some(affordable) => match strategy {
                SearchStrategy::Linear => {
                    self.linear_search(ranking, affordable, &predicate, interrupt)?
                }
                SearchStrategy::Binary => {
                    self.galloping_search(ranking, affordable, &predicate, interrupt)?
                }
            },
        };

        match minimal {
            Some(length) => {
                for &index in &ranking[..length] {
                    self.suppress(index);
                }
                Ok(EnforcementOutcome::Satisfied {
                    suppressed_classes: length,
                    suppressed_records: self.suppressed_records,
                })
            }
            None => Ok(EnforcementOutcome::BudgetExceeded {
                suppressed_records: self.suppressed_records,
                budget: max_suppressed,
            }),
        }
    }

    fn linear_search<P>(
        &self,
        ranking: &[usize],
        affordable: usize,
        predicate: &P,
        interrupt: &InterruptFlag,
    ) -> Result<Option<usize>>
    where
        P: Fn(&RetainedView<'_>) -> bool,
    {
        for length in 0..=affordable {
            if self.holds_after(ranking, length, predicate, interrupt)? {
                return Ok(Some(length));
            }
        }
        Ok(None)
    }

    fn galloping_search<P>(
        &self,
        ranking: &[usize],
        affordable: usize,
        predicate: &P,
        interrupt: &InterruptFlag,
    ) -> Result<Option<usize>>
    where
        P: Fn(&RetainedView<'_>) -> bool,
    {
        if self.holds_after(ranking, 0, predicate, interrupt)? {
            return Ok(Some(0));
        }

        let mut failing = 0;
        let mut step = 1;
        let passing = loop {
            let probe = step.min(affordable);
            if probe <= failing {
                return Ok(None);
            }
            if self.holds_after(ranking, probe, predicate, interrupt)? {
                break probe;
            }
            failing = probe;
            step *= 2;
        };

        let (mut low, mut high) = (failing, passing);
        while high - low > 1 {
            let mid = low + (high - low) / 2;
            if self.holds_after(ranking, mid, predicate, interrupt)? {
                high = mid;
            } else {
                low = mid;
            }
        }
        Ok(Some(high))
    }

    fn holds_after<P>(
        &self,
        ranking: &[usize],
        length: usize,
        predicate: &P,
        interrupt: &InterruptFlag,
    ) -> Result<bool>
    where
        P: Fn(&RetainedView<'_>) -> bool,
    {
        interrupt.check()?;
        let mut excluded = self.suppressed.clone();
        for (i, &index) in ranking[..length].iter().enumerate() {
            interrupt.check_every(i)?;
            excluded[index] = true;
        }
        let view = RetainedView::new(&self.classes, &excluded);
        Ok(predicate(&view))
    }
}
