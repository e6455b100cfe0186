//! Suppression of records identified by short unique keys

use super::{Criterion, Discipline, MatrixCriterion, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, EnforcementOutcome, RecordMatrix};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;

/// No retained row may be singled out by `max_key_size` or fewer attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeySuppression {
    max_key_size: usize,
}

impl UniqueKeySuppression {
    pub fn new(max_key_size: usize) -> Result<Self> {
        if max_key_size == 0 {
            return Err(Error::Config(
                "Unique-key suppression requires a key size >= 1".to_string(),
            ));
        }
        Ok(Self { max_key_size })
    }
}

#[derive(Debug)]
struct UniqueKeyCondition {
    max_key_size: usize,
}

/// Rows suppressed in earlier rounds stay suppressed when the budget runs out.
impl MatrixCriterion for UniqueKeyCondition {
    fn enforce(
        &self,
        matrix: &mut RecordMatrix,
        max_suppressed: usize,
        interrupt: &InterruptFlag,
    ) -> Result<EnforcementOutcome> {
        let mut suppressed_now = 0;
        // Suppressing a row can make another row unique, so iterate to a fixpoint.
        loop {
            let rows = matrix.unique_rows(self.max_key_size, interrupt)?;
            if rows.is_empty() {
                return Ok(EnforcementOutcome::Satisfied {
                    suppressed_classes: suppressed_now,
                    suppressed_records: matrix.suppressed_rows(),
                });
            }
            if matrix.suppressed_rows() + rows.len() > max_suppressed {
                tracing::debug!(
                    unique = rows.len(),
                    suppressed = matrix.suppressed_rows(),
                    budget = max_suppressed,
                    "Unique keys exceed the suppression budget"
                );
                return Ok(EnforcementOutcome::BudgetExceeded {
                    suppressed_records: matrix.suppressed_rows(),
                    budget: max_suppressed,
                });
            }
            for (i, row) in rows.into_iter().enumerate() {
                interrupt.check_every(i)?;
                if matrix.suppress_row(row) {
                    suppressed_now += 1;
                }
            }
        }
    }
}

impl PrivacyModel for UniqueKeySuppression {
    fn name(&self) -> &'static str {
        "unique-key-suppression"
    }

    fn render(&self) -> String {
        format!("no unique keys of size <= {}", self.max_key_size)
    }

    fn discipline(&self) -> Discipline {
        Discipline::Matrix
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNT
    }

    /// Generalization can merge values that made a key unique, never split them.
    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        false
    }

    fn is_local_recoding_supported(&self) -> bool {
        false
    }

    fn initialize(&self, _context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        Ok(Criterion::matrix(
            self,
            UniqueKeyCondition {
                max_key_size: self.max_key_size,
            },
        ))
    }
}
