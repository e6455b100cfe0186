//! Capability bits a criterion needs the grouping engine to materialize

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of per-class statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Requirements(u8);

impl Requirements {
    /// Nothing
    pub const NONE: Requirements = Requirements(0);
    /// Sample count per class
    pub const COUNT: Requirements = Requirements(1);
    /// Population (research-subset superset) count per class
    pub const POPULATION_COUNT: Requirements = Requirements(1 << 1);
    /// Sensitive-value distribution per class
    pub const DISTRIBUTION: Requirements = Requirements(1 << 2);

    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(&self, other: Requirements) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Requirements) -> Requirements {
        Requirements(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Requirements {
    type Output = Requirements;

    fn bitor(self, rhs: Requirements) -> Requirements {
        self.union(rhs)
    }
}

impl BitOrAssign for Requirements {
    fn bitor_assign(&mut self, rhs: Requirements) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Requirements::COUNT, "count"),
            (Requirements::POPULATION_COUNT, "population_count"),
            (Requirements::DISTRIBUTION, "distribution"),
        ]
        .iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| *name)
        .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

impl Serialize for Requirements {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_contains() {
        let mask = Requirements::COUNT | Requirements::DISTRIBUTION;
        assert!(mask.contains(Requirements::COUNT));
        assert!(mask.contains(Requirements::DISTRIBUTION));
        assert!(!mask.contains(Requirements::POPULATION_COUNT));
        assert!(mask.contains(Requirements::NONE));
        assert_eq!(mask.bits(), 0b101);
    }

    #[test]
    fn test_display() {
        assert_eq!(Requirements::NONE.to_string(), "none");
        let mut mask = Requirements::COUNT;
        mask |= Requirements::POPULATION_COUNT;
        assert_eq!(mask.to_string(), "count|population_count");
    }
}
