//! In-memory data model handed over by the grouping engine
//!
//! The real grouping/hashing engine lives outside this crate. These types are
//! the contract it fulfils:
//!
//! - [`EquivalenceClass`]: one class at one lattice node
//! - [`ClassDistribution`]: all classes of a node, with suppression status bits
//! - [`RecordMatrix`]: the generalized rows of a node, for key-based criteria
//! - [`DataContext`]: whole-table statistics computed once per job

pub mod class;
pub mod context;
pub mod distribution;
pub mod hierarchy;
pub mod matrix;
pub mod subset;

pub use class::{Distribution, EquivalenceClass, QiKey, Transformation};
pub use context::{DataContext, DataContextBuilder, SensitiveAttribute};
pub use distribution::{ClassDistribution, EnforcementOutcome, RetainedView, SearchStrategy};
pub use hierarchy::{DomainShares, Hierarchy};
pub use matrix::{MinimalKey, RecordMatrix};
pub use subset::DataSubset;
