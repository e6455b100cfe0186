//! disclosure-guard - Privacy-model evaluation and enforcement core
//!
//! disclosure-guard decides whether one generalization of a microdata table
//! is privacy-preserving. A lattice search (not part of this crate) walks
//! candidate generalizations; a grouping engine (not part of this crate)
//! builds the equivalence classes of each candidate; the criteria in this
//! crate judge the classes and suppress what violates them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  JobConfig (TOML)  ──build──►  Box<dyn PrivacyModel> × n        │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ AnonymizationJob::initialize(&DataContext)
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Criterion × n                            │
//! │  ┌─────────────┐ ┌─────────────┐ ┌──────────────┐ ┌──────────┐  │
//! │  │  explicit   │ │  implicit   │ │ distribution │ │  matrix  │  │
//! │  │  per class  │ │  per class  │ │ enforcement  │ │ enforce  │  │
//! │  └──────┬──────┘ └──────┬──────┘ └──────┬───────┘ └────┬─────┘  │
//! └─────────┼───────────────┼───────────────┼──────────────┼────────┘
//!           └───────┬───────┘               │              │
//!                   ▼                       ▼              ▼
//!           EquivalenceClass        ClassDistribution  RecordMatrix
//! ```
//!
//! ## Modules
//!
//! - [`criteria`]: privacy models and the criterion contract
//! - [`data`]: equivalence classes, class distributions, record matrices
//! - [`derivation`]: parameter derivation (differential privacy, k-map, game theory)
//! - [`numeric`]: interval arithmetic and probability functions
//! - [`job`]: initialize-once job lifecycle and node evaluation
//! - [`snapshot`]: JSON table/node snapshots
//! - [`config`]: Configuration management

pub mod config;
pub mod criteria;
pub mod data;
pub mod derivation;
pub mod error;
pub mod interrupt;
pub mod job;
pub mod numeric;
pub mod snapshot;

pub use config::{JobConfig, Settings};
pub use criteria::{Criterion, Discipline, PrivacyModel, Requirements};
pub use error::{Error, Result};
pub use interrupt::InterruptFlag;
pub use job::{AnonymizationJob, NodeVerdict};
