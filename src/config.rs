//! disclosure-guard configuration management

use crate::criteria::{
    AttackerModel, AverageReidentificationRisk, BasicBLikeness, CostBenefit, DDisclosurePrivacy,
    DPresence, DistinctLDiversity, EdDifferentialPrivacy, EnhancedBLikeness,
    EntropyLDiversity, EqualDistanceTCloseness, HierarchicalDistanceTCloseness, KAnonymity, KMap,
    KMapEstimator, OrderedDistanceTCloseness, PopulationUniqueness, PrivacyModel, Profitability,
    RecursiveClDiversity, SampleUniqueness, UniqueKeySuppression,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Job-wide settings every criterion sees at initialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Suppression budget
    #[serde(default)]
    pub suppression: SuppressionConfig,

    /// Randomness used by sampling criteria
    #[serde(default)]
    pub random: RandomConfig,
}

impl Settings {
    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let limit = self.suppression.limit;
        if !(0.0..=1.0).contains(&limit) {
            return Err(Error::Config(format!(
                "Suppression limit must be in [0, 1], got {}",
                limit
            )));
        }
        Ok(())
    }
}

/// Suppression budget configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionConfig {
    /// Fraction of records that may be suppressed per node
    pub limit: f64,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self { limit: 0.0 }
    }
}

impl SuppressionConfig {
    /// Maximum number of suppressed records for a table of `records` rows.
    pub fn max_suppressed(&self, records: usize) -> usize {
        (self.limit * records as f64).floor() as usize
    }
}

/// Random number generation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomConfig {
    /// Use a seeded generator instead of the operating system's RNG.
    /// Only meant for reproducible tests.
    pub deterministic: bool,

    /// Seed for deterministic mode
    pub seed: u64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            deterministic: false,
            seed: 0xDEAD_BEEF,
        }
    }
}

/// One configured privacy model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriterionConfig {
    KAnonymity {
        k: usize,
    },
    DistinctLDiversity {
        attribute: String,
        l: usize,
    },
    EntropyLDiversity {
        attribute: String,
        l: f64,
    },
    RecursiveClDiversity {
        attribute: String,
        c: f64,
        l: usize,
    },
    EqualDistanceTCloseness {
        attribute: String,
        t: f64,
    },
    OrderedDistanceTCloseness {
        attribute: String,
        t: f64,
    },
    HierarchicalDistanceTCloseness {
        attribute: String,
        t: f64,
    },
    DPresence {
        d_min: f64,
        d_max: f64,
    },
    BasicBLikeness {
        attribute: String,
        b: f64,
    },
    EnhancedBLikeness {
        attribute: String,
        b: f64,
        #[serde(default)]
        reliable: bool,
    },
    DDisclosurePrivacy {
        attribute: String,
        d: f64,
        #[serde(default)]
        reliable: bool,
    },
    Profitability {
        attacker: AttackerModel,
        #[serde(default = "default_true")]
        attack: bool,
        costs: CostBenefit,
    },
    KMap {
        k: usize,
        #[serde(default)]
        estimator: KMapEstimator,
    },
    DifferentialPrivacy {
        epsilon: f64,
        delta: f64,
    },
    AverageRisk {
        threshold: f64,
        #[serde(default)]
        reliable: bool,
    },
    SampleUniqueness {
        threshold: f64,
    },
    PopulationUniqueness {
        threshold: f64,
    },
    UniqueKeys {
        max_key_size: usize,
    },
}

fn default_true() -> bool {
    true
}

impl CriterionConfig {
    /// Build the validated model.
    pub fn build(&self) -> Result<Box<dyn PrivacyModel>> {
        Ok(match self {
            Self::KAnonymity { k } => Box::new(KAnonymity::new(*k)?),
            Self::DistinctLDiversity { attribute, l } => {
                Box::new(DistinctLDiversity::new(attribute.clone(), *l)?)
            }
            Self::EntropyLDiversity { attribute, l } => {
                Box::new(EntropyLDiversity::new(attribute.clone(), *l)?)
            }
            Self::RecursiveClDiversity { attribute, c, l } => {
                Box::new(RecursiveClDiversity::new(attribute.clone(), *c, *l)?)
            }
            Self::EqualDistanceTCloseness { attribute, t } => {
                Box::new(EqualDistanceTCloseness::new(attribute.clone(), *t)?)
            }
            Self::OrderedDistanceTCloseness { attribute, t } => {
                Box::new(OrderedDistanceTCloseness::new(attribute.clone(), *t)?)
            }
            Self::HierarchicalDistanceTCloseness { attribute, t } => {
                Box::new(HierarchicalDistanceTCloseness::new(attribute.clone(), *t)?)
            }
            Self::DPresence { d_min, d_max } => Box::new(DPresence::new(*d_min, *d_max)?),
            Self::BasicBLikeness { attribute, b } => {
                Box::new(BasicBLikeness::new(attribute.clone(), *b)?)
            }
            Self::EnhancedBLikeness {
                attribute,
                b,
                reliable,
            } => {
                let model = EnhancedBLikeness::new(attribute.clone(), *b)?;
                Box::new(if *reliable { model.reliable() } else { model })
            }
            Self::DDisclosurePrivacy {
                attribute,
                d,
                reliable,
            } => {
                let model = DDisclosurePrivacy::new(attribute.clone(), *d)?;
                Box::new(if *reliable { model.reliable() } else { model })
            }
            Self::Profitability {
                attacker,
                attack,
                costs,
            } => {
                if *attack {
                    Box::new(Profitability::new(*attacker, *costs)?)
                } else {
                    Box::new(Profitability::no_attack(*attacker, *costs)?)
                }
            }
            Self::KMap { k, estimator } => Box::new(KMap::new(*k, *estimator)?),
            Self::DifferentialPrivacy { epsilon, delta } => {
                Box::new(EdDifferentialPrivacy::new(*epsilon, *delta)?)
            }
            Self::AverageRisk {
                threshold,
                reliable,
            } => {
                let model = AverageReidentificationRisk::new(*threshold)?;
                Box::new(if *reliable { model.reliable() } else { model })
            }
            Self::SampleUniqueness { threshold } => Box::new(SampleUniqueness::new(*threshold)?),
            Self::PopulationUniqueness { threshold } => {
                Box::new(PopulationUniqueness::new(*threshold)?)
            }
            Self::UniqueKeys { max_key_size } => {
                Box::new(UniqueKeySuppression::new(*max_key_size)?)
            }
        })
    }
}

/// Main job configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Suppression budget
    #[serde(default)]
    pub suppression: SuppressionConfig,

    /// Randomness used by sampling criteria
    #[serde(default)]
    pub random: RandomConfig,

    /// Privacy models, all of which must hold
    #[serde(default)]
    pub criteria: Vec<CriterionConfig>,
}

impl JobConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: JobConfig = toml::from_str(content)?;
        config.settings().validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            suppression: self.suppression.clone(),
            random: self.random.clone(),
        }
    }

    /// Build every configured model, failing on the first invalid one.
    pub fn build_models(&self) -> Result<Vec<Box<dyn PrivacyModel>>> {
        self.criteria.iter().map(CriterionConfig::build).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Discipline;
    use std::io::Write;

    const EXAMPLE: &str = r#"
[suppression]
limit = 0.05

[random]
deterministic = true
seed = 7

[[criteria]]
type = "k_anonymity"
k = 5

[[criteria]]
type = "entropy_l_diversity"
attribute = "disease"
l = 3.0

[[criteria]]
type = "k_map"
k = 10
estimator = { kind = "poisson", significance = 0.05 }

[[criteria]]
type = "profitability"
attacker = "journalist"
attack = false
costs = { publisher_benefit = 1200.0, publisher_loss = 300.0, adversary_cost = 4.0, adversary_gain = 300.0 }

[[criteria]]
type = "unique_keys"
max_key_size = 3
"#;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.suppression.limit, 0.0);
        assert!(!settings.random.deterministic);
        assert_eq!(settings.random.seed, 0xDEAD_BEEF);
        assert_eq!(settings.suppression.max_suppressed(1000), 0);
    }

    #[test]
    fn test_parse_job_config() {
        let config = JobConfig::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.suppression.limit, 0.05);
        assert_eq!(config.suppression.max_suppressed(99), 4);
        assert!(config.random.deterministic);
        assert_eq!(config.criteria.len(), 5);
        assert_eq!(config.criteria[0], CriterionConfig::KAnonymity { k: 5 });
        assert_eq!(
            config.criteria[2],
            CriterionConfig::KMap {
                k: 10,
                estimator: KMapEstimator::Poisson { significance: 0.05 }
            }
        );

        let models = config.build_models().unwrap();
        assert_eq!(models[0].render(), "5-anonymity");
        assert_eq!(models[3].name(), "profitability-journalist-no-attack");
        assert_eq!(models[4].discipline(), Discipline::Matrix);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let config = JobConfig::from_toml_str(
            r#"
[[criteria]]
type = "k_map"
k = 3

[[criteria]]
type = "average_risk"
threshold = 0.1
"#,
        )
        .unwrap();
        assert_eq!(config.suppression, SuppressionConfig::default());
        assert_eq!(
            config.criteria[0],
            CriterionConfig::KMap {
                k: 3,
                estimator: KMapEstimator::Exact
            }
        );
        assert_eq!(
            config.criteria[1],
            CriterionConfig::AverageRisk {
                threshold: 0.1,
                reliable: false
            }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(JobConfig::from_toml_str("[suppression]\nlimit = 1.5\n").is_err());

        let config = JobConfig::from_toml_str("[[criteria]]\ntype = \"d_presence\"\nd_min = 0.6\nd_max = 0.5\n").unwrap();
        assert!(matches!(config.build_models(), Err(Error::Config(_))));

        let err = JobConfig::from_toml_str("[[criteria]]\ntype = \"no_such_model\"\n").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();
        let config = JobConfig::load(file.path()).unwrap();
        assert_eq!(config.criteria.len(), 5);

        assert!(matches!(
            JobConfig::load("/nonexistent/disclosure-guard.toml"),
            Err(Error::Io(_))
        ));
    }
}
