//! Game-theoretic (profitability) models
//!
//! A publisher and an adversary play a one-shot game per class. The
//! publisher earns `benefit · (1 − IL)` for releasing the class, where IL is
//! the class's entropy-based information loss, and loses `loss · p` if the
//! adversary attacks and succeeds with probability `p`. The adversary
//! attacks iff `gain · p − cost > 0`. A class is released iff the
//! publisher's payoff is positive.
//!
//! In the no-attack variant the publisher refuses any class an attack on
//! which would be profitable, which reduces to a minimum class size of
//! `⌈gain / cost⌉`.

use super::k_anonymity::{MinimumClassSize, MinimumPopulationSize};
use super::{ClassCriterion, Criterion, Discipline, PrivacyModel, Requirements};
use crate::config::Settings;
use crate::data::{DataContext, DomainShares, EquivalenceClass, Transformation};
use crate::derivation::game::no_attack_k;
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use serde::{Deserialize, Serialize};

/// Monetary parameters of the publisher/adversary game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBenefit {
    /// Publisher's benefit for releasing one record without information loss
    pub publisher_benefit: f64,
    /// Publisher's loss when a record is re-identified
    pub publisher_loss: f64,
    /// Adversary's cost of one attack
    pub adversary_cost: f64,
    /// Adversary's gain from one successful attack
    pub adversary_gain: f64,
}

impl CostBenefit {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("publisher_benefit", self.publisher_benefit),
            ("publisher_loss", self.publisher_loss),
            ("adversary_cost", self.adversary_cost),
            ("adversary_gain", self.adversary_gain),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "{} must be a finite non-negative amount, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Who the adversary targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackerModel {
    /// Knows the target is in the sample; success probability 1/count
    Prosecutor,
    /// Knows the target is in the population; success probability 1/population count
    Journalist,
}

/// Release a class only if doing so is profitable for the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct Profitability {
    attacker: AttackerModel,
    costs: CostBenefit,
    attack: bool,
}

impl Profitability {
    pub fn new(attacker: AttackerModel, costs: CostBenefit) -> Result<Self> {
        costs.validate()?;
        Ok(Self {
            attacker,
            costs,
            attack: true,
        })
    }

    /// Variant in which the publisher never lets an attack pay off.
    pub fn no_attack(attacker: AttackerModel, costs: CostBenefit) -> Result<Self> {
        costs.validate()?;
        no_attack_k(costs.adversary_gain, costs.adversary_cost)?;
        Ok(Self {
            attacker,
            costs,
            attack: false,
        })
    }
}

/// Information loss of one class in `[0, 1]`.
#[derive(Debug)]
struct InformationLoss {
    shares: Vec<DomainShares>,
    denominator: f64,
}

impl InformationLoss {
    fn new(shares: Vec<DomainShares>) -> Self {
        let denominator = shares
            .iter()
            .filter(|s| s.domain_size() > 1)
            .map(|s| (s.domain_size() as f64).log2())
            .sum();
        Self {
            shares,
            denominator,
        }
    }

    fn of(&self, node: &Transformation, entry: &EquivalenceClass) -> f64 {
        if self.denominator == 0.0 {
            return 0.0;
        }
        let codes = entry.key().codes();
        let numerator: f64 = self
            .shares
            .iter()
            .enumerate()
            .filter(|(_, s)| s.domain_size() > 1)
            .map(|(dimension, s)| {
                let share = codes
                    .get(dimension)
                    .and_then(|&code| s.share(node.level(dimension), code))
                    .unwrap_or(1.0);
                (share * s.domain_size() as f64).log2()
            })
            .sum();
        (numerator / self.denominator).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
struct PayoffTest {
    attacker: AttackerModel,
    costs: CostBenefit,
    loss: InformationLoss,
}

impl PayoffTest {
    fn publisher_payoff(&self, information_loss: f64, success_probability: f64) -> f64 {
        let c = &self.costs;
        let attacks = c.adversary_gain * success_probability - c.adversary_cost > 0.0;
        let expected_loss = if attacks {
            c.publisher_loss * success_probability
        } else {
            0.0
        };
        c.publisher_benefit * (1.0 - information_loss) - expected_loss
    }
}

impl ClassCriterion for PayoffTest {
    fn is_anonymous(
        &self,
        node: &Transformation,
        entry: &EquivalenceClass,
        _interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let success_probability = match self.attacker {
            AttackerModel::Prosecutor => {
                if entry.count() == 0 {
                    return Ok(false);
                }
                1.0 / entry.count() as f64
            }
            AttackerModel::Journalist => {
                // Nothing from the sample is released, so nothing can be attacked.
                if entry.count() == 0 {
                    return Ok(true);
                }
                match entry.population_count() {
                    Some(population) if population > 0 => 1.0 / population as f64,
                    _ => return Ok(false),
                }
            }
        };
        let information_loss = self.loss.of(node, entry);
        Ok(self.publisher_payoff(information_loss, success_probability) > 0.0)
    }
}

impl PrivacyModel for Profitability {
    fn name(&self) -> &'static str {
        match (self.attacker, self.attack) {
            (AttackerModel::Prosecutor, true) => "profitability-prosecutor",
            (AttackerModel::Journalist, true) => "profitability-journalist",
            (AttackerModel::Prosecutor, false) => "profitability-prosecutor-no-attack",
            (AttackerModel::Journalist, false) => "profitability-journalist-no-attack",
        }
    }

    fn render(&self) -> String {
        let attacker = match self.attacker {
            AttackerModel::Prosecutor => "prosecutor",
            AttackerModel::Journalist => "journalist",
        };
        let c = &self.costs;
        format!(
            "profitability ({}{}, benefit={}, loss={}, cost={}, gain={})",
            attacker,
            if self.attack { "" } else { ", no attack" },
            c.publisher_benefit,
            c.publisher_loss,
            c.adversary_cost,
            c.adversary_gain
        )
    }

    fn discipline(&self) -> Discipline {
        Discipline::ImplicitPerClass
    }

    fn requirements(&self) -> Requirements {
        match self.attacker {
            AttackerModel::Prosecutor => Requirements::COUNT,
            AttackerModel::Journalist => Requirements::COUNT | Requirements::POPULATION_COUNT,
        }
    }

    /// Generalization raises information loss and can flip the payoff sign.
    fn is_monotonic_with_generalization(&self) -> bool {
        !self.attack
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn is_local_recoding_supported(&self) -> bool {
        !self.attack
    }

    fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
        let subset = match self.attacker {
            AttackerModel::Prosecutor => None,
            AttackerModel::Journalist => Some(context.research_subset().cloned().ok_or_else(|| {
                Error::Config("The journalist model requires a research subset".to_string())
            })?),
        };

        let criterion = if self.attack {
            let shares = (0..context.quasi_identifiers().len())
                .map(|dimension| {
                    context.domain_shares(dimension).cloned().ok_or_else(|| {
                        Error::Config(format!(
                            "Profitability requires a hierarchy for quasi-identifier '{}'",
                            context.quasi_identifiers()[dimension]
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Criterion::implicit(
                self,
                PayoffTest {
                    attacker: self.attacker,
                    costs: self.costs,
                    loss: InformationLoss::new(shares),
                },
            )
        } else {
            let k = no_attack_k(self.costs.adversary_gain, self.costs.adversary_cost)?;
            tracing::debug!(k, criterion = self.name(), "Derived no-attack class size");
            let criterion = match self.attacker {
                AttackerModel::Prosecutor => Criterion::implicit(self, MinimumClassSize { k }),
                AttackerModel::Journalist => Criterion::implicit(self, MinimumPopulationSize { k }),
            };
            criterion.with_parameter("k", k as f64)
        };

        Ok(match subset {
            Some(subset) => criterion.with_subset(subset),
            None => criterion,
        })
    }
}
