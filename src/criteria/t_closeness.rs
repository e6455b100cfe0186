//! t-closeness with equal, ordered and hierarchical ground distances
//!
//! All three variants bound the earth mover's distance between a class's
//! sensitive-value distribution and the table-wide distribution.
//!
//! - **Equal**: every pair of values is at distance 1, EMD = ½·Σ|p_i − q_i|.
//! - **Ordered**: values lie on a line of `m` positions, EMD =
//!   Σ_i |Σ_{j≤i}(p_j − q_j)| / (m − 1).
//! - **Hierarchical**: values are leaves of a tree of height `H`, EMD sums
//!   the mass that must cross each inner node weighted by `level / H`.

use super::{
    sensitive_attribute, table_frequencies, ClassCriterion, Criterion, Discipline, PrivacyModel,
    Requirements,
};
use crate::config::Settings;
use crate::data::{DataContext, Distribution, EquivalenceClass, Transformation};
use crate::error::{Error, Result};
use crate::interrupt::InterruptFlag;
use std::collections::{BTreeMap, HashMap};

/// Absorbs rounding in accumulated distances.
const DISTANCE_TOLERANCE: f64 = 1e-10;

fn validate_t(t: f64) -> Result<()> {
    if !t.is_finite() || t < 0.0 {
        return Err(Error::Config(format!("t-closeness requires t >= 0, got {}", t)));
    }
    Ok(())
}

macro_rules! t_closeness_model {
    ($model:ident, $name:literal, $label:literal) => {
        impl $model {
            pub fn new(attribute: impl Into<String>, t: f64) -> Result<Self> {
                validate_t(t)?;
                Ok(Self {
                    attribute: attribute.into(),
                    t,
                })
            }
        }

        impl PrivacyModel for $model {
            fn name(&self) -> &'static str {
                $name
            }

            fn render(&self) -> String {
                format!(
                    "{}-closeness with {} distance for attribute '{}'",
                    self.t, $label, self.attribute
                )
            }

            fn discipline(&self) -> Discipline {
                Discipline::ExplicitPerClass
            }

            fn requirements(&self) -> Requirements {
                Requirements::COUNT | Requirements::DISTRIBUTION
            }

            fn is_monotonic_with_generalization(&self) -> bool {
                true
            }

            fn is_monotonic_with_suppression(&self) -> bool {
                true
            }

            fn initialize(&self, context: &DataContext, _settings: &Settings) -> Result<Criterion> {
                Ok(Criterion::explicit(self, self.prepare(context)?))
            }
        }
    };
}

/// t-closeness where all values are equally far apart.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualDistanceTCloseness {
    attribute: String,
    t: f64,
}

t_closeness_model!(EqualDistanceTCloseness, "equal-distance-t-closeness", "equal");

impl EqualDistanceTCloseness {
    fn prepare(&self, context: &DataContext) -> Result<EqualDistanceTest> {
        let (index, attribute) = sensitive_attribute(context, &self.attribute)?;
        Ok(EqualDistanceTest {
            index,
            t: self.t,
            table: table_frequencies(attribute),
        })
    }
}

#[derive(Debug)]
struct EqualDistanceTest {
    index: usize,
    t: f64,
    table: BTreeMap<u32, f64>,
}

impl EqualDistanceTest {
    fn distance(&self, distribution: &Distribution, interrupt: &InterruptFlag) -> Result<Option<f64>> {
        if distribution.is_empty() {
            return Ok(None);
        }
        let total = distribution.total() as f64;
        let mut sum = 0.0;
        let mut class_values = distribution.iter().peekable();
        for (i, (&value, &q)) in self.table.iter().enumerate() {
            interrupt.check_every(i)?;
            // Class values outside the table domain are skipped over.
            while let Some(&(extra, count)) = class_values.peek() {
                if extra >= value {
                    break;
                }
                sum += count as f64 / total;
                class_values.next();
            }
            let p = match class_values.peek() {
                Some(&(v, count)) if v == value => {
                    class_values.next();
                    count as f64 / total
                }
                _ => 0.0,
            };
            sum += (p - q).abs();
        }
        sum += class_values.map(|(_, count)| count as f64 / total).sum::<f64>();
        Ok(Some(sum / 2.0))
    }
}

impl ClassCriterion for EqualDistanceTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let Some(distribution) = entry.distribution(self.index) else {
            return Ok(false);
        };
        Ok(self
            .distance(distribution, interrupt)?
            .map(|d| d <= self.t)
            .unwrap_or(false))
    }
}

/// t-closeness over a totally ordered domain.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedDistanceTCloseness {
    attribute: String,
    t: f64,
}

t_closeness_model!(OrderedDistanceTCloseness, "ordered-distance-t-closeness", "ordered");

impl OrderedDistanceTCloseness {
    fn prepare(&self, context: &DataContext) -> Result<OrderedDistanceTest> {
        let (index, attribute) = sensitive_attribute(context, &self.attribute)?;
        let order: Vec<u32> = match attribute.order() {
            Some(order) => order.to_vec(),
            None => attribute.frequencies().iter().map(|(value, _)| value).collect(),
        };

        let mut positions = HashMap::with_capacity(order.len());
        for (position, &value) in order.iter().enumerate() {
            if positions.insert(value, position).is_some() {
                return Err(Error::Config(format!(
                    "Value {} appears twice in the order of '{}'",
                    value, self.attribute
                )));
            }
        }
        if let Some((value, _)) = attribute
            .frequencies()
            .iter()
            .find(|(value, _)| !positions.contains_key(value))
        {
            return Err(Error::Config(format!(
                "Value {} of '{}' is missing from its order",
                value, self.attribute
            )));
        }

        // cumulative[i] = Σ_{j≤i} q_j; running[i] = Σ_{j<i} cumulative[j]
        let mut cumulative = Vec::with_capacity(order.len());
        let mut acc = 0.0;
        for &value in &order {
            acc += attribute.frequency(value);
            cumulative.push(acc);
        }
        let mut running = Vec::with_capacity(order.len() + 1);
        running.push(0.0);
        let mut acc = 0.0;
        for &c in &cumulative {
            acc += c;
            running.push(acc);
        }

        let steps = order.len().saturating_sub(1) as f64;
        Ok(OrderedDistanceTest {
            index,
            positions,
            cumulative,
            running,
            budget: self.t * steps,
            steps,
        })
    }
}

#[derive(Debug)]
struct OrderedDistanceTest {
    index: usize,
    positions: HashMap<u32, usize>,
    cumulative: Vec<f64>,
    running: Vec<f64>,
    /// `t · (m − 1)`: bound on the unnormalized distance
    budget: f64,
    steps: f64,
}

impl OrderedDistanceTest {
    /// Σ_{i∈[start,end)} |mass − cumulative[i]| in O(log m).
    fn segment_cost(&self, mass: f64, start: usize, end: usize) -> f64 {
        if start >= end {
            return 0.0;
        }
        let split = start + self.cumulative[start..end].partition_point(|&c| c <= mass);
        let below = (split - start) as f64 * mass - (self.running[split] - self.running[start]);
        let above = (self.running[end] - self.running[split]) - (end - split) as f64 * mass;
        below + above
    }

    /// Unnormalized distance; stops early once it exceeds `limit`.
    ///
    /// `None` when the class is empty or holds a value outside the order.
    fn unnormalized_distance(
        &self,
        distribution: &Distribution,
        limit: f64,
        interrupt: &InterruptFlag,
    ) -> Result<Option<f64>> {
        if distribution.is_empty() {
            return Ok(None);
        }
        let total = distribution.total() as f64;
        let mut present = Vec::with_capacity(distribution.distinct());
        for (value, count) in distribution.iter() {
            match self.positions.get(&value) {
                Some(&position) => present.push((position, count)),
                None => return Ok(None),
            }
        }
        present.sort_unstable_by_key(|(position, _)| *position);

        let mut cost = 0.0;
        let mut mass = 0.0;
        let mut cursor = 0;
        for (i, (position, count)) in present.into_iter().enumerate() {
            interrupt.check_every(i)?;
            cost += self.segment_cost(mass, cursor, position);
            if cost > limit {
                return Ok(Some(cost));
            }
            mass += count as f64 / total;
            cursor = position;
        }
        cost += self.segment_cost(mass, cursor, self.cumulative.len());
        Ok(Some(cost))
    }
}

impl ClassCriterion for OrderedDistanceTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let Some(distribution) = entry.distribution(self.index) else {
            return Ok(false);
        };
        let limit = self.budget + DISTANCE_TOLERANCE * self.steps.max(1.0);
        match self.unnormalized_distance(distribution, limit, interrupt)? {
            None => Ok(false),
            Some(_) if self.steps == 0.0 => Ok(true),
            Some(cost) => Ok(cost <= limit),
        }
    }
}

/// t-closeness whose ground distance follows a generalization hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalDistanceTCloseness {
    attribute: String,
    t: f64,
}

t_closeness_model!(
    HierarchicalDistanceTCloseness,
    "hierarchical-distance-t-closeness",
    "hierarchical"
);

impl HierarchicalDistanceTCloseness {
    fn prepare(&self, context: &DataContext) -> Result<HierarchicalDistanceTest> {
        let (index, attribute) = sensitive_attribute(context, &self.attribute)?;
        let hierarchy = attribute.hierarchy().ok_or_else(|| {
            Error::Config(format!(
                "Hierarchical t-closeness requires a hierarchy for '{}'",
                self.attribute
            ))
        })?;
        if hierarchy.height() < 2 {
            return Err(Error::Config(format!(
                "Hierarchy of '{}' needs at least one generalization level",
                self.attribute
            )));
        }
        let rows = hierarchy.rows();
        let top = hierarchy.height() - 1;

        let mut leaves = HashMap::with_capacity(rows.len());
        for (row, codes) in rows.iter().enumerate() {
            if leaves.insert(codes[0], row).is_some() {
                return Err(Error::Config(format!(
                    "Leaf {} appears twice in the hierarchy of '{}'",
                    codes[0], self.attribute
                )));
            }
        }
        if let Some((value, _)) = attribute
            .frequencies()
            .iter()
            .find(|(value, _)| !leaves.contains_key(value))
        {
            return Err(Error::Config(format!(
                "Value {} of '{}' is missing from its hierarchy",
                value, self.attribute
            )));
        }

        // node index per (level, code); level 0 nodes are the leaf rows
        let mut nodes: Vec<HashMap<u32, usize>> = vec![HashMap::new(); hierarchy.height()];
        for codes in rows {
            for (level, &code) in codes.iter().enumerate().skip(1) {
                let next = nodes[level].len();
                nodes[level].entry(code).or_insert(next);
            }
        }
        if nodes[top].len() != 1 {
            return Err(Error::Config(format!(
                "Hierarchy of '{}' must converge to a single root",
                self.attribute
            )));
        }

        // parents[l][node at l] = node at l + 1
        let mut parents: Vec<Vec<Option<usize>>> = (0..top)
            .map(|level| {
                let width = if level == 0 { rows.len() } else { nodes[level].len() };
                vec![None; width]
            })
            .collect();
        for (row, codes) in rows.iter().enumerate() {
            for level in 0..top {
                let child = if level == 0 { row } else { nodes[level][&codes[level]] };
                let parent = nodes[level + 1][&codes[level + 1]];
                match parents[level][child] {
                    None => parents[level][child] = Some(parent),
                    Some(existing) if existing == parent => {}
                    Some(_) => {
                        return Err(Error::Config(format!(
                            "Value {} at level {} of '{}' has two parents",
                            codes[level], level, self.attribute
                        )))
                    }
                }
            }
        }
        let parents = parents
            .into_iter()
            .map(|level| level.into_iter().map(|p| p.unwrap_or(0)).collect())
            .collect();

        let table = rows
            .iter()
            .map(|codes| attribute.frequency(codes[0]))
            .collect();
        let widths = (1..=top).map(|level| nodes[level].len()).collect();

        Ok(HierarchicalDistanceTest {
            index,
            t: self.t,
            leaves,
            table,
            parents,
            widths,
            height: top as f64,
        })
    }
}

#[derive(Debug)]
struct HierarchicalDistanceTest {
    index: usize,
    t: f64,
    leaves: HashMap<u32, usize>,
    /// Table frequency per leaf row
    table: Vec<f64>,
    parents: Vec<Vec<usize>>,
    /// Node count per level 1..=H
    widths: Vec<usize>,
    height: f64,
}

impl HierarchicalDistanceTest {
    fn distance(
        &self,
        distribution: &Distribution,
        limit: f64,
        interrupt: &InterruptFlag,
    ) -> Result<Option<f64>> {
        if distribution.is_empty() {
            return Ok(None);
        }
        let total = distribution.total() as f64;
        let mut extra: Vec<f64> = self.table.iter().map(|q| -q).collect();
        for (value, count) in distribution.iter() {
            match self.leaves.get(&value) {
                Some(&row) => extra[row] += count as f64 / total,
                None => return Ok(None),
            }
        }

        let mut cost = 0.0;
        for (level, parents) in self.parents.iter().enumerate() {
            let width = self.widths[level];
            let mut positive = vec![0.0; width];
            let mut negative = vec![0.0; width];
            for (child, &e) in extra.iter().enumerate() {
                interrupt.check_every(child)?;
                if e > 0.0 {
                    positive[parents[child]] += e;
                } else {
                    negative[parents[child]] -= e;
                }
            }
            let weight = (level + 1) as f64 / self.height;
            cost += weight
                * positive
                    .iter()
                    .zip(negative.iter())
                    .map(|(p, n)| p.min(*n))
                    .sum::<f64>();
            if cost > limit {
                return Ok(Some(cost));
            }
            extra = positive
                .into_iter()
                .zip(negative)
                .map(|(p, n)| p - n)
                .collect();
        }
        Ok(Some(cost))
    }
}

impl ClassCriterion for HierarchicalDistanceTest {
    fn is_anonymous(
        &self,
        _node: &Transformation,
        entry: &EquivalenceClass,
        interrupt: &InterruptFlag,
    ) -> Result<bool> {
        let Some(distribution) = entry.distribution(self.index) else {
            return Ok(false);
        };
        let limit = self.t + DISTANCE_TOLERANCE;
        Ok(self
            .distance(distribution, limit, interrupt)?
            .map(|d| d <= limit)
            .unwrap_or(false))
    }
}
