use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::{FeatureFamily, FeatureValue};

/// Distribution normalisée valeur → probabilité.
pub type Distribution = BTreeMap<FeatureValue, f64>;

/// Comptage d'occurrences par valeur.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountTable(BTreeMap<FeatureValue, u32>);

impl CountTable {
    pub fn record(&mut self, value: FeatureValue) {
        *self.0.entry(value).or_insert(0) += 1;
    }

    pub fn get(&self, value: FeatureValue) -> u32 {
        self.0.get(&value).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureValue, u32)> + '_ {
        self.0.iter().map(|(&v, &c)| (v, c))
    }

    pub fn distribution(&self) -> Distribution {
        let total = self.total();
        if total == 0 {
            return Distribution::new();
        }
        self.0
            .iter()
            .map(|(&v, &c)| (v, c as f64 / total as f64))
            .collect()
    }
}

/// Comptes de transition : valeur à la période i → valeur à la période i+1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionTable(BTreeMap<FeatureValue, CountTable>);

impl TransitionTable {
    pub fn record(&mut self, from: FeatureValue, to: FeatureValue) {
        self.0.entry(from).or_default().record(to);
    }

    pub fn row(&self, from: FeatureValue) -> Option<&CountTable> {
        self.0.get(&from)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (FeatureValue, &CountTable)> + '_ {
        self.0.iter().map(|(&v, row)| (v, row))
    }
}

/// Distribution de la valeur suivante sachant la valeur courante.
/// Vide si `prev` n'a jamais été observée comme origine d'une transition.
pub fn transition_probabilities(prev: FeatureValue, table: &TransitionTable) -> Distribution {
    table.row(prev).map(CountTable::distribution).unwrap_or_default()
}

/// Distribution d'une famille conditionnée par la valeur d'une autre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointTable {
    pub family: FeatureFamily,
    pub given: FeatureFamily,
    rows: BTreeMap<FeatureValue, CountTable>,
}

impl JointTable {
    pub fn new(family: FeatureFamily, given: FeatureFamily) -> Self {
        Self {
            family,
            given,
            rows: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, given: FeatureValue, value: FeatureValue) {
        self.rows.entry(given).or_default().record(value);
    }

    pub fn conditional(&self, given: FeatureValue) -> Distribution {
        self.rows
            .get(&given)
            .map(CountTable::distribution)
            .unwrap_or_default()
    }

    pub fn rows(&self) -> impl Iterator<Item = (FeatureValue, &CountTable)> + '_ {
        self.rows.iter().map(|(&v, row)| (v, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_table_distribution() {
        let mut t = CountTable::default();
        t.record(FeatureValue(1));
        t.record(FeatureValue(1));
        t.record(FeatureValue(2));
        t.record(FeatureValue(3));
        let d = t.distribution();
        assert_eq!(d[&FeatureValue(1)], 0.5);
        assert_eq!(d[&FeatureValue(2)], 0.25);
        let sum: f64 = d.values().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_origin_gives_empty() {
        let mut t = TransitionTable::default();
        t.record(FeatureValue(4), FeatureValue(5));
        assert!(transition_probabilities(FeatureValue(9), &t).is_empty());
    }

    #[test]
    fn test_single_transition_degenerate() {
        let mut t = TransitionTable::default();
        t.record(FeatureValue(4), FeatureValue(5));
        let d = transition_probabilities(FeatureValue(4), &t);
        assert_eq!(d.len(), 1);
        assert_eq!(d[&FeatureValue(5)], 1.0);
    }

    #[test]
    fn test_joint_conditional() {
        let mut j = JointTable::new(FeatureFamily::Parity, FeatureFamily::SumRange);
        j.record(FeatureValue(5), FeatureValue(3));
        j.record(FeatureValue(5), FeatureValue(2));
        j.record(FeatureValue(6), FeatureValue(1));
        let d = j.conditional(FeatureValue(5));
        assert_eq!(d.len(), 2);
        assert_eq!(d[&FeatureValue(3)], 0.5);
        assert!(j.conditional(FeatureValue(0)).is_empty());
    }
}
