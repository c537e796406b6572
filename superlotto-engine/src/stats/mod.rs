pub mod hot_cold;
pub mod table;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use superlotto_db::models::Draw;

use crate::features::{FeatureFamily, FeatureVector};

pub use hot_cold::{HotColdInfo, PoolHeat};
pub use table::{transition_probabilities, CountTable, Distribution, JointTable, TransitionTable};

/// Tables conditionnelles maintenues : (famille, sachant).
pub const JOINT_PAIRS: [(FeatureFamily, FeatureFamily); 5] = [
    (FeatureFamily::Parity, FeatureFamily::SumRange),
    (FeatureFamily::Size, FeatureFamily::SumRange),
    (FeatureFamily::Consecutive, FeatureFamily::SumRange),
    (FeatureFamily::StarSum, FeatureFamily::SumRange),
    (FeatureFamily::Ac, FeatureFamily::SumRange),
];

/// Caractéristiques par période, propre à une instance de statistiques.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCache {
    entries: BTreeMap<u32, FeatureVector>,
}

impl FeatureCache {
    pub fn get_or_compute(&mut self, draw: &Draw) -> FeatureVector {
        *self
            .entries
            .entry(draw.period)
            .or_insert_with(|| FeatureVector::of(draw))
    }

    pub fn get(&self, period: u32) -> Option<&FeatureVector> {
        self.entries.get(&period)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyStatistics {
    pub marginal: CountTable,
    pub transitions: TransitionTable,
}

/// Statistiques marginales, transitions d'ordre 1 et tables jointes
/// de chaque famille de caractéristiques sur un préfixe d'historique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    periods: usize,
    last_period: Option<u32>,
    families: BTreeMap<FeatureFamily, FamilyStatistics>,
    joints: Vec<JointTable>,
    last: Option<FeatureVector>,
    #[serde(skip)]
    cache: FeatureCache,
}

impl Default for FeatureStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStatistics {
    pub fn new() -> Self {
        Self {
            periods: 0,
            last_period: None,
            families: FeatureFamily::ALL
                .iter()
                .map(|&f| (f, FamilyStatistics::default()))
                .collect(),
            joints: JOINT_PAIRS
                .iter()
                .map(|&(family, given)| JointTable::new(family, given))
                .collect(),
            last: None,
            cache: FeatureCache::default(),
        }
    }

    /// `draws` en ordre chronologique.
    pub fn build(draws: &[Draw]) -> Self {
        let mut stats = Self::new();
        for draw in draws {
            stats.observe(draw);
        }
        stats
    }

    /// Ajoute une période à la suite de celles déjà observées.
    pub fn observe(&mut self, draw: &Draw) {
        let fv = self.cache.get_or_compute(draw);

        for (&family, fs) in self.families.iter_mut() {
            let value = fv.value(family);
            fs.marginal.record(value);
            if let Some(prev) = &self.last {
                fs.transitions.record(prev.value(family), value);
            }
        }
        for joint in self.joints.iter_mut() {
            joint.record(fv.value(joint.given), fv.value(joint.family));
        }

        self.periods += 1;
        self.last_period = Some(draw.period);
        self.last = Some(fv);
    }

    pub fn periods(&self) -> usize {
        self.periods
    }

    pub fn last_period(&self) -> Option<u32> {
        self.last_period
    }

    pub fn last_features(&self) -> Option<&FeatureVector> {
        self.last.as_ref()
    }

    pub fn marginal(&self, family: FeatureFamily) -> Distribution {
        self.families
            .get(&family)
            .map(|fs| fs.marginal.distribution())
            .unwrap_or_default()
    }

    pub fn transitions(&self, family: FeatureFamily) -> Option<&TransitionTable> {
        self.families.get(&family).map(|fs| &fs.transitions)
    }

    pub fn joint(&self, family: FeatureFamily, given: FeatureFamily) -> Option<&JointTable> {
        self.joints
            .iter()
            .find(|j| j.family == family && j.given == given)
    }

    pub fn features(&self, period: u32) -> Option<&FeatureVector> {
        self.cache.get(period)
    }

    pub fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    /// Prévision de chaque famille à partir des caractéristiques de la dernière période.
    pub fn predict_next_feature_distributions(
        &self,
        last_features: &FeatureVector,
    ) -> BTreeMap<FeatureFamily, Distribution> {
        self.families
            .iter()
            .map(|(&family, fs)| {
                (
                    family,
                    transition_probabilities(last_features.value(family), &fs.transitions),
                )
            })
            .collect()
    }

    /// Prévision à partir de la dernière période observée ; vide sans historique.
    pub fn predict_next(&self) -> BTreeMap<FeatureFamily, Distribution> {
        match &self.last {
            Some(last) => self.predict_next_feature_distributions(last),
            None => BTreeMap::new(),
        }
    }
}
