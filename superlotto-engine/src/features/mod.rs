pub mod compute;

use serde::{Deserialize, Serialize};
use superlotto_db::models::{Draw, Pool};

/// Familles de caractéristiques suivies par les statistiques.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureFamily {
    SumRange,
    Parity,
    Size,
    Zone,
    Consecutive,
    Ac,
    Prime,
    StarSum,
}

/// Code compact d'une valeur de caractéristique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureValue(pub u16);

/// Tranches de somme des boules ; toute somme hors tranche est classée « autre ».
pub const SUM_BUCKETS: [(u16, u16); 10] = [
    (40, 50),
    (51, 60),
    (61, 70),
    (71, 80),
    (81, 90),
    (91, 100),
    (101, 110),
    (111, 120),
    (121, 130),
    (131, 165),
];

const SUM_OTHER: u16 = SUM_BUCKETS.len() as u16;

pub fn sum_bucket(sum: u16) -> FeatureValue {
    let idx = SUM_BUCKETS
        .iter()
        .position(|&(lo, hi)| lo <= sum && sum <= hi)
        .map_or(SUM_OTHER, |i| i as u16);
    FeatureValue(idx)
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 8] = [
        FeatureFamily::SumRange,
        FeatureFamily::Parity,
        FeatureFamily::Size,
        FeatureFamily::Zone,
        FeatureFamily::Consecutive,
        FeatureFamily::Ac,
        FeatureFamily::Prime,
        FeatureFamily::StarSum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureFamily::SumRange => "somme",
            FeatureFamily::Parity => "impairs:pairs",
            FeatureFamily::Size => "grands:petits",
            FeatureFamily::Zone => "zones",
            FeatureFamily::Consecutive => "consécutifs",
            FeatureFamily::Ac => "AC",
            FeatureFamily::Prime => "premiers",
            FeatureFamily::StarSum => "somme étoiles",
        }
    }

    pub fn is_star(&self) -> bool {
        matches!(self, FeatureFamily::StarSum)
    }

    /// Libellé lisible d'une valeur (grille de 5 boules).
    pub fn label(&self, value: FeatureValue) -> String {
        let v = value.0;
        let picks = Pool::Balls.pick_count() as u16;
        match self {
            FeatureFamily::SumRange => match SUM_BUCKETS.get(v as usize) {
                Some((lo, hi)) => format!("{lo}-{hi}"),
                None => "autre".to_string(),
            },
            FeatureFamily::Parity | FeatureFamily::Size => {
                format!("{}:{}", v, picks.saturating_sub(v))
            }
            FeatureFamily::Zone => {
                let (z0, z1, z2) = decode_zone(value);
                format!("{z0}-{z1}-{z2}")
            }
            FeatureFamily::Consecutive => match v {
                0 => "aucune".to_string(),
                1 => "1 paire".to_string(),
                2 => "2 paires".to_string(),
                _ => "3+ paires".to_string(),
            },
            FeatureFamily::Ac | FeatureFamily::Prime | FeatureFamily::StarSum => v.to_string(),
        }
    }
}

impl std::fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn encode_zone(zones: [u8; 3]) -> FeatureValue {
    FeatureValue(zones[0] as u16 * 100 + zones[1] as u16 * 10 + zones[2] as u16)
}

fn decode_zone(value: FeatureValue) -> (u16, u16, u16) {
    (value.0 / 100, (value.0 / 10) % 10, value.0 % 10)
}

/// Caractéristiques de la partie boules d'une grille.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallFeatures {
    pub sum: u16,
    pub odd: u8,
    pub big: u8,
    pub small: u8,
    pub zones: [u8; 3],
    pub span: u8,
    pub consecutive_pairs: u8,
    pub ac: u8,
    pub primes: u8,
    pub tail_diversity: u8,
    pub modulus: [u8; 3],
}

impl BallFeatures {
    /// `balls` doit être trié par ordre croissant.
    pub fn from_balls(balls: &[u8]) -> Self {
        Self {
            sum: compute::sum(balls),
            odd: compute::odd_count(balls),
            big: compute::big_count(balls),
            small: compute::small_count(balls),
            zones: compute::zone_counts(balls),
            span: compute::span(balls),
            consecutive_pairs: compute::consecutive_pairs(balls),
            ac: compute::ac_value(balls),
            primes: compute::prime_count(balls),
            tail_diversity: compute::tail_diversity(balls),
            modulus: compute::modulus_counts(balls),
        }
    }

    pub fn value(&self, family: FeatureFamily) -> Option<FeatureValue> {
        let v = match family {
            FeatureFamily::SumRange => sum_bucket(self.sum),
            FeatureFamily::Parity => FeatureValue(self.odd as u16),
            FeatureFamily::Size => FeatureValue(self.big as u16),
            FeatureFamily::Zone => encode_zone(self.zones),
            FeatureFamily::Consecutive => FeatureValue(self.consecutive_pairs.min(3) as u16),
            FeatureFamily::Ac => FeatureValue(self.ac as u16),
            FeatureFamily::Prime => FeatureValue(self.primes as u16),
            FeatureFamily::StarSum => return None,
        };
        Some(v)
    }

    pub fn zone_label(&self) -> String {
        format!("{}-{}-{}", self.zones[0], self.zones[1], self.zones[2])
    }
}

/// Caractéristiques de la partie étoiles d'une grille.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarFeatures {
    pub sum: u8,
    pub span: u8,
    pub low: u8,
}

impl StarFeatures {
    pub fn from_stars(stars: &[u8]) -> Self {
        Self {
            sum: stars.iter().sum(),
            span: compute::span(stars),
            low: compute::low_half_count(stars, Pool::Stars),
        }
    }

    pub fn value(&self, family: FeatureFamily) -> Option<FeatureValue> {
        match family {
            FeatureFamily::StarSum => Some(FeatureValue(self.sum as u16)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub balls: BallFeatures,
    pub stars: StarFeatures,
}

impl FeatureVector {
    pub fn from_numbers(balls: &[u8], stars: &[u8]) -> Self {
        Self {
            balls: BallFeatures::from_balls(balls),
            stars: StarFeatures::from_stars(stars),
        }
    }

    pub fn of(draw: &Draw) -> Self {
        Self::from_numbers(&draw.balls, &draw.stars)
    }

    pub fn value(&self, family: FeatureFamily) -> FeatureValue {
        self.balls
            .value(family)
            .or_else(|| self.stars.value(family))
            .unwrap_or(FeatureValue(0))
    }
}
