pub mod similarity;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use superlotto_db::models::{Draw, NumberMask, Pool};

use crate::config::{band_bonus, FamilyWeight, ScoringWeights, SimilarityConfig};
use crate::error::{EngineError, Result};
use crate::features::{compute, BallFeatures, FeatureFamily, FeatureValue, StarFeatures};
use crate::stats::{Distribution, FeatureStatistics};

/// Probabilités par numéro fournies par un modèle externe (index = numéro - 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProbabilities {
    pub balls: Vec<f64>,
    pub stars: Vec<f64>,
}

/// Table de fréquence des numéros recommandés par une source externe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceNumbers {
    pub balls: BTreeMap<u8, u32>,
    pub stars: BTreeMap<u8, u32>,
}

impl ReferenceNumbers {
    /// Lit une table JSON `{"balls": {"7": 3, ...}, "stars": {...}}` et la valide.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let reference: Self = serde_json::from_str(&json)?;
        reference.validate()?;
        Ok(reference)
    }

    /// Tout numéro cité doit appartenir à son ensemble.
    pub fn validate(&self) -> Result<()> {
        for (table, pool) in [(&self.balls, Pool::Balls), (&self.stars, Pool::Stars)] {
            let numbers: Vec<u8> = table.keys().copied().collect();
            NumberMask::try_from_numbers(&numbers, pool)
                .map_err(|e| EngineError::InvalidConstraint(format!("référence : {e}")))?;
        }
        Ok(())
    }

    /// Les `k` numéros les plus cités ; à égalité, le plus petit numéro d'abord.
    fn top(table: &BTreeMap<u8, u32>, k: usize) -> NumberMask {
        let mut ranked: Vec<(u8, u32)> = table.iter().map(|(&n, &c)| (n, c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let top: Vec<u8> = ranked.into_iter().take(k).map(|(n, _)| n).collect();
        NumberMask::from_numbers(&top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionKind {
    /// Points ajoutés au total.
    Additive,
    /// Facteur multiplicatif.
    Factor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub label: String,
    pub value: f64,
    pub kind: ContributionKind,
}

/// Détail ordonné d'une note ; `total` est exactement la note de la grille.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub contributions: Vec<Contribution>,
    pub total: f64,
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.contributions {
            match c.kind {
                ContributionKind::Additive => writeln!(f, "  {:<28} {:+9.1}", c.label, c.value)?,
                ContributionKind::Factor => writeln!(f, "  {:<28} ×{:.4}", c.label, c.value)?,
            }
        }
        write!(f, "  {:<28} {:9.1}", "total", self.total)
    }
}

/// Part de la note calculée une seule fois par sous-ensemble de boules ou d'étoiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartScore {
    pub additive: f64,
    pub model_boost: f64,
    pub reference_add: f64,
}

impl Default for PartScore {
    fn default() -> Self {
        Self {
            additive: 0.0,
            model_boost: 1.0,
            reference_add: 0.0,
        }
    }
}

trait Sink {
    const ENABLED: bool;
    fn push(&mut self, label: String, value: f64, kind: ContributionKind);
}

struct Silent;

impl Sink for Silent {
    const ENABLED: bool = false;
    #[inline]
    fn push(&mut self, _label: String, _value: f64, _kind: ContributionKind) {}
}

impl Sink for Vec<Contribution> {
    const ENABLED: bool = true;
    fn push(&mut self, label: String, value: f64, kind: ContributionKind) {
        Vec::push(self, Contribution { label, value, kind });
    }
}

/// Ajoute `value` à la part et le trace si le puits est actif.
#[inline]
fn add<S: Sink>(part: &mut PartScore, sink: &mut S, label: impl FnOnce() -> String, value: f64) {
    part.additive += value;
    if S::ENABLED {
        sink.push(label(), value, ContributionKind::Additive);
    }
}

/// Bloc central 5+2 utilisé pour noter une grille composée.
pub fn core_numbers<'a>(balls: &'a [u8], stars: &'a [u8]) -> (&'a [u8], &'a [u8]) {
    let ball_picks = Pool::Balls.pick_count();
    let star_picks = Pool::Stars.pick_count();
    let core_balls = if balls.len() > ball_picks {
        let start = (balls.len() - ball_picks) / 2;
        &balls[start..start + ball_picks]
    } else {
        balls
    };
    (core_balls, &stars[..stars.len().min(star_picks)])
}

/// Note composite d'une grille à partir d'un instantané d'historique.
pub struct ScoringEngine {
    weights: ScoringWeights,
    forecast: BTreeMap<FeatureFamily, Distribution>,
    similar_next: Vec<NumberMask>,
    last_balls: Vec<u8>,
    last_ball_mask: NumberMask,
    last_star_mask: Option<NumberMask>,
    zone_patterns: Vec<[u8; 3]>,
    model: Option<ModelProbabilities>,
    reference_balls: NumberMask,
    reference_stars: NumberMask,
}

impl ScoringEngine {
    /// `stats` doit avoir été construit sur `history` (ordre chronologique).
    pub fn new(
        weights: &ScoringWeights,
        stats: &FeatureStatistics,
        history: &[Draw],
        similarity_config: &SimilarityConfig,
        model: Option<ModelProbabilities>,
        reference: Option<&ReferenceNumbers>,
    ) -> Self {
        let similar_next = similarity::similar_periods(stats, history, similarity_config)
            .into_iter()
            .map(|s| s.next_balls)
            .collect();
        let (reference_balls, reference_stars) = match reference {
            Some(r) => (
                ReferenceNumbers::top(&r.balls, weights.reference_ball_top),
                ReferenceNumbers::top(&r.stars, weights.reference_star_top),
            ),
            None => (NumberMask::default(), NumberMask::default()),
        };
        let model = model.filter(|m| {
            m.balls.len() == Pool::Balls.size() && m.stars.len() == Pool::Stars.size()
        });

        Self {
            zone_patterns: weights
                .zone_patterns
                .iter()
                .filter_map(|p| parse_zone_pattern(p))
                .collect(),
            weights: weights.clone(),
            forecast: stats.predict_next(),
            similar_next,
            last_balls: history.last().map(|d| d.balls.to_vec()).unwrap_or_default(),
            last_ball_mask: history.last().map(Draw::ball_mask).unwrap_or_default(),
            last_star_mask: history.last().map(Draw::star_mask),
            model,
            reference_balls,
            reference_stars,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn similar_count(&self) -> usize {
        self.similar_next.len()
    }

    /// Part boules (grille de 5, ou bloc central d'une grille composée).
    pub fn score_balls(&self, balls: &[u8]) -> PartScore {
        self.ball_part(balls, &mut Silent)
    }

    pub fn score_stars(&self, stars: &[u8]) -> PartScore {
        self.star_part(stars, &mut Silent)
    }

    /// Combinaison en O(1) des deux parts.
    pub fn combine(&self, balls: &PartScore, stars: &PartScore) -> f64 {
        (self.weights.baseline + balls.additive + stars.additive)
            * balls.model_boost
            * stars.model_boost
            * (1.0 + balls.reference_add + stars.reference_add)
    }

    pub fn score(&self, balls: &[u8], stars: &[u8]) -> f64 {
        let (balls, stars) = core_numbers(balls, stars);
        self.combine(&self.score_balls(balls), &self.score_stars(stars))
    }

    /// Même calcul que `score`, avec le détail de chaque contribution.
    pub fn explain(&self, balls: &[u8], stars: &[u8]) -> Explanation {
        let (balls, stars) = core_numbers(balls, stars);
        let mut contributions = vec![Contribution {
            label: "base".to_string(),
            value: self.weights.baseline,
            kind: ContributionKind::Additive,
        }];
        let ball_part = self.ball_part(balls, &mut contributions);
        let star_part = self.star_part(stars, &mut contributions);

        contributions.push(Contribution {
            label: "modèle boules".to_string(),
            value: ball_part.model_boost,
            kind: ContributionKind::Factor,
        });
        contributions.push(Contribution {
            label: "modèle étoiles".to_string(),
            value: star_part.model_boost,
            kind: ContributionKind::Factor,
        });
        contributions.push(Contribution {
            label: "référence".to_string(),
            value: 1.0 + ball_part.reference_add + star_part.reference_add,
            kind: ContributionKind::Factor,
        });

        Explanation {
            contributions,
            total: self.combine(&ball_part, &star_part),
        }
    }

    fn ball_part<S: Sink>(&self, balls: &[u8], sink: &mut S) -> PartScore {
        let w = &self.weights;
        let f = BallFeatures::from_balls(balls);
        let mut part = PartScore::default();

        self.family_layer(&mut part, sink, FeatureFamily::SumRange, &f, w.transitions.sum_range, || {
            band_bonus(&w.sum_bands, f.sum as i32)
        });
        self.family_layer(&mut part, sink, FeatureFamily::Parity, &f, w.transitions.parity, || {
            band_bonus(&w.odd_bands, f.odd as i32)
        });
        self.family_layer(&mut part, sink, FeatureFamily::Size, &f, w.transitions.size, || {
            band_bonus(&w.big_bands, f.big as i32)
        });
        self.family_layer(&mut part, sink, FeatureFamily::Zone, &f, w.transitions.zone, || {
            static_zone_bonus(w, &f.zones)
        });
        self.family_layer(&mut part, sink, FeatureFamily::Consecutive, &f, w.transitions.consecutive, || {
            band_bonus(&w.consecutive_bands, f.consecutive_pairs as i32)
        });
        self.family_layer(&mut part, sink, FeatureFamily::Ac, &f, w.transitions.ac, || {
            band_bonus(&w.ac_bands, f.ac as i32)
        });
        self.family_layer(&mut part, sink, FeatureFamily::Prime, &f, w.transitions.prime, || {
            band_bonus(&w.prime_bands, f.primes as i32)
        });

        if let Some(b) = band_bonus(&w.small_bands, f.small as i32) {
            add(&mut part, sink, || format!("petits ({})", f.small), b);
        }
        if let Some(b) = band_bonus(&w.span_bands, f.span as i32) {
            add(&mut part, sink, || format!("amplitude ({})", f.span), b);
        }
        if f.modulus.iter().any(|&c| c >= 3) {
            add(&mut part, sink, || "modulo 3 groupé".to_string(), w.modulus_cluster_bonus);
        }
        if self.zone_patterns.contains(&f.zones) {
            add(&mut part, sink, || format!("motif zones {}", f.zone_label()), w.zone_pattern_bonus);
        }
        if f.tail_diversity >= w.tail_diversity_min {
            add(
                &mut part,
                sink,
                || format!("finales ({})", f.tail_diversity),
                w.tail_diversity_bonus,
            );
        }

        if !self.similar_next.is_empty() {
            let mask = NumberMask::from_numbers(balls);
            let overlap: u32 = self.similar_next.iter().map(|m| m.overlap(&mask)).sum();
            if overlap > 0 {
                add(
                    &mut part,
                    sink,
                    || format!("similarité ({overlap})"),
                    overlap as f64 * w.similarity_overlap_bonus,
                );
            }
        }

        if !self.last_balls.is_empty() {
            let neighbors = compute::neighbor_count(balls, &self.last_balls);
            if neighbors >= w.neighbor_min {
                add(
                    &mut part,
                    sink,
                    || format!("voisins ({neighbors})"),
                    neighbors as f64 * w.neighbor_bonus,
                );
            }
            let repeats = self.last_ball_mask.overlap(&NumberMask::from_numbers(balls));
            if let Some(b) = band_bonus(&w.repeat_bands, repeats as i32) {
                add(&mut part, sink, || format!("répétitions ({repeats})"), b);
            }
        }

        if let Some(model) = &self.model {
            part.model_boost = model_boost(&model.balls, balls, Pool::Balls, w.ball_model_gain);
        }
        let hits = balls
            .iter()
            .filter(|&&b| self.reference_balls.contains(b))
            .count();
        part.reference_add = hits as f64 * w.reference_ball_step;

        part
    }

    fn star_part<S: Sink>(&self, stars: &[u8], sink: &mut S) -> PartScore {
        let w = &self.weights;
        let f = StarFeatures::from_stars(stars);
        let mut part = PartScore::default();

        let family = FeatureFamily::StarSum;
        let value = FeatureValue(f.sum as u16);
        match self.forecast.get(&family).filter(|d| !d.is_empty()) {
            Some(dist) => {
                let bonus = dynamic_bonus(dist, value, w.transitions.star_sum);
                add(&mut part, sink, || format!("{family} {} (transition)", f.sum), bonus);
            }
            None => {
                if let Some(b) = band_bonus(&w.star_sum_bands, f.sum as i32) {
                    add(&mut part, sink, || format!("{family} {}", f.sum), b);
                }
            }
        }

        if f.low == 1 {
            add(&mut part, sink, || "étoiles basse/haute".to_string(), w.star_split_mixed);
        } else {
            add(&mut part, sink, || "étoiles même moitié".to_string(), w.star_split_skewed);
        }

        if let Some(last) = self.last_star_mask {
            if last.overlap(&NumberMask::from_numbers(stars)) == 0 {
                add(&mut part, sink, || "étoiles nouvelles".to_string(), w.star_fresh_bonus);
            }
        }

        if let Some(model) = &self.model {
            part.model_boost = model_boost(&model.stars, stars, Pool::Stars, w.star_model_gain);
        }
        if stars.iter().any(|&s| self.reference_stars.contains(s)) {
            part.reference_add = w.reference_star_bonus;
        }

        part
    }

    /// Prévision de transition si disponible, sinon barème statique.
    fn family_layer<S: Sink>(
        &self,
        part: &mut PartScore,
        sink: &mut S,
        family: FeatureFamily,
        features: &BallFeatures,
        weight: FamilyWeight,
        fallback: impl FnOnce() -> Option<f64>,
    ) {
        let Some(value) = features.value(family) else {
            return;
        };
        match self.forecast.get(&family).filter(|d| !d.is_empty()) {
            Some(dist) => {
                let bonus = dynamic_bonus(dist, value, weight);
                add(part, sink, || format!("{family} {} (transition)", family.label(value)), bonus);
            }
            None => {
                if let Some(bonus) = fallback() {
                    add(part, sink, || format!("{family} {}", family.label(value)), bonus);
                }
            }
        }
    }
}

fn dynamic_bonus(dist: &Distribution, value: FeatureValue, weight: FamilyWeight) -> f64 {
    match dist.get(&value) {
        Some(&p) => p * weight.scale,
        None => weight.miss,
    }
}

fn static_zone_bonus(w: &ScoringWeights, zones: &[u8; 3]) -> Option<f64> {
    if zones.iter().all(|&z| z > 0) {
        Some(w.zone_all_covered)
    } else if zones.iter().filter(|&&z| z >= 2).count() == 2 {
        Some(w.zone_two_strong)
    } else {
        None
    }
}

fn parse_zone_pattern(pattern: &str) -> Option<[u8; 3]> {
    let mut parts = pattern.split('-').map(|p| p.trim().parse::<u8>().ok());
    let zones = [parts.next()??, parts.next()??, parts.next()??];
    if parts.next().is_some() {
        return None;
    }
    Some(zones)
}

/// `1 + gain × max(0, lift - 1)` avec `lift = moyenne(p) × taille du pool`.
fn model_boost(probs: &[f64], numbers: &[u8], pool: Pool, gain: f64) -> f64 {
    if numbers.is_empty() {
        return 1.0;
    }
    let mean = numbers
        .iter()
        .filter_map(|&n| probs.get((n as usize).wrapping_sub(1)))
        .sum::<f64>()
        / numbers.len() as f64;
    let lift = mean * pool.size() as f64;
    1.0 + gain * (lift - 1.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::make_test_draws;

    fn engine_for(draws: &[Draw]) -> ScoringEngine {
        let stats = FeatureStatistics::build(draws);
        ScoringEngine::new(
            &ScoringWeights::default(),
            &stats,
            draws,
            &SimilarityConfig::default(),
            None,
            None,
        )
    }

    #[test]
    fn test_explain_total_equals_score() {
        let draws = make_test_draws(80);
        let mut reference = ReferenceNumbers::default();
        for n in [3u8, 9, 14, 21, 30] {
            reference.balls.insert(n, 5);
        }
        reference.stars.insert(4, 2);
        let stats = FeatureStatistics::build(&draws);
        let model = ModelProbabilities {
            balls: (1..=35).map(|i| i as f64 / 630.0).collect(),
            stars: vec![1.0 / 12.0; 12],
        };
        let engine = ScoringEngine::new(
            &ScoringWeights::default(),
            &stats,
            &draws,
            &SimilarityConfig::default(),
            Some(model),
            Some(&reference),
        );
        for (balls, stars) in [
            (vec![3u8, 9, 14, 21, 30], vec![4u8, 11]),
            (vec![1, 12, 18, 25, 35], vec![2, 3]),
            (vec![2, 5, 11, 19, 23, 28, 31, 34], vec![1, 6, 10]),
        ] {
            let explanation = engine.explain(&balls, &stars);
            assert_eq!(explanation.total, engine.score(&balls, &stars));
            assert_eq!(explanation.contributions[0].label, "base");
        }
    }

    #[test]
    fn test_static_tables_without_history() {
        let engine = engine_for(&[]);
        assert!(!engine.has_model());
        assert_eq!(engine.similar_count(), 0);
        let w = ScoringWeights::default();
        let balls = [5u8, 13, 14, 28, 30];
        let f = BallFeatures::from_balls(&balls);
        assert_eq!(f.sum, 90);
        assert_eq!(f.zones, [1, 2, 2]);
        assert_eq!(f.primes, 2);
        let band = |bands: &[crate::config::Band], v: u8| band_bonus(bands, v as i32).unwrap_or(0.0);
        let modulus = if f.modulus.iter().any(|&c| c >= 3) { w.modulus_cluster_bonus } else { 0.0 };
        // somme 90 → 380, 2 impairs → 200, 2 grands → 100, trois zones → 200,
        // 1 petit → 150, amplitude 25 → 200, motif 1-2-2 → 80, 5 finales → 60
        let expected = 380.0
            + 200.0
            + 100.0
            + 200.0
            + band(&w.consecutive_bands, f.consecutive_pairs)
            + band(&w.ac_bands, f.ac)
            + band(&w.prime_bands, f.primes)
            + 150.0
            + 200.0
            + modulus
            + 80.0
            + 60.0;
        let part = engine.score_balls(&balls);
        assert!((part.additive - expected).abs() < 1e-9, "{} != {}", part.additive, expected);
        assert_eq!(part.model_boost, 1.0);
        assert_eq!(part.reference_add, 0.0);
    }

    #[test]
    fn test_star_split_and_fresh() {
        let draws = vec![Draw::new(1, "2024-01-01", [1, 8, 15, 22, 29], [1, 2]).unwrap()];
        let engine = engine_for(&draws);
        let mixed_fresh = engine.score_stars(&[3, 9]);
        let skewed_repeat = engine.score_stars(&[2, 5]);
        assert_eq!(mixed_fresh.additive, 250.0);
        assert_eq!(skewed_repeat.additive, 100.0);
    }

    #[test]
    fn test_wrong_length_model_is_ignored() {
        let draws = make_test_draws(40);
        let stats = FeatureStatistics::build(&draws);
        let build = |balls: usize| {
            ScoringEngine::new(
                &ScoringWeights::default(),
                &stats,
                &draws,
                &SimilarityConfig::default(),
                Some(ModelProbabilities {
                    balls: vec![1.0 / balls as f64; balls],
                    stars: vec![1.0 / 12.0; 12],
                }),
                None,
            )
        };
        assert!(build(35).has_model());
        let truncated = build(34);
        assert!(!truncated.has_model());
        let plain = engine_for(&draws);
        assert_eq!(truncated.score(&[1, 8, 14, 20, 27], &[3, 7]), plain.score(&[1, 8, 14, 20, 27], &[3, 7]));
    }

    #[test]
    fn test_model_boost_lift() {
        let uniform = vec![1.0 / 35.0; 35];
        assert!((model_boost(&uniform, &[1, 2, 3, 4, 5], Pool::Balls, 1.0) - 1.0).abs() < 1e-12);

        let mut skewed = vec![0.0; 35];
        for p in skewed.iter_mut().take(5) {
            *p = 0.2;
        }
        // moyenne 0.2 → lift 7 → boost 7
        let boost = model_boost(&skewed, &[1, 2, 3, 4, 5], Pool::Balls, 1.0);
        assert!((boost - 7.0).abs() < 1e-9);
        assert_eq!(model_boost(&skewed, &[10, 11, 12, 13, 14], Pool::Balls, 1.0), 1.0);
    }

    #[test]
    fn test_reference_top_k_ties_by_number() {
        let mut table = BTreeMap::new();
        table.insert(7u8, 3u32);
        table.insert(2, 3);
        table.insert(9, 5);
        table.insert(1, 1);
        let top = ReferenceNumbers::top(&table, 2);
        assert_eq!(top.numbers(), vec![2, 9]);
    }

    #[test]
    fn test_reference_load_and_range_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        std::fs::write(&path, r#"{"balls": {"7": 3, "35": 1}, "stars": {"12": 2}}"#).unwrap();
        let reference = ReferenceNumbers::load(&path).unwrap();
        assert_eq!(reference.balls.get(&7), Some(&3));
        assert_eq!(reference.stars.get(&12), Some(&2));

        std::fs::write(&path, r#"{"balls": {"70": 3}}"#).unwrap();
        assert!(matches!(
            ReferenceNumbers::load(&path),
            Err(EngineError::InvalidConstraint(_))
        ));

        let mut reference = ReferenceNumbers::default();
        reference.stars.insert(13, 1);
        assert!(matches!(reference.validate(), Err(EngineError::InvalidConstraint(_))));
        reference.stars.clear();
        reference.balls.insert(0, 1);
        assert!(reference.validate().is_err());
    }

    #[test]
    fn test_score_is_deterministic_and_uses_core() {
        let draws = make_test_draws(50);
        let engine = engine_for(&draws);
        let compound = [2u8, 5, 11, 19, 23, 28, 31, 34];
        let (core, stars) = core_numbers(&compound, &[1, 6, 10]);
        assert_eq!(core, &[5, 11, 19, 23, 28]);
        assert_eq!(stars, &[1, 6]);
        assert_eq!(
            engine.score(&compound, &[1, 6, 10]),
            engine.score(&[5, 11, 19, 23, 28], &[1, 6])
        );
        assert_eq!(engine.score(&compound, &[1, 6, 10]), engine.score(&compound, &[1, 6, 10]));
    }

    #[test]
    fn test_transition_forecast_replaces_static_table() {
        let draws = make_test_draws(60);
        let stats = FeatureStatistics::build(&draws);
        let engine = engine_for(&draws);
        let forecast = stats.predict_next();
        let dist = &forecast[&FeatureFamily::SumRange];
        if dist.is_empty() {
            return;
        }
        let explanation = engine.explain(&[5, 13, 14, 28, 30], &[3, 9]);
        assert!(explanation
            .contributions
            .iter()
            .any(|c| c.label.starts_with("somme ")
                && !c.label.starts_with("somme étoiles")
                && c.label.ends_with("(transition)")));
    }

    #[test]
    fn test_parse_zone_pattern() {
        assert_eq!(parse_zone_pattern("1-2-2"), Some([1, 2, 2]));
        assert_eq!(parse_zone_pattern("1-2"), None);
        assert_eq!(parse_zone_pattern("1-2-2-0"), None);
        assert_eq!(parse_zone_pattern("a-b-c"), None);
    }
}
