use superlotto_db::models::{Draw, NumberMask};

use crate::config::SimilarityConfig;
use crate::features::FeatureVector;
use crate::stats::FeatureStatistics;

/// Période passée proche du dernier tirage, avec les boules sorties juste après.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarPeriod {
    pub period: u32,
    pub similarity: f64,
    pub next_balls: NumberMask,
}

/// Proximité entre deux profils : somme, parité, amplitude, zones.
pub fn similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let a = &a.balls;
    let b = &b.balls;
    let mut score = (50.0 - (a.sum as f64 - b.sum as f64).abs()).max(0.0);
    if a.odd == b.odd {
        score += 50.0;
    }
    score += (20.0 - (a.span as f64 - b.span as f64).abs()).max(0.0);
    let zone_diff: i32 = a
        .zones
        .iter()
        .zip(b.zones.iter())
        .map(|(&x, &y)| (x as i32 - y as i32).abs())
        .sum();
    score += (10.0 - 2.0 * zone_diff as f64).max(0.0);
    score
}

/// Les `top_k` périodes les plus proches du dernier tirage parmi les `window` récentes.
/// Vide si l'historique est trop court.
pub fn similar_periods(
    stats: &FeatureStatistics,
    history: &[Draw],
    config: &SimilarityConfig,
) -> Vec<SimilarPeriod> {
    let Some(last) = history.last() else {
        return Vec::new();
    };
    if history.len() < config.min_history {
        return Vec::new();
    }

    let features_of =
        |d: &Draw| stats.features(d.period).copied().unwrap_or_else(|| FeatureVector::of(d));
    let target = features_of(last);

    // chaque candidat doit avoir un successeur connu
    let end = history.len() - 1;
    let start = end.saturating_sub(config.window);

    let mut found: Vec<SimilarPeriod> = (start..end)
        .map(|i| SimilarPeriod {
            period: history[i].period,
            similarity: similarity(&target, &features_of(&history[i])),
            next_balls: history[i + 1].ball_mask(),
        })
        .collect();

    // tri stable : à égalité, la période la plus ancienne d'abord
    found.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    found.truncate(config.top_k);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::make_test_draws;

    #[test]
    fn test_similarity_identity_is_max() {
        let f = FeatureVector::from_numbers(&[3, 14, 22, 27, 33], &[2, 9]);
        assert_eq!(similarity(&f, &f), 130.0);
        let g = FeatureVector::from_numbers(&[1, 2, 3, 4, 6], &[2, 9]);
        assert!(similarity(&f, &g) < 130.0);
    }

    #[test]
    fn test_short_history_yields_nothing() {
        let draws = make_test_draws(10);
        let stats = FeatureStatistics::build(&draws);
        assert!(similar_periods(&stats, &draws, &SimilarityConfig::default()).is_empty());
    }

    #[test]
    fn test_top_k_sorted_with_successors() {
        let draws = make_test_draws(60);
        let stats = FeatureStatistics::build(&draws);
        let config = SimilarityConfig::default();
        let found = similar_periods(&stats, &draws, &config);
        assert_eq!(found.len(), config.top_k);
        for w in found.windows(2) {
            assert!(w[0].similarity >= w[1].similarity);
        }
        let last = draws.last().unwrap().period;
        for s in &found {
            assert!(s.period < last);
            let next = draws.iter().find(|d| d.period == s.period + 1).unwrap();
            assert_eq!(s.next_balls, next.ball_mask());
        }
    }
}
