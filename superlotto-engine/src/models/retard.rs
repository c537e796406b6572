use std::collections::HashMap;

use superlotto_db::models::{Draw, Pool};

use super::{normalize, uniform, ProbabilityModel};
use crate::error::ModelError;

/// Favorise les numéros dont le retard actuel dépasse leur écart moyen.
pub struct RetardModel {
    gamma: f64,
}

impl RetardModel {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }
}

impl ProbabilityModel for RetardModel {
    fn name(&self) -> &str {
        "Retard"
    }

    fn predict(&self, draws: &[Draw], pool: Pool) -> Result<Vec<f64>, ModelError> {
        let size = pool.size();
        if draws.is_empty() {
            return Ok(uniform(pool));
        }

        // t = 0 pour le tirage le plus récent
        let mut gaps = vec![draws.len(); size];
        let mut last_seen: Vec<Option<usize>> = vec![None; size];
        let mut gap_sums = vec![0.0f64; size];
        let mut gap_counts = vec![0usize; size];

        for (t, draw) in draws.iter().rev().enumerate() {
            for &n in pool.numbers_from(draw) {
                let idx = (n - 1) as usize;
                if idx >= size {
                    continue;
                }
                if gaps[idx] == draws.len() {
                    gaps[idx] = t;
                }
                if let Some(prev) = last_seen[idx] {
                    gap_sums[idx] += (t - prev) as f64;
                    gap_counts[idx] += 1;
                }
                last_seen[idx] = Some(t);
            }
        }

        let theoretical = size as f64 / pool.pick_count() as f64;

        // score(i) = (retard / écart moyen)^gamma
        let mut scores: Vec<f64> = (0..size)
            .map(|i| {
                let mean_gap = if gap_counts[i] == 0 {
                    theoretical
                } else {
                    gap_sums[i] / gap_counts[i] as f64
                };
                let ratio = (gaps[i] as f64 + 1.0) / mean_gap.max(1.0);
                ratio.powf(self.gamma)
            })
            .collect();

        normalize(&mut scores);
        Ok(scores)
    }

    fn params(&self) -> HashMap<String, f64> {
        HashMap::from([("gamma".to_string(), self.gamma)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{make_test_draws, validate_distribution};

    #[test]
    fn test_retard_balls_sums_to_one() {
        let model = RetardModel::new(1.5);
        let draws = make_test_draws(30);
        let dist = model.predict(&draws, Pool::Balls).unwrap();
        assert!(validate_distribution(&dist, Pool::Balls),
            "Somme = {}, len = {}", dist.iter().sum::<f64>(), dist.len());
    }

    #[test]
    fn test_retard_stars_sums_to_one() {
        let model = RetardModel::new(1.5);
        let draws = make_test_draws(30);
        let dist = model.predict(&draws, Pool::Stars).unwrap();
        assert!(validate_distribution(&dist, Pool::Stars));
    }

    #[test]
    fn test_retard_empty_draws() {
        let model = RetardModel::new(1.5);
        let dist = model.predict(&[], Pool::Balls).unwrap();
        let expected = 1.0 / 35.0;
        for &p in &dist {
            assert!((p - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn test_retard_overdue_number_favoured() {
        let draws = make_test_draws(40);
        let last = draws.last().unwrap();
        let dist = RetardModel::new(1.5).predict(&draws, Pool::Balls).unwrap();
        // un numéro du dernier tirage a un retard nul
        let just_drawn = (last.balls[0] - 1) as usize;
        let max = dist.iter().cloned().fold(f64::MIN, f64::max);
        assert!(dist[just_drawn] < max);
    }
}
