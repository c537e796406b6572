use std::collections::HashMap;

use superlotto_db::models::{Draw, Pool};

use super::ProbabilityModel;
use crate::error::ModelError;

/// Fréquences lissées par un a priori de Dirichlet symétrique.
pub struct DirichletModel {
    alpha: f64,
    window: Option<usize>,
}

impl DirichletModel {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, window: None }
    }

    /// Ne compte que les `window` tirages les plus récents.
    pub fn with_window(alpha: f64, window: Option<usize>) -> Self {
        Self { alpha, window }
    }
}

impl ProbabilityModel for DirichletModel {
    fn name(&self) -> &str {
        "Dirichlet"
    }

    fn predict(&self, draws: &[Draw], pool: Pool) -> Result<Vec<f64>, ModelError> {
        let size = pool.size();
        let start = match self.window {
            Some(w) => draws.len().saturating_sub(w),
            None => 0,
        };
        let mut counts = vec![0u32; size];

        for draw in &draws[start..] {
            for &n in pool.numbers_from(draw) {
                let idx = (n - 1) as usize;
                if idx < size {
                    counts[idx] += 1;
                }
            }
        }

        let total: u32 = counts.iter().sum();
        let denominator = size as f64 * self.alpha + total as f64;
        if denominator <= 0.0 {
            return Err(ModelError::InvalidDistribution(self.name().to_string()));
        }

        Ok(counts
            .iter()
            .map(|&count| (self.alpha + count as f64) / denominator)
            .collect())
    }

    fn params(&self) -> HashMap<String, f64> {
        let mut params = HashMap::from([("alpha".to_string(), self.alpha)]);
        if let Some(w) = self.window {
            params.insert("window".to_string(), w as f64);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{make_test_draws, validate_distribution};

    #[test]
    fn test_dirichlet_balls_sums_to_one() {
        let model = DirichletModel::new(1.0);
        let draws = make_test_draws(20);
        let dist = model.predict(&draws, Pool::Balls).unwrap();
        assert!(validate_distribution(&dist, Pool::Balls));
    }

    #[test]
    fn test_dirichlet_stars_sums_to_one() {
        let model = DirichletModel::new(1.0);
        let draws = make_test_draws(20);
        let dist = model.predict(&draws, Pool::Stars).unwrap();
        assert!(validate_distribution(&dist, Pool::Stars));
    }

    #[test]
    fn test_dirichlet_uniform_empty() {
        let model = DirichletModel::new(1.0);
        let dist = model.predict(&[], Pool::Balls).unwrap();
        let expected = 1.0 / 35.0;
        for &p in &dist {
            assert!((p - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn test_dirichlet_window_uses_recent() {
        let draws = make_test_draws(10);
        let model = DirichletModel::with_window(1.0, Some(1));
        let dist = model.predict(&draws, Pool::Balls).unwrap();
        let last = draws.last().unwrap();
        let in_last = (last.balls[0] - 1) as usize;
        let absent = (1..=35u8).find(|n| !last.balls.contains(n)).unwrap();
        assert!(dist[in_last] > dist[(absent - 1) as usize]);
    }

    #[test]
    fn test_dirichlet_zero_alpha_empty_is_error() {
        let model = DirichletModel::new(0.0);
        assert!(model.predict(&[], Pool::Stars).is_err());
    }
}
