pub mod dirichlet;
pub mod ewma;
pub mod markov;
pub mod retard;

use std::collections::HashMap;

use superlotto_db::models::{Draw, Pool};

use crate::error::ModelError;

/// Source externe de probabilités par numéro.
pub trait ProbabilityModel: Send + Sync {
    fn name(&self) -> &str;
    /// `draws` en ordre chronologique (le plus récent en dernier).
    /// Retourne un vecteur de taille `pool.size()` dont la somme vaut 1.
    fn predict(&self, draws: &[Draw], pool: Pool) -> Result<Vec<f64>, ModelError>;
    fn params(&self) -> HashMap<String, f64>;
}

pub fn validate_distribution(dist: &[f64], pool: Pool) -> bool {
    if dist.len() != pool.size() {
        return false;
    }
    if dist.iter().any(|&p| p < 0.0 || !p.is_finite()) {
        return false;
    }
    let sum: f64 = dist.iter().sum();
    (sum - 1.0).abs() < 1e-9
}

/// Normalise en place ; retombe sur l'uniforme si la masse est nulle.
pub(crate) fn normalize(scores: &mut Vec<f64>) {
    let total: f64 = scores.iter().sum();
    if total > 0.0 && total.is_finite() {
        for s in scores.iter_mut() {
            *s /= total;
        }
    } else {
        let n = scores.len();
        *scores = vec![1.0 / n as f64; n];
    }
}

pub(crate) fn uniform(pool: Pool) -> Vec<f64> {
    vec![1.0 / pool.size() as f64; pool.size()]
}

pub fn all_models() -> Vec<Box<dyn ProbabilityModel>> {
    vec![
        Box::new(dirichlet::DirichletModel::with_window(0.1, Some(30))),
        Box::new(ewma::EwmaModel::new(0.9)),
        Box::new(markov::MarkovModel::new()),
        Box::new(retard::RetardModel::new(1.5)),
    ]
}

pub fn model_by_name(name: &str) -> Option<Box<dyn ProbabilityModel>> {
    all_models()
        .into_iter()
        .find(|m| m.name().eq_ignore_ascii_case(name))
}

/// Historique synthétique déterministe, périodes 1000.., ordre chronologique.
pub fn make_test_draws(n: usize) -> Vec<Draw> {
    (0..n)
        .map(|i| {
            let mut balls = [0u8; 5];
            for (j, b) in balls.iter_mut().enumerate() {
                *b = ((i * 3 + j * 7) % 35) as u8 + 1;
            }
            balls.sort_unstable();
            let mut stars = [(i % 12) as u8 + 1, ((i + 5) % 12) as u8 + 1];
            stars.sort_unstable();
            Draw {
                period: 1000 + i as u32,
                date: format!("2024-{:02}-{:02}", (i / 28) % 12 + 1, (i % 28) + 1),
                balls,
                stars,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use superlotto_db::models::validate_draw;

    #[test]
    fn test_validate_distribution_valid() {
        let dist = vec![1.0 / 35.0; 35];
        assert!(validate_distribution(&dist, Pool::Balls));
    }

    #[test]
    fn test_validate_distribution_wrong_size() {
        let dist = vec![1.0 / 35.0; 34];
        assert!(!validate_distribution(&dist, Pool::Balls));
    }

    #[test]
    fn test_validate_distribution_negative() {
        let mut dist = vec![1.0 / 35.0; 35];
        dist[0] = -0.1;
        assert!(!validate_distribution(&dist, Pool::Balls));
    }

    #[test]
    fn test_normalize_zero_mass() {
        let mut v = vec![0.0; 4];
        normalize(&mut v);
        assert_eq!(v, vec![0.25; 4]);
    }

    #[test]
    fn test_make_test_draws_valid() {
        let draws = make_test_draws(100);
        for w in draws.windows(2) {
            assert!(w[0].period < w[1].period);
        }
        for d in &draws {
            assert!(validate_draw(&d.balls, &d.stars).is_ok(), "tirage invalide {:?}", d);
        }
    }

    #[test]
    fn test_all_models_valid_distributions() {
        let draws = make_test_draws(60);
        for model in all_models() {
            for pool in [Pool::Balls, Pool::Stars] {
                let dist = model.predict(&draws, pool).unwrap();
                assert!(validate_distribution(&dist, pool), "{} / {:?}", model.name(), pool);
            }
        }
    }

    #[test]
    fn test_model_by_name() {
        assert_eq!(model_by_name("ewma").unwrap().name(), "EWMA");
        assert!(model_by_name("inconnu").is_none());
    }
}
