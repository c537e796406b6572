pub mod calibration;

use std::collections::HashMap;

use superlotto_db::models::{Draw, Pool};
use tracing::warn;

use crate::error::ModelError;
use crate::models::{normalize, ProbabilityModel};

use self::calibration::EnsembleWeights;

/// Mélange pondéré de plusieurs modèles, lui-même utilisable comme modèle.
pub struct EnsembleModel {
    models: Vec<Box<dyn ProbabilityModel>>,
    ball_weights: Vec<f64>,
    star_weights: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct EnsemblePrediction {
    pub distribution: Vec<f64>,
    pub model_distributions: Vec<(String, Vec<f64>)>,
    pub spread: Vec<f64>,
}

impl EnsembleModel {
    pub fn new(models: Vec<Box<dyn ProbabilityModel>>) -> Self {
        let n = models.len().max(1);
        let uniform_weight = 1.0 / n as f64;
        Self {
            ball_weights: vec![uniform_weight; models.len()],
            star_weights: vec![uniform_weight; models.len()],
            models,
        }
    }

    pub fn with_weights(
        models: Vec<Box<dyn ProbabilityModel>>,
        ball_weights: Vec<f64>,
        star_weights: Vec<f64>,
    ) -> Self {
        Self {
            models,
            ball_weights,
            star_weights,
        }
    }

    /// Associe les poids calibrés aux modèles par nom ; un modèle absent reçoit 0.
    pub fn from_calibration(models: Vec<Box<dyn ProbabilityModel>>, weights: &EnsembleWeights) -> Self {
        let lookup = |table: &[(String, f64)], name: &str| {
            table
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, w)| *w)
                .unwrap_or(0.0)
        };
        let ball_weights = models
            .iter()
            .map(|m| lookup(&weights.ball_weights, m.name()))
            .collect();
        let star_weights = models
            .iter()
            .map(|m| lookup(&weights.star_weights, m.name()))
            .collect();
        Self::with_weights(models, ball_weights, star_weights)
    }

    pub fn weights(&self, pool: Pool) -> &[f64] {
        match pool {
            Pool::Balls => &self.ball_weights,
            Pool::Stars => &self.star_weights,
        }
    }

    /// Prévision détaillée. Un modèle en échec est ignoré et sa part redistribuée.
    pub fn predict_detailed(&self, draws: &[Draw], pool: Pool) -> Result<EnsemblePrediction, ModelError> {
        let weights = self.weights(pool);
        let size = pool.size();
        let mut combined = vec![0.0f64; size];
        let mut model_distributions = Vec::new();

        for (model, &w) in self.models.iter().zip(weights.iter()) {
            match model.predict(draws, pool) {
                Ok(dist) => {
                    for (c, p) in combined.iter_mut().zip(dist.iter()) {
                        *c += w * p;
                    }
                    model_distributions.push((model.name().to_string(), dist));
                }
                Err(e) => warn!(model = model.name(), error = %e, "modèle ignoré dans l'ensemble"),
            }
        }

        if model_distributions.is_empty() {
            return Err(ModelError::InvalidDistribution("Ensemble".to_string()));
        }

        normalize(&mut combined);
        let spread = compute_spread(&model_distributions, size);

        Ok(EnsemblePrediction {
            distribution: combined,
            model_distributions,
            spread,
        })
    }
}

impl ProbabilityModel for EnsembleModel {
    fn name(&self) -> &str {
        "Ensemble"
    }

    fn predict(&self, draws: &[Draw], pool: Pool) -> Result<Vec<f64>, ModelError> {
        Ok(self.predict_detailed(draws, pool)?.distribution)
    }

    fn params(&self) -> HashMap<String, f64> {
        self.models
            .iter()
            .zip(self.ball_weights.iter())
            .map(|(m, &w)| (format!("w_{}", m.name()), w))
            .collect()
    }
}

fn compute_spread(model_dists: &[(String, Vec<f64>)], size: usize) -> Vec<f64> {
    let n = model_dists.len() as f64;
    (0..size)
        .map(|j| {
            let mean = model_dists.iter().map(|(_, d)| d[j]).sum::<f64>() / n;
            let variance = model_dists.iter().map(|(_, d)| (d[j] - mean).powi(2)).sum::<f64>() / n;
            variance.sqrt()
        })
        .collect()
}
