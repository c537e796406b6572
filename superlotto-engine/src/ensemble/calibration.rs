use std::path::Path;

use serde::{Deserialize, Serialize};
use superlotto_db::models::{Draw, Pool};
use tracing::debug;

use crate::error::{EngineError, ModelError};
use crate::models::ProbabilityModel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub model_name: String,
    pub window: usize,
    pub log_likelihood: f64,
    pub n_tests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCalibration {
    pub model_name: String,
    pub results: Vec<CalibrationResult>,
    pub best_window: usize,
    pub best_ll: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub ball_weights: Vec<(String, f64)>,
    pub star_weights: Vec<(String, f64)>,
    pub calibrations: Vec<ModelCalibration>,
}

/// Évaluation walk-forward : pour chaque tirage test t, le modèle ne voit que
/// draws[t - window..t] (ordre chronologique), puis on mesure la log-vraisemblance
/// moyenne des numéros réellement sortis en t.
pub fn walk_forward_evaluate(
    model: &dyn ProbabilityModel,
    draws: &[Draw],
    window: usize,
    pool: Pool,
) -> (f64, usize) {
    if draws.len() <= window {
        return (f64::NEG_INFINITY, 0);
    }
    let candidates = draws.len() - window;

    // ~100 points de test au plus
    let max_tests = 100;
    let stride = (candidates / max_tests).max(1);

    let mut total_ll = 0.0f64;
    let mut n_tests = 0usize;

    for t in (window..draws.len()).rev().step_by(stride) {
        let train_data = &draws[t - window..t];
        if train_data.len() < 3 {
            continue;
        }

        let dist = match model.predict(train_data, pool) {
            Ok(dist) => dist,
            Err(e) => {
                debug!(model = model.name(), error = %e, "point de test ignoré");
                continue;
            }
        };

        let mut draw_ll = 0.0f64;
        for &n in pool.numbers_from(&draws[t]) {
            let idx = (n - 1) as usize;
            if idx < dist.len() {
                draw_ll += dist[idx].max(1e-15).ln();
            }
        }

        total_ll += draw_ll;
        n_tests += 1;
    }

    if n_tests > 0 {
        (total_ll / n_tests as f64, n_tests)
    } else {
        (f64::NEG_INFINITY, 0)
    }
}

/// Log-vraisemblance d'un tirage sous la loi uniforme.
pub fn uniform_log_likelihood(pool: Pool) -> f64 {
    let p = 1.0 / pool.size() as f64;
    pool.pick_count() as f64 * p.ln()
}

/// Poids proportionnels au gain sur l'uniforme ; poids égaux si aucun modèle ne la bat.
pub fn compute_weights(calibrations: &[ModelCalibration], pool: Pool) -> Vec<(String, f64)> {
    let uniform_ll = uniform_log_likelihood(pool);

    let skills: Vec<f64> = calibrations
        .iter()
        .map(|c| (c.best_ll - uniform_ll).max(0.0))
        .collect();

    let total_skill: f64 = skills.iter().sum();

    if total_skill > 0.0 {
        calibrations
            .iter()
            .zip(skills.iter())
            .map(|(c, &skill)| (c.model_name.clone(), skill / total_skill))
            .collect()
    } else {
        let n = calibrations.len() as f64;
        calibrations
            .iter()
            .map(|c| (c.model_name.clone(), 1.0 / n))
            .collect()
    }
}

pub fn calibrate_model(
    model: &dyn ProbabilityModel,
    draws: &[Draw],
    windows: &[usize],
    pool: Pool,
) -> Result<ModelCalibration, ModelError> {
    let Some(&first) = windows.first() else {
        return Err(ModelError::Calibration("aucune fenêtre".to_string()));
    };

    let mut results = Vec::with_capacity(windows.len());
    let mut best_ll = f64::NEG_INFINITY;
    let mut best_window = first;

    for &window in windows {
        let (ll, n_tests) = walk_forward_evaluate(model, draws, window, pool);
        results.push(CalibrationResult {
            model_name: model.name().to_string(),
            window,
            log_likelihood: ll,
            n_tests,
        });

        if ll > best_ll {
            best_ll = ll;
            best_window = window;
        }
    }

    Ok(ModelCalibration {
        model_name: model.name().to_string(),
        results,
        best_window,
        best_ll,
    })
}

/// Calibre chaque modèle sur les deux grilles et produit les poids de l'ensemble.
pub fn calibrate_all(
    models: &[Box<dyn ProbabilityModel>],
    draws: &[Draw],
    windows: &[usize],
) -> Result<EnsembleWeights, ModelError> {
    let mut ball_cals = Vec::with_capacity(models.len());
    let mut star_cals = Vec::with_capacity(models.len());
    for model in models {
        ball_cals.push(calibrate_model(model.as_ref(), draws, windows, Pool::Balls)?);
        star_cals.push(calibrate_model(model.as_ref(), draws, windows, Pool::Stars)?);
    }
    let ball_weights = compute_weights(&ball_cals, Pool::Balls);
    let star_weights = compute_weights(&star_cals, Pool::Stars);
    ball_cals.extend(star_cals);
    Ok(EnsembleWeights {
        ball_weights,
        star_weights,
        calibrations: ball_cals,
    })
}

pub fn save_weights(weights: &EnsembleWeights, path: &Path) -> Result<(), EngineError> {
    let json = serde_json::to_string_pretty(weights)?;
    std::fs::write(path, json).map_err(|source| EngineError::ConfigIo {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_weights(path: &Path) -> Result<EnsembleWeights, EngineError> {
    let json = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dirichlet::DirichletModel;
    use crate::models::{all_models, make_test_draws};

    #[test]
    fn test_walk_forward_returns_finite() {
        let draws = make_test_draws(50);
        let model = DirichletModel::new(1.0);
        let (ll, n) = walk_forward_evaluate(&model, &draws, 20, Pool::Balls);
        assert!(ll.is_finite(), "LL devrait être finie : {}", ll);
        assert_eq!(n, 30);
    }

    #[test]
    fn test_walk_forward_too_few_draws() {
        let draws = make_test_draws(5);
        let model = DirichletModel::new(1.0);
        let (ll, n) = walk_forward_evaluate(&model, &draws, 10, Pool::Balls);
        assert_eq!(ll, f64::NEG_INFINITY);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_uniform_ll() {
        let ll = uniform_log_likelihood(Pool::Balls);
        // 5 * ln(1/35) ≈ -17.78
        assert!((ll - 5.0 * (1.0f64 / 35.0).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_compute_weights_sum_to_one() {
        let calibrations = vec![
            ModelCalibration {
                model_name: "A".to_string(),
                results: vec![],
                best_window: 20,
                best_ll: -15.0,
            },
            ModelCalibration {
                model_name: "B".to_string(),
                results: vec![],
                best_window: 30,
                best_ll: -18.0,
            },
        ];
        let weights = compute_weights(&calibrations, Pool::Balls);
        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-10, "Somme des poids = {}", sum);
    }

    #[test]
    fn test_compute_weights_zero_for_below_uniform() {
        let uniform_ll = uniform_log_likelihood(Pool::Balls);
        let calibrations = vec![
            ModelCalibration {
                model_name: "Good".to_string(),
                results: vec![],
                best_window: 20,
                best_ll: uniform_ll + 1.0,
            },
            ModelCalibration {
                model_name: "Bad".to_string(),
                results: vec![],
                best_window: 30,
                best_ll: uniform_ll - 1.0,
            },
        ];
        let weights = compute_weights(&calibrations, Pool::Balls);
        let bad_weight = weights.iter().find(|(n, _)| n == "Bad").unwrap().1;
        assert_eq!(bad_weight, 0.0);
    }

    #[test]
    fn test_calibrate_model() {
        let draws = make_test_draws(50);
        let model = DirichletModel::new(1.0);
        let cal = calibrate_model(&model, &draws, &[10, 20, 30], Pool::Balls).unwrap();
        assert_eq!(cal.model_name, "Dirichlet");
        assert_eq!(cal.results.len(), 3);
        assert!(cal.best_ll.is_finite());
        assert!(calibrate_model(&model, &draws, &[], Pool::Balls).is_err());
    }

    #[test]
    fn test_calibrate_all_and_save_load() {
        let draws = make_test_draws(60);
        let weights = calibrate_all(&all_models(), &draws, &[20, 40]).unwrap();
        assert_eq!(weights.ball_weights.len(), 4);
        assert_eq!(weights.calibrations.len(), 8);
        let sum: f64 = weights.star_weights.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        save_weights(&weights, &path).unwrap();
        let loaded = load_weights(&path).unwrap();
        assert_eq!(loaded.ball_weights, weights.ball_weights);
    }
}
