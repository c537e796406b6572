use std::collections::HashMap;

use superlotto_db::models::{Draw, Pool};

use super::{normalize, ProbabilityModel};
use crate::error::ModelError;

/// Moyenne mobile à décroissance exponentielle des apparitions.
pub struct EwmaModel {
    alpha: f64,
}

impl EwmaModel {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl ProbabilityModel for EwmaModel {
    fn name(&self) -> &str {
        "EWMA"
    }

    fn predict(&self, draws: &[Draw], pool: Pool) -> Result<Vec<f64>, ModelError> {
        let size = pool.size();
        let mut scores = vec![0.0f64; size];

        let floor = self.alpha.powi(draws.len() as i32 + 1);

        // t = 0 pour le tirage le plus récent
        for (t, draw) in draws.iter().rev().enumerate() {
            let weight = self.alpha.powi(t as i32);
            for &n in pool.numbers_from(draw) {
                let idx = (n - 1) as usize;
                if idx < size {
                    scores[idx] += weight;
                }
            }
        }

        for score in &mut scores {
            if *score < floor {
                *score = floor;
            }
        }

        normalize(&mut scores);
        Ok(scores)
    }

    fn params(&self) -> HashMap<String, f64> {
        HashMap::from([("alpha".to_string(), self.alpha)])
    }
}
