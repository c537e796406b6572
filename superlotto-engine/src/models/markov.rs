use std::collections::HashMap;

use superlotto_db::models::{ball_zone, Draw, Pool};

use super::{normalize, uniform, ProbabilityModel};
use crate::error::ModelError;

/// Chaîne de Markov sur les plages de numéros (zones des boules, moitiés des étoiles),
/// redistribuée à l'intérieur de chaque plage par la fréquence récente.
pub struct MarkovModel {
    frequency_window: usize,
}

impl Default for MarkovModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkovModel {
    pub fn new() -> Self {
        Self {
            frequency_window: 50,
        }
    }
}

fn range_count(pool: Pool) -> usize {
    match pool {
        Pool::Balls => 3,
        Pool::Stars => 2,
    }
}

fn range_of(n: u8, pool: Pool) -> usize {
    match pool {
        Pool::Balls => ball_zone(n),
        Pool::Stars => usize::from(n > pool.low_half_max()),
    }
}

fn numbers_to_ranges(numbers: &[u8], pool: Pool) -> Vec<usize> {
    let mut ranges: Vec<usize> = numbers.iter().map(|&n| range_of(n, pool)).collect();
    ranges.sort_unstable();
    ranges.dedup();
    ranges
}

impl ProbabilityModel for MarkovModel {
    fn name(&self) -> &str {
        "Markov"
    }

    fn predict(&self, draws: &[Draw], pool: Pool) -> Result<Vec<f64>, ModelError> {
        let size = pool.size();
        if draws.len() < 2 {
            return Ok(uniform(pool));
        }

        let n_ranges = range_count(pool);

        // transition[i][j] = P(plage j au tirage suivant | plage i présente)
        let mut transition = vec![vec![0.0f64; n_ranges]; n_ranges];
        let mut from_counts = vec![0.0f64; n_ranges];

        for pair in draws.windows(2) {
            let current_ranges = numbers_to_ranges(pool.numbers_from(&pair[0]), pool);
            let next_ranges = numbers_to_ranges(pool.numbers_from(&pair[1]), pool);

            for &from in &current_ranges {
                from_counts[from] += 1.0;
                for &to in &next_ranges {
                    transition[from][to] += 1.0;
                }
            }
        }

        for i in 0..n_ranges {
            if from_counts[i] > 0.0 {
                for j in 0..n_ranges {
                    transition[i][j] /= from_counts[i];
                }
            } else {
                for j in 0..n_ranges {
                    transition[i][j] = 1.0 / n_ranges as f64;
                }
            }
        }

        let Some(latest) = draws.last() else {
            return Ok(uniform(pool));
        };
        let latest_ranges = numbers_to_ranges(pool.numbers_from(latest), pool);

        let mut range_probs = vec![0.0f64; n_ranges];
        for &from in &latest_ranges {
            for j in 0..n_ranges {
                range_probs[j] += transition[from][j];
            }
        }
        normalize(&mut range_probs);

        let mut freq = vec![0u32; size];
        let start = draws.len().saturating_sub(self.frequency_window);
        for draw in &draws[start..] {
            for &n in pool.numbers_from(draw) {
                let idx = (n - 1) as usize;
                if idx < size {
                    freq[idx] += 1;
                }
            }
        }

        let mut scores: Vec<f64> = (1..=size as u8)
            .map(|n| {
                let intra_weight = freq[(n - 1) as usize] as f64 + 1.0;
                range_probs[range_of(n, pool)] * intra_weight
            })
            .collect();
        normalize(&mut scores);
        Ok(scores)
    }

    fn params(&self) -> HashMap<String, f64> {
        HashMap::from([("frequency_window".to_string(), self.frequency_window as f64)])
    }
}
