use serde::Serialize;
use superlotto_db::models::{Draw, Pool};

/// Chaleur des numéros d'une grille sur une fenêtre récente.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolHeat {
    /// Index = numéro - 1.
    pub frequency: Vec<u32>,
    /// Tirages écoulés depuis la dernière sortie dans la fenêtre (taille de fenêtre si absent).
    pub missing: Vec<u32>,
    pub hot: Vec<u8>,
    pub cold: Vec<u8>,
    pub super_cold: Vec<u8>,
}

impl PoolHeat {
    /// `draws` en ordre chronologique ; seules les `window` dernières périodes comptent.
    pub fn compute(draws: &[Draw], pool: Pool, window: usize, super_cold_gap: u32) -> Self {
        let size = pool.size();
        let recent = &draws[draws.len().saturating_sub(window)..];

        let mut frequency = vec![0u32; size];
        let mut last_seen: Vec<Option<usize>> = vec![None; size];
        for (i, draw) in recent.iter().enumerate() {
            for &n in pool.numbers_from(draw) {
                let idx = (n - 1) as usize;
                frequency[idx] += 1;
                last_seen[idx] = Some(i);
            }
        }

        let missing: Vec<u32> = last_seen
            .iter()
            .map(|seen| match seen {
                Some(i) => (recent.len() - i - 1) as u32,
                None => recent.len() as u32,
            })
            .collect();

        let total: u32 = frequency.iter().sum();
        let avg = total as f64 / size as f64;

        let numbers = 1..=size as u8;
        let hot = numbers
            .clone()
            .filter(|&n| {
                let f = frequency[(n - 1) as usize];
                f > 0 && f as f64 >= avg
            })
            .collect();
        let cold = numbers
            .clone()
            .filter(|&n| (frequency[(n - 1) as usize] as f64) < avg)
            .collect();
        let super_cold = numbers
            .filter(|&n| missing[(n - 1) as usize] >= super_cold_gap)
            .collect();

        Self {
            frequency,
            missing,
            hot,
            cold,
            super_cold,
        }
    }

    pub fn frequency_of(&self, n: u8) -> u32 {
        self.frequency.get((n - 1) as usize).copied().unwrap_or(0)
    }

    pub fn missing_of(&self, n: u8) -> u32 {
        self.missing.get((n - 1) as usize).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotColdInfo {
    pub window: usize,
    pub balls: PoolHeat,
    pub stars: PoolHeat,
}

impl HotColdInfo {
    pub fn compute(draws: &[Draw], window: usize, super_cold_gap: u32) -> Self {
        Self {
            window,
            balls: PoolHeat::compute(draws, Pool::Balls, window, super_cold_gap),
            stars: PoolHeat::compute(draws, Pool::Stars, window, super_cold_gap),
        }
    }

    pub fn pool(&self, pool: Pool) -> &PoolHeat {
        match pool {
            Pool::Balls => &self.balls,
            Pool::Stars => &self.stars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(period: u32, balls: [u8; 5], stars: [u8; 2]) -> Draw {
        Draw::new(period, "2024-01-01", balls, stars).unwrap()
    }

    #[test]
    fn test_frequency_and_missing() {
        let draws = vec![
            draw(1, [1, 2, 3, 4, 5], [1, 2]),
            draw(2, [1, 6, 7, 8, 9], [1, 3]),
            draw(3, [1, 10, 11, 12, 13], [4, 5]),
        ];
        let heat = PoolHeat::compute(&draws, Pool::Balls, 20, 10);
        assert_eq!(heat.frequency_of(1), 3);
        assert_eq!(heat.frequency_of(2), 1);
        assert_eq!(heat.missing_of(1), 0);
        assert_eq!(heat.missing_of(2), 2);
        assert_eq!(heat.missing_of(35), 3);
        assert!(heat.hot.contains(&1));
        assert!(!heat.hot.contains(&35));
        assert!(heat.cold.contains(&35));
        assert!(heat.super_cold.is_empty());
    }

    #[test]
    fn test_window_limits_history() {
        let draws = vec![
            draw(1, [1, 2, 3, 4, 5], [1, 2]),
            draw(2, [6, 7, 8, 9, 10], [3, 4]),
        ];
        let heat = PoolHeat::compute(&draws, Pool::Balls, 1, 1);
        assert_eq!(heat.frequency_of(1), 0);
        assert_eq!(heat.frequency_of(6), 1);
        assert!(heat.super_cold.contains(&1));
        assert!(!heat.super_cold.contains(&6));
    }

    #[test]
    fn test_stars_pool() {
        let draws = vec![draw(1, [1, 2, 3, 4, 5], [11, 12])];
        let info = HotColdInfo::compute(&draws, 20, 10);
        assert_eq!(info.stars.frequency.len(), 12);
        assert_eq!(info.pool(Pool::Stars).frequency_of(12), 1);
        assert_eq!(info.balls.frequency.len(), 35);
    }
}
