use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub period: u32,
    pub date: String,
    pub balls: [u8; 5],
    pub stars: [u8; 2],
}

impl Draw {
    /// Construit un tirage validé, numéros triés par ordre croissant.
    pub fn new(period: u32, date: impl Into<String>, mut balls: [u8; 5], mut stars: [u8; 2]) -> Result<Self> {
        validate_draw(&balls, &stars)?;
        balls.sort_unstable();
        stars.sort_unstable();
        Ok(Self {
            period,
            date: date.into(),
            balls,
            stars,
        })
    }

    pub fn ball_mask(&self) -> NumberMask {
        NumberMask::from_numbers(&self.balls)
    }

    pub fn star_mask(&self) -> NumberMask {
        NumberMask::from_numbers(&self.stars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pool {
    Balls,
    Stars,
}

impl Pool {
    pub fn size(&self) -> usize {
        match self {
            Pool::Balls => 35,
            Pool::Stars => 12,
        }
    }

    pub fn pick_count(&self) -> usize {
        match self {
            Pool::Balls => 5,
            Pool::Stars => 2,
        }
    }

    pub fn numbers_from<'a>(&self, draw: &'a Draw) -> &'a [u8] {
        match self {
            Pool::Balls => &draw.balls,
            Pool::Stars => &draw.stars,
        }
    }

    /// Plus grand numéro de la moitié basse (étoiles 1-6, boules 1-17).
    pub fn low_half_max(&self) -> u8 {
        match self {
            Pool::Balls => 17,
            Pool::Stars => 6,
        }
    }
}

/// Les trois zones des boules : 1-11, 12-23, 24-35.
pub const BALL_ZONES: [(u8, u8); 3] = [(1, 11), (12, 23), (24, 35)];

/// Seuil des « grands » numéros (boules >= 18).
pub const BIG_BALL_MIN: u8 = 18;

pub fn ball_zone(ball: u8) -> usize {
    if ball <= BALL_ZONES[0].1 {
        0
    } else if ball <= BALL_ZONES[1].1 {
        1
    } else {
        2
    }
}

/// Ensemble de numéros d'une grille sous forme de masque 64 bits (bit n = numéro n).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumberMask(pub u64);

impl NumberMask {
    /// Les numéros hors du masque (>= 64) sont ignorés.
    pub fn from_numbers(numbers: &[u8]) -> Self {
        Self(
            numbers
                .iter()
                .filter_map(|&n| 1u64.checked_shl(n as u32))
                .fold(0u64, |acc, bit| acc | bit),
        )
    }

    /// Comme `from_numbers`, mais refuse tout numéro hors de `1..=pool.size()`.
    pub fn try_from_numbers(numbers: &[u8], pool: Pool) -> Result<Self> {
        let max = pool.size() as u8;
        if let Some(&n) = numbers.iter().find(|&&n| n < 1 || n > max) {
            let label = match pool {
                Pool::Balls => "Boule",
                Pool::Stars => "Étoile",
            };
            bail!("{} {} hors limites (1-{})", label, n, max);
        }
        Ok(Self::from_numbers(numbers))
    }

    pub fn contains(&self, n: u8) -> bool {
        n < 64 && self.0 & (1u64 << n) != 0
    }

    pub fn len(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn overlap(&self, other: &NumberMask) -> u32 {
        (self.0 & other.0).count_ones()
    }

    pub fn numbers(&self) -> Vec<u8> {
        (0..64u8).filter(|&n| self.contains(n)).collect()
    }
}

pub fn validate_draw(balls: &[u8; 5], stars: &[u8; 2]) -> Result<()> {
    let ball_max = Pool::Balls.size() as u8;
    let star_max = Pool::Stars.size() as u8;
    for &b in balls {
        if b < 1 || b > ball_max {
            bail!("Boule {} hors limites (1-{})", b, ball_max);
        }
    }
    for &s in stars {
        if s < 1 || s > star_max {
            bail!("Étoile {} hors limites (1-{})", s, star_max);
        }
    }
    for i in 0..balls.len() {
        for j in (i + 1)..balls.len() {
            if balls[i] == balls[j] {
                bail!("Boule en double : {}", balls[i]);
            }
        }
    }
    if stars[0] == stars[1] {
        bail!("Étoile en double : {}", stars[0]);
    }
    Ok(())
}

/// Historique des tirages en ordre chronologique (le plus ancien en premier).
/// On ne peut qu'ajouter en fin : chaque période doit être strictement supérieure à la précédente.
#[derive(Debug, Clone, Default)]
pub struct History {
    draws: Vec<Draw>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trie les tirages par période puis les ajoute un à un.
    pub fn from_draws(mut draws: Vec<Draw>) -> Result<Self> {
        draws.sort_by_key(|d| d.period);
        let mut history = Self::new();
        for draw in draws {
            history.push(draw)?;
        }
        Ok(history)
    }

    pub fn push(&mut self, draw: Draw) -> Result<()> {
        validate_draw(&draw.balls, &draw.stars)?;
        if let Some(last) = self.draws.last() {
            if draw.period <= last.period {
                bail!(
                    "Période {} non croissante (dernière période : {})",
                    draw.period,
                    last.period
                );
            }
        }
        self.draws.push(draw);
        Ok(())
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn latest(&self) -> Option<&Draw> {
        self.draws.last()
    }

    /// Tirages de période strictement inférieure à `period`.
    pub fn before(&self, period: u32) -> &[Draw] {
        let end = self.draws.partition_point(|d| d.period < period);
        &self.draws[..end]
    }

    pub fn find(&self, period: u32) -> Option<&Draw> {
        self.draws
            .binary_search_by_key(&period, |d| d.period)
            .ok()
            .map(|i| &self.draws[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(period: u32, balls: [u8; 5], stars: [u8; 2]) -> Draw {
        Draw::new(period, "2024-01-01", balls, stars).unwrap()
    }

    #[test]
    fn test_validate_draw_ok() {
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[1, 2]).is_ok());
        assert!(validate_draw(&[35, 34, 33, 32, 31], &[11, 12]).is_ok());
    }

    #[test]
    fn test_validate_draw_ball_out_of_range() {
        assert!(validate_draw(&[0, 2, 3, 4, 5], &[1, 2]).is_err());
        assert!(validate_draw(&[1, 2, 3, 4, 36], &[1, 2]).is_err());
    }

    #[test]
    fn test_validate_draw_star_out_of_range() {
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[0, 2]).is_err());
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[1, 13]).is_err());
    }

    #[test]
    fn test_validate_draw_duplicates() {
        assert!(validate_draw(&[1, 1, 3, 4, 5], &[1, 2]).is_err());
        assert!(validate_draw(&[1, 2, 3, 4, 5], &[3, 3]).is_err());
    }

    #[test]
    fn test_draw_new_sorts() {
        let d = draw(1, [30, 2, 17, 9, 4], [12, 3]);
        assert_eq!(d.balls, [2, 4, 9, 17, 30]);
        assert_eq!(d.stars, [3, 12]);
    }

    #[test]
    fn test_pool() {
        assert_eq!(Pool::Balls.size(), 35);
        assert_eq!(Pool::Stars.size(), 12);
        assert_eq!(Pool::Balls.pick_count(), 5);
        assert_eq!(Pool::Stars.pick_count(), 2);
        let d = draw(1, [1, 2, 3, 4, 5], [6, 7]);
        assert_eq!(Pool::Balls.numbers_from(&d), &[1, 2, 3, 4, 5]);
        assert_eq!(Pool::Stars.numbers_from(&d), &[6, 7]);
    }

    #[test]
    fn test_ball_zone() {
        assert_eq!(ball_zone(1), 0);
        assert_eq!(ball_zone(11), 0);
        assert_eq!(ball_zone(12), 1);
        assert_eq!(ball_zone(23), 1);
        assert_eq!(ball_zone(24), 2);
        assert_eq!(ball_zone(35), 2);
    }

    #[test]
    fn test_mask_overlap_symmetric() {
        let a = NumberMask::from_numbers(&[1, 5, 9, 20, 35]);
        let b = NumberMask::from_numbers(&[5, 9, 21, 30, 35]);
        assert_eq!(a.overlap(&b), 3);
        assert_eq!(b.overlap(&a), 3);
        assert_eq!(a.len(), 5);
        assert_eq!(a.numbers(), vec![1, 5, 9, 20, 35]);
    }

    #[test]
    fn test_mask_rejects_out_of_pool_numbers() {
        assert_eq!(NumberMask::from_numbers(&[3, 64, 200]), NumberMask::from_numbers(&[3]));
        assert!(!NumberMask::from_numbers(&[200]).contains(200));

        let ok = NumberMask::try_from_numbers(&[1, 35], Pool::Balls).unwrap();
        assert_eq!(ok.numbers(), vec![1, 35]);
        assert!(NumberMask::try_from_numbers(&[36], Pool::Balls).is_err());
        assert!(NumberMask::try_from_numbers(&[0, 4], Pool::Balls).is_err());
        assert!(NumberMask::try_from_numbers(&[13], Pool::Stars).is_err());
        assert!(NumberMask::try_from_numbers(&[100], Pool::Stars).is_err());
    }

    #[test]
    fn test_history_push_requires_increasing_period() {
        let mut h = History::new();
        h.push(draw(10, [1, 2, 3, 4, 5], [1, 2])).unwrap();
        assert!(h.push(draw(10, [6, 7, 8, 9, 10], [1, 2])).is_err());
        assert!(h.push(draw(9, [6, 7, 8, 9, 10], [1, 2])).is_err());
        h.push(draw(11, [6, 7, 8, 9, 10], [1, 2])).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.latest().unwrap().period, 11);
    }

    #[test]
    fn test_history_before_and_find() {
        let h = History::from_draws(vec![
            draw(12, [1, 2, 3, 4, 5], [1, 2]),
            draw(10, [6, 7, 8, 9, 10], [3, 4]),
            draw(11, [11, 12, 13, 14, 15], [5, 6]),
        ])
        .unwrap();
        assert_eq!(h.draws()[0].period, 10);
        assert_eq!(h.before(12).len(), 2);
        assert_eq!(h.before(10).len(), 0);
        assert_eq!(h.before(100).len(), 3);
        assert_eq!(h.find(11).unwrap().stars, [5, 6]);
        assert!(h.find(13).is_none());
    }
}
