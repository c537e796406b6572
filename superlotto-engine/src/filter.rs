use std::collections::HashSet;

use serde::Serialize;
use superlotto_db::models::{ball_zone, Draw, NumberMask, Pool};

use crate::config::FilterConfig;
use crate::error::{EngineError, Result};
use crate::features::compute;

/// Motif de rejet, dans l'ordre d'application des prédicats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Rejection {
    ParityBalance,
    RunLength,
    Progression,
    ZoneConcentration,
    ExcludedBall,
    ExcludedStar,
    SumRange,
    ParityRatio,
    BallOverlap,
    StarOverlap,
    HistoricalDuplicate,
    StarSkew,
}

impl Rejection {
    pub const ALL: [Rejection; 12] = [
        Rejection::ParityBalance,
        Rejection::RunLength,
        Rejection::Progression,
        Rejection::ZoneConcentration,
        Rejection::ExcludedBall,
        Rejection::ExcludedStar,
        Rejection::SumRange,
        Rejection::ParityRatio,
        Rejection::BallOverlap,
        Rejection::StarOverlap,
        Rejection::HistoricalDuplicate,
        Rejection::StarSkew,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Rejection::ParityBalance => "parity-balance",
            Rejection::RunLength => "run-length",
            Rejection::Progression => "progression",
            Rejection::ZoneConcentration => "zone-concentration",
            Rejection::ExcludedBall => "excluded-ball",
            Rejection::ExcludedStar => "excluded-star",
            Rejection::SumRange => "sum-range",
            Rejection::ParityRatio => "parity-ratio",
            Rejection::BallOverlap => "ball-overlap",
            Rejection::StarOverlap => "star-overlap",
            Rejection::HistoricalDuplicate => "historical-duplicate",
            Rejection::StarSkew => "star-skew",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Contraintes fournies par l'utilisateur, exprimées pour une grille de 5 boules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub excluded_balls: Vec<u8>,
    pub excluded_stars: Vec<u8>,
    /// Somme inclusive des boules.
    pub sum_range: Option<(u16, u16)>,
    /// Nombre de boules impaires visé.
    pub odd_count: Option<u8>,
}

impl Constraints {
    pub fn validate(&self) -> Result<()> {
        for &b in &self.excluded_balls {
            if b < 1 || b as usize > Pool::Balls.size() {
                return Err(EngineError::InvalidConstraint(format!(
                    "boule exclue {b} hors limites"
                )));
            }
        }
        for &s in &self.excluded_stars {
            if s < 1 || s as usize > Pool::Stars.size() {
                return Err(EngineError::InvalidConstraint(format!(
                    "étoile exclue {s} hors limites"
                )));
            }
        }
        if let Some((lo, hi)) = self.sum_range {
            if lo > hi {
                return Err(EngineError::InvalidConstraint(format!(
                    "intervalle de somme vide {lo}-{hi}"
                )));
            }
        }
        if let Some(odd) = self.odd_count {
            if odd as usize > Pool::Balls.pick_count() {
                return Err(EngineError::InvalidConstraint(format!(
                    "nombre d'impairs {odd} supérieur à {}",
                    Pool::Balls.pick_count()
                )));
            }
        }
        Ok(())
    }
}

/// Prédicat d'acceptation d'une grille. Sans état mutable : partageable entre threads.
#[derive(Debug, Clone)]
pub struct ConstraintFilter {
    config: FilterConfig,
    excluded_balls: NumberMask,
    excluded_stars: NumberMask,
    sum_range: Option<(u16, u16)>,
    odd_count: Option<u8>,
    last_balls: Option<NumberMask>,
    last_stars: Option<NumberMask>,
    past_draws: HashSet<(NumberMask, NumberMask)>,
}

impl ConstraintFilter {
    /// `history` : tirages antérieurs à la période visée, ordre chronologique.
    pub fn new(constraints: &Constraints, history: &[Draw], config: &FilterConfig) -> Self {
        Self {
            config: config.clone(),
            excluded_balls: NumberMask::from_numbers(&constraints.excluded_balls),
            excluded_stars: NumberMask::from_numbers(&constraints.excluded_stars),
            sum_range: constraints.sum_range,
            odd_count: constraints.odd_count,
            last_balls: history.last().map(Draw::ball_mask),
            last_stars: history.last().map(Draw::star_mask),
            past_draws: history
                .iter()
                .map(|d| (d.ball_mask(), d.star_mask()))
                .collect(),
        }
    }

    /// Filtre sans contrainte ni historique.
    pub fn permissive(config: &FilterConfig) -> Self {
        Self::new(&Constraints::default(), &[], config)
    }

    /// Applique les prédicats dans l'ordre et s'arrête au premier échec.
    pub fn check(&self, balls: &[u8], stars: &[u8]) -> Result<(), Rejection> {
        let ball_mask = NumberMask::from_numbers(balls);
        let star_mask = NumberMask::from_numbers(stars);

        self.check_shape(balls)?;
        if self.excluded_balls.overlap(&ball_mask) > 0 {
            return Err(Rejection::ExcludedBall);
        }
        if self.excluded_stars.overlap(&star_mask) > 0 {
            return Err(Rejection::ExcludedStar);
        }
        self.check_targets(balls)?;
        self.check_last_balls(ball_mask)?;
        self.check_last_stars(star_mask)?;
        self.check_pair(ball_mask, star_mask)?;
        check_star_skew(stars)
    }

    /// Prédicats ne dépendant que des boules.
    pub fn check_balls(&self, balls: &[u8], mask: NumberMask) -> Result<(), Rejection> {
        self.check_shape(balls)?;
        if self.excluded_balls.overlap(&mask) > 0 {
            return Err(Rejection::ExcludedBall);
        }
        self.check_targets(balls)?;
        self.check_last_balls(mask)
    }

    /// Prédicats ne dépendant que des étoiles.
    pub fn check_stars(&self, stars: &[u8], mask: NumberMask) -> Result<(), Rejection> {
        if self.excluded_stars.overlap(&mask) > 0 {
            return Err(Rejection::ExcludedStar);
        }
        self.check_last_stars(mask)?;
        check_star_skew(stars)
    }

    /// Prédicat portant sur la grille complète.
    pub fn check_pair(&self, balls: NumberMask, stars: NumberMask) -> Result<(), Rejection> {
        if self.past_draws.contains(&(balls, stars)) {
            return Err(Rejection::HistoricalDuplicate);
        }
        Ok(())
    }

    fn check_shape(&self, balls: &[u8]) -> Result<(), Rejection> {
        let odd = compute::odd_count(balls) as usize;
        if odd == 0 || odd == balls.len() {
            return Err(Rejection::ParityBalance);
        }
        if compute::longest_run(balls) >= self.config.max_run {
            return Err(Rejection::RunLength);
        }
        if is_progression(balls, self.config.geometric_tolerance) {
            return Err(Rejection::Progression);
        }
        let zone = ball_zone(balls[0]);
        if balls.iter().all(|&b| ball_zone(b) == zone) {
            return Err(Rejection::ZoneConcentration);
        }
        Ok(())
    }

    fn check_targets(&self, balls: &[u8]) -> Result<(), Rejection> {
        let n = balls.len() as u32;
        let base = Pool::Balls.pick_count() as u32;
        if let Some((lo, hi)) = self.sum_range {
            let lo = lo as u32 * n / base;
            let hi = hi as u32 * n / base;
            let sum = compute::sum(balls) as u32;
            if sum < lo || sum > hi {
                return Err(Rejection::SumRange);
            }
        }
        if let Some(target) = self.odd_count {
            let odd = compute::odd_count(balls) as i64;
            let matches = if n == base {
                odd == target as i64
            } else {
                let scaled = (target as u32 * n / base) as i64;
                (odd - scaled).abs() <= 1
            };
            if !matches {
                return Err(Rejection::ParityRatio);
            }
        }
        Ok(())
    }

    fn check_last_balls(&self, mask: NumberMask) -> Result<(), Rejection> {
        match self.last_balls {
            Some(last) if last.overlap(&mask) >= self.config.max_ball_overlap => {
                Err(Rejection::BallOverlap)
            }
            _ => Ok(()),
        }
    }

    fn check_last_stars(&self, mask: NumberMask) -> Result<(), Rejection> {
        match self.last_stars {
            Some(last) if last.overlap(&mask) >= self.config.max_star_overlap => {
                Err(Rejection::StarOverlap)
            }
            _ => Ok(()),
        }
    }
}

/// Suite arithmétique complète, ou trois éléments consécutifs en suite géométrique de raison > 1.
pub fn is_progression(balls: &[u8], tolerance: f64) -> bool {
    if balls.len() < 3 {
        return false;
    }
    let d = balls[1] as i16 - balls[0] as i16;
    if d > 0 && balls.windows(2).all(|w| w[1] as i16 - w[0] as i16 == d) {
        return true;
    }
    balls.windows(3).any(|w| {
        if w[0] == 0 || w[1] == 0 {
            return false;
        }
        let r1 = w[1] as f64 / w[0] as f64;
        let r2 = w[2] as f64 / w[1] as f64;
        r1 > 1.0 && (r1 - r2).abs() < tolerance
    })
}

fn check_star_skew(stars: &[u8]) -> Result<(), Rejection> {
    let low = compute::low_half_count(stars, Pool::Stars) as usize;
    if low == 0 || low == stars.len() {
        return Err(Rejection::StarSkew);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::make_test_draws;

    fn draw(period: u32, balls: [u8; 5], stars: [u8; 2]) -> Draw {
        Draw::new(period, "2024-01-01", balls, stars).unwrap()
    }

    fn split_check(f: &ConstraintFilter, balls: &[u8], stars: &[u8]) -> bool {
        let bm = NumberMask::from_numbers(balls);
        let sm = NumberMask::from_numbers(stars);
        f.check_balls(balls, bm).is_ok()
            && f.check_stars(stars, sm).is_ok()
            && f.check_pair(bm, sm).is_ok()
    }

    #[test]
    fn test_arithmetic_progression_rejected() {
        let f = ConstraintFilter::permissive(&FilterConfig::default());
        // parité 3/2 acceptable, la suite 1..5 est tout de même rejetée
        assert!(f.check(&[1, 2, 3, 4, 5], &[3, 9]).is_err());
        assert!(is_progression(&[1, 2, 3, 4, 5], 0.01));
        assert_eq!(f.check(&[3, 10, 17, 24, 31], &[3, 9]), Err(Rejection::Progression));
    }

    #[test]
    fn test_geometric_progression_rejected() {
        assert!(is_progression(&[2, 4, 8, 16, 32], 0.01));
        assert!(is_progression(&[1, 3, 9, 20, 30], 0.01));
        assert!(!is_progression(&[1, 5, 9, 20, 30], 0.01));
        let f = ConstraintFilter::permissive(&FilterConfig::default());
        assert!(f.check(&[2, 4, 8, 16, 32], &[3, 9]).is_err());
        assert_eq!(f.check(&[1, 3, 9, 20, 30], &[3, 9]), Err(Rejection::Progression));
    }

    #[test]
    fn test_parity_and_zone() {
        let f = ConstraintFilter::permissive(&FilterConfig::default());
        assert_eq!(f.check(&[1, 5, 9, 21, 33], &[3, 9]), Err(Rejection::ParityBalance));
        assert_eq!(f.check(&[1, 3, 6, 8, 11], &[3, 9]), Err(Rejection::ZoneConcentration));
        assert!(f.check(&[1, 3, 6, 8, 12], &[3, 9]).is_ok());
    }

    #[test]
    fn test_exclusions_and_targets() {
        let c = Constraints {
            excluded_balls: vec![7],
            excluded_stars: vec![12],
            sum_range: Some((60, 90)),
            odd_count: Some(3),
        };
        let f = ConstraintFilter::new(&c, &[], &FilterConfig::default());
        assert_eq!(f.check(&[2, 7, 13, 20, 30], &[3, 9]), Err(Rejection::ExcludedBall));
        assert_eq!(f.check(&[2, 9, 13, 20, 30], &[3, 12]), Err(Rejection::ExcludedStar));
        assert_eq!(f.check(&[9, 13, 20, 30, 35], &[3, 9]), Err(Rejection::SumRange));
        assert_eq!(f.check(&[2, 9, 14, 20, 30], &[3, 9]), Err(Rejection::ParityRatio));
        assert!(f.check(&[2, 9, 13, 20, 33], &[3, 9]).is_ok());
    }

    #[test]
    fn test_compound_targets_scaled() {
        let c = Constraints {
            sum_range: Some((60, 90)),
            odd_count: Some(3),
            ..Default::default()
        };
        let f = ConstraintFilter::new(&c, &[], &FilterConfig::default());
        // 8 boules : somme dans [96, 144], impairs 4 ± 1
        let balls = [1, 4, 9, 12, 15, 20, 27, 33];
        assert_eq!(compute::sum(&balls), 121);
        assert!(f.check(&balls, &[2, 8, 11]).is_ok());
        let too_even = [2, 4, 10, 13, 16, 20, 28, 33];
        assert_eq!(f.check(&too_even, &[2, 8, 11]), Err(Rejection::ParityRatio));
    }

    #[test]
    fn test_previous_draw_rejected() {
        let last = draw(1, [3, 11, 19, 26, 34], [2, 9]);
        let f = ConstraintFilter::new(&Constraints::default(), &[last.clone()], &FilterConfig::default());
        assert_eq!(f.check(&last.balls, &[4, 10]), Err(Rejection::BallOverlap));
        assert_eq!(f.check(&[3, 11, 19, 26, 35], &[4, 10]), Err(Rejection::BallOverlap));
        assert!(f.check(&[3, 11, 19, 28, 35], &[4, 10]).is_ok());
        assert_eq!(f.check(&[3, 11, 19, 28, 35], &[2, 9]), Err(Rejection::StarOverlap));
    }

    #[test]
    fn test_historical_duplicate() {
        let old = draw(1, [3, 11, 19, 26, 34], [2, 9]);
        let last = draw(2, [1, 6, 14, 22, 30], [4, 11]);
        let f = ConstraintFilter::new(
            &Constraints::default(),
            &[old.clone(), last],
            &FilterConfig::default(),
        );
        assert_eq!(f.check(&old.balls, &old.stars), Err(Rejection::HistoricalDuplicate));
    }

    #[test]
    fn test_star_skew() {
        let f = ConstraintFilter::permissive(&FilterConfig::default());
        assert_eq!(f.check(&[2, 9, 13, 20, 33], &[1, 6]), Err(Rejection::StarSkew));
        assert_eq!(f.check(&[2, 9, 13, 20, 33], &[7, 12]), Err(Rejection::StarSkew));
        assert!(f.check(&[2, 9, 13, 20, 33], &[6, 7]).is_ok());
    }

    #[test]
    fn test_check_idempotent() {
        let history = make_test_draws(40);
        let f = ConstraintFilter::new(&Constraints::default(), &history, &FilterConfig::default());
        let balls = [4, 9, 17, 25, 33];
        let stars = [2, 10];
        assert_eq!(f.check(&balls, &stars), f.check(&balls, &stars));
    }

    #[test]
    fn test_split_path_matches_ordered_check() {
        let history = make_test_draws(40);
        let c = Constraints {
            excluded_balls: vec![5, 18],
            excluded_stars: vec![1],
            sum_range: Some((70, 120)),
            odd_count: None,
        };
        let f = ConstraintFilter::new(&c, &history, &FilterConfig::default());
        let ball_sets: Vec<[u8; 5]> = vec![
            [1, 2, 3, 4, 5],
            [4, 9, 17, 25, 33],
            [2, 4, 8, 16, 32],
            [1, 3, 6, 8, 11],
            [3, 12, 19, 27, 34],
            [10, 11, 20, 21, 30],
            history[39].balls,
        ];
        let star_sets: Vec<[u8; 2]> = vec![[1, 7], [2, 10], [7, 12], [3, 4], history[39].stars];
        for b in &ball_sets {
            for s in &star_sets {
                assert_eq!(
                    f.check(b, s).is_ok(),
                    split_check(&f, b, s),
                    "désaccord pour {b:?} + {s:?}"
                );
            }
        }
    }

    #[test]
    fn test_constraints_validate() {
        assert!(Constraints::default().validate().is_ok());
        let bad = Constraints {
            excluded_balls: vec![36],
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = Constraints {
            sum_range: Some((100, 50)),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = Constraints {
            odd_count: Some(6),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
