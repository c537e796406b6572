use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use superlotto_db::models::{Draw, History, NumberMask};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::enumerate::{Arity, Outcome};
use crate::error::Result;
use crate::models::ProbabilityModel;
use crate::predict::{PredictRequest, Predictor, SearchMode};
use crate::stats::FeatureStatistics;

/// Classe de gain : boules et étoiles trouvées.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HitClass {
    pub balls: u8,
    pub stars: u8,
}

impl HitClass {
    pub const fn new(balls: u8, stars: u8) -> Self {
        Self { balls, stars }
    }

    pub fn of(balls: &[u8], stars: &[u8], draw: &Draw) -> Self {
        Self {
            balls: NumberMask::from_numbers(balls).overlap(&draw.ball_mask()) as u8,
            stars: NumberMask::from_numbers(stars).overlap(&draw.star_mask()) as u8,
        }
    }

    /// Atteint `target` : plus de boules, ou autant de boules et au moins autant d'étoiles.
    pub fn reaches(&self, target: HitClass) -> bool {
        self.balls > target.balls || (self.balls == target.balls && self.stars >= target.stars)
    }
}

impl fmt::Display for HitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}+B{}", self.balls, self.stars)
    }
}

/// Résultat d'une période, avec l'état cumulé après elle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodResult {
    pub period: u32,
    pub history: usize,
    pub picks: usize,
    pub top1: HitClass,
    pub best: HitClass,
    pub avg_top1_balls: f64,
    pub avg_top1_stars: f64,
    pub avg_best_balls: f64,
    pub avg_best_stars: f64,
    pub coverage: f64,
    pub soft_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PeriodOutcome {
    Evaluated(PeriodResult),
    Skipped { period: u32, available: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSummary {
    pub evaluated: usize,
    pub skipped: Vec<u32>,
    pub target: HitClass,
    pub soft_target: HitClass,
    /// Meilleure classe atteinte par période → nombre de périodes.
    pub class_distribution: BTreeMap<HitClass, usize>,
    pub avg_top1_balls: f64,
    pub avg_top1_stars: f64,
    pub avg_best_balls: f64,
    pub avg_best_stars: f64,
    pub coverage: f64,
    pub soft_coverage: f64,
}

#[derive(Default)]
struct Accumulator {
    evaluated: usize,
    top1_balls: u64,
    top1_stars: u64,
    best_balls: u64,
    best_stars: u64,
    hits: usize,
    soft_hits: usize,
    classes: BTreeMap<HitClass, usize>,
}

impl Accumulator {
    fn record(&mut self, top1: HitClass, best: HitClass, target: HitClass, soft_target: HitClass) {
        self.evaluated += 1;
        self.top1_balls += top1.balls as u64;
        self.top1_stars += top1.stars as u64;
        self.best_balls += best.balls as u64;
        self.best_stars += best.stars as u64;
        if best.reaches(target) {
            self.hits += 1;
        }
        if best.reaches(soft_target) {
            self.soft_hits += 1;
        }
        *self.classes.entry(best).or_insert(0) += 1;
    }

    fn ratio(&self, value: u64) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            value as f64 / self.evaluated as f64
        }
    }
}

/// Rejoue le pipeline sur une plage de périodes historiques.
pub struct Backtester<'a> {
    history: &'a History,
    config: &'a EngineConfig,
    model: Option<&'a dyn ProbabilityModel>,
    arity: Arity,
    search: SearchMode,
}

impl<'a> Backtester<'a> {
    pub fn new(history: &'a History, config: &'a EngineConfig) -> Self {
        Self {
            history,
            config,
            model: None,
            arity: Arity::SINGLE,
            search: SearchMode::Exhaustive,
        }
    }

    pub fn with_model(mut self, model: &'a dyn ProbabilityModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_search(mut self, search: SearchMode) -> Self {
        self.search = search;
        self
    }

    /// Évalue chaque période connue de `start` à `end` inclus, par ordre croissant.
    /// `on_period` reçoit chaque résultat dès qu'il est disponible.
    pub fn run(
        &self,
        start: u32,
        end: u32,
        cancel: &dyn Fn() -> bool,
        on_period: &mut dyn FnMut(&PeriodOutcome),
    ) -> Result<Outcome<BacktestSummary>> {
        let bt = &self.config.backtest;
        let draws = self.history.draws();
        let first = draws.partition_point(|d| d.period < start);
        let last = draws.partition_point(|d| d.period <= end);

        let mut predictor = Predictor::new(self.history, self.config);
        if let Some(model) = self.model {
            predictor = predictor.with_model(model);
        }

        info!(start, end, periods = last.saturating_sub(first), "backtest");

        let mut stats = FeatureStatistics::new();
        let mut observed = 0usize;
        let mut acc = Accumulator::default();
        let mut skipped = Vec::new();

        for idx in first..last {
            if cancel() {
                info!(evaluated = acc.evaluated, "backtest annulé");
                return Ok(Outcome::Cancelled);
            }
            let actual = &draws[idx];
            let past = &draws[..idx];

            if past.len() < bt.min_history {
                debug!(period = actual.period, available = past.len(), "période ignorée");
                skipped.push(actual.period);
                on_period(&PeriodOutcome::Skipped {
                    period: actual.period,
                    available: past.len(),
                });
                continue;
            }

            // statistiques prolongées d'une période à l'autre
            while observed < idx {
                stats.observe(&draws[observed]);
                observed += 1;
            }

            let mut request = PredictRequest::new(actual.period);
            request.count = bt.count;
            request.arity = self.arity;
            request.search = self.search;
            request.history_filters = bt.apply_filters;

            let ranking = match predictor.predict_with_stats(&request, past, &stats, cancel, &mut |_| {})? {
                Outcome::Completed(r) => r,
                Outcome::Cancelled => {
                    info!(evaluated = acc.evaluated, "backtest annulé");
                    return Ok(Outcome::Cancelled);
                }
            };
            let picks = ranking.into_candidates();

            let classes: Vec<HitClass> = picks
                .iter()
                .map(|c| HitClass::of(&c.balls, &c.stars, actual))
                .collect();
            let top1 = classes.first().copied().unwrap_or_default();
            let best = classes.iter().copied().max().unwrap_or_default();
            acc.record(top1, best, bt.target, bt.soft_target);

            let result = PeriodResult {
                period: actual.period,
                history: past.len(),
                picks: picks.len(),
                top1,
                best,
                avg_top1_balls: acc.ratio(acc.top1_balls),
                avg_top1_stars: acc.ratio(acc.top1_stars),
                avg_best_balls: acc.ratio(acc.best_balls),
                avg_best_stars: acc.ratio(acc.best_stars),
                coverage: acc.ratio(acc.hits as u64),
                soft_coverage: acc.ratio(acc.soft_hits as u64),
            };
            debug!(
                period = result.period,
                top1 = %result.top1,
                best = %result.best,
                coverage = result.coverage,
                "période évaluée"
            );
            on_period(&PeriodOutcome::Evaluated(result));
        }

        let summary = BacktestSummary {
            evaluated: acc.evaluated,
            skipped,
            target: bt.target,
            soft_target: bt.soft_target,
            avg_top1_balls: acc.ratio(acc.top1_balls),
            avg_top1_stars: acc.ratio(acc.top1_stars),
            avg_best_balls: acc.ratio(acc.best_balls),
            avg_best_stars: acc.ratio(acc.best_stars),
            coverage: acc.ratio(acc.hits as u64),
            soft_coverage: acc.ratio(acc.soft_hits as u64),
            class_distribution: acc.classes,
        };
        info!(
            evaluated = summary.evaluated,
            skipped = summary.skipped.len(),
            coverage = summary.coverage,
            "backtest terminé"
        );
        Ok(Outcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::make_test_draws;

    #[test]
    fn test_hit_class_reaches() {
        let target = HitClass::new(4, 2);
        assert!(HitClass::new(5, 0).reaches(target));
        assert!(HitClass::new(4, 2).reaches(target));
        assert!(!HitClass::new(4, 1).reaches(target));
        assert!(!HitClass::new(3, 2).reaches(target));
        assert_eq!(HitClass::new(3, 1).to_string(), "R3+B1");
    }

    #[test]
    fn test_hit_class_of_draw() {
        let draw = Draw::new(1, "2024-01-01", [3, 9, 14, 21, 30], [4, 11]).unwrap();
        let class = HitClass::of(&[3, 9, 15, 22, 30], &[4, 5], &draw);
        assert_eq!(class, HitClass::new(3, 1));
        let compound = HitClass::of(&[1, 3, 9, 14, 15, 21, 30, 33], &[4, 5, 11], &draw);
        assert_eq!(compound, HitClass::new(5, 2));
    }

    #[test]
    fn test_hit_class_order_matches_reaches() {
        let classes = [
            HitClass::new(0, 0),
            HitClass::new(2, 2),
            HitClass::new(3, 0),
            HitClass::new(3, 1),
            HitClass::new(4, 2),
            HitClass::new(5, 0),
        ];
        for a in classes {
            for b in classes {
                assert_eq!(a.reaches(b), a >= b, "{a} / {b}");
            }
        }
    }

    fn narrow_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.backtest.min_history = 15;
        config.backtest.count = 5;
        config.enumerator.sampled_subsets = 300;
        config
    }

    #[test]
    fn test_backtest_skips_and_streams() {
        let history = History::from_draws(make_test_draws(20)).unwrap();
        let config = narrow_config();
        let backtester = Backtester::new(&history, &config).with_search(SearchMode::Sampled);
        let mut seen = Vec::new();
        let summary = backtester
            .run(1010, 1019, &|| false, &mut |o: &PeriodOutcome| seen.push(o.clone()))
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(seen.len(), 10);
        // périodes 1010..=1014 : moins de 15 tirages antérieurs
        assert_eq!(summary.skipped, vec![1010, 1011, 1012, 1013, 1014]);
        assert_eq!(summary.evaluated, 5);
        let total: usize = summary.class_distribution.values().sum();
        assert_eq!(total, 5);
        assert!(summary.coverage <= summary.soft_coverage);

        let last = seen.iter().rev().find_map(|o| match o {
            PeriodOutcome::Evaluated(r) => Some(r.clone()),
            PeriodOutcome::Skipped { .. } => None,
        });
        let last = last.unwrap();
        assert_eq!(last.period, 1019);
        assert_eq!(last.avg_best_balls, summary.avg_best_balls);
        assert!(last.best.reaches(last.top1));
    }

    #[test]
    fn test_backtest_cancelled() {
        let history = History::from_draws(make_test_draws(20)).unwrap();
        let config = narrow_config();
        let backtester = Backtester::new(&history, &config).with_search(SearchMode::Sampled);
        let outcome = backtester.run(1015, 1019, &|| true, &mut |_| {}).unwrap();
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn test_incremental_statistics_match_rebuild() {
        let draws = make_test_draws(30);
        let mut stats = FeatureStatistics::new();
        for d in &draws[..20] {
            stats.observe(d);
        }
        assert_eq!(stats, FeatureStatistics::build(&draws[..20]));
    }
}
