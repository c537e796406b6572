use superlotto_db::models::{Draw, History};
use superlotto_engine::backtest::{Backtester, HitClass, PeriodOutcome};
use superlotto_engine::filter::{ConstraintFilter, Constraints, Rejection};
use superlotto_engine::models::make_test_draws;
use superlotto_engine::{Arity, EngineConfig, PredictRequest, Predictor, RankedPick, SearchMode};

const LAST_BALLS: [u8; 5] = [3, 10, 16, 22, 29];
const LAST_STARS: [u8; 2] = [2, 9];

/// 39 tirages synthétiques suivis d'un dernier tirage connu.
fn history() -> History {
    let mut draws = make_test_draws(39);
    draws.push(Draw::new(1039, "2024-02-12", LAST_BALLS, LAST_STARS).unwrap());
    History::from_draws(draws).unwrap()
}

fn all_but(pool_max: u8, kept: &[u8]) -> Vec<u8> {
    (1..=pool_max).filter(|n| !kept.contains(n)).collect()
}

fn rank(history: &History, config: &EngineConfig, request: &PredictRequest) -> (Vec<RankedPick>, u64, u64) {
    let predictor = Predictor::new(history, config);
    let never = || false;
    let mut ranking = predictor
        .predict(request, &never, &mut |_| {})
        .unwrap()
        .completed()
        .unwrap();
    let scored = ranking.report().scored;
    let overlap = ranking.report().rejected(Rejection::BallOverlap);
    let picks = ranking.by_ref().collect();
    (picks, scored, overlap)
}

#[test]
fn test_repeat_of_last_draw_is_rejected() {
    let history = history();
    let config = EngineConfig::default();
    let past = history.before(1040);

    let filter = ConstraintFilter::new(&Constraints::default(), past, &config.filter);
    assert_eq!(filter.check(&LAST_BALLS, &[5, 11]), Err(Rejection::BallOverlap));

    // seule la grille du dernier tirage est possible côté boules
    let mut request = PredictRequest::new(1040);
    request.constraints.excluded_balls = all_but(35, &LAST_BALLS);
    request.constraints.excluded_stars = all_but(12, &[2, 5, 9, 11]);
    let (picks, scored, overlap) = rank(&history, &config, &request);
    assert!(picks.is_empty());
    assert_eq!(scored, 0);
    assert_eq!(overlap, 6);
}

#[test]
fn test_no_pick_repeats_last_draw() {
    let history = history();
    let config = EngineConfig::default();
    let mut kept = LAST_BALLS.to_vec();
    kept.extend([1, 8, 27]);

    let mut request = PredictRequest::new(1040);
    request.constraints.excluded_balls = all_but(35, &kept);
    request.constraints.excluded_stars = all_but(12, &[1, 2, 7, 8, 9]);
    let (picks, _, overlap) = rank(&history, &config, &request);
    assert!(!picks.is_empty());
    assert!(overlap > 0);
    for p in &picks {
        assert_ne!(p.balls.as_slice(), LAST_BALLS.as_slice());
        let shared = p.balls.iter().filter(|b| LAST_BALLS.contains(b)).count();
        assert!(shared < 4);
    }
}

#[test]
fn test_fewer_survivors_than_requested() {
    let history = history();
    let config = EngineConfig::default();

    // un seul jeu de boules ; 5 paires d'étoiles mixtes hors {2, 9}
    let mut request = PredictRequest::new(1040);
    request.count = 20;
    request.constraints.excluded_balls = all_but(35, &[1, 8, 14, 20, 27]);
    request.constraints.excluded_stars = all_but(12, &[1, 2, 7, 8, 9]);
    let (picks, scored, _) = rank(&history, &config, &request);

    assert_eq!(scored, 5);
    assert_eq!(picks.len(), 5);
    for (i, p) in picks.iter().enumerate() {
        assert_eq!(p.rank, i + 1);
        assert_eq!(p.balls, vec![1, 8, 14, 20, 27]);
        assert_ne!(p.stars, vec![2, 9]);
    }
    assert!(picks.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_compound_picks_cover_several_tickets() {
    let history = history();
    let config = EngineConfig::default();
    let mut request = PredictRequest::new(1040);
    request.count = 3;
    request.arity = Arity::COMPOUND;
    request.constraints.excluded_balls = all_but(35, &[1, 4, 8, 13, 14, 20, 25, 27, 31]);
    request.constraints.excluded_stars = all_but(12, &[1, 5, 8, 11]);
    let (picks, _, _) = rank(&history, &config, &request);

    assert!(!picks.is_empty());
    for p in &picks {
        assert_eq!(p.balls.len(), 8);
        assert_eq!(p.stars.len(), 3);
        assert_eq!(p.combination_count, 56 * 3);
    }
}

#[test]
fn test_backtest_matches_standalone_prediction() {
    let history = History::from_draws(make_test_draws(45)).unwrap();
    let mut config = EngineConfig::default();
    config.backtest.min_history = 42;
    config.backtest.count = 5;
    config.enumerator.sampled_subsets = 150;

    let backtester = Backtester::new(&history, &config).with_search(SearchMode::Sampled);
    let mut rows = Vec::new();
    let never = || false;
    let summary = backtester
        .run(1040, 1044, &never, &mut |o| rows.push(o.clone()))
        .unwrap()
        .completed()
        .unwrap();

    assert_eq!(rows.len(), 5);
    assert_eq!(summary.skipped, vec![1040, 1041]);
    assert_eq!(summary.evaluated, 3);
    assert_eq!(summary.class_distribution.values().sum::<usize>(), 3);
    assert!((0.0..=1.0).contains(&summary.coverage));

    let predictor = Predictor::new(&history, &config);
    for row in rows {
        let PeriodOutcome::Evaluated(result) = row else {
            continue;
        };
        let mut request = PredictRequest::new(result.period);
        request.count = 5;
        request.search = SearchMode::Sampled;
        let top = predictor
            .predict(&request, &never, &mut |_| {})
            .unwrap()
            .completed()
            .unwrap()
            .next()
            .unwrap();
        let actual = history.find(result.period).unwrap();
        assert_eq!(result.top1, HitClass::of(&top.balls, &top.stars, actual));
    }
}
