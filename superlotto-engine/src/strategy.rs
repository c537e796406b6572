use std::collections::{BTreeMap, HashSet};

use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use superlotto_db::models::{Draw, Pool};

use crate::config::StrategyConfig;
use crate::features::compute;
use crate::stats::PoolHeat;

/// Historique minimal des stratégies « paires » et « similarité ».
const PATTERN_MIN_HISTORY: usize = 50;
const MOMENTUM_MIN_HISTORY: usize = 30;
const SMALL_NUMBER_MAX: u8 = 15;
const LOW_MID_MAX: u8 = 25;
const LOW_SUM_RANGE: (u32, u32) = (50, 80);
const CORE_POOL_SIZE: usize = 12;

/// Générateurs de sous-ensembles de boules du mode échantillonné.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    PureRandom,
    SmallNumbers,
    LowSum,
    CoreAnchor,
    HotColdMix,
    ColdRebound,
    Frequency,
    Momentum,
    MissingRegression,
    Correlation,
    Modulus,
    Similarity,
}

impl Strategy {
    pub const ALL: [Strategy; 12] = [
        Strategy::Frequency,
        Strategy::Momentum,
        Strategy::MissingRegression,
        Strategy::Correlation,
        Strategy::Modulus,
        Strategy::Similarity,
        Strategy::HotColdMix,
        Strategy::ColdRebound,
        Strategy::CoreAnchor,
        Strategy::PureRandom,
        Strategy::SmallNumbers,
        Strategy::LowSum,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::PureRandom => "aléatoire",
            Strategy::SmallNumbers => "petits numéros",
            Strategy::LowSum => "somme basse",
            Strategy::CoreAnchor => "ancrage",
            Strategy::HotColdMix => "chaud/froid",
            Strategy::ColdRebound => "rebond froid",
            Strategy::Frequency => "fréquence",
            Strategy::Momentum => "momentum",
            Strategy::MissingRegression => "retard",
            Strategy::Correlation => "paires",
            Strategy::Modulus => "modulo 3",
            Strategy::Similarity => "similarité",
        }
    }

    /// `k` boules distinctes et triées prises dans l'ensemble de base du contexte.
    pub fn generate(&self, ctx: &StrategyContext, rng: &mut StdRng, offset: usize, k: usize) -> Vec<u8> {
        let k = k.min(ctx.ground.len());
        let mut picked = match self {
            Strategy::PureRandom => random_pick(&ctx.ground, k, rng),
            Strategy::SmallNumbers => ctx.small_numbers(k, rng),
            Strategy::LowSum => ctx.low_sum(k, rng),
            Strategy::CoreAnchor => ctx.core_anchor(k, rng),
            Strategy::HotColdMix => ctx.hot_cold_mix(k, rng),
            Strategy::ColdRebound => ctx.cold_rebound(k, offset),
            Strategy::Frequency => ctx.frequency(k, rng),
            Strategy::Momentum => ctx.momentum(k, rng),
            Strategy::MissingRegression => ctx.missing_regression(k, rng),
            Strategy::Correlation => ctx.correlation(k, offset, rng),
            Strategy::Modulus => ctx.modulus(k),
            Strategy::Similarity => ctx.similarity(k, rng),
        };
        fill_random(&mut picked, &ctx.ground, k, rng);
        picked.truncate(k);
        picked.sort_unstable();
        picked
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Données partagées par les stratégies, calculées une fois par période visée.
#[derive(Debug, Clone)]
pub struct StrategyContext {
    ground: Vec<u8>,
    heat: PoolHeat,
    history_len: usize,
    /// Index = numéro - 1.
    momentum: Vec<f64>,
    common_pairs: Vec<(u8, u8)>,
    similar_next: Option<Vec<u8>>,
    core_pool: Vec<u8>,
    weighted_top_k: usize,
}

impl StrategyContext {
    /// `history` en ordre chronologique ; `model` : probabilités par boule (index = numéro - 1).
    pub fn new(history: &[Draw], ground: &[u8], model: Option<&[f64]>, config: &StrategyConfig) -> Self {
        let heat = PoolHeat::compute(history, Pool::Balls, config.hot_window, config.super_cold_gap);

        let core_pool = {
            let mut ranked: Vec<(u8, f64)> = ground
                .iter()
                .map(|&n| {
                    let p = match model {
                        Some(probs) => probs.get((n - 1) as usize).copied().unwrap_or(0.0),
                        None => heat.frequency_of(n) as f64,
                    };
                    (n, p)
                })
                .collect();
            sort_desc(&mut ranked);
            ranked.into_iter().take(CORE_POOL_SIZE).map(|(n, _)| n).collect()
        };

        Self {
            ground: ground.to_vec(),
            momentum: momentum_scores(history),
            common_pairs: if history.len() >= PATTERN_MIN_HISTORY {
                common_pairs(history, config.pair_window, config.top_pairs)
            } else {
                Vec::new()
            },
            similar_next: similar_window_next(history),
            history_len: history.len(),
            heat,
            core_pool,
            weighted_top_k: config.weighted_top_k,
        }
    }

    pub fn ground(&self) -> &[u8] {
        &self.ground
    }

    pub fn common_pairs(&self) -> &[(u8, u8)] {
        &self.common_pairs
    }

    fn small_numbers(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        let small: Vec<u8> = self.ground.iter().copied().filter(|&n| n <= SMALL_NUMBER_MAX).collect();
        if small.len() < 3 {
            return random_pick(&self.ground, k, rng);
        }
        let count = [2usize, 3, 4].choose(rng).copied().unwrap_or(2).min(small.len()).min(k);
        random_pick(&small, count, rng)
    }

    fn low_sum(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        let low_mid: Vec<u8> = self.ground.iter().copied().filter(|&n| n <= LOW_MID_MAX).collect();
        if low_mid.len() < k {
            return random_pick(&self.ground, k, rng);
        }
        let picks = Pool::Balls.pick_count() as u32;
        let lo = LOW_SUM_RANGE.0 * k as u32 / picks;
        let hi = LOW_SUM_RANGE.1 * k as u32 / picks;
        let in_range = |s: &[u8]| {
            let sum = compute::sum(s) as u32;
            lo <= sum && sum <= hi
        };

        let first = random_pick(&low_mid, k, rng);
        if in_range(&first) {
            return first;
        }
        for _ in 0..100 {
            let attempt = random_pick(&self.ground, k, rng);
            if in_range(&attempt) {
                return attempt;
            }
        }
        random_pick(&self.ground, k, rng)
    }

    fn core_anchor(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        if self.core_pool.is_empty() {
            return self.frequency(k, rng);
        }
        let count = rng.random_range(1..=3usize).min(self.core_pool.len()).min(k);
        random_pick(&self.core_pool, count, rng)
    }

    fn hot_cold_mix(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        if rng.random::<f64>() < 0.3 {
            return random_pick(&self.ground, k, rng);
        }
        let in_ground = |v: &[u8]| -> Vec<u8> {
            v.iter().copied().filter(|n| self.ground.contains(n)).collect()
        };
        let hot = in_ground(&self.heat.hot);
        let cold = in_ground(&self.heat.cold);
        let warm: Vec<u8> = self
            .ground
            .iter()
            .copied()
            .filter(|n| !hot.contains(n) && !cold.contains(n))
            .collect();
        let warm = if warm.is_empty() { self.ground.clone() } else { warm };

        let mut picked = random_pick(&hot, 2.min(hot.len()), rng);
        for n in random_pick(&warm, 2.min(warm.len()), rng) {
            if !picked.contains(&n) {
                picked.push(n);
            }
        }
        for n in random_pick(&cold, 1.min(cold.len()), rng) {
            if !picked.contains(&n) {
                picked.push(n);
            }
        }
        picked
    }

    fn cold_rebound(&self, k: usize, offset: usize) -> Vec<u8> {
        let mut by_missing = self.ground.clone();
        by_missing.sort_by(|a, b| self.heat.missing_of(*b).cmp(&self.heat.missing_of(*a)).then(a.cmp(b)));
        if !by_missing.is_empty() {
            let len = by_missing.len();
            by_missing.rotate_left(offset % len);
        }
        by_missing.truncate(k);
        by_missing
    }

    fn frequency(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        let mut scored: Vec<(u8, f64)> = self
            .ground
            .iter()
            .map(|&n| (n, self.heat.frequency_of(n) as f64 + gaussian(rng) * 0.05))
            .collect();
        sort_desc(&mut scored);
        weighted_sample(&scored, k, self.weighted_top_k, rng)
    }

    fn momentum(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        if self.history_len < MOMENTUM_MIN_HISTORY {
            return self.frequency(k, rng);
        }
        let mut scored: Vec<(u8, f64)> = self
            .ground
            .iter()
            .map(|&n| (n, self.momentum.get((n - 1) as usize).copied().unwrap_or(0.0)))
            .collect();
        sort_desc(&mut scored);
        weighted_sample(&scored, k, self.weighted_top_k, rng)
    }

    fn missing_regression(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        let mut scored: Vec<(u8, f64)> = self
            .ground
            .iter()
            .map(|&n| {
                let miss = self.heat.missing_of(n) as f64;
                let factor = if miss > 15.0 {
                    2.5
                } else if miss > 8.0 {
                    1.5
                } else {
                    0.4
                };
                (n, miss * factor)
            })
            .collect();
        sort_desc(&mut scored);
        weighted_sample(&scored, k, self.weighted_top_k, rng)
    }

    fn correlation(&self, k: usize, offset: usize, rng: &mut StdRng) -> Vec<u8> {
        if self.common_pairs.is_empty() {
            return self.frequency(k, rng);
        }
        let len = self.common_pairs.len();
        let start = offset % len;
        let pair = self.common_pairs[start..]
            .iter()
            .chain(self.common_pairs[..start].iter())
            .find(|(a, b)| self.ground.contains(a) && self.ground.contains(b));
        match pair {
            Some(&(a, b)) if k >= 2 => vec![a, b],
            _ => Vec::new(),
        }
    }

    fn modulus(&self, k: usize) -> Vec<u8> {
        let mut picked = Vec::with_capacity(k);
        for (residue, take) in [(0u8, 2usize), (1, 2), (2, 1)] {
            let mut class: Vec<(u8, f64)> = self
                .ground
                .iter()
                .filter(|&&n| n % 3 == residue)
                .map(|&n| (n, self.heat.frequency_of(n) as f64))
                .collect();
            sort_desc(&mut class);
            picked.extend(class.into_iter().take(take).map(|(n, _)| n));
        }
        picked
    }

    fn similarity(&self, k: usize, rng: &mut StdRng) -> Vec<u8> {
        match &self.similar_next {
            Some(next) => next.iter().copied().filter(|n| self.ground.contains(n)).collect(),
            None => self.frequency(k, rng),
        }
    }
}

/// Génère jusqu'à `count` sous-ensembles distincts de `k` boules en alternant les stratégies.
pub fn sample_subsets(ctx: &StrategyContext, k: usize, count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::new();
    let mut subsets = Vec::with_capacity(count);
    let max_attempts = count.saturating_mul(10);
    let n_strategies = Strategy::ALL.len();

    let mut attempt = 0;
    while subsets.len() < count && attempt < max_attempts {
        let strategy = Strategy::ALL[attempt % n_strategies];
        let offset = attempt / n_strategies;
        attempt += 1;

        let picked = strategy.generate(ctx, &mut rng, offset, k);
        if picked.len() == k && seen.insert(picked.clone()) {
            subsets.push(picked);
        }
    }
    subsets
}

/// Tirage pondéré sans remise parmi les `top_k` premiers (poids = score - min + 0.1).
/// `items` doit être trié par score décroissant.
fn weighted_sample(items: &[(u8, f64)], n: usize, top_k: usize, rng: &mut StdRng) -> Vec<u8> {
    let pool = &items[..items.len().min(top_k)];
    let min = pool.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let mut available: Vec<(u8, f64)> = pool.iter().map(|&(num, s)| (num, s - min + 0.1)).collect();
    let mut selected = Vec::with_capacity(n);

    for _ in 0..n.min(available.len()) {
        let weights: Vec<f64> = available.iter().map(|(_, w)| *w).collect();
        let Ok(dist) = WeightedIndex::new(&weights) else {
            return items.iter().take(n).map(|(num, _)| *num).collect();
        };
        let (num, _) = available.remove(dist.sample(rng));
        selected.push(num);
    }
    selected
}

fn random_pick(from: &[u8], k: usize, rng: &mut StdRng) -> Vec<u8> {
    from.choose_multiple(rng, k.min(from.len())).copied().collect()
}

/// Complète `picked` avec des numéros tirés au hasard dans `ground`.
fn fill_random(picked: &mut Vec<u8>, ground: &[u8], k: usize, rng: &mut StdRng) {
    picked.retain(|n| ground.contains(n));
    picked.sort_unstable();
    picked.dedup();
    if picked.len() >= k {
        return;
    }
    let rest: Vec<u8> = ground.iter().copied().filter(|n| !picked.contains(n)).collect();
    let missing = k - picked.len();
    picked.extend(random_pick(&rest, missing, rng));
}

/// Score décroissant, numéro croissant à égalité.
fn sort_desc(items: &mut [(u8, f64)]) {
    items.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
}

/// Box-Muller.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-12);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Rapport fréquence 10 derniers / 30 derniers tirages, par boule.
fn momentum_scores(history: &[Draw]) -> Vec<f64> {
    let count_in = |n: usize| {
        let mut counts = vec![0u32; Pool::Balls.size()];
        for draw in &history[history.len().saturating_sub(n)..] {
            for &b in &draw.balls {
                counts[(b - 1) as usize] += 1;
            }
        }
        counts
    };
    let f10 = count_in(10);
    let f30 = count_in(30);
    f10.iter()
        .zip(f30.iter())
        .map(|(&a, &b)| (a as f64 / 10.0 + 0.1) / (b as f64 / 30.0 + 0.1))
        .collect()
}

/// Paires de boules les plus fréquentes sur les `window` derniers tirages.
fn common_pairs(history: &[Draw], window: usize, top: usize) -> Vec<(u8, u8)> {
    let mut counts: BTreeMap<(u8, u8), u32> = BTreeMap::new();
    for draw in &history[history.len().saturating_sub(window)..] {
        for (i, &a) in draw.balls.iter().enumerate() {
            for &b in &draw.balls[i + 1..] {
                *counts.entry((a, b)).or_insert(0) += 1;
            }
        }
    }
    let mut ranked: Vec<((u8, u8), u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(top).map(|(p, _)| p).collect()
}

/// Boules du tirage qui a suivi la fenêtre de trois sommes la plus proche
/// des trois dernières, parmi les 300 derniers tirages.
fn similar_window_next(history: &[Draw]) -> Option<Vec<u8>> {
    if history.len() < PATTERN_MIN_HISTORY {
        return None;
    }
    let sums: Vec<i32> = history.iter().map(|d| compute::sum(&d.balls) as i32).collect();
    let recent = &sums[sums.len() - 3..];
    let search_start = sums.len().saturating_sub(300);
    let search = &sums[search_start..];

    let mut best: Option<(i32, usize)> = None;
    for i in 0..search.len().saturating_sub(5) {
        let diff: i32 = search[i..i + 3]
            .iter()
            .zip(recent.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        match best {
            Some((d, _)) if d <= diff => {}
            _ => best = Some((diff, search_start + i + 3)),
        }
    }
    best.map(|(_, idx)| history[idx].balls.to_vec())
}
