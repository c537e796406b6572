use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use superlotto_db::models::{NumberMask, Pool};
use tracing::debug;

use crate::config::EnumeratorConfig;
use crate::error::{EngineError, Result};
use crate::filter::{ConstraintFilter, Rejection};
use crate::scoring::{core_numbers, PartScore, ScoringEngine};

/// Résultat d'une opération interruptible. L'annulation n'est pas une erreur.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(v) => Some(v),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Completed(v) => Outcome::Completed(f(v)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Nombre de boules et d'étoiles par grille.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub balls: usize,
    pub stars: usize,
}

impl Arity {
    pub const SINGLE: Arity = Arity { balls: 5, stars: 2 };
    pub const COMPOUND: Arity = Arity { balls: 8, stars: 3 };

    pub fn new(balls: usize, stars: usize) -> Self {
        Self { balls, stars }
    }

    pub fn is_compound(&self) -> bool {
        *self != Arity::SINGLE
    }

    /// Vérifie l'arité contre la taille des ensembles de base (après exclusions).
    pub fn validate(&self, ball_ground: usize, star_ground: usize) -> Result<()> {
        let balls_ok = self.balls >= Pool::Balls.pick_count() && self.balls <= ball_ground;
        let stars_ok = self.stars >= Pool::Stars.pick_count() && self.stars <= star_ground;
        if balls_ok && stars_ok {
            Ok(())
        } else {
            Err(EngineError::InvalidArity {
                balls: self.balls,
                stars: self.stars,
                max_balls: ball_ground,
                max_stars: star_ground,
            })
        }
    }

    pub fn combination_count(&self, ball_ground: usize, star_ground: usize) -> u128 {
        binomial(ball_ground, self.balls) * binomial(star_ground, self.stars)
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.balls, self.stars)
    }
}

pub fn binomial(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut r: u128 = 1;
    for i in 0..k {
        r = r * (n - i) as u128 / (i + 1) as u128;
    }
    r
}

/// Numéros du pool hors exclusions, triés.
pub fn ground(pool: Pool, excluded: &[u8]) -> Vec<u8> {
    (1..=pool.size() as u8)
        .filter(|n| !excluded.contains(n))
        .collect()
}

/// Source des sous-ensembles de boules de la boucle externe.
pub trait PrimarySource {
    /// Remplit `buf` avec le sous-ensemble suivant (trié) ; `false` en fin de parcours.
    fn next_subset(&mut self, buf: &mut Vec<u8>) -> bool;
    fn total_hint(&self) -> Option<u64>;
}

/// Parcours paresseux des k-combinaisons d'un ensemble trié, ordre lexicographique.
pub struct SubsetWalker {
    ground: Vec<u8>,
    indices: Vec<usize>,
    started: bool,
    done: bool,
}

impl SubsetWalker {
    pub fn new(ground: Vec<u8>, k: usize) -> Self {
        let done = k > ground.len();
        Self {
            indices: (0..k).collect(),
            ground,
            started: false,
            done,
        }
    }

    fn advance(&mut self) -> bool {
        let n = self.ground.len();
        let k = self.indices.len();
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.indices[i] < n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                return true;
            }
        }
        false
    }
}

impl PrimarySource for SubsetWalker {
    fn next_subset(&mut self, buf: &mut Vec<u8>) -> bool {
        if self.done {
            return false;
        }
        if self.started {
            if !self.advance() {
                self.done = true;
                return false;
            }
        } else {
            self.started = true;
        }
        buf.clear();
        buf.extend(self.indices.iter().map(|&i| self.ground[i]));
        true
    }

    fn total_hint(&self) -> Option<u64> {
        u64::try_from(binomial(self.ground.len(), self.indices.len())).ok()
    }
}

/// Sous-ensembles fournis d'avance (stratégies), triés et dédoublonnés.
pub struct SampledSource {
    subsets: std::vec::IntoIter<Vec<u8>>,
    total: u64,
}

impl SampledSource {
    pub fn new(subsets: Vec<Vec<u8>>) -> Self {
        let mut seen = HashSet::new();
        let unique: Vec<Vec<u8>> = subsets
            .into_iter()
            .map(|mut s| {
                s.sort_unstable();
                s.dedup();
                s
            })
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self {
            total: unique.len() as u64,
            subsets: unique.into_iter(),
        }
    }
}

impl PrimarySource for SampledSource {
    fn next_subset(&mut self, buf: &mut Vec<u8>) -> bool {
        match self.subsets.next() {
            Some(s) => {
                buf.clear();
                buf.extend_from_slice(&s);
                true
            }
            None => false,
        }
    }

    fn total_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub ball_subsets: u64,
    pub total: Option<u64>,
    pub scored: u64,
    pub retained: usize,
}

/// Compteurs d'un parcours. Les rejets sont comptés en grilles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub ball_subsets: u64,
    pub scored: u64,
    pub rejections: [u64; Rejection::ALL.len()],
}

impl RunReport {
    pub fn rejected(&self, rejection: Rejection) -> u64 {
        self.rejections[rejection.index()]
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejections.iter().sum()
    }

    /// Paires (motif, compte) non nulles, dans l'ordre des prédicats.
    pub fn rejection_counts(&self) -> Vec<(Rejection, u64)> {
        Rejection::ALL
            .iter()
            .map(|&r| (r, self.rejected(r)))
            .filter(|&(_, c)| c > 0)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub balls: Vec<u8>,
    pub stars: Vec<u8>,
    pub score: f64,
    /// Rang d'énumération, départage les égalités.
    pub seq: u64,
}

/// Entrée du tas : le sommet est le pire survivant.
struct HeapEntry(ScoredCandidate);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .total_cmp(&self.0.score)
            .then(self.0.seq.cmp(&other.0.seq))
    }
}

/// Tas borné des meilleurs survivants.
pub struct Survivors {
    heap: BinaryHeap<HeapEntry>,
    capacity: usize,
}

impl Survivors {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1).min(1 << 16)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Vrai si une note `score` entrerait dans le tas.
    fn admits(&self, score: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.heap.len() < self.capacity
            || self
                .heap
                .peek()
                .is_some_and(|worst| score > worst.0.score)
    }

    pub fn offer(&mut self, candidate: ScoredCandidate) {
        if !self.admits(candidate.score) {
            return;
        }
        if self.heap.len() >= self.capacity {
            self.heap.pop();
        }
        self.heap.push(HeapEntry(candidate));
    }

    /// Meilleur d'abord ; à égalité, ordre d'énumération.
    pub fn into_sorted(self) -> Vec<ScoredCandidate> {
        self.heap.into_sorted_vec().into_iter().map(|e| e.0).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationResult {
    pub candidates: Vec<ScoredCandidate>,
    pub report: RunReport,
}

struct StarEntry {
    stars: Vec<u8>,
    mask: NumberMask,
    part: PartScore,
}

/// Parcours filtré et noté du produit boules × étoiles.
pub struct Enumerator<'a> {
    filter: &'a ConstraintFilter,
    scorer: &'a ScoringEngine,
    config: &'a EnumeratorConfig,
    retain: usize,
}

impl<'a> Enumerator<'a> {
    pub fn new(
        filter: &'a ConstraintFilter,
        scorer: &'a ScoringEngine,
        config: &'a EnumeratorConfig,
    ) -> Self {
        Self {
            filter,
            scorer,
            config,
            retain: config.retain,
        }
    }

    /// Garantit au moins `count` survivants conservés.
    pub fn retaining(mut self, count: usize) -> Self {
        self.retain = self.retain.max(count);
        self
    }

    /// Boucle externe sur `source`, boucle interne sur les `arity.stars`-combinaisons de `star_ground`.
    pub fn run(
        &self,
        source: &mut dyn PrimarySource,
        arity: Arity,
        star_ground: &[u8],
        cancel: &dyn Fn() -> bool,
        progress: &mut dyn FnMut(Progress),
    ) -> Outcome<EnumerationResult> {
        let mut report = RunReport::default();
        let total = source.total_hint();

        // étoiles filtrées et notées une seule fois
        let mut star_rejections = [0u64; Rejection::ALL.len()];
        let mut star_entries = Vec::new();
        let mut walker = SubsetWalker::new(star_ground.to_vec(), arity.stars);
        let mut buf = Vec::with_capacity(arity.stars);
        while walker.next_subset(&mut buf) {
            let mask = NumberMask::from_numbers(&buf);
            match self.filter.check_stars(&buf, mask) {
                Ok(()) => {
                    let (_, core_stars) = core_numbers(&[], &buf);
                    star_entries.push(StarEntry {
                        part: self.scorer.score_stars(core_stars),
                        stars: buf.clone(),
                        mask,
                    });
                }
                Err(r) => star_rejections[r.index()] += 1,
            }
        }
        debug!(
            accepted = star_entries.len(),
            rejected = star_rejections.iter().sum::<u64>(),
            "sous-ensembles d'étoiles"
        );

        // un rejet au niveau boules compte toutes les grilles qu'il écarte
        let star_total = star_entries.len() as u64 + star_rejections.iter().sum::<u64>();

        let mut survivors = Survivors::new(self.retain);
        let mut balls = Vec::with_capacity(arity.balls);
        let mut seq = 0u64;
        let cancel_every = self.config.cancel_every.max(1);
        let progress_every = self.config.progress_every.max(1);

        while source.next_subset(&mut balls) {
            report.ball_subsets += 1;
            if report.ball_subsets % cancel_every == 0 && cancel() {
                return Outcome::Cancelled;
            }
            if report.ball_subsets % progress_every == 0 {
                progress(Progress {
                    ball_subsets: report.ball_subsets,
                    total,
                    scored: report.scored,
                    retained: survivors.len(),
                });
            }
            if balls.len() != arity.balls {
                continue;
            }

            let ball_mask = NumberMask::from_numbers(&balls);
            if let Err(r) = self.filter.check_balls(&balls, ball_mask) {
                report.rejections[r.index()] += star_total;
                continue;
            }
            for (acc, n) in report.rejections.iter_mut().zip(star_rejections.iter()) {
                *acc += n;
            }

            let (core_balls, _) = core_numbers(&balls, &[]);
            let ball_part = self.scorer.score_balls(core_balls);

            for entry in &star_entries {
                if let Err(r) = self.filter.check_pair(ball_mask, entry.mask) {
                    report.rejections[r.index()] += 1;
                    continue;
                }
                let score = self.scorer.combine(&ball_part, &entry.part);
                report.scored += 1;
                let current = seq;
                seq += 1;
                if survivors.admits(score) {
                    survivors.offer(ScoredCandidate {
                        balls: balls.clone(),
                        stars: entry.stars.clone(),
                        score,
                        seq: current,
                    });
                }
            }
        }

        progress(Progress {
            ball_subsets: report.ball_subsets,
            total,
            scored: report.scored,
            retained: survivors.len(),
        });

        Outcome::Completed(EnumerationResult {
            candidates: survivors.into_sorted(),
            report,
        })
    }
}
