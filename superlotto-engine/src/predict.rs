use superlotto_db::models::{Draw, History, Pool};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::diversity::select_diverse;
use crate::enumerate::{
    ground, Arity, Enumerator, Outcome, PrimarySource, Progress, RunReport, SampledSource,
    ScoredCandidate, SubsetWalker,
};
use crate::error::{ModelError, Result};
use crate::filter::{ConstraintFilter, Constraints};
use crate::models::{validate_distribution, ProbabilityModel};
use crate::scoring::{Explanation, ModelProbabilities, ReferenceNumbers, ScoringEngine};
use crate::stats::FeatureStatistics;
use crate::strategy::{sample_subsets, StrategyContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Parcours complet de toutes les combinaisons.
    #[default]
    Exhaustive,
    /// Boucle externe alimentée par les stratégies.
    Sampled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub target_period: u32,
    pub constraints: Constraints,
    pub count: usize,
    pub arity: Arity,
    pub search: SearchMode,
    /// Graine des stratégies ; la période visée par défaut.
    pub seed: Option<u64>,
    pub reference: Option<ReferenceNumbers>,
    /// Faux : ignore les prédicats liés à l'historique (recouvrement, doublons).
    pub history_filters: bool,
}

impl PredictRequest {
    pub fn new(target_period: u32) -> Self {
        Self {
            target_period,
            constraints: Constraints::default(),
            count: 20,
            arity: Arity::SINGLE,
            search: SearchMode::Exhaustive,
            seed: None,
            reference: None,
            history_filters: true,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(self.target_period as u64)
    }
}

/// Dégradations signalées sans interrompre le calcul.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictWarning {
    InsufficientHistory { available: usize, required: usize },
    ModelFailed { model: String, reason: String },
}

impl std::fmt::Display for PredictWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictWarning::InsufficientHistory { available, required } => write!(
                f,
                "historique court : {available} tirages (recommandé : {required})"
            ),
            PredictWarning::ModelFailed { model, reason } => {
                write!(f, "modèle {model} indisponible : {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPick {
    pub rank: usize,
    pub balls: Vec<u8>,
    pub stars: Vec<u8>,
    pub score: f64,
    pub explanation: Explanation,
    /// Nombre de grilles 5+2 couvertes par cette sélection.
    pub combination_count: u128,
}

/// Classement final, produit à la demande. L'explication de chaque grille
/// n'est calculée qu'au moment où elle est lue.
pub struct Ranking<'c> {
    scorer: ScoringEngine,
    selected: std::vec::IntoIter<ScoredCandidate>,
    next_rank: usize,
    cancel: &'c dyn Fn() -> bool,
    report: RunReport,
    warnings: Vec<PredictWarning>,
    combination_count: u128,
}

impl<'c> Ranking<'c> {
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn warnings(&self) -> &[PredictWarning] {
        &self.warnings
    }

    /// Grilles restantes, sans explication.
    pub fn into_candidates(self) -> Vec<ScoredCandidate> {
        self.selected.collect()
    }
}

impl Iterator for Ranking<'_> {
    type Item = RankedPick;

    fn next(&mut self) -> Option<RankedPick> {
        if (self.cancel)() {
            return None;
        }
        let c = self.selected.next()?;
        self.next_rank += 1;
        Some(RankedPick {
            rank: self.next_rank,
            explanation: self.scorer.explain(&c.balls, &c.stars),
            balls: c.balls,
            stars: c.stars,
            score: c.score,
            combination_count: self.combination_count,
        })
    }
}

/// Pipeline complet : statistiques, filtre, notation, énumération, diversité.
pub struct Predictor<'a> {
    history: &'a History,
    config: &'a EngineConfig,
    model: Option<&'a dyn ProbabilityModel>,
}

impl<'a> Predictor<'a> {
    pub fn new(history: &'a History, config: &'a EngineConfig) -> Self {
        Self {
            history,
            config,
            model: None,
        }
    }

    pub fn with_model(mut self, model: &'a dyn ProbabilityModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Classe les grilles pour `request.target_period` à partir des tirages antérieurs.
    pub fn predict<'c>(
        &self,
        request: &PredictRequest,
        cancel: &'c dyn Fn() -> bool,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<Outcome<Ranking<'c>>> {
        let past = self.history.before(request.target_period);
        let stats = FeatureStatistics::build(past);
        self.predict_with_stats(request, past, &stats, cancel, progress)
    }

    /// Variante réutilisant des statistiques déjà construites sur `past`.
    pub fn predict_with_stats<'c>(
        &self,
        request: &PredictRequest,
        past: &[Draw],
        stats: &FeatureStatistics,
        cancel: &'c dyn Fn() -> bool,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<Outcome<Ranking<'c>>> {
        request.constraints.validate()?;
        if let Some(reference) = &request.reference {
            reference.validate()?;
        }
        let ball_ground = ground(Pool::Balls, &request.constraints.excluded_balls);
        let star_ground = ground(Pool::Stars, &request.constraints.excluded_stars);
        request.arity.validate(ball_ground.len(), star_ground.len())?;

        let mut warnings = Vec::new();
        let required = self.config.similarity.min_history;
        if past.len() < required {
            warn!(
                period = request.target_period,
                available = past.len(),
                required,
                "historique insuffisant"
            );
            warnings.push(PredictWarning::InsufficientHistory {
                available: past.len(),
                required,
            });
        }

        let probabilities = self.model.and_then(|model| {
            let result = model.predict(past, Pool::Balls).and_then(|balls| {
                let stars = model.predict(past, Pool::Stars)?;
                if !validate_distribution(&balls, Pool::Balls) || !validate_distribution(&stars, Pool::Stars) {
                    return Err(ModelError::InvalidDistribution(model.name().to_string()));
                }
                Ok(ModelProbabilities { balls, stars })
            });
            match result {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(model = model.name(), error = %e, "modèle ignoré");
                    warnings.push(PredictWarning::ModelFailed {
                        model: model.name().to_string(),
                        reason: e.to_string(),
                    });
                    None
                }
            }
        });

        let scorer = ScoringEngine::new(
            &self.config.scoring,
            stats,
            past,
            &self.config.similarity,
            probabilities.clone(),
            request.reference.as_ref(),
        );
        let filter_history: &[Draw] = if request.history_filters { past } else { &[] };
        let filter = ConstraintFilter::new(&request.constraints, filter_history, &self.config.filter);

        let mut source: Box<dyn PrimarySource> = match request.search {
            SearchMode::Exhaustive => Box::new(SubsetWalker::new(ball_ground.clone(), request.arity.balls)),
            SearchMode::Sampled => {
                let model_balls = probabilities.as_ref().map(|p| p.balls.as_slice());
                let ctx = StrategyContext::new(past, &ball_ground, model_balls, &self.config.strategy);
                Box::new(SampledSource::new(sample_subsets(
                    &ctx,
                    request.arity.balls,
                    self.config.enumerator.sampled_subsets,
                    request.seed(),
                )))
            }
        };

        info!(
            period = request.target_period,
            history = past.len(),
            arity = %request.arity,
            mode = ?request.search,
            model = scorer.has_model(),
            similar = scorer.similar_count(),
            "énumération"
        );

        let enumerator = Enumerator::new(&filter, &scorer, &self.config.enumerator).retaining(request.count);
        let result = match enumerator.run(source.as_mut(), request.arity, &star_ground, cancel, progress) {
            Outcome::Completed(r) => r,
            Outcome::Cancelled => {
                info!(period = request.target_period, "énumération annulée");
                return Ok(Outcome::Cancelled);
            }
        };

        let max_shared = if request.arity.is_compound() {
            self.config.diversity.compound_max_shared
        } else {
            self.config.diversity.single_max_shared
        };
        let selected = select_diverse(&result.candidates, request.count, max_shared);

        info!(
            scored = result.report.scored,
            rejected = result.report.total_rejected(),
            retained = result.candidates.len(),
            selected = selected.len(),
            "classement prêt"
        );

        let combination_count = Arity::SINGLE.combination_count(request.arity.balls, request.arity.stars);
        Ok(Outcome::Completed(Ranking {
            scorer,
            selected: selected.into_iter(),
            next_rank: 0,
            cancel,
            report: result.report,
            warnings,
            combination_count,
        }))
    }
}
