use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backtest::HitClass;
use crate::error::{EngineError, Result};

/// Paramètres complets du moteur. Chaque section a des valeurs par défaut
/// et peut être surchargée partiellement depuis un fichier JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub filter: FilterConfig,
    pub scoring: ScoringWeights,
    pub similarity: SimilarityConfig,
    pub enumerator: EnumeratorConfig,
    pub diversity: DiversityConfig,
    pub strategy: StrategyConfig,
    pub backtest: BacktestConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Rejet si la grille partage au moins ce nombre de boules avec le dernier tirage.
    pub max_ball_overlap: u32,
    /// Idem pour les étoiles.
    pub max_star_overlap: u32,
    /// Longueur de suite d'entiers consécutifs rejetée.
    pub max_run: usize,
    pub geometric_tolerance: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_ball_overlap: 4,
            max_star_overlap: 2,
            max_run: 4,
            geometric_tolerance: 0.01,
        }
    }
}

/// Intervalle inclusif associé à un bonus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: i32,
    pub max: i32,
    pub bonus: f64,
}

impl Band {
    pub const fn new(min: i32, max: i32, bonus: f64) -> Self {
        Self { min, max, bonus }
    }
}

/// Bonus de la première bande contenant `value`.
pub fn band_bonus(bands: &[Band], value: i32) -> Option<f64> {
    bands
        .iter()
        .find(|b| b.min <= value && value <= b.max)
        .map(|b| b.bonus)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FamilyWeight {
    /// Multiplicateur de la probabilité prévue.
    pub scale: f64,
    /// Bonus quand la valeur est absente de la prévision.
    pub miss: f64,
}

impl FamilyWeight {
    pub const fn new(scale: f64, miss: f64) -> Self {
        Self { scale, miss }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionWeights {
    pub sum_range: FamilyWeight,
    pub parity: FamilyWeight,
    pub size: FamilyWeight,
    pub zone: FamilyWeight,
    pub consecutive: FamilyWeight,
    pub ac: FamilyWeight,
    pub prime: FamilyWeight,
    pub star_sum: FamilyWeight,
}

impl Default for TransitionWeights {
    fn default() -> Self {
        Self {
            sum_range: FamilyWeight::new(250.0, 30.0),
            parity: FamilyWeight::new(200.0, 20.0),
            size: FamilyWeight::new(180.0, 20.0),
            zone: FamilyWeight::new(200.0, 20.0),
            consecutive: FamilyWeight::new(150.0, 15.0),
            ac: FamilyWeight::new(120.0, 10.0),
            prime: FamilyWeight::new(100.0, 0.0),
            star_sum: FamilyWeight::new(150.0, 15.0),
        }
    }
}

/// Constantes de notation. Les valeurs par défaut reprennent le réglage historique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub baseline: f64,

    pub sum_bands: Vec<Band>,
    pub odd_bands: Vec<Band>,
    pub big_bands: Vec<Band>,
    pub small_bands: Vec<Band>,
    pub consecutive_bands: Vec<Band>,
    pub ac_bands: Vec<Band>,
    pub prime_bands: Vec<Band>,
    pub span_bands: Vec<Band>,
    pub star_sum_bands: Vec<Band>,

    pub zone_all_covered: f64,
    pub zone_two_strong: f64,
    pub zone_patterns: Vec<String>,
    pub zone_pattern_bonus: f64,
    pub modulus_cluster_bonus: f64,
    pub tail_diversity_min: u8,
    pub tail_diversity_bonus: f64,

    pub star_split_mixed: f64,
    pub star_split_skewed: f64,

    /// Bonus par boule voisine (±1) du dernier tirage, à partir de `neighbor_min`.
    pub neighbor_min: u32,
    pub neighbor_bonus: f64,
    /// Bonus selon le nombre de boules répétées du dernier tirage.
    pub repeat_bands: Vec<Band>,
    pub star_fresh_bonus: f64,

    pub similarity_overlap_bonus: f64,

    pub transitions: TransitionWeights,

    pub ball_model_gain: f64,
    pub star_model_gain: f64,

    pub reference_ball_top: usize,
    pub reference_star_top: usize,
    pub reference_ball_step: f64,
    pub reference_star_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            baseline: 500.0,
            sum_bands: vec![
                Band::new(85, 115, 380.0),
                Band::new(50, 75, 250.0),
                Band::new(76, 84, 156.0),
                Band::new(116, 130, 100.0),
                Band::new(131, 145, 38.0),
                Band::new(40, 49, 22.0),
                Band::new(146, 180, 7.0),
            ],
            odd_bands: vec![Band::new(2, 3, 200.0), Band::new(1, 1, 250.0), Band::new(4, 4, 250.0)],
            big_bands: vec![Band::new(2, 3, 100.0)],
            small_bands: vec![
                Band::new(2, 2, 210.0),
                Band::new(1, 1, 150.0),
                Band::new(3, 3, 100.0),
                Band::new(0, 0, 50.0),
                Band::new(4, i32::MAX, 40.0),
            ],
            consecutive_bands: vec![
                Band::new(0, 0, 50.0),
                Band::new(1, 1, 120.0),
                Band::new(2, 2, 80.0),
                Band::new(3, 3, -100.0),
                Band::new(4, i32::MAX, -500.0),
            ],
            ac_bands: vec![
                Band::new(5, i32::MAX, 180.0),
                Band::new(4, 4, 150.0),
                Band::new(3, 3, 80.0),
                Band::new(1, 2, 30.0),
            ],
            prime_bands: vec![
                Band::new(0, 0, 30.0),
                Band::new(1, 1, 80.0),
                Band::new(2, 2, 120.0),
                Band::new(3, 3, 100.0),
                Band::new(4, i32::MAX, 50.0),
            ],
            span_bands: vec![Band::new(18, 32, 200.0), Band::new(0, i32::MAX, 150.0)],
            star_sum_bands: Vec::new(),
            zone_all_covered: 200.0,
            zone_two_strong: 250.0,
            zone_patterns: ["1-2-2", "2-2-1", "2-1-2", "1-3-1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            zone_pattern_bonus: 80.0,
            modulus_cluster_bonus: 120.0,
            tail_diversity_min: 4,
            tail_diversity_bonus: 60.0,
            star_split_mixed: 150.0,
            star_split_skewed: 100.0,
            neighbor_min: 2,
            neighbor_bonus: 150.0,
            repeat_bands: vec![Band::new(0, 0, 150.0), Band::new(1, 1, 200.0)],
            star_fresh_bonus: 100.0,
            similarity_overlap_bonus: 500.0,
            transitions: TransitionWeights::default(),
            ball_model_gain: 1.0,
            star_model_gain: 1.0,
            reference_ball_top: 15,
            reference_star_top: 5,
            reference_ball_step: 0.2,
            reference_star_bonus: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Nombre de tirages récents parcourus.
    pub window: usize,
    /// Historique minimal pour activer la recherche.
    pub min_history: usize,
    pub top_k: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            window: 200,
            min_history: 30,
            top_k: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumeratorConfig {
    /// Taille du tas des meilleurs survivants.
    pub retain: usize,
    /// Interroge la demande d'annulation tous les N sous-ensembles de boules.
    pub cancel_every: u64,
    /// Émet la progression tous les N sous-ensembles de boules.
    pub progress_every: u64,
    /// Nombre de tirages de stratégie en mode échantillonné.
    pub sampled_subsets: usize,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            retain: 5000,
            cancel_every: 64,
            progress_every: 10_000,
            sampled_subsets: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Une grille simple est refusée si elle partage au moins ce nombre de boules avec une retenue.
    pub single_max_shared: u32,
    pub compound_max_shared: u32,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            single_max_shared: 4,
            compound_max_shared: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub hot_window: usize,
    pub super_cold_gap: u32,
    pub pair_window: usize,
    pub top_pairs: usize,
    /// Taille du vivier pour l'échantillonnage pondéré.
    pub weighted_top_k: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            hot_window: 20,
            super_cold_gap: 10,
            pair_window: 300,
            top_pairs: 150,
            weighted_top_k: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub min_history: usize,
    /// Nombre de grilles demandées par période.
    pub count: usize,
    pub target: HitClass,
    pub soft_target: HitClass,
    pub apply_filters: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_history: 10,
            count: 20,
            target: HitClass::new(4, 2),
            soft_target: HitClass::new(3, 1),
            apply_filters: true,
        }
    }
}
