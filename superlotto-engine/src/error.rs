use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("arité invalide {balls}+{stars} (attendu 5..={max_balls} boules, 2..={max_stars} étoiles)")]
    InvalidArity {
        balls: usize,
        stars: usize,
        max_balls: usize,
        max_stars: usize,
    },

    #[error("contrainte invalide : {0}")]
    InvalidConstraint(String),

    #[error("lecture de la configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration invalide : {0}")]
    ConfigParse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("historique insuffisant pour {model} ({available} tirages, minimum {required})")]
    InsufficientHistory {
        model: String,
        available: usize,
        required: usize,
    },

    #[error("distribution invalide produite par {0}")]
    InvalidDistribution(String),

    #[error("poids de calibration introuvables : {0}")]
    Calibration(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
