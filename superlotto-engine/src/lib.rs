pub mod backtest;
pub mod config;
pub mod diversity;
pub mod ensemble;
pub mod enumerate;
pub mod error;
pub mod features;
pub mod filter;
pub mod models;
pub mod predict;
pub mod scoring;
pub mod stats;
pub mod strategy;

pub use config::EngineConfig;
pub use enumerate::{Arity, Outcome};
pub use error::{EngineError, ModelError};
pub use predict::{PredictRequest, Predictor, RankedPick, SearchMode};
