pub mod composer;
pub mod config;
pub mod error;
pub mod fallback;
pub mod history;
pub mod nflverse;
pub mod normalizers;
pub mod pbp_metrics;
pub mod play_by_play;
pub mod player_stats;
pub mod prediction;
pub mod replay;
pub mod signal;
pub mod source;
pub mod stat_line;
pub mod tiers;
pub mod weights;

pub use error::RequestError;
pub use prediction::{Decision, PredictionRequest, PredictionResult, Predictor, predict};
pub use source::{DataSource, InMemorySource};
