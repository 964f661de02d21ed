//! A prediction frozen to disk: the request plus every table it reads.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::DEFAULT_HISTORY_FIRST_SEASON;
use crate::error::RequestError;
use crate::prediction::{PredictionRequest, PredictionResult, Predictor};
use crate::source::InMemorySource;
use crate::weights::WeightRegistry;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayCase {
    pub request: PredictionRequest,
    #[serde(default)]
    pub history_first_season: Option<i32>,
    #[serde(default)]
    pub data: InMemorySource,
}

impl ReplayCase {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse replay case {}", path.display()))
    }

    pub fn run(&self, registry: &WeightRegistry) -> Result<PredictionResult, RequestError> {
        let request = self.request.clone().validate()?;
        let predictor = Predictor::new(&self.data, registry).with_history_from(
            self.history_first_season
                .unwrap_or(DEFAULT_HISTORY_FIRST_SEASON),
        );
        Ok(predictor.predict(&request))
    }
}
