use serde::Serialize;
use tracing::{debug, info, warn};

use crate::play_by_play::PlayByPlay;
use crate::source::DataSource;

/// Column a usable play-by-play season must carry.
const REQUIRED_COLUMN: &str = "defteam";

/// Outcome of loading play-by-play with the one-season fallback.
#[derive(Debug, Clone, Serialize)]
pub struct PbpLoad {
    #[serde(skip)]
    pub data: Option<PlayByPlay>,
    /// Season whose data is in `data`; the requested season when nothing
    /// loaded.
    pub season_used: i32,
    pub note: String,
}

impl PbpLoad {
    pub fn data(&self) -> Option<&PlayByPlay> {
        self.data.as_ref()
    }
}

fn try_season(source: &dyn DataSource, season: i32) -> Option<PlayByPlay> {
    match source.play_by_play(season) {
        Ok(pbp) if !pbp.is_empty() && pbp.has_column(REQUIRED_COLUMN) => Some(pbp),
        Ok(_) => {
            debug!(season, "play-by-play empty or missing {REQUIRED_COLUMN}");
            None
        }
        Err(err) => {
            debug!(season, "play-by-play load failed: {err:#}");
            None
        }
    }
}

/// Requested season, then `season - 1`, then give up. No deeper fallback.
pub fn load_pbp_with_fallback(source: &dyn DataSource, season: i32) -> PbpLoad {
    if let Some(pbp) = try_season(source, season) {
        return PbpLoad {
            data: Some(pbp),
            season_used: season,
            note: format!("Loaded PBP for {season}"),
        };
    }

    let prev = season - 1;
    if let Some(pbp) = try_season(source, prev) {
        info!(requested = season, used = prev, "play-by-play fell back a season");
        return PbpLoad {
            data: Some(pbp),
            season_used: prev,
            note: format!("No PBP for {season}; fell back to {prev}"),
        };
    }

    warn!(season, "no play-by-play available");
    PbpLoad {
        data: None,
        season_used: season,
        note: format!(
            "No PBP available for {season} (or {prev}). Offline or data unavailable."
        ),
    }
}
