use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::play_by_play::PlayByPlay;
use crate::player_stats::{PlayerRecord, WeeklyStatRow};

/// Blocking access to the external stats provider. Every call may fail; the
/// predictor turns failures into skipped factors.
pub trait DataSource: Send + Sync {
    fn play_by_play(&self, season: i32) -> Result<PlayByPlay>;

    fn weekly_stats(&self, season: i32) -> Result<Vec<WeeklyStatRow>>;

    fn players(&self) -> Result<Vec<PlayerRecord>>;

    /// Weekly rows for every season in `first..=last`; seasons that fail to
    /// load are left out.
    fn weekly_stats_range(&self, first: i32, last: i32) -> Vec<WeeklyStatRow> {
        let mut out = Vec::new();
        for season in first..=last {
            if let Ok(rows) = self.weekly_stats(season) {
                out.extend(rows);
            }
        }
        out
    }
}

/// Fixed data held in memory. Missing seasons behave like an unavailable
/// provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemorySource {
    pub play_by_play: BTreeMap<i32, PlayByPlay>,
    pub weekly: BTreeMap<i32, Vec<WeeklyStatRow>>,
    pub players: Option<Vec<PlayerRecord>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_play_by_play(mut self, pbp: PlayByPlay) -> Self {
        self.play_by_play.insert(pbp.season, pbp);
        self
    }

    pub fn with_weekly(mut self, season: i32, rows: Vec<WeeklyStatRow>) -> Self {
        self.weekly.insert(season, rows);
        self
    }

    pub fn with_players(mut self, players: Vec<PlayerRecord>) -> Self {
        self.players = Some(players);
        self
    }
}

impl DataSource for InMemorySource {
    fn play_by_play(&self, season: i32) -> Result<PlayByPlay> {
        self.play_by_play
            .get(&season)
            .cloned()
            .ok_or_else(|| anyhow!("no play-by-play for {season}"))
    }

    fn weekly_stats(&self, season: i32) -> Result<Vec<WeeklyStatRow>> {
        self.weekly
            .get(&season)
            .cloned()
            .ok_or_else(|| anyhow!("no weekly stats for {season}"))
    }

    fn players(&self) -> Result<Vec<PlayerRecord>> {
        self.players
            .clone()
            .ok_or_else(|| anyhow!("no players table"))
    }
}
