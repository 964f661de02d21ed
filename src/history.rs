//! Hit-rate reports: how often a player cleared (or stayed under) a line in
//! recent games or against one opponent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::player_stats::{RECENT_GAMES, WeeklyStatRow, rows_for, sort_newest_first};
use crate::source::DataSource;
use crate::stat_line::StatLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

impl Side {
    /// Strict comparison; a push counts for neither side.
    pub fn hits(self, value: f64, line: f64) -> bool {
        match self {
            Side::Over => value > line,
            Side::Under => value < line,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Over => "over",
            Side::Under => "under",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "over" | "o" => Ok(Side::Over),
            "under" | "u" => Ok(Side::Under),
            other => Err(format!("side must be 'over' or 'under' (got {other:?})")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameValue {
    /// `Wk {week} {season}`
    pub label: String,
    pub opponent: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRateReport {
    pub player: String,
    pub stat_line: StatLine,
    /// Oldest first.
    pub games: Vec<GameValue>,
    /// 0..=100; 0 when there are no games.
    pub percentage: f64,
    pub line: f64,
    pub side: Side,
}

impl HitRateReport {
    fn build(
        player: &str,
        stat: &StatLine,
        line: f64,
        side: Side,
        newest_first: &[&WeeklyStatRow],
    ) -> Self {
        let mut games: Vec<GameValue> = newest_first
            .iter()
            .filter_map(|row| {
                row.stat_value(stat.as_str()).map(|value| GameValue {
                    label: row.game_label(),
                    opponent: row.opponent_team.clone(),
                    value,
                })
            })
            .collect();
        games.reverse();
        let hits = games.iter().filter(|g| side.hits(g.value, line)).count();
        let percentage = if games.is_empty() {
            0.0
        } else {
            hits as f64 / games.len() as f64 * 100.0
        };
        Self {
            player: player.to_string(),
            stat_line: stat.clone(),
            games,
            percentage,
            line,
            side,
        }
    }

    pub fn hits(&self) -> usize {
        self.games
            .iter()
            .filter(|g| self.side.hits(g.value, self.line))
            .count()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (i, game) in self.games.iter().enumerate() {
            let opp = game.opponent.as_deref().unwrap_or("?");
            out.push_str(&format!(
                "Game {:>2}: {} vs {opp:<4} {} = {}\n",
                i + 1,
                game.label,
                self.stat_line,
                game.value
            ));
        }
        out.push_str(&format!(
            "\n{} went {} {} {:.1}% of the last {} games.\n",
            self.player,
            self.side,
            self.line,
            self.percentage,
            self.games.len()
        ));
        out
    }
}

/// Last ten games, walking back a season at a time from `season` until ten
/// games are found or `first_season` is passed. Seasons that fail to load
/// are skipped.
pub fn last_ten(
    source: &dyn DataSource,
    player: &str,
    stat: &StatLine,
    line: f64,
    side: Side,
    season: i32,
    first_season: i32,
) -> HitRateReport {
    let mut collected: Vec<WeeklyStatRow> = Vec::new();
    let mut year = season;
    while collected.len() < RECENT_GAMES && year >= first_season {
        match source.weekly_stats(year) {
            Ok(rows) => {
                let mut games = rows_for(&rows, player);
                sort_newest_first(&mut games);
                let needed = RECENT_GAMES - collected.len();
                collected.extend(games.into_iter().take(needed).cloned());
            }
            Err(err) => debug!(season = year, error = %err, "weekly stats unavailable"),
        }
        year -= 1;
    }
    let mut games: Vec<&WeeklyStatRow> = collected.iter().collect();
    sort_newest_first(&mut games);
    HitRateReport::build(player, stat, line, side, &games)
}

/// Every game against `opponent` across the history seasons; `None` when the
/// player never faced them.
pub fn head_to_head(
    source: &dyn DataSource,
    player: &str,
    stat: &StatLine,
    line: f64,
    side: Side,
    opponent: &str,
    seasons: (i32, i32),
) -> Option<HitRateReport> {
    vs_opponent(source, player, stat, line, side, opponent, seasons, None)
}

/// As [`head_to_head`], limited to the ten most recent meetings.
pub fn head_to_head_last_ten(
    source: &dyn DataSource,
    player: &str,
    stat: &StatLine,
    line: f64,
    side: Side,
    opponent: &str,
    seasons: (i32, i32),
) -> Option<HitRateReport> {
    vs_opponent(
        source,
        player,
        stat,
        line,
        side,
        opponent,
        seasons,
        Some(RECENT_GAMES),
    )
}

#[allow(clippy::too_many_arguments)]
fn vs_opponent(
    source: &dyn DataSource,
    player: &str,
    stat: &StatLine,
    line: f64,
    side: Side,
    opponent: &str,
    (first, last): (i32, i32),
    limit: Option<usize>,
) -> Option<HitRateReport> {
    let rows = source.weekly_stats_range(first, last);
    let mut games: Vec<&WeeklyStatRow> = rows_for(&rows, player)
        .into_iter()
        .filter(|r| r.opponent_team.as_deref() == Some(opponent))
        .collect();
    if games.is_empty() {
        return None;
    }
    sort_newest_first(&mut games);
    if let Some(limit) = limit {
        games.truncate(limit);
    }
    Some(HitRateReport::build(player, stat, line, side, &games))
}
