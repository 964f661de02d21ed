use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stat_line::Position;

/// Games considered by the recent-form average.
pub const RECENT_GAMES: usize = 10;

/// One player's box score for one week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyStatRow {
    pub player_id: Option<String>,
    pub player_display_name: String,
    pub position: Option<String>,
    pub team: Option<String>,
    pub season: i32,
    pub week: u32,
    pub opponent_team: Option<String>,
    pub stats: BTreeMap<String, f64>,
}

impl WeeklyStatRow {
    /// Raw column value, or one of the derived rate stats.
    pub fn stat_value(&self, stat: &str) -> Option<f64> {
        match stat {
            "completion_percentage" => {
                let att = self.stat("attempts")?;
                let comp = self.stat("completions")?;
                Some(if att > 0.0 { comp / att * 100.0 } else { 0.0 })
            }
            "yards_per_carry" => {
                let carries = self.stat("carries")?;
                let yards = self.stat("rushing_yards")?;
                Some(if carries > 0.0 { yards / carries } else { 0.0 })
            }
            "yards_per_reception" => {
                let rec = self.stat("receptions")?;
                let yards = self.stat("receiving_yards")?;
                Some(if rec > 0.0 { yards / rec } else { 0.0 })
            }
            _ => self.stat(stat),
        }
    }

    fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied().filter(|v| v.is_finite())
    }

    pub fn game_label(&self) -> String {
        format!("Wk {} {}", self.week, self.season)
    }
}

/// Roster entry from the players table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerRecord {
    pub gsis_id: Option<String>,
    pub display_name: String,
    pub position: Option<String>,
    pub latest_team: Option<String>,
    /// Inches.
    pub height: Option<f64>,
    /// Pounds.
    pub weight: Option<f64>,
}

pub fn rows_for<'a>(rows: &'a [WeeklyStatRow], player: &str) -> Vec<&'a WeeklyStatRow> {
    rows.iter()
        .filter(|r| r.player_display_name == player)
        .collect()
}

/// Newest first by (season, week).
pub fn sort_newest_first(rows: &mut [&WeeklyStatRow]) {
    rows.sort_by(|a, b| b.season.cmp(&a.season).then(b.week.cmp(&a.week)));
}

/// Mean of the stat over the player's last ten games; 0.0 without data.
pub fn recent_average(rows: &[WeeklyStatRow], player: &str, stat: &str) -> f64 {
    let mut games = rows_for(rows, player);
    sort_newest_first(&mut games);
    let values: Vec<f64> = games
        .iter()
        .take(RECENT_GAMES)
        .filter_map(|r| r.stat_value(stat))
        .collect();
    mean_or_zero(&values)
}

/// Mean of the stat over every game the player logged against `opponent`.
pub fn career_average_vs_opponent(
    rows: &[WeeklyStatRow],
    player: &str,
    stat: &str,
    opponent: &str,
) -> f64 {
    let values: Vec<f64> = rows
        .iter()
        .filter(|r| r.player_display_name == player)
        .filter(|r| r.opponent_team.as_deref() == Some(opponent))
        .filter_map(|r| r.stat_value(stat))
        .collect();
    mean_or_zero(&values)
}

/// Most frequent team in the player's weekly rows.
pub fn team_of_player(rows: &[WeeklyStatRow], player: &str) -> Option<String> {
    mode(
        rows_for(rows, player)
            .into_iter()
            .filter_map(|r| r.team.as_deref()),
    )
}

/// Weekly rows first, then the roster table.
pub fn position_of_player(
    weekly: &[WeeklyStatRow],
    players: &[PlayerRecord],
    player: &str,
) -> Option<Position> {
    let from_weekly = mode(
        rows_for(weekly, player)
            .into_iter()
            .filter_map(|r| r.position.as_deref()),
    );
    let from_roster = || {
        mode(
            players
                .iter()
                .filter(|p| p.display_name == player)
                .filter_map(|p| p.position.as_deref()),
        )
    };
    from_weekly
        .or_else(from_roster)
        .and_then(|code| Position::parse(&code))
}

pub fn find_player<'a>(players: &'a [PlayerRecord], name: &str) -> Option<&'a PlayerRecord> {
    players.iter().find(|p| p.display_name == name)
}

/// GSIS id of the player on `team`.
pub fn resolve_player_id(players: &[PlayerRecord], name: &str, team: &str) -> Option<String> {
    players
        .iter()
        .find(|p| p.display_name == name && p.latest_team.as_deref() == Some(team))
        .and_then(|p| p.gsis_id.clone())
}

/// Most common value; ties go to the lexicographically smallest.
pub fn mode<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        let v = v.trim();
        if v.is_empty() {
            continue;
        }
        *counts.entry(v).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, season: i32, week: u32, opp: &str, stats: &[(&str, f64)]) -> WeeklyStatRow {
        WeeklyStatRow {
            player_id: Some("00-1".into()),
            player_display_name: name.into(),
            position: Some("RB".into()),
            team: Some("ATL".into()),
            season,
            week,
            opponent_team: Some(opp.into()),
            stats: stats.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        }
    }

    #[test]
    fn recent_average_uses_last_ten_weeks() {
        let mut rows = Vec::new();
        for week in 1..=12 {
            rows.push(row("B", 2024, week, "KC", &[("rushing_yards", week as f64)]));
        }
        // weeks 3..=12
        assert!((recent_average(&rows, "B", "rushing_yards") - 7.5).abs() < 1e-12);
        assert_eq!(recent_average(&rows, "Nobody", "rushing_yards"), 0.0);
        assert_eq!(recent_average(&rows, "B", "passing_yards"), 0.0);
    }

    #[test]
    fn derived_stats() {
        let r = row(
            "B",
            2024,
            1,
            "KC",
            &[
                ("rushing_yards", 100.0),
                ("carries", 20.0),
                ("attempts", 0.0),
                ("completions", 0.0),
            ],
        );
        assert_eq!(r.stat_value("yards_per_carry"), Some(5.0));
        assert_eq!(r.stat_value("completion_percentage"), Some(0.0));
        assert_eq!(r.stat_value("yards_per_reception"), None);
    }

    #[test]
    fn vs_opponent_average() {
        let rows = vec![
            row("B", 2022, 3, "KC", &[("rushing_yards", 50.0)]),
            row("B", 2023, 8, "KC", &[("rushing_yards", 90.0)]),
            row("B", 2023, 9, "SF", &[("rushing_yards", 10.0)]),
        ];
        assert_eq!(career_average_vs_opponent(&rows, "B", "rushing_yards", "KC"), 70.0);
        assert_eq!(career_average_vs_opponent(&rows, "B", "rushing_yards", "NE"), 0.0);
    }

    #[test]
    fn mode_breaks_ties_alphabetically() {
        assert_eq!(mode(["SF", "ATL", "SF", "ATL"].into_iter()), Some("ATL".into()));
        assert_eq!(mode(["SF", "ATL", "SF"].into_iter()), Some("SF".into()));
        assert_eq!(mode(std::iter::empty()), None);
    }

    #[test]
    fn position_falls_back_to_roster() {
        let players = vec![PlayerRecord {
            gsis_id: Some("00-9".into()),
            display_name: "Q".into(),
            position: Some("qb".into()),
            latest_team: Some("KC".into()),
            height: Some(75.0),
            weight: Some(225.0),
        }];
        assert_eq!(position_of_player(&[], &players, "Q"), Some(Position::Qb));
        assert_eq!(position_of_player(&[], &players, "Nobody"), None);
        assert_eq!(resolve_player_id(&players, "Q", "KC"), Some("00-9".into()));
        assert_eq!(resolve_player_id(&players, "Q", "SF"), None);
    }
}
