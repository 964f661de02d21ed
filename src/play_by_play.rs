use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Columns read from a play-by-play file. Any subset may be absent.
pub const PBP_COLUMNS: [&str; 22] = [
    "posteam",
    "defteam",
    "play_type",
    "pass_attempt",
    "rush_attempt",
    "yards_gained",
    "sack",
    "qb_hit",
    "hurry",
    "touchdown",
    "td_team",
    "interception",
    "field_goal_result",
    "extra_point_result",
    "two_point_conv_result",
    "yardline_100",
    "air_yards",
    "yards_after_catch",
    "passer_player_id",
    "receiver_player_id",
    "rusher_player_id",
    "week",
];

/// One play. Numeric flags are kept as `f64` the way the source files store
/// them; `None` means the cell was null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayRow {
    pub posteam: Option<String>,
    pub defteam: Option<String>,
    pub play_type: Option<String>,
    pub pass_attempt: Option<f64>,
    pub rush_attempt: Option<f64>,
    pub yards_gained: Option<f64>,
    pub sack: Option<f64>,
    pub qb_hit: Option<f64>,
    pub hurry: Option<f64>,
    pub touchdown: Option<f64>,
    pub td_team: Option<String>,
    pub interception: Option<f64>,
    pub field_goal_result: Option<String>,
    pub extra_point_result: Option<String>,
    pub two_point_conv_result: Option<String>,
    pub yardline_100: Option<f64>,
    pub air_yards: Option<f64>,
    pub yards_after_catch: Option<f64>,
    pub passer_player_id: Option<String>,
    pub receiver_player_id: Option<String>,
    pub rusher_player_id: Option<String>,
    pub week: Option<f64>,
}

impl PlayRow {
    pub fn is_pass_attempt(&self) -> bool {
        flag(self.pass_attempt)
    }

    pub fn is_rush_attempt(&self) -> bool {
        flag(self.rush_attempt)
    }

    pub fn is_red_zone(&self) -> bool {
        self.yardline_100.is_some_and(|y| y <= 20.0)
    }

    pub fn offense_is(&self, team: &str) -> bool {
        self.posteam.as_deref() == Some(team)
    }

    pub fn defense_is(&self, team: &str) -> bool {
        self.defteam.as_deref() == Some(team)
    }

    pub fn play_type_is(&self, kind: &str) -> bool {
        self.play_type.as_deref() == Some(kind)
    }
}

pub fn flag(v: Option<f64>) -> bool {
    v.is_some_and(|x| x == 1.0)
}

/// One season of plays plus the set of columns the source actually had.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayByPlay {
    pub season: i32,
    pub plays: Vec<PlayRow>,
    #[serde(default = "all_columns")]
    pub columns: BTreeSet<String>,
}

fn all_columns() -> BTreeSet<String> {
    PBP_COLUMNS.iter().map(|c| (*c).to_string()).collect()
}

impl PlayByPlay {
    /// Dataset assumed to carry every known column.
    pub fn new(season: i32, plays: Vec<PlayRow>) -> Self {
        Self {
            season,
            plays,
            columns: all_columns(),
        }
    }

    pub fn with_columns(season: i32, plays: Vec<PlayRow>, columns: &[&str]) -> Self {
        Self {
            season,
            plays,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        !self.plays.is_empty() && names.iter().all(|c| self.has_column(c))
    }

    /// Every team code seen on offense or defense, sorted.
    pub fn teams(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for play in &self.plays {
            if let Some(t) = play.posteam.as_deref() {
                out.insert(t);
            }
            if let Some(t) = play.defteam.as_deref() {
                out.insert(t);
            }
        }
        out
    }
}
