use serde::{Deserialize, Serialize};

/// Rank assumed when an opponent's rank is missing or NaN.
pub const DEFAULT_RANK: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "top_5")]
    Top5,
    #[serde(rename = "top_10")]
    Top10,
    #[serde(rename = "top_15")]
    Top15,
    #[serde(rename = "top_20")]
    Top20,
    #[serde(rename = "top_25")]
    Top25,
    #[serde(rename = "bottom_32")]
    Bottom32,
}

impl Tier {
    pub fn for_rank(rank: f64) -> Self {
        if rank <= 5.0 {
            Tier::Top5
        } else if rank <= 10.0 {
            Tier::Top10
        } else if rank <= 15.0 {
            Tier::Top15
        } else if rank <= 20.0 {
            Tier::Top20
        } else if rank <= 25.0 {
            Tier::Top25
        } else {
            Tier::Bottom32
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Top5 => "top_5",
            Tier::Top10 => "top_10",
            Tier::Top15 => "top_15",
            Tier::Top20 => "top_20",
            Tier::Top25 => "top_25",
            Tier::Bottom32 => "bottom_32",
        }
    }
}

/// Score per tier; higher means a tougher defense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierScores {
    pub top_5: f64,
    pub top_10: f64,
    pub top_15: f64,
    pub top_20: f64,
    pub top_25: f64,
    pub bottom_32: f64,
}

impl Default for TierScores {
    fn default() -> Self {
        Self {
            top_5: 90.0,
            top_10: 85.0,
            top_15: 70.0,
            top_20: 60.0,
            top_25: 50.0,
            bottom_32: 40.0,
        }
    }
}

impl TierScores {
    pub fn score(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Top5 => self.top_5,
            Tier::Top10 => self.top_10,
            Tier::Top15 => self.top_15,
            Tier::Top20 => self.top_20,
            Tier::Top25 => self.top_25,
            Tier::Bottom32 => self.bottom_32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseKind {
    Rushing,
    Passing,
    Points,
}

impl DefenseKind {
    pub fn table_name(self) -> &'static str {
        match self {
            DefenseKind::Rushing => "defensive_rushing_factors",
            DefenseKind::Passing => "defensive_passing_factors",
            DefenseKind::Points => "defensive_points_factors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DefenseTierTables {
    #[serde(default)]
    pub rushing: TierScores,
    #[serde(default)]
    pub passing: TierScores,
    #[serde(default)]
    pub points: TierScores,
}

impl DefenseTierTables {
    pub fn table(&self, kind: DefenseKind) -> &TierScores {
        match kind {
            DefenseKind::Rushing => &self.rushing,
            DefenseKind::Passing => &self.passing,
            DefenseKind::Points => &self.points,
        }
    }
}

/// Replaces a missing or NaN rank with [`DEFAULT_RANK`].
pub fn rank_or_default(rank: Option<f64>) -> f64 {
    match rank {
        Some(r) if r.is_finite() => r,
        _ => DEFAULT_RANK,
    }
}
