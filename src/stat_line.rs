use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

const RUSH_KEYS: [&str; 4] = ["rushing_", "rush_", "yards_per_carry", "carries"];
const PASS_KEYS: [&str; 6] = [
    "passing_",
    "pass_",
    "air_yards",
    "completions",
    "attempts",
    "interceptions",
];
const RECEIVE_KEYS: [&str; 4] = ["receiving_", "targets", "receptions", "yards_per_reception"];

/// A stat line in its canonical `snake_case` form, e.g. `rushing_yards`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StatLine(String);

impl StatLine {
    /// Case- and whitespace-insensitive: `" Rushing  Yards"` and
    /// `"rushing_yards"` produce the same key.
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let key = normalize_stat_key(raw);
        if key.is_empty() {
            return Err(RequestError::EmptyStatLine);
        }
        let valid = key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid || key.starts_with('_') || key.ends_with('_') {
            return Err(RequestError::MalformedStatLine(raw.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn context(&self) -> StatContext {
        StatContext::classify(&self.0)
    }
}

impl TryFrom<String> for StatLine {
    type Error = RequestError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<StatLine> for String {
    fn from(line: StatLine) -> Self {
        line.0
    }
}

impl fmt::Display for StatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize_stat_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Coarse stat family used to pick fallback weights and gate signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatContext {
    Rush,
    Pass,
    Receive,
    Other,
}

impl StatContext {
    /// Substring match against the rush, pass and receive keyword groups, in
    /// that order. Anything unmatched is classified as `Rush`; `Other` is
    /// never produced here.
    pub fn classify(stat_key: &str) -> Self {
        let s = normalize_stat_key(stat_key);
        if RUSH_KEYS.iter().any(|k| s.contains(k)) {
            return StatContext::Rush;
        }
        if PASS_KEYS.iter().any(|k| s.contains(k)) {
            return StatContext::Pass;
        }
        if RECEIVE_KEYS.iter().any(|k| s.contains(k)) {
            return StatContext::Receive;
        }
        StatContext::Rush
    }

    pub fn is_pass_or_receive(self) -> bool {
        matches!(self, StatContext::Pass | StatContext::Receive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Position {
    Qb,
    Rb,
    Wr,
    Te,
    Other(String),
}

impl Position {
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        match code.as_str() {
            "" => None,
            "QB" => Some(Position::Qb),
            "RB" => Some(Position::Rb),
            "WR" => Some(Position::Wr),
            "TE" => Some(Position::Te),
            _ => Some(Position::Other(code)),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::Other(code) => code,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
