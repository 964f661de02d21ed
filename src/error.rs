use thiserror::Error;

/// Rejections raised before any data is touched. Everything past validation
/// degrades to skipped factors instead of failing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("player name is empty")]
    EmptyPlayer,

    #[error("stat line is empty")]
    EmptyStatLine,

    #[error("malformed stat line: {0:?}")]
    MalformedStatLine(String),

    #[error("line value must be a finite, non-negative number (got {0})")]
    InvalidLineValue(f64),

    #[error("line value is not a number: {0:?}")]
    NonNumericLineValue(String),

    #[error("malformed opponent team code: {0:?}")]
    MalformedOpponent(String),

    #[error("season {season} outside supported range {min}..={max}")]
    SeasonOutOfRange { season: i32, min: i32, max: i32 },
}
