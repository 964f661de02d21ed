use serde::{Deserialize, Serialize};

/// Smallest denominator used when scaling a delta relative to a line value.
pub const MIN_DENOMINATOR: f64 = 1e-6;

/// One factor's normalized evidence. `Skipped` carries a reason instead of a
/// value and always reads as a neutral 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Active { value: f64, note: String },
    Skipped { reason: String },
}

impl Signal {
    /// Clips `value` into [-1, 1]; NaN becomes 0.0.
    pub fn active(value: f64, note: impl Into<String>) -> Self {
        Signal::Active {
            value: clip_unit(value),
            note: note.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Signal::Skipped {
            reason: reason.into(),
        }
    }

    /// Collapses a fallible computation into a signal.
    pub fn from_result(result: Result<Signal, String>) -> Self {
        result.unwrap_or_else(Signal::skipped)
    }

    pub fn value(&self) -> f64 {
        match self {
            Signal::Active { value, .. } => *value,
            Signal::Skipped { .. } => 0.0,
        }
    }

    pub fn note(&self) -> String {
        match self {
            Signal::Active { note, .. } => note.clone(),
            Signal::Skipped { reason } => format!("Skipped: {reason}"),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Signal::Skipped { .. })
    }

    /// Keeps the note but zeroes the value when the factor does not apply to
    /// the current stat context.
    pub fn only_if(self, applies: bool) -> Self {
        match self {
            Signal::Active { note, .. } if !applies => Signal::Active { value: 0.0, note },
            other => other,
        }
    }
}

pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

pub fn clip_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    clip(value, -1.0, 1.0)
}

/// `clip((raw - center) / scale, -1, 1)`
pub fn linear_signal(raw: f64, center: f64, scale: f64) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    clip_unit((raw - center) / scale)
}

/// Relative delta of `observed` against `reference`, with the denominator
/// floored at [`MIN_DENOMINATOR`].
pub fn relative_signal(observed: f64, reference: f64) -> f64 {
    clip_unit(safe_div(observed - reference, reference.max(MIN_DENOMINATOR), 0.0))
}

pub fn safe_div(a: f64, b: f64, default: f64) -> f64 {
    if b == 0.0 { default } else { a / b }
}

/// Lower rank is better: rank 1 maps to +1, rank `total_teams` to -1.
pub fn rank_signal(rank: f64, total_teams: u32) -> f64 {
    let span = (total_teams.max(2) - 1) as f64;
    clip_unit(1.0 - 2.0 * ((rank - 1.0) / span))
}
