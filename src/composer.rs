use serde::{Deserialize, Serialize};

/// Per-factor logit step multiplier.
pub const SCALE: f64 = 0.35;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// One factor's marginal move in the over probability, in percentage points
/// rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub factor: String,
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composed {
    pub logit: f64,
    pub over_probability: f64,
    pub under_probability: f64,
}

/// Walks factors in order from a neutral logit. Each contribution is the
/// probability change at the point in the sequence where the factor is
/// applied, so contributions do not sum to `over - 0.5` in general.
#[derive(Debug, Clone, Default)]
pub struct LogitComposer {
    logit: f64,
    contributions: Vec<Contribution>,
}

impl LogitComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, factor: &str, weight: f64, signal: f64) -> f64 {
        let before = sigmoid(self.logit);
        self.logit += weight * signal * SCALE;
        let after = sigmoid(self.logit);
        let points = round2((after - before) * 100.0);
        self.contributions.push(Contribution {
            factor: factor.to_string(),
            points,
        });
        points
    }

    pub fn finish(self) -> (Composed, Vec<Contribution>) {
        let over = sigmoid(self.logit);
        let composed = Composed {
            logit: self.logit,
            over_probability: over,
            under_probability: 1.0 - over,
        };
        (composed, self.contributions)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_start_is_even() {
        let (c, contribs) = LogitComposer::new().finish();
        assert_eq!(c.over_probability, 0.5);
        assert_eq!(c.under_probability, 0.5);
        assert!(contribs.is_empty());
    }

    #[test]
    fn single_factor_step() {
        let mut comp = LogitComposer::new();
        let pts = comp.apply("rush_defense", -1.0, -1.0);
        assert_eq!(pts, 8.66);
        let (c, contribs) = comp.finish();
        assert!((c.over_probability - 0.5866).abs() < 1e-4);
        assert_eq!(contribs[0].factor, "rush_defense");
    }

    #[test]
    fn zero_signal_contributes_nothing() {
        let mut comp = LogitComposer::new();
        comp.apply("a", 0.8, 0.0);
        comp.apply("b", 0.0, 1.0);
        let (c, contribs) = comp.finish();
        assert_eq!(c.logit, 0.0);
        assert!(contribs.iter().all(|c| c.points == 0.0));
    }

    #[test]
    fn contributions_depend_on_position() {
        let mut first = LogitComposer::new();
        let early = first.apply("x", 1.0, 1.0);

        let mut second = LogitComposer::new();
        second.apply("push", 3.0, 1.0);
        let late = second.apply("x", 1.0, 1.0);
        assert!(late < early);
    }

    #[test]
    fn under_is_exact_complement() {
        let mut comp = LogitComposer::new();
        for (w, s) in [(0.9, 0.37), (-1.1, 0.81), (0.25, -1.0), (1.2, 0.03)] {
            comp.apply("f", w, s);
        }
        let (c, _) = comp.finish();
        assert_eq!(c.over_probability + c.under_probability, 1.0);
        assert!(c.over_probability > 0.0 && c.over_probability < 1.0);
    }

    #[test]
    fn rounds_half_points() {
        assert_eq!(round2(8.6612), 8.66);
        assert_eq!(round2(-0.004), -0.0);
    }
}
