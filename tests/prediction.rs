use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use nfl_overunder::play_by_play::{PlayByPlay, PlayRow};
use nfl_overunder::player_stats::{PlayerRecord, WeeklyStatRow};
use nfl_overunder::weights::WeightRegistry;
use nfl_overunder::{
    DataSource, Decision, InMemorySource, PredictionRequest, Predictor, RequestError, predict,
};

/// Serves one season of play-by-play and records which seasons were asked for.
struct SeasonProbe {
    available: Option<i32>,
    requested: Mutex<Vec<i32>>,
}

impl SeasonProbe {
    fn new(available: Option<i32>) -> Self {
        Self {
            available,
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<i32> {
        self.requested.lock().unwrap().clone()
    }
}

impl DataSource for SeasonProbe {
    fn play_by_play(&self, season: i32) -> Result<PlayByPlay> {
        self.requested.lock().unwrap().push(season);
        if Some(season) == self.available {
            let plays = vec![PlayRow {
                posteam: Some("DAL".into()),
                defteam: Some("PHI".into()),
                rush_attempt: Some(1.0),
                yards_gained: Some(4.0),
                ..Default::default()
            }];
            return Ok(PlayByPlay::new(season, plays));
        }
        Err(anyhow!("season {season} not published"))
    }

    fn weekly_stats(&self, season: i32) -> Result<Vec<WeeklyStatRow>> {
        Err(anyhow!("no weekly stats for {season}"))
    }

    fn players(&self) -> Result<Vec<PlayerRecord>> {
        Err(anyhow!("players table unavailable"))
    }
}

/// Empty weekly tables that count how often each season is read.
#[derive(Default)]
struct WeeklyCounter {
    loads: Mutex<BTreeMap<i32, usize>>,
}

impl WeeklyCounter {
    fn loads(&self) -> BTreeMap<i32, usize> {
        self.loads.lock().unwrap().clone()
    }
}

impl DataSource for WeeklyCounter {
    fn play_by_play(&self, season: i32) -> Result<PlayByPlay> {
        Err(anyhow!("season {season} not published"))
    }

    fn weekly_stats(&self, season: i32) -> Result<Vec<WeeklyStatRow>> {
        *self.loads.lock().unwrap().entry(season).or_default() += 1;
        Ok(Vec::new())
    }

    fn players(&self) -> Result<Vec<PlayerRecord>> {
        Err(anyhow!("players table unavailable"))
    }
}

fn request(player: &str, stat: &str, line: f64) -> PredictionRequest {
    PredictionRequest::new(player, stat, line, "PHI", 2024).unwrap()
}

#[test]
fn fallback_requests_previous_season_exactly_once() {
    let probe = SeasonProbe::new(Some(2023));
    let registry = WeightRegistry::builtin();
    let result = Predictor::new(&probe, &registry)
        .predict(&request("CeeDee Lamb", "receiving yards", 80.5));

    assert_eq!(probe.requested(), vec![2024, 2023]);
    assert_eq!(result.season, 2023);
    assert_eq!(result.note("_pbp_source"), Some("No PBP for 2024; fell back to 2023"));
}

#[test]
fn no_data_anywhere_still_predicts() {
    let probe = SeasonProbe::new(None);
    let registry = WeightRegistry::builtin();
    let result =
        Predictor::new(&probe, &registry).predict(&request("Unknown Guy", "receptions", 4.5));

    assert_eq!(probe.requested(), vec![2024, 2023]);
    assert_eq!(result.season, 2024);
    assert_eq!(
        result.note("_pbp_source"),
        Some("No PBP available for 2024 (or 2023). Offline or data unavailable.")
    );
    // unknown position: generic pass/receive weights, then the always-on pair
    let order: Vec<&str> = result
        .contributions
        .iter()
        .map(|c| c.factor.as_str())
        .collect();
    assert_eq!(
        order,
        [
            "pass_defense",
            "oline_ranking",
            "pass_attempts",
            "targets",
            "recent_form",
            "vs_team_history"
        ]
    );
    for c in &result.contributions {
        assert_eq!(c.points, 0.0);
        assert!(result.note(&c.factor).unwrap().starts_with("Skipped:"), "{}", c.factor);
    }
    assert_eq!(result.over_probability, 0.5);
    assert_eq!(result.decision, Decision::Over);
}

#[test]
fn unmatched_stat_lines_are_treated_as_rushing() {
    let probe = SeasonProbe::new(None);
    let registry = WeightRegistry::builtin();
    let result = Predictor::new(&probe, &registry)
        .predict(&request("Harrison Butker", "field goals made", 1.5));
    assert_eq!(result.contributions[0].factor, "rush_defense");
}

#[test]
fn probabilities_complement_across_lines() {
    let rows: Vec<WeeklyStatRow> = (1..=10)
        .map(|week| WeeklyStatRow {
            player_display_name: "Saquon Barkley".into(),
            position: Some("RB".into()),
            team: Some("PHI".into()),
            season: 2024,
            week,
            opponent_team: Some(if week % 2 == 0 { "DAL" } else { "NYG" }.into()),
            stats: [
                ("rushing_yards".to_string(), 60.0 + 9.0 * week as f64),
                ("carries".to_string(), 14.0 + week as f64),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        })
        .collect();
    let source = InMemorySource::new().with_weekly(2024, rows);
    let registry = WeightRegistry::builtin();
    let predictor = Predictor::new(&source, &registry);

    let mut previous = f64::INFINITY;
    for line in [0.0, 0.5, 40.0, 85.5, 110.0, 250.0, 1e6] {
        let req =
            PredictionRequest::new("Saquon Barkley", "rushing_yards", line, "dal", 2024).unwrap();
        let result = predictor.predict(&req);
        assert_eq!(result.over_probability + result.under_probability, 1.0, "line {line}");
        assert!(result.over_probability > 0.0 && result.over_probability < 1.0);
        // a higher line never makes OVER more likely
        assert!(result.over_probability <= previous, "line {line}");
        previous = result.over_probability;
    }
}

#[test]
fn predict_rejects_bad_requests_before_loading() {
    let probe = SeasonProbe::new(Some(2024));
    assert_eq!(
        predict(&probe, "", "rushing_yards", 50.0, "PHI", 2024).unwrap_err(),
        RequestError::EmptyPlayer
    );
    assert_eq!(
        predict(&probe, "A", "rushing_yards", -3.0, "PHI", 2024).unwrap_err(),
        RequestError::InvalidLineValue(-3.0)
    );
    assert!(probe.requested().is_empty());

    let ok = predict(&probe, "A", "rushing_yards", 50.0, "PHI", 2024).unwrap();
    assert_eq!(ok.season, 2024);
    assert_eq!(probe.requested(), vec![2024]);
}

#[test]
fn batch_keeps_input_order() {
    let probe = SeasonProbe::new(Some(2024));
    let registry = WeightRegistry::builtin();
    let predictor = Predictor::new(&probe, &registry);
    let requests: Vec<PredictionRequest> = ["A", "B", "C", "D"]
        .iter()
        .map(|p| request(p, "rushing_yards", 50.0))
        .collect();
    let results = predictor.predict_batch(&requests);
    let players: Vec<&str> = results.iter().map(|r| r.player.as_str()).collect();
    assert_eq!(players, ["A", "B", "C", "D"]);
}

#[test]
fn batch_reads_weekly_history_once_per_season() {
    let source = WeeklyCounter::default();
    let registry = WeightRegistry::builtin();
    let predictor = Predictor::new(&source, &registry).with_history_from(2022);
    let requests: Vec<PredictionRequest> = ["A", "B", "C", "D"]
        .iter()
        .map(|p| request(p, "rushing_yards", 50.0))
        .collect();

    predictor.predict_batch(&requests);
    predictor.predict(&requests[0]);

    // 2022..=2024 once for the shared history; 2024 again for each request's
    // own recent-form table
    assert_eq!(
        source.loads(),
        BTreeMap::from([(2022, 1), (2023, 1), (2024, 6)])
    );
}
