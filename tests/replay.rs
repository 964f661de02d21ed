use std::path::Path;

use nfl_overunder::replay::ReplayCase;
use nfl_overunder::weights::WeightRegistry;
use nfl_overunder::{Decision, PredictionRequest, Predictor};

fn case() -> ReplayCase {
    ReplayCase::load(Path::new("tests/fixtures/replay_case.json")).expect("fixture loads")
}

#[test]
fn replay_falls_back_to_previous_pbp_season() {
    let result = case().run(&WeightRegistry::builtin()).unwrap();

    assert_eq!(result.season, 2023);
    assert_eq!(
        result.note("_pbp_source"),
        Some("No PBP for 2024; fell back to 2023")
    );
    assert_eq!(result.stat_line.as_str(), "rushing_yards");
    assert_eq!(result.opponent, "KC");
}

#[test]
fn replay_rb_rushing_breakdown() {
    let result = case().run(&WeightRegistry::builtin()).unwrap();

    let order: Vec<&str> = result
        .contributions
        .iter()
        .map(|c| c.factor.as_str())
        .collect();
    assert_eq!(
        order,
        [
            "rush_defense",
            "oline_ranking",
            "rush_rate",
            "yards_per_carry",
            "carries",
            "recent_form",
            "vs_team_history"
        ]
    );

    // KC allowed the 4th fewest rush yards: top_5, a full UNDER signal against
    // a negative weight.
    assert!(
        result
            .note("rush_defense")
            .unwrap()
            .starts_with("defensive_rushing_factors:top_5 (rank=4, score=90")
    );
    assert!(result.contribution("rush_defense").unwrap() > 0.0);
    assert!(result.note("oline_ranking").unwrap().starts_with("oline_rank=1"));
    assert_eq!(
        result.note("recent_form"),
        Some("L10_avg=97.60, line=85.5, rel=0.14")
    );
    // 89 and 60 against KC average below the line
    assert!(result.note("vs_team_history").unwrap().starts_with("vs_KC_avg=74.50"));
    assert!(result.contribution("vs_team_history").unwrap() < 0.0);

    assert_eq!(result.over_probability + result.under_probability, 1.0);
    assert!(result.over_probability > 0.5);
    assert_eq!(result.decision, Decision::Over);
}

#[test]
fn replay_quarterback_touchdowns_use_pass_factors() {
    let case = case();
    let registry = WeightRegistry::builtin();
    let request = PredictionRequest::new("Kirk Cousins", "passing tds", 1.5, "KC", 2024).unwrap();
    let result = Predictor::new(&case.data, &registry)
        .with_history_from(2023)
        .predict(&request);

    assert!(result.note("weapons_grade").unwrap().starts_with("weapons_grade="));
    // 7.0 air yards on every attempt sits on the center
    assert_eq!(result.contribution("air_yards"), Some(0.0));
    assert!(result.note("air_yards").unwrap().starts_with("avg_air_yards=7.00"));
    // one of four ATL red-zone plays was his pass attempt
    assert!(
        result
            .note("red_zone_usage")
            .unwrap()
            .starts_with("red_zone_rate=25.00%, norm=0.25")
    );
    // no weekly rows for him in any season
    assert!(result.note("recent_form").unwrap().starts_with("L10_avg=0.00"));
    assert!(result.contribution("rush_defense").is_none());
}

#[test]
fn replay_is_deterministic() {
    let case = case();
    let registry = WeightRegistry::builtin();
    let a = case.run(&registry).unwrap();
    let b = case.run(&registry).unwrap();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
