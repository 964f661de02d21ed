use std::collections::BTreeMap;

use serde::Serialize;

use crate::play_by_play::{PlayByPlay, PlayRow, flag};
use crate::stat_line::Position;

const OLINE_EPSILON: f64 = 0.0001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefenseRow {
    pub team: String,
    pub rush_yards_allowed: f64,
    pub pass_yards_allowed: f64,
    pub total_yards_allowed: f64,
    pub points_allowed: f64,
    pub rush_rank: f64,
    pub pass_rank: f64,
    pub total_rank: f64,
    pub points_allowed_rank: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefensiveTable {
    pub rows: Vec<DefenseRow>,
}

impl DefensiveTable {
    pub fn get(&self, team: &str) -> Option<&DefenseRow> {
        self.rows.iter().find(|r| r.team == team)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffensiveLineRow {
    pub team: String,
    pub sacks_allowed: f64,
    pub tfl_allowed: f64,
    pub rush_yards: f64,
    /// (sacks + tackles for loss) per rush yard; lower is better.
    pub off_line_metric: f64,
    pub off_line_rank: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffensiveLineTable {
    pub rows: Vec<OffensiveLineRow>,
}

impl OffensiveLineTable {
    pub fn get(&self, team: &str) -> Option<&OffensiveLineRow> {
        self.rows.iter().find(|r| r.team == team)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Ascending rank where ties share the lowest rank ("min" method).
pub fn min_rank(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .map(|v| 1.0 + values.iter().filter(|other| *other < v).count() as f64)
        .collect()
}

fn yards(play: &PlayRow) -> f64 {
    play.yards_gained.filter(|y| y.is_finite()).unwrap_or(0.0)
}

fn play_points(play: &PlayRow) -> f64 {
    let mut pts = 0.0;
    if flag(play.touchdown) && play.td_team.is_some() {
        pts += 6.0;
    }
    if play.field_goal_result.as_deref() == Some("made") {
        pts += 3.0;
    }
    if play.extra_point_result.as_deref() == Some("good") {
        pts += 1.0;
    }
    if play.two_point_conv_result.as_deref() == Some("success") {
        pts += 2.0;
    }
    pts
}

/// Yards and points allowed per defense with league ranks (1 = fewest).
pub fn compute_defensive_stats(pbp: &PlayByPlay) -> DefensiveTable {
    #[derive(Default)]
    struct Acc {
        rush: f64,
        pass: f64,
        points: f64,
    }

    let mut by_team: BTreeMap<&str, Acc> = BTreeMap::new();
    for play in &pbp.plays {
        let Some(team) = play.defteam.as_deref() else {
            continue;
        };
        let acc = by_team.entry(team).or_default();
        if play.is_rush_attempt() {
            acc.rush += yards(play);
        }
        if play.is_pass_attempt() {
            acc.pass += yards(play);
        }
        acc.points += play_points(play);
    }

    let teams: Vec<&str> = by_team.keys().copied().collect();
    let rush: Vec<f64> = by_team.values().map(|a| a.rush).collect();
    let pass: Vec<f64> = by_team.values().map(|a| a.pass).collect();
    let total: Vec<f64> = by_team.values().map(|a| a.rush + a.pass).collect();
    let points: Vec<f64> = by_team.values().map(|a| a.points).collect();

    let rush_rank = min_rank(&rush);
    let pass_rank = min_rank(&pass);
    let total_rank = min_rank(&total);
    let points_rank = min_rank(&points);

    let rows = teams
        .iter()
        .enumerate()
        .map(|(i, team)| DefenseRow {
            team: (*team).to_string(),
            rush_yards_allowed: rush[i],
            pass_yards_allowed: pass[i],
            total_yards_allowed: total[i],
            points_allowed: points[i],
            rush_rank: rush_rank[i],
            pass_rank: pass_rank[i],
            total_rank: total_rank[i],
            points_allowed_rank: points_rank[i],
        })
        .collect();
    DefensiveTable { rows }
}

pub fn compute_offensive_line_metrics(pbp: &PlayByPlay) -> OffensiveLineTable {
    #[derive(Default)]
    struct Acc {
        sacks: f64,
        tfl: f64,
        rush_yards: f64,
    }

    let mut by_team: BTreeMap<&str, Acc> = BTreeMap::new();
    for play in &pbp.plays {
        let Some(team) = play.posteam.as_deref() else {
            continue;
        };
        let sack = flag(play.sack);
        let rush = play.is_rush_attempt();
        if !sack && !rush {
            continue;
        }
        let acc = by_team.entry(team).or_default();
        if sack {
            acc.sacks += 1.0;
        }
        if rush {
            acc.rush_yards += yards(play);
            if play.yards_gained.is_some_and(|y| y < 0.0) {
                acc.tfl += 1.0;
            }
        }
    }

    let metrics: Vec<f64> = by_team
        .values()
        .map(|a| (a.sacks + a.tfl) / (a.rush_yards + OLINE_EPSILON))
        .collect();
    let ranks = min_rank(&metrics);
    let rows = by_team
        .iter()
        .enumerate()
        .map(|(i, (team, a))| OffensiveLineRow {
            team: (*team).to_string(),
            sacks_allowed: a.sacks,
            tfl_allowed: a.tfl,
            rush_yards: a.rush_yards,
            off_line_metric: metrics[i],
            off_line_rank: ranks[i],
        })
        .collect();
    OffensiveLineTable { rows }
}

/// `(pass_rate, rush_rate)` over every play the team ran on offense.
pub fn compute_offensive_rates(pbp: &PlayByPlay, team: &str) -> (f64, f64) {
    let mut total = 0usize;
    let mut pass = 0usize;
    let mut rush = 0usize;
    for play in pbp.plays.iter().filter(|p| p.offense_is(team)) {
        total += 1;
        if play.is_pass_attempt() {
            pass += 1;
        }
        if play.is_rush_attempt() {
            rush += 1;
        }
    }
    if total == 0 {
        return (0.0, 0.0);
    }
    (pass as f64 / total as f64, rush as f64 / total as f64)
}

/// Share of the team's red-zone opportunities that went to the player:
/// targets for WR/TE, touches for RB, pass attempts for QB.
pub fn red_zone_usage(
    pbp: &PlayByPlay,
    player_id: &str,
    position: &Position,
    team: &str,
) -> Result<f64, String> {
    let rz = pbp.plays.iter().filter(|p| p.is_red_zone());
    let id = Some(player_id);

    let (player_plays, team_plays) = match position {
        Position::Wr | Position::Te => {
            let passes: Vec<&PlayRow> = rz.filter(|p| p.play_type_is("pass")).collect();
            (
                passes
                    .iter()
                    .filter(|p| p.receiver_player_id.as_deref() == id)
                    .count(),
                passes.iter().filter(|p| p.offense_is(team)).count(),
            )
        }
        Position::Rb => {
            let plays: Vec<&PlayRow> = rz
                .filter(|p| p.play_type_is("pass") || p.play_type_is("run"))
                .collect();
            (
                plays
                    .iter()
                    .filter(|p| {
                        p.receiver_player_id.as_deref() == id || p.rusher_player_id.as_deref() == id
                    })
                    .count(),
                plays.iter().filter(|p| p.offense_is(team)).count(),
            )
        }
        Position::Qb => {
            let plays: Vec<&PlayRow> = rz.collect();
            (
                plays
                    .iter()
                    .filter(|p| p.play_type_is("pass") && p.passer_player_id.as_deref() == id)
                    .count(),
                plays.iter().filter(|p| p.offense_is(team)).count(),
            )
        }
        Position::Other(code) => {
            return Err(format!("unsupported position '{code}' for red zone usage"));
        }
    };

    if team_plays == 0 {
        return Ok(0.0);
    }
    Ok(player_plays as f64 / team_plays as f64)
}

/// Receiver-corps quality in [0, 1]: concentration of yards in the top three
/// receivers, depth of targets, and red-zone volume.
pub fn weapons_grade(pbp: &PlayByPlay, team: &str) -> f64 {
    let plays: Vec<&PlayRow> = pbp.plays.iter().filter(|p| p.offense_is(team)).collect();
    if plays.is_empty() {
        return 0.5;
    }

    let top3_share = if pbp.has_column("receiver_player_id") && pbp.has_column("yards_gained") {
        let mut by_receiver: BTreeMap<&str, f64> = BTreeMap::new();
        for play in &plays {
            if let Some(rid) = play.receiver_player_id.as_deref() {
                *by_receiver.entry(rid).or_default() += yards(play);
            }
        }
        let mut totals: Vec<f64> = by_receiver.into_values().collect();
        totals.sort_by(|a, b| b.total_cmp(a));
        let top3: f64 = totals.iter().take(3).sum();
        let total: f64 = totals.iter().sum();
        top3 / total.max(1.0)
    } else {
        0.5
    };

    let air: Vec<f64> = plays
        .iter()
        .filter_map(|p| p.air_yards)
        .filter(|v| v.is_finite())
        .collect();
    let air_score = if air.is_empty() {
        0.5
    } else {
        (mean(&air) / 20.0).min(1.0)
    };

    let rz_share = if pbp.has_column("yardline_100") {
        plays.iter().filter(|p| p.is_red_zone()).count() as f64 / plays.len().max(1) as f64
    } else {
        0.5
    };

    (0.5 * top3_share + 0.3 * air_score + 0.2 * rz_share).clamp(0.0, 1.0)
}

fn passes_by<'a>(pbp: &'a PlayByPlay, player_id: &str) -> Vec<&'a PlayRow> {
    pbp.plays
        .iter()
        .filter(|p| p.passer_player_id.as_deref() == Some(player_id))
        .collect()
}

pub fn average_air_yards(pbp: &PlayByPlay, player_id: &str) -> Result<f64, String> {
    let passes = passes_by(pbp, player_id);
    if passes.is_empty() || !pbp.has_column("air_yards") {
        return Err("no air yards data available".to_string());
    }
    let values: Vec<f64> = passes
        .iter()
        .filter_map(|p| p.air_yards)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err("no air yards data available".to_string());
    }
    Ok(mean(&values))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSummary {
    pub pressured: usize,
    pub dropbacks: usize,
    pub rate: f64,
}

/// Share of the passer's dropbacks with a sack, hit or hurry.
pub fn pressure_rate(pbp: &PlayByPlay, player_id: &str) -> Result<PressureSummary, String> {
    let passes = passes_by(pbp, player_id);
    if passes.is_empty() {
        return Err("no pass attempts found".to_string());
    }
    let has_sack = pbp.has_column("sack");
    let has_hit = pbp.has_column("qb_hit");
    let has_hurry = pbp.has_column("hurry");
    if !has_sack && !has_hit && !has_hurry {
        return Err("no pressure data available".to_string());
    }

    let pressured = passes
        .iter()
        .filter(|p| {
            let mut sum = 0.0;
            if has_sack {
                sum += p.sack.unwrap_or(0.0);
            }
            if has_hit {
                sum += p.qb_hit.unwrap_or(0.0);
            }
            if has_hurry {
                sum += p.hurry.unwrap_or(0.0);
            }
            sum > 0.0
        })
        .count();
    let dropbacks = passes.len();
    Ok(PressureSummary {
        pressured,
        dropbacks,
        rate: pressured as f64 / dropbacks as f64,
    })
}

/// `(touchdowns, interceptions)` thrown by the passer.
pub fn touchdowns_and_interceptions(
    pbp: &PlayByPlay,
    player_id: &str,
) -> Result<(f64, f64), String> {
    if !pbp.has_column("touchdown") || !pbp.has_column("interception") {
        return Err("touchdown/interception columns missing".to_string());
    }
    let passes = passes_by(pbp, player_id);
    if passes.is_empty() {
        return Err("no pass attempts found".to_string());
    }
    let tds = passes.iter().filter_map(|p| p.touchdown).sum();
    let ints = passes.iter().filter_map(|p| p.interception).sum();
    Ok((tds, ints))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitzSummary {
    pub pressures: f64,
    pub pass_plays: usize,
    pub rate: f64,
}

/// Sacks plus QB hits per pass play with `team` on defense.
pub fn blitz_rate(pbp: &PlayByPlay, team: &str) -> Result<BlitzSummary, String> {
    if !pbp.plays.iter().any(|p| p.defense_is(team)) {
        return Err(format!("{team} not in PBP data"));
    }
    let plays: Vec<&PlayRow> = pbp
        .plays
        .iter()
        .filter(|p| p.defense_is(team) && p.is_pass_attempt())
        .collect();
    if plays.is_empty() {
        return Err("no passing plays against team".to_string());
    }
    let sacks: f64 = plays.iter().filter_map(|p| p.sack).sum();
    let hits: f64 = plays.iter().filter_map(|p| p.qb_hit).sum();
    let pressures = sacks + hits;
    Ok(BlitzSummary {
        pressures,
        pass_plays: plays.len(),
        rate: pressures / plays.len() as f64,
    })
}

pub fn average_yards_after_catch(pbp: &PlayByPlay, player_id: &str) -> Result<f64, String> {
    if pbp.is_empty() || !pbp.has_column("yards_after_catch") {
        return Err("PBP data or 'yards_after_catch' not available".to_string());
    }
    if !pbp.has_column("receiver_player_id") {
        return Err("'receiver_player_id' column not found".to_string());
    }
    let values: Vec<f64> = pbp
        .plays
        .iter()
        .filter(|p| p.receiver_player_id.as_deref() == Some(player_id))
        .filter_map(|p| p.yards_after_catch)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        return Err("no receptions found for player".to_string());
    }
    Ok(mean(&values))
}

/// Season summary for one team, as shown by the `team` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProfile {
    pub team: String,
    pub season: i32,
    pub pass_rate: f64,
    pub rush_rate: f64,
    pub off_line: Option<OffensiveLineRow>,
    pub defense: DefenseRow,
}

pub fn team_profile(pbp: &PlayByPlay, team: &str) -> Option<TeamProfile> {
    if !pbp.teams().contains(team) {
        return None;
    }
    let defense = compute_defensive_stats(pbp).get(team)?.clone();
    let off_line = compute_offensive_line_metrics(pbp).get(team).cloned();
    let (pass_rate, rush_rate) = compute_offensive_rates(pbp, team);
    Some(TeamProfile {
        team: team.to_string(),
        season: pbp.season,
        pass_rate,
        rush_rate,
        off_line,
        defense,
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rush(off: &str, def: &str, yards: f64, rusher: &str) -> PlayRow {
        PlayRow {
            posteam: Some(off.into()),
            defteam: Some(def.into()),
            play_type: Some("run".into()),
            rush_attempt: Some(1.0),
            pass_attempt: Some(0.0),
            yards_gained: Some(yards),
            rusher_player_id: Some(rusher.into()),
            yardline_100: Some(50.0),
            ..Default::default()
        }
    }

    fn pass(off: &str, def: &str, yards: f64, passer: &str, receiver: &str) -> PlayRow {
        PlayRow {
            posteam: Some(off.into()),
            defteam: Some(def.into()),
            play_type: Some("pass".into()),
            pass_attempt: Some(1.0),
            rush_attempt: Some(0.0),
            yards_gained: Some(yards),
            passer_player_id: Some(passer.into()),
            receiver_player_id: Some(receiver.into()),
            air_yards: Some(8.0),
            yards_after_catch: Some(4.0),
            yardline_100: Some(50.0),
            sack: Some(0.0),
            qb_hit: Some(0.0),
            touchdown: Some(0.0),
            interception: Some(0.0),
            ..Default::default()
        }
    }

    #[test]
    fn min_rank_shares_ties() {
        assert_eq!(min_rank(&[10.0, 5.0, 10.0, 1.0]), vec![3.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn defensive_table_ranks_fewest_yards_first() {
        let pbp = PlayByPlay::new(
            2024,
            vec![
                rush("ATL", "KC", 3.0, "r1"),
                rush("ATL", "SF", 12.0, "r1"),
                pass("ATL", "KC", 20.0, "q1", "w1"),
                pass("ATL", "SF", 5.0, "q1", "w1"),
            ],
        );
        let table = compute_defensive_stats(&pbp);
        let kc = table.get("KC").unwrap();
        let sf = table.get("SF").unwrap();
        assert_eq!(kc.rush_rank, 1.0);
        assert_eq!(sf.rush_rank, 2.0);
        assert_eq!(sf.pass_rank, 1.0);
        assert_eq!(kc.total_yards_allowed, 23.0);
        assert_eq!(sf.total_rank, 1.0);
    }

    #[test]
    fn points_allowed_counts_scoring_plays() {
        let mut td = pass("ATL", "KC", 20.0, "q1", "w1");
        td.touchdown = Some(1.0);
        td.td_team = Some("ATL".into());
        let xp = PlayRow {
            defteam: Some("KC".into()),
            extra_point_result: Some("good".into()),
            ..Default::default()
        };
        let fg = PlayRow {
            defteam: Some("SF".into()),
            field_goal_result: Some("made".into()),
            ..Default::default()
        };
        let pbp = PlayByPlay::new(2024, vec![td, xp, fg]);
        let table = compute_defensive_stats(&pbp);
        assert_eq!(table.get("KC").unwrap().points_allowed, 7.0);
        assert_eq!(table.get("SF").unwrap().points_allowed, 3.0);
        assert_eq!(table.get("SF").unwrap().points_allowed_rank, 1.0);
    }

    #[test]
    fn oline_metric_prefers_fewer_negative_plays() {
        let mut sack = pass("DAL", "NYG", -7.0, "q2", "w2");
        sack.sack = Some(1.0);
        let pbp = PlayByPlay::new(
            2024,
            vec![
                rush("ATL", "KC", 10.0, "r1"),
                rush("DAL", "NYG", 10.0, "r2"),
                rush("DAL", "NYG", -2.0, "r2"),
                sack,
            ],
        );
        let table = compute_offensive_line_metrics(&pbp);
        assert_eq!(table.get("ATL").unwrap().off_line_rank, 1.0);
        let dal = table.get("DAL").unwrap();
        assert_eq!(dal.off_line_rank, 2.0);
        assert_eq!(dal.sacks_allowed, 1.0);
        assert_eq!(dal.tfl_allowed, 1.0);
    }

    #[test]
    fn offensive_rates() {
        let pbp = PlayByPlay::new(
            2024,
            vec![
                rush("ATL", "KC", 3.0, "r1"),
                pass("ATL", "KC", 5.0, "q1", "w1"),
                pass("ATL", "KC", 5.0, "q1", "w1"),
                PlayRow {
                    posteam: Some("ATL".into()),
                    play_type: Some("punt".into()),
                    ..Default::default()
                },
            ],
        );
        let (p, r) = compute_offensive_rates(&pbp, "ATL");
        assert!((p - 0.5).abs() < 1e-12);
        assert!((r - 0.25).abs() < 1e-12);
        assert_eq!(compute_offensive_rates(&pbp, "NE"), (0.0, 0.0));
    }

    #[test]
    fn red_zone_usage_by_position() {
        let mut a = pass("ATL", "KC", 5.0, "q1", "w1");
        a.yardline_100 = Some(10.0);
        let mut b = pass("ATL", "KC", 5.0, "q1", "w2");
        b.yardline_100 = Some(10.0);
        let mut c = rush("ATL", "KC", 2.0, "r1");
        c.yardline_100 = Some(5.0);
        let pbp = PlayByPlay::new(2024, vec![a, b, c]);

        let wr = red_zone_usage(&pbp, "w1", &Position::Wr, "ATL").unwrap();
        assert!((wr - 0.5).abs() < 1e-12);
        let rb = red_zone_usage(&pbp, "r1", &Position::Rb, "ATL").unwrap();
        assert!((rb - 1.0 / 3.0).abs() < 1e-12);
        let qb = red_zone_usage(&pbp, "q1", &Position::Qb, "ATL").unwrap();
        assert!((qb - 2.0 / 3.0).abs() < 1e-12);
        assert!(red_zone_usage(&pbp, "k1", &Position::Other("K".into()), "ATL").is_err());
    }

    #[test]
    fn weapons_grade_is_bounded_and_neutral_without_plays() {
        let pbp = PlayByPlay::new(2024, vec![pass("ATL", "KC", 15.0, "q1", "w1")]);
        let g = weapons_grade(&pbp, "ATL");
        assert!((0.0..=1.0).contains(&g));
        // one receiver owns every yard, air 8/20, no red-zone plays
        assert!((g - (0.5 + 0.3 * 0.4)).abs() < 1e-12);
        assert_eq!(weapons_grade(&pbp, "NE"), 0.5);
    }

    #[test]
    fn pressure_and_blitz() {
        let mut hit = pass("ATL", "KC", 0.0, "q1", "w1");
        hit.qb_hit = Some(1.0);
        let mut sack = pass("ATL", "KC", -6.0, "q1", "w1");
        sack.sack = Some(1.0);
        let clean = pass("ATL", "KC", 6.0, "q1", "w1");
        let clean2 = pass("ATL", "KC", 6.0, "q1", "w1");
        let pbp = PlayByPlay::new(2024, vec![hit, sack, clean, clean2]);

        let p = pressure_rate(&pbp, "q1").unwrap();
        assert_eq!(p.pressured, 2);
        assert_eq!(p.dropbacks, 4);
        assert!((p.rate - 0.5).abs() < 1e-12);
        assert!(pressure_rate(&pbp, "nobody").is_err());

        let b = blitz_rate(&pbp, "KC").unwrap();
        assert_eq!(b.pass_plays, 4);
        assert!((b.rate - 0.5).abs() < 1e-12);
        assert!(blitz_rate(&pbp, "ATL").is_err());
    }

    #[test]
    fn pressure_needs_some_pressure_column() {
        let pbp = PlayByPlay::with_columns(
            2024,
            vec![pass("ATL", "KC", 6.0, "q1", "w1")],
            &["passer_player_id"],
        );
        assert_eq!(
            pressure_rate(&pbp, "q1").unwrap_err(),
            "no pressure data available"
        );
    }

    #[test]
    fn team_profile_requires_known_team() {
        let pbp = PlayByPlay::new(2024, vec![rush("ATL", "KC", 4.0, "r1")]);
        assert!(team_profile(&pbp, "NE").is_none());
        let kc = team_profile(&pbp, "KC").unwrap();
        assert_eq!(kc.defense.rush_yards_allowed, 4.0);
        assert!(kc.off_line.is_none());
        let atl = team_profile(&pbp, "ATL");
        // ATL never appears on defense
        assert!(atl.is_none());
    }
}
