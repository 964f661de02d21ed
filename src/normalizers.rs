//! Each function turns one raw observation into a [`Signal`] in [-1, 1].
//! None of them fail: missing inputs come back as `Signal::Skipped`.

use crate::pbp_metrics::{
    BlitzSummary, DefensiveTable, OffensiveLineTable, PressureSummary, compute_offensive_rates,
};
use crate::play_by_play::PlayByPlay;
use crate::player_stats::PlayerRecord;
use crate::signal::{Signal, clip_unit, linear_signal, rank_signal, relative_signal};
use crate::stat_line::{Position, StatContext, StatLine};
use crate::tiers::{DefenseKind, DefenseTierTables, Tier, rank_or_default};

pub const TOTAL_TEAMS: u32 = 32;

const TIER_CENTER: f64 = 65.0;
const TIER_SCALE: f64 = 25.0;
const RUSH_RATE_CENTER: f64 = 0.45;
const PASS_RATE_CENTER: f64 = 0.55;
const USAGE_SCALE: f64 = 0.25;
const RED_ZONE_CENTER: f64 = 0.20;
const RED_ZONE_SCALE: f64 = 0.20;
const AIR_YARDS_CENTER: f64 = 7.0;
const AIR_YARDS_SCALE: f64 = 7.0;
const PRESSURE_CENTER: f64 = 0.25;
const PRESSURE_SCALE: f64 = 0.25;
const TD_INT_CENTER: f64 = 1.5;
const TD_INT_SCALE: f64 = 1.5;
const YAC_CENTER: f64 = 7.0;
const YAC_SCALE: f64 = 7.0;
const QB_BASE_HEIGHT: f64 = 72.0;
const QB_HEIGHT_SCALE: f64 = 6.0;
const QB_BASE_WEIGHT: f64 = 210.0;
const QB_WEIGHT_SCALE: f64 = 40.0;

/// Last-ten rushing volume used by the carry-based factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecentRushing {
    pub yards: f64,
    pub carries: f64,
}

/// Tougher tiers give a more negative signal.
pub fn tier_signal(rank: f64, kind: DefenseKind, tiers: &DefenseTierTables) -> (Tier, f64, f64) {
    let tier = Tier::for_rank(rank);
    let score = tiers.table(kind).score(tier);
    let norm = -linear_signal(score, TIER_CENTER, TIER_SCALE);
    (tier, score, norm)
}

pub fn defense_difficulty(
    opponent: &str,
    defense: Option<&DefensiveTable>,
    ctx: StatContext,
    tiers: &DefenseTierTables,
) -> Signal {
    let Some(table) = defense.filter(|t| !t.is_empty()) else {
        return Signal::skipped("no defensive data (offline or unavailable)");
    };
    let Some(row) = table.get(opponent) else {
        return Signal::skipped(format!("defensive row missing for {opponent}"));
    };

    let (raw_rank, kind) = match ctx {
        StatContext::Rush => (row.rush_rank, DefenseKind::Rushing),
        StatContext::Pass | StatContext::Receive => (row.pass_rank, DefenseKind::Passing),
        StatContext::Other => (row.total_rank, DefenseKind::Points),
    };
    let rank = rank_or_default(Some(raw_rank));
    let (tier, score, norm) = tier_signal(rank, kind, tiers);
    Signal::active(
        norm,
        format!(
            "{}:{} (rank={}, score={}, norm={norm:.2})",
            kind.table_name(),
            tier.as_str(),
            rank as i64,
            score
        ),
    )
}

pub fn oline_strength(team: Option<&str>, oline: Option<&OffensiveLineTable>) -> Signal {
    let Some(team) = team else {
        return Signal::skipped("unknown player team for O-line");
    };
    let Some(row) = oline.and_then(|t| t.get(team)) else {
        return Signal::skipped("no offensive line metrics (offline or unavailable)");
    };
    let norm = rank_signal(row.off_line_rank, TOTAL_TEAMS);
    Signal::active(
        norm,
        format!("oline_rank={}, norm={norm:.2}", row.off_line_rank as i64),
    )
}

pub fn usage_rate(pbp: Option<&PlayByPlay>, team: Option<&str>, ctx: StatContext) -> Signal {
    let (Some(pbp), Some(team)) = (pbp, team) else {
        return Signal::skipped("no PBP usage rates (offline or unavailable)");
    };
    if !pbp.has_columns(&["posteam", "pass_attempt", "rush_attempt"]) {
        return Signal::skipped("no PBP usage rates (offline or unavailable)");
    }
    let (pass_rate, rush_rate) = compute_offensive_rates(pbp, team);
    if ctx == StatContext::Rush {
        let norm = linear_signal(rush_rate, RUSH_RATE_CENTER, USAGE_SCALE);
        Signal::active(
            norm,
            format!("rush_rate={:.2}%, norm={norm:.2}", rush_rate * 100.0),
        )
    } else {
        let norm = linear_signal(pass_rate, PASS_RATE_CENTER, USAGE_SCALE);
        Signal::active(
            norm,
            format!("pass_rate={:.2}%, norm={norm:.2}", pass_rate * 100.0),
        )
    }
}

pub fn recent_form(recent_avg: Result<f64, String>, line_value: f64) -> Signal {
    match recent_avg {
        Ok(avg) => {
            let rel = relative_signal(avg, line_value);
            Signal::active(
                rel,
                format!("L10_avg={avg:.2}, line={line_value}, rel={rel:.2}"),
            )
        }
        Err(reason) => Signal::skipped(format!("recent form unavailable ({reason})")),
    }
}

pub fn vs_team_history(vs_avg: Result<f64, String>, opponent: &str, line_value: f64) -> Signal {
    match vs_avg {
        Ok(avg) => {
            let rel = relative_signal(avg, line_value);
            Signal::active(
                rel,
                format!("vs_{opponent}_avg={avg:.2}, line={line_value}, rel={rel:.2}"),
            )
        }
        Err(reason) => Signal::skipped(format!("vs-team history unavailable ({reason})")),
    }
}

/// Recent yards per carry against the per-carry pace the line implies at
/// the same volume.
pub fn yards_per_carry(recent: Result<RecentRushing, String>, line_value: f64) -> Signal {
    Signal::from_result(recent.and_then(|r| {
        if r.carries == 0.0 {
            return Err("no recent carries".to_string());
        }
        let recent_ypc = r.yards / r.carries;
        let line_ypc = line_value / r.carries;
        let rel = relative_signal(recent_ypc, line_ypc);
        Ok(Signal::active(
            rel,
            format!("YPC_recent={recent_ypc:.2}, line_YPC={line_ypc:.2}, rel={rel:.2}"),
        ))
    }))
}

/// Recent carries against the carries needed to reach the line at the
/// recent yards-per-carry. Only meaningful for rushing lines.
pub fn carries(recent: Result<RecentRushing, String>, stat: &StatLine, line_value: f64) -> Signal {
    Signal::from_result(recent.and_then(|r| {
        if r.carries == 0.0 {
            return Err("no recent carries".to_string());
        }
        if !stat.as_str().contains("rushing") {
            return Err(format!("carries not relevant for {stat}"));
        }
        let ypc = r.yards / r.carries;
        if ypc == 0.0 {
            return Err("no recent rushing efficiency".to_string());
        }
        let implied = line_value / ypc;
        let rel = relative_signal(r.carries, implied);
        Ok(Signal::active(
            rel,
            format!(
                "L10_carries={:.2}, implied_line_carries={implied:.2}, YPC={ypc:.2}, rel={rel:.2}",
                r.carries
            ),
        ))
    }))
}

pub fn rush_attempts(
    recent: Result<RecentRushing, String>,
    stat: &StatLine,
    line_value: f64,
) -> Signal {
    Signal::from_result(recent.and_then(|r| {
        if r.carries == 0.0 {
            return Err("no recent carries".to_string());
        }
        if !stat.as_str().contains("rush") {
            return Err(format!(
                "stat_line not relevant for rushing attempts ({stat})"
            ));
        }
        let ypc = r.yards / r.carries.max(1e-6);
        let implied = line_value / ypc.max(1e-6);
        let rel = relative_signal(r.carries, implied);
        Ok(Signal::active(
            rel,
            format!(
                "L10_carries={:.2}, implied_line_attempts={implied:.2}, YPC={ypc:.2}, rel={rel:.2}",
                r.carries
            ),
        ))
    }))
}

pub fn red_zone_usage(rate: Result<f64, String>) -> Signal {
    Signal::from_result(rate.map(|rate| {
        let norm = linear_signal(rate, RED_ZONE_CENTER, RED_ZONE_SCALE);
        Signal::active(
            norm,
            format!("red_zone_rate={:.2}%, norm={norm:.2}", rate * 100.0),
        )
    }))
}

pub fn points_allowed(rank: Option<f64>, tiers: &DefenseTierTables) -> Signal {
    let Some(rank) = rank else {
        return Signal::skipped("no defensive data (offline or unavailable)");
    };
    let rank = rank_or_default(Some(rank));
    let (tier, score, norm) = tier_signal(rank, DefenseKind::Points, tiers);
    Signal::active(
        norm,
        format!(
            "{}:{} (rank={}, score={}, norm={norm:.2})",
            DefenseKind::Points.table_name(),
            tier.as_str(),
            rank as i64,
            score
        ),
    )
}

/// Grade is already on [0, 1] and is used as-is.
pub fn weapons_grade(position: Option<&Position>, grade: Result<f64, String>) -> Signal {
    if position != Some(&Position::Qb) {
        return Signal::skipped("not applicable");
    }
    match grade {
        Ok(g) => Signal::active(g, format!("weapons_grade={g:.2}")),
        Err(reason) => Signal::skipped(format!("weapons grade calculation failed ({reason})")),
    }
}

pub fn air_yards(avg: Result<f64, String>) -> Signal {
    Signal::from_result(avg.map(|avg| {
        let norm = linear_signal(avg, AIR_YARDS_CENTER, AIR_YARDS_SCALE);
        Signal::active(norm, format!("avg_air_yards={avg:.2}, norm={norm:.2}"))
    }))
}

pub fn pressure_rate(summary: Result<PressureSummary, String>) -> Signal {
    Signal::from_result(summary.map(|s| {
        let norm = linear_signal(s.rate, PRESSURE_CENTER, PRESSURE_SCALE);
        Signal::active(
            norm,
            format!(
                "pressured={}/{}, pressure_rate={:.2}, norm={norm:.2}",
                s.pressured, s.dropbacks, s.rate
            ),
        )
    }))
}

/// Interceptions are floored at one so a clean season does not divide by
/// zero.
pub fn td_int_ratio(counts: Result<(f64, f64), String>) -> Signal {
    Signal::from_result(counts.map(|(tds, ints)| {
        let ratio = tds / ints.max(1.0);
        let norm = linear_signal(ratio, TD_INT_CENTER, TD_INT_SCALE);
        Signal::active(
            norm,
            format!("TDs={tds}, INTs={ints}, ratio={ratio:.2}, norm={norm:.2}"),
        )
    }))
}

pub fn blitz_rate(team: Option<&str>, summary: Result<BlitzSummary, String>) -> Signal {
    let Some(team) = team else {
        return Signal::skipped("unknown team for blitz rate");
    };
    Signal::from_result(summary.map(|s| {
        let norm = linear_signal(s.rate, PRESSURE_CENTER, PRESSURE_SCALE);
        Signal::active(
            norm,
            format!(
                "team={team}, pressures={}, pass_plays={}, raw_rate={:.2}, norm={norm:.2}",
                s.pressures, s.pass_plays, s.rate
            ),
        )
    }))
}

pub fn yards_after_catch(avg: Result<f64, String>) -> Signal {
    Signal::from_result(avg.map(|avg| {
        let norm = linear_signal(avg, YAC_CENTER, YAC_SCALE);
        Signal::active(norm, format!("avg_yac={avg:.2}, norm={norm:.2}"))
    }))
}

/// Height and weight above a 72in / 210lb baseline, averaged.
pub fn qb_size(record: Option<&PlayerRecord>) -> Signal {
    let Some(player) = record else {
        return Signal::skipped("not a QB or player not found");
    };
    let is_qb = player
        .position
        .as_deref()
        .and_then(Position::parse)
        .is_some_and(|p| p == Position::Qb);
    if !is_qb {
        return Signal::skipped("not a QB or player not found");
    }
    let (Some(height), Some(weight)) = (player.height, player.weight) else {
        return Signal::skipped("QB size calculation failed (missing height or weight)");
    };
    let metric = (height - QB_BASE_HEIGHT) / QB_HEIGHT_SCALE
        + (weight - QB_BASE_WEIGHT) / QB_WEIGHT_SCALE;
    let norm = clip_unit(metric / 2.0);
    Signal::active(
        norm,
        format!("height={height}, weight={weight}, size_norm={norm:.2}"),
    )
}
