use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Datelike;
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::composer::{Composed, Contribution, LogitComposer};
use crate::config::DEFAULT_HISTORY_FIRST_SEASON;
use crate::error::RequestError;
use crate::fallback::load_pbp_with_fallback;
use crate::normalizers::{self, RecentRushing};
use crate::pbp_metrics::{
    self, DefensiveTable, OffensiveLineTable, compute_defensive_stats,
    compute_offensive_line_metrics,
};
use crate::play_by_play::PlayByPlay;
use crate::player_stats::{
    PlayerRecord, WeeklyStatRow, career_average_vs_opponent, find_player, position_of_player,
    recent_average, resolve_player_id, team_of_player,
};
use crate::signal::Signal;
use crate::source::DataSource;
use crate::stat_line::{Position, StatContext, StatLine};
use crate::weights::{WeightRegistry, global_registry};

pub const FIRST_SUPPORTED_SEASON: i32 = 1999;
pub const PBP_SOURCE_NOTE: &str = "_pbp_source";
pub const RECENT_FORM: &str = "recent_form";
pub const VS_TEAM_HISTORY: &str = "vs_team_history";
const RECENT_FORM_WEIGHT: f64 = 0.9;
const VS_TEAM_WEIGHT: f64 = 0.6;

/// A validated prediction request. Construction is the only place a
/// prediction can be rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub player: String,
    pub stat_line: StatLine,
    pub line_value: f64,
    pub opponent: String,
    pub season: i32,
}

impl PredictionRequest {
    pub fn new(
        player: &str,
        stat_line: &str,
        line_value: f64,
        opponent: &str,
        season: i32,
    ) -> Result<Self, RequestError> {
        let player = player.trim();
        if player.is_empty() {
            return Err(RequestError::EmptyPlayer);
        }
        let stat_line = StatLine::parse(stat_line)?;
        if !line_value.is_finite() || line_value < 0.0 {
            return Err(RequestError::InvalidLineValue(line_value));
        }
        let opponent = normalize_team(opponent)?;
        let max = latest_supported_season();
        if !(FIRST_SUPPORTED_SEASON..=max).contains(&season) {
            return Err(RequestError::SeasonOutOfRange {
                season,
                min: FIRST_SUPPORTED_SEASON,
                max,
            });
        }
        Ok(Self {
            player: player.to_string(),
            stat_line,
            line_value,
            opponent,
            season,
        })
    }

    /// Same as [`PredictionRequest::new`] with the line value still as text.
    pub fn from_text(
        player: &str,
        stat_line: &str,
        line_value: &str,
        opponent: &str,
        season: i32,
    ) -> Result<Self, RequestError> {
        let value = parse_line_value(line_value)?;
        Self::new(player, stat_line, value, opponent, season)
    }

    /// Re-runs validation on a request built by hand or deserialized.
    pub fn validate(self) -> Result<Self, RequestError> {
        Self::new(
            &self.player,
            self.stat_line.as_str(),
            self.line_value,
            &self.opponent,
            self.season,
        )
    }
}

pub fn parse_line_value(raw: &str) -> Result<f64, RequestError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| RequestError::NonNumericLineValue(raw.to_string()))
}

fn normalize_team(raw: &str) -> Result<String, RequestError> {
    let code = raw.trim().to_ascii_uppercase();
    let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_uppercase());
    if !valid {
        return Err(RequestError::MalformedOpponent(raw.to_string()));
    }
    Ok(code)
}

/// Next calendar year, so a season that starts in the fall can be requested
/// ahead of time.
pub fn latest_supported_season() -> i32 {
    chrono::Local::now().year() + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Over,
    Under,
}

impl Decision {
    /// Ties go to OVER.
    pub fn from_probabilities(over: f64, under: f64) -> Self {
        if over >= under {
            Decision::Over
        } else {
            Decision::Under
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Over => "OVER",
            Decision::Under => "UNDER",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub player: String,
    pub stat_line: StatLine,
    pub line_value: f64,
    pub opponent: String,
    /// Season whose play-by-play was actually used.
    pub season: i32,
    pub over_probability: f64,
    pub under_probability: f64,
    pub decision: Decision,
    /// Application order.
    pub contributions: Vec<Contribution>,
    pub notes: BTreeMap<String, String>,
}

impl PredictionResult {
    pub fn contribution(&self, factor: &str) -> Option<f64> {
        self.contributions
            .iter()
            .find(|c| c.factor == factor)
            .map(|c| c.points)
    }

    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} - {} vs {} (line {}) [{}]\n",
            self.player, self.stat_line, self.opponent, self.line_value, self.season
        ));
        out.push_str(&format!("OVER:  {:.2}%\n", self.over_probability * 100.0));
        out.push_str(&format!("UNDER: {:.2}%\n", self.under_probability * 100.0));
        out.push_str(&format!("Decision: {}\n", self.decision));
        out.push_str("\n--- Contributions (pp) ---\n");
        for c in &self.contributions {
            out.push_str(&format!("{:<20} {:+6.2} pp\n", c.factor, c.points));
        }
        out.push_str("\n--- Notes ---\n");
        if let Some(source) = self.note(PBP_SOURCE_NOTE) {
            out.push_str(&format!("{PBP_SOURCE_NOTE:<20} {source}\n"));
        }
        for c in &self.contributions {
            if let Some(note) = self.note(&c.factor) {
                out.push_str(&format!("{:<20} {note}\n", c.factor));
            }
        }
        out
    }
}

/// Every normalized signal for one request, keyed by factor name, already
/// gated by stat context.
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    entries: Vec<(&'static str, Signal)>,
}

impl SignalTable {
    fn push(&mut self, key: &'static str, signal: Signal) {
        self.entries.push((key, signal));
    }

    pub fn get(&self, key: &str) -> Option<&Signal> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Signal)> {
        self.entries.iter().map(|(k, s)| (*k, s))
    }
}

/// Context-independent signals plus the two always-on ones, which never
/// appear in the gated table.
struct Evidence {
    table: SignalTable,
    recent_form: Signal,
    vs_team: Signal,
}

/// Everything the normalizers read, loaded once per request.
struct RequestData {
    pbp: Option<PlayByPlay>,
    pbp_season: i32,
    pbp_note: String,
    defense: Option<DefensiveTable>,
    oline: Option<OffensiveLineTable>,
    weekly: Result<Vec<WeeklyStatRow>, String>,
    history: Arc<Vec<WeeklyStatRow>>,
    players: Result<Vec<PlayerRecord>, String>,
    team: Option<String>,
    position: Option<Position>,
    player_id: Result<String, String>,
}

type HistoryCell = Arc<OnceCell<Arc<Vec<WeeklyStatRow>>>>;

pub struct Predictor<'a> {
    source: &'a dyn DataSource,
    registry: &'a WeightRegistry,
    history_first_season: i32,
    /// Weekly rows from `history_first_season` through the keyed season,
    /// loaded once and shared by every request for that season.
    history: Mutex<HashMap<i32, HistoryCell>>,
}

impl<'a> Predictor<'a> {
    pub fn new(source: &'a dyn DataSource, registry: &'a WeightRegistry) -> Self {
        Self {
            source,
            registry,
            history_first_season: DEFAULT_HISTORY_FIRST_SEASON,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_history_from(mut self, first_season: i32) -> Self {
        self.history_first_season = first_season;
        self.history = Mutex::new(HashMap::new());
        self
    }

    fn history_through(&self, season: i32) -> Arc<Vec<WeeklyStatRow>> {
        let load = || {
            Arc::new(
                self.source
                    .weekly_stats_range(self.history_first_season, season),
            )
        };
        let cell = match self.history.lock() {
            Ok(mut cells) => cells.entry(season).or_default().clone(),
            Err(_) => return load(),
        };
        cell.get_or_init(load).clone()
    }

    /// Always completes; missing data shows up as skipped factors.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionResult {
        let data = self.load(request);
        let ctx = request.stat_line.context();
        let evidence = self.evidence(request, ctx, &data);

        let resolved = self
            .registry
            .resolve(data.position.as_ref(), &request.stat_line);
        debug!(
            player = %request.player,
            stat = %request.stat_line,
            source = ?resolved.source,
            factors = resolved.set.len(),
            "resolved weights"
        );

        let mut composer = LogitComposer::new();
        let mut notes = BTreeMap::new();
        for (factor, weight) in resolved.set.iter() {
            if let Some(signal) = evidence.table.get(factor) {
                composer.apply(factor, weight, signal.value());
                notes.insert(factor.to_string(), signal.note());
            }
        }
        composer.apply(RECENT_FORM, RECENT_FORM_WEIGHT, evidence.recent_form.value());
        notes.insert(RECENT_FORM.to_string(), evidence.recent_form.note());
        composer.apply(VS_TEAM_HISTORY, VS_TEAM_WEIGHT, evidence.vs_team.value());
        notes.insert(VS_TEAM_HISTORY.to_string(), evidence.vs_team.note());

        let (composed, contributions) = composer.finish();
        assemble(
            request,
            data.pbp_season,
            data.pbp_note,
            composed,
            contributions,
            notes,
        )
    }

    /// Independent predictions run in parallel; results keep input order.
    pub fn predict_batch(&self, requests: &[PredictionRequest]) -> Vec<PredictionResult> {
        requests.par_iter().map(|r| self.predict(r)).collect()
    }

    /// The full gated signal table, for inspection.
    pub fn signals(&self, request: &PredictionRequest) -> SignalTable {
        let data = self.load(request);
        let evidence = self.evidence(request, request.stat_line.context(), &data);
        let mut table = evidence.table;
        table.push(RECENT_FORM, evidence.recent_form);
        table.push(VS_TEAM_HISTORY, evidence.vs_team);
        table
    }

    fn load(&self, request: &PredictionRequest) -> RequestData {
        let load = load_pbp_with_fallback(self.source, request.season);
        let pbp_season = load.season_used;
        let pbp_note = load.note;
        let pbp = load.data;
        let defense = pbp.as_ref().map(compute_defensive_stats);
        let oline = pbp.as_ref().map(compute_offensive_line_metrics);

        let weekly = self
            .source
            .weekly_stats(request.season)
            .map_err(|err| err.to_string());
        let history = self.history_through(request.season);
        let players = self.source.players().map_err(|err| err.to_string());

        let weekly_rows = weekly.as_deref().unwrap_or(&[]);
        let roster = players.as_deref().unwrap_or(&[]);
        let team = team_of_player(weekly_rows, &request.player).or_else(|| {
            find_player(roster, &request.player).and_then(|p| p.latest_team.clone())
        });
        let position = position_of_player(weekly_rows, roster, &request.player);
        let player_id = match (&players, team.as_deref()) {
            (Err(reason), _) => Err(reason.clone()),
            (Ok(_), None) => Err("unknown player team".to_string()),
            (Ok(roster), Some(team)) => resolve_player_id(roster, &request.player, team)
                .ok_or_else(|| "could not resolve player ID".to_string()),
        };

        RequestData {
            pbp,
            pbp_season,
            pbp_note,
            defense,
            oline,
            weekly,
            history,
            players,
            team,
            position,
            player_id,
        }
    }

    fn evidence(
        &self,
        request: &PredictionRequest,
        ctx: StatContext,
        data: &RequestData,
    ) -> Evidence {
        let player = request.player.as_str();
        let stat = &request.stat_line;
        let line = request.line_value;
        let tiers = self.registry.tiers();
        let pbp = data.pbp.as_ref();
        let team = data.team.as_deref();

        let is_rush = ctx == StatContext::Rush;
        let is_pass = ctx == StatContext::Pass;
        let is_pass_or_receive = ctx.is_pass_or_receive();

        let defense = normalizers::defense_difficulty(
            &request.opponent,
            data.defense.as_ref(),
            ctx,
            tiers,
        );
        let oline = normalizers::oline_strength(team, data.oline.as_ref());
        let usage = normalizers::usage_rate(pbp, team, ctx);

        let weekly = data.weekly.as_ref().map_err(|reason| reason.clone());
        let recent_form = normalizers::recent_form(
            weekly
                .clone()
                .map(|rows| recent_average(rows, player, stat.as_str())),
            line,
        );
        let vs_avg = if data.history.is_empty() {
            Err("no weekly history".to_string())
        } else {
            Ok(career_average_vs_opponent(
                &data.history,
                player,
                stat.as_str(),
                &request.opponent,
            ))
        };
        let vs_team = normalizers::vs_team_history(vs_avg, &request.opponent, line);

        let rushing = weekly.map(|rows| RecentRushing {
            yards: recent_average(rows, player, "rushing_yards"),
            carries: recent_average(rows, player, "carries"),
        });

        let red_zone = match (team, data.position.as_ref()) {
            (None, _) => Err("no team provided".to_string()),
            (_, None) => Err("unknown player position".to_string()),
            (Some(team), Some(position)) => player_metric(pbp, &data.player_id, |pbp, id| {
                pbp_metrics::red_zone_usage(pbp, id, position, team)
            }),
        };
        let weapons = match (pbp, team) {
            (Some(pbp), Some(team)) => Ok(pbp_metrics::weapons_grade(pbp, team)),
            _ => Err("no play-by-play or team".to_string()),
        };
        let blitz = match (pbp, team) {
            (Some(pbp), Some(team)) => pbp_metrics::blitz_rate(pbp, team),
            _ => Err("no play-by-play data".to_string()),
        };
        let points_rank = data
            .defense
            .as_ref()
            .and_then(|d| d.get(&request.opponent))
            .map(|row| row.points_allowed_rank);
        let roster = data.players.as_deref().unwrap_or(&[]);

        let mut table = SignalTable::default();
        table.push("rush_defense", defense.clone().only_if(is_rush));
        table.push("pass_defense", defense.clone().only_if(is_pass_or_receive));
        table.push("defensive_rankings", defense);
        table.push("oline_ranking", oline);
        table.push("rush_rate", usage.clone().only_if(is_rush));
        table.push("pass_attempts", usage.clone().only_if(is_pass_or_receive));
        table.push("targets", usage.only_if(ctx == StatContext::Receive));
        table.push(
            "yards_per_carry",
            normalizers::yards_per_carry(rushing.clone(), line).only_if(is_rush),
        );
        table.push(
            "carries",
            normalizers::carries(rushing.clone(), stat, line).only_if(is_rush),
        );
        table.push("red_zone_usage", normalizers::red_zone_usage(red_zone));
        table.push("points_allowed", normalizers::points_allowed(points_rank, tiers));
        table.push(
            "weapons_grade",
            normalizers::weapons_grade(data.position.as_ref(), weapons).only_if(is_pass),
        );
        table.push(
            "air_yards",
            normalizers::air_yards(player_metric(
                pbp,
                &data.player_id,
                pbp_metrics::average_air_yards,
            ))
            .only_if(is_pass),
        );
        table.push(
            "pressure_rate",
            normalizers::pressure_rate(player_metric(
                pbp,
                &data.player_id,
                pbp_metrics::pressure_rate,
            )),
        );
        table.push(
            "td_int_ratio",
            normalizers::td_int_ratio(player_metric(
                pbp,
                &data.player_id,
                pbp_metrics::touchdowns_and_interceptions,
            ))
            .only_if(is_pass),
        );
        table.push("blitz_rate", normalizers::blitz_rate(team, blitz));
        table.push("rush_attempts", normalizers::rush_attempts(rushing, stat, line));
        table.push(
            "yac_avg",
            normalizers::yards_after_catch(player_metric(
                pbp,
                &data.player_id,
                pbp_metrics::average_yards_after_catch,
            )),
        );
        table.push("qb_size", normalizers::qb_size(find_player(roster, player)));

        Evidence {
            table,
            recent_form,
            vs_team,
        }
    }
}

/// Runs a per-player play-by-play metric when both the data and the player
/// id are available.
fn player_metric<T>(
    pbp: Option<&PlayByPlay>,
    player_id: &Result<String, String>,
    metric: impl Fn(&PlayByPlay, &str) -> Result<T, String>,
) -> Result<T, String> {
    let pbp = pbp.ok_or_else(|| "no play-by-play data".to_string())?;
    let id = player_id.as_deref().map_err(|reason| reason.clone())?;
    metric(pbp, id)
}

/// Packages the composer output with the request echo fields. The fallback
/// note is stored under [`PBP_SOURCE_NOTE`].
pub fn assemble(
    request: &PredictionRequest,
    season_used: i32,
    pbp_note: String,
    composed: Composed,
    contributions: Vec<Contribution>,
    mut notes: BTreeMap<String, String>,
) -> PredictionResult {
    notes.insert(PBP_SOURCE_NOTE.to_string(), pbp_note);
    PredictionResult {
        player: request.player.clone(),
        stat_line: request.stat_line.clone(),
        line_value: request.line_value,
        opponent: request.opponent.clone(),
        season: season_used,
        over_probability: composed.over_probability,
        under_probability: composed.under_probability,
        decision: Decision::from_probabilities(
            composed.over_probability,
            composed.under_probability,
        ),
        contributions,
        notes,
    }
}

/// Validates the request and predicts with the process-wide weight registry.
pub fn predict(
    source: &dyn DataSource,
    player: &str,
    stat_line: &str,
    line_value: f64,
    opponent: &str,
    season: i32,
) -> Result<PredictionResult, RequestError> {
    let request = PredictionRequest::new(player, stat_line, line_value, opponent, season)?;
    Ok(Predictor::new(source, global_registry()).predict(&request))
}
