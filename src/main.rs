use anyhow::{Context, Result, anyhow, bail};
use chrono::Datelike;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use nfl_overunder::config::DataConfig;
use nfl_overunder::fallback::load_pbp_with_fallback;
use nfl_overunder::history::{self, HitRateReport, Side};
use nfl_overunder::nflverse::NflverseSource;
use nfl_overunder::pbp_metrics::team_profile;
use nfl_overunder::prediction::{PredictionRequest, Predictor, parse_line_value};
use nfl_overunder::stat_line::StatLine;
use nfl_overunder::weights::global_registry;

const USAGE: &str = "usage:
  nfl_overunder predict <player> <stat_line> <line> <opponent> [--season N] [--json]
  nfl_overunder last10 <player> <stat_line> <line> <over|under> [--season N] [--json]
  nfl_overunder h2h <player> <stat_line> <line> <over|under> <opponent> [--season N] [--json]
  nfl_overunder h2h-last10 <player> <stat_line> <line> <over|under> <opponent> [--season N] [--json]
  nfl_overunder team <team> [--season N] [--json]

flags:
  --offline   only use files already in the data dir";

struct Args {
    command: String,
    positional: Vec<String>,
    season: Option<i32>,
    json: bool,
    offline: bool,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging();

    let args = parse_args(std::env::args().skip(1).collect())?;
    let mut config = DataConfig::from_env();
    if args.offline {
        config.offline = true;
    }
    let first_season = config.history_first_season;
    let source = NflverseSource::new(config);
    let season = args.season.unwrap_or_else(default_season);

    match args.command.as_str() {
        "predict" => {
            let [player, stat, line, opponent] = positional::<4>(&args)?;
            let request = PredictionRequest::from_text(player, stat, line, opponent, season)?;
            let result = Predictor::new(&source, global_registry())
                .with_history_from(first_season)
                .predict(&request);
            emit(args.json, &result, || result.render_text())?;
        }
        "last10" => {
            let [player, stat, line, side] = positional::<4>(&args)?;
            let (stat, line, side) = hit_rate_inputs(stat, line, side)?;
            let report =
                history::last_ten(&source, player, &stat, line, side, season, first_season);
            emit(args.json, &report, || report.render_text())?;
        }
        "h2h" | "h2h-last10" => {
            let [player, stat, line, side, opponent] = positional::<5>(&args)?;
            let (stat, line, side) = hit_rate_inputs(stat, line, side)?;
            let opponent = opponent.trim().to_ascii_uppercase();
            let seasons = (first_season, season);
            let report: Option<HitRateReport> = if args.command == "h2h" {
                history::head_to_head(&source, player, &stat, line, side, &opponent, seasons)
            } else {
                history::head_to_head_last_ten(
                    &source, player, &stat, line, side, &opponent, seasons,
                )
            };
            let Some(report) = report else {
                println!("No games found for {player} vs {opponent}.");
                return Ok(());
            };
            emit(args.json, &report, || report.render_text())?;
        }
        "team" => {
            let [team] = positional::<1>(&args)?;
            let team = team.trim().to_ascii_uppercase();
            let load = load_pbp_with_fallback(&source, season);
            let pbp = load
                .data()
                .ok_or_else(|| anyhow!("{}", load.note))?;
            let profile = team_profile(pbp, &team)
                .with_context(|| format!("{team} not found in {} play-by-play", load.season_used))?;
            emit(args.json, &profile, || {
                let mut out = format!("{} ({})\n", profile.team, profile.season);
                out.push_str(&format!("pass rate: {:.2}%\n", profile.pass_rate * 100.0));
                out.push_str(&format!("rush rate: {:.2}%\n", profile.rush_rate * 100.0));
                if let Some(ol) = &profile.off_line {
                    out.push_str(&format!(
                        "o-line: metric={:.4} rank={}\n",
                        ol.off_line_metric, ol.off_line_rank
                    ));
                }
                let d = &profile.defense;
                out.push_str(&format!(
                    "defense: rush {:.0} (#{}), pass {:.0} (#{}), ",
                    d.rush_yards_allowed, d.rush_rank, d.pass_yards_allowed, d.pass_rank
                ));
                out.push_str(&format!(
                    "total {:.0} (#{}), points {:.0} (#{})\n",
                    d.total_yards_allowed, d.total_rank, d.points_allowed, d.points_allowed_rank
                ));
                out
            })?;
        }
        other => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,nfl_overunder=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_args(raw: Vec<String>) -> Result<Args> {
    let mut positional = Vec::new();
    let mut season = None;
    let mut json = false;
    let mut offline = false;

    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--season=") {
            season = Some(parse_season(value)?);
        } else if arg == "--season" {
            let value = iter.next().context("--season needs a value")?;
            season = Some(parse_season(&value)?);
        } else if arg == "--json" {
            json = true;
        } else if arg == "--offline" {
            offline = true;
        } else if arg == "-h" || arg == "--help" {
            println!("{USAGE}");
            std::process::exit(0);
        } else {
            positional.push(arg);
        }
    }

    if positional.is_empty() {
        bail!("missing command\n\n{USAGE}");
    }
    let command = positional.remove(0);
    Ok(Args {
        command,
        positional,
        season,
        json,
        offline,
    })
}

fn parse_season(raw: &str) -> Result<i32> {
    raw.trim()
        .parse::<i32>()
        .with_context(|| format!("season must be a year (got {raw:?})"))
}

fn positional<const N: usize>(args: &Args) -> Result<[&str; N]> {
    if args.positional.len() != N {
        bail!(
            "{} expects {N} arguments, got {}\n\n{USAGE}",
            args.command,
            args.positional.len()
        );
    }
    let mut out = [""; N];
    for (slot, value) in out.iter_mut().zip(&args.positional) {
        *slot = value.as_str();
    }
    Ok(out)
}

fn hit_rate_inputs(stat: &str, line: &str, side: &str) -> Result<(StatLine, f64, Side)> {
    let stat = StatLine::parse(stat)?;
    let line = parse_line_value(line)?;
    let side = side.parse::<Side>().map_err(|err| anyhow!(err))?;
    Ok((stat, line, side))
}

/// The season in progress, or the one just finished before September.
fn default_season() -> i32 {
    let today = chrono::Local::now().date_naive();
    if today.month() >= 9 {
        today.year()
    } else {
        today.year() - 1
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("serialize output")?
        );
    } else {
        print!("{}", text());
    }
    Ok(())
}
