use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::stat_line::{Position, StatContext, StatLine};
use crate::tiers::DefenseTierTables;

/// Older weight files spell some factors differently.
const LEGACY_FACTOR_KEYS: [(&str, &str); 1] = [("td_int:ratio", "td_int_ratio")];

fn canonical_factor(key: &str) -> &str {
    LEGACY_FACTOR_KEYS
        .iter()
        .find(|(legacy, _)| *legacy == key)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorWeight {
    pub factor: String,
    pub weight: f64,
}

/// Ordered factor → signed weight pairs. Positive weights push toward OVER.
/// Iteration order is application order in the composer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightSet(Vec<FactorWeight>);

impl WeightSet {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(factor, weight)| FactorWeight {
                    factor: (*factor).to_string(),
                    weight: *weight,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|fw| (fw.factor.as_str(), fw.weight))
    }

    pub fn get(&self, factor: &str) -> Option<f64> {
        self.0.iter().find(|fw| fw.factor == factor).map(|fw| fw.weight)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical factor names; a factor listed twice keeps its first weight.
    fn normalized(self, set: &str) -> Self {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.0.len());
        for fw in self.0 {
            let factor = canonical_factor(fw.factor.trim()).to_string();
            if !seen.insert(factor.clone()) {
                warn!(%factor, set, "dropping repeated factor weight");
                continue;
            }
            out.push(FactorWeight {
                factor,
                weight: fw.weight,
            });
        }
        Self(out)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatWeights {
    pub stat_line: String,
    pub factors: WeightSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionWeights {
    pub position: String,
    #[serde(default)]
    pub stats: Vec<StatWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackWeights {
    pub rush: WeightSet,
    pub pass_receive: WeightSet,
    pub other: WeightSet,
}

impl FallbackWeights {
    fn normalized(self) -> Self {
        Self {
            rush: self.rush.normalized("fallback/rush"),
            pass_receive: self.pass_receive.normalized("fallback/pass_receive"),
            other: self.other.normalized("fallback/other"),
        }
    }
}

impl Default for FallbackWeights {
    fn default() -> Self {
        Self {
            rush: WeightSet::from_pairs(&[
                ("rush_defense", -1.0),
                ("oline_ranking", 0.8),
                ("rush_rate", 0.7),
                ("yards_per_carry", 0.6),
                ("carries", 0.6),
            ]),
            pass_receive: WeightSet::from_pairs(&[
                ("pass_defense", -1.0),
                ("oline_ranking", 0.7),
                ("pass_attempts", 0.6),
                ("targets", 0.6),
            ]),
            other: WeightSet::from_pairs(&[("defensive_rankings", -0.8)]),
        }
    }
}

/// On-disk form of the registry, loaded from `OU_WEIGHTS_PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightRegistryArtifact {
    pub version: u32,
    #[serde(default)]
    pub positions: Vec<PositionWeights>,
    #[serde(default)]
    pub fallback: Option<FallbackWeights>,
    #[serde(default)]
    pub tiers: Option<DefenseTierTables>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSource {
    Position,
    Fallback(StatContext),
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedWeights<'a> {
    pub set: &'a WeightSet,
    pub source: WeightSource,
}

/// Read-only weight and tier configuration shared by every prediction.
#[derive(Debug, Clone)]
pub struct WeightRegistry {
    by_position: HashMap<String, HashMap<String, WeightSet>>,
    fallback: FallbackWeights,
    tiers: DefenseTierTables,
}

impl WeightRegistry {
    pub fn from_artifact(artifact: WeightRegistryArtifact) -> Self {
        let mut by_position: HashMap<String, HashMap<String, WeightSet>> = HashMap::new();
        for pos in artifact.positions {
            let code = pos.position.trim().to_ascii_uppercase();
            let stats = by_position.entry(code.clone()).or_default();
            for stat in pos.stats {
                let key = match StatLine::parse(&stat.stat_line) {
                    Ok(line) => line.as_str().to_string(),
                    Err(err) => {
                        warn!("ignoring weight set with bad stat line: {err}");
                        continue;
                    }
                };
                let factors = stat.factors.normalized(&format!("{code}/{key}"));
                stats.insert(key, factors);
            }
        }
        Self {
            by_position,
            fallback: artifact
                .fallback
                .map(FallbackWeights::normalized)
                .unwrap_or_default(),
            tiers: artifact.tiers.unwrap_or_default(),
        }
    }

    pub fn builtin() -> Self {
        Self::from_artifact(builtin_artifact())
    }

    pub fn tiers(&self) -> &DefenseTierTables {
        &self.tiers
    }

    pub fn position_weights(&self, position: &Position, stat: &StatLine) -> Option<&WeightSet> {
        self.by_position
            .get(position.code())
            .and_then(|stats| stats.get(stat.as_str()))
            .filter(|set| !set.is_empty())
    }

    pub fn fallback_weights(&self, ctx: StatContext) -> &WeightSet {
        match ctx {
            StatContext::Rush => &self.fallback.rush,
            StatContext::Pass | StatContext::Receive => &self.fallback.pass_receive,
            StatContext::Other => &self.fallback.other,
        }
    }

    /// Exact `(position, stat_line)` entry first, otherwise the generic set
    /// for the stat context. Never both.
    pub fn resolve(&self, position: Option<&Position>, stat: &StatLine) -> ResolvedWeights<'_> {
        if let Some(set) = position.and_then(|p| self.position_weights(p, stat)) {
            return ResolvedWeights {
                set,
                source: WeightSource::Position,
            };
        }
        let ctx = stat.context();
        let set = self.fallback_weights(ctx);
        if !set.is_empty() {
            return ResolvedWeights {
                set,
                source: WeightSource::Fallback(ctx),
            };
        }
        ResolvedWeights {
            set: self.last_resort(),
            source: WeightSource::Fallback(StatContext::Other),
        }
    }

    fn last_resort(&self) -> &WeightSet {
        static DEFAULT_OTHER: OnceLock<WeightSet> = OnceLock::new();
        if !self.fallback.other.is_empty() {
            return &self.fallback.other;
        }
        DEFAULT_OTHER.get_or_init(|| FallbackWeights::default().other)
    }
}

pub fn load_weight_registry() -> Result<WeightRegistry> {
    load_weight_registry_from(registry_path_override().as_deref())
}

/// Built-in tables unless `path` names an existing artifact.
pub fn load_weight_registry_from(path: Option<&Path>) -> Result<WeightRegistry> {
    if let Some(path) = path
        && path.exists()
    {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read weight registry {}", path.display()))?;
        let artifact = serde_json::from_str::<WeightRegistryArtifact>(&raw)
            .with_context(|| format!("parse weight registry {}", path.display()))?;
        return Ok(WeightRegistry::from_artifact(artifact));
    }
    Ok(WeightRegistry::builtin())
}

fn registry_or_builtin(path: Option<&Path>) -> WeightRegistry {
    load_weight_registry_from(path).unwrap_or_else(|err| {
        warn!("weight registry override unusable, using built-in tables: {err:#}");
        WeightRegistry::builtin()
    })
}

/// Built once per process; falls back to the built-in tables when the
/// override file is unreadable.
pub fn global_registry() -> &'static WeightRegistry {
    static REGISTRY: OnceLock<WeightRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| registry_or_builtin(registry_path_override().as_deref()))
}

fn registry_path_override() -> Option<PathBuf> {
    env::var("OU_WEIGHTS_PATH")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn stat(stat_line: &str, pairs: &[(&str, f64)]) -> StatWeights {
    StatWeights {
        stat_line: stat_line.to_string(),
        factors: WeightSet::from_pairs(pairs),
    }
}

fn position(code: &str, stats: Vec<StatWeights>) -> PositionWeights {
    PositionWeights {
        position: code.to_string(),
        stats,
    }
}

// `past_games` and `h2h` have no signal behind them and are skipped by the
// composer; recent form and head-to-head are applied as always-on factors.
pub fn builtin_artifact() -> WeightRegistryArtifact {
    let receiver_stats = || {
        vec![
            stat(
                "receiving_yards",
                &[
                    ("targets", 1.1),
                    ("yac_avg", 0.85),
                    ("pass_defense", -0.8),
                    ("past_games", 0.85),
                    ("h2h", 1.1),
                ],
            ),
            stat(
                "receiving_tds",
                &[("targets", 1.1), ("past_games", 0.85), ("h2h", 1.1)],
            ),
            stat(
                "rushing_yards",
                &[
                    ("rush_defense", -0.7),
                    ("rush_attempts", 0.9),
                    ("past_games", 0.85),
                    ("h2h", 1.1),
                ],
            ),
            stat(
                "receptions",
                &[
                    ("targets", 1.4),
                    ("past_games", 0.85),
                    ("h2h", 1.1),
                    ("pass_defense", -0.9),
                ],
            ),
        ]
    };

    WeightRegistryArtifact {
        version: 1,
        positions: vec![
            position(
                "RB",
                vec![
                    stat(
                        "rushing_yards",
                        &[
                            ("rush_defense", -1.2),
                            ("oline_ranking", 0.9),
                            ("rush_rate", 0.7),
                            ("yards_per_carry", 1.1),
                            ("carries", 0.8),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                    stat(
                        "rushing_tds",
                        &[
                            ("rush_defense", -0.8),
                            ("oline_ranking", 0.8),
                            ("red_zone_usage", 1.2),
                            ("points_allowed", 0.9),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                    stat(
                        "receiving_yards",
                        &[
                            ("defensive_rankings", -0.8),
                            ("targets", 0.75),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                ],
            ),
            position(
                "QB",
                vec![
                    stat(
                        "passing_yards",
                        &[
                            ("pass_defense", -1.1),
                            ("oline_ranking", 0.8),
                            ("pass_attempts", 0.9),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                    stat(
                        "passing_tds",
                        &[
                            ("pass_defense", -0.9),
                            ("red_zone_usage", 1.1),
                            ("weapons_grade", 1.2),
                            ("points_allowed", 0.8),
                            ("air_yards", 0.7),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                    stat(
                        "interceptions",
                        &[
                            ("pass_defense", 0.8),
                            ("pressure_rate", 1.0),
                            ("td_int_ratio", 0.75),
                            ("blitz_rate", 0.9),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                    stat(
                        "rushing_yards",
                        &[
                            ("rush_defense", -0.7),
                            ("oline_ranking", 0.7),
                            ("rush_attempts", 0.9),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                    stat(
                        "rushing_tds",
                        &[
                            ("qb_size", 0.6),
                            ("rush_attempts", 0.9),
                            ("rush_defense", -0.5),
                            ("past_games", 0.85),
                            ("h2h", 1.1),
                        ],
                    ),
                ],
            ),
            position("WR", receiver_stats()),
            position("TE", receiver_stats()),
        ],
        fallback: Some(FallbackWeights::default()),
        tiers: Some(DefenseTierTables::default()),
    }
}
