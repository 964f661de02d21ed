use std::env;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://github.com/nflverse/nflverse-data/releases/download";
pub const DEFAULT_HISTORY_FIRST_SEASON: i32 = 2000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 180;
const DATA_DIR: &str = "nfl_overunder";

/// Where season tables come from and where they are cached.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    /// First season read when averaging a player's history against an
    /// opponent.
    pub history_first_season: i32,
    /// Never touch the network; only files already in `data_dir` are used.
    pub offline: bool,
    pub http_timeout_secs: u64,
}

impl DataConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = opt("NFLVERSE_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let data_dir = opt("NFL_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| default_data_dir(&lookup))
            .unwrap_or_else(|| PathBuf::from(".").join(DATA_DIR));
        let history_first_season = opt("NFL_HISTORY_FIRST_SEASON")
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or(DEFAULT_HISTORY_FIRST_SEASON)
            .clamp(1999, 2100);
        let offline = opt("NFL_OFFLINE").map(|v| flag_value(&v)).unwrap_or(false);
        let http_timeout_secs = opt("NFL_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
            .max(5);

        Self {
            base_url,
            data_dir,
            history_first_season,
            offline,
            http_timeout_secs,
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// "0", "false", "off", "no" and empty disable; anything else enables.
pub fn flag_value(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
}

fn default_data_dir(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(base) = lookup("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = lookup("HOME")?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(DATA_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> DataConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DataConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let cfg = config(&[("HOME", "/home/u")]);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.data_dir, PathBuf::from("/home/u/.cache/nfl_overunder"));
        assert_eq!(cfg.history_first_season, 2000);
        assert!(!cfg.offline);
        assert_eq!(cfg.http_timeout_secs, 180);
    }

    #[test]
    fn xdg_cache_wins_over_home() {
        let cfg = config(&[("HOME", "/home/u"), ("XDG_CACHE_HOME", "/cache")]);
        assert_eq!(cfg.data_dir, PathBuf::from("/cache/nfl_overunder"));
        let cfg = config(&[("XDG_CACHE_HOME", "/cache"), ("NFL_DATA_DIR", "/data")]);
        assert_eq!(cfg.data_dir, PathBuf::from("/data"));
    }

    #[test]
    fn parses_overrides() {
        let cfg = config(&[
            ("NFLVERSE_BASE_URL", "http://mirror.local/nfl/"),
            ("NFL_HISTORY_FIRST_SEASON", "2015"),
            ("NFL_OFFLINE", "yes"),
            ("NFL_HTTP_TIMEOUT_SECS", "1"),
        ]);
        assert_eq!(cfg.base_url, "http://mirror.local/nfl");
        assert_eq!(cfg.history_first_season, 2015);
        assert!(cfg.offline);
        assert_eq!(cfg.http_timeout_secs, 5);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let cfg = config(&[("NFL_HISTORY_FIRST_SEASON", "soon"), ("NFL_OFFLINE", "off")]);
        assert_eq!(cfg.history_first_season, 2000);
        assert!(!cfg.offline);
    }

    #[test]
    fn flag_values() {
        for off in ["0", "false", "OFF", " no ", ""] {
            assert!(!flag_value(off), "{off}");
        }
        for on in ["1", "true", "on", "yes"] {
            assert!(flag_value(on), "{on}");
        }
    }
}
