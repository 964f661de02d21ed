//! nflverse release files: downloaded once into the data dir, then decoded
//! from parquet on every load.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use once_cell::sync::OnceCell;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Row, RowAccessor};
use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::config::DataConfig;
use crate::play_by_play::{PBP_COLUMNS, PlayByPlay, PlayRow};
use crate::player_stats::{PlayerRecord, WeeklyStatRow};
use crate::source::DataSource;

const DOWNLOAD_ATTEMPTS: u32 = 4;
const USER_AGENT: &str = "nfl-overunder/0.1";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

const WEEKLY_ID_COLUMNS: [&str; 8] = [
    "player_id",
    "player_display_name",
    "position",
    "recent_team",
    "team",
    "season",
    "week",
    "opponent_team",
];

pub struct NflverseSource {
    config: DataConfig,
    client: OnceCell<Client>,
    pbp_cache: Mutex<HashMap<i32, PlayByPlay>>,
    weekly_cache: Mutex<HashMap<i32, Vec<WeeklyStatRow>>>,
    players_cache: OnceCell<Vec<PlayerRecord>>,
    /// One lock per destination file; held while that file is downloaded.
    downloads: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl NflverseSource {
    pub fn new(config: DataConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            pbp_cache: Mutex::new(HashMap::new()),
            weekly_cache: Mutex::new(HashMap::new()),
            players_cache: OnceCell::new(),
            downloads: Mutex::new(HashMap::new()),
        }
    }

    fn download_lock(&self, path: &Path) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .downloads
            .lock()
            .map_err(|_| anyhow!("download lock table poisoned"))?;
        Ok(locks.entry(path.to_path_buf()).or_default().clone())
    }

    fn client(&self) -> Result<&Client> {
        self.client.get_or_try_init(|| {
            Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(self.config.http_timeout_secs))
                .build()
                .context("build http client")
        })
    }

    /// Local path of `release/file`, downloading it first if needed.
    fn ensure_file(&self, release: &str, file: &str) -> Result<PathBuf> {
        let path = self.config.data_dir.join(release).join(file);
        if path.exists() {
            debug!(path = %path.display(), "using cached file");
            return Ok(path);
        }
        if self.config.offline {
            bail!("{release}/{file} is not cached and offline mode is on");
        }

        let lock = self.download_lock(&path)?;
        let _guard = lock
            .lock()
            .map_err(|_| anyhow!("download lock poisoned for {}", path.display()))?;
        if path.exists() {
            debug!(path = %path.display(), "downloaded by another worker");
            return Ok(path);
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let url = format!("{}/{release}/{file}", self.config.base_url);
        info!(%url, "downloading");
        download_file(self.client()?, &url, &path)
    }
}

impl DataSource for NflverseSource {
    fn play_by_play(&self, season: i32) -> Result<PlayByPlay> {
        if let Ok(cache) = self.pbp_cache.lock()
            && let Some(hit) = cache.get(&season)
        {
            return Ok(hit.clone());
        }
        let path = self.ensure_file("pbp", &format!("play_by_play_{season}.parquet"))?;
        let pbp = read_play_by_play(&path, season)?;
        if let Ok(mut cache) = self.pbp_cache.lock() {
            cache.insert(season, pbp.clone());
        }
        Ok(pbp)
    }

    fn weekly_stats(&self, season: i32) -> Result<Vec<WeeklyStatRow>> {
        if let Ok(cache) = self.weekly_cache.lock()
            && let Some(hit) = cache.get(&season)
        {
            return Ok(hit.clone());
        }
        let path = self.ensure_file(
            "player_stats",
            &format!("player_stats_{season}.parquet"),
        )?;
        let rows = read_weekly_stats(&path)?;
        if let Ok(mut cache) = self.weekly_cache.lock() {
            cache.insert(season, rows.clone());
        }
        Ok(rows)
    }

    fn players(&self) -> Result<Vec<PlayerRecord>> {
        self.players_cache
            .get_or_try_init(|| {
                let path = self.ensure_file("players", "players.parquet")?;
                read_players(&path)
            })
            .cloned()
    }
}

fn download_file(client: &Client, url: &str, path: &Path) -> Result<PathBuf> {
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=DOWNLOAD_ATTEMPTS {
        let fetched = client
            .get(url)
            .send()
            .with_context(|| format!("request {url}"))
            .and_then(|res| {
                res.error_for_status()
                    .with_context(|| format!("status for {url}"))
            })
            .and_then(|res| res.bytes().with_context(|| format!("read body {url}")));
        match fetched {
            Ok(bytes) => {
                let tmp = tmp_path(path);
                fs::write(&tmp, &bytes).with_context(|| format!("write {}", tmp.display()))?;
                if let Err(err) = fs::rename(&tmp, path) {
                    let _ = fs::remove_file(&tmp);
                    return Err(err).with_context(|| format!("move {}", path.display()));
                }
                return Ok(path.to_path_buf());
            }
            Err(err) => {
                warn!(attempt, error = %err, "download failed");
                last_err = Some(err);
                if attempt < DOWNLOAD_ATTEMPTS {
                    let sleep_ms = 500_u64.saturating_mul(attempt as u64);
                    std::thread::sleep(Duration::from_millis(sleep_ms));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("download failed for {url}")))
}

/// Sibling of `path` no other writer uses, so a partial file is never renamed
/// into place by someone else.
fn tmp_path(path: &Path) -> PathBuf {
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

fn open_reader(path: &Path) -> Result<SerializedFileReader<fs::File>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    SerializedFileReader::new(file)
        .with_context(|| format!("open parquet reader {}", path.display()))
}

/// Top-level column name to row index.
fn column_index(reader: &SerializedFileReader<fs::File>) -> HashMap<String, usize> {
    reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| (field.name().to_string(), idx))
        .collect()
}

fn read_num(row: &Row, idx: usize) -> Option<f64> {
    if let Ok(v) = row.get_double(idx) {
        return Some(v);
    }
    if let Ok(v) = row.get_float(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_long(idx) {
        return Some(v as f64);
    }
    if let Ok(v) = row.get_int(idx) {
        return Some(v as f64);
    }
    None
}

fn read_str(row: &Row, idx: usize) -> Option<String> {
    row.get_string(idx)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

struct Columns(HashMap<String, usize>);

impl Columns {
    fn num(&self, row: &Row, name: &str) -> Option<f64> {
        self.0.get(name).and_then(|idx| read_num(row, *idx))
    }

    fn str(&self, row: &Row, name: &str) -> Option<String> {
        self.0.get(name).and_then(|idx| read_str(row, *idx))
    }
}

fn read_play_by_play(path: &Path, season: i32) -> Result<PlayByPlay> {
    let reader = open_reader(path)?;
    let cols = Columns(column_index(&reader));
    let present: Vec<&str> = PBP_COLUMNS
        .iter()
        .copied()
        .filter(|c| cols.0.contains_key(*c))
        .collect();
    let iter = reader.get_row_iter(None).context("iterate play rows")?;

    let mut plays = Vec::new();
    for row in iter {
        let Ok(row) = row else {
            continue;
        };
        plays.push(PlayRow {
            posteam: cols.str(&row, "posteam"),
            defteam: cols.str(&row, "defteam"),
            play_type: cols.str(&row, "play_type"),
            pass_attempt: cols.num(&row, "pass_attempt"),
            rush_attempt: cols.num(&row, "rush_attempt"),
            yards_gained: cols.num(&row, "yards_gained"),
            sack: cols.num(&row, "sack"),
            qb_hit: cols.num(&row, "qb_hit"),
            hurry: cols.num(&row, "hurry"),
            touchdown: cols.num(&row, "touchdown"),
            td_team: cols.str(&row, "td_team"),
            interception: cols.num(&row, "interception"),
            field_goal_result: cols.str(&row, "field_goal_result"),
            extra_point_result: cols.str(&row, "extra_point_result"),
            two_point_conv_result: cols.str(&row, "two_point_conv_result"),
            yardline_100: cols.num(&row, "yardline_100"),
            air_yards: cols.num(&row, "air_yards"),
            yards_after_catch: cols.num(&row, "yards_after_catch"),
            passer_player_id: cols.str(&row, "passer_player_id"),
            receiver_player_id: cols.str(&row, "receiver_player_id"),
            rusher_player_id: cols.str(&row, "rusher_player_id"),
            week: cols.num(&row, "week"),
        });
    }
    debug!(season, plays = plays.len(), columns = present.len(), "decoded play-by-play");
    Ok(PlayByPlay::with_columns(season, plays, &present))
}

fn read_weekly_stats(path: &Path) -> Result<Vec<WeeklyStatRow>> {
    let reader = open_reader(path)?;
    let cols = Columns(column_index(&reader));
    let stat_columns: Vec<(String, usize)> = cols
        .0
        .iter()
        .filter(|(name, _)| !WEEKLY_ID_COLUMNS.contains(&name.as_str()))
        .map(|(name, idx)| (name.clone(), *idx))
        .collect();
    let iter = reader.get_row_iter(None).context("iterate weekly rows")?;

    let mut out = Vec::new();
    for row in iter {
        let Ok(row) = row else {
            continue;
        };
        let Some(name) = cols.str(&row, "player_display_name") else {
            continue;
        };
        let stats: BTreeMap<String, f64> = stat_columns
            .iter()
            .filter_map(|(stat, idx)| read_num(&row, *idx).map(|v| (stat.clone(), v)))
            .collect();
        out.push(WeeklyStatRow {
            player_id: cols.str(&row, "player_id"),
            player_display_name: name,
            position: cols.str(&row, "position"),
            team: cols
                .str(&row, "recent_team")
                .or_else(|| cols.str(&row, "team")),
            season: cols.num(&row, "season").map(|v| v as i32).unwrap_or_default(),
            week: cols.num(&row, "week").map(|v| v as u32).unwrap_or_default(),
            opponent_team: cols.str(&row, "opponent_team"),
            stats,
        });
    }
    Ok(out)
}

fn read_players(path: &Path) -> Result<Vec<PlayerRecord>> {
    let reader = open_reader(path)?;
    let cols = Columns(column_index(&reader));
    let iter = reader.get_row_iter(None).context("iterate player rows")?;

    let mut out = Vec::new();
    for row in iter {
        let Ok(row) = row else {
            continue;
        };
        let Some(display_name) = cols.str(&row, "display_name") else {
            continue;
        };
        out.push(PlayerRecord {
            gsis_id: cols.str(&row, "gsis_id"),
            display_name,
            position: cols.str(&row, "position"),
            latest_team: cols.str(&row, "latest_team"),
            height: cols.num(&row, "height"),
            weight: cols.num(&row, "weight"),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nfl_overunder_{tag}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn offline_without_cache_fails_fast() {
        let config = DataConfig {
            offline: true,
            ..DataConfig::default()
        }
        .with_data_dir(scratch_dir("offline"));
        let source = NflverseSource::new(config);
        let err = source.play_by_play(2024).unwrap_err();
        assert!(err.to_string().contains("offline"), "{err}");
        assert!(source.players().is_err());
        assert!(source.weekly_stats_range(2022, 2023).is_empty());
    }

    #[test]
    fn concurrent_downloads_of_one_file_share_a_lock() {
        let config = DataConfig::default().with_data_dir(scratch_dir("locks"));
        let source = NflverseSource::new(config);
        let pbp = Path::new("/data/pbp/play_by_play_2024.parquet");
        let weekly = Path::new("/data/player_stats/player_stats_2024.parquet");

        let src = &source;
        let locks: Vec<Arc<Mutex<()>>> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| scope.spawn(move || src.download_lock(pbp).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        for lock in &locks[1..] {
            assert!(Arc::ptr_eq(&locks[0], lock));
        }
        assert!(!Arc::ptr_eq(&locks[0], &source.download_lock(weekly).unwrap()));
    }

    #[test]
    fn every_writer_gets_its_own_tmp_file() {
        let path = Path::new("/data/pbp/play_by_play_2024.parquet");
        let a = tmp_path(path);
        let b = tmp_path(path);
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert_ne!(a, path);
    }

    #[test]
    fn file_cached_while_waiting_is_not_downloaded_again() {
        let dir = scratch_dir("waiting");
        let config = DataConfig::default().with_data_dir(&dir);
        let source = NflverseSource::new(config);
        let path = dir.join("players").join("players.parquet");

        // hold the file's lock the way an in-flight download would
        let lock = source.download_lock(&path).unwrap();
        let guard = lock.lock().unwrap();
        let found = std::thread::scope(|scope| {
            let waiter = scope.spawn(|| source.ensure_file("players", "players.parquet"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"cached").unwrap();
            drop(guard);
            waiter.join().unwrap()
        });
        assert_eq!(found.unwrap(), path);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_cached_file_is_an_error() {
        let dir = scratch_dir("corrupt");
        fs::create_dir_all(dir.join("pbp")).unwrap();
        fs::write(dir.join("pbp").join("play_by_play_2023.parquet"), b"not parquet").unwrap();
        let config = DataConfig {
            offline: true,
            ..DataConfig::default()
        }
        .with_data_dir(&dir);
        let source = NflverseSource::new(config);
        assert!(source.play_by_play(2023).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
