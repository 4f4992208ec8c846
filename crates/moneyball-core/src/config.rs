// Configuration loading and parsing (ingest.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::store::UpsertPolicy;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a valid ingest config: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("no defaults/ or config/ directory under {base}")]
    NoConfigDir { base: PathBuf },

    #[error("cannot seed {path} from defaults: {source}")]
    Seed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Name of the single config file under `config/` (and `defaults/`).
pub const CONFIG_FILE_NAME: &str = "ingest.toml";

// ---------------------------------------------------------------------------
// ingest.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub ingest: IngestConfig,
    pub batch: BatchConfig,
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite document store. `None` resolves to the platform
    /// data directory (see [`StoreConfig::resolved_db_path`]).
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default = "default_game_stats_collection")]
    pub game_stats_collection: String,
    #[serde(default = "default_players_collection")]
    pub players_collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_placeholder_prefix")]
    pub placeholder_prefix: String,
    #[serde(default)]
    pub game_stat_policy: UpsertPolicy,
    #[serde(default)]
    pub trailer_policy: TrailerPolicy,
    pub pending_dir: String,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Retry a failed store write once before giving up on the row.
    #[serde(default = "default_retry_failed_writes")]
    pub retry_failed_writes: bool,
}

/// How the trailing non-data row of an export is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailerPolicy {
    /// Always drop the last data row (the export format's contract).
    #[default]
    Positional,
    /// Drop the last data row only when it looks like a trailer: every
    /// field blank, or a blank `Player` field.
    Detect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub max_concurrent_files: usize,
    pub file_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    #[serde(default)]
    pub action: CleanupAction,
    #[serde(default)]
    pub archive_dir: Option<String>,
}

/// What happens to a source file once every row has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupAction {
    #[default]
    Delete,
    Archive,
    Keep,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the log file. Logs go to stderr when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_game_stats_collection() -> String {
    "gameStats".into()
}

fn default_players_collection() -> String {
    "playerData".into()
}

fn default_placeholder_prefix() -> String {
    "@/H".into()
}

fn default_max_file_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_retry_failed_writes() -> bool {
    true
}

impl Config {
    /// Where archived files go: `cleanup.archive_dir`, or `archive` under the
    /// pending directory when unset.
    pub fn archive_dir(&self) -> PathBuf {
        match &self.cleanup.archive_dir {
            Some(dir) => PathBuf::from(dir),
            None => Path::new(&self.ingest.pending_dir).join("archive"),
        }
    }
}

impl StoreConfig {
    /// The configured database path, or `moneyball.db` inside the platform
    /// data directory when none is set.
    pub fn resolved_db_path(&self) -> Result<String, ConfigError> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "", "moneyball").ok_or_else(|| {
            ConfigError::Invalid {
                field: "store.db_path".into(),
                reason: "not set and no home directory to derive a default from".into(),
            }
        })?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::Invalid {
            field: "store.db_path".into(),
            reason: format!("failed to create {}: {e}", data_dir.display()),
        })?;
        Ok(data_dir.join("moneyball.db").display().to_string())
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/ingest.toml` relative to
/// `base_dir`. Does not copy defaults; see [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE_NAME);
    let text = read_file(&path)?;
    let config = parse_config(&text, &path)?;
    validate(&config)?;
    Ok(config)
}

/// Parse config text without touching the filesystem. `path` is only used
/// for error reporting.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Seed `config/ingest.toml` from `defaults/ingest.toml` when the former
/// is missing. Returns the written path, or `None` when a config file was
/// already there. Never overwrites an existing file.
pub fn seed_from_defaults(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE_NAME);
    let defaults = base_dir.join("defaults").join(CONFIG_FILE_NAME);

    if target.exists() {
        return Ok(None);
    }
    if !defaults.exists() {
        if config_dir.exists() {
            // Loading reports the missing file itself.
            return Ok(None);
        }
        return Err(ConfigError::NoConfigDir {
            base: base_dir.to_path_buf(),
        });
    }

    let body = std::fs::read(&defaults).map_err(|source| ConfigError::Read {
        path: defaults.clone(),
        source,
    })?;
    let seed_err = |source| ConfigError::Seed {
        path: target.clone(),
        source,
    };
    std::fs::create_dir_all(&config_dir).map_err(seed_err)?;

    // `create_new` so a concurrently written config is kept, not clobbered.
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut file) => {
            std::io::Write::write_all(&mut file, &body).map_err(seed_err)?;
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(seed_err(e)),
    }
}

/// Copy defaults if needed, then load config from `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    seed_from_defaults(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let non_empty: &[(&str, &str)] = &[
        ("store.game_stats_collection", &config.store.game_stats_collection),
        ("store.players_collection", &config.store.players_collection),
        ("ingest.placeholder_prefix", &config.ingest.placeholder_prefix),
        ("ingest.pending_dir", &config.ingest.pending_dir),
    ];
    for (name, val) in non_empty {
        if val.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: name.to_string(),
                reason: "must not be empty".into(),
            });
        }
    }

    if config.store.game_stats_collection == config.store.players_collection {
        return Err(ConfigError::Invalid {
            field: "store.players_collection".into(),
            reason: format!(
                "must differ from game_stats_collection (both are `{}`)",
                config.store.players_collection
            ),
        });
    }

    if config.ingest.max_file_bytes == 0 {
        return Err(ConfigError::Invalid {
            field: "ingest.max_file_bytes".into(),
            reason: "must be > 0".into(),
        });
    }

    if config.batch.max_concurrent_files == 0 {
        return Err(ConfigError::Invalid {
            field: "batch.max_concurrent_files".into(),
            reason: "must be > 0".into(),
        });
    }

    if config.batch.file_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "batch.file_timeout_secs".into(),
            reason: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
