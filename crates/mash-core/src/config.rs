// Configuration loading and validation (config/mash.toml).

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::backend::LeaderboardPeriod;
use crate::wallet::ProviderId;

pub const CONFIG_FILE: &str = "mash.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub wallet: WalletConfig,
    pub polling: PollingConfig,
    pub battle: BattleConfig,
    pub leaderboard: LeaderboardConfig,
    pub db_path: String,
    /// Development wallet addresses keyed by provider.
    pub wallets: HashMap<ProviderId, String>,
}

/// Raw deserialization target for mash.toml.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    backend: BackendConfig,
    #[serde(default)]
    wallet: WalletConfig,
    polling: PollingConfig,
    battle: BattleConfig,
    leaderboard: LeaderboardSection,
    database: DatabaseSection,
    #[serde(default)]
    wallets: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
    /// How long an open wallet prompt may go unanswered.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_ms: default_liveness_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl WalletConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub stats_interval_secs: u64,
}

impl PollingConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BattleConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    pub history_len: usize,
    pub max_redraws: u32,
    pub next_round_delay_ms: u64,
}

impl BattleConfig {
    pub fn next_round_delay(&self) -> Duration {
        Duration::from_millis(self.next_round_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LeaderboardSection {
    period: String,
    limit: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct LeaderboardConfig {
    pub period: LeaderboardPeriod,
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_liveness_timeout_ms() -> u64 {
    3_000
}

fn default_connect_timeout_ms() -> u64 {
    120_000
}

fn default_pool_size() -> usize {
    20
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/mash.toml` relative to `base_dir`, without
/// copying defaults.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let period = LeaderboardPeriod::parse(&file.leaderboard.period).ok_or_else(|| {
        ConfigError::ValidationError {
            field: "leaderboard.period".into(),
            message: format!(
                "must be one of all, day, week, month; got `{}`",
                file.leaderboard.period
            ),
        }
    })?;

    let mut wallets = HashMap::new();
    for (name, address) in file.wallets {
        let provider: ProviderId = name.parse().map_err(|_| ConfigError::ValidationError {
            field: format!("wallets.{name}"),
            message: "unknown wallet provider".into(),
        })?;
        wallets.insert(provider, address);
    }

    let config = Config {
        backend: file.backend,
        wallet: file.wallet,
        polling: file.polling,
        battle: file.battle,
        leaderboard: LeaderboardConfig {
            period,
            limit: file.leaderboard.limit,
        },
        db_path: file.database.path,
        wallets,
    };

    validate(&config)?;

    Ok(config)
}

/// Make sure `config/mash.toml` exists, seeding it from
/// `defaults/mash.toml` on first run. An existing file is never touched.
/// Returns the path that was written, if any.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.exists() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let content = std::fs::read(&source).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!(
            "no {} and cannot read {}: {e}",
            target.display(),
            source.display()
        ),
    })?;

    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", dir.display()),
        })?;
    }
    // create_new so a file written concurrently is kept as is.
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                ConfigError::DefaultsCopyError {
                    message: format!("failed to write {}: {e}", target.display()),
                }
            })?;
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", target.display()),
        }),
    }
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    if let Some(path) = ensure_config_file(&cwd)? {
        info!("Seeded {} from defaults", path.display());
    }
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.backend.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "backend.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    let positive: &[(&str, u64)] = &[
        ("backend.request_timeout_ms", config.backend.request_timeout_ms),
        ("wallet.liveness_timeout_ms", config.wallet.liveness_timeout_ms),
        ("wallet.connect_timeout_ms", config.wallet.connect_timeout_ms),
        ("polling.stats_interval_secs", config.polling.stats_interval_secs),
        ("battle.pool_size", config.battle.pool_size as u64),
        ("battle.history_len", config.battle.history_len as u64),
        ("battle.max_redraws", u64::from(config.battle.max_redraws)),
        ("leaderboard.limit", config.leaderboard.limit as u64),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if config.battle.pool_size < 2 {
        return Err(ConfigError::ValidationError {
            field: "battle.pool_size".into(),
            message: format!("must be at least 2, got {}", config.battle.pool_size),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
