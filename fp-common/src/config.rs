//! Configuration loading and root folder resolution

use crate::models::DEFAULT_MAX_PLAY_WEIGHT;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "FP_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "feedplay.db";

/// Default HTTP port of fp-server
pub const DEFAULT_PORT: u16 = 5780;

/// Contents of the optional TOML config file
///
/// Every field is optional; missing values fall back to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub dedup_window_hours: Option<u32>,
    pub ledger_max_attempts: Option<u32>,
    pub event_capacity: Option<usize>,
    pub max_play_weight: Option<f64>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load the config file if present, otherwise defaults
    ///
    /// A missing file is not an error; a malformed one is logged and ignored.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let candidate = path.map(Path::to_path_buf).or_else(default_config_path);
        match candidate {
            Some(p) if p.exists() => match Self::load(&p) {
                Ok(cfg) => {
                    info!("Loaded config file: {}", p.display());
                    cfg
                }
                Err(e) => {
                    warn!("{} - using defaults", e);
                    Self::default()
                }
            },
            Some(p) => {
                if path.is_some() {
                    warn!("Config file not found: {} - using defaults", p.display());
                }
                Self::default()
            }
            None => Self::default(),
        }
    }
}

/// Server settings after all sources are merged
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub root_folder: PathBuf,
    pub port: u16,
    pub dedup_window_hours: u32,
    pub ledger_max_attempts: u32,
    pub event_capacity: usize,
    /// Upper bound on the weight of one play
    pub max_play_weight: f64,
}

impl ServerConfig {
    /// Merge CLI values over the TOML file over compiled defaults
    pub fn resolve(cli_root: Option<&Path>, cli_port: Option<u16>, toml: &TomlConfig) -> Self {
        Self {
            root_folder: resolve_root_folder(cli_root, ROOT_FOLDER_ENV, toml),
            port: cli_port.or(toml.port).unwrap_or(DEFAULT_PORT),
            dedup_window_hours: toml.dedup_window_hours.unwrap_or(24),
            ledger_max_attempts: toml.ledger_max_attempts.unwrap_or(3).max(1),
            event_capacity: toml.event_capacity.unwrap_or(256).max(1),
            max_play_weight: toml
                .max_play_weight
                .filter(|w| w.is_finite() && *w >= 1.0)
                .unwrap_or(DEFAULT_MAX_PLAY_WEIGHT),
        }
    }

    /// Path of the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// User config file location (`<config_dir>/feedplay/config.toml`)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("feedplay").join("config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("feedplay"))
        .unwrap_or_else(|| PathBuf::from("./feedplay_data"))
}
