use copypasta_types::ItemType;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable names - single source of truth
pub mod env_vars {
    /// Root directory for `notes/`, `files/` and the metadata database. Required.
    pub const DATA_DIR: &str = "COPYPASTA_DATA_DIR";
    pub const PORT: &str = "PORT";
    pub const BIND_ADDR: &str = "COPYPASTA_BIND_ADDR";
    pub const RETENTION_DAYS: &str = "COPYPASTA_RETENTION_DAYS";
    pub const MAX_UPLOAD_MB: &str = "COPYPASTA_MAX_UPLOAD_MB";
    pub const SWEEP_INTERVAL_SECS: &str = "COPYPASTA_SWEEP_INTERVAL_SECS";
    /// "manual" (order field ascending) or "newest" (createdAt descending)
    pub const LIST_ORDER: &str = "COPYPASTA_LIST_ORDER";
    /// "top" (min order - 1) or "bottom" (max order + 1)
    pub const NEW_ITEM_POSITION: &str = "COPYPASTA_NEW_ITEM_POSITION";
    /// Optional directory holding the built browser UI
    pub const FRONTEND_DIR: &str = "COPYPASTA_FRONTEND_DIR";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 3000;
    pub const BIND_ADDR: &str = "0.0.0.0";
    pub const RETENTION_DAYS: i64 = 14;
    pub const MAX_UPLOAD_MB: u64 = 50;
    pub const SWEEP_INTERVAL_SECS: u64 = 3600;
    pub const DATABASE_FILE: &str = ".copypasta.db";
}

/// How `list` sequences items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ListOrder {
    /// `order` ascending, then `createdAt` descending
    #[default]
    Manual,
    /// `createdAt` descending
    Newest,
}

/// Where a newly inserted item lands in the manual order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InsertPosition {
    #[default]
    Top,
    Bottom,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub port: u16,
    pub bind_addr: String,
    pub retention_days: i64,
    pub max_upload_bytes: u64,
    pub sweep_interval_secs: u64,
    pub list_order: ListOrder,
    pub insert_position: InsertPosition,
    pub frontend_dir: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment.
    /// Fails when the data directory is not configured.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(env_vars::DATA_DIR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("{} environment variable not set", env_vars::DATA_DIR))?;

        let retention_days: i64 = parse_or(&lookup, env_vars::RETENTION_DAYS, defaults::RETENTION_DAYS)?;
        if retention_days <= 0 {
            return Err(format!("{} must be at least 1", env_vars::RETENTION_DAYS));
        }

        let max_upload_mb: u64 = parse_or(&lookup, env_vars::MAX_UPLOAD_MB, defaults::MAX_UPLOAD_MB)?;
        let sweep_interval_secs: u64 =
            parse_or(&lookup, env_vars::SWEEP_INTERVAL_SECS, defaults::SWEEP_INTERVAL_SECS)?;
        if sweep_interval_secs == 0 {
            return Err(format!("{} must be at least 1", env_vars::SWEEP_INTERVAL_SECS));
        }

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            port: parse_or(&lookup, env_vars::PORT, defaults::PORT)?,
            bind_addr: lookup(env_vars::BIND_ADDR).unwrap_or_else(|| defaults::BIND_ADDR.to_string()),
            retention_days,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            sweep_interval_secs,
            list_order: parse_or(&lookup, env_vars::LIST_ORDER, ListOrder::default())?,
            insert_position: parse_or(&lookup, env_vars::NEW_ITEM_POSITION, InsertPosition::default())?,
            frontend_dir: lookup(env_vars::FRONTEND_DIR)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Directory holding note bodies
    pub fn notes_dir(&self) -> PathBuf {
        self.data_dir.join(ItemType::Note.dir_name())
    }

    /// Directory holding uploaded files
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join(ItemType::File.dir_name())
    }

    /// Path to the SQLite metadata database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(defaults::DATABASE_FILE)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value for {}: {} ({})", key, raw, e)),
        _ => Ok(default),
    }
}

/// Create the data root and its storage directories.
/// Called once at startup before the store is opened.
pub fn initialize_data_dir(config: &Config) -> std::io::Result<()> {
    for dir in [config.data_dir.clone(), config.notes_dir(), config.files_dir()] {
        if dir.exists() {
            log::info!("Directory exists: {:?}", dir);
        } else {
            log::info!("Creating directory: {:?}", dir);
            std::fs::create_dir_all(&dir)?;
        }
    }
    Ok(())
}

/// Returns the frontend directory if it is configured and present on disk
pub fn frontend_dir_if_present(config: &Config) -> Option<&Path> {
    config
        .frontend_dir
        .as_deref()
        .filter(|dir| dir.join("index.html").exists())
}
