use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::anomaly::DetectorSettings;
use crate::db::DB_FILE;
use crate::error::{Result, SpendError};
use crate::reports::DEFAULT_BREAKDOWN_THRESHOLD;

pub const CATEGORIES_FILE: &str = "categories.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Overrides `<data_dir>/categories.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories_file: Option<String>,
    #[serde(default = "default_breakdown_threshold")]
    pub breakdown_threshold: f64,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
}

fn default_breakdown_threshold() -> f64 {
    DEFAULT_BREAKDOWN_THRESHOLD
}

fn default_server_addr() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            categories_file: None,
            breakdown_threshold: default_breakdown_threshold(),
            detector: DetectorSettings::default(),
            server_addr: default_server_addr(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join(DB_FILE)
    }

    pub fn categories_path(&self) -> PathBuf {
        match &self.categories_file {
            Some(path) => PathBuf::from(path),
            None => self.data_path().join(CATEGORIES_FILE),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_path().join("uploads")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("spendlens")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("spendlens")
}

/// Load settings, falling back to defaults when the file is absent. A file
/// that exists but does not parse is an error.
pub fn load_settings() -> Result<Settings> {
    let path = settings_path();
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| SpendError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| SpendError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
