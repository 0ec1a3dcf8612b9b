//! Configuration management
//!
//! Reads and writes TLCM settings (`settings.json` in the data directory).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{default_template_path, tlcm_dir, write_atomic, AppError, AppResult};
use crate::profiles::ProfileStore;

pub const SETTINGS_FILE: &str = "settings.json";
pub const PROFILES_FILE: &str = "profiles.json";
pub const CONFIGS_DIR: &str = "configs";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Settings as stored on disk. Every field is optional; relative paths are
/// taken relative to the data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configs_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SettingsFile {
    /// Load settings; a missing file yields defaults.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| AppError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&mut self, path: &Path) -> AppResult<()> {
        self.updated_at = Some(Utc::now().to_rfc3339());

        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        write_atomic(path, content.as_bytes())?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub home: PathBuf,
    pub profiles_file: PathBuf,
    pub configs_dir: PathBuf,
    pub template_file: PathBuf,
    pub client_path: Option<PathBuf>,
    pub probe_timeout: Duration,
}

impl Settings {
    /// Load from `home` (or the default data directory) and resolve.
    pub fn load(home: Option<PathBuf>) -> AppResult<Self> {
        let home = match home {
            Some(home) => home,
            None => tlcm_dir()?,
        };
        let file = SettingsFile::load(&home.join(SETTINGS_FILE))?;
        Self::resolve(home, &file)
    }

    pub fn resolve(home: PathBuf, file: &SettingsFile) -> AppResult<Self> {
        let under_home = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                home.join(p)
            }
        };

        let template_file = match &file.template_file {
            Some(p) => under_home(p),
            None => default_template_path()?,
        };

        Ok(Self {
            profiles_file: file
                .profiles_file
                .as_ref()
                .map(under_home)
                .unwrap_or_else(|| home.join(PROFILES_FILE)),
            configs_dir: file
                .configs_dir
                .as_ref()
                .map(under_home)
                .unwrap_or_else(|| home.join(CONFIGS_DIR)),
            template_file,
            client_path: file.client_path.as_ref().map(under_home),
            probe_timeout: Duration::from_secs(
                file.probe_timeout_secs
                    .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS)
                    .max(1),
            ),
            home,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    pub fn profile_store(&self) -> ProfileStore {
        ProfileStore::new(self.profiles_file.clone())
    }
}
