//! Path Utilities
//!
//! Common path resolution for TLCM directories and files.

use std::path::PathBuf;

use super::{AppError, AppResult};

/// Environment variable that relocates the TLCM data directory
pub const HOME_ENV: &str = "TLCM_HOME";

/// Get the TLCM base directory (`$TLCM_HOME`, else `~/.tlcm/`)
pub fn tlcm_dir() -> AppResult<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(AppError::HomeDirUnavailable)?;
    Ok(home.join(".tlcm"))
}

/// The configuration the ThinLinc client itself maintains for the user.
/// It seeds every profile that has never been launched.
pub fn default_template_path() -> AppResult<PathBuf> {
    let home = dirs::home_dir().ok_or(AppError::HomeDirUnavailable)?;
    Ok(home.join(".thinlinc").join("tlclient.conf"))
}
