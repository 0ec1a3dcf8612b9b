//! Corruption recovery
//!
//! A damaged profile document is never reset without the user's say-so.
//! Recovery is an explicit state machine:
//!
//! ```text
//! Detected ──request_consent──▶ AwaitingConsent ──Decline──▶ Aborted
//!                                              └──Approve──▶ Reset { backup }
//! ```
//!
//! Declining leaves the document untouched; every later store operation
//! keeps reporting the same error until a reset is approved.

use std::path::{Path, PathBuf};

use tracing::info;

use super::ProfileStore;
use crate::common::{AppError, AppResult};

const BACKUP_SUFFIX: &str = ".backup";

/// The user's answer to the recovery question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    Approve,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryState {
    Detected,
    AwaitingConsent,
    Aborted,
    Reset { backup: PathBuf },
}

#[derive(Debug)]
pub struct Recovery {
    path: PathBuf,
    reason: String,
    state: RecoveryState,
}

impl Recovery {
    pub(crate) fn detected(path: PathBuf, cause: &AppError) -> Self {
        Self {
            path,
            reason: cause.to_string(),
            state: RecoveryState::Detected,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Move to `AwaitingConsent` and return the question to put to the user.
    pub fn request_consent(&mut self) -> AppResult<String> {
        if self.state != RecoveryState::Detected {
            return Err(AppError::Recovery(format!(
                "consent already requested (state: {:?})",
                self.state
            )));
        }
        self.state = RecoveryState::AwaitingConsent;

        Ok(format!(
            "{}\nRename it to {} and start with an empty profile list?",
            self.reason,
            backup_path_for(&self.path).display()
        ))
    }

    /// Apply the user's decision. Approval renames the damaged document and
    /// writes a fresh empty one.
    pub fn resolve(&mut self, consent: Consent) -> AppResult<&RecoveryState> {
        if self.state != RecoveryState::AwaitingConsent {
            return Err(AppError::Recovery(format!(
                "cannot resolve recovery in state {:?}",
                self.state
            )));
        }

        self.state = match consent {
            Consent::Decline => {
                info!("Recovery of {:?} declined; document left as is", self.path);
                RecoveryState::Aborted
            }
            Consent::Approve => {
                let backup = self.reset()?;
                RecoveryState::Reset { backup }
            }
        };

        Ok(&self.state)
    }

    fn reset(&self) -> AppResult<PathBuf> {
        let backup = backup_path_for(&self.path);
        std::fs::rename(&self.path, &backup)?;
        info!("Moved damaged profile document to {:?}", backup);

        ProfileStore::new(self.path.clone()).save(&[])?;
        Ok(backup)
    }
}

/// `<file>.backup`, or `<file>.backup.N` with the first free N when earlier
/// backups exist.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let base = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

    let mut name = base.clone();
    name.push(BACKUP_SUFFIX);
    let candidate = path.with_file_name(&name);
    if !candidate.exists() {
        return candidate;
    }

    let mut n = 1u32;
    loop {
        let mut name = base.clone();
        name.push(format!("{}.{}", BACKUP_SUFFIX, n));
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}
