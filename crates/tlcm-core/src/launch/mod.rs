//! Profile launching
//!
//! Turns "launch this profile" into a running ThinLinc client:
//!
//! 1. locate the client executable
//! 2. derive the per-profile configuration path from the profile name
//! 3. pick the base document (previous configuration, else the template)
//! 4. synthesize and write the configuration
//! 5. start the client on it without waiting for it to exit
//!
//! Any failing step aborts the sequence. Step 4 rewrites the whole file, so
//! a configuration left behind by an aborted launch is harmless.

pub mod client;

use std::ffi::OsString;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{info, warn};

use crate::common::{write_atomic, AppError, AppResult};
use crate::config::Settings;
use crate::profiles::ProfileRecord;
use crate::synth;

pub use client::{probe_version, ClientLocator, ClientVersion};

const CONFIG_PREFIX: &str = "tlclient_";
const CONFIG_SUFFIX: &str = ".conf";

/// File name of a profile's configuration. Characters other than ASCII
/// alphanumerics, `-`, `_` and `.` become `_`.
pub fn config_file_name(profile_name: &str) -> String {
    let normalized: String = profile_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}{}", CONFIG_PREFIX, normalized, CONFIG_SUFFIX)
}

/// Fail when `profile_name` would share its configuration file with another
/// stored profile. `current` is the profile being edited, whose own file
/// may be reused. An exact name match is left to the store's duplicate check.
pub fn check_config_name(
    profile_name: &str,
    current: Option<&str>,
    profiles: &[ProfileRecord],
) -> AppResult<()> {
    let file_name = config_file_name(profile_name);
    let clash = profiles.iter().find(|p| {
        Some(p.name.as_str()) != current
            && p.name != profile_name
            && config_file_name(&p.name) == file_name
    });

    match clash {
        Some(other) => Err(AppError::Validation(format!(
            "'{}' would share the client configuration {} with profile '{}'",
            profile_name, file_name, other.name
        ))),
        None => Ok(()),
    }
}

/// A launch that has written its configuration and is ready to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedLaunch {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub config_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub pid: u32,
    pub prepared: PreparedLaunch,
}

pub struct LaunchCoordinator {
    locator: ClientLocator,
    configs_dir: PathBuf,
    template_path: PathBuf,
}

impl LaunchCoordinator {
    pub fn new(locator: ClientLocator, configs_dir: PathBuf, template_path: PathBuf) -> Self {
        Self {
            locator,
            configs_dir,
            template_path,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            ClientLocator::for_host(settings.client_path.clone()),
            settings.configs_dir.clone(),
            settings.template_file.clone(),
        )
    }

    pub fn locator(&self) -> &ClientLocator {
        &self.locator
    }

    pub fn config_path(&self, profile_name: &str) -> PathBuf {
        self.configs_dir.join(config_file_name(profile_name))
    }

    /// Steps 1 to 4 plus building the command line.
    pub fn prepare(&self, profile: &ProfileRecord) -> AppResult<PreparedLaunch> {
        let program = self.locator.locate()?;
        let config_path = self.config_path(&profile.name);

        let base_text = self.base_text(profile, &config_path)?;
        let config = synth::synthesize(profile, &base_text);
        write_atomic(&config_path, config.as_bytes())?;
        info!(
            "Wrote configuration for '{}' to {:?}",
            profile.name, config_path
        );

        let mut args: Vec<OsString> = vec![
            client::CONFIG_FLAG.into(),
            config_path.clone().into_os_string(),
        ];
        if profile.wants_auto_connect() {
            args.push(client::AUTO_CONNECT_FLAG.into());
        }

        Ok(PreparedLaunch {
            program,
            args,
            config_path,
        })
    }

    /// Prepare and start the client. Returns once the process has started.
    pub fn launch(&self, profile: &ProfileRecord) -> AppResult<LaunchReport> {
        let prepared = self.prepare(profile)?;

        let child = Command::new(&prepared.program)
            .args(&prepared.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AppError::Spawn {
                program: prepared.program.clone(),
                source,
            })?;

        info!(
            "Started ThinLinc client for '{}' (pid {})",
            profile.name,
            child.id()
        );

        Ok(LaunchReport {
            pid: child.id(),
            prepared,
        })
    }

    /// Delete a profile's configuration. Returns whether one existed.
    pub fn remove_config(&self, profile_name: &str) -> AppResult<bool> {
        let path = self.config_path(profile_name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed configuration {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Carry a profile's configuration over to its new name. An existing
    /// file under the new name is never replaced.
    pub fn rename_config(&self, old_name: &str, new_name: &str) -> AppResult<bool> {
        let from = self.config_path(old_name);
        let to = self.config_path(new_name);
        if from == to || !from.exists() {
            return Ok(false);
        }
        if to.exists() {
            warn!("Not replacing existing configuration {:?}", to);
            return Err(AppError::Io(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            )));
        }
        fs::rename(&from, &to)?;
        Ok(true)
    }

    fn base_text(&self, profile: &ProfileRecord, config_path: &Path) -> AppResult<String> {
        match fs::read_to_string(config_path) {
            Ok(text) => return Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match fs::read_to_string(&self.template_path) {
            Ok(text) => {
                info!(
                    "Seeding configuration for '{}' from {:?}",
                    profile.name, self.template_path
                );
                Ok(text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::TemplateMissing {
                profile: profile.name.clone(),
                template: self.template_path.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
