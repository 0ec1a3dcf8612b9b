//! ThinLinc Client Discovery
//!
//! Locates the `tlclient` executable and probes its version.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::common::{AppError, AppResult};

#[cfg(windows)]
pub const CLIENT_EXECUTABLE: &str = "tlclient.exe";
#[cfg(not(windows))]
pub const CLIENT_EXECUTABLE: &str = "tlclient";

/// Flag naming the configuration file to read
pub const CONFIG_FLAG: &str = "-C";

/// Argument that makes the client connect without prompting
#[cfg(windows)]
pub const AUTO_CONNECT_FLAG: &str = "/autoconnect";
#[cfg(not(windows))]
pub const AUTO_CONNECT_FLAG: &str = "-a";

/// Install locations checked after `PATH`
pub fn known_install_locations() -> Vec<PathBuf> {
    #[cfg(target_os = "linux")]
    let paths: &[&str] = &[
        "/opt/thinlinc/bin/tlclient",
        "/usr/bin/tlclient",
        "/usr/local/bin/tlclient",
    ];

    #[cfg(target_os = "macos")]
    let paths: &[&str] = &[
        "/Applications/ThinLinc Client.app/Contents/MacOS/tlclient",
        "/opt/thinlinc/bin/tlclient",
    ];

    #[cfg(windows)]
    let paths: &[&str] = &[
        r"C:\Program Files\ThinLinc Client\tlclient.exe",
        r"C:\Program Files (x86)\ThinLinc Client\tlclient.exe",
    ];

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    let paths: &[&str] = &["/opt/thinlinc/bin/tlclient", "/usr/local/bin/tlclient"];

    paths.iter().map(PathBuf::from).collect()
}

/// Search strategy for the client executable
#[derive(Debug, Clone)]
pub struct ClientLocator {
    /// Explicit location from settings, checked first
    pub configured: Option<PathBuf>,
    /// Value of `PATH` to search
    pub search_path: Option<OsString>,
    pub known_locations: Vec<PathBuf>,
}

impl ClientLocator {
    /// Locator for the running host
    pub fn for_host(configured: Option<PathBuf>) -> Self {
        Self {
            configured,
            search_path: std::env::var_os("PATH"),
            known_locations: known_install_locations(),
        }
    }

    /// Every candidate in search order
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(configured) = &self.configured {
            candidates.push(configured.clone());
        }

        if let Some(search_path) = &self.search_path {
            for dir in std::env::split_paths(search_path) {
                if dir.as_os_str().is_empty() {
                    continue;
                }
                candidates.push(dir.join(CLIENT_EXECUTABLE));
            }
        }

        candidates.extend(self.known_locations.iter().cloned());
        candidates
    }

    /// First usable candidate, or `ClientNotFound` listing all of them.
    pub fn locate(&self) -> AppResult<PathBuf> {
        let candidates = self.candidates();

        for candidate in &candidates {
            if is_executable(candidate) {
                info!("Found ThinLinc client at {:?}", candidate);
                return Ok(candidate.clone());
            }
            debug!("No ThinLinc client at {:?}", candidate);
        }

        Err(AppError::ClientNotFound {
            searched: candidates,
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Output of `tlclient --version`, for display only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientVersion {
    pub success: bool,
    pub text: String,
}

/// Run `<client> --version`, giving up after `timeout`.
///
/// The child is killed when the deadline passes; a timeout is reported, not
/// retried.
pub async fn probe_version(client: &Path, timeout: Duration) -> AppResult<ClientVersion> {
    let child = Command::new(client)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AppError::Spawn {
            program: client.to_path_buf(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(AppError::ProbeTimeout(timeout)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let text = if stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_string()
    } else {
        stdout
    };

    Ok(ClientVersion {
        success: output.status.success(),
        text,
    })
}
