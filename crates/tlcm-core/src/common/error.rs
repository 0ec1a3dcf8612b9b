//! Common Error Types
//!
//! Unified error handling with stable numeric codes.

use std::path::PathBuf;
use std::time::Duration;

/// Stable error codes
///
/// The command-line shell uses these as its process exit status, so the
/// values must not be reused once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Caller-side field validation
    Validation = 2,

    // Store-level, recoverable by re-prompting
    DuplicateName = 3,
    NotFound = 4,

    // Store-level, recoverable only through an approved reset
    Corruption = 5,
    Schema = 6,

    // Launch-level, terminal for the attempt
    ClientNotFound = 7,
    TemplateMissing = 8,
    ProbeTimeout = 9,
    SpawnFailed = 10,

    // Generic application error
    GenericError = 11,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid profile: {0}")]
    Validation(String),

    #[error("A profile named '{0}' already exists")]
    DuplicateName(String),

    #[error("No profile named '{0}'")]
    NotFound(String),

    #[error("Profile document {} is corrupted: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    #[error("Profile document {} has an invalid entry at index {index}: {detail}", path.display())]
    Schema {
        path: PathBuf,
        index: usize,
        detail: String,
    },

    #[error("ThinLinc client not found (searched {} locations)", searched.len())]
    ClientNotFound { searched: Vec<PathBuf> },

    #[error(
        "No configuration exists for profile '{profile}' and the template {} is missing",
        template.display()
    )]
    TemplateMissing { profile: String, template: PathBuf },

    #[error("Client version probe timed out after {}s", .0.as_secs())]
    ProbeTimeout(Duration),

    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Recovery error: {0}")]
    Recovery(String),

    #[error("Settings file {} is invalid: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    #[error("Could not determine home directory")]
    HomeDirUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::Validation,
            AppError::DuplicateName(_) => ErrorCode::DuplicateName,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Corruption { .. } => ErrorCode::Corruption,
            AppError::Schema { .. } => ErrorCode::Schema,
            AppError::ClientNotFound { .. } => ErrorCode::ClientNotFound,
            AppError::TemplateMissing { .. } => ErrorCode::TemplateMissing,
            AppError::ProbeTimeout(_) => ErrorCode::ProbeTimeout,
            AppError::Spawn { .. } => ErrorCode::SpawnFailed,
            AppError::Recovery(_)
            | AppError::Settings { .. }
            | AppError::HomeDirUnavailable
            | AppError::Io(_)
            | AppError::Json(_) => ErrorCode::GenericError,
        }
    }

    /// Whether the profile document needs an approved reset before the
    /// store can be used again.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, AppError::Corruption { .. } | AppError::Schema { .. })
    }

    /// Guidance shown alongside launch-level failures
    pub fn remediation(&self) -> Option<String> {
        match self {
            AppError::ClientNotFound { searched } => {
                let mut hint = String::from(
                    "Install the ThinLinc client or set its location with \
                     `tlcm settings set --client <path>`. Searched:",
                );
                for path in searched {
                    hint.push_str("\n  ");
                    hint.push_str(&path.display().to_string());
                }
                Some(hint)
            }
            AppError::TemplateMissing { template, .. } => Some(format!(
                "Run the ThinLinc client once to create {}, or point \
                 `tlcm settings set --template <path>` at an existing configuration.",
                template.display()
            )),
            AppError::ProbeTimeout(_) => Some(
                "The client did not answer in time; raise the limit with \
                 `tlcm settings set --probe-timeout <secs>`."
                    .to_string(),
            ),
            AppError::Corruption { .. } | AppError::Schema { .. } => Some(
                "Run `tlcm recover` to back up the damaged file and start with an empty list."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_taxonomy() {
        let errors = [
            AppError::Validation("name".into()),
            AppError::DuplicateName("a".into()),
            AppError::NotFound("a".into()),
            AppError::Corruption {
                path: PathBuf::from("p"),
                reason: "r".into(),
            },
            AppError::Schema {
                path: PathBuf::from("p"),
                index: 0,
                detail: "d".into(),
            },
            AppError::ClientNotFound { searched: vec![] },
            AppError::TemplateMissing {
                profile: "a".into(),
                template: PathBuf::from("t"),
            },
            AppError::ProbeTimeout(Duration::from_secs(1)),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.code().code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_needs_recovery() {
        let corrupt = AppError::Corruption {
            path: PathBuf::from("p"),
            reason: "r".into(),
        };
        assert!(corrupt.needs_recovery());
        assert!(!AppError::NotFound("a".into()).needs_recovery());
    }

    #[test]
    fn test_client_not_found_remediation_lists_paths() {
        let err = AppError::ClientNotFound {
            searched: vec![PathBuf::from("/opt/thinlinc/bin/tlclient")],
        };
        let hint = err.remediation().unwrap();
        assert!(hint.contains("/opt/thinlinc/bin/tlclient"));
        assert!(AppError::DuplicateName("a".into()).remediation().is_none());
    }
}
