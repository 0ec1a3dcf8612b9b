//! Profile management
//!
//! Named ThinLinc connection profiles and their durable store.

mod recovery;
mod store;

use serde::{Deserialize, Serialize};

use crate::common::{AppError, AppResult};

pub use recovery::{Consent, Recovery, RecoveryState};
pub use store::ProfileStore;

/// How the client authenticates against the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthType {
    #[default]
    Password,
    #[serde(rename = "SSH Key", alias = "ssh_key", alias = "SSHKey")]
    SshKey,
}

impl AuthType {
    /// Labels accepted in the profile document
    pub const LABELS: [&'static str; 4] = ["Password", "SSH Key", "ssh_key", "SSHKey"];

    pub fn label(&self) -> &'static str {
        match self {
            AuthType::Password => "Password",
            AuthType::SshKey => "SSH Key",
        }
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One named connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: String,
    pub server: String,
    pub username: String,
    pub auth_type: AuthType,
    /// Private key path for `SshKey`, empty otherwise. Never a secret itself.
    #[serde(default)]
    pub auth_data: String,
    #[serde(default)]
    pub auto_connect: bool,
}

impl ProfileRecord {
    /// Create a password-authenticated profile
    pub fn password(
        name: impl Into<String>,
        server: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            username: username.into(),
            auth_type: AuthType::Password,
            auth_data: String::new(),
            auto_connect: false,
        }
    }

    /// Create a key-authenticated profile
    pub fn ssh_key(
        name: impl Into<String>,
        server: impl Into<String>,
        username: impl Into<String>,
        key_path: impl Into<String>,
        auto_connect: bool,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            username: username.into(),
            auth_type: AuthType::SshKey,
            auth_data: key_path.into(),
            auto_connect,
        }
    }

    /// Field-level checks the caller runs before `add`/`update`.
    ///
    /// Values end up as single `KEY=value` lines in the client configuration,
    /// so control characters (line breaks in particular) are rejected.
    pub fn validate(&self) -> AppResult<()> {
        let mut fields = vec![
            ("name", &self.name),
            ("server", &self.server),
            ("username", &self.username),
        ];
        if self.auth_type == AuthType::SshKey {
            fields.push(("SSH key path", &self.auth_data));
        }

        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} cannot be empty", field)));
            }
            if value.chars().any(char::is_control) {
                return Err(AppError::Validation(format!(
                    "{} cannot contain control characters",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Canonical form: identity fields trimmed, and password profiles carry
    /// neither key data nor auto-connect.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.server = self.server.trim().to_string();
        self.username = self.username.trim().to_string();
        if self.auth_type == AuthType::Password {
            self.auth_data.clear();
            self.auto_connect = false;
        }
        self
    }

    /// Auto-connect only takes effect for key-based profiles
    pub fn wants_auto_connect(&self) -> bool {
        self.auth_type == AuthType::SshKey && self.auto_connect
    }
}
