//! TLCM core
//!
//! Profile storage, client configuration synthesis and client launching
//! for the ThinLinc Connection Manager.

pub mod common;
pub mod config;
pub mod launch;
pub mod profiles;
pub mod synth;

pub use common::{AppError, AppResult, ErrorCode};
pub use config::Settings;
pub use launch::LaunchCoordinator;
pub use profiles::{AuthType, ProfileRecord, ProfileStore};
