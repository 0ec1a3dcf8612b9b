//! Common Utilities
//!
//! Shared types, error handling, and utility functions used across the crate.

pub mod atomic;
pub mod error;
pub mod paths;
pub mod result;

pub use atomic::write_atomic;
pub use error::{AppError, ErrorCode};
pub use paths::{default_template_path, tlcm_dir, HOME_ENV};
pub use result::AppResult;
