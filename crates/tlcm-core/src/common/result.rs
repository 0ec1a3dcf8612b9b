//! Common Result Type
//!
//! Type alias for application results.

use super::error::AppError;

/// Application result type
///
/// Uses AppError for consistent error handling across the crate.
pub type AppResult<T> = Result<T, AppError>;
