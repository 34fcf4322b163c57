//! Convenience result type alias for SiteKit.

use crate::error::AppError;

/// A specialized `Result` type for SiteKit operations.
pub type AppResult<T> = Result<T, AppError>;
