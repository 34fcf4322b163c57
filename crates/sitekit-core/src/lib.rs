//! # sitekit-core
//!
//! Core crate for SiteKit. Contains configuration schemas and the unified
//! error system shared by the plugin runtime, the CLI and the server.
//!
//! This crate has **no** internal dependencies on other SiteKit crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
