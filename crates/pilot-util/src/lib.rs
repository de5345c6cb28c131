//! Shared utilities for pilot.
//!
//! This crate provides common utilities used across the pilot workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing
//! - Path utilities (platform directories, workspace-relative path checks)

pub mod id;
pub mod log;
pub mod path;

pub use id::{IdPrefix, Identifier};
pub use log::{LogConfig, LogLevel};
