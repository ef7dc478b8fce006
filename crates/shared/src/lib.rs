//! Shared types, errors, and configuration for Landed.
//!
//! This crate provides common types used across all other crates:
//! - Typed document names for type-safe references
//! - Collaborator-level error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, ExchangeRatePolicy, ReconcileConfig};
pub use error::{AppError, AppResult};
