//! # API Shared
//!
//! Shared utilities and definitions for the high-risk patient monitor APIs.
//!
//! Contains:
//! - The health response type and `HealthService`
//! - API key authentication, independent of any HTTP framework

pub mod auth;
pub mod health;

pub use auth::{validate_api_key, ApiKey, AuthError};
pub use health::{HealthRes, HealthService};
