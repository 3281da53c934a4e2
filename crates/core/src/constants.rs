//! Constants used throughout the high-risk patient core crate.
//!
//! Notification timings and placements mirror the dashboard's toast defaults so that any
//! presentation layer receiving a [`crate::Notification`] can render it unchanged.

/// Default upper bound on the number of patients returned by a filtered view.
pub const DEFAULT_MAX_DISPLAY: usize = 50;

/// How long a "new high-risk patient" alert stays on screen.
pub const NEW_PATIENT_ALERT_DURATION_MS: u64 = 8_000;

/// How long a status-change confirmation stays on screen.
pub const STATUS_CHANGE_DURATION_MS: u64 = 2_000;

/// Default REST listen address when `HRP_REST_ADDR` is not set.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";
