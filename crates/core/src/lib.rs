//! # HRP Core
//!
//! Core logic for the real-time high-risk patient monitor.
//!
//! This crate contains:
//! - the high-risk patient record and its enums (`patient`)
//! - the snapshot subscription seam (`subscription`) and an in-memory store implementing it
//! - the notification engine, which diffs consecutive snapshots (`notifications`)
//! - the filter/aggregation engine behind the dashboard list (`filters`)
//!
//! **No API concerns**: HTTP servers, authentication and request types belong in `api-rest`
//! and `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod filters;
pub mod notifications;
pub mod patient;
pub mod store;
pub mod subscription;
pub mod validation;

pub use config::CoreConfig;
pub use error::{HrpError, HrpResult};
pub use filters::{
    apply_filters, AlertStatusFilter, FilterState, PatientCounts, PatientFilterView,
    RiskLevelFilter,
};
pub use hrp_types::{NonEmptyText, Probability, TextError};
pub use notifications::{
    diff_snapshots, Notification, NotificationEngine, NotificationKind, NotificationOptions,
    NotificationSink, Placement, Severity, SnapshotDiff, TracingSink,
};
pub use patient::{AlertStatus, HighRiskPatient, Priority, RiskLevel, Snapshot};
pub use store::{HighRiskPatientStore, HighRiskStats, PatientOrder, RiskAssessment};
pub use subscription::{SnapshotCallback, SnapshotSource, Subscription};
