//! Filtered, bounded view over the live high-risk patient feed.
//!
//! Counts are always taken over the full, unfiltered snapshot. The filtered list applies the
//! risk-level filter, then the alert-status filter, then keeps the first `max_display`
//! patients in the order the source delivered them.

use crate::constants::DEFAULT_MAX_DISPLAY;
use crate::error::HrpResult;
use crate::patient::{AlertStatus, HighRiskPatient, RiskLevel, Snapshot};
use crate::subscription::{SnapshotSource, Subscription};
use crate::validation::validate_max_display;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RiskLevelFilter {
    #[default]
    All,
    High,
    Medium,
}

impl RiskLevelFilter {
    pub fn matches(self, risk_level: RiskLevel) -> bool {
        match self {
            RiskLevelFilter::All => true,
            RiskLevelFilter::High => risk_level == RiskLevel::High,
            RiskLevelFilter::Medium => risk_level == RiskLevel::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AlertStatusFilter {
    #[default]
    All,
    New,
    Acknowledged,
    InProgress,
    Resolved,
}

impl AlertStatusFilter {
    pub fn matches(self, status: AlertStatus) -> bool {
        match self {
            AlertStatusFilter::All => true,
            AlertStatusFilter::New => status == AlertStatus::New,
            AlertStatusFilter::Acknowledged => status == AlertStatus::Acknowledged,
            AlertStatusFilter::InProgress => status == AlertStatus::InProgress,
            AlertStatusFilter::Resolved => status == AlertStatus::Resolved,
        }
    }
}

/// The user's current filter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default)]
    pub risk_level: RiskLevelFilter,
    #[serde(default)]
    pub alert_status: AlertStatusFilter,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        self.risk_level != RiskLevelFilter::All || self.alert_status != AlertStatusFilter::All
    }
}

/// Per-bucket counts over the unfiltered feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub new_alerts: usize,
    pub acknowledged: usize,
    pub in_progress: usize,
    pub resolved: usize,
}

impl PatientCounts {
    /// Counts every patient. Low-risk patients contribute to `total` only.
    pub fn from_patients(patients: &[HighRiskPatient]) -> Self {
        let mut counts = Self {
            total: patients.len(),
            ..Self::default()
        };
        for patient in patients {
            match patient.risk_level {
                RiskLevel::High => counts.high += 1,
                RiskLevel::Medium => counts.medium += 1,
                RiskLevel::Low => {}
            }
            match patient.alert_status {
                AlertStatus::New => counts.new_alerts += 1,
                AlertStatus::Acknowledged => counts.acknowledged += 1,
                AlertStatus::InProgress => counts.in_progress += 1,
                AlertStatus::Resolved => counts.resolved += 1,
            }
        }
        counts
    }
}

/// Applies `filters` and keeps at most `max_display` patients, preserving input order.
pub fn apply_filters(
    patients: &[HighRiskPatient],
    filters: &FilterState,
    max_display: usize,
) -> Vec<HighRiskPatient> {
    patients
        .iter()
        .filter(|p| filters.risk_level.matches(p.risk_level))
        .filter(|p| filters.alert_status.matches(p.alert_status))
        .take(max_display)
        .cloned()
        .collect()
}

struct FilterViewState {
    all_patients: Snapshot,
    filters: FilterState,
    loading: bool,
    closed: bool,
}

fn lock(state: &Mutex<FilterViewState>) -> MutexGuard<'_, FilterViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Live filter and aggregation over a [`SnapshotSource`].
///
/// Derived values are recomputed on read, so a filter change is visible to the very next
/// call without any debounce.
pub struct PatientFilterView {
    state: Arc<Mutex<FilterViewState>>,
    subscription: Subscription,
    max_display: usize,
}

impl PatientFilterView {
    /// Subscribes to `source` and keeps at most `max_display` patients in the filtered list.
    ///
    /// # Errors
    ///
    /// Returns `HrpError::InvalidInput` if `max_display` is zero.
    pub fn configure<S>(source: &S, max_display: usize) -> HrpResult<Self>
    where
        S: SnapshotSource + ?Sized,
    {
        let max_display = validate_max_display(max_display)?;
        Ok(Self::attach(source, max_display))
    }

    /// [`Self::configure`] with the default display bound of 50.
    pub fn configure_default<S>(source: &S) -> Self
    where
        S: SnapshotSource + ?Sized,
    {
        Self::attach(source, DEFAULT_MAX_DISPLAY)
    }

    fn attach<S>(source: &S, max_display: usize) -> Self
    where
        S: SnapshotSource + ?Sized,
    {
        let state = Arc::new(Mutex::new(FilterViewState {
            all_patients: Arc::from(Vec::new()),
            filters: FilterState::default(),
            loading: true,
            closed: false,
        }));

        let callback_state = state.clone();
        let subscription = source.subscribe(Arc::new(move |snapshot: Snapshot| {
            let mut state = lock(&callback_state);
            if state.closed {
                return;
            }
            tracing::debug!("filter view received {} patients", snapshot.len());
            state.all_patients = snapshot;
            state.loading = false;
        }));

        Self {
            state,
            subscription,
            max_display,
        }
    }

    pub fn max_display(&self) -> usize {
        self.max_display
    }

    pub fn filters(&self) -> FilterState {
        lock(&self.state).filters
    }

    /// Replaces the filter selection wholesale.
    pub fn set_filters(&self, filters: FilterState) {
        lock(&self.state).filters = filters;
    }

    /// Replaces the filter selection with the result of `update` applied to the current one.
    pub fn update_filters(&self, update: impl FnOnce(&FilterState) -> FilterState) {
        let mut state = lock(&self.state);
        let next = update(&state.filters);
        state.filters = next;
    }

    pub fn has_active_filters(&self) -> bool {
        lock(&self.state).filters.is_active()
    }

    /// The latest unfiltered snapshot.
    pub fn all_patients(&self) -> Snapshot {
        lock(&self.state).all_patients.clone()
    }

    pub fn filtered_patients(&self) -> Vec<HighRiskPatient> {
        let state = lock(&self.state);
        apply_filters(&state.all_patients, &state.filters, self.max_display)
    }

    pub fn patient_counts(&self) -> PatientCounts {
        PatientCounts::from_patients(&lock(&self.state).all_patients)
    }

    /// True until the first snapshot arrives.
    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    /// Detaches from the source. The last snapshot stays readable. Idempotent.
    pub fn unsubscribe(&mut self) {
        lock(&self.state).closed = true;
        self.subscription.unsubscribe();
    }
}

impl std::fmt::Debug for PatientFilterView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientFilterView")
            .field("max_display", &self.max_display)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HrpError;
    use crate::patient::test_support::{patient, snapshot};
    use crate::patient::Priority;
    use crate::subscription::test_support::ManualSource;

    /// 6 High (3 of them New) and 4 Medium patients.
    fn ward() -> Snapshot {
        let mut patients = Vec::new();
        for i in 0..6 {
            let status = if i < 3 {
                AlertStatus::New
            } else {
                AlertStatus::Acknowledged
            };
            patients.push(patient(&format!("h{i}"), RiskLevel::High, status, Priority::Critical));
        }
        for i in 0..4 {
            patients.push(patient(
                &format!("m{i}"),
                RiskLevel::Medium,
                AlertStatus::InProgress,
                Priority::High,
            ));
        }
        snapshot(patients)
    }

    #[test]
    fn loading_clears_on_first_snapshot() {
        let source = ManualSource::default();
        let view = PatientFilterView::configure_default(&source);
        assert!(!view.is_loading());
        assert_eq!(view.max_display(), 50);
        assert_eq!(view.patient_counts(), PatientCounts::default());
    }

    #[test]
    fn composes_risk_and_status_filters() {
        let source = ManualSource::with_initial(ward());
        let view = PatientFilterView::configure_default(&source);

        view.set_filters(FilterState {
            risk_level: RiskLevelFilter::High,
            alert_status: AlertStatusFilter::New,
        });
        let filtered = view.filtered_patients();
        assert_eq!(filtered.len(), 3);
        assert!(filtered
            .iter()
            .all(|p| p.risk_level == RiskLevel::High && p.alert_status == AlertStatus::New));
        assert!(view.has_active_filters());

        view.set_filters(FilterState::default());
        assert_eq!(view.filtered_patients().len(), 10);
        assert!(!view.has_active_filters());
    }

    #[test]
    fn counts_ignore_filters() {
        let source = ManualSource::with_initial(ward());
        let view = PatientFilterView::configure_default(&source);
        view.update_filters(|f| FilterState {
            risk_level: RiskLevelFilter::Medium,
            ..*f
        });

        assert_eq!(view.filtered_patients().len(), 4);
        assert_eq!(
            view.patient_counts(),
            PatientCounts {
                total: 10,
                high: 6,
                medium: 4,
                new_alerts: 3,
                acknowledged: 3,
                in_progress: 4,
                resolved: 0,
            }
        );
    }

    #[test]
    fn truncates_to_max_display_in_source_order() {
        let patients: Vec<_> = (0..80)
            .map(|i| patient(&i.to_string(), RiskLevel::High, AlertStatus::New, Priority::Critical))
            .collect();
        let source = ManualSource::with_initial(snapshot(patients));
        let view = PatientFilterView::configure(&source, 50).expect("valid bound");

        let filtered = view.filtered_patients();
        assert_eq!(filtered.len(), 50);
        assert_eq!(filtered[0].id, "0");
        assert_eq!(filtered[49].id, "49");
        assert_eq!(view.patient_counts().total, 80);
    }

    #[test]
    fn rejects_zero_max_display() {
        let source = ManualSource::default();
        let err = PatientFilterView::configure(&source, 0).expect_err("zero rejected");
        assert!(matches!(err, HrpError::InvalidInput(_)));
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn low_risk_patients_only_count_towards_total() {
        let counts = PatientCounts::from_patients(&[
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::Low, AlertStatus::New, Priority::Low),
        ]);
        assert_eq!(counts.total, 2);
        assert_eq!(counts.high + counts.medium, 1);
    }

    #[test]
    fn follows_each_new_snapshot() {
        let source = ManualSource::with_initial(ward());
        let view = PatientFilterView::configure_default(&source);
        assert_eq!(view.patient_counts().total, 10);

        source.push(snapshot(vec![patient(
            "x",
            RiskLevel::Medium,
            AlertStatus::Resolved,
            Priority::High,
        )]));
        assert_eq!(view.patient_counts().total, 1);
        assert_eq!(view.all_patients().len(), 1);
    }

    #[test]
    fn unsubscribe_freezes_the_view() {
        let source = ManualSource::with_initial(ward());
        let mut view = PatientFilterView::configure_default(&source);
        view.unsubscribe();
        view.unsubscribe();

        source.push(snapshot(Vec::new()));
        assert_eq!(view.patient_counts().total, 10);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn filter_state_deserialises_partial_selection() {
        let filters: FilterState =
            serde_json::from_str(r#"{"alertStatus":"InProgress"}"#).expect("parse filters");
        assert_eq!(filters.risk_level, RiskLevelFilter::All);
        assert_eq!(filters.alert_status, AlertStatusFilter::InProgress);
        assert!(filters.is_active());
    }
}
