//! Real-time notifications for the high-risk patient feed.
//!
//! The [`NotificationEngine`] keeps the latest snapshot it has seen and compares each new
//! snapshot against it:
//! - a `New` alert whose id was not in the previous snapshot raises a high-priority alert and
//!   bumps the unread counter,
//! - an existing patient moving to `InProgress` or `Resolved` raises a confirmation when status
//!   notifications are enabled.
//!
//! Nothing is compared while the previous snapshot is empty, so the initial load never
//! floods the sink.

use crate::constants::{NEW_PATIENT_ALERT_DURATION_MS, STATUS_CHANGE_DURATION_MS};
use crate::patient::{AlertStatus, HighRiskPatient, Priority, RiskLevel, Snapshot};
use crate::subscription::{SnapshotSource, Subscription};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Options accepted by [`NotificationEngine::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationOptions {
    /// When false the engine never subscribes and stays inert.
    pub enabled: bool,
    pub notify_new_patients: bool,
    pub notify_status_changes: bool,
    /// Reserved. The unread counter is only reset through
    /// [`NotificationEngine::mark_notifications_as_read`].
    pub auto_mark_as_read: bool,
}

impl Default for NotificationOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            notify_new_patients: true,
            notify_status_changes: false,
            auto_mark_as_read: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Demands attention; rendered as an error-styled toast.
    Alert,
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    TopRight,
    TopCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewHighRiskPatient,
    StatusChanged(AlertStatus),
}

/// A fire-and-forget message for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Record id of the patient the notification is about.
    pub patient_id: String,
    pub kind: NotificationKind,
    pub severity: Severity,
    pub message: String,
    pub duration: Duration,
    pub placement: Placement,
}

impl Notification {
    fn new_patient(patient: &HighRiskPatient) -> Self {
        Self {
            patient_id: patient.id.clone(),
            kind: NotificationKind::NewHighRiskPatient,
            severity: Severity::Alert,
            message: format!("New High-Risk Patient: {}", patient.name),
            duration: Duration::from_millis(NEW_PATIENT_ALERT_DURATION_MS),
            placement: Placement::TopRight,
        }
    }

    /// Only positive outcomes get a confirmation; other transitions return `None`.
    fn status_change(patient: &HighRiskPatient) -> Option<Self> {
        let message = match patient.alert_status {
            AlertStatus::Resolved => format!("{} status updated to Resolved", patient.name),
            AlertStatus::InProgress => format!("{} is now being monitored", patient.name),
            AlertStatus::New | AlertStatus::Acknowledged => return None,
        };

        Some(Self {
            patient_id: patient.id.clone(),
            kind: NotificationKind::StatusChanged(patient.alert_status),
            severity: Severity::Success,
            message,
            duration: Duration::from_millis(STATUS_CHANGE_DURATION_MS),
            placement: Placement::TopCenter,
        })
    }
}

/// Receives notifications. Delivery is fire-and-forget: failures stay inside the sink.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Writes every notification to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Alert => tracing::warn!(
                patient_id = %notification.patient_id,
                "{}",
                notification.message
            ),
            Severity::Success => tracing::info!(
                patient_id = %notification.patient_id,
                "{}",
                notification.message
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusChange<'a> {
    pub patient: &'a HighRiskPatient,
    pub previous: AlertStatus,
}

/// What changed between two consecutive snapshots.
#[derive(Debug, Default, PartialEq)]
pub struct SnapshotDiff<'a> {
    /// `New` alerts whose id is absent from the previous snapshot, in current order.
    pub new_alerts: Vec<&'a HighRiskPatient>,
    /// Patients present in both snapshots whose alert status differs.
    pub status_changes: Vec<StatusChange<'a>>,
}

/// Compares two snapshots by record id. Fields other than `alert_status` are ignored.
pub fn diff_snapshots<'a>(
    previous: &[HighRiskPatient],
    current: &'a [HighRiskPatient],
) -> SnapshotDiff<'a> {
    let previous_by_id: HashMap<&str, &HighRiskPatient> =
        previous.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut diff = SnapshotDiff::default();
    for patient in current {
        match previous_by_id.get(patient.id.as_str()) {
            None if patient.is_new_alert() => diff.new_alerts.push(patient),
            None => {}
            Some(before) if before.alert_status != patient.alert_status => {
                diff.status_changes.push(StatusChange {
                    patient,
                    previous: before.alert_status,
                });
            }
            Some(_) => {}
        }
    }
    diff
}

/// Patients with High risk whose alert is still `New`.
pub fn high_risk_count(patients: &[HighRiskPatient]) -> usize {
    patients
        .iter()
        .filter(|p| p.risk_level == RiskLevel::High && p.is_new_alert())
        .count()
}

/// Patients with Critical priority whose alert is still `New`.
pub fn critical_count(patients: &[HighRiskPatient]) -> usize {
    patients
        .iter()
        .filter(|p| p.priority == Priority::Critical && p.is_new_alert())
        .count()
}

struct NotificationState {
    patients: Snapshot,
    new_patient_count: usize,
    loading: bool,
    closed: bool,
}

fn lock(state: &Mutex<NotificationState>) -> MutexGuard<'_, NotificationState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NotificationState {
    /// Retains `snapshot` and returns the notifications it triggers.
    fn apply(&mut self, snapshot: Snapshot, options: &NotificationOptions) -> Vec<Notification> {
        let previous = std::mem::replace(&mut self.patients, snapshot);
        self.loading = false;

        if previous.is_empty() {
            return Vec::new();
        }

        let diff = diff_snapshots(&previous, &self.patients);
        let mut out = Vec::new();

        if options.notify_new_patients && !diff.new_alerts.is_empty() {
            out.extend(diff.new_alerts.iter().map(|p| Notification::new_patient(p)));
            self.new_patient_count += diff.new_alerts.len();
        }

        if options.notify_status_changes {
            out.extend(
                diff.status_changes
                    .iter()
                    .filter_map(|change| Notification::status_change(change.patient)),
            );
        }

        out
    }
}

/// Watches a [`SnapshotSource`] and raises notifications for new and progressing alerts.
///
/// The engine owns its last-seen snapshot and unread counter. Dropping it, or calling
/// [`NotificationEngine::unsubscribe`], detaches it from the source.
pub struct NotificationEngine {
    state: Arc<Mutex<NotificationState>>,
    subscription: Subscription,
    options: NotificationOptions,
}

impl NotificationEngine {
    /// Subscribes to `source` (unless disabled) and routes notifications to `sink`.
    ///
    /// The snapshot delivered on subscription only seeds the engine.
    pub fn observe<S>(
        source: &S,
        sink: impl NotificationSink + 'static,
        options: NotificationOptions,
    ) -> Self
    where
        S: SnapshotSource + ?Sized,
    {
        let state = Arc::new(Mutex::new(NotificationState {
            patients: Arc::from(Vec::new()),
            new_patient_count: 0,
            loading: true,
            closed: false,
        }));

        if !options.enabled {
            tracing::debug!("high-risk notifications disabled; not subscribing");
            return Self {
                state,
                subscription: Subscription::detached(),
                options,
            };
        }

        let callback_state = state.clone();
        let subscription = source.subscribe(Arc::new(move |snapshot: Snapshot| {
            let notifications = {
                let mut state = lock(&callback_state);
                if state.closed {
                    return;
                }
                tracing::debug!("notification engine received {} patients", snapshot.len());
                state.apply(snapshot, &options)
            };

            for notification in notifications {
                sink.notify(notification);
            }
        }));

        Self {
            state,
            subscription,
            options,
        }
    }

    /// Stops diffing and detaches from the source. Idempotent.
    pub fn unsubscribe(&mut self) {
        lock(&self.state).closed = true;
        self.subscription.unsubscribe();
    }

    pub fn options(&self) -> NotificationOptions {
        self.options
    }

    /// The latest snapshot received.
    pub fn patients(&self) -> Snapshot {
        lock(&self.state).patients.clone()
    }

    /// New-patient alerts raised since the last [`Self::mark_notifications_as_read`].
    pub fn new_patient_count(&self) -> usize {
        lock(&self.state).new_patient_count
    }

    /// True until the first snapshot arrives.
    pub fn is_loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn high_risk_count(&self) -> usize {
        high_risk_count(&lock(&self.state).patients)
    }

    pub fn critical_count(&self) -> usize {
        critical_count(&lock(&self.state).patients)
    }

    /// Resets the unread counter. Patient records are left untouched.
    pub fn mark_notifications_as_read(&self) {
        lock(&self.state).new_patient_count = 0;
    }
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEngine")
            .field("options", &self.options)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::test_support::{patient, snapshot};
    use crate::subscription::test_support::ManualSource;

    fn recording_sink() -> (impl NotificationSink, Arc<Mutex<Vec<Notification>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink = move |n: Notification| sink_seen.lock().expect("lock").push(n);
        (sink, seen)
    }

    fn all_on() -> NotificationOptions {
        NotificationOptions {
            notify_status_changes: true,
            ..NotificationOptions::default()
        }
    }

    #[test]
    fn defaults_match_dashboard_hook() {
        let options = NotificationOptions::default();
        assert!(options.enabled);
        assert!(options.notify_new_patients);
        assert!(!options.notify_status_changes);
        assert!(options.auto_mark_as_read);
    }

    #[test]
    fn first_snapshot_never_notifies() {
        let source = ManualSource::default();
        let (sink, seen) = recording_sink();
        let engine = NotificationEngine::observe(&source, sink, all_on());

        source.push(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("3", RiskLevel::Medium, AlertStatus::New, Priority::High),
        ]));

        assert!(seen.lock().expect("lock").is_empty());
        assert_eq!(engine.new_patient_count(), 0);
        assert_eq!(engine.patients().len(), 3);
        assert!(!engine.is_loading());
    }

    #[test]
    fn reports_new_patient_and_status_change() {
        let source = ManualSource::with_initial(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::New,
            Priority::Critical,
        )]));
        let (sink, seen) = recording_sink();
        let engine = NotificationEngine::observe(&source, sink, all_on());
        assert!(seen.lock().expect("lock").is_empty());

        source.push(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::InProgress, Priority::Critical),
            patient("2", RiskLevel::Medium, AlertStatus::New, Priority::High),
        ]));

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);

        let new_alerts: Vec<_> = seen
            .iter()
            .filter(|n| n.kind == NotificationKind::NewHighRiskPatient)
            .collect();
        assert_eq!(new_alerts.len(), 1);
        assert_eq!(new_alerts[0].patient_id, "2");
        assert_eq!(new_alerts[0].severity, Severity::Alert);
        assert_eq!(new_alerts[0].duration, Duration::from_millis(8_000));
        assert_eq!(new_alerts[0].placement, Placement::TopRight);

        let changes: Vec<_> = seen
            .iter()
            .filter(|n| n.kind == NotificationKind::StatusChanged(AlertStatus::InProgress))
            .collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].patient_id, "1");
        assert_eq!(changes[0].severity, Severity::Success);

        assert_eq!(engine.new_patient_count(), 1);
    }

    #[test]
    fn status_changes_are_silent_by_default() {
        let source = ManualSource::with_initial(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::New,
            Priority::Critical,
        )]));
        let (sink, seen) = recording_sink();
        let _engine = NotificationEngine::observe(&source, sink, NotificationOptions::default());

        source.push(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::Resolved,
            Priority::Critical,
        )]));

        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn acknowledged_and_new_transitions_are_not_confirmed() {
        let source = ManualSource::with_initial(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::Resolved, Priority::Critical),
        ]));
        let (sink, seen) = recording_sink();
        let _engine = NotificationEngine::observe(&source, sink, all_on());

        source.push(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::Acknowledged, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical),
        ]));

        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn unchanged_status_with_other_edits_is_silent() {
        let source = ManualSource::with_initial(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::Acknowledged,
            Priority::Critical,
        )]));
        let (sink, seen) = recording_sink();
        let _engine = NotificationEngine::observe(&source, sink, all_on());

        let mut edited = patient("1", RiskLevel::Medium, AlertStatus::Acknowledged, Priority::High);
        edited.notes = Some("called family".into());
        source.push(snapshot(vec![edited]));

        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn new_patient_alerts_can_be_disabled() {
        let source = ManualSource::with_initial(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::New,
            Priority::Critical,
        )]));
        let (sink, seen) = recording_sink();
        let options = NotificationOptions {
            notify_new_patients: false,
            ..NotificationOptions::default()
        };
        let engine = NotificationEngine::observe(&source, sink, options);

        source.push(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical),
        ]));

        assert!(seen.lock().expect("lock").is_empty());
        assert_eq!(engine.new_patient_count(), 0);
        assert_eq!(engine.patients().len(), 2);
    }

    #[test]
    fn disabled_engine_never_subscribes() {
        let source = ManualSource::default();
        let (sink, seen) = recording_sink();
        let engine = NotificationEngine::observe(
            &source,
            sink,
            NotificationOptions {
                enabled: false,
                ..NotificationOptions::default()
            },
        );

        assert_eq!(source.subscriber_count(), 0);
        source.push(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::New,
            Priority::Critical,
        )]));
        assert!(engine.is_loading());
        assert!(engine.patients().is_empty());
        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn mark_as_read_is_idempotent() {
        let source = ManualSource::with_initial(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::New,
            Priority::Critical,
        )]));
        let (sink, _seen) = recording_sink();
        let engine = NotificationEngine::observe(&source, sink, NotificationOptions::default());

        source.push(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("3", RiskLevel::Medium, AlertStatus::New, Priority::High),
        ]));
        assert_eq!(engine.new_patient_count(), 2);

        engine.mark_notifications_as_read();
        assert_eq!(engine.new_patient_count(), 0);
        engine.mark_notifications_as_read();
        assert_eq!(engine.new_patient_count(), 0);
        assert_eq!(engine.patients().len(), 3);
    }

    #[test]
    fn derived_counts_follow_latest_snapshot() {
        let source = ManualSource::with_initial(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::Acknowledged, Priority::Critical),
            patient("3", RiskLevel::Medium, AlertStatus::New, Priority::Critical),
            patient("4", RiskLevel::Medium, AlertStatus::New, Priority::High),
        ]));
        let (sink, _seen) = recording_sink();
        let engine = NotificationEngine::observe(&source, sink, NotificationOptions::default());

        assert_eq!(engine.high_risk_count(), 1);
        assert_eq!(engine.critical_count(), 2);

        source.push(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::Resolved,
            Priority::Critical,
        )]));
        assert_eq!(engine.high_risk_count(), 0);
        assert_eq!(engine.critical_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_diffing() {
        let source = ManualSource::with_initial(snapshot(vec![patient(
            "1",
            RiskLevel::High,
            AlertStatus::New,
            Priority::Critical,
        )]));
        let (sink, seen) = recording_sink();
        let mut engine = NotificationEngine::observe(&source, sink, all_on());

        engine.unsubscribe();
        engine.unsubscribe();
        assert_eq!(source.subscriber_count(), 0);

        source.push(snapshot(vec![
            patient("1", RiskLevel::High, AlertStatus::Resolved, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical),
        ]));
        assert!(seen.lock().expect("lock").is_empty());
        assert_eq!(engine.patients().len(), 1);
    }

    #[test]
    fn dropping_the_engine_detaches_it() {
        let source = ManualSource::default();
        let (sink, _seen) = recording_sink();
        {
            let _engine = NotificationEngine::observe(&source, sink, NotificationOptions::default());
            assert_eq!(source.subscriber_count(), 1);
        }
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn diff_reports_removed_patients_as_nothing() {
        let previous = vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical),
        ];
        let current = vec![patient("2", RiskLevel::High, AlertStatus::New, Priority::Critical)];

        let diff = diff_snapshots(&previous, &current);
        assert!(diff.new_alerts.is_empty());
        assert!(diff.status_changes.is_empty());
    }

    #[test]
    fn diff_ignores_unseen_patients_that_are_not_new() {
        let previous = vec![patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical)];
        let current = vec![
            patient("1", RiskLevel::High, AlertStatus::New, Priority::Critical),
            patient("9", RiskLevel::High, AlertStatus::Acknowledged, Priority::Critical),
        ];

        let diff = diff_snapshots(&previous, &current);
        assert!(diff.new_alerts.is_empty());
    }

    #[test]
    fn works_end_to_end_with_the_store() {
        use crate::store::{HighRiskPatientStore, RiskAssessment};

        let store = HighRiskPatientStore::new();
        let upload = |id: &str| RiskAssessment {
            id: id.to_string(),
            name: format!("Patient {id}"),
            age: None,
            risk_level: RiskLevel::High,
            risk_factors: Vec::new(),
            confidence: "High".into(),
            ml_probability: 0.9,
            prediction: "Readmitted".into(),
            diagnosis_info: None,
            medical_info: None,
        };
        store
            .save_high_risk_patients(vec![upload("seed")], "admin-1")
            .expect("seed");

        let (sink, seen) = recording_sink();
        let engine = NotificationEngine::observe(&store, sink, all_on());

        let ids = store
            .save_high_risk_patients(vec![upload("fresh")], "admin-1")
            .expect("save");
        store
            .update_alert_status(&ids[0], AlertStatus::Resolved, None, None)
            .expect("resolve");

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].message, "New High-Risk Patient: Patient fresh");
        assert_eq!(seen[1].message, "Patient fresh status updated to Resolved");
        assert_eq!(engine.new_patient_count(), 1);
    }
}
