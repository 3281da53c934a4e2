//! In-memory high-risk patient collection.
//!
//! [`HighRiskPatientStore`] stands in for the managed document store: it keeps every uploaded
//! record in process memory and implements [`SnapshotSource`] so the notification and filter
//! engines can subscribe to it. Every successful mutation pushes a fresh snapshot of the
//! active patients, ordered by readmission probability (highest first), to all subscribers.
//!
//! Nothing is persisted. Dropping the last clone of the store discards all records.

use crate::error::{HrpError, HrpResult};
use crate::patient::{
    AlertStatus, DiagnosisInfo, HighRiskPatient, MedicalInfo, Priority, RiskLevel, Snapshot,
};
use crate::subscription::{SnapshotCallback, SnapshotSource, Subscription};
use crate::validation::validate_record_id;
use chrono::Utc;
use hrp_types::{NonEmptyText, Probability};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use utoipa::ToSchema;

/// One row of model output, as uploaded by an administrator.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Identifier of the patient in the uploaded dataset.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub confidence: String,
    pub ml_probability: f64,
    pub prediction: String,
    #[serde(default)]
    pub diagnosis_info: Option<DiagnosisInfo>,
    #[serde(default)]
    pub medical_info: Option<MedicalInfo>,
}

/// Ordering applied by [`HighRiskPatientStore::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub enum PatientOrder {
    /// Highest readmission probability first.
    #[default]
    ByReadmissionProbability,
    /// Most recently uploaded first.
    ByUploadedAt,
}

/// Aggregate figures over the active collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskStats {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub new_alerts: usize,
    pub acknowledged: usize,
    pub resolved: usize,
}

#[derive(Clone, Default)]
pub struct HighRiskPatientStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    records: Mutex<Vec<HighRiskPatient>>,
    subscribers: Mutex<Vec<(u64, SnapshotCallback)>>,
    next_subscriber: AtomicU64,
    // Held across "mutate + deliver" so subscribers see snapshots in order, one at a time.
    delivery: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn by_probability_desc(a: &HighRiskPatient, b: &HighRiskPatient) -> std::cmp::Ordering {
    b.readmission_probability
        .value()
        .total_cmp(&a.readmission_probability.value())
}

fn active_snapshot(records: &[HighRiskPatient]) -> Snapshot {
    let mut active: Vec<HighRiskPatient> =
        records.iter().filter(|p| p.is_active).cloned().collect();
    active.sort_by(by_probability_desc);
    Arc::from(active)
}

impl HighRiskPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores every High and Medium assessment as a new alert.
    ///
    /// Low-risk assessments are skipped. Each stored record starts in `AlertStatus::New` with
    /// follow-up required, and gets `Priority::Critical` for High risk or `Priority::High` for
    /// Medium risk. The whole batch is validated before anything is stored.
    ///
    /// # Returns
    ///
    /// The generated record ids, in upload order.
    ///
    /// # Errors
    ///
    /// Returns `HrpError::InvalidInput` if a stored assessment has a blank name or a
    /// probability outside `0..=1`, or if `uploaded_by` is blank.
    pub fn save_high_risk_patients(
        &self,
        assessments: Vec<RiskAssessment>,
        uploaded_by: &str,
    ) -> HrpResult<Vec<String>> {
        let uploaded_by = NonEmptyText::new(uploaded_by)
            .map_err(|_| HrpError::InvalidInput("uploaded_by cannot be empty".into()))?;

        let now = Utc::now();
        let mut prepared = Vec::new();
        for assessment in assessments {
            if !matches!(assessment.risk_level, RiskLevel::High | RiskLevel::Medium) {
                continue;
            }

            let name = NonEmptyText::new(&assessment.name).map_err(|_| {
                HrpError::InvalidInput(format!("patient {} has an empty name", assessment.id))
            })?;
            let probability = Probability::new(assessment.ml_probability).map_err(|e| {
                HrpError::InvalidInput(format!("patient {}: {e}", assessment.id))
            })?;

            prepared.push(HighRiskPatient {
                id: uuid::Uuid::new_v4().simple().to_string(),
                patient_id: assessment.id,
                name,
                age: assessment.age,
                risk_level: assessment.risk_level,
                readmission_probability: probability,
                risk_factors: assessment.risk_factors,
                confidence: assessment.confidence,
                ml_prediction: assessment.prediction,
                diagnosis_info: assessment.diagnosis_info.filter(|d| !d.is_empty()),
                medical_info: assessment.medical_info.filter(|m| !m.is_empty()),
                uploaded_at: now,
                uploaded_by: uploaded_by.as_str().to_owned(),
                last_updated: now,
                is_active: true,
                priority: Priority::for_risk_level(assessment.risk_level),
                notes: None,
                doctor_assigned: None,
                follow_up_required: true,
                alert_status: AlertStatus::New,
            });
        }

        let ids: Vec<String> = prepared.iter().map(|p| p.id.clone()).collect();
        self.mutate(|records| {
            records.extend(prepared);
            Ok(())
        })?;

        tracing::info!("saved {} high-risk patients", ids.len());
        Ok(ids)
    }

    /// Active patients, optionally restricted to one risk level.
    pub fn list(&self, filter_by_risk: Option<RiskLevel>, order: PatientOrder) -> Vec<HighRiskPatient> {
        let records = lock(&self.inner.records);
        let mut patients: Vec<HighRiskPatient> = records
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| filter_by_risk.map_or(true, |risk| p.risk_level == risk))
            .cloned()
            .collect();
        drop(records);

        match order {
            PatientOrder::ByReadmissionProbability => patients.sort_by(by_probability_desc),
            PatientOrder::ByUploadedAt => patients.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at)),
        }

        tracing::debug!("retrieved {} high-risk patients", patients.len());
        patients
    }

    /// Moves an alert along its workflow, e.g. when a doctor acknowledges it.
    ///
    /// `doctor_id` and `notes` overwrite the stored values only when provided.
    ///
    /// # Errors
    ///
    /// - `HrpError::InvalidStatusTransition` if `status` is `AlertStatus::New`.
    /// - `HrpError::InvalidInput` if `id` is malformed.
    /// - `HrpError::NotFound` if no record has the given id.
    pub fn update_alert_status(
        &self,
        id: &str,
        status: AlertStatus,
        doctor_id: Option<String>,
        notes: Option<String>,
    ) -> HrpResult<()> {
        if status == AlertStatus::New {
            return Err(HrpError::InvalidStatusTransition(status));
        }
        validate_record_id(id)?;

        self.mutate(|records| {
            let record = records
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| HrpError::NotFound(id.to_string()))?;
            record.alert_status = status;
            record.last_updated = Utc::now();
            if doctor_id.is_some() {
                record.doctor_assigned = doctor_id;
            }
            if notes.is_some() {
                record.notes = notes;
            }
            Ok(())
        })?;

        tracing::info!("updated patient {id} status to {status}");
        Ok(())
    }

    /// Soft-deletes a record so it drops out of every subsequent snapshot.
    ///
    /// # Errors
    ///
    /// Returns `HrpError::NotFound` if no record has the given id.
    pub fn deactivate(&self, id: &str) -> HrpResult<()> {
        validate_record_id(id)?;
        self.mutate(|records| {
            let record = records
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| HrpError::NotFound(id.to_string()))?;
            record.is_active = false;
            record.last_updated = Utc::now();
            Ok(())
        })?;

        tracing::info!("deactivated high-risk patient {id}");
        Ok(())
    }

    pub fn stats(&self) -> HighRiskStats {
        let records = lock(&self.inner.records);
        let mut stats = HighRiskStats::default();
        for patient in records.iter().filter(|p| p.is_active) {
            stats.total += 1;

            match patient.priority {
                Priority::Critical => stats.critical += 1,
                Priority::High => stats.high += 1,
                Priority::Medium | Priority::Low => {}
            }

            match patient.alert_status {
                AlertStatus::New => stats.new_alerts += 1,
                AlertStatus::Acknowledged => stats.acknowledged += 1,
                AlertStatus::Resolved => stats.resolved += 1,
                AlertStatus::InProgress => {}
            }
        }
        stats
    }

    /// Applies `f` to the records and, if it succeeds, delivers the new snapshot.
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<HighRiskPatient>) -> HrpResult<T>) -> HrpResult<T> {
        let _delivery = lock(&self.inner.delivery);
        let (result, snapshot) = {
            let mut records = lock(&self.inner.records);
            let result = f(&mut records)?;
            (result, active_snapshot(&records))
        };
        self.inner.deliver(snapshot);
        Ok(result)
    }
}

impl StoreInner {
    fn deliver(&self, snapshot: Snapshot) {
        let subscribers: Vec<SnapshotCallback> = lock(&self.subscribers)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        tracing::debug!(
            "delivering snapshot of {} patients to {} subscribers",
            snapshot.len(),
            subscribers.len()
        );
        for callback in subscribers {
            callback(snapshot.clone());
        }
    }

    fn remove_subscriber(&self, id: u64) {
        lock(&self.subscribers).retain(|(sub_id, _)| *sub_id != id);
    }
}

impl SnapshotSource for HighRiskPatientStore {
    fn subscribe(&self, callback: SnapshotCallback) -> Subscription {
        let _delivery = lock(&self.inner.delivery);
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers).push((id, callback.clone()));

        let snapshot = active_snapshot(&lock(&self.inner.records));
        callback(snapshot);

        let inner: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.remove_subscriber(id);
            }
        })
    }
}
