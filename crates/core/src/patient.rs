//! High-risk patient records as delivered in snapshots.
//!
//! A record is created once per flagged assessment by
//! [`HighRiskPatientStore::save_high_risk_patients`](crate::store::HighRiskPatientStore::save_high_risk_patients)
//! and then only moves along the alert workflow (`New` → `Acknowledged`/`InProgress` →
//! `Resolved`) until it is deactivated.

use chrono::{DateTime, Utc};
use hrp_types::{NonEmptyText, Probability};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// An immutable, ordered, point-in-time view of every active high-risk patient.
pub type Snapshot = Arc<[HighRiskPatient]>;

/// Coarse severity classification produced by the readmission model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum RiskLevel {
    High,
    Medium,
    /// Never admitted to the feed by the store; kept so foreign feeds still count correctly.
    Low,
}

/// Workflow state of a high-risk alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AlertStatus {
    New,
    Acknowledged,
    InProgress,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertStatus::New => "New",
            AlertStatus::Acknowledged => "Acknowledged",
            AlertStatus::InProgress => "InProgress",
            AlertStatus::Resolved => "Resolved",
        };
        f.write_str(s)
    }
}

/// Triage priority, an axis independent of [`RiskLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Priority assigned at upload time: High risk is Critical, everything else High.
    pub fn for_risk_level(risk_level: RiskLevel) -> Self {
        match risk_level {
            RiskLevel::High => Priority::Critical,
            RiskLevel::Medium | RiskLevel::Low => Priority::High,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<String>,
}

impl DiagnosisInfo {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none() && self.tertiary.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicalInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_hospital: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_procedures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

impl MedicalInfo {
    pub fn is_empty(&self) -> bool {
        self.time_in_hospital.is_none()
            && self.medications.is_none()
            && self.lab_procedures.is_none()
            && self.specialty.is_none()
    }
}

/// A patient flagged by the readmission model, as held in the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskPatient {
    /// Stable identifier of this alert record, unique within a snapshot.
    pub id: String,
    /// Identifier of the assessed patient in the source dataset.
    pub patient_id: String,
    #[schema(value_type = String)]
    pub name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub risk_level: RiskLevel,
    #[schema(value_type = f64)]
    pub readmission_probability: Probability,
    pub risk_factors: Vec<String>,
    pub confidence: String,
    pub ml_prediction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_info: Option<DiagnosisInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_info: Option<MedicalInfo>,
    #[schema(value_type = String)]
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
    #[schema(value_type = String)]
    pub last_updated: DateTime<Utc>,
    pub is_active: bool,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_assigned: Option<String>,
    pub follow_up_required: bool,
    pub alert_status: AlertStatus,
}

impl HighRiskPatient {
    /// True for alerts nobody has picked up yet.
    pub fn is_new_alert(&self) -> bool {
        self.alert_status == AlertStatus::New
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a minimal active patient for engine tests.
    pub(crate) fn patient(
        id: &str,
        risk_level: RiskLevel,
        alert_status: AlertStatus,
        priority: Priority,
    ) -> HighRiskPatient {
        let now = Utc::now();
        HighRiskPatient {
            id: id.to_string(),
            patient_id: format!("P-{id}"),
            name: NonEmptyText::new(format!("Patient {id}")).expect("valid name"),
            age: Some(64),
            risk_level,
            readmission_probability: Probability::new(0.8).expect("valid probability"),
            risk_factors: vec!["Multiple prior admissions".into()],
            confidence: "High".into(),
            ml_prediction: "Readmitted".into(),
            diagnosis_info: None,
            medical_info: None,
            uploaded_at: now,
            uploaded_by: "admin-1".into(),
            last_updated: now,
            is_active: true,
            priority,
            notes: None,
            doctor_assigned: None,
            follow_up_required: true,
            alert_status,
        }
    }

    pub(crate) fn snapshot(patients: Vec<HighRiskPatient>) -> Snapshot {
        Arc::from(patients)
    }
}
