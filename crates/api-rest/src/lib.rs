//! # API REST
//!
//! REST API for the high-risk patient monitor.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, API key checks)
//!
//! The server keeps one [`NotificationEngine`] and one [`PatientFilterView`] subscribed to the
//! store for its whole lifetime; list requests evaluate their own filters against the
//! view's latest snapshot rather than mutating shared filter state.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{validate_api_key, ApiKey, AuthError, HealthRes, HealthService};
use hrp_core::{
    apply_filters, validation::validate_max_display, AlertStatus, AlertStatusFilter, CoreConfig,
    FilterState, HighRiskPatient, HighRiskPatientStore, HighRiskStats, HrpError, HrpResult,
    NotificationEngine, NotificationSink, PatientCounts, PatientFilterView, Priority,
    RiskAssessment, RiskLevel, RiskLevelFilter,
};

/// Header carrying the API key on mutating requests.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    store: HighRiskPatientStore,
    feed: Arc<PatientFilterView>,
    notifications: Arc<NotificationEngine>,
    api_key: ApiKey,
}

impl AppState {
    /// Subscribes the notification engine and the filter view to `store`.
    ///
    /// # Errors
    ///
    /// Returns `HrpError::InvalidInput` if the configured display bound is invalid.
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: HighRiskPatientStore,
        api_key: ApiKey,
        sink: impl NotificationSink + 'static,
    ) -> HrpResult<Self> {
        let notifications = NotificationEngine::observe(&store, sink, cfg.notification_options());
        let feed = PatientFilterView::configure(&store, cfg.max_display())?;

        Ok(Self {
            cfg,
            store,
            feed: Arc::new(feed),
            notifications: Arc::new(notifications),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// `All`, `High` or `Medium`
    pub risk_level: Option<RiskLevelFilter>,
    /// `All`, `New`, `Acknowledged`, `InProgress` or `Resolved`
    pub alert_status: Option<AlertStatusFilter>,
    /// Upper bound on returned patients; defaults to the server's configured bound
    pub max_display: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskPatientsRes {
    pub patients: Vec<HighRiskPatient>,
    pub counts: PatientCounts,
    pub filters: FilterState,
    pub has_active_filters: bool,
    pub loading: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadReq {
    pub uploaded_by: String,
    pub patients: Vec<RiskAssessment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadRes {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusReq {
    pub status: AlertStatus,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummaryRes {
    pub new_patient_count: usize,
    pub high_risk_count: usize,
    pub critical_count: usize,
}

impl NotificationSummaryRes {
    fn from_engine(engine: &NotificationEngine) -> Self {
        Self {
            new_patient_count: engine.new_patient_count(),
            high_risk_count: engine.high_risk_count(),
            critical_count: engine.critical_count(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_high_risk_patients,
        upload_high_risk_patients,
        update_alert_status,
        deactivate_high_risk_patient,
        high_risk_stats,
        notification_summary,
        mark_notifications_read,
    ),
    components(schemas(
        HealthRes,
        HighRiskPatientsRes,
        UploadReq,
        UploadRes,
        UpdateStatusReq,
        NotificationSummaryRes,
        HighRiskPatient,
        HighRiskStats,
        PatientCounts,
        FilterState,
        RiskAssessment,
        RiskLevel,
        RiskLevelFilter,
        AlertStatus,
        AlertStatusFilter,
        Priority,
        hrp_core::patient::DiagnosisInfo,
        hrp_core::patient::MedicalInfo,
    ))
)]
struct ApiDoc;

/// Builds the REST router with Swagger UI at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/high-risk-patients",
            get(list_high_risk_patients).post(upload_high_risk_patients),
        )
        .route("/high-risk-patients/stats", get(high_risk_stats))
        .route("/high-risk-patients/:id", delete(deactivate_high_risk_patient))
        .route("/high-risk-patients/:id/status", put(update_alert_status))
        .route("/notifications", get(notification_summary))
        .route("/notifications/read", post(mark_notifications_read))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn core_error(e: HrpError) -> (StatusCode, String) {
    let status = match &e {
        HrpError::InvalidInput(_) | HrpError::InvalidStatusTransition(_) | HrpError::Text(_) => {
            StatusCode::BAD_REQUEST
        }
        HrpError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    tracing::warn!("request rejected: {}", e);
    (status, e.to_string())
}

fn authorise(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    validate_api_key(&state.api_key, provided).map_err(|e| {
        let status = match e {
            AuthError::NotConfigured => {
                tracing::error!("mutating request refused: API_KEY is not configured");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthError::Missing | AuthError::Invalid => StatusCode::UNAUTHORIZED,
        };
        (status, e.to_string())
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/high-risk-patients",
    params(ListQuery),
    responses(
        (status = 200, description = "Filtered high-risk patients with counts", body = HighRiskPatientsRes),
        (status = 400, description = "Invalid max_display")
    )
)]
/// List active high-risk patients
///
/// Applies the risk-level filter, then the alert-status filter, and truncates to
/// `max_display` patients in feed order (highest readmission probability first). Counts are
/// always computed over the unfiltered feed.
#[axum::debug_handler]
async fn list_high_risk_patients(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<HighRiskPatientsRes>, (StatusCode, String)> {
    let max_display = match query.max_display {
        Some(n) => validate_max_display(n).map_err(core_error)?,
        None => state.cfg.max_display(),
    };
    let filters = FilterState {
        risk_level: query.risk_level.unwrap_or_default(),
        alert_status: query.alert_status.unwrap_or_default(),
    };

    let snapshot = state.feed.all_patients();
    Ok(Json(HighRiskPatientsRes {
        patients: apply_filters(&snapshot, &filters, max_display),
        counts: PatientCounts::from_patients(&snapshot),
        filters,
        has_active_filters: filters.is_active(),
        loading: state.feed.is_loading(),
    }))
}

#[utoipa::path(
    post,
    path = "/high-risk-patients",
    request_body = UploadReq,
    responses(
        (status = 201, description = "High and Medium risk patients stored", body = UploadRes),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid API key")
    )
)]
/// Upload model assessments
///
/// Only High and Medium risk assessments are stored; each becomes a `New` alert.
#[axum::debug_handler]
async fn upload_high_risk_patients(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadReq>,
) -> Result<(StatusCode, Json<UploadRes>), (StatusCode, String)> {
    authorise(&state, &headers)?;

    let ids = state
        .store
        .save_high_risk_patients(req.patients, &req.uploaded_by)
        .map_err(core_error)?;
    Ok((StatusCode::CREATED, Json(UploadRes { ids })))
}

#[utoipa::path(
    put,
    path = "/high-risk-patients/{id}/status",
    params(("id" = String, Path, description = "High-risk patient record id")),
    request_body = UpdateStatusReq,
    responses(
        (status = 204, description = "Alert status updated"),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Patient not found")
    )
)]
/// Move an alert along its workflow
#[axum::debug_handler]
async fn update_alert_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusReq>,
) -> Result<StatusCode, (StatusCode, String)> {
    authorise(&state, &headers)?;

    state
        .store
        .update_alert_status(&id, req.status, req.doctor_id, req.notes)
        .map_err(core_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/high-risk-patients/{id}",
    params(("id" = String, Path, description = "High-risk patient record id")),
    responses(
        (status = 204, description = "Patient deactivated"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Patient not found")
    )
)]
/// Deactivate (soft delete) a high-risk patient
#[axum::debug_handler]
async fn deactivate_high_risk_patient(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    authorise(&state, &headers)?;

    state.store.deactivate(&id).map_err(core_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/high-risk-patients/stats",
    responses(
        (status = 200, description = "Statistics over active patients", body = HighRiskStats)
    )
)]
#[axum::debug_handler]
async fn high_risk_stats(State(state): State<AppState>) -> Json<HighRiskStats> {
    Json(state.store.stats())
}

#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Unread and outstanding alert counts", body = NotificationSummaryRes)
    )
)]
#[axum::debug_handler]
async fn notification_summary(State(state): State<AppState>) -> Json<NotificationSummaryRes> {
    Json(NotificationSummaryRes::from_engine(&state.notifications))
}

#[utoipa::path(
    post,
    path = "/notifications/read",
    responses(
        (status = 200, description = "Unread counter reset", body = NotificationSummaryRes)
    )
)]
/// Reset the unread new-patient counter
///
/// Patient records are not modified.
#[axum::debug_handler]
async fn mark_notifications_read(State(state): State<AppState>) -> Json<NotificationSummaryRes> {
    state.notifications.mark_notifications_as_read();
    Json(NotificationSummaryRes::from_engine(&state.notifications))
}
