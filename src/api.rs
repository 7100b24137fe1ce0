// 🌐 HTTP API - axum router over the Event Store and the reconciliation engine
//
// JSON in, JSON out; every response carries `success`. Mutations check the
// shared access code before touching the store.

use axum::{
    async_trait,
    extract::{rejection::PathRejection, FromRequest, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::db::{self, Event, ListedObservation};
use crate::error::{ObservationError, Result};
use crate::lifecycle::TransitionTarget;
use crate::observation::{Criticality, NewObservation, Observation, Status};
use crate::period::{format_timestamp, now_utc, ReportPeriod};
use crate::reconciliation::PeriodCounts;
use crate::render;
use crate::report::{self, DetailEntry, PeriodReport};
use crate::trends::{self, CriticalityTrend, VitalModuleTrend};

const API_ACTOR: &str = "api";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub catalog: Arc<Catalog>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(conn: Connection, catalog: Catalog, config: AppConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            catalog: Arc::new(catalog),
            config: Arc::new(config),
        }
    }

    /// A panic in another handler leaves the connection usable
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, period: &ReportPeriod) -> Result<PeriodReport> {
        let conn = self.conn();
        report::generate_report(&conn, &self.catalog, &self.config.engine(), period)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(body: T) -> Json<Self> {
        Json(Self {
            success: true,
            body,
        })
    }
}

#[derive(Serialize)]
struct Data<T> {
    data: T,
}

impl IntoResponse for ObservationError {
    fn into_response(self) -> Response {
        let status = match &self {
            ObservationError::Validation(_) => StatusCode::BAD_REQUEST,
            ObservationError::Unauthorized => StatusCode::FORBIDDEN,
            ObservationError::NotFound(_) => StatusCode::NOT_FOUND,
            ObservationError::Store(_) | ObservationError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if self.is_client_error() {
            match &self {
                ObservationError::Validation(message) => message.clone(),
                other => other.to_string(),
            }
        } else {
            error!(error = %self, "request failed");
            "Server error".to_string()
        };

        (
            status,
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct CountsResponse {
    pending_from: i64,
    resurfaced: i64,
    new: i64,
    resolved: i64,
    pending_to: i64,
}

#[derive(Serialize)]
struct OverallRow {
    group: String,
    #[serde(flatten)]
    counts: CountsResponse,
}

/// Grand total uses `new_obs` where rows use `new`
#[derive(Serialize)]
struct GrandTotalResponse {
    pending_from: i64,
    resurfaced: i64,
    new_obs: i64,
    resolved: i64,
    pending_to: i64,
}

#[derive(Serialize)]
struct ModuleStat {
    module_name: String,
    #[serde(flatten)]
    counts: CountsResponse,
}

#[derive(Serialize)]
struct ConcernResponse {
    observation: String,
    status: Status,
    timestamp: String,
    module_name: String,
}

#[derive(Serialize)]
struct GroupModules {
    group_name: String,
    modules: Vec<ModuleStat>,
    vital_observations: Vec<ConcernResponse>,
}

#[derive(Serialize)]
struct DetailedReportResponse {
    overall_data: Vec<OverallRow>,
    grand_total: GrandTotalResponse,
    module_data: Vec<GroupModules>,
}

#[derive(Serialize)]
struct DetailResponse {
    module_name: String,
    observation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    date: String,
}

#[derive(Serialize)]
struct VitalDetailsResponse {
    identified: Vec<DetailResponse>,
    resolved: Vec<DetailResponse>,
}

#[derive(Serialize)]
struct ModuleSummary {
    module_id: i64,
    module_name: String,
}

#[derive(Serialize)]
struct GroupSummary {
    group_id: i64,
    group_name: String,
    modules: Vec<ModuleSummary>,
}

#[derive(Serialize)]
struct ObservationResponse {
    id: i64,
    observation: String,
    criticality: Criticality,
    status: Status,
    timestamp: String,
}

#[derive(Serialize)]
struct RangeObservationResponse {
    id: i64,
    observation: String,
    group_name: String,
    module_name: String,
    criticality: Criticality,
    status: Status,
    timestamp: String,
    module_pending: i64,
}

#[derive(Serialize)]
struct EventResponse {
    event_id: String,
    event_type: String,
    occurred_at: String,
    data: serde_json::Value,
    actor: String,
}

impl From<&PeriodCounts> for CountsResponse {
    fn from(c: &PeriodCounts) -> Self {
        Self {
            pending_from: c.pending_from,
            resurfaced: c.resurfaced,
            new: c.new,
            resolved: c.resolved,
            pending_to: c.pending_to,
        }
    }
}

impl From<&PeriodCounts> for GrandTotalResponse {
    fn from(c: &PeriodCounts) -> Self {
        Self {
            pending_from: c.pending_from,
            resurfaced: c.resurfaced,
            new_obs: c.new,
            resolved: c.resolved,
            pending_to: c.pending_to,
        }
    }
}

impl From<&PeriodReport> for DetailedReportResponse {
    fn from(report: &PeriodReport) -> Self {
        Self {
            overall_data: report
                .groups
                .iter()
                .map(|g| OverallRow {
                    group: g.group_name.clone(),
                    counts: (&g.counts).into(),
                })
                .collect(),
            grand_total: (&report.grand_total).into(),
            module_data: report
                .groups
                .iter()
                .map(|g| GroupModules {
                    group_name: g.group_name.clone(),
                    modules: g
                        .modules
                        .iter()
                        .map(|m| ModuleStat {
                            module_name: m.module_name.clone(),
                            counts: (&m.counts).into(),
                        })
                        .collect(),
                    vital_observations: g
                        .areas_of_concern
                        .iter()
                        .map(|e| ConcernResponse {
                            observation: e.text.clone(),
                            status: e.status,
                            timestamp: format_timestamp(e.date),
                            module_name: e.module_name.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl DetailResponse {
    fn new(entry: &DetailEntry, with_status: bool) -> Self {
        Self {
            module_name: entry.module_name.clone(),
            observation: entry.text.clone(),
            status: with_status.then_some(entry.status),
            date: format_timestamp(entry.date),
        }
    }
}

impl From<Observation> for ObservationResponse {
    fn from(obs: Observation) -> Self {
        Self {
            id: obs.id,
            observation: obs.text,
            criticality: obs.criticality,
            status: obs.status,
            timestamp: format_timestamp(obs.created_at),
        }
    }
}

impl From<ListedObservation> for RangeObservationResponse {
    fn from(obs: ListedObservation) -> Self {
        Self {
            id: obs.id,
            observation: obs.observation,
            group_name: obs.group_name,
            module_name: obs.module_name,
            criticality: obs.criticality,
            status: obs.status,
            timestamp: format_timestamp(obs.created_at),
            module_pending: obs.module_pending,
        }
    }
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type,
            occurred_at: format_timestamp(event.occurred_at),
            data: event.data,
            actor: event.actor,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Browser forms and checkboxes send ids as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum IdInput {
    Number(i64),
    Text(String),
}

impl IdInput {
    fn into_id(self, field: &str) -> Result<i64> {
        match self {
            IdInput::Number(id) => Ok(id),
            IdInput::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| ObservationError::validation(format!("Invalid {}: {}", field, text))),
        }
    }
}

fn module_id_from(input: Option<IdInput>, missing: &str) -> Result<Option<i64>> {
    match input {
        Some(IdInput::Text(text)) if text.trim().is_empty() => {
            Err(ObservationError::validation(missing))
        }
        Some(input) => input.into_id("module_id").map(Some),
        None => Ok(None),
    }
}

/// `Json` whose rejections use the `{success, error}` envelope
struct JsonBody<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ObservationError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ObservationError::validation(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

#[derive(Deserialize)]
struct SaveRequest {
    secret_code: Option<String>,
    observation: Option<String>,
    module_id: Option<IdInput>,
    criticality: Option<String>,
}

#[derive(Deserialize)]
struct TransitionRequest {
    secret_code: Option<String>,
    #[serde(default)]
    ids: Vec<IdInput>,
}

#[derive(Deserialize)]
struct DateRangeRequest {
    from_date: Option<String>,
    to_date: Option<String>,
}

impl DateRangeRequest {
    fn period(&self) -> Result<ReportPeriod> {
        ReportPeriod::parse(self.from_date.as_deref(), self.to_date.as_deref())
    }
}

#[derive(Deserialize)]
struct ModuleRequest {
    module_id: Option<IdInput>,
}

impl ModuleRequest {
    fn module_id(self) -> Result<i64> {
        module_id_from(self.module_id, "Module ID required")?
            .ok_or_else(|| ObservationError::validation("Module ID required"))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok(Data { data: "OK" })
}

/// POST /save - record a new observation
async fn save_observation(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SaveRequest>,
) -> Result<impl IntoResponse> {
    state.config.authorize(request.secret_code.as_deref())?;

    let new = NewObservation::from_parts(
        request.observation.as_deref(),
        module_id_from(request.module_id, "Missing module_id")?,
        request.criticality.as_deref(),
    )?;
    new.validate(&state.catalog)?;

    let id = db::insert_observation(&state.conn(), &new, now_utc(), API_ACTOR)?;

    Ok(ApiResponse::ok(serde_json::json!({ "id": id })))
}

/// GET /api/observations/pending/count
async fn pending_count(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let count = db::pending_count(&state.conn())?;
    Ok(ApiResponse::ok(serde_json::json!({ "count": count })))
}

fn transition(state: &AppState, request: TransitionRequest, target: TransitionTarget) -> Result<Json<ApiResponse<serde_json::Value>>> {
    state.config.authorize(request.secret_code.as_deref())?;

    let ids = request
        .ids
        .into_iter()
        .map(|id| id.into_id("id"))
        .collect::<Result<Vec<i64>>>()?;

    let mut conn = state.conn();
    let updated = db::transition_observations(&mut conn, &ids, target, now_utc(), API_ACTOR)?;

    Ok(ApiResponse::ok(serde_json::json!({ "updated": updated })))
}

/// POST /api/observations/close
async fn close_observations(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TransitionRequest>,
) -> Result<impl IntoResponse> {
    transition(&state, request, TransitionTarget::Close)
}

/// POST /api/observations/resurface
async fn resurface_observations(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TransitionRequest>,
) -> Result<impl IntoResponse> {
    transition(&state, request, TransitionTarget::Resurface)
}

/// POST /api/reports/detailed
async fn detailed_report(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DateRangeRequest>,
) -> Result<impl IntoResponse> {
    let report = state.report(&request.period()?)?;
    Ok(ApiResponse::ok(DetailedReportResponse::from(&report)))
}

/// POST /api/reports/vital-details
async fn vital_details(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DateRangeRequest>,
) -> Result<impl IntoResponse> {
    let report = state.report(&request.period()?)?;

    Ok(ApiResponse::ok(VitalDetailsResponse {
        identified: report
            .details
            .identified
            .iter()
            .map(|e| DetailResponse::new(e, true))
            .collect(),
        resolved: report
            .details
            .resolved
            .iter()
            .map(|e| DetailResponse::new(e, false))
            .collect(),
    }))
}

/// POST /api/reports/pdf
async fn report_pdf(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DateRangeRequest>,
) -> Result<impl IntoResponse> {
    let report = state.report(&request.period()?)?;
    let bytes = render::render_pdf(&report, &state.config.report_title)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "inline; filename=\"observation_brief.pdf\"",
            ),
        ],
        bytes,
    ))
}

/// GET /api/module-groups
async fn module_groups(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = &state.catalog;
    let data: Vec<GroupSummary> = catalog
        .groups()
        .iter()
        .map(|g| GroupSummary {
            group_id: g.id,
            group_name: g.name.clone(),
            modules: catalog
                .modules_in(g.id)
                .map(|m| ModuleSummary {
                    module_id: m.id,
                    module_name: m.name.clone(),
                })
                .collect(),
        })
        .collect();

    ApiResponse::ok(Data { data })
}

/// POST /api/observations/closed
async fn closed_observations(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ModuleRequest>,
) -> Result<impl IntoResponse> {
    let module_id = request.module_id()?;
    let data: Vec<ObservationResponse> = db::closed_for_module(&state.conn(), module_id)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(Data { data }))
}

/// POST /api/observations/open-resurfaced
async fn open_resurfaced_observations(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ModuleRequest>,
) -> Result<impl IntoResponse> {
    let module_id = request.module_id()?;
    let data: Vec<ObservationResponse> = db::open_or_resurfaced_for_module(&state.conn(), module_id)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(Data { data }))
}

/// POST /api/observations/range
async fn observations_in_range(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<DateRangeRequest>,
) -> Result<impl IntoResponse> {
    let period = request
        .period()
        .map_err(|_| ObservationError::validation("Invalid date range"))?;
    let data: Vec<RangeObservationResponse> = db::observations_in_range(&state.conn(), &period)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(Data { data }))
}

/// GET /api/observations/:id/events - audit trail, newest first
async fn observation_events(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(id) = id.map_err(|rejection| ObservationError::validation(rejection.body_text()))?;
    let conn = state.conn();
    if db::get_observation(&conn, id)?.is_none() {
        return Err(ObservationError::NotFound(format!("observation {}", id)));
    }

    let data: Vec<EventResponse> = db::events_for_observation(&conn, id)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(Data { data }))
}

/// GET /api/charts/criticality-trend
async fn criticality_trend(State(state): State<AppState>) -> Result<Json<ApiResponse<CriticalityTrend>>> {
    let trend = trends::criticality_trend(&state.conn(), now_utc().date())?;
    Ok(ApiResponse::ok(trend))
}

/// GET /api/charts/vital-module-trend
async fn vital_module_trend(State(state): State<AppState>) -> Result<Json<ApiResponse<VitalModuleTrend>>> {
    let trend = trends::vital_module_trend(&state.conn(), now_utc().date())?;
    Ok(ApiResponse::ok(trend))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/observations/pending/count", get(pending_count))
        .route("/observations/close", post(close_observations))
        .route("/observations/resurface", post(resurface_observations))
        .route("/observations/closed", post(closed_observations))
        .route("/observations/open-resurfaced", post(open_resurfaced_observations))
        .route("/observations/range", post(observations_in_range))
        .route("/observations/:id/events", get(observation_events))
        .route("/reports/detailed", post(detailed_report))
        .route("/reports/vital-details", post(vital_details))
        .route("/reports/pdf", post(report_pdf))
        .route("/module-groups", get(module_groups))
        .route("/charts/criticality-trend", get(criticality_trend))
        .route("/charts/vital-module-trend", get(vital_module_trend));

    Router::new()
        .route("/save", post(save_observation))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Tests
// ============================================================================
