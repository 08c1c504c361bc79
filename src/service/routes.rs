//! Axum routes for the ESG reporting service.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Json, Path, Query, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::EsgError;
use crate::ingest::{parse_snapshot_batch, BatchUpdateRequest, CreateCompanyRequest};
use crate::model::{Company, CompanyId, EsgSnapshot};
use crate::report::ReportRequest;
use crate::store::{store_error, EsgStore};
use crate::ESG_SCHEMA_VERSION;

use super::middleware::{
    cors_layer, metrics_middleware, record_batch_metrics, record_report_metrics,
    request_logging_middleware,
};
use super::state::ServiceState;

/// Type alias for the service state with the PostgreSQL store.
#[cfg(feature = "postgres")]
pub type AppState = ServiceState<crate::store::PostgresEsgStore>;

/// Header carrying the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Optional filter of `GET /api/esg-data`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotFilter {
    /// Restrict to one company.
    pub company_id: Option<CompanyId>,
}

/// Result of a batch company update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateResponse {
    /// Companies as stored after their update, in input order.
    pub updated: Vec<Company>,
    /// Updates skipped because the company does not exist.
    pub skipped: usize,
}

/// Result of a bulk snapshot insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotBatchResponse {
    /// Inserted snapshots with their assigned ids.
    pub inserted: Vec<EsgSnapshot>,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the store does not answer.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Version of the stored record layout.
    pub schema_version: String,
    /// Whether the store answered.
    pub database: bool,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive` while the process serves requests.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service should receive traffic.
    pub ready: bool,
    /// Whether the store answered.
    pub database: bool,
    /// Reason when not ready.
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID of the failed request (matches `X-Request-Id`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// An [`EsgError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// HTTP status of an error kind.
    pub fn status_for(err: &EsgError) -> StatusCode {
        match err {
            EsgError::NotFound(_) => StatusCode::NOT_FOUND,
            EsgError::Validation(_) | EsgError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            EsgError::StoreBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
            EsgError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Override the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body = self.body.with_details(details);
        self
    }

    /// Attach the request's correlation id, if any.
    pub fn with_request_id(mut self, id: &RequestId) -> Self {
        if let Some(id) = &id.0 {
            self.body = self.body.with_correlation_id(id.clone());
        }
        self
    }
}

impl From<EsgError> for ApiError {
    fn from(err: EsgError) -> Self {
        let status = Self::status_for(&err);
        let message = match &err {
            EsgError::Internal(detail) => {
                error!(error = %detail, "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            status,
            body: ErrorResponse::new(err.code(), message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(
            status = self.status.as_u16(),
            code = %self.body.code,
            error = %self.body.error,
            correlation_id = ?self.body.correlation_id,
            "Request error"
        );
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Correlation id taken from the `X-Request-Id` header.
#[derive(Debug, Clone, Default)]
pub struct RequestId(pub Option<String>);

impl RequestId {
    fn from_parts(parts: &Parts) -> Self {
        Self(
            parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        )
    }

    /// Convert an error and tag it with this id.
    pub fn error(&self, err: EsgError) -> ApiError {
        ApiError::from(err).with_request_id(self)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// JSON body whose rejection is a `VALIDATION_ERROR` response.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();
        let request_id = RequestId::from_parts(&parts);
        let req = Request::from_parts(parts, body);

        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(request_id
                .error(EsgError::Validation("Invalid JSON body".to_string()))
                .with_details(rejection.body_text())),
        }
    }
}

/// Path parameters whose rejection is a `VALIDATION_ERROR` response.
pub struct ValidPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(RequestId::from_parts(parts)
                .error(EsgError::Validation("Invalid path parameter".to_string()))
                .with_details(rejection.body_text())),
        }
    }
}

/// Query string whose rejection is a `VALIDATION_ERROR` response.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(RequestId::from_parts(parts)
                .error(EsgError::Validation("Invalid query string".to_string()))
                .with_details(rejection.body_text())),
        }
    }
}

type Shared<S> = State<Arc<ServiceState<S>>>;

// ============================================================================
// Company Handlers
// ============================================================================

/// List all companies.
async fn list_companies_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
) -> Result<Json<Vec<Company>>, ApiError> {
    let companies = state
        .store
        .list_companies()
        .await
        .map_err(|e| rid.error(store_error(e)))?;
    Ok(Json(companies))
}

/// Fetch one company.
async fn get_company_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidPath(id): ValidPath<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    state
        .store
        .get_company(id)
        .await
        .map_err(|e| rid.error(store_error(e)))?
        .map(Json)
        .ok_or_else(|| rid.error(EsgError::NotFound(format!("No company found with id {id}"))))
}

/// Create a company.
async fn create_company_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidJson(request): ValidJson<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let new_company = request.validate().map_err(|e| rid.error(e))?;
    let company = state
        .store
        .create_company(new_company)
        .await
        .map_err(|e| rid.error(store_error(e)))?;

    info!(company_id = company.id, name = %company.name, "Company created");
    Ok((StatusCode::CREATED, Json(company)))
}

/// Apply a batch of partial company updates.
///
/// Lock contention that outlasts the retry ceiling is a 503; every other
/// failure is reported as a 400.
async fn batch_update_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidJson(request): ValidJson<BatchUpdateRequest>,
) -> Result<Json<BatchUpdateResponse>, ApiError> {
    let start = Instant::now();
    let result = state.batch_updater().apply(&request.updates).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(outcome) => {
            record_batch_metrics(&outcome.stats, true, latency_ms);
            Ok(Json(BatchUpdateResponse {
                updated: outcome.updated,
                skipped: outcome.stats.skipped,
            }))
        }
        Err(err) => {
            record_batch_metrics(&Default::default(), false, latency_ms);
            let status = match err {
                EsgError::StoreBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_REQUEST,
            };
            Err(rid.error(err).with_status(status))
        }
    }
}

// ============================================================================
// Snapshot Handlers
// ============================================================================

/// List snapshots, optionally for one company.
async fn list_snapshots_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidQuery(filter): ValidQuery<SnapshotFilter>,
) -> Result<Json<Vec<EsgSnapshot>>, ApiError> {
    let snapshots = state
        .store
        .list_snapshots(filter.company_id)
        .await
        .map_err(|e| rid.error(store_error(e)))?;
    Ok(Json(snapshots))
}

/// List the snapshots of one company.
async fn company_snapshots_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidPath(id): ValidPath<CompanyId>,
) -> Result<Json<Vec<EsgSnapshot>>, ApiError> {
    let snapshots = state
        .store
        .list_snapshots(Some(id))
        .await
        .map_err(|e| rid.error(store_error(e)))?;
    Ok(Json(snapshots))
}

/// Insert a batch of snapshots, all or nothing.
async fn snapshot_batch_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidJson(body): ValidJson<serde_json::Value>,
) -> Result<(StatusCode, Json<SnapshotBatchResponse>), ApiError> {
    let snapshots = parse_snapshot_batch(&body).map_err(|e| rid.error(e))?;
    let count = snapshots.len();

    let inserted = state
        .store
        .insert_snapshots(snapshots)
        .await
        .map_err(|e| rid.error(store_error(e)))?;

    info!(count, "ESG snapshots inserted");
    Ok((StatusCode::CREATED, Json(SnapshotBatchResponse { inserted })))
}

// ============================================================================
// Report Handler
// ============================================================================

/// Generate a report and return it as a file download.
///
/// The rendered bytes go through a spool file that is removed before the
/// response leaves this handler.
async fn generate_report_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
    rid: RequestId,
    ValidJson(request): ValidJson<ReportRequest>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let generated_at = Utc::now();

    let artifact = state
        .report_generator()
        .generate(&request, generated_at)
        .await
        .map_err(|e| rid.error(e))?;

    let spooled = state
        .spool
        .write(&artifact, generated_at)
        .await
        .map_err(|e| rid.error(EsgError::internal(e)))?;
    let bytes = spooled.read().await.map_err(|e| rid.error(EsgError::internal(e)))?;
    if let Err(e) = spooled.close().await {
        warn!(error = %e, correlation_id = ?rid.0, "Failed to remove spooled report");
    }

    record_report_metrics(artifact.format, bytes.len(), start.elapsed().as_millis() as u64);

    let disposition = format!("attachment; filename=\"{}\"", artifact.download_name);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| rid.error(EsgError::internal(e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(artifact.format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint (detailed).
async fn health_handler<S: EsgStore + 'static>(State(state): Shared<S>) -> Json<HealthResponse> {
    let db_healthy = state.store.is_healthy().await;

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: ESG_SCHEMA_VERSION.to_string(),
        database: db_healthy,
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store is reachable, 503 otherwise.
async fn readiness_handler<S: EsgStore + 'static>(
    State(state): Shared<S>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.store.is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some("Database connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the full application: the router wrapped in request logging,
/// HTTP tracing and CORS.
///
/// Each layer is applied to the router on its own so the body is boxed back
/// into an axum `Body` between them.
pub fn create_app<S: EsgStore + 'static>(state: ServiceState<S>) -> Router {
    let cors = cors_layer(&state.config);

    create_router(state)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Create the Axum router for the ESG reporting service.
pub fn create_router<S: EsgStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Companies
        .route(
            "/api/companies",
            get(list_companies_handler::<S>).post(create_company_handler::<S>),
        )
        .route("/api/companies/batch-update", put(batch_update_handler::<S>))
        .route("/api/companies/:id", get(get_company_handler::<S>))
        // ESG snapshots
        .route("/api/esg-data", get(list_snapshots_handler::<S>))
        .route("/api/esg-data/company/:id", get(company_snapshots_handler::<S>))
        .route("/api/esg-data/batch", post(snapshot_batch_handler::<S>))
        // Reports
        .route("/reports/generate", post(generate_report_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
}
