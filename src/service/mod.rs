//! ESG Reporting REST Service
//!
//! Exposes the store, the batch applier and the report generator over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /api/companies` - List companies
//! - `POST /api/companies` - Create a company
//! - `GET /api/companies/:id` - Fetch one company
//! - `PUT /api/companies/batch-update` - Apply partial company updates
//! - `GET /api/esg-data` - List snapshots (`?company_id=` filter)
//! - `GET /api/esg-data/company/:id` - Snapshots of one company
//! - `POST /api/esg-data/batch` - Insert snapshots, all or nothing
//! - `POST /reports/generate` - Render a PDF or Excel report as a download
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{
    cors_layer, metrics_middleware, record_batch_metrics, record_report_metrics,
    request_logging_middleware,
};
#[cfg(feature = "postgres")]
pub use routes::AppState;
pub use routes::{create_app, create_router, ApiError, ErrorResponse, RequestId, REQUEST_ID_HEADER};
pub use state::ServiceState;
