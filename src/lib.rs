//! # esg-reporting
//!
//! Corporate ESG metric tracking with PDF and Excel report export.
//!
//! The crate answers two questions:
//!
//! > What did a company report for its environmental, social and governance
//! > metrics most recently, and how does that look as a document?
//!
//! ## Architecture
//!
//! ```text
//! ReportRequest → SectionPlan → DocumentLayout → render_pdf ─┐
//!        ↓                    └→ TabularRecord → to_xlsx ───┴→ ReportSpool
//!   EsgStore (Postgres or Memory)
//!        ↑
//! BatchUpdater (per-row transactions, bounded retry on lock contention)
//! ```
//!
//! ## Guarantees
//!
//! - Section numbers run 1..N over the enabled sections, in canonical order
//! - The current snapshot is the latest by date, ties broken by highest id
//! - A failed request never leaves a report file behind
//! - Bulk snapshot inserts are all-or-nothing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod report;
pub mod store;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use batch::{BatchOutcome, BatchStats, BatchUpdater, RetryPolicy};
pub use config::{LogFormat, ServiceConfig};
pub use error::{EsgError, EsgResult};
pub use ingest::{parse_snapshot_batch, BatchUpdateRequest, CreateCompanyRequest};
pub use model::{
    Company, CompanyId, CompanyUpdate, EnvironmentalMetrics, EsgSnapshot, GovernanceMetrics,
    NewCompany, NewSnapshot, RiskAssessment, SocialMetrics,
};
pub use report::{
    render, ReportArtifact, ReportFormat, ReportGenerator, ReportRequest, ReportSpool, Section,
    SectionConfig, SectionPlan,
};
pub use store::{EsgStore, InMemoryEsgStore};
#[cfg(feature = "postgres")]
pub use store::PostgresEsgStore;

#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version of the persisted tables and JSON wire shapes.
/// Increment on breaking changes.
pub const ESG_SCHEMA_VERSION: &str = "1.0.0";
