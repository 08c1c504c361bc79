//! ESG storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::EsgError;
use crate::model::{Company, CompanyId, CompanyUpdate, EsgSnapshot, NewCompany, NewSnapshot};

/// Coarse classification of a store failure.
///
/// The batch applier retries `LockContention`; the service maps the rest
/// onto the public error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Transient write-lock contention. Safe to retry.
    LockContention,
    /// A referenced company does not exist.
    MissingCompany,
    /// Anything else.
    Other,
}

/// Implemented by store error types so callers can react without downcasting.
pub trait ClassifyError {
    /// Classify this failure.
    fn kind(&self) -> StoreErrorKind;
}

/// Convert a store failure into the public error taxonomy.
pub fn store_error<E>(e: E) -> EsgError
where
    E: std::error::Error + ClassifyError,
{
    match e.kind() {
        StoreErrorKind::LockContention => {
            EsgError::StoreBusy("Database is locked. Please try again.".to_string())
        }
        StoreErrorKind::MissingCompany => EsgError::Validation(e.to_string()),
        StoreErrorKind::Other => EsgError::internal(e),
    }
}

/// Trait for ESG storage backends.
///
/// Listing methods return rows ordered by id. Every mutating method is its
/// own transaction: it either fully commits or leaves the store untouched.
#[async_trait]
pub trait EsgStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + ClassifyError + Send + Sync + 'static;

    /// List all companies.
    async fn list_companies(&self) -> Result<Vec<Company>, Self::Error>;

    /// Fetch a company by id.
    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, Self::Error>;

    /// Insert a company and return it with its assigned id.
    async fn create_company(&self, company: NewCompany) -> Result<Company, Self::Error>;

    /// Apply one partial update in its own transaction.
    ///
    /// Returns `Ok(None)` when the company does not exist.
    async fn update_company(&self, update: &CompanyUpdate) -> Result<Option<Company>, Self::Error>;

    /// List snapshots, optionally restricted to one company.
    async fn list_snapshots(
        &self,
        company_id: Option<CompanyId>,
    ) -> Result<Vec<EsgSnapshot>, Self::Error>;

    /// Most recent snapshot of a company (by date, then id).
    async fn latest_snapshot(&self, company_id: CompanyId)
        -> Result<Option<EsgSnapshot>, Self::Error>;

    /// Insert snapshots atomically: all of them or none.
    async fn insert_snapshots(
        &self,
        snapshots: Vec<NewSnapshot>,
    ) -> Result<Vec<EsgSnapshot>, Self::Error>;

    /// Whether the backend is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub use memory::InMemoryEsgStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresEsgStore;
