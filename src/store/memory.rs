//! In-memory ESG store for testing and local runs.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{
    Company, CompanyId, CompanyUpdate, EsgSnapshot, NewCompany, NewSnapshot, SnapshotId,
};
use super::{ClassifyError, EsgStore, StoreErrorKind};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// Simulated row lock held by another writer.
    #[error("database is locked (company {0})")]
    Locked(CompanyId),
    /// Snapshot references a company that does not exist.
    #[error("Company not found: {0}")]
    UnknownCompany(CompanyId),
    /// Simulated non-transient write failure.
    #[error("write failed for company {0}")]
    WriteFailed(CompanyId),
}

impl ClassifyError for InMemoryError {
    fn kind(&self) -> StoreErrorKind {
        match self {
            Self::Locked(_) => StoreErrorKind::LockContention,
            Self::UnknownCompany(_) => StoreErrorKind::MissingCompany,
            Self::WriteFailed(_) => StoreErrorKind::Other,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    companies: BTreeMap<CompanyId, Company>,
    snapshots: BTreeMap<SnapshotId, EsgSnapshot>,
    next_company_id: CompanyId,
    next_snapshot_id: SnapshotId,
    /// Remaining simulated lock failures per company.
    contention: BTreeMap<CompanyId, u32>,
    /// Companies whose updates fail permanently.
    broken: BTreeSet<CompanyId>,
    update_attempts: u64,
}

/// In-memory ESG store.
///
/// Uses BTreeMaps so listings come back ordered by id.
#[derive(Debug, Default)]
pub struct InMemoryEsgStore {
    tables: Mutex<Tables>,
}

impl InMemoryEsgStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a company synchronously (test setup).
    pub fn add_company(&self, company: NewCompany) -> Company {
        let mut tables = self.tables.lock();
        tables.next_company_id += 1;
        let stored = company.into_company(tables.next_company_id);
        tables.companies.insert(stored.id, stored.clone());
        stored
    }

    /// Insert a snapshot synchronously (test setup). The company is not checked.
    pub fn add_snapshot(&self, snapshot: NewSnapshot) -> EsgSnapshot {
        let mut tables = self.tables.lock();
        tables.next_snapshot_id += 1;
        let stored = snapshot.into_snapshot(tables.next_snapshot_id);
        tables.snapshots.insert(stored.id, stored.clone());
        stored
    }

    /// Make the next `failures` updates of `company_id` report lock contention.
    pub fn simulate_lock_contention(&self, company_id: CompanyId, failures: u32) {
        self.tables.lock().contention.insert(company_id, failures);
    }

    /// Make every update of `company_id` fail with a non-transient error.
    pub fn simulate_write_failure(&self, company_id: CompanyId) {
        self.tables.lock().broken.insert(company_id);
    }

    /// Total number of `update_company` calls, including failed ones.
    pub fn update_attempts(&self) -> u64 {
        self.tables.lock().update_attempts
    }

    /// Number of stored snapshots.
    pub fn num_snapshots(&self) -> usize {
        self.tables.lock().snapshots.len()
    }
}

#[async_trait]
impl EsgStore for InMemoryEsgStore {
    type Error = InMemoryError;

    async fn list_companies(&self) -> Result<Vec<Company>, Self::Error> {
        Ok(self.tables.lock().companies.values().cloned().collect())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, Self::Error> {
        Ok(self.tables.lock().companies.get(&id).cloned())
    }

    async fn create_company(&self, company: NewCompany) -> Result<Company, Self::Error> {
        Ok(self.add_company(company))
    }

    async fn update_company(&self, update: &CompanyUpdate) -> Result<Option<Company>, Self::Error> {
        let mut tables = self.tables.lock();
        tables.update_attempts += 1;

        if let Some(remaining) = tables.contention.get_mut(&update.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(InMemoryError::Locked(update.id));
            }
        }
        if tables.broken.contains(&update.id) {
            return Err(InMemoryError::WriteFailed(update.id));
        }

        Ok(tables.companies.get_mut(&update.id).map(|company| {
            update.apply_to(company);
            company.clone()
        }))
    }

    async fn list_snapshots(
        &self,
        company_id: Option<CompanyId>,
    ) -> Result<Vec<EsgSnapshot>, Self::Error> {
        Ok(self
            .tables
            .lock()
            .snapshots
            .values()
            .filter(|s| company_id.map_or(true, |id| s.company_id == id))
            .cloned()
            .collect())
    }

    async fn latest_snapshot(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<EsgSnapshot>, Self::Error> {
        Ok(self
            .tables
            .lock()
            .snapshots
            .values()
            .filter(|s| s.company_id == company_id)
            .max_by_key(|s| s.recency_key())
            .cloned())
    }

    async fn insert_snapshots(
        &self,
        snapshots: Vec<NewSnapshot>,
    ) -> Result<Vec<EsgSnapshot>, Self::Error> {
        let mut tables = self.tables.lock();

        // Check every reference before touching the table.
        if let Some(missing) = snapshots
            .iter()
            .find(|s| !tables.companies.contains_key(&s.company_id))
        {
            return Err(InMemoryError::UnknownCompany(missing.company_id));
        }

        let mut stored = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            tables.next_snapshot_id += 1;
            let snapshot = snapshot.into_snapshot(tables.next_snapshot_id);
            tables.snapshots.insert(snapshot.id, snapshot.clone());
            stored.push(snapshot);
        }
        Ok(stored)
    }
}
