//! Batch company updates with bounded retry under lock contention.
//!
//! Updates are applied one by one, in input order, each in its own store
//! transaction. A later failure never rolls back an earlier commit.
//!
//! ```text
//! for update in updates:
//!     attempt = 1
//!     loop:
//!         store.update_company(update)
//!           Ok(Some)         -> collect, next update
//!           Ok(None)         -> unknown id, skip silently
//!           LockContention   -> attempt == max ? StoreBusy : sleep(delay), attempt += 1
//!           other error      -> abort the whole request
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EsgError, EsgResult};
use crate::model::{Company, CompanyUpdate};
use crate::store::{store_error, ClassifyError, EsgStore, StoreErrorKind};

/// Retry ceiling and delay for lock-contended updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per update, including the first (default: 3).
    pub max_attempts: u32,
    /// Fixed delay between attempts (default: 500ms).
    #[serde(with = "duration_millis")]
    pub delay: Duration,
}

impl RetryPolicy {
    /// Default ceiling.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    /// Default delay between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    /// Create a policy. A ceiling of zero is raised to one attempt.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Same ceiling, no delay. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Outcome counters of one batch, for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Updates that committed.
    pub applied: usize,
    /// Updates skipped because the company does not exist.
    pub skipped: usize,
    /// Retries caused by lock contention.
    pub retries: u32,
}

/// Result of a successful batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Companies as stored after their update, in input order.
    pub updated: Vec<Company>,
    /// Counters.
    pub stats: BatchStats,
}

/// Applies partial company updates against a store.
pub struct BatchUpdater<S: EsgStore> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S: EsgStore + 'static> BatchUpdater<S> {
    /// Create an updater.
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The retry policy in use.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Apply every update in order.
    ///
    /// # Errors
    /// - [`EsgError::StoreBusy`] when one update stays lock-contended for the whole ceiling
    /// - any other store failure, converted with [`store_error`]
    ///
    /// In both cases updates committed before the failure stay committed.
    pub async fn apply(&self, updates: &[CompanyUpdate]) -> EsgResult<BatchOutcome> {
        let mut updated = Vec::with_capacity(updates.len());
        let mut stats = BatchStats::default();

        for (index, update) in updates.iter().enumerate() {
            let mut attempt = 1;
            loop {
                match self.store.update_company(update).await {
                    Ok(Some(company)) => {
                        stats.applied += 1;
                        updated.push(company);
                        break;
                    }
                    Ok(None) => {
                        debug!(company_id = update.id, index, "Skipping update for unknown company");
                        stats.skipped += 1;
                        break;
                    }
                    Err(e) if e.kind() == StoreErrorKind::LockContention => {
                        if attempt >= self.policy.max_attempts {
                            warn!(
                                company_id = update.id,
                                index,
                                attempts = attempt,
                                committed = stats.applied,
                                "Giving up on lock-contended update"
                            );
                            return Err(EsgError::StoreBusy(
                                "Database is locked. Please try again.".to_string(),
                            ));
                        }
                        debug!(
                            company_id = update.id,
                            attempt,
                            delay_ms = self.policy.delay.as_millis() as u64,
                            error = %e,
                            "Update lock-contended, retrying"
                        );
                        attempt += 1;
                        stats.retries += 1;
                        tokio::time::sleep(self.policy.delay).await;
                    }
                    Err(e) => {
                        warn!(
                            company_id = update.id,
                            index,
                            committed = stats.applied,
                            error = %e,
                            "Batch update aborted"
                        );
                        return Err(store_error(e));
                    }
                }
            }
        }

        Ok(BatchOutcome { updated, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCompany;
    use crate::store::InMemoryEsgStore;

    fn setup(names: &[&str]) -> (Arc<InMemoryEsgStore>, Vec<Company>) {
        let store = InMemoryEsgStore::new();
        let companies = names
            .iter()
            .map(|n| store.add_company(NewCompany::named(*n)))
            .collect();
        (Arc::new(store), companies)
    }

    #[tokio::test]
    async fn test_last_update_wins_for_same_id() {
        let (store, companies) = setup(&["Acme"]);
        let id = companies[0].id;
        let updater = BatchUpdater::new(Arc::clone(&store), RetryPolicy::immediate(3));

        updater
            .apply(&[
                CompanyUpdate::for_company(id).description("A"),
                CompanyUpdate::for_company(id).description("B"),
            ])
            .await
            .unwrap();

        let stored = store.get_company(id).await.unwrap().unwrap();
        assert_eq!(stored.description.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_skipped() {
        let (store, companies) = setup(&["Acme"]);
        let id = companies[0].id;
        let updater = BatchUpdater::new(Arc::clone(&store), RetryPolicy::immediate(3));

        let outcome = updater
            .apply(&[
                CompanyUpdate::for_company(999).description("ghost"),
                CompanyUpdate::for_company(id).description("real"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.stats.applied, 1);
        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.updated[0].description.as_deref(), Some("real"));
    }

    #[tokio::test]
    async fn test_contention_below_ceiling_is_retried() {
        let (store, companies) = setup(&["Acme"]);
        let id = companies[0].id;
        store.simulate_lock_contention(id, 2);
        let updater = BatchUpdater::new(Arc::clone(&store), RetryPolicy::immediate(3));

        let outcome = updater
            .apply(&[CompanyUpdate::for_company(id).social_highlight("ok")])
            .await
            .unwrap();

        assert_eq!(outcome.stats.retries, 2);
        assert_eq!(store.update_attempts(), 3);
        assert_eq!(outcome.updated[0].social_highlight.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_contention_at_ceiling_is_busy_and_keeps_earlier_commits() {
        let (store, companies) = setup(&["First", "Second"]);
        let (first, second) = (companies[0].id, companies[1].id);
        store.simulate_lock_contention(second, 3);
        let updater = BatchUpdater::new(Arc::clone(&store), RetryPolicy::immediate(3));

        let result = updater
            .apply(&[
                CompanyUpdate::for_company(first).description("committed"),
                CompanyUpdate::for_company(second).description("never"),
            ])
            .await;

        assert!(matches!(result, Err(EsgError::StoreBusy(_))));
        assert_eq!(store.update_attempts(), 4);

        let kept = store.get_company(first).await.unwrap().unwrap();
        assert_eq!(kept.description.as_deref(), Some("committed"));
        let untouched = store.get_company(second).await.unwrap().unwrap();
        assert_eq!(untouched.description, None);
    }

    #[tokio::test]
    async fn test_other_failure_aborts_without_retry() {
        let (store, companies) = setup(&["First", "Broken", "Third"]);
        store.simulate_write_failure(companies[1].id);
        let updater = BatchUpdater::new(Arc::clone(&store), RetryPolicy::immediate(3));

        let result = updater
            .apply(&[
                CompanyUpdate::for_company(companies[0].id).description("one"),
                CompanyUpdate::for_company(companies[1].id).description("two"),
                CompanyUpdate::for_company(companies[2].id).description("three"),
            ])
            .await;

        assert!(matches!(result, Err(EsgError::Internal(_))));
        assert_eq!(store.update_attempts(), 2);
        let third = store.get_company(companies[2].id).await.unwrap().unwrap();
        assert_eq!(third.description, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_for_configured_delay() {
        let (store, companies) = setup(&["Acme"]);
        store.simulate_lock_contention(companies[0].id, 2);
        let updater = BatchUpdater::new(Arc::clone(&store), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        updater
            .apply(&[CompanyUpdate::for_company(companies[0].id).description("x")])
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_ceiling_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_policy_serializes_delay_as_millis() {
        let json = serde_json::to_value(RetryPolicy::default()).unwrap();
        assert_eq!(json["delay"], 500);
        assert_eq!(json["max_attempts"], 3);
    }
}
