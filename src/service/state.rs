//! Shared service state.

use std::sync::Arc;

use crate::batch::BatchUpdater;
use crate::config::ServiceConfig;
use crate::report::{ReportGenerator, ReportSpool};
use crate::store::EsgStore;

/// Shared service state.
///
/// Holds the store handle, the configuration and the report spool. Cloning is
/// cheap: every field is reference counted.
pub struct ServiceState<S: EsgStore + 'static> {
    /// The ESG store.
    pub store: Arc<S>,
    /// Service configuration.
    pub config: Arc<ServiceConfig>,
    /// Where rendered reports are spooled before download.
    pub spool: Arc<ReportSpool>,
}

impl<S: EsgStore + 'static> ServiceState<S> {
    /// Create state from a store and configuration.
    pub fn new(store: S, config: ServiceConfig) -> Self {
        let spool = ReportSpool::new(config.report_dir.clone());
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            spool: Arc::new(spool),
        }
    }

    /// Create state with configuration read from the environment.
    pub fn from_env(store: S) -> Self {
        Self::new(store, ServiceConfig::from_env())
    }

    /// Batch applier using the configured retry policy.
    pub fn batch_updater(&self) -> BatchUpdater<S> {
        BatchUpdater::new(Arc::clone(&self.store), self.config.retry)
    }

    /// Report generator over the store.
    pub fn report_generator(&self) -> ReportGenerator<S> {
        ReportGenerator::new(Arc::clone(&self.store))
    }
}

impl<S: EsgStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            spool: Arc::clone(&self.spool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RetryPolicy;
    use crate::store::InMemoryEsgStore;

    #[test]
    fn test_clone_shares_store() {
        let state = ServiceState::new(InMemoryEsgStore::new(), ServiceConfig::default());
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.store, &cloned.store));
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
    }

    #[test]
    fn test_batch_updater_uses_configured_policy() {
        let config = ServiceConfig {
            retry: RetryPolicy::immediate(7),
            ..ServiceConfig::default()
        };
        let state = ServiceState::new(InMemoryEsgStore::new(), config);
        assert_eq!(state.batch_updater().policy(), RetryPolicy::immediate(7));
    }

    #[test]
    fn test_spool_uses_report_dir() {
        let config = ServiceConfig {
            report_dir: "/tmp/esg-test-reports".into(),
            ..ServiceConfig::default()
        };
        let state = ServiceState::new(InMemoryEsgStore::new(), config);
        assert_eq!(state.spool.dir(), std::path::Path::new("/tmp/esg-test-reports"));
    }
}
