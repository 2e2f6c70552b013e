//! Outcome store port and the shared audit log handle.
//!
//! The outcome store is the telemetry sink every phase writes to and the
//! learner reads from. The core only relies on "record" and a paginated
//! category query that reports whether more pages remain.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use metaloop_types::audit::{AuditCategory, AuditEvent, AuditRecord, OutcomePage};
use metaloop_types::error::OutcomeStoreError;

/// Persistence backend for audit events.
pub trait OutcomeStore: Send + Sync {
    /// Append one record. Delivery is at-least-once.
    fn record(
        &self,
        record: &AuditRecord,
    ) -> impl Future<Output = Result<(), OutcomeStoreError>> + Send;

    /// Records of `category` recorded at or after `since`, oldest first,
    /// skipping `offset` and returning at most `limit`.
    fn query_by_category(
        &self,
        category: AuditCategory,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<OutcomePage, OutcomeStoreError>> + Send;
}

/// Object-safe version of [`OutcomeStore`].
pub trait OutcomeStoreDyn: Send + Sync {
    fn record_boxed<'a>(
        &'a self,
        record: &'a AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), OutcomeStoreError>> + Send + 'a>>;

    fn query_by_category_boxed(
        &self,
        category: AuditCategory,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<OutcomePage, OutcomeStoreError>> + Send + '_>>;
}

impl<T: OutcomeStore> OutcomeStoreDyn for T {
    fn record_boxed<'a>(
        &'a self,
        record: &'a AuditRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), OutcomeStoreError>> + Send + 'a>> {
        Box::pin(self.record(record))
    }

    fn query_by_category_boxed(
        &self,
        category: AuditCategory,
        since: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<OutcomePage, OutcomeStoreError>> + Send + '_>> {
        Box::pin(self.query_by_category(category, since, offset, limit))
    }
}

/// Cloneable handle to the outcome store shared by all phases.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn OutcomeStoreDyn>,
}

impl AuditLog {
    pub fn new<T: OutcomeStore + 'static>(store: Arc<T>) -> Self {
        Self { store }
    }

    /// Record an event, logging (not returning) a store failure.
    ///
    /// Telemetry loss must never fail a candidate or a classification.
    pub async fn record(&self, scope: &str, event: AuditEvent) {
        if let Err(e) = self.try_record(scope, event).await {
            tracing::warn!(scope, error = %e, "failed to record audit event");
        }
    }

    pub async fn try_record(&self, scope: &str, event: AuditEvent) -> Result<(), OutcomeStoreError> {
        let category = event.category();
        let record = AuditRecord::new(scope, event, Utc::now());
        self.store.record_boxed(&record).await?;
        tracing::debug!(scope, category = %category, "audit event recorded");
        Ok(())
    }

    /// Fetch every record of `category` since `since`, following pages
    /// until the store reports none remain.
    pub async fn query_all(
        &self,
        category: AuditCategory,
        since: DateTime<Utc>,
        page_size: usize,
    ) -> Result<Vec<AuditRecord>, OutcomeStoreError> {
        let page_size = page_size.max(1);
        let mut offset = 0;
        let mut records = Vec::new();
        loop {
            let page = self
                .store
                .query_by_category_boxed(category, since, offset, page_size)
                .await?;
            let fetched = page.records.len();
            offset += fetched;
            records.extend(page.records);
            if !page.has_more || fetched == 0 {
                break;
            }
        }
        tracing::debug!(category = %category, count = records.len(), "fetched outcome records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryOutcomeStore, tracker_event};
    use metaloop_types::audit::LearnerEvent;
    use metaloop_types::tracking::OutcomeCategory;

    #[tokio::test]
    async fn test_query_all_follows_has_more() {
        let store = Arc::new(MemoryOutcomeStore::with_page_cap(2));
        let audit = AuditLog::new(store.clone());
        for i in 0..5 {
            audit
                .record(&format!("/p{i}"), tracker_event(&format!("/p{i}"), OutcomeCategory::HighCtr))
                .await;
        }
        audit
            .record("/other", tracker_event("/other", OutcomeCategory::NoImprovement))
            .await;

        let since = Utc::now() - chrono::Duration::days(1);
        let records = audit.query_all(AuditCategory::HighCtr, since, 100).await.unwrap();

        assert_eq!(records.len(), 5);
        // Cap of 2 per page: offsets 0, 2, 4.
        assert_eq!(store.query_offsets(), vec![0, 2, 4]);
        let scopes: Vec<_> = records.iter().map(|r| r.scope.as_str()).collect();
        assert_eq!(scopes, vec!["/p0", "/p1", "/p2", "/p3", "/p4"]);
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let store = Arc::new(MemoryOutcomeStore::default());
        store.fail_writes(true);
        let audit = AuditLog::new(store.clone());

        audit
            .record(
                "run",
                AuditEvent::Learner(LearnerEvent::InsufficientData {
                    high_performers: 0,
                    required: 5,
                }),
            )
            .await;
        assert!(store.records().is_empty());

        let err = audit
            .try_record(
                "run",
                AuditEvent::Learner(LearnerEvent::InsufficientData {
                    high_performers: 0,
                    required: 5,
                }),
            )
            .await;
        assert!(err.is_err());
    }
}
