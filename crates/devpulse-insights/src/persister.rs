use crate::results::RubricResult;
use crate::summary::executive_summary;
use chrono::{Duration, Utc};
use devpulse_core::{Insight, InsightStore, NewInsight, Provenance, PulseError, Result};
use std::sync::Arc;
use tracing::{error, info};

/// Appends one insight row per analysis run.
#[derive(Clone)]
pub struct InsightPersister {
    store: Arc<dyn InsightStore>,
    ttl: Duration,
}

impl InsightPersister {
    pub fn new(store: Arc<dyn InsightStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn InsightStore> {
        &self.store
    }

    /// Derive confidence, category, summary and expiry, then insert. Never retries.
    pub async fn save(
        &self,
        project_id: &str,
        result: &RubricResult,
        provenance: &Provenance,
    ) -> Result<Insight> {
        let row = NewInsight::new(
            project_id,
            result.kind,
            result.confidence_or_default(),
            result.to_insight_data(provenance),
            executive_summary(result),
            result.alert_category(),
            Utc::now(),
            self.ttl,
        );

        let saved = self.store.insert_insight(row).await.map_err(|e| match e {
            PulseError::Persistence(_) => e,
            other => PulseError::Persistence(other.to_string()),
        });

        match &saved {
            Ok(insight) => info!(
                insight_id = %insight.id,
                insight_type = %insight.insight_type,
                project_id,
                alert_category = %insight.alert_category,
                "Insight persisted"
            ),
            Err(e) => error!(insight_type = %result.kind, project_id, error = %e, "Insight insert rejected"),
        }
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use devpulse_core::{AlertCategory, InsightType};
    use devpulse_store::MemoryStore;

    struct RejectingStore;

    #[async_trait]
    impl InsightStore for RejectingStore {
        async fn insert_insight(&self, _insight: NewInsight) -> Result<Insight> {
            Err(PulseError::Store("disk full".into()))
        }

        async fn active_insights(&self, _: &str, _: DateTime<Utc>) -> Result<Vec<Insight>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn saved_row_expires_seven_days_after_generation() {
        let store = Arc::new(MemoryStore::new());
        let persister = InsightPersister::new(store.clone(), Duration::days(7));

        let saved = persister
            .save(
                "proj-1",
                &RubricResult::pipeline_not_configured(),
                &Provenance::default(),
            )
            .await
            .unwrap();

        assert_eq!(saved.expires_at - saved.generated_at, Duration::days(7));
        assert_eq!(saved.alert_category, AlertCategory::Pipeline);
        assert_eq!(saved.confidence_score, 1.0);
        assert_eq!(store.all_insights().len(), 1);
    }

    #[tokio::test]
    async fn missing_confidence_falls_back_to_rubric_default() {
        let store = Arc::new(MemoryStore::new());
        let persister = InsightPersister::new(store, Duration::days(7));
        let result = RubricResult::from_model(InsightType::CodeQuality, &serde_json::Map::new());

        let saved = persister
            .save("proj-1", &result, &Provenance::default())
            .await
            .unwrap();
        assert_eq!(saved.confidence_score, 0.7);
        assert_eq!(saved.alert_category, AlertCategory::General);
        assert!(!saved.executive_summary.is_empty());
    }

    #[tokio::test]
    async fn store_rejection_propagates_as_persistence_error() {
        let persister = InsightPersister::new(Arc::new(RejectingStore), Duration::days(7));
        let err = persister
            .save(
                "proj-1",
                &RubricResult::pipeline_not_configured(),
                &Provenance::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert!(err.to_string().contains("disk full"));
    }
}
