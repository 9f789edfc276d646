//! Windsurf provider.
//!
//! Windsurf has no public usage API. The IDE caches the signed-in user's
//! plan status locally as a base64 tagged-record blob, which is read and
//! decoded without a schema.

mod cache;
mod error;

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::instrument;

use meterbar_core::{Candidate, ProviderKind};
use meterbar_fetch::{CandidatePipeline, FetchContext, FetchError, FetchKind, FetchStrategy};

use crate::descriptor::ProviderDescriptor;

pub use cache::{
    AUTH_STATUS_KEY, candidate_from_status, decode_user_status, read_auth_status, read_candidate,
    state_db_path,
};
pub use error::WindsurfError;

// ============================================================================
// Strategy
// ============================================================================

/// Reads usage from the IDE's local state database.
#[derive(Debug, Clone)]
pub struct WindsurfCacheStrategy {
    db_path: Option<PathBuf>,
}

impl WindsurfCacheStrategy {
    /// Creates a strategy for the default database location.
    pub fn new() -> Self {
        Self {
            db_path: state_db_path(),
        }
    }

    /// Creates a strategy for an explicit database file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
        }
    }
}

impl Default for WindsurfCacheStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchStrategy for WindsurfCacheStrategy {
    fn id(&self) -> &str {
        "windsurf.local_cache"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::LocalCache
    }

    fn source_label(&self) -> String {
        "local:state.vscdb".to_string()
    }

    async fn is_available(&self, _ctx: &FetchContext) -> bool {
        self.db_path.as_ref().is_some_and(|p| p.exists())
    }

    #[instrument(skip(self, _ctx))]
    async fn fetch(&self, _ctx: &FetchContext) -> Result<Candidate, FetchError> {
        let path = self.db_path.clone().ok_or(WindsurfError::CacheNotFound)?;
        let priority = self.priority();
        let label = self.source_label();

        let candidate = tokio::task::spawn_blocking(move || read_candidate(&path, priority, &label))
            .await
            .map_err(|e| FetchError::Aborted(e.to_string()))??;
        Ok(candidate)
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Builds the single local-cache strategy.
///
/// An endpoint override for Windsurf names the state database file.
pub fn build_windsurf_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    let strategy = match ctx.settings.endpoints.get(&ProviderKind::Windsurf) {
        Some(path) => WindsurfCacheStrategy::at(path),
        None => WindsurfCacheStrategy::new(),
    };
    CandidatePipeline::with_strategies(vec![Box::new(strategy)])
}

/// Windsurf descriptor.
pub fn windsurf_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Windsurf)
        .dashboard("https://windsurf.com/subscription/usage")
        .pipeline(&[FetchKind::LocalCache], build_windsurf_pipeline)
        .aliases(&["codeium"])
        .build()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use meterbar_core::ErrorKind;
    use meterbar_fetch::{FetchOrchestrator, FetchSettings, PipelineProvider, UsageProvider};
    use std::path::Path;
    use std::sync::Arc;

    fn write_status(db: &Path, blob: &[u8]) {
        let conn = rusqlite::Connection::open(db).unwrap();
        conn.execute_batch("CREATE TABLE ItemTable (key TEXT, value BLOB)").unwrap();
        let encoded = STANDARD.encode(blob);
        conn.execute(
            "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)",
            [AUTH_STATUS_KEY, encoded.as_str()],
        )
        .unwrap();
    }

    fn ctx_for(db: &Path) -> FetchContext {
        FetchContext::builder()
            .settings(FetchSettings::default().with_endpoint(ProviderKind::Windsurf, db.to_string_lossy()))
            .build()
    }

    fn provider() -> PipelineProvider {
        PipelineProvider::new(ProviderKind::Windsurf, build_windsurf_pipeline)
    }

    #[tokio::test]
    async fn test_strategy_reads_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        write_status(&db, &cache::tests::user_status(Some((2_000, 500)), None));

        let ctx = FetchContext::new();
        let strategy = WindsurfCacheStrategy::at(&db);
        assert!(strategy.is_available(&ctx).await);

        let candidate = strategy.fetch(&ctx).await.unwrap();
        assert_eq!(candidate.usage.used_percent(), Some(25.0));
        assert_eq!(candidate.source_priority, FetchKind::LocalCache.default_priority());
    }

    #[tokio::test]
    async fn test_strategy_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = FetchContext::new();
        let strategy = WindsurfCacheStrategy::at(dir.path().join("missing.vscdb"));

        assert!(!strategy.is_available(&ctx).await);
        let err = strategy.fetch(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_truncated_blob_is_decoding_failure() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        let blob = cache::tests::user_status(Some((2_000, 500)), None);
        write_status(&db, &blob[..blob.len() - 1]);

        let err = provider().fetch(&ctx_for(&db)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
        let message = err.to_string();
        assert!(message.contains("local:state.vscdb"), "{message}");
        assert!(message.contains("malformed input at"), "{message}");
    }

    #[tokio::test]
    async fn test_truncated_blob_in_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        let blob = cache::tests::user_status(Some((2_000, 500)), None);
        write_status(&db, &blob[..blob.len() - 1]);

        let orchestrator = FetchOrchestrator::new(Arc::new(ctx_for(&db)));
        let cycle = orchestrator
            .run_cycle("test", vec![Arc::new(provider()) as Arc<dyn UsageProvider>])
            .await
            .unwrap();
        assert_eq!(cycle.errors.get(&ProviderKind::Windsurf), Some(&ErrorKind::Decoding));
    }

    #[tokio::test]
    async fn test_override_points_at_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        write_status(&db, &cache::tests::user_status(Some((2_000, 500)), None));

        let result = provider().fetch(&ctx_for(&db)).await.unwrap();
        assert_eq!(result.aggregate_usage.used_percent(), Some(25.0));
    }

    #[test]
    fn test_descriptor() {
        let desc = windsurf_descriptor();
        assert_eq!(desc.cli_name(), "windsurf");
        assert_eq!(desc.fetch_plan.source_kinds, &[FetchKind::LocalCache]);
    }
}
