use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use scf_common::error::ScfResult;
use scf_db::issues::repositories::IssueRepository;

/// Lower bound used when nothing has been stored yet.
pub const BOOTSTRAP_WATERMARK: &str = "2024-11-15T00:00:00Z";

/// Source of the resumption point for an incremental run.
#[async_trait]
pub trait WatermarkProvider: Send + Sync {
    /// Latest durably stored `updated_at`, or the bootstrap default.
    async fn current_watermark(&self) -> ScfResult<DateTime<Utc>>;
}

/// Derives the watermark from the sink itself (`MAX(updated_at)`); nothing
/// is stored separately, so it only moves when rows commit.
#[derive(Clone)]
pub struct SinkWatermark<R> {
    repo: R,
    bootstrap: DateTime<Utc>,
}

impl<R> SinkWatermark<R>
where
    R: IssueRepository,
{
    pub fn new(repo: R, bootstrap: DateTime<Utc>) -> Self {
        Self { repo, bootstrap }
    }
}

#[async_trait]
impl<R> WatermarkProvider for SinkWatermark<R>
where
    R: IssueRepository,
{
    async fn current_watermark(&self) -> ScfResult<DateTime<Utc>> {
        let stored = self.repo.max_updated_at().await?;
        // second precision; flooring keeps the `>=` filter inclusive
        Ok(stored
            .map(|ts| ts.trunc_subsecs(0))
            .unwrap_or(self.bootstrap))
    }
}
