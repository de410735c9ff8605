use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Chosen by whoever triggers a run. `FirstRun` ingests the whole catalog
/// with no `updated_at` lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    FirstRun,
    Incremental,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::FirstRun => f.write_str("first_run"),
            RunMode::Incremental => f.write_str("incremental"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncResult {
    pub source: String,
    pub run_id: Uuid,
    pub mode: RunMode,
    /// Lower bound sent to the API; `None` on a first run.
    pub watermark: Option<DateTime<Utc>>,
    pub fetched: usize,
    pub upserted: u64,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn source_name(&self) -> &str;
    async fn sync(
        &self,
        mode: RunMode,
    ) -> Result<SyncResult, Box<dyn std::error::Error + Send + Sync>>;
}
