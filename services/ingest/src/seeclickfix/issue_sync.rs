use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use scf_common::error::ScfError;
use scf_db::issues::repositories::IssueRepository;

use super::client::{IssuesClient, IssuesClientError};
use super::persist::IssuePersister;
use super::watermark::WatermarkProvider;
use crate::connector::{Connector, RunMode, SyncResult};

const SOURCE_NAME: &str = "seeclickfix_issues";

/// Lifecycle of one run:
/// `Idle → Fetching → Fetched → Persisting → Done`, or `Failed` from
/// `Fetching` / `Persisting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Fetched,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "IDLE",
            RunState::Fetching => "FETCHING",
            RunState::Fetched => "FETCHED",
            RunState::Persisting => "PERSISTING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read watermark: {0}")]
    Watermark(#[source] ScfError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] IssuesClientError),

    #[error("persist failed: {0}")]
    Persist(#[source] ScfError),
}

/// Fetch-then-persist pipeline for one place's issue feed.
pub struct IssueSyncer<W, R> {
    client: IssuesClient,
    watermarks: W,
    persister: IssuePersister<R>,
    state: Mutex<RunState>,
}

impl<W, R> IssueSyncer<W, R>
where
    W: WatermarkProvider,
    R: IssueRepository,
{
    pub fn new(client: IssuesClient, watermarks: W, repo: R) -> Self {
        Self {
            client,
            watermarks,
            persister: IssuePersister::new(repo),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// State reached by the latest run (`Idle` before the first one).
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, next: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
        tracing::debug!(state = %next, "run state");
    }

    /// Run the pipeline once. Errors leave the sink exactly as it was.
    pub async fn run(&self, mode: RunMode) -> Result<SyncResult, IngestError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest_run", %run_id, %mode);

        async move {
            self.enter(RunState::Fetching);
            let result = self.fetch_and_persist(run_id, mode).await;
            match &result {
                Ok(done) => {
                    self.enter(RunState::Done);
                    tracing::info!(
                        fetched = done.fetched,
                        upserted = done.upserted,
                        "run complete"
                    );
                }
                Err(e) => {
                    self.enter(RunState::Failed);
                    tracing::error!(error = %e, "run failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn fetch_and_persist(
        &self,
        run_id: Uuid,
        mode: RunMode,
    ) -> Result<SyncResult, IngestError> {
        let watermark = self.lower_bound(mode).await?;
        tracing::info!(watermark = ?watermark, "fetching issues");

        let batch = self.client.fetch_issues(watermark).await?;
        self.enter(RunState::Fetched);
        let fetched = batch.len();
        tracing::info!(fetched, newest = ?batch.max_updated_at(), "fetch complete");

        self.enter(RunState::Persisting);
        let upserted = self
            .persister
            .persist(batch)
            .await
            .map_err(IngestError::Persist)?;

        Ok(SyncResult {
            source: SOURCE_NAME.to_string(),
            run_id,
            mode,
            watermark,
            fetched,
            upserted,
        })
    }

    async fn lower_bound(&self, mode: RunMode) -> Result<Option<DateTime<Utc>>, IngestError> {
        match mode {
            RunMode::FirstRun => Ok(None),
            RunMode::Incremental => self
                .watermarks
                .current_watermark()
                .await
                .map(Some)
                .map_err(IngestError::Watermark),
        }
    }
}

#[async_trait]
impl<W, R> Connector for IssueSyncer<W, R>
where
    W: WatermarkProvider,
    R: IssueRepository,
{
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn sync(
        &self,
        mode: RunMode,
    ) -> Result<SyncResult, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.run(mode).await?)
    }
}
