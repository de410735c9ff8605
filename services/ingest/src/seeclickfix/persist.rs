use scf_common::error::ScfResult;
use scf_db::issues::models::IssueRow;
use scf_db::issues::repositories::IssueRepository;

use super::models::IssueBatch;

/// Writes one run's batch to the sink as a single all-or-nothing upsert.
pub struct IssuePersister<R> {
    repo: R,
}

impl<R> IssuePersister<R>
where
    R: IssueRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Upsert every record by `id`. Returns the number of rows written.
    ///
    /// An empty batch never touches the sink. On failure nothing is
    /// committed and the error is logged before being returned.
    pub async fn persist(&self, batch: IssueBatch) -> ScfResult<u64> {
        if batch.is_empty() {
            tracing::info!("no issues to process");
            return Ok(0);
        }

        let rows: Vec<IssueRow> = batch.into_rows();
        tracing::info!(rows = rows.len(), "inserting issues into the database");

        match self.repo.upsert_batch(&rows).await {
            Ok(written) => Ok(written),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    rows = rows.len(),
                    "error inserting rows, batch rolled back"
                );
                Err(e)
            }
        }
    }
}
