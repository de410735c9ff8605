use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::issues::models::IssueRow;
use scf_common::error::ScfResult;

#[async_trait]
pub trait IssueRepository: Send + Sync {
    /// Latest `updated_at` over all stored rows, `None` when the table is empty.
    async fn max_updated_at(&self) -> ScfResult<Option<DateTime<Utc>>>;

    /// Insert or update every row keyed by `id`, all in one transaction.
    /// On conflict only `obj` and `updated_at` are overwritten.
    /// Either every row is committed or none is.
    async fn upsert_batch(&self, rows: &[IssueRow]) -> ScfResult<u64>;

    async fn get_by_id(&self, id: i64) -> ScfResult<Option<IssueRow>>;

    async fn count(&self) -> ScfResult<i64>;
}
