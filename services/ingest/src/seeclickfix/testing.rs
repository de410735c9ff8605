//! Fakes and JSON builders shared by the seeclickfix test modules.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scf_common::error::{ScfError, ScfResult};
use scf_db::issues::models::IssueRow;
use scf_db::issues::repositories::IssueRepository;

use super::pacing::Sleeper;

// -- Sleeper that records instead of waiting --

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

// -- In-memory IssueRepository --

/// Applies a batch to a staged copy and swaps it in only if every row
/// succeeds, so a failing row leaves the table untouched.
#[derive(Clone, Default)]
pub struct MemoryIssueRepo {
    rows: Arc<Mutex<BTreeMap<i64, IssueRow>>>,
    fail_on_id: Option<i64>,
    upsert_calls: Arc<AtomicUsize>,
}

impl MemoryIssueRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(id: i64) -> Self {
        Self {
            fail_on_id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_rows(rows: Vec<IssueRow>) -> Self {
        let repo = Self::new();
        {
            let mut stored = repo.rows.lock().unwrap();
            for row in rows {
                stored.insert(row.id, row);
            }
        }
        repo
    }

    pub fn snapshot(&self) -> BTreeMap<i64, IssueRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IssueRepository for MemoryIssueRepo {
    async fn max_updated_at(&self) -> ScfResult<Option<DateTime<Utc>>> {
        Ok(self.rows.lock().unwrap().values().map(|r| r.updated_at).max())
    }

    async fn upsert_batch(&self, rows: &[IssueRow]) -> ScfResult<u64> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut stored = self.rows.lock().unwrap();
        let mut staged = stored.clone();
        for row in rows {
            if Some(row.id) == self.fail_on_id {
                return Err(ScfError::Database(format!(
                    "upsert of issue {} failed: check constraint violated",
                    row.id
                )));
            }
            staged.insert(row.id, row.clone());
        }
        *stored = staged;
        Ok(rows.len() as u64)
    }

    async fn get_by_id(&self, id: i64) -> ScfResult<Option<IssueRow>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn count(&self) -> ScfResult<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }
}

// -- API payload builders --

pub fn issue_json(id: i64, updated_at: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "status": "Open",
        "summary": format!("Issue {id}"),
        "description": "Reported via mobile app",
        "lat": 47.2529,
        "lng": -122.4443,
        "address": "747 Market St, Tacoma, WA",
        "created_at": "2024-11-01T09:00:00-07:00",
        "updated_at": updated_at,
        "reporter": { "id": id * 10, "name": "Resident", "role": "Registered User" },
        "request_type": { "id": 4, "title": "Pothole" }
    })
}

pub fn page_json(
    issues: Vec<serde_json::Value>,
    page: u32,
    next_page: Option<u32>,
) -> serde_json::Value {
    let count = issues.len();
    serde_json::json!({
        "issues": issues,
        "metadata": {
            "pagination": {
                "entries": count,
                "page": page,
                "per_page": 10,
                "pages": next_page.unwrap_or(page),
                "next_page": next_page,
                "next_page_url": next_page.map(|p| format!("https://example.test/issues?page={p}")),
                "previous_page": if page > 1 { Some(page - 1) } else { None },
                "previous_page_url": null
            }
        }
    })
}
