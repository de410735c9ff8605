use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scf_db::issues::models::IssueRow;

/// One page of `GET /issues`.
///
/// `issues` and `metadata.pagination` are required; a body without them
/// fails to deserialize.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuesPage {
    pub issues: Vec<serde_json::Value>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageMetadata {
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub entries: Option<u64>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub pages: Option<u32>,
    pub next_page: Option<u32>,
    pub previous_page: Option<u32>,
}

impl Pagination {
    /// Page to request next, `None` once the sequence is exhausted.
    pub fn next(&self) -> Option<u32> {
        self.next_page.filter(|p| *p > 0)
    }
}

/// An issue as received from the API.
///
/// Only `id` and `updated_at` are typed; `raw` is the untouched object and
/// is what gets stored.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRecord {
    pub id: i64,
    pub updated_at: DateTime<Utc>,
    pub raw: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("issue is not a JSON object")]
    NotAnObject,

    #[error("issue has no integer `id`")]
    MissingId,

    #[error("issue {id} has no `updated_at`")]
    MissingUpdatedAt { id: i64 },

    #[error("issue {id} has unparseable `updated_at` {value:?}: {source}")]
    InvalidUpdatedAt {
        id: i64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl TryFrom<serde_json::Value> for IssueRecord {
    type Error = RecordError;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        let obj = raw.as_object().ok_or(RecordError::NotAnObject)?;
        let id = obj
            .get("id")
            .and_then(serde_json::Value::as_i64)
            .ok_or(RecordError::MissingId)?;
        let value = obj
            .get("updated_at")
            .and_then(serde_json::Value::as_str)
            .ok_or(RecordError::MissingUpdatedAt { id })?;
        let updated_at = DateTime::parse_from_rfc3339(value)
            .map_err(|source| RecordError::InvalidUpdatedAt {
                id,
                value: value.to_string(),
                source,
            })?
            .with_timezone(&Utc);

        Ok(Self {
            id,
            updated_at,
            raw,
        })
    }
}

impl From<IssueRecord> for IssueRow {
    fn from(record: IssueRecord) -> Self {
        IssueRow {
            id: record.id,
            obj: record.raw,
            updated_at: record.updated_at,
        }
    }
}

/// Everything one fetch produced, in request order.
///
/// Not `Clone`: the persister takes it by value, so a run's output is
/// handed over exactly once.
#[derive(Debug, Default)]
pub struct IssueBatch {
    records: Vec<IssueRecord>,
}

impl IssueBatch {
    pub fn new(records: Vec<IssueRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IssueRecord] {
        &self.records
    }

    pub fn max_updated_at(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.updated_at).max()
    }

    pub fn into_rows(self) -> Vec<IssueRow> {
        self.records.into_iter().map(IssueRow::from).collect()
    }
}
