use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable form of an ingested issue: `(id, obj, updated_at)`.
///
/// `obj` holds the complete record as received from the API, so the
/// original can always be recovered from the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRow {
    pub id: i64,
    pub obj: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
