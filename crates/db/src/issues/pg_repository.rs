use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::issues::models::IssueRow;
use crate::issues::repositories::IssueRepository;
use scf_common::error::{ScfError, ScfResult};

pub const DEFAULT_TABLE: &str = "seeclickfix_source";

#[derive(Clone)]
pub struct PgIssueRepository {
    pool: PgPool,
    table: String,
}

impl PgIssueRepository {
    /// Repository over the default `seeclickfix_source` table.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// Repository over a custom table. The name is interpolated into SQL,
    /// so it must be a plain (optionally schema-qualified) identifier.
    pub fn with_table(pool: PgPool, table: &str) -> ScfResult<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn map_row(row: sqlx::postgres::PgRow) -> IssueRow {
        IssueRow {
            id: row.get("id"),
            obj: row.get("obj"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Accepts `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table_name(table: &str) -> ScfResult<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(ScfError::Validation(format!(
            "invalid table name: {table:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl IssueRepository for PgIssueRepository {
    async fn max_updated_at(&self) -> ScfResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(&format!(
            "select max(updated_at) as max_updated_at from {}",
            self.table
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ScfError::Database(e.to_string()))?;

        Ok(row.get::<Option<DateTime<Utc>>, _>("max_updated_at"))
    }

    async fn upsert_batch(&self, rows: &[IssueRow]) -> ScfResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "insert into {} (id, obj, updated_at)
             values ($1, $2, $3)
             on conflict (id) do update set
               obj = excluded.obj,
               updated_at = excluded.updated_at",
            self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ScfError::Database(e.to_string()))?;

        let mut written: u64 = 0;
        for row in rows {
            let result = sqlx::query(&sql)
                .bind(row.id)
                .bind(&row.obj)
                .bind(row.updated_at)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(done) => written += done.rows_affected(),
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(error = %rollback_err, "rollback after failed upsert also failed");
                    }
                    return Err(ScfError::Database(format!(
                        "upsert of issue {} failed: {e}",
                        row.id
                    )));
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| ScfError::Database(e.to_string()))?;

        Ok(written)
    }

    async fn get_by_id(&self, id: i64) -> ScfResult<Option<IssueRow>> {
        let row = sqlx::query(&format!(
            "select id, obj, updated_at from {} where id = $1",
            self.table
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ScfError::Database(e.to_string()))?;

        Ok(row.map(Self::map_row))
    }

    async fn count(&self) -> ScfResult<i64> {
        let row = sqlx::query(&format!("select count(*) as cnt from {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ScfError::Database(e.to_string()))?;
        Ok(row.get::<i64, _>("cnt"))
    }
}
