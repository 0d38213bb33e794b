//! Audit trail repository for database operations

use sqlx::{Executor, Pool, Postgres};

use crate::{
    error::AppResult,
    models::audit::{AuditEntry, AuditQuery, NewAuditEntry},
};

/// Append an audit entry using the given executor, so callers can run the
/// append inside the same transaction as the mutation it records.
pub async fn append<'e, E>(executor: E, entry: &NewAuditEntry) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO audit_entries (action, entity_type, entity_id, acting_user_id, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(entry.acting_user_id)
    .bind(&entry.details)
    .execute(executor)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct AuditRepository {
    pool: Pool<Postgres>,
}

impl AuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List audit entries, newest first, with pagination
    pub async fn list(&self, query: &AuditQuery) -> AppResult<(Vec<AuditEntry>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
        let offset = (page - 1) * per_page;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_entries")
            .fetch_one(&self.pool)
            .await?;

        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT * FROM audit_entries
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((entries, total))
    }
}
