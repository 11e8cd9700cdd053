//! Postgres-backed tracking store.
//!
//! One tracking table per tenant, created lazily on first dispatch. Table
//! presence doubles as the tenant-exists signal: Postgres undefined_table
//! (42P01) maps to the `TableNotFound` control-flow condition, and
//! duplicate_table (42P07) to `TableExists`.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use newswatch_common::{CompletionStatus, EntityAnalysis, EntityRecord, NewswatchError};

use crate::traits::{
    AddOutcome, ClearOutcome, DeleteOutcome, EntityStore, RecipientDirectory,
};

/// Page size for listing; the listing loop walks every page.
const LIST_PAGE_SIZE: i64 = 500;

/// Cycle token carried by records that have never been through a cycle.
const NIL_CYCLE: Uuid = Uuid::nil();

// ---------------------------------------------------------------------------
// PgEntityStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn table_ident(tenant: &str) -> String {
        format!("\"{}_tracked_entities\"", sanitize_tenant(tenant))
    }

    fn table_name(tenant: &str) -> String {
        format!("{}_tracked_entities", sanitize_tenant(tenant))
    }
}

/// Lowercase the tenant and replace anything that is not `[a-z0-9_]` so the
/// value is safe to splice into an identifier position.
fn sanitize_tenant(tenant: &str) -> String {
    let mut out = String::with_capacity(tenant.len());
    for c in tenant.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.chars().next().map_or(true, |c| c.is_ascii_digit()) {
        out.insert(0, 't');
    }
    out
}

/// Map a sqlx error against a tenant table to the store taxonomy.
fn map_table_err(tenant: &str, e: sqlx::Error) -> NewswatchError {
    if let Some(db) = e.as_database_error() {
        match db.code().as_deref() {
            Some("42P01") => return NewswatchError::TableNotFound(tenant.to_string()),
            Some("42P07") => return NewswatchError::TableExists(tenant.to_string()),
            _ => {}
        }
    }
    NewswatchError::Store(e.to_string())
}

/// Parse the stored JSONB payload back into an analysis, treating the empty
/// object (a freshly added or cleared record) as no analysis at all.
fn parse_analysis(value: serde_json::Value) -> Option<EntityAnalysis> {
    if value.as_object().map_or(true, |o| o.is_empty()) {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(a) => Some(a),
        Err(e) => {
            warn!(error = %e, "Unreadable analysis payload, treating as empty");
            None
        }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn create_table(&self, tenant: &str) -> Result<(), NewswatchError> {
        let sql = format!(
            r#"
            CREATE TABLE {} (
                entity_name TEXT        PRIMARY KEY,
                analysis    JSONB       NOT NULL DEFAULT '{{}}'::jsonb,
                completed   BOOLEAN     NOT NULL DEFAULT FALSE,
                cycle       UUID        NOT NULL DEFAULT '00000000-0000-0000-0000-000000000000'
            )
            "#,
            Self::table_ident(tenant)
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| map_table_err(tenant, e))?;
        Ok(())
    }

    async fn table_exists(&self, tenant: &str) -> Result<bool, NewswatchError> {
        let row = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
            .bind(Self::table_name(tenant))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| NewswatchError::Store(e.to_string()))?;
        let present: bool = row
            .try_get("present")
            .map_err(|e| NewswatchError::Store(e.to_string()))?;
        Ok(present)
    }

    async fn add_entities(
        &self,
        tenant: &str,
        names: &[String],
    ) -> Result<AddOutcome, NewswatchError> {
        let sql = format!(
            r#"
            INSERT INTO {} (entity_name, analysis, completed, cycle)
            VALUES ($1, '{{}}'::jsonb, FALSE, $2)
            ON CONFLICT (entity_name)
            DO UPDATE SET analysis = '{{}}'::jsonb, completed = FALSE
            "#,
            Self::table_ident(tenant)
        );

        let mut outcome = AddOutcome::default();
        for name in names {
            let result = sqlx::query(&sql)
                .bind(name)
                .bind(NIL_CYCLE)
                .execute(&self.pool)
                .await;
            match result {
                Ok(_) => outcome.added.push(name.clone()),
                Err(e) => {
                    // A missing table fails every name identically; surface
                    // the control-flow condition instead of N failures.
                    let mapped = map_table_err(tenant, e);
                    if matches!(mapped, NewswatchError::TableNotFound(_)) {
                        return Err(mapped);
                    }
                    warn!(entity = %name, error = %mapped, "Failed to add entity");
                    outcome.failed.push((name.clone(), mapped.to_string()));
                }
            }
        }
        Ok(outcome)
    }

    async fn delete_entities(
        &self,
        tenant: &str,
        names: &[String],
    ) -> Result<DeleteOutcome, NewswatchError> {
        let sql = format!(
            "DELETE FROM {} WHERE entity_name = $1",
            Self::table_ident(tenant)
        );

        let mut outcome = DeleteOutcome::default();
        for name in names {
            let result = sqlx::query(&sql).bind(name).execute(&self.pool).await;
            match result {
                Ok(done) if done.rows_affected() > 0 => outcome.deleted.push(name.clone()),
                Ok(_) => outcome.not_found.push(name.clone()),
                Err(e) => {
                    let mapped = map_table_err(tenant, e);
                    if matches!(mapped, NewswatchError::TableNotFound(_)) {
                        return Err(mapped);
                    }
                    warn!(entity = %name, error = %mapped, "Failed to delete entity");
                    outcome.not_found.push(name.clone());
                }
            }
        }
        Ok(outcome)
    }

    async fn list_entities(
        &self,
        tenant: &str,
        include_analysis: bool,
    ) -> Result<Vec<EntityRecord>, NewswatchError> {
        let sql = format!(
            r#"
            SELECT entity_name, completed, analysis
            FROM {}
            WHERE entity_name > $1
            ORDER BY entity_name ASC
            LIMIT $2
            "#,
            Self::table_ident(tenant)
        );

        let mut records = Vec::new();
        let mut after = String::new();
        loop {
            let rows = sqlx::query(&sql)
                .bind(&after)
                .bind(LIST_PAGE_SIZE)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_table_err(tenant, e))?;

            let page_len = rows.len();
            for row in rows {
                let entity_name: String = row
                    .try_get("entity_name")
                    .map_err(|e| NewswatchError::Store(e.to_string()))?;
                let completed: bool = row
                    .try_get("completed")
                    .map_err(|e| NewswatchError::Store(e.to_string()))?;
                let analysis = if include_analysis {
                    let raw: serde_json::Value = row
                        .try_get("analysis")
                        .map_err(|e| NewswatchError::Store(e.to_string()))?;
                    parse_analysis(raw)
                } else {
                    None
                };
                after = entity_name.clone();
                records.push(EntityRecord {
                    entity_name,
                    completed,
                    analysis,
                });
            }

            if (page_len as i64) < LIST_PAGE_SIZE {
                break;
            }
        }
        Ok(records)
    }

    async fn update_analysis(
        &self,
        tenant: &str,
        name: &str,
        cycle: Uuid,
        analysis: &EntityAnalysis,
        completed: bool,
    ) -> Result<(), NewswatchError> {
        let payload = serde_json::to_value(analysis)
            .map_err(|e| NewswatchError::Store(e.to_string()))?;

        let sql = format!(
            r#"
            UPDATE {}
            SET analysis = $1, completed = $2
            WHERE entity_name = $3 AND cycle = $4
            "#,
            Self::table_ident(tenant)
        );
        let done = sqlx::query(&sql)
            .bind(&payload)
            .bind(completed)
            .bind(name)
            .bind(cycle)
            .execute(&self.pool)
            .await
            .map_err(|e| map_table_err(tenant, e))?;

        if done.rows_affected() > 0 {
            return Ok(());
        }

        // No row matched: either the entity is unknown, or it exists under a
        // different cycle token and this writer is stale.
        let probe = format!(
            "SELECT 1 FROM {} WHERE entity_name = $1",
            Self::table_ident(tenant)
        );
        let exists = sqlx::query(&probe)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_table_err(tenant, e))?
            .is_some();

        if exists {
            Err(NewswatchError::StaleWrite {
                entity: name.to_string(),
            })
        } else {
            Err(NewswatchError::EntityNotFound {
                tenant: tenant.to_string(),
                entity: name.to_string(),
            })
        }
    }

    async fn clear_all(&self, tenant: &str, cycle: Uuid) -> Result<ClearOutcome, NewswatchError> {
        let sql = format!(
            "UPDATE {} SET analysis = '{{}}'::jsonb, completed = FALSE, cycle = $1",
            Self::table_ident(tenant)
        );
        let done = sqlx::query(&sql)
            .bind(cycle)
            .execute(&self.pool)
            .await
            .map_err(|e| map_table_err(tenant, e))?;

        Ok(ClearOutcome {
            cleared: done.rows_affected() as usize,
            failed: Vec::new(),
        })
    }

    async fn check_completion(&self, tenant: &str) -> Result<CompletionStatus, NewswatchError> {
        let sql = format!(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE completed) AS done
            FROM {}
            "#,
            Self::table_ident(tenant)
        );
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_table_err(tenant, e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| NewswatchError::Store(e.to_string()))?;
        let done: i64 = row
            .try_get("done")
            .map_err(|e| NewswatchError::Store(e.to_string()))?;

        Ok(match (total, done) {
            (0, _) => CompletionStatus::Empty,
            (t, d) if t == d => CompletionStatus::Complete { total: t as usize },
            (t, d) => CompletionStatus::Pending {
                completed: d as usize,
                total: t as usize,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// PgRecipientDirectory
// ---------------------------------------------------------------------------

/// Shared recipient table, one row per tenant. Unlike the tracking tables
/// this is created up front by `migrate` and setup is idempotent.
#[derive(Clone)]
pub struct PgRecipientDirectory {
    pool: PgPool,
}

impl PgRecipientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the shared recipient table if it does not exist. Idempotent.
    pub async fn migrate(&self) -> Result<(), NewswatchError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recipient_lists (
                parent_entity TEXT  PRIMARY KEY,
                email_list    JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| NewswatchError::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl RecipientDirectory for PgRecipientDirectory {
    async fn setup(&self, tenant: &str, emails: &[String]) -> Result<(), NewswatchError> {
        let payload = serde_json::to_value(emails)
            .map_err(|e| NewswatchError::Store(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO recipient_lists (parent_entity, email_list)
            VALUES ($1, $2)
            ON CONFLICT (parent_entity) DO UPDATE SET email_list = $2
            "#,
        )
        .bind(tenant)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(|e| NewswatchError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, tenant: &str, default: &str) -> Result<Vec<String>, NewswatchError> {
        let row = sqlx::query("SELECT email_list FROM recipient_lists WHERE parent_entity = $1")
            .bind(tenant)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| NewswatchError::Store(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: serde_json::Value = row
                    .try_get("email_list")
                    .map_err(|e| NewswatchError::Store(e.to_string()))?;
                let emails: Vec<String> = serde_json::from_value(raw)
                    .map_err(|e| NewswatchError::Store(e.to_string()))?;
                if emails.is_empty() {
                    Ok(vec![default.to_string()])
                } else {
                    Ok(emails)
                }
            }
            None => Ok(vec![default.to_string()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_names_are_sanitized_for_identifiers() {
        assert_eq!(sanitize_tenant("Acme Corp"), "acme_corp");
        assert_eq!(sanitize_tenant("stanford"), "stanford");
        assert_eq!(sanitize_tenant("3m"), "t3m");
        assert_eq!(sanitize_tenant("a.b-c"), "a_b_c");
    }

    #[test]
    fn empty_object_is_no_analysis() {
        assert!(parse_analysis(serde_json::json!({})).is_none());
        assert!(parse_analysis(serde_json::Value::Null).is_none());
    }

    #[test]
    fn garbage_payload_degrades_to_none() {
        assert!(parse_analysis(serde_json::json!({"articles": "nope"})).is_none());
    }
}
