// Trait boundaries for the durable tracking store.
//
// EntityStore — one row per tracked entity, per tenant. The only
//   synchronization point between the dispatcher, the worker fleet, and the
//   completion monitor.
// RecipientDirectory — one row per tenant mapping to its report recipients.
//
// Both have a Postgres implementation for production and an in-memory one
// for hermetic tests.

use async_trait::async_trait;
use uuid::Uuid;

use newswatch_common::{CompletionStatus, EntityAnalysis, EntityRecord, NewswatchError};

/// Per-name outcome of a bulk add. A failure for one name never aborts the
/// others; each failure carries its cause.
#[derive(Debug, Default)]
pub struct AddOutcome {
    pub added: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Per-name outcome of a bulk delete. Deleting a missing name is not an
/// error, just reported.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub not_found: Vec<String>,
}

/// Outcome of resetting a tenant's records for a new cycle.
#[derive(Debug, Default)]
pub struct ClearOutcome {
    pub cleared: usize,
    pub failed: Vec<(String, String)>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Create the tenant's tracking table. Fails with `TableExists` if one
    /// is already present — double-setup must not silently clobber state.
    async fn create_table(&self, tenant: &str) -> Result<(), NewswatchError>;

    /// Whether the tenant's tracking table exists.
    async fn table_exists(&self, tenant: &str) -> Result<bool, NewswatchError>;

    /// Upsert entities with empty analysis and `completed = false`.
    async fn add_entities(&self, tenant: &str, names: &[String])
        -> Result<AddOutcome, NewswatchError>;

    /// Remove entities by name.
    async fn delete_entities(
        &self,
        tenant: &str,
        names: &[String],
    ) -> Result<DeleteOutcome, NewswatchError>;

    /// All records ordered by entity name. Pages through the full result set;
    /// no partial pages are silently dropped. `include_analysis` controls
    /// whether the analysis payload is deserialized and returned.
    async fn list_entities(
        &self,
        tenant: &str,
        include_analysis: bool,
    ) -> Result<Vec<EntityRecord>, NewswatchError>;

    /// Overwrite one record's analysis and completion flag. Fails with
    /// `EntityNotFound` for an unknown name and with `StaleWrite` when
    /// `cycle` no longer matches the record (the writer belongs to an
    /// abandoned cycle).
    async fn update_analysis(
        &self,
        tenant: &str,
        name: &str,
        cycle: Uuid,
        analysis: &EntityAnalysis,
        completed: bool,
    ) -> Result<(), NewswatchError>;

    /// Reset every record to empty/incomplete and stamp the new cycle token.
    /// Must only run between cycles, never concurrently with active workers.
    async fn clear_all(&self, tenant: &str, cycle: Uuid) -> Result<ClearOutcome, NewswatchError>;

    /// Completion state across the whole fleet. Zero entities is the
    /// distinct `Empty` outcome, never `Complete`.
    async fn check_completion(&self, tenant: &str) -> Result<CompletionStatus, NewswatchError>;
}

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Create or replace the tenant's recipient list. Idempotent, unlike
    /// `EntityStore::create_table`.
    async fn setup(&self, tenant: &str, emails: &[String]) -> Result<(), NewswatchError>;

    /// The tenant's recipients, or `[default]` when none are configured.
    /// Never errors for a missing tenant.
    async fn get(&self, tenant: &str, default: &str) -> Result<Vec<String>, NewswatchError>;
}
