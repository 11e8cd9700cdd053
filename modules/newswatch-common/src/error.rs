use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewswatchError {
    /// Control-flow signal, not a genuine fault: the dispatcher reacts to it
    /// by lazily creating the tenant's table.
    #[error("tracking table for tenant '{0}' not found")]
    TableNotFound(String),

    /// Creating a table that already exists fails loudly so a double-setup
    /// cannot clobber tracked state.
    #[error("tracking table for tenant '{0}' already exists")]
    TableExists(String),

    #[error("entity '{entity}' not tracked for tenant '{tenant}'")]
    EntityNotFound { tenant: String, entity: String },

    /// Write carried a cycle token that no longer matches the record: the
    /// worker belongs to an abandoned cycle and its result must be dropped.
    #[error("stale write for entity '{entity}': cycle has moved on")]
    StaleWrite { entity: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("no recipients configured for tenant '{0}'")]
    NoRecipients(String),

    #[error("report delivery failed for all {0} recipients")]
    AllRecipientsFailed(usize),

    #[error("completion wait timed out: {completed}/{total} entities completed")]
    CompletionTimeout { completed: usize, total: usize },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
