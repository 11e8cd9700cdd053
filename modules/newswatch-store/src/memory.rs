//! In-memory store implementations.
//!
//! Same contract as the Postgres impls, backed by a mutex-held map. Used by
//! the engine's hermetic tests and usable for local dry runs. Supports
//! injected update failures so worker retry paths can be exercised.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use newswatch_common::{CompletionStatus, EntityAnalysis, EntityRecord, NewswatchError};

use crate::traits::{
    AddOutcome, ClearOutcome, DeleteOutcome, EntityStore, RecipientDirectory,
};

#[derive(Debug, Clone)]
struct StoredRecord {
    analysis: Option<EntityAnalysis>,
    completed: bool,
    cycle: Uuid,
}

/// Tenant table: name → record, ordered by name like the Postgres listing.
type Table = BTreeMap<String, StoredRecord>;

#[derive(Default)]
pub struct MemoryEntityStore {
    tables: Mutex<HashMap<String, Table>>,
    /// Remaining number of `update_analysis` calls to fail artificially.
    fail_updates: Mutex<u32>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls to `update_analysis` fail with a store error.
    pub fn fail_next_updates(&self, n: u32) {
        *self.fail_updates.lock().unwrap() = n;
    }

    /// The cycle token currently stamped on an entity, for test assertions.
    pub fn cycle_of(&self, tenant: &str, name: &str) -> Option<Uuid> {
        self.tables
            .lock()
            .unwrap()
            .get(tenant)
            .and_then(|t| t.get(name))
            .map(|r| r.cycle)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn create_table(&self, tenant: &str) -> Result<(), NewswatchError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.contains_key(tenant) {
            return Err(NewswatchError::TableExists(tenant.to_string()));
        }
        tables.insert(tenant.to_string(), Table::new());
        Ok(())
    }

    async fn table_exists(&self, tenant: &str) -> Result<bool, NewswatchError> {
        Ok(self.tables.lock().unwrap().contains_key(tenant))
    }

    async fn add_entities(
        &self,
        tenant: &str,
        names: &[String],
    ) -> Result<AddOutcome, NewswatchError> {
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(tenant)
            .ok_or_else(|| NewswatchError::TableNotFound(tenant.to_string()))?;

        let mut outcome = AddOutcome::default();
        for name in names {
            table.insert(
                name.clone(),
                StoredRecord {
                    analysis: None,
                    completed: false,
                    cycle: Uuid::nil(),
                },
            );
            outcome.added.push(name.clone());
        }
        Ok(outcome)
    }

    async fn delete_entities(
        &self,
        tenant: &str,
        names: &[String],
    ) -> Result<DeleteOutcome, NewswatchError> {
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(tenant)
            .ok_or_else(|| NewswatchError::TableNotFound(tenant.to_string()))?;

        let mut outcome = DeleteOutcome::default();
        for name in names {
            if table.remove(name).is_some() {
                outcome.deleted.push(name.clone());
            } else {
                outcome.not_found.push(name.clone());
            }
        }
        Ok(outcome)
    }

    async fn list_entities(
        &self,
        tenant: &str,
        include_analysis: bool,
    ) -> Result<Vec<EntityRecord>, NewswatchError> {
        let tables = self.tables.lock().unwrap();
        let table = tables
            .get(tenant)
            .ok_or_else(|| NewswatchError::TableNotFound(tenant.to_string()))?;

        Ok(table
            .iter()
            .map(|(name, record)| EntityRecord {
                entity_name: name.clone(),
                completed: record.completed,
                analysis: if include_analysis {
                    record.analysis.clone()
                } else {
                    None
                },
            })
            .collect())
    }

    async fn update_analysis(
        &self,
        tenant: &str,
        name: &str,
        cycle: Uuid,
        analysis: &EntityAnalysis,
        completed: bool,
    ) -> Result<(), NewswatchError> {
        {
            let mut remaining = self.fail_updates.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NewswatchError::Store("injected update failure".into()));
            }
        }

        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(tenant)
            .ok_or_else(|| NewswatchError::TableNotFound(tenant.to_string()))?;
        let record = table
            .get_mut(name)
            .ok_or_else(|| NewswatchError::EntityNotFound {
                tenant: tenant.to_string(),
                entity: name.to_string(),
            })?;

        if record.cycle != cycle {
            return Err(NewswatchError::StaleWrite {
                entity: name.to_string(),
            });
        }

        record.analysis = Some(analysis.clone());
        record.completed = completed;
        Ok(())
    }

    async fn clear_all(&self, tenant: &str, cycle: Uuid) -> Result<ClearOutcome, NewswatchError> {
        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .get_mut(tenant)
            .ok_or_else(|| NewswatchError::TableNotFound(tenant.to_string()))?;

        for record in table.values_mut() {
            record.analysis = None;
            record.completed = false;
            record.cycle = cycle;
        }
        Ok(ClearOutcome {
            cleared: table.len(),
            failed: Vec::new(),
        })
    }

    async fn check_completion(&self, tenant: &str) -> Result<CompletionStatus, NewswatchError> {
        let tables = self.tables.lock().unwrap();
        let table = tables
            .get(tenant)
            .ok_or_else(|| NewswatchError::TableNotFound(tenant.to_string()))?;

        let total = table.len();
        let completed = table.values().filter(|r| r.completed).count();
        Ok(match (total, completed) {
            (0, _) => CompletionStatus::Empty,
            (t, c) if t == c => CompletionStatus::Complete { total: t },
            (t, c) => CompletionStatus::Pending {
                completed: c,
                total: t,
            },
        })
    }
}

#[derive(Default)]
pub struct MemoryRecipientDirectory {
    lists: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipientDirectory for MemoryRecipientDirectory {
    async fn setup(&self, tenant: &str, emails: &[String]) -> Result<(), NewswatchError> {
        self.lists
            .lock()
            .unwrap()
            .insert(tenant.to_string(), emails.to_vec());
        Ok(())
    }

    async fn get(&self, tenant: &str, default: &str) -> Result<Vec<String>, NewswatchError> {
        let lists = self.lists.lock().unwrap();
        match lists.get(tenant) {
            Some(emails) if !emails.is_empty() => Ok(emails.clone()),
            _ => Ok(vec![default.to_string()]),
        }
    }
}
