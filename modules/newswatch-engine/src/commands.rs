//! Inbound command channel: plain-text entity management commands, one per
//! line, as received from the control mailbox.

use std::sync::Arc;

use newswatch_common::NewswatchError;
use newswatch_store::EntityStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Delete(String),
    List,
}

/// Parse one command per line. The verb is case-insensitive; unparseable
/// lines are returned separately so the reply can mention them.
pub fn parse_commands(text: &str) -> (Vec<Command>, Vec<String>) {
    let mut commands = Vec::new();
    let mut rejected = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };
        match verb.to_ascii_uppercase().as_str() {
            "ADD" if !rest.is_empty() => commands.push(Command::Add(rest.to_string())),
            "DELETE" if !rest.is_empty() => commands.push(Command::Delete(rest.to_string())),
            "LIST" if rest.is_empty() => commands.push(Command::List),
            _ => rejected.push(line.to_string()),
        }
    }
    (commands, rejected)
}

/// Apply commands against the tenant's store and produce a reply text.
/// Creates the tracking table lazily, like the dispatcher.
pub async fn apply_commands(
    store: &Arc<dyn EntityStore>,
    tenant: &str,
    commands: &[Command],
) -> Result<String, NewswatchError> {
    if !store.table_exists(tenant).await? {
        store.create_table(tenant).await?;
    }

    let mut reply = Vec::new();
    for command in commands {
        match command {
            Command::Add(name) => {
                let outcome = store.add_entities(tenant, &[name.clone()]).await?;
                if outcome.failed.is_empty() {
                    reply.push(format!("Added: {name}"));
                } else {
                    reply.push(format!("Failed to add: {name}"));
                }
            }
            Command::Delete(name) => {
                let outcome = store.delete_entities(tenant, &[name.clone()]).await?;
                if outcome.deleted.is_empty() {
                    reply.push(format!("Not tracked: {name}"));
                } else {
                    reply.push(format!("Deleted: {name}"));
                }
            }
            Command::List => {
                let names: Vec<String> = store
                    .list_entities(tenant, false)
                    .await?
                    .into_iter()
                    .map(|r| r.entity_name)
                    .collect();
                if names.is_empty() {
                    reply.push("No tracked entities.".to_string());
                } else {
                    reply.push(format!("Tracked entities: {}", names.join(", ")));
                }
            }
        }
    }
    Ok(reply.join("\n"))
}
