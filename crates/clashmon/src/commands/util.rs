//! Shared helpers for command handlers.

use std::sync::Arc;

use clashmon_core::{Coordinator, EntityDescriptor};

use crate::error::CliError;

/// Resolve an entity by unique id first, then by display name.
pub fn resolve_entity(coordinator: &Coordinator, identifier: &str) -> Result<Arc<EntityDescriptor>, CliError> {
    coordinator
        .get_by_unique_id(identifier)
        .or_else(|| coordinator.get_by_name(identifier))
        .ok_or_else(|| CliError::NotFound {
            resource_type: "entity".into(),
            identifier: identifier.into(),
            list_command: "entities list".into(),
        })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to prompt on, the operation is refused.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Empty cells render as a dash in tables.
pub fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".into()
    } else {
        value.to_owned()
    }
}
