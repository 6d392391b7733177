//! Entity command handlers.

use serde::Serialize;
use tabled::Tabled;

use clashmon_core::{Coordinator, EntityDescriptor, EntityState, EntityType, Presentation};

use crate::cli::{EntitiesArgs, EntitiesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    entity_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
}

/// Serialized form: the descriptor plus its presentation binding.
#[derive(Serialize)]
pub(crate) struct EntityView<'a> {
    #[serde(flatten)]
    entity: &'a EntityDescriptor,
    presentation: Presentation,
}

impl<'a> EntityView<'a> {
    pub(crate) fn new(entity: &'a EntityDescriptor) -> Self {
        Self {
            entity,
            presentation: entity.entity_type.presentation(),
        }
    }
}

fn row(view: &EntityView<'_>, color: bool) -> EntityRow {
    let e = view.entity;
    EntityRow {
        name: e.name.clone(),
        entity_type: e.entity_type.to_string(),
        state: output::paint_state(&util::or_dash(&display_state(e)), color),
        unique_id: e.unique_id.clone(),
    }
}

/// State converted to the suggested display unit, e.g. `1.25 GB`.
pub(crate) fn display_state(entity: &EntityDescriptor) -> String {
    let p = entity.entity_type.presentation();
    let (Some(native), Some(suggested)) = (p.native_unit, p.suggested_unit) else {
        return entity.state_text();
    };
    let Some(value) = entity.state.as_ref().and_then(EntityState::as_f64) else {
        return entity.state_text();
    };

    let scaled = value / unit_divisor(native, suggested);
    let precision = usize::from(p.display_precision.unwrap_or(0));
    format!("{scaled:.precision$} {suggested}")
}

fn unit_divisor(native: &str, suggested: &str) -> f64 {
    match (native, suggested) {
        ("bit/s", "kB/s") => 8_000.0,
        ("B", "MB") => 1_000_000.0,
        ("B", "GB") => 1_000_000_000.0,
        _ => 1.0,
    }
}

fn detail(view: &EntityView<'_>) -> String {
    let e = view.entity;
    let p = &view.presentation;
    let mut lines = vec![
        format!("Name:      {}", e.name),
        format!("Unique ID: {}", e.unique_id),
        format!("Type:      {}", e.entity_type),
        format!("Platform:  {}", p.platform),
        format!("State:     {}", util::or_dash(&display_state(e))),
    ];
    if let Some(ref icon) = e.icon {
        lines.push(format!("Icon:      {icon}"));
    }
    if let Some(ref options) = e.options {
        lines.push(format!("Options:   {}", options.join(", ")));
    }
    if let Some(ref action) = e.action {
        lines.push(format!("Action:    {} {}", action.method, action.path));
    }
    for (key, value) in &e.attributes {
        lines.push(format!("  {key}: {value}"));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    config: clashmon_core::CoordinatorConfig,
    args: EntitiesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EntitiesCommand::List { entity_type } => {
            let filter = entity_type
                .map(|t| {
                    t.parse::<EntityType>().map_err(|_| CliError::Validation {
                        field: "type".into(),
                        reason: format!("unknown entity type '{t}'"),
                    })
                })
                .transpose()?;

            let snapshot = Coordinator::oneshot(config, |coord| async move { Ok(coord.entities()) }).await?;
            let views: Vec<EntityView<'_>> = snapshot
                .entities()
                .iter()
                .filter(|e| filter.is_none_or(|t| e.entity_type == t))
                .map(|e| EntityView::new(e))
                .collect();

            let color = output::should_color(&global.color);
            let out = output::render_list(&global.output, &views, |v| row(v, color), |v| v.entity.name.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EntitiesCommand::Get { entity } => {
            let found = super::with_refreshed(config, |coord| async move { util::resolve_entity(&coord, &entity) }).await?;
            let view = EntityView::new(&found);
            let out = output::render_single(&global.output, &view, detail, |v| v.entity.state_text());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EntitiesCommand::Press { entity } => {
            let name = super::with_refreshed(config, |coord| async move {
                let found = util::resolve_entity(&coord, &entity)?;
                coord.press(&found.unique_id).await?;
                Ok(found.name.clone())
            })
            .await?;
            if !global.quiet {
                eprintln!("Pressed {name}");
            }
            Ok(())
        }
    }
}
