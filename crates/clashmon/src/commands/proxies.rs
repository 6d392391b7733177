//! Proxy group selection and delay tests.

use serde::Serialize;
use tabled::Tabled;

use clashmon_core::{
    Command as CoreCommand, CommandResult, CoordinatorConfig, EntityType, LatencyReport, TestLatencyRequest,
};

use crate::cli::{GlobalOpts, LatencyArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Select ───────────────────────────────────────────────────────────

/// Switch `group` to `option` through its selector entity, so the option
/// is validated against the members seen in the latest refresh.
pub async fn select(config: CoordinatorConfig, group: &str, option: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let (group, option) = (group.to_owned(), option.to_owned());
    let selected = super::with_refreshed(config, |coord| async move {
        let entity = util::resolve_entity(&coord, &group)?;
        if entity.entity_type != EntityType::ProxyGroupSelector {
            return Err(CliError::Validation {
                field: "group".into(),
                reason: format!("'{group}' is not a selectable proxy group"),
            });
        }
        let snapshot = coord.select_option(&entity.unique_id, &option).await?;
        Ok(snapshot
            .get_by_unique_id(&entity.unique_id)
            .map(|e| e.state_text())
            .unwrap_or(option))
    })
    .await?;

    if !global.quiet {
        eprintln!("Selected {selected}");
    }
    Ok(())
}

// ── Latency ──────────────────────────────────────────────────────────

#[derive(Clone, Tabled, Serialize)]
struct LatencyRow {
    #[tabled(rename = "Proxy")]
    name: String,
    #[tabled(rename = "Delay (ms)")]
    delay: i64,
}

pub async fn latency(config: CoordinatorConfig, args: LatencyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let request = TestLatencyRequest {
        group: args.group,
        node: args.node,
        url: args.url,
        timeout_ms: args.timeout_ms,
    };
    let CommandResult::Latency(report) = super::execute(config, CoreCommand::TestLatency(request)).await? else {
        return Ok(());
    };

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let rows = latency_rows(&report);
            let table = output::render_list(&global.output, &rows, LatencyRow::clone, |r| r.name.clone());
            match report {
                LatencyReport::Group {
                    fastest_node: Some(fastest),
                    ..
                } if matches!(global.output, OutputFormat::Table) => format!("{table}\nFastest: {fastest}"),
                _ => table,
            }
        }
        ref other => output::render_single(other, &report, |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

fn latency_rows(report: &LatencyReport) -> Vec<LatencyRow> {
    match report {
        LatencyReport::Group { latency, .. } => latency
            .iter()
            .map(|(name, delay)| LatencyRow {
                name: name.clone(),
                delay: *delay,
            })
            .collect(),
        LatencyReport::Node { latency } => latency
            .iter()
            .map(|(name, delay)| LatencyRow {
                name: name.clone(),
                delay: delay.as_i64().unwrap_or(-1),
            })
            .collect(),
    }
}
