//! Continuous polling: print every published snapshot until interrupted.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use clashmon_core::{Coordinator, CoordinatorConfig, CoordinatorState, EntitySnapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::entities::{EntityView, display_state};

#[derive(Serialize)]
struct SnapshotView<'a> {
    generation: u64,
    published_at: Option<String>,
    state: CoordinatorState,
    entities: Vec<EntityView<'a>>,
}

fn render(snapshot: &EntitySnapshot, state: CoordinatorState, global: &GlobalOpts) -> String {
    let published_at = snapshot.published_at().map(|t| t.to_rfc3339());
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let color = output::should_color(&global.color);
            let label: &'static str = state.into();
            let mut lines = vec![format!(
                "── generation {} ({}) at {} ──",
                snapshot.generation(),
                output::paint_state(label, color),
                published_at.as_deref().unwrap_or("-"),
            )];
            lines.extend(
                snapshot
                    .entities()
                    .iter()
                    .map(|e| format!("{:<32} {}", e.name, display_state(e))),
            );
            lines.join("\n")
        }
        // One document per snapshot so the stream stays line-oriented
        _ => {
            let view = SnapshotView {
                generation: snapshot.generation(),
                published_at,
                state,
                entities: snapshot.entities().iter().map(|e| EntityView::new(e)).collect(),
            };
            output::render_single(&OutputFormat::JsonCompact, &view, |_| String::new(), |_| String::new())
        }
    }
}

pub async fn handle(mut config: CoordinatorConfig, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(secs) = args.interval {
        config.poll_interval = Duration::from_secs(secs);
    }

    let coordinator = Coordinator::new(config);
    let first = match coordinator.start().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            coordinator.shutdown().await;
            return Err(e.into());
        }
    };

    if !global.quiet {
        eprintln!(
            "Polling every {} (Ctrl-C to stop)",
            humantime::format_duration(coordinator.config().poll_interval)
        );
    }

    let result = watch_loop(&coordinator, first, args.count, global).await;
    coordinator.shutdown().await;
    result
}

async fn watch_loop(
    coordinator: &Coordinator,
    first: Arc<EntitySnapshot>,
    limit: Option<usize>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut stream = coordinator.subscribe();
    let mut states = coordinator.subscribe_state();
    let mut printed = 0usize;

    output::print_output(&render(&first, coordinator.state(), global), global.quiet);
    printed += 1;

    loop {
        if limit.is_some_and(|n| printed >= n) {
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => return Ok(()),
            changed = stream.changed() => {
                let Some(snapshot) = changed else {
                    return Ok(());
                };
                output::print_output(&render(&snapshot, coordinator.state(), global), global.quiet);
                printed += 1;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = *states.borrow_and_update();
                match state {
                    CoordinatorState::Degraded => {
                        let reason = coordinator.last_error().unwrap_or_default();
                        tracing::warn!(%reason, "refresh failed, serving last known data");
                        if !global.quiet {
                            eprintln!("degraded: {reason}");
                        }
                    }
                    CoordinatorState::Stopped => return Ok(()),
                    CoordinatorState::Ready | CoordinatorState::Uninitialized => {}
                }
            }
        }
    }
}
