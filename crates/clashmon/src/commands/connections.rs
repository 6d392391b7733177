//! Connection listing and closing.

use tabled::Tabled;

use clashmon_api::Connection;
use serde_json::Value;
use clashmon_core::{
    Command as CoreCommand, CommandResult, ConnectionReport, CoordinatorConfig, FilterConnectionsRequest,
};

use crate::cli::{ConnectionFilterArgs, ConnectionsArgs, ConnectionsCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ConnectionRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Chain")]
    chain: String,
}

fn connection_row(c: &Connection) -> ConnectionRow {
    let chain = c
        .extra
        .get("chains")
        .and_then(Value::as_array)
        .map(|chains| {
            chains
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" < ")
        })
        .unwrap_or_default();
    ConnectionRow {
        id: c.id.clone(),
        host: util::or_dash(&c.metadata.host),
        source: util::or_dash(&c.metadata.source_ip),
        destination: util::or_dash(&c.metadata.destination_ip),
        chain: util::or_dash(&chain),
    }
}

fn request(filter: ConnectionFilterArgs, close: bool) -> FilterConnectionsRequest {
    FilterConnectionsRequest {
        host: filter.host,
        source: filter.source,
        destination: filter.destination,
        close,
    }
}

fn is_unfiltered(filter: &ConnectionFilterArgs) -> bool {
    filter.host.is_none() && filter.source.is_none() && filter.destination.is_none()
}

fn render(report: &ConnectionReport, global: &GlobalOpts) -> String {
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => output::render_list(
            &global.output,
            &report.connections,
            connection_row,
            |c| c.id.clone(),
        ),
        ref other => output::render_single(other, report, |_| String::new(), |_| String::new()),
    }
}

pub async fn handle(config: CoordinatorConfig, args: ConnectionsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (filter, close) = match args.command {
        ConnectionsCommand::List(filter) => (filter, false),
        ConnectionsCommand::Close(filter) => {
            let prompt = if is_unfiltered(&filter) {
                "Close ALL open connections?"
            } else {
                "Close every matching connection?"
            };
            if !util::confirm(prompt, "connections close", global.yes)? {
                return Ok(());
            }
            (filter, true)
        }
    };

    let result = super::execute(config, CoreCommand::FilterConnections(request(filter, close))).await?;
    let CommandResult::Connections(report) = result else {
        return Ok(());
    };

    output::print_output(&render(&report, global), global.quiet);

    if close && !global.quiet {
        eprintln!(
            "Closed {} connection(s)",
            report.connection_number.saturating_sub(report.close_failures.len())
        );
    }
    for failure in &report.close_failures {
        tracing::warn!(id = %failure.id, error = %failure.error, "failed to close connection");
    }
    Ok(())
}
