//! Core maintenance and query commands.

use tabled::Tabled;

use clashmon_api::Rule;
use clashmon_core::{
    ApiCallRequest, Command as CoreCommand, CommandResult, CoordinatorConfig, DnsQueryRequest, QueryRulesRequest,
};

use crate::cli::{ApiArgs, GlobalOpts, OutputFormat, RulesArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "Type")]
    rule_type: String,
    #[tabled(rename = "Payload")]
    payload: String,
    #[tabled(rename = "Proxy")]
    proxy: String,
}

fn rule_row(r: &Rule) -> RuleRow {
    RuleRow {
        rule_type: r.rule_type.clone(),
        payload: util::or_dash(&r.payload),
        proxy: r.proxy.clone(),
    }
}

pub async fn rules(config: CoordinatorConfig, args: RulesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let request = QueryRulesRequest {
        rule_type: args.rule_type,
        payload: args.payload,
        proxy: args.proxy,
    };
    let CommandResult::Rules(report) = super::execute(config, CoreCommand::QueryRules(request)).await? else {
        return Ok(());
    };

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            output::render_list(&global.output, &report.rules, rule_row, |r| {
                format!("{},{},{}", r.rule_type, r.payload, r.proxy)
            })
        }
        ref other => output::render_single(other, &report, |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── DNS ──────────────────────────────────────────────────────────────

pub async fn dns(config: CoordinatorConfig, name: String, record_type: String, global: &GlobalOpts) -> Result<(), CliError> {
    let request = DnsQueryRequest {
        name,
        record_type: Some(record_type),
    };
    let result = super::execute(config, CoreCommand::DnsQuery(request)).await?;
    let CommandResult::Dns(answer) = result else {
        return Ok(());
    };

    let out = match global.output {
        OutputFormat::Plain => dns_answers(&answer).join("\n"),
        OutputFormat::Table => output::render_json_pretty(&answer),
        ref other => output::render_single(other, &answer, |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

/// The `data` field of every record in `Answer`.
fn dns_answers(answer: &serde_json::Value) -> Vec<String> {
    answer
        .get("Answer")
        .and_then(serde_json::Value::as_array)
        .map(|records| {
            records
                .iter()
                .filter_map(|r| r.get("data").and_then(serde_json::Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

// ── Fake-IP / reboot ─────────────────────────────────────────────────

pub async fn flush_fakeip(config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    super::execute(config, CoreCommand::FlushFakeIpCache).await?;
    if !global.quiet {
        eprintln!("Fake-IP cache flushed");
    }
    Ok(())
}

pub async fn reboot(config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if !util::confirm("Restart the Clash core?", "reboot", global.yes)? {
        return Ok(());
    }
    super::execute(config, CoreCommand::RebootCore).await?;
    if !global.quiet {
        eprintln!("Core restart initiated");
    }
    Ok(())
}

// ── Raw API ──────────────────────────────────────────────────────────

pub async fn api(config: CoordinatorConfig, args: ApiArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Reject malformed JSON here; the core treats it as an empty object
    for (field, raw) in [("params", &args.params), ("data", &args.data)] {
        if let Some(raw) = raw {
            serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw).map_err(|e| {
                CliError::Validation {
                    field: field.into(),
                    reason: format!("expected a JSON object: {e}"),
                }
            })?;
        }
    }

    let request = ApiCallRequest {
        method: args.method,
        endpoint: args.endpoint,
        params: args.params,
        data: args.data,
        read_line: args.read_line,
    };
    let CommandResult::ApiCall(report) = super::execute(config, CoreCommand::ApiCall(request)).await? else {
        return Ok(());
    };

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => output::render_json_pretty(&report.response),
        ref other => output::render_single(other, &report.response, |_| String::new(), |_| String::new()),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
