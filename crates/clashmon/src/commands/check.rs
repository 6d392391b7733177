//! Endpoint validation, as run before a profile is saved.

use serde::Serialize;

use clashmon_core::{Coordinator, CoordinatorConfig, CoreError, DeviceIdentity};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct CheckReport {
    endpoint: String,
    #[serde(flatten)]
    device: DeviceIdentity,
}

fn detail(report: &CheckReport) -> String {
    [
        format!("Endpoint:  {}", report.endpoint),
        format!("Device ID: {}", report.device.id),
        format!("Model:     {}", report.device.model),
        format!("Version:   {}", report.device.sw_version),
    ]
    .join("\n")
}

/// Probe `GET version` once. Failures carry the setup error key
/// (`invalid_token`, `timed_out` or `cannot_connect`).
pub async fn handle(config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let endpoint = config.endpoint_url.to_string();
    let coordinator = Coordinator::new(config);
    let result = coordinator.client().check_connection().await;
    let device = result.map(|version| DeviceIdentity::new(coordinator.client().device_id(), &version));
    coordinator.shutdown().await;

    let device = device.map_err(|e| {
        let err = CoreError::from(e);
        CliError::NotReady {
            key: err.setup_error_key(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    })?;

    let report = CheckReport { endpoint, device };
    let out = output::render_single(&global.output, &report, detail, |r| r.device.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
