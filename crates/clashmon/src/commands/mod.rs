//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod check;
pub mod config_cmd;
pub mod connections;
pub mod entities;
pub mod proxies;
pub mod system;
pub mod util;
pub mod watch;

use std::future::Future;

use clashmon_core::{Coordinator, CoordinatorConfig};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Entities(args) => entities::handle(config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Check => check::handle(config, global).await,
        Command::Select { group, option } => proxies::select(config, &group, &option, global).await,
        Command::Latency(args) => proxies::latency(config, args, global).await,
        Command::Connections(args) => connections::handle(config, args, global).await,
        Command::Rules(args) => system::rules(config, args, global).await,
        Command::Dns { name, record_type } => system::dns(config, name, record_type, global).await,
        Command::FlushFakeip => system::flush_fakeip(config, global).await,
        Command::Reboot => system::reboot(config, global).await,
        Command::Api(args) => system::api(config, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}

/// Run one refresh, hand the coordinator to `f`, then shut down.
///
/// Unlike [`Coordinator::oneshot`], `f` may fail with a CLI error.
pub async fn with_refreshed<F, Fut, T>(config: CoordinatorConfig, f: F) -> Result<T, CliError>
where
    F: FnOnce(Coordinator) -> Fut,
    Fut: Future<Output = Result<T, CliError>>,
{
    let coordinator = Coordinator::new(config);
    let result = match coordinator.refresh().await {
        Ok(_) => f(coordinator.clone()).await,
        Err(e) => Err(e.into()),
    };
    coordinator.shutdown().await;
    result
}

/// Run a service command on a fresh coordinator. No refresh is needed.
pub async fn execute(
    config: CoordinatorConfig,
    cmd: clashmon_core::Command,
) -> Result<clashmon_core::CommandResult, CliError> {
    let coordinator = Coordinator::new(config);
    let result = coordinator.execute(cmd).await;
    coordinator.shutdown().await;
    Ok(result?)
}
