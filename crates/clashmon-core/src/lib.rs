//! Entity projection and polling layer between `clashmon-api` and the CLI.
//!
//! - **[`Coordinator`]**: owns one controller's lifecycle.
//!   [`start()`](Coordinator::start) runs the first refresh and spawns the
//!   periodic poll task; [`Coordinator::oneshot()`] refreshes once for a
//!   single CLI invocation.
//!
//! - **[`project`]**: pure mapping from a fetched
//!   [`Snapshot`](clashmon_api::Snapshot) to an ordered list of
//!   [`EntityDescriptor`]s.
//!
//! - **[`EntityStore`]**: last-known-good snapshot behind a `watch` channel,
//!   with [`EntityStream`] subscriptions for consumers that re-render on
//!   change.
//!
//! - **[`Command`]**: typed service operations (connection filtering,
//!   latency tests, DNS queries, rule queries, raw API calls) executed with
//!   strict error propagation.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod projector;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::requests::*;
pub use command::{Command, CommandResult, ConnectionFilter, RuleFilter, TermFilter};
pub use config::{CoordinatorConfig, normalize_endpoint_url};
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::CoreError;
pub use projector::project;
pub use store::{EntitySnapshot, EntityStore};
pub use stream::{EntityStream, EntityWatchStream};

pub use model::{
    ActionMethod, DeviceClass, DeviceIdentity, EntityAction, EntityDescriptor, EntityState,
    EntityType, Platform, Presentation, StateClass,
};
