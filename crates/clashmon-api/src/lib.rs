//! Async client for the Clash / mihomo external controller.
//!
//! [`ClashClient`] wraps one controller: bearer auth, retry with backoff,
//! streaming NDJSON endpoints and a lazily opened HTTP session. The
//! [`snapshot`] module aggregates one polling cycle's reads and the
//! [`probe`] module checks streaming-service reachability.

pub mod error;
pub mod models;
pub mod probe;
pub mod retry;
pub mod snapshot;
pub mod transport;

mod client;
mod ndjson;
mod request;

pub use client::{ClashClient, device_id_for, empty_object};
pub use error::{Error, ErrorKind};
pub use models::{Connection, ConnectionMetadata, ConnectionsResponse, Rule, RulesResponse, VersionInfo};
pub use probe::{ProbeResult, STREAMING_SERVICES, StreamingService, UNKNOWN_STATUS, find_service};
pub use request::ApiRequest;
pub use retry::RetryPolicy;
pub use snapshot::{Endpoint, Snapshot, is_empty_section};
pub use transport::{TlsMode, TransportConfig};

pub use reqwest::Method;
