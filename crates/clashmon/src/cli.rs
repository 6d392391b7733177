//! Clap derive structures for the `clashmon` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// clashmon -- monitor and control a Clash controller
#[derive(Debug, Parser)]
#[command(
    name = "clashmon",
    version,
    about = "Monitor and control Clash proxy cores from the command line",
    long_about = "Polls a Clash (or Clash.Meta / mihomo) external controller, projects\n\
        its state into a flat list of entities, and exposes the controller's\n\
        maintenance operations as subcommands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "CLASHMON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller address (overrides profile), e.g. 192.168.1.1:9090
    #[arg(long, short = 'e', env = "CLASHMON_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Controller secret (bearer token)
    #[arg(long, env = "CLASHMON_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Use HTTPS when the endpoint comes from --endpoint
    #[arg(long, global = true)]
    pub tls: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CLASHMON_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "CLASHMON_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "CLASHMON_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Probe streaming services during refresh
    #[arg(long, global = true)]
    pub streaming: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and act on projected entities
    #[command(alias = "ent", alias = "e")]
    Entities(EntitiesArgs),

    /// Poll continuously and print each published snapshot
    Watch(WatchArgs),

    /// Verify the endpoint is a reachable Clash controller
    Check,

    /// Switch a selector proxy group
    Select {
        /// Proxy group name
        group: String,

        /// Member to select
        option: String,
    },

    /// Measure proxy delay for a group or a single node
    Latency(LatencyArgs),

    /// List or close open connections
    #[command(alias = "conn")]
    Connections(ConnectionsArgs),

    /// Query the routing rules
    Rules(RulesArgs),

    /// Resolve a name through the core's DNS
    Dns {
        /// Domain name to resolve
        name: String,

        /// Record type
        #[arg(long = "type", short = 't', default_value = "A")]
        record_type: String,
    },

    /// Flush the fake-ip cache
    FlushFakeip,

    /// Restart the Clash core
    Reboot,

    /// Send a raw request to the controller
    Api(ApiArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Entities ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    #[command(subcommand)]
    pub command: EntitiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntitiesCommand {
    /// List every entity from one refresh
    #[command(alias = "ls")]
    List {
        /// Only entities of this type (e.g. proxy_group_selector)
        #[arg(long = "type", short = 't')]
        entity_type: Option<String>,
    },

    /// Show one entity by name or unique id
    Get {
        /// Entity name or unique id
        entity: String,
    },

    /// Press a button entity
    Press {
        /// Entity name or unique id
        entity: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (minimum 10)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Exit after this many published snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Latency ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["group", "node"])))]
pub struct LatencyArgs {
    /// Test every member of this group
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Test a single proxy node
    #[arg(long, short = 'n')]
    pub node: Option<String>,

    /// URL used for the delay test
    #[arg(long)]
    pub url: Option<String>,

    /// Per-test timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u32>,
}

// ── Connections ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConnectionsArgs {
    #[command(subcommand)]
    pub command: ConnectionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConnectionsCommand {
    /// List open connections, optionally filtered
    #[command(alias = "ls")]
    List(ConnectionFilterArgs),

    /// Close matching connections (all of them when no filter is given)
    Close(ConnectionFilterArgs),
}

/// Comma-separated, case-insensitive substring filters.
#[derive(Debug, Args)]
pub struct ConnectionFilterArgs {
    /// Host filter, e.g. "google,youtube"
    #[arg(long)]
    pub host: Option<String>,

    /// Source IP filter
    #[arg(long)]
    pub source: Option<String>,

    /// Destination IP filter
    #[arg(long)]
    pub destination: Option<String>,
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Rule type filter
    #[arg(long = "type", short = 't')]
    pub rule_type: Option<String>,

    /// Payload filter
    #[arg(long)]
    pub payload: Option<String>,

    /// Target proxy filter
    #[arg(long)]
    pub proxy: Option<String>,
}

// ── Raw API ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApiArgs {
    /// HTTP method
    pub method: String,

    /// Endpoint path relative to the controller, e.g. "configs"
    pub endpoint: String,

    /// Query parameters as a JSON object
    #[arg(long)]
    pub params: Option<String>,

    /// Request body as a JSON object
    #[arg(long)]
    pub data: Option<String>,

    /// Read this line of a streaming response (1-based); 0 reads the whole body
    #[arg(long, default_value = "0")]
    pub read_line: usize,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Set a configuration value on the active profile
    Set {
        /// Config key, e.g. "endpoint" or "poll_interval"
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
