//! Clap derive structures for the `liftwire` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// liftwire -- drive and validate an elevator call WebSocket API
#[derive(Debug, Parser)]
#[command(
    name = "liftwire",
    version,
    about = "Drive and validate an elevator call WebSocket API",
    long_about = "Authenticates with OAuth2 client credentials, opens the WebSocket \
        session, and issues building, call and monitoring requests.\n\n\
        `liftwire validate` runs the integration checks and writes a report; \
        every request and response is appended to the evidence log.",
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
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "LIFTWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Building id (overrides profile), with or without the `building:` prefix
    #[arg(long, short = 'b', env = "LIFTWIRE_BUILDING", global = true)]
    pub building: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LIFTWIRE_OUTPUT",
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

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "LIFTWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Answer every request from the built-in mock instead of the API
    #[arg(long, global = true)]
    pub offline: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Markdown (reports)
    Markdown,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
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
    /// Round-trip a ping through the API
    Ping,

    /// Fetch the building topology (groups, lifts, areas)
    #[command(alias = "topology")]
    BuildingConfig,

    /// List the call actions the building supports
    Actions,

    /// Place a lift call
    Call(CallArgs),

    /// Hold lift doors open at a landing
    HoldOpen(HoldOpenArgs),

    /// Cancel a call by its session id
    DeleteCall(DeleteCallArgs),

    /// Subscribe to site events and print them as they arrive
    #[command(alias = "watch")]
    Monitor(MonitorArgs),

    /// Show, refresh or clear the cached access token
    Token(TokenArgs),

    /// Run the integration checks and produce a report
    Validate(ValidateArgs),

    /// Inspect the evidence log
    Evidence(EvidenceArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Driver operations ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Area id the call is made from
    #[arg(long = "from", value_name = "AREA")]
    pub area: u64,

    /// Destination area id
    #[arg(long = "to", value_name = "AREA")]
    pub destination: Option<u64>,

    /// Action id (2 = destination call)
    #[arg(long, default_value = "2")]
    pub action: u32,

    /// Seconds before the call is placed (0-30)
    #[arg(long)]
    pub delay: Option<u32>,

    /// Terminal id (defaults to the profile's terminal)
    #[arg(long)]
    pub terminal: Option<u32>,

    /// Restrict the call to these lift ids
    #[arg(long = "allowed-lift", value_name = "LIFT")]
    pub allowed_lifts: Vec<u32>,

    /// Number of passengers travelling together
    #[arg(long)]
    pub group_size: Option<u32>,
}

#[derive(Debug, Args)]
pub struct HoldOpenArgs {
    /// Lift deck area id
    #[arg(long)]
    pub deck: u64,

    /// Landing area served by the deck
    #[arg(long)]
    pub area: u64,

    /// Seconds the doors are held (0-10)
    #[arg(long, default_value = "5")]
    pub hard_time: u32,

    /// Extra seconds held while the doorway is occupied (0-30)
    #[arg(long)]
    pub soft_time: Option<u32>,
}

#[derive(Debug, Args)]
pub struct DeleteCallArgs {
    /// Session id returned by `liftwire call`
    pub session_id: u64,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Topic to subscribe to (repeatable)
    #[arg(long = "topic", short = 't', value_name = "TOPIC", default_value = "lift_+/status")]
    pub topics: Vec<String>,

    /// Subscription lifetime in seconds (clamped to 300)
    #[arg(long, default_value = "300")]
    pub duration: u32,

    /// Subscription label
    #[arg(long)]
    pub sub: Option<String>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Stop after this many seconds without waiting for more events
    #[arg(long, default_value = "60")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Discard the cached token and request a new one
    #[arg(long, conflicts_with = "clear")]
    pub refresh: bool,

    /// Remove the cached token without requesting a new one
    #[arg(long)]
    pub clear: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Write the report here (`.md` for Markdown, anything else for JSON)
    #[arg(long, short = 'r', value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Seconds the subscribe check waits for a first event
    #[arg(long, default_value = "2")]
    pub event_wait: u64,
}

#[derive(Debug, Args)]
pub struct EvidenceArgs {
    /// Evidence log to read (defaults to the profile's)
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Show only the last N entries
    #[arg(long, short = 'n', default_value = "20")]
    pub tail: usize,

    /// Show only entries of this phase
    #[arg(long)]
    pub phase: Option<PhaseFilter>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PhaseFilter {
    Request,
    Response,
    Event,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or extend the config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// Store the profile's client secret in the system keyring
    SetSecret {
        /// Read the secret from stdin instead of prompting
        #[arg(long)]
        stdin: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
