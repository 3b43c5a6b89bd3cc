#![allow(clippy::doc_markdown)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(
    name = "workspace-cli",
    version,
    about = "Workspace connection management and diagnostics",
    long_about = "workspace-cli is a command-line client for managing connections to a remote \
        workspace service. It persists a connection context (endpoint, authentication method, \
        and per-audience access tokens) across invocations, records failures reported by the \
        hosting shell, and produces a read-only diagnostics snapshot combining build metadata, \
        connection state, token expirations, installation details, and update availability.\n\n\
        Designed for shell scripting and support workflows, every subcommand produces structured \
        JSON output on stdout and structured JSON errors on stderr.",
    after_long_help = "\
QUICK START:
  # Connect to a workspace endpoint
  workspace-cli connect https://contoso.example --method app-only

  # Store an access token for the graph audience (expires in one hour)
  workspace-cli token set graph --expires-in 3600 eyJhbGc...

  # Collect a diagnostics snapshot
  workspace-cli diag

  # Check connection status
  workspace-cli connect --status

  # Disconnect and remove the session file
  workspace-cli connect --disconnect

EXIT CODES:
  0  Success
  1  General error (invalid arguments, internal failure)
  2  Connection error (not connected, invalid endpoint)
  3  Timeout error (update check or endpoint probe timed out)

ENVIRONMENT VARIABLES:
  WORKSPACE_CLI_CONFIG    Path to configuration file",
    term_width = 100
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalOpts {
    /// Path to configuration file (overrides default search)
    #[arg(long, global = true, env = "WORKSPACE_CLI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputFormat,
}

#[derive(Args)]
#[group(multiple = false)]
pub struct OutputFormat {
    /// Output as compact JSON (mutually exclusive with --pretty)
    #[arg(long, global = true, conflicts_with = "pretty")]
    pub json: bool,

    /// Output as pretty-printed JSON (mutually exclusive with --json)
    #[arg(long, global = true)]
    pub pretty: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Connect to a workspace endpoint, or inspect/clear the current session
    #[command(
        long_about = "Establish a connection context for a workspace endpoint. The context \
            (endpoint URL, authentication method, session id) is persisted to a local session \
            file so subsequent commands reuse it. Connecting while already connected replaces \
            the previous context wholesale, including any stored tokens.\n\n\
            Use --status to print the current session without modifying it, and --disconnect \
            to clear the session file.",
        after_long_help = "\
EXAMPLES:
  # Connect interactively (default method)
  workspace-cli connect https://contoso.example

  # Connect with app-only credentials
  workspace-cli connect https://contoso.example --method app-only

  # Show current connection status
  workspace-cli connect --status

  # Disconnect and remove the session file
  workspace-cli connect --disconnect"
    )]
    Connect(ConnectArgs),

    /// Manage per-audience access tokens in the current session
    #[command(
        long_about = "Manage access tokens stored in the current connection context. Each \
            token is keyed by its audience (api, graph, management); storing a token for an \
            audience that already has one replaces it. Requires an active session.",
        after_long_help = "\
EXAMPLES:
  # Store a token for the graph audience, expiring in one hour
  workspace-cli token set graph --expires-in 3600 eyJhbGc...

  # Read the token from stdin
  cat token.txt | workspace-cli token set api --expires-in 1800 -"
    )]
    Token(TokenArgs),

    /// Collect a read-only diagnostics snapshot
    #[command(
        long_about = "Collect a diagnostics snapshot: build version and platform, installation \
            path, operating system, connection endpoint and method, per-audience token \
            expirations, the most recent failure recorded by the hosting shell, and whether a \
            newer release is available. Every lookup degrades to absence on failure; this \
            command itself never fails.",
        after_long_help = "\
EXAMPLES:
  # Collect a snapshot
  workspace-cli diag

  # Pretty-printed, skipping the network update check
  workspace-cli diag --pretty --no-update-check"
    )]
    Diag(DiagArgs),

    /// Show build version and platform
    #[command(
        long_about = "Show the build version and the platform the binary was compiled for, \
            as structured JSON. A subset of the 'diag' output for quick scripting use.",
        after_long_help = "\
EXAMPLES:
  # Show version info
  workspace-cli version"
    )]
    Version,

    /// Configuration file management (show, init, path)
    #[command(
        long_about = "Manage the workspace-cli configuration file. Show the resolved \
            configuration from all sources, create a default config file, or display the \
            active config file path. Config files use TOML format and are searched in \
            priority order: --config flag, $WORKSPACE_CLI_CONFIG env var, project-local, \
            XDG config dir, home directory.",
        after_long_help = "\
EXAMPLES:
  # Show the resolved configuration
  workspace-cli config show

  # Create a default config file
  workspace-cli config init

  # Create a config at a custom path
  workspace-cli config init --path ./my-config.toml

  # Show the active config file path
  workspace-cli config path"
    )]
    Config(ConfigArgs),

    /// Generate shell completion scripts
    #[command(
        long_about = "Generate shell completion scripts for tab-completion of commands, flags, \
            and enum values. Pipe the output to the appropriate file for your shell.",
        after_long_help = "\
EXAMPLES:
  # Bash
  workspace-cli completions bash > /etc/bash_completion.d/workspace-cli

  # Zsh
  workspace-cli completions zsh > ~/.zfunc/_workspace-cli

  # Fish
  workspace-cli completions fish > ~/.config/fish/completions/workspace-cli.fish"
    )]
    Completions(CompletionsArgs),
}

/// Authentication method used when establishing a connection.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConnectMethod {
    Interactive,
    AppOnly,
    Certificate,
    ManagedIdentity,
}

/// Token audience selector for the `token` subcommand.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AudienceArg {
    Api,
    Graph,
    Management,
}

/// Arguments for the `connect` subcommand.
#[derive(Args)]
pub struct ConnectArgs {
    /// Workspace endpoint URL (required unless --status or --disconnect)
    #[arg(required_unless_present_any = ["status", "disconnect"])]
    pub url: Option<String>,

    /// Authentication method [default: interactive]
    #[arg(long, value_enum, default_value = "interactive")]
    pub method: ConnectMethod,

    /// Show current connection status (conflicts with --disconnect)
    #[arg(long, conflicts_with = "disconnect")]
    pub status: bool,

    /// Disconnect and remove the session file (conflicts with --status)
    #[arg(long, conflicts_with = "status")]
    pub disconnect: bool,
}

/// Arguments for the `token` subcommand group.
#[derive(Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Token management subcommands.
#[derive(Subcommand)]
pub enum TokenCommand {
    /// Store an access token for an audience
    #[command(
        long_about = "Store an access token for the given audience in the current session. \
            Replaces any existing token for that audience. The expiration is computed from \
            --expires-in at the moment the token is stored. Pass '-' as the token to read it \
            from stdin, which keeps it out of shell history.",
        after_long_help = "\
EXAMPLES:
  # Store a token for the api audience
  workspace-cli token set api --expires-in 3600 eyJhbGc...

  # Read the token from stdin
  cat token.txt | workspace-cli token set management --expires-in 900 -"
    )]
    Set(TokenSetArgs),
}

/// Arguments for `token set`.
#[derive(Args)]
pub struct TokenSetArgs {
    /// Token audience (api, graph, management)
    #[arg(value_enum)]
    pub audience: AudienceArg,

    /// The token value, or '-' to read from stdin
    pub token: String,

    /// Seconds until the token expires, measured from now
    #[arg(long)]
    pub expires_in: u64,
}

/// Arguments for the `diag` subcommand.
#[derive(Args)]
pub struct DiagArgs {
    /// Skip the network update check (reports no update available)
    #[arg(long)]
    pub no_update_check: bool,
}

/// Arguments for the `config` subcommand group.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config management subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration from all sources
    #[command(
        long_about = "Display the fully resolved configuration by merging all sources in \
            priority order: CLI flags > environment variables > config file > defaults. \
            Returns JSON showing every setting and its effective value.",
        after_long_help = "\
EXAMPLES:
  # Show resolved config
  workspace-cli config show

  # Show config from a specific file
  workspace-cli --config ./my-config.toml config show"
    )]
    Show,

    /// Create a default config file with commented example values
    #[command(
        long_about = "Create a new configuration file with all available settings documented \
            as comments. By default, the file is created at the XDG config directory \
            (~/.config/workspace-cli/config.toml on Linux). Use --path to specify a custom \
            location. Will not overwrite an existing file.",
        after_long_help = "\
EXAMPLES:
  # Create default config file
  workspace-cli config init

  # Create at a custom path
  workspace-cli config init --path ./my-config.toml"
    )]
    Init(ConfigInitArgs),

    /// Show the active config file path (or null if none)
    #[command(
        long_about = "Show the path of the active configuration file. Searches in priority \
            order: --config flag, $WORKSPACE_CLI_CONFIG env var, project-local \
            (.workspace-cli.toml), XDG config dir, home directory (~/.workspace-cli.toml). \
            Returns JSON with {\"path\": \"...\"} or {\"path\": null} if no config file is found.",
        after_long_help = "\
EXAMPLES:
  # Show active config path
  workspace-cli config path"
    )]
    Path,
}

/// Arguments for `config init`.
#[derive(Args)]
pub struct ConfigInitArgs {
    /// Create config file at a custom path instead of the default XDG location
    #[arg(long)]
    pub path: Option<PathBuf>,
}

/// Arguments for the `completions` subcommand.
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
    pub shell: Shell,
}
