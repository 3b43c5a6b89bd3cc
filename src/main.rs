use std::io::Read;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use serde::Serialize;

use workspace_cli::cli::{
    AudienceArg, Cli, Command, CompletionsArgs, ConfigCommand, ConnectArgs, ConnectMethod,
    DiagArgs, GlobalOpts, TokenCommand, TokenSetArgs,
};
use workspace_cli::config::{ResolvedConfig, init_config, load_config, resolve_config};
use workspace_cli::connection::{ConnectionManager, ConnectionMethod};
use workspace_cli::diag::{BuildInfo, DiagnosticsReporter, Platform};
use workspace_cli::error::AppError;
use workspace_cli::ledger::{ErrorRecord, append_history, load_ledger};
use workspace_cli::session::{
    SessionData, delete_session, now_iso8601, now_unix_secs, read_session, write_session,
};
use workspace_cli::token::{TokenAudience, TokenRecord};
use workspace_cli::update::{HttpVersionCheck, NoVersionCheck, VersionCheck};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        // Record the failure in the error history so the next diagnostics
        // run can surface it. Best effort; never masks the original error.
        let _ = append_history(ErrorRecord {
            correlation_id: String::new(),
            timestamp_utc: now_unix_secs(),
            message: e.message.clone(),
            stack_trace: String::new(),
            source_line: None,
        });

        e.print_json_stderr();
        std::process::exit(i32::from(e.code as u8));
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let (config_path, config_file) = load_config(cli.global.config.as_deref());
    let config = resolve_config(&config_file, config_path);
    let pretty = effective_pretty(&cli.global, &config);

    match &cli.command {
        Command::Connect(args) => execute_connect(args, pretty),
        Command::Token(args) => match &args.command {
            TokenCommand::Set(set) => execute_token_set(set, pretty),
        },
        Command::Diag(args) => execute_diag(args, &config, pretty),
        Command::Version => execute_version(pretty),
        Command::Config(args) => match &args.command {
            ConfigCommand::Show => print_output(&config, pretty),
            ConfigCommand::Init(init) => execute_config_init(init.path.as_deref(), pretty),
            ConfigCommand::Path => execute_config_path(&config, pretty),
        },
        Command::Completions(args) => {
            execute_completions(args);
            Ok(())
        }
    }
}

/// Output format precedence: --pretty / --json flags, then the config file.
fn effective_pretty(global: &GlobalOpts, config: &ResolvedConfig) -> bool {
    if global.output.pretty {
        return true;
    }
    if global.output.json {
        return false;
    }
    config.output.format == "pretty"
}

fn print_output<T: Serialize>(value: &T, pretty: bool) -> Result<(), AppError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| AppError {
        message: format!("could not serialize output: {e}"),
        code: workspace_cli::error::ExitCode::GeneralError,
    })?;
    println!("{json}");
    Ok(())
}

fn convert_method(method: ConnectMethod) -> ConnectionMethod {
    match method {
        ConnectMethod::Interactive => ConnectionMethod::Interactive,
        ConnectMethod::AppOnly => ConnectionMethod::AppOnly,
        ConnectMethod::Certificate => ConnectionMethod::Certificate,
        ConnectMethod::ManagedIdentity => ConnectionMethod::ManagedIdentity,
    }
}

fn convert_audience(audience: AudienceArg) -> TokenAudience {
    match audience {
        AudienceArg::Api => TokenAudience::Api,
        AudienceArg::Graph => TokenAudience::Graph,
        AudienceArg::Management => TokenAudience::Management,
    }
}

#[derive(Serialize)]
struct ConnectInfo<'a> {
    endpoint_url: &'a str,
    method: &'static str,
    session_id: &'a str,
    timestamp: &'a str,
}

#[derive(Serialize)]
struct ConnectionStatus<'a> {
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stored_tokens: Option<usize>,
}

#[derive(Serialize)]
struct DisconnectInfo {
    disconnected: bool,
}

fn execute_connect(args: &ConnectArgs, pretty: bool) -> Result<(), AppError> {
    if args.status {
        let session = read_session()?;
        let status = match &session {
            Some(data) => ConnectionStatus {
                connected: true,
                endpoint_url: Some(&data.endpoint_url),
                method: Some(data.method.as_str()),
                session_id: Some(&data.session_id),
                stored_tokens: Some(data.tokens.len()),
            },
            None => ConnectionStatus {
                connected: false,
                endpoint_url: None,
                method: None,
                session_id: None,
                stored_tokens: None,
            },
        };
        return print_output(&status, pretty);
    }

    if args.disconnect {
        delete_session()?;
        return print_output(&DisconnectInfo { disconnected: true }, pretty);
    }

    // clap guarantees the URL is present outside --status / --disconnect
    let raw_url = args.url.as_deref().ok_or_else(|| {
        AppError::invalid_endpoint("", "no endpoint URL provided")
    })?;

    let parsed = url::Url::parse(raw_url)
        .map_err(|e| AppError::invalid_endpoint(raw_url, &e.to_string()))?;
    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Err(AppError::invalid_endpoint(
            raw_url,
            "only http and https endpoints are supported",
        ));
    }

    // Connecting replaces any previous session wholesale, tokens included.
    let data = SessionData {
        endpoint_url: parsed.to_string(),
        method: convert_method(args.method),
        session_id: uuid::Uuid::new_v4().to_string(),
        timestamp: now_iso8601(),
        tokens: Vec::new(),
    };
    write_session(&data)?;

    print_output(
        &ConnectInfo {
            endpoint_url: &data.endpoint_url,
            method: data.method.as_str(),
            session_id: &data.session_id,
            timestamp: &data.timestamp,
        },
        pretty,
    )
}

#[derive(Serialize)]
struct TokenInfo {
    audience: &'static str,
    expires_at: u64,
}

fn execute_token_set(args: &TokenSetArgs, pretty: bool) -> Result<(), AppError> {
    let mut data = read_session()?.ok_or_else(AppError::no_session)?;

    let token = if args.token == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|_| AppError::missing_token_input())?;
        buf.trim().to_string()
    } else {
        args.token.clone()
    };
    if token.is_empty() {
        return Err(AppError::missing_token_input());
    }

    let audience = convert_audience(args.audience);
    let expires_at = now_unix_secs().saturating_add(args.expires_in);

    // One record per audience: storing again replaces the previous token.
    data.tokens.retain(|r| r.audience != audience);
    data.tokens.push(TokenRecord {
        audience,
        token,
        expires_at,
    });
    write_session(&data)?;

    print_output(
        &TokenInfo {
            audience: audience.as_str(),
            expires_at,
        },
        pretty,
    )
}

fn execute_diag(args: &DiagArgs, config: &ResolvedConfig, pretty: bool) -> Result<(), AppError> {
    // Diagnostics never fail: an unreadable session reports as disconnected.
    let connection = ConnectionManager::new();
    if let Ok(Some(session)) = read_session() {
        connection.set_current(session.to_connection_state());
    }

    let ledger = load_ledger();

    let http_check;
    let no_check = NoVersionCheck;
    let version_check: &dyn VersionCheck = if args.no_update_check || config.update.disabled {
        &no_check
    } else {
        http_check = HttpVersionCheck::new(
            config.update.check_url.clone(),
            Duration::from_millis(config.update.timeout_ms),
        );
        &http_check
    };

    let reporter = DiagnosticsReporter::new(&connection, &ledger, version_check);
    print_output(&reporter.snapshot(), pretty)
}

#[derive(Serialize)]
struct VersionInfo {
    version: &'static str,
    platform: Platform,
}

fn execute_version(pretty: bool) -> Result<(), AppError> {
    let build = BuildInfo::current();
    print_output(
        &VersionInfo {
            version: build.version,
            platform: build.platform,
        },
        pretty,
    )
}

#[derive(Serialize)]
struct ConfigInitInfo {
    created: String,
}

fn execute_config_init(path: Option<&std::path::Path>, pretty: bool) -> Result<(), AppError> {
    let created = init_config(path)?;
    print_output(
        &ConfigInitInfo {
            created: created.to_string_lossy().into_owned(),
        },
        pretty,
    )
}

#[derive(Serialize)]
struct ConfigPathInfo {
    path: Option<String>,
}

fn execute_config_path(config: &ResolvedConfig, pretty: bool) -> Result<(), AppError> {
    print_output(
        &ConfigPathInfo {
            path: config
                .config_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        },
        pretty,
    )
}

fn execute_completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "workspace-cli", &mut std::io::stdout());
}
