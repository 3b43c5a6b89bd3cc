use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::update::{DEFAULT_CHECK_TIMEOUT, DEFAULT_CHECK_URL};

/// Default config file template with comments, used by `config init`.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# workspace-cli configuration file
# See: https://github.com/Nunley-Media-Group/workspace-cli

# Connection defaults
# [connection]
# endpoint = "https://contoso.example"
# method = "interactive"    # interactive, app-only, certificate, managed-identity

# Update check
# [update]
# check_url = "https://releases.nunleymedia.example/workspace-cli/latest-version"
# timeout_ms = 3000
# disabled = false

# Output defaults
# [output]
# format = "json"           # json, pretty
"#;

// ---------------------------------------------------------------------------
// Config structs (parsed from TOML)
// ---------------------------------------------------------------------------

/// Represents the parsed TOML config file. All fields optional.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigFile {
    pub connection: ConnectionConfig,
    pub update: UpdateConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub endpoint: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub check_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved config (all defaults filled in)
// ---------------------------------------------------------------------------

/// Fully resolved configuration with all defaults filled in.
#[derive(Debug, Serialize)]
pub struct ResolvedConfig {
    pub config_path: Option<PathBuf>,
    pub connection: ResolvedConnection,
    pub update: ResolvedUpdate,
    pub output: ResolvedOutput,
}

#[derive(Debug, Serialize)]
pub struct ResolvedConnection {
    pub endpoint: Option<String>,
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolvedUpdate {
    pub check_url: String,
    pub timeout_ms: u64,
    pub disabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ResolvedOutput {
    pub format: String,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading/writing config file.
    Io(std::io::Error),
    /// Config file already exists (for `config init`).
    AlreadyExists(PathBuf),
    /// Could not determine config directory.
    NoConfigDir,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config file error: {e}"),
            Self::AlreadyExists(p) => {
                write!(f, "Config file already exists: {}", p.display())
            }
            Self::NoConfigDir => write!(f, "could not determine config directory"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ConfigError> for crate::error::AppError {
    fn from(e: ConfigError) -> Self {
        use crate::error::ExitCode;
        Self {
            message: e.to_string(),
            code: ExitCode::GeneralError,
        }
    }
}

// ---------------------------------------------------------------------------
// Config file search
// ---------------------------------------------------------------------------

/// Find the first config file that exists, checking locations in priority order.
///
/// Search order:
/// 1. `explicit_path` (from `--config` flag)
/// 2. `$WORKSPACE_CLI_CONFIG` environment variable
/// 3. `./.workspace-cli.toml` (project-local)
/// 4. `<config_dir>/workspace-cli/config.toml` (XDG / platform config dir)
/// 5. `~/.workspace-cli.toml` (home directory fallback)
#[must_use]
pub fn find_config_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    find_config_file_with(explicit_path, std::env::var("WORKSPACE_CLI_CONFIG").ok())
}

/// Testable variant of [`find_config_file`] that accepts an explicit env value.
#[must_use]
pub fn find_config_file_with(
    explicit_path: Option<&Path>,
    env_config: Option<String>,
) -> Option<PathBuf> {
    // 1. Explicit --config path
    if let Some(p) = explicit_path {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }

    // 2. $WORKSPACE_CLI_CONFIG
    if let Some(env_path) = env_config {
        let p = PathBuf::from(env_path);
        if p.exists() {
            return Some(p);
        }
    }

    // 3. ./.workspace-cli.toml (project-local)
    let local = PathBuf::from(".workspace-cli.toml");
    if local.exists() {
        return Some(local);
    }

    // 4. XDG / platform config dir
    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join("workspace-cli").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }

    // 5. ~/.workspace-cli.toml
    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".workspace-cli.toml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load and parse a config file. Returns the file path (if found) and the parsed config.
///
/// On parse errors, prints a warning to stderr and returns `ConfigFile::default()`.
#[must_use]
pub fn load_config(explicit_path: Option<&Path>) -> (Option<PathBuf>, ConfigFile) {
    let path = find_config_file(explicit_path);
    match &path {
        Some(p) => {
            let config = load_config_from(p);
            (path, config)
        }
        None => (None, ConfigFile::default()),
    }
}

/// Load and parse a config file from a specific path.
///
/// On parse errors, prints a warning to stderr and returns `ConfigFile::default()`.
#[must_use]
pub fn load_config_from(path: &Path) -> ConfigFile {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(
                "warning: could not read config file {}: {e}",
                path.display()
            );
            return ConfigFile::default();
        }
    };

    parse_config(&contents, path)
}

/// Parse TOML content into a `ConfigFile`.
///
/// Uses a two-pass strategy: first tries strict parsing (to detect unknown keys),
/// then falls back to lenient parsing if strict fails due to unknown fields.
#[must_use]
pub fn parse_config(contents: &str, path: &Path) -> ConfigFile {
    // First pass: strict (deny_unknown_fields via a wrapper)
    match toml::from_str::<StrictConfigFile>(contents) {
        Ok(strict) => strict.into(),
        Err(strict_err) => {
            // Second pass: lenient
            match toml::from_str::<ConfigFile>(contents) {
                Ok(config) => {
                    // Strict failed but lenient succeeded → unknown keys
                    eprintln!(
                        "warning: unknown keys in config file {}: {strict_err}",
                        path.display()
                    );
                    config
                }
                Err(parse_err) => {
                    // Both failed → invalid TOML
                    eprintln!(
                        "warning: could not parse config file {}: {parse_err}",
                        path.display()
                    );
                    ConfigFile::default()
                }
            }
        }
    }
}

/// Strict variant used for the first-pass parse to detect unknown keys.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictConfigFile {
    #[serde(default)]
    connection: StrictConnectionConfig,
    #[serde(default)]
    update: StrictUpdateConfig,
    #[serde(default)]
    output: StrictOutputConfig,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictConnectionConfig {
    endpoint: Option<String>,
    method: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictUpdateConfig {
    check_url: Option<String>,
    timeout_ms: Option<u64>,
    disabled: Option<bool>,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictOutputConfig {
    format: Option<String>,
}

impl From<StrictConfigFile> for ConfigFile {
    fn from(s: StrictConfigFile) -> Self {
        Self {
            connection: ConnectionConfig {
                endpoint: s.connection.endpoint,
                method: s.connection.method,
            },
            update: UpdateConfig {
                check_url: s.update.check_url,
                timeout_ms: s.update.timeout_ms,
                disabled: s.update.disabled,
            },
            output: OutputConfig {
                format: s.output.format,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Resolve a config file into a fully-populated `ResolvedConfig` with all defaults.
#[must_use]
pub fn resolve_config(file: &ConfigFile, config_path: Option<PathBuf>) -> ResolvedConfig {
    #[allow(clippy::cast_possible_truncation)]
    let default_timeout_ms = DEFAULT_CHECK_TIMEOUT.as_millis() as u64;

    ResolvedConfig {
        config_path,
        connection: ResolvedConnection {
            endpoint: file.connection.endpoint.clone(),
            method: file.connection.method.clone(),
        },
        update: ResolvedUpdate {
            check_url: file
                .update
                .check_url
                .clone()
                .unwrap_or_else(|| DEFAULT_CHECK_URL.to_string()),
            timeout_ms: file.update.timeout_ms.unwrap_or(default_timeout_ms),
            disabled: file.update.disabled.unwrap_or(false),
        },
        output: ResolvedOutput {
            format: file
                .output
                .format
                .clone()
                .unwrap_or_else(|| "json".to_string()),
        },
    }
}

// ---------------------------------------------------------------------------
// Config init
// ---------------------------------------------------------------------------

/// Default path for `config init`: `<config_dir>/workspace-cli/config.toml`.
///
/// # Errors
///
/// Returns `ConfigError::NoConfigDir` if the platform config directory cannot be determined.
pub fn default_init_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|d| d.join("workspace-cli").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Create a default config file at the given path (or the default XDG path).
///
/// # Errors
///
/// - `ConfigError::AlreadyExists` if the file already exists
/// - `ConfigError::Io` on I/O failure
/// - `ConfigError::NoConfigDir` if no target path and platform config dir unknown
pub fn init_config(target_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = match target_path {
        Some(p) => p.to_path_buf(),
        None => default_init_path()?,
    };

    init_config_to(&path)
}

/// Testable variant of [`init_config`] that writes to an explicit path.
///
/// # Errors
///
/// - `ConfigError::AlreadyExists` if the file already exists
/// - `ConfigError::Io` on I/O failure
pub fn init_config_to(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_full_config() {
        let toml = r#"
[connection]
endpoint = "https://contoso.example"
method = "app-only"

[update]
check_url = "https://releases.internal.example/latest"
timeout_ms = 1500
disabled = true

[output]
format = "pretty"
"#;
        let config = parse_config(toml, Path::new("test.toml"));
        assert_eq!(
            config.connection.endpoint.as_deref(),
            Some("https://contoso.example")
        );
        assert_eq!(config.connection.method.as_deref(), Some("app-only"));
        assert_eq!(
            config.update.check_url.as_deref(),
            Some("https://releases.internal.example/latest")
        );
        assert_eq!(config.update.timeout_ms, Some(1500));
        assert_eq!(config.update.disabled, Some(true));
        assert_eq!(config.output.format.as_deref(), Some("pretty"));
    }

    #[test]
    fn parse_empty_config() {
        let config = parse_config("", Path::new("test.toml"));
        assert!(config.connection.endpoint.is_none());
        assert!(config.update.check_url.is_none());
        assert!(config.output.format.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = "[update]\ntimeout_ms = 500\n";
        let config = parse_config(toml, Path::new("test.toml"));
        assert_eq!(config.update.timeout_ms, Some(500));
        assert!(config.connection.endpoint.is_none());
    }

    #[test]
    fn parse_invalid_toml_returns_default() {
        let config = parse_config("this is not valid toml [[[", Path::new("test.toml"));
        assert!(config.connection.endpoint.is_none());
        assert!(config.update.timeout_ms.is_none());
    }

    #[test]
    fn parse_unknown_keys_warns_but_keeps_known() {
        let toml = r#"
[update]
timeout_ms = 900
unknown_key = "hello"
"#;
        let config = parse_config(toml, Path::new("test.toml"));
        assert_eq!(config.update.timeout_ms, Some(900));
    }

    #[test]
    fn resolve_defaults() {
        let config = ConfigFile::default();
        let resolved = resolve_config(&config, None);
        assert!(resolved.connection.endpoint.is_none());
        assert!(resolved.connection.method.is_none());
        assert_eq!(resolved.update.check_url, DEFAULT_CHECK_URL);
        assert_eq!(resolved.update.timeout_ms, 3000);
        assert!(!resolved.update.disabled);
        assert_eq!(resolved.output.format, "json");
        assert!(resolved.config_path.is_none());
    }

    #[test]
    fn resolve_overrides() {
        let config = ConfigFile {
            connection: ConnectionConfig {
                endpoint: Some("https://contoso.example".into()),
                method: Some("certificate".into()),
            },
            update: UpdateConfig {
                check_url: Some("https://mirror.example/latest".into()),
                timeout_ms: Some(250),
                disabled: Some(true),
            },
            output: OutputConfig {
                format: Some("pretty".into()),
            },
        };
        let path = PathBuf::from("/tmp/test.toml");
        let resolved = resolve_config(&config, Some(path.clone()));
        assert_eq!(
            resolved.connection.endpoint.as_deref(),
            Some("https://contoso.example")
        );
        assert_eq!(resolved.connection.method.as_deref(), Some("certificate"));
        assert_eq!(resolved.update.check_url, "https://mirror.example/latest");
        assert_eq!(resolved.update.timeout_ms, 250);
        assert!(resolved.update.disabled);
        assert_eq!(resolved.output.format, "pretty");
        assert_eq!(resolved.config_path, Some(path));
    }

    #[test]
    fn init_config_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let result = init_config_to(&path);
        assert!(result.is_ok());
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[connection]"));
        assert!(contents.contains("[update]"));
    }

    #[test]
    fn init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "existing").unwrap();

        let result = init_config_to(&path);
        assert!(matches!(result, Err(ConfigError::AlreadyExists(_))));

        // Verify original content not overwritten
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "existing");
    }

    #[test]
    fn find_config_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("my-config.toml");
        std::fs::write(&path, "").unwrap();

        let found = find_config_file_with(Some(&path), None);
        assert_eq!(found, Some(path.clone()));
    }

    #[test]
    fn find_config_with_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("env-config.toml");
        std::fs::write(&path, "").unwrap();

        let found = find_config_file_with(None, Some(path.to_string_lossy().into_owned()));
        assert_eq!(found, Some(path.clone()));
    }

    #[test]
    fn find_config_explicit_takes_priority_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let env = dir.path().join("env.toml");
        std::fs::write(&explicit, "").unwrap();
        std::fs::write(&env, "").unwrap();

        let found =
            find_config_file_with(Some(&explicit), Some(env.to_string_lossy().into_owned()));
        assert_eq!(found, Some(explicit.clone()));
    }

    #[test]
    fn find_config_nonexistent_returns_none() {
        let found = find_config_file_with(
            Some(Path::new("/nonexistent/path.toml")),
            Some("/also/nonexistent.toml".into()),
        );
        // May still find a config from project-local or home locations, but the
        // explicit and env paths must not match.
        // We can't guarantee None here due to project-local or home checks, so just verify
        // the explicit and env paths didn't match.
        if let Some(ref p) = found {
            assert_ne!(p, &PathBuf::from("/nonexistent/path.toml"));
            assert_ne!(p, &PathBuf::from("/also/nonexistent.toml"));
        }
    }

    #[test]
    fn load_config_from_nonexistent_returns_default() {
        let config = load_config_from(Path::new("/nonexistent/config.toml"));
        assert!(config.connection.endpoint.is_none());
    }

    #[test]
    fn config_error_display() {
        assert!(
            ConfigError::NoConfigDir
                .to_string()
                .contains("config directory")
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(ConfigError::Io(io_err).to_string().contains("denied"));

        let path = PathBuf::from("/tmp/test.toml");
        let msg = ConfigError::AlreadyExists(path).to_string();
        assert!(msg.contains("already exists"));
        assert!(msg.contains("/tmp/test.toml"));
    }

    #[test]
    fn config_serializes_to_json() {
        let config = ConfigFile::default();
        let resolved = resolve_config(&config, None);
        let json = serde_json::to_string(&resolved).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["update"]["timeout_ms"], 3000);
        assert_eq!(parsed["output"]["format"], "json");
    }
}
