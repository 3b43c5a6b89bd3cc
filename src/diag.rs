use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::connection::{ConnectionManager, ConnectionMethod};
use crate::ledger::ErrorLedger;
use crate::token::TokenAudience;
use crate::update::VersionCheck;

/// Sentinel reported when the module install location cannot be resolved.
pub const MODULE_INFO_UNAVAILABLE: &str = "Could not retrieve the information";

/// Target platform tag. Closed set, resolved once at startup and injected;
/// never branched on at the reporting sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Linux,
    #[serde(rename = "MacOS")]
    MacOs,
    Windows,
    Unknown,
}

impl Platform {
    /// Resolve the platform this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Unknown
        }
    }
}

/// Static build metadata: version from the build, platform tag resolved once.
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub platform: Platform,
}

impl BuildInfo {
    #[must_use]
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            platform: Platform::current(),
        }
    }
}

/// Default install-location candidates: the directory holding the running
/// binary first, then the platform data directory.
#[must_use]
pub fn default_install_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.to_path_buf());
        }
    }
    if let Some(data_dir) = dirs::data_dir() {
        candidates.push(data_dir.join("workspace-cli"));
    }
    candidates
}

/// Resolve the module install path and directory name by probing candidates
/// in priority order. The first candidate that exists as a directory wins;
/// if none does, both values are the unavailable sentinel.
#[must_use]
pub fn resolve_module_install(candidates: &[PathBuf]) -> (String, String) {
    for candidate in candidates {
        if candidate.is_dir() {
            let name = candidate
                .file_name()
                .map_or_else(|| MODULE_INFO_UNAVAILABLE.to_string(), |n| n.to_string_lossy().into_owned());
            return (candidate.to_string_lossy().into_owned(), name);
        }
    }
    (
        MODULE_INFO_UNAVAILABLE.to_string(),
        MODULE_INFO_UNAVAILABLE.to_string(),
    )
}

/// Host operating system description. A pass-through read that cannot fail.
#[must_use]
pub fn os_version_string() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Point-in-time, immutable read of everything an operator needs for
/// troubleshooting. Raw token material is never included; tokens appear as
/// per-audience expiration times only.
#[derive(Debug, Serialize)]
pub struct DiagnosticsSnapshot {
    pub version: String,
    pub platform: Platform,
    pub module_path: String,
    pub module_name: String,
    pub operating_system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_method: Option<ConnectionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    /// Unix-seconds expiration per audience; only audiences with a stored
    /// token appear.
    pub token_expirations: BTreeMap<String, u64>,
    pub newer_version_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_timestamp_utc: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_stack_trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_source_line: Option<u32>,
}

/// Read-only aggregator over connection state, the error ledger, build
/// metadata, and the advisory version check.
pub struct DiagnosticsReporter<'a> {
    pub build: BuildInfo,
    pub module_candidates: Vec<PathBuf>,
    pub os_version: String,
    connection: &'a ConnectionManager,
    ledger: &'a ErrorLedger,
    version_check: &'a dyn VersionCheck,
}

impl<'a> DiagnosticsReporter<'a> {
    #[must_use]
    pub fn new(
        connection: &'a ConnectionManager,
        ledger: &'a ErrorLedger,
        version_check: &'a dyn VersionCheck,
    ) -> Self {
        Self {
            build: BuildInfo::current(),
            module_candidates: default_install_candidates(),
            os_version: os_version_string(),
            connection,
            ledger,
            version_check,
        }
    }

    /// Assemble a snapshot. Every sub-lookup degrades to absence; this
    /// read cannot fail and has no observable side effects on the state it
    /// aggregates.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let (module_path, module_name) = resolve_module_install(&self.module_candidates);

        let current = self.connection.current();
        let connection_method = current.as_ref().map(|c| c.method);
        let endpoint_url = current.as_ref().map(|c| c.endpoint_url.clone());

        let mut token_expirations = BTreeMap::new();
        for audience in TokenAudience::ALL {
            if let Some(expires_at) = self.connection.try_get_token_expiration(audience) {
                token_expirations.insert(audience.as_str().to_string(), expires_at);
            }
        }

        let newer_version_available = self
            .version_check
            .latest_version()
            .is_some_and(|v| !v.is_empty());

        let last = self.ledger.most_recent();

        DiagnosticsSnapshot {
            version: self.build.version.to_string(),
            platform: self.build.platform,
            module_path,
            module_name,
            operating_system: self.os_version.clone(),
            connection_method,
            endpoint_url,
            token_expirations,
            newer_version_available,
            last_correlation_id: last.map(|e| e.correlation_id.clone()),
            last_error_timestamp_utc: last.map(|e| e.timestamp_utc),
            last_error_message: last.map(|e| e.message.clone()),
            last_error_stack_trace: last.map(|e| e.stack_trace.clone()),
            last_error_source_line: last.and_then(|e| e.source_line),
        }
    }
}
