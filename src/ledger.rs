use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Maximum number of entries retained in the on-disk error history.
const MAX_HISTORY_ENTRIES: usize = 50;

/// One unhandled failure observed by the hosting shell.
///
/// Auxiliary fields are best-effort: a failure without a server-reported
/// correlation id or timestamp stores an empty string / zero rather than
/// failing the append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Opaque id linking the failure to server-side logs; empty if the
    /// failure carried none.
    #[serde(default)]
    pub correlation_id: String,
    /// Unix seconds (UTC); 0 if the failure carried no timestamp.
    #[serde(default)]
    pub timestamp_utc: u64,
    pub message: String,
    #[serde(default)]
    pub stack_trace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<u32>,
}

impl ErrorRecord {
    /// Build a record from a bare message, with all auxiliary fields absent.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            correlation_id: String::new(),
            timestamp_utc: 0,
            message: message.into(),
            stack_trace: String::new(),
            source_line: None,
        }
    }
}

/// Append-only view over the host's error stream. The core never generates
/// these records itself; it stores what the host reports and surfaces only
/// the most recent entry.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    entries: Vec<ErrorRecord>,
}

impl ErrorLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate a ledger from an ordered history, most recent first.
    #[must_use]
    pub fn from_history(newest_first: Vec<ErrorRecord>) -> Self {
        let mut entries = newest_first;
        entries.reverse();
        Self { entries }
    }

    /// Append one record. Infallible; missing auxiliary fields on the
    /// record are a normal, representable outcome.
    pub fn record(&mut self, entry: ErrorRecord) {
        self.entries.push(entry);
    }

    /// The last appended record, or `None` if nothing was ever recorded in
    /// this host session.
    #[must_use]
    pub fn most_recent(&self) -> Option<&ErrorRecord> {
        self.entries.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors that can occur during error-history file operations.
#[derive(Debug)]
pub enum HistoryError {
    /// Could not determine home directory.
    NoHomeDir,
    /// I/O error reading/writing the history file.
    Io(std::io::Error),
    /// History file contains invalid JSON.
    InvalidFormat(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHomeDir => write!(f, "could not determine home directory"),
            Self::Io(e) => write!(f, "error history file error: {e}"),
            Self::InvalidFormat(e) => write!(f, "invalid error history file: {e}"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Returns the path to the error history file: `~/.workspace-cli/errors.json`.
///
/// # Errors
///
/// Returns `HistoryError::NoHomeDir` if the home directory cannot be determined.
pub fn history_file_path() -> Result<PathBuf, HistoryError> {
    let home = crate::session::home_dir().ok_or(HistoryError::NoHomeDir)?;
    Ok(home.join(".workspace-cli").join("errors.json"))
}

/// Read the error history, most recent entry first.
///
/// A missing file is an empty history. An unreadable or malformed file is
/// also treated as empty: the history is advisory and must never block the
/// command that is trying to report on it.
#[must_use]
pub fn read_history_from(path: &Path) -> Vec<ErrorRecord> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Prepend one record to the on-disk history, dropping the oldest entries
/// beyond the retention cap. Uses atomic write (temp file then rename).
///
/// # Errors
///
/// Returns `HistoryError::Io` on I/O failure.
pub fn append_history_to(path: &Path, entry: ErrorRecord) -> Result<(), HistoryError> {
    let mut history = read_history_from(path);
    history.insert(0, entry);
    history.truncate(MAX_HISTORY_ENTRIES);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(&history)
        .map_err(|e| HistoryError::InvalidFormat(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append to the default history file. See [`append_history_to`].
///
/// # Errors
///
/// Returns `HistoryError::NoHomeDir` or `HistoryError::Io`.
pub fn append_history(entry: ErrorRecord) -> Result<(), HistoryError> {
    let path = history_file_path()?;
    append_history_to(&path, entry)
}

/// Load the ledger for the current host session from the default history
/// file. Missing or unreadable history yields an empty ledger.
#[must_use]
pub fn load_ledger() -> ErrorLedger {
    match history_file_path() {
        Ok(path) => ErrorLedger::from_history(read_history_from(&path)),
        Err(_) => ErrorLedger::new(),
    }
}
