use std::time::Duration;

/// Default bound on the update-check round trip.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Default release endpoint: returns the latest published version as a
/// plain-text body, or an empty body when no newer release exists.
pub const DEFAULT_CHECK_URL: &str =
    "https://releases.nunleymedia.example/workspace-cli/latest-version";

/// Advisory lookup for the latest published version.
///
/// Implementations must degrade to `None` on any failure; an update check
/// can never fail a diagnostics read.
pub trait VersionCheck {
    /// The latest published version string, or `None` when the lookup
    /// failed or produced nothing usable.
    fn latest_version(&self) -> Option<String>;
}

/// Update checks disabled: always reports no information.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVersionCheck;

impl VersionCheck for NoVersionCheck {
    fn latest_version(&self) -> Option<String> {
        None
    }
}

/// HTTP-backed version check with a bounded global timeout, so a
/// diagnostics request can never hang on a slow release endpoint.
#[derive(Debug, Clone)]
pub struct HttpVersionCheck {
    url: String,
    timeout: Duration,
}

impl HttpVersionCheck {
    #[must_use]
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Default for HttpVersionCheck {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_URL, DEFAULT_CHECK_TIMEOUT)
    }
}

impl VersionCheck for HttpVersionCheck {
    fn latest_version(&self) -> Option<String> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build()
            .into();

        // Transport errors, non-2xx statuses, timeouts, and unreadable
        // bodies all degrade to "no update info".
        let mut response = agent.get(&self.url).call().ok()?;
        let body = response.body_mut().read_to_string().ok()?;
        normalize_version(&body)
    }
}

/// Trim a raw response body down to a version string, treating empty and
/// whitespace-only bodies as "no update available".
#[must_use]
pub fn normalize_version(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_version_check_reports_nothing() {
        assert_eq!(NoVersionCheck.latest_version(), None);
    }

    #[test]
    fn normalize_empty_body_is_none() {
        assert_eq!(normalize_version(""), None);
        assert_eq!(normalize_version("   \n"), None);
    }

    #[test]
    fn normalize_trims_whitespace() {
        assert_eq!(normalize_version("16.2.0\n"), Some("16.2.0".to_string()));
        assert_eq!(normalize_version("  2.5.1  "), Some("2.5.1".to_string()));
    }

    #[test]
    fn unreachable_endpoint_degrades_to_none() {
        // Reserved TEST-NET-1 address; connect fails fast within the timeout.
        let check = HttpVersionCheck::new("http://192.0.2.1/latest", Duration::from_millis(200));
        assert_eq!(check.latest_version(), None);
    }
}
