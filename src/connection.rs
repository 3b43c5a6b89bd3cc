use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::token::{TokenAudience, TokenCache};

/// Authentication mechanism used to establish the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMethod {
    Interactive,
    AppOnly,
    Certificate,
    ManagedIdentity,
}

impl ConnectionMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::AppOnly => "app-only",
            Self::Certificate => "certificate",
            Self::ManagedIdentity => "managed-identity",
        }
    }
}

impl std::fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One active connection: endpoint, method, and its token cache.
///
/// Immutable once published through [`ConnectionManager::set_current`]; a
/// reconnect replaces the whole value.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub endpoint_url: String,
    pub method: ConnectionMethod,
    pub tokens: TokenCache,
}

impl ConnectionState {
    #[must_use]
    pub fn new(
        endpoint_url: impl Into<String>,
        method: ConnectionMethod,
        tokens: TokenCache,
    ) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            method,
            tokens,
        }
    }
}

/// Owner of the current connection.
///
/// Two states: Disconnected (initial) and Connected. `set_current` replaces
/// the connection wholesale, so a concurrent reader observes either the old
/// or the new state in full, never endpoint and tokens from different
/// connections. Reads never block on other reads.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    current: RwLock<Option<Arc<ConnectionState>>>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current connection (connect or reconnect).
    pub fn set_current(&self, state: ConnectionState) {
        let mut guard = self.current.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(Arc::new(state));
    }

    /// Drop the current connection (disconnect).
    pub fn clear_current(&self) {
        let mut guard = self.current.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = None;
    }

    /// The current connection, or `None` when disconnected.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ConnectionState>> {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Expiration of the stored token for an audience in the current
    /// connection. `None` when disconnected or when no token was ever
    /// stored for that audience.
    #[must_use]
    pub fn try_get_token_expiration(&self, audience: TokenAudience) -> Option<u64> {
        self.current()?.tokens.expiration_of(audience)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(endpoint: &str, method: ConnectionMethod) -> ConnectionManager {
        let manager = ConnectionManager::new();
        manager.set_current(ConnectionState::new(endpoint, method, TokenCache::new()));
        manager
    }

    #[test]
    fn initial_state_is_disconnected() {
        let manager = ConnectionManager::new();
        assert!(manager.current().is_none());
        for audience in TokenAudience::ALL {
            assert_eq!(manager.try_get_token_expiration(audience), None);
        }
    }

    #[test]
    fn set_current_publishes_full_state() {
        let mut tokens = TokenCache::new();
        tokens.store(TokenAudience::Api, "tok", 500);

        let manager = ConnectionManager::new();
        manager.set_current(ConnectionState::new(
            "https://contoso.example",
            ConnectionMethod::AppOnly,
            tokens,
        ));

        let state = manager.current().unwrap();
        assert_eq!(state.endpoint_url, "https://contoso.example");
        assert_eq!(state.method, ConnectionMethod::AppOnly);
        assert_eq!(manager.try_get_token_expiration(TokenAudience::Api), Some(500));
    }

    #[test]
    fn reconnect_replaces_wholesale() {
        let manager = connected("https://one.example", ConnectionMethod::Interactive);

        let mut tokens = TokenCache::new();
        tokens.store(TokenAudience::Graph, "tok", 900);
        manager.set_current(ConnectionState::new(
            "https://two.example",
            ConnectionMethod::Certificate,
            tokens,
        ));

        let state = manager.current().unwrap();
        assert_eq!(state.endpoint_url, "https://two.example");
        assert_eq!(state.method, ConnectionMethod::Certificate);
        // Token state from the old connection must not survive.
        assert_eq!(manager.try_get_token_expiration(TokenAudience::Api), None);
        assert_eq!(manager.try_get_token_expiration(TokenAudience::Graph), Some(900));
    }

    #[test]
    fn clear_current_disconnects_all_audiences() {
        let manager = connected("https://contoso.example", ConnectionMethod::AppOnly);
        manager.clear_current();

        assert!(manager.current().is_none());
        for audience in TokenAudience::ALL {
            assert_eq!(manager.try_get_token_expiration(audience), None);
        }
    }

    #[test]
    fn reader_keeps_old_state_across_replace() {
        let manager = connected("https://one.example", ConnectionMethod::Interactive);
        let before = manager.current().unwrap();

        manager.set_current(ConnectionState::new(
            "https://two.example",
            ConnectionMethod::AppOnly,
            TokenCache::new(),
        ));

        // The Arc handed out earlier still describes the old connection in full.
        assert_eq!(before.endpoint_url, "https://one.example");
        assert_eq!(before.method, ConnectionMethod::Interactive);
    }

    #[test]
    fn concurrent_readers_never_observe_mixed_state() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        // Each published state pairs endpoint N with a token expiring at N,
        // so a mixed read is detectable.
        let manager = Arc::new(ConnectionManager::new());
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let manager = Arc::clone(&manager);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                for n in 0..2_000u64 {
                    let mut tokens = TokenCache::new();
                    tokens.store(TokenAudience::Api, "tok", n);
                    manager.set_current(ConnectionState::new(
                        format!("https://host-{n}.example"),
                        ConnectionMethod::AppOnly,
                        tokens,
                    ));
                }
                stop.store(true, Ordering::Release);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        if let Some(state) = manager.current() {
                            let n = state.tokens.expiration_of(TokenAudience::Api).unwrap();
                            assert_eq!(state.endpoint_url, format!("https://host-{n}.example"));
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn method_names_are_stable() {
        assert_eq!(ConnectionMethod::Interactive.to_string(), "interactive");
        assert_eq!(ConnectionMethod::AppOnly.to_string(), "app-only");
        assert_eq!(ConnectionMethod::Certificate.to_string(), "certificate");
        assert_eq!(
            ConnectionMethod::ManagedIdentity.to_string(),
            "managed-identity"
        );
    }
}
