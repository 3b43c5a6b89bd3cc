use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Logical scope a security token was issued for.
///
/// A session may hold independent, independently-renewable tokens per
/// audience. The set is closed and known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenAudience {
    /// The main workspace API.
    Api,
    /// The directory/graph resource.
    Graph,
    /// The management-plane resource.
    Management,
}

impl TokenAudience {
    /// All audiences, in the order they are reported by diagnostics.
    pub const ALL: [Self; 3] = [Self::Api, Self::Graph, Self::Management];

    /// Stable lowercase name used in serialized output and CLI arguments.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Graph => "graph",
            Self::Management => "management",
        }
    }
}

impl std::fmt::Display for TokenAudience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issued token. Immutable once created; a refresh replaces the whole
/// record rather than mutating it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub audience: TokenAudience,
    /// Opaque token material. Never exposed through the diagnostics surface.
    pub token: String,
    /// Expiration as unix seconds (UTC).
    pub expires_at: u64,
}

/// Per-audience token store: at most one record per audience at any time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenCache {
    records: HashMap<TokenAudience, TokenRecord>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for an audience. Always succeeds.
    pub fn store(&mut self, audience: TokenAudience, token: impl Into<String>, expires_at: u64) {
        self.records.insert(
            audience,
            TokenRecord {
                audience,
                token: token.into(),
                expires_at,
            },
        );
    }

    /// The stored record for an audience, if one was ever stored.
    #[must_use]
    pub fn lookup(&self, audience: TokenAudience) -> Option<&TokenRecord> {
        self.records.get(&audience)
    }

    /// The stored expiration for an audience.
    ///
    /// This is a pure state lookup: it does not evaluate whether the token
    /// is still valid relative to "now". The expiration comparison is the
    /// caller's responsibility.
    #[must_use]
    pub fn expiration_of(&self, audience: TokenAudience) -> Option<u64> {
        self.records.get(&audience).map(|r| r.expires_at)
    }

    /// Copy of all stored records, for diagnostics. Mutating the returned
    /// map never affects internal state.
    #[must_use]
    pub fn records(&self) -> HashMap<TokenAudience, TokenRecord> {
        self.records.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
