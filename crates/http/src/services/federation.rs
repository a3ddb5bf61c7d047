//! Mapping from primary-network tokens to adjacent-network tokens
//!
//! Entries are created when a login against the primary network also
//! succeeds on one or more adjacent networks. They have no expiry of their
//! own; a stale primary token simply stops being presented.

use parking_lot::Mutex;
use std::collections::HashMap;

/// A token issued by an adjacent network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedToken {
    /// Index of the adjacent network, in registration order
    pub network: usize,
    pub token: String,
}

#[derive(Debug, Default)]
pub struct FederationMap {
    entries: Mutex<HashMap<String, Vec<FederatedToken>>>,
}

impl FederationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the token `network` issued alongside `primary`.
    ///
    /// A later login on the same network replaces the earlier token.
    pub fn record(&self, primary: &str, network: usize, token: impl Into<String>) {
        let token = token.into();
        let mut entries = self.entries.lock();
        let tokens = entries.entry(strip_bearer(primary).to_string()).or_default();
        match tokens.iter_mut().find(|t| t.network == network) {
            Some(existing) => existing.token = token,
            None => {
                tokens.push(FederatedToken { network, token });
                tokens.sort_by_key(|t| t.network);
            }
        }
    }

    /// Adjacent tokens mapped from `primary`, in network order
    pub fn lookup(&self, primary: &str) -> Vec<FederatedToken> {
        self.entries
            .lock()
            .get(strip_bearer(primary))
            .cloned()
            .unwrap_or_default()
    }

    pub fn remove(&self, primary: &str) -> bool {
        self.entries.lock().remove(strip_bearer(primary)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Drop a leading `Bearer `/`bearer ` scheme from a token
pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    match token.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim_start(),
        _ => token,
    }
}
