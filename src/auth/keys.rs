//! Cache of the platform's rotating public signing keys.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use tracing::{debug, warn};

use crate::error::Result;

const KEYS_ENDPOINT: &str = "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Key mapping plus the expiry governing the whole batch.
///
/// The platform rotates keys as a set, so mapping and expiry are only
/// ever replaced together.
#[derive(Default)]
struct KeySet {
    keys: HashMap<String, DecodingKey>,
    expires_at: Option<DateTime<Utc>>,
}

impl KeySet {
    /// Whether lookups may be served without refetching. An absent
    /// expiry counts as expired.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.keys.is_empty() && self.expires_at.is_some_and(|expiry| expiry > now)
    }
}

/// Fetches and caches the public verification keys, keyed by `kid`.
pub(crate) struct KeyCache {
    endpoint: String,
    client: reqwest::blocking::Client,
    set: RwLock<KeySet>,
    // Serializes refreshes; the fetch runs outside `set` so readers
    // keep being served stale data until the swap.
    refresh: Mutex<()>,
}

impl KeyCache {
    pub(crate) fn new() -> Self {
        Self::with_endpoint(KEYS_ENDPOINT)
    }

    pub(crate) fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::blocking::Client::new(),
            set: RwLock::new(KeySet::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Look `kid` up, refreshing the cached set first when it is
    /// missing, empty, expired, or does not know the id.
    ///
    /// `None` covers an unknown key and a failed refresh alike: either
    /// way the token cannot be verified and the caller should retry
    /// with a fresh one.
    pub(crate) fn get(&self, kid: &str) -> Option<DecodingKey> {
        {
            let set = self.set.read().unwrap_or_else(PoisonError::into_inner);
            if set.is_fresh(Utc::now()) {
                if let Some(key) = set.keys.get(kid) {
                    return Some(key.clone());
                }
            }
        }

        if let Err(err) = self.refresh() {
            warn!(%err, "failed to refresh public signing keys");
            return None;
        }

        let set = self.set.read().unwrap_or_else(PoisonError::into_inner);
        set.keys.get(kid).cloned()
    }

    /// Refetch the key set and its batch expiry, replacing both at
    /// once. Concurrent callers racing into this at worst duplicate
    /// the fetch.
    pub(crate) fn refresh(&self) -> Result<()> {
        let _refreshing = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);

        debug!(endpoint = %self.endpoint, "fetching public signing keys");
        let response = self.client.get(&self.endpoint).send()?.error_for_status()?;

        let expires_at = response
            .headers()
            .get(reqwest::header::EXPIRES)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|expiry| expiry.with_timezone(&Utc));

        let body: HashMap<String, String> = response.json()?;
        let mut keys = HashMap::with_capacity(body.len());
        for (kid, pem) in body {
            match DecodingKey::from_rsa_pem(pem.as_bytes()) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                // One unparsable entry must not block the rest of the
                // set from loading.
                Err(err) => warn!(%kid, %err, "skipping key with unparsable PEM"),
            }
        }

        let mut set = self.set.write().unwrap_or_else(PoisonError::into_inner);
        *set = KeySet { keys, expires_at };
        Ok(())
    }
}
