use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::credential::{CredentialRecord, Persistence};
use super::tier::{StorageError, StorageTier};

/// Well-known key the credential record is stored under in both tiers.
pub const TOKEN_KEY: &str = "haibara-token";

/// Owns the persisted bearer token across a durable and a session tier.
///
/// Storage anomalies never reach callers of [`TokenStore::read`]: a missing,
/// unreadable or malformed record reads as "logged out", and an expired one
/// is cleared from both tiers on the spot.
pub struct TokenStore {
    durable: Box<dyn StorageTier>,
    session: Box<dyn StorageTier>,
}

impl TokenStore {
    pub fn new(durable: Box<dyn StorageTier>, session: Box<dyn StorageTier>) -> Self {
        Self { durable, session }
    }

    fn tier(&self, persistence: Persistence) -> &dyn StorageTier {
        match persistence {
            Persistence::Durable => self.durable.as_ref(),
            Persistence::Session => self.session.as_ref(),
        }
    }

    /// Persist a new credential, replacing whatever either tier held.
    pub fn write(
        &self,
        token: &str,
        expire: DateTime<Utc>,
        persistence: Persistence,
    ) -> Result<(), StorageError> {
        let record = CredentialRecord::new(token, expire);
        let contents = serde_json::to_string(&record)?;

        self.tier(persistence).set(TOKEN_KEY, &contents)?;

        // A record left in the other tier would shadow or outlive this one
        let other = match persistence {
            Persistence::Durable => Persistence::Session,
            Persistence::Session => Persistence::Durable,
        };
        if let Err(e) = self.tier(other).remove(TOKEN_KEY) {
            warn!(tier = other.label(), error = %e, "Failed to remove stale credential");
        }

        debug!(tier = persistence.label(), expire = %expire, "Credential stored");
        Ok(())
    }

    /// Current token if one is stored and unexpired.
    pub fn read(&self) -> Option<String> {
        self.record().map(|(record, _)| record.token)
    }

    /// Current record and the tier it came from, with the same rules as [`read`](Self::read).
    pub fn record(&self) -> Option<(CredentialRecord, Persistence)> {
        let (contents, persistence) = self
            .load_raw(Persistence::Durable)
            .map(|c| (c, Persistence::Durable))
            .or_else(|| {
                self.load_raw(Persistence::Session)
                    .map(|c| (c, Persistence::Session))
            })?;

        let record: CredentialRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!(tier = persistence.label(), error = %e, "Malformed credential record, treating as absent");
                return None;
            }
        };

        if record.is_expired() {
            warn!(expire = %record.expire, "Login has expired, please log in again");
            self.clear();
            return None;
        }

        Some((record, persistence))
    }

    fn load_raw(&self, persistence: Persistence) -> Option<String> {
        match self.tier(persistence).get(TOKEN_KEY) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(tier = persistence.label(), error = %e, "Failed to read credential");
                None
            }
        }
    }

    /// Remove the credential from both tiers. Safe to call repeatedly.
    pub fn clear(&self) {
        for persistence in [Persistence::Durable, Persistence::Session] {
            if let Err(e) = self.tier(persistence).remove(TOKEN_KEY) {
                warn!(tier = persistence.label(), error = %e, "Failed to clear credential");
            }
        }
        debug!("Credential cleared");
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }
}
