use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Which storage tier holds the credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    /// Survives restarts ("remember me").
    Durable,
    /// Cleared when the login session ends.
    Session,
}

impl Persistence {
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            Persistence::Durable
        } else {
            Persistence::Session
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Persistence::Durable => "durable",
            Persistence::Session => "session",
        }
    }
}

/// The persisted authentication record: `{"token": ..., "expire": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token: String,
    #[serde(deserialize_with = "deserialize_expire")]
    pub expire: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(token: impl Into<String>, expire: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expire,
        }
    }

    /// A record is invalid at or after its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expire - Utc::now()).num_minutes().max(0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExpire {
    Millis(i64),
    Text(String),
}

/// Accepts an ISO-8601 string or epoch milliseconds.
///
/// The backend serializes `java.util.Date`, which comes out as either form
/// depending on its Jackson settings.
pub(crate) fn deserialize_expire<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawExpire::deserialize(deserializer)? {
        RawExpire::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
        RawExpire::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| serde::de::Error::custom(format!("invalid expire '{}': {}", s, e))),
    }
}
