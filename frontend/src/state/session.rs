//! The authenticated-session record and its durable persistence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    api::types::{TokenResponse, User},
    utils::storage::{KeyValueStore, StorageError},
};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Builds a session from a token response. The expiry is always
    /// `now + expiresIn`, never an absolute server clock value.
    pub fn issue(tokens: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: tokens.user,
            expires_at: now + Duration::seconds(tokens.expires_in.max(0)),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("stored session is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Reads and writes the four session keys:
/// `<prefix>`, `<prefix>_refresh`, `<prefix>_expires` and `<user-prefix>`.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    token_key: String,
    refresh_key: String,
    expires_key: String,
    user_key: String,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, token_prefix: &str, user_key: &str) -> Self {
        Self {
            storage,
            token_key: token_prefix.to_string(),
            refresh_key: format!("{}_refresh", token_prefix),
            expires_key: format!("{}_expires", token_prefix),
            user_key: user_key.to_string(),
        }
    }

    fn keys(&self) -> [&str; 4] {
        [
            self.token_key.as_str(),
            self.refresh_key.as_str(),
            self.expires_key.as_str(),
            self.user_key.as_str(),
        ]
    }

    /// Writes every field. A failed write rolls back all four keys.
    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let user_json = serde_json::to_string(&session.user)
            .map_err(|e| SessionStoreError::Corrupt(e.to_string()))?;
        let expires = session.expires_at.to_rfc3339();
        let result = self
            .storage
            .set_item(&self.token_key, &session.access_token)
            .and_then(|_| {
                self.storage
                    .set_item(&self.refresh_key, &session.refresh_token)
            })
            .and_then(|_| self.storage.set_item(&self.expires_key, &expires))
            .and_then(|_| self.storage.set_item(&self.user_key, &user_json));

        if let Err(err) = result {
            tracing::warn!(error = %err, "Session write failed; rolling back stored session");
            let _ = self.clear();
            return Err(err.into());
        }
        Ok(())
    }

    /// `Ok(None)` when nothing is stored; `Corrupt` when the stored fields
    /// are incomplete or unparsable.
    pub fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let access_token = self.storage.get_item(&self.token_key)?;
        let refresh_token = self.storage.get_item(&self.refresh_key)?;
        let expires = self.storage.get_item(&self.expires_key)?;
        let user = self.storage.get_item(&self.user_key)?;

        let (access_token, refresh_token, expires, user) =
            match (access_token, refresh_token, expires, user) {
                (None, None, None, None) => return Ok(None),
                (Some(a), Some(r), Some(e), Some(u)) => (a, r, e, u),
                _ => {
                    return Err(SessionStoreError::Corrupt(
                        "incomplete session fields".into(),
                    ))
                }
            };

        let expires_at = DateTime::parse_from_rfc3339(&expires)
            .map_err(|e| SessionStoreError::Corrupt(format!("expiry: {}", e)))?
            .with_timezone(&Utc);
        let user: User = serde_json::from_str(&user)
            .map_err(|e| SessionStoreError::Corrupt(format!("user: {}", e)))?;

        Ok(Some(Session {
            access_token,
            refresh_token,
            user,
            expires_at,
        }))
    }

    /// Removes all four keys, attempting each even if one fails.
    pub fn clear(&self) -> Result<(), SessionStoreError> {
        let mut first_error = None;
        for key in self.keys() {
            if let Err(err) = self.storage.remove_item(key) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_non_empty(&self.token_key)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_non_empty(&self.refresh_key)
    }

    fn read_non_empty(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(err) => {
                tracing::warn!(key, error = %err, "Failed to read session key");
                None
            }
        }
    }
}
