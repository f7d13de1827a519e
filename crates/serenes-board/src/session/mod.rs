use chrono::Utc;
use thiserror::Error;

use crate::config::AuthMode;
use crate::models::{keys, Session};
use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("External identity required")]
    MissingExternalIdentity,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads and writes the single active session of a storage scope.
#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    mode: AuthMode,
}

impl SessionManager {
    pub fn new(store: Store, mode: AuthMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Start a pre-approval session for an external identity.
    pub fn login(&self, external_id: &str) -> Result<Session, SessionError> {
        if external_id.is_empty() {
            return Err(SessionError::MissingExternalIdentity);
        }
        let session = Session {
            external_id: external_id.to_string(),
            member_id: None,
            login_at: Utc::now(),
        };
        self.replace_session(keys::SESSION, &session)?;
        log::info!("Session started for {}", external_id);
        Ok(session)
    }

    /// Start a post-approval session carrying the member id.
    /// In member-id-only mode the external identity may be empty.
    pub fn login_member(&self, external_id: &str, member_id: &str) -> Result<Session, SessionError> {
        if member_id.is_empty() {
            return Err(SessionError::NotAuthenticated);
        }
        if self.mode == AuthMode::ExternalIdentityRequired && external_id.is_empty() {
            return Err(SessionError::MissingExternalIdentity);
        }
        let session = Session {
            external_id: external_id.to_string(),
            member_id: Some(member_id.to_string()),
            login_at: Utc::now(),
        };
        self.replace_session(keys::MEMBER_SESSION, &session)?;
        log::info!("Member session started for {}", member_id);
        Ok(session)
    }

    /// Write `session` under `key` and drop whatever the other session keys
    /// hold, so only one session is ever active.
    fn replace_session(&self, key: &str, session: &Session) -> Result<(), SessionError> {
        for other in keys::MEMBER_SESSION_KEYS.iter().filter(|k| **k != key) {
            self.store.remove(other)?;
        }
        self.store.save(key, session)?;
        Ok(())
    }

    /// The member session, if any of the member-session keys holds one.
    pub fn member_session(&self) -> Option<Session> {
        keys::MEMBER_SESSION_KEYS.iter().find_map(|key| {
            self.store
                .load::<Option<Session>>(key, None)
                .filter(Session::is_member)
        })
    }

    /// The session that counts as logged in under the configured mode.
    pub fn current(&self) -> Option<Session> {
        match self.mode {
            AuthMode::MemberIdOnly => self.member_session(),
            AuthMode::ExternalIdentityRequired => self
                .member_session()
                .filter(|s| !s.external_id.is_empty())
                .or_else(|| self.store.load::<Option<Session>>(keys::SESSION, None))
                .filter(|s| !s.external_id.is_empty()),
        }
    }

    /// Like `current`, but a missing session is an error the caller turns
    /// into a redirect to the login page.
    pub fn require_login(&self) -> Result<Session, SessionError> {
        self.current().ok_or(SessionError::NotAuthenticated)
    }

    /// Drop every session key, including legacy ones.
    pub fn logout(&self) -> Result<(), SessionError> {
        for key in keys::MEMBER_SESSION_KEYS {
            self.store.remove(key)?;
        }
        log::debug!("Session cleared");
        Ok(())
    }
}
