use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::Token;

/// Authorization context of one client instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub request_token: Option<Token>,
    pub access_token: Option<Token>,
    pub session_handle: Option<String>,
    /// Advisory only; nothing refreshes on expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthState {
    /// Overwrites exactly the fields the patch names.
    pub fn merge(&mut self, patch: StatePatch) {
        if let Some(request_token) = patch.request_token {
            self.request_token = request_token;
        }
        if let Some(access_token) = patch.access_token {
            self.access_token = access_token;
        }
        if let Some(session_handle) = patch.session_handle {
            self.session_handle = session_handle;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = expires_at;
        }
    }
}

/// A partial [`OAuthState`].
///
/// Fields never set on the patch are left alone by the merge; passing
/// `None` to a setter clears that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    request_token: Option<Option<Token>>,
    access_token: Option<Option<Token>>,
    session_handle: Option<Option<String>>,
    expires_at: Option<Option<DateTime<Utc>>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn request_token(self, token: impl Into<Option<Token>>) -> Self {
        StatePatch {
            request_token: Some(token.into()),
            ..self
        }
    }

    pub fn access_token(self, token: impl Into<Option<Token>>) -> Self {
        StatePatch {
            access_token: Some(token.into()),
            ..self
        }
    }

    pub fn session_handle<T: Into<String>>(self, handle: Option<T>) -> Self {
        StatePatch {
            session_handle: Some(handle.map(Into::into)),
            ..self
        }
    }

    pub fn expires_at(self, expires_at: impl Into<Option<DateTime<Utc>>>) -> Self {
        StatePatch {
            expires_at: Some(expires_at.into()),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &StatePatch::default()
    }
}

impl From<OAuthState> for StatePatch {
    /// A patch that replaces every field, e.g. to restore a persisted state.
    fn from(state: OAuthState) -> Self {
        StatePatch {
            request_token: Some(state.request_token),
            access_token: Some(state.access_token),
            session_handle: Some(state.session_handle),
            expires_at: Some(state.expires_at),
        }
    }
}

/// Holds the state behind a lock so every merge lands as a whole.
#[derive(Debug, Default)]
pub(crate) struct StateStore {
    inner: RwLock<OAuthState>,
}

impl StateStore {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn get(&self) -> OAuthState {
        self.inner.read().clone()
    }

    pub(crate) fn set(&self, patch: StatePatch) {
        self.inner.write().merge(patch);
    }

    pub(crate) fn request_token(&self) -> Option<Token> {
        self.inner.read().request_token.clone()
    }

    pub(crate) fn access_token(&self) -> Option<Token> {
        self.inner.read().access_token.clone()
    }

    /// Access token and session handle read under one lock.
    pub(crate) fn refresh_credentials(&self) -> (Option<Token>, Option<String>) {
        let state = self.inner.read();
        (state.access_token.clone(), state.session_handle.clone())
    }
}
