//! Per-flow session state and a store to keep it between HTTP requests.
//!
//! The core borrows a session for the duration of a call and mutates it in
//! place. Every mutation sets the dirty flag; only the embedding application
//! clears it, usually right after persisting the session.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::scope::Scope;
use crate::types::AccessTokenData;

/// Behaviour shared by the session types of every grant client.
pub trait Session: Send + Sync {
    /// The access token currently held, if the flow got that far.
    fn access_token(&self) -> Option<&AccessTokenData>;

    /// Mutable access to the held token. Does not touch the dirty flag.
    fn access_token_mut(&mut self) -> Option<&mut AccessTokenData>;

    /// Installs a new token and marks the session dirty.
    fn set_access_token(&mut self, token: AccessTokenData);

    /// Whether the session changed since it was created, loaded or last
    /// cleaned.
    fn is_dirty(&self) -> bool;

    fn set_dirty(&mut self);

    fn clear_dirty(&mut self);
}

/// What the client sent to the Authorization Endpoint, kept so the response
/// and the token exchange can be checked against it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequestData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<Url>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub state: String,
}

macro_rules! impl_session {
    ($ty:ty) => {
        impl Session for $ty {
            fn access_token(&self) -> Option<&AccessTokenData> {
                self.current_access_token.as_ref()
            }

            fn access_token_mut(&mut self) -> Option<&mut AccessTokenData> {
                self.current_access_token.as_mut()
            }

            fn set_access_token(&mut self, token: AccessTokenData) {
                self.current_access_token = Some(token);
                self.dirty = true;
            }

            fn is_dirty(&self) -> bool {
                self.dirty
            }

            fn set_dirty(&mut self) {
                self.dirty = true;
            }

            fn clear_dirty(&mut self) {
                self.dirty = false;
            }
        }
    };
}

/// Session of an [`AuthorizationCodeClient`](crate::client::AuthorizationCodeClient).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCodeSession {
    pub request: AuthorizationRequestData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_access_token: Option<AccessTokenData>,
    #[serde(skip)]
    dirty: bool,
}

impl AuthorizationCodeSession {
    pub(crate) fn started(request: AuthorizationRequestData) -> Self {
        AuthorizationCodeSession {
            request,
            current_access_token: None,
            dirty: true,
        }
    }
}

impl_session!(AuthorizationCodeSession);

/// Session of an [`ImplicitClient`](crate::client::ImplicitClient).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImplicitSession {
    pub request: AuthorizationRequestData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_access_token: Option<AccessTokenData>,
    #[serde(skip)]
    dirty: bool,
}

impl ImplicitSession {
    pub(crate) fn started(request: AuthorizationRequestData) -> Self {
        ImplicitSession {
            request,
            current_access_token: None,
            dirty: true,
        }
    }
}

impl_session!(ImplicitSession);

/// Session of a [`PasswordClient`](crate::client::PasswordClient).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasswordSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_access_token: Option<AccessTokenData>,
    #[serde(skip)]
    dirty: bool,
}

impl PasswordSession {
    pub(crate) fn authenticated(token: AccessTokenData) -> Self {
        PasswordSession {
            current_access_token: Some(token),
            dirty: true,
        }
    }
}

impl_session!(PasswordSession);

/// Session of a [`ClientCredentialsClient`](crate::client::ClientCredentialsClient).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCredentialsSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_access_token: Option<AccessTokenData>,
    #[serde(skip)]
    dirty: bool,
}

impl ClientCredentialsSession {
    pub(crate) fn authenticated(token: AccessTokenData) -> Self {
        ClientCredentialsSession {
            current_access_token: Some(token),
            dirty: true,
        }
    }
}

impl_session!(ClientCredentialsSession);

/// Where the embedding application keeps sessions between requests.
///
/// Implementors provide `load`, `store` and `remove`; `save` only writes
/// dirty sessions and cleans them once written.
#[async_trait]
pub trait SessionStore<S>: Send + Sync + 'static
where
    S: Session + Clone + Serialize + DeserializeOwned + 'static,
{
    /// Loads a session. A loaded session is never dirty.
    async fn load(&self, id: &str) -> Result<Option<S>>;

    /// Unconditionally writes a session.
    async fn store(&self, id: &str, session: &S) -> Result<()>;

    async fn remove(&self, id: &str) -> Result<()>;

    /// Writes the session if it is dirty, then clears the flag. Returns
    /// whether anything was written.
    async fn save(&self, id: &str, session: &mut S) -> Result<bool> {
        if !session.is_dirty() {
            return Ok(false);
        }
        self.store(id, session).await?;
        session.clear_dirty();
        debug!(session_id = id, "saved dirty session");
        Ok(true)
    }
}

/// Process-local [`SessionStore`].
#[derive(Clone)]
pub struct InMemorySessionStore<S> {
    sessions: Arc<DashMap<String, S>>,
}

impl<S> InMemorySessionStore<S> {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S> Default for InMemorySessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S> SessionStore<S> for InMemorySessionStore<S>
where
    S: Session + Clone + Serialize + DeserializeOwned + 'static,
{
    async fn load(&self, id: &str) -> Result<Option<S>> {
        Ok(self.sessions.get(id).map(|entry| {
            let mut session = entry.value().clone();
            session.clear_dirty();
            session
        }))
    }

    async fn store(&self, id: &str, session: &S) -> Result<()> {
        self.sessions.insert(id.to_owned(), session.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessTokenData {
        AccessTokenData {
            access_token: "T".into(),
            token_type: "bearer".into(),
            expires_at: None,
            refresh_token: Some("R".into()),
            scope: Scope::parse("a b"),
        }
    }

    #[test]
    fn test_default_session_is_clean() {
        assert!(!AuthorizationCodeSession::default().is_dirty());
        assert!(!ImplicitSession::default().is_dirty());
        assert!(!PasswordSession::default().is_dirty());
        assert!(!ClientCredentialsSession::default().is_dirty());
    }

    #[test]
    fn test_set_access_token_marks_dirty() {
        let mut session = PasswordSession::default();
        session.set_access_token(token());
        assert!(session.is_dirty());
        assert_eq!(session.access_token().map(|t| t.access_token.as_str()), Some("T"));
    }

    #[test]
    fn test_deserialized_session_is_clean() {
        let mut session = AuthorizationCodeSession::started(AuthorizationRequestData {
            redirect_uri: Some(Url::parse("https://client.example.com/cb").unwrap()),
            scope: Scope::parse("a"),
            state: "mystate".into(),
        });
        session.set_access_token(token());
        assert!(session.is_dirty());

        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("dirty"));
        let loaded: AuthorizationCodeSession = serde_json::from_str(&json).unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.request, session.request);
        assert_eq!(loaded.current_access_token, session.current_access_token);
    }

    #[tokio::test]
    async fn test_store_saves_only_dirty_sessions() {
        let store = InMemorySessionStore::<ClientCredentialsSession>::new();
        let mut clean = ClientCredentialsSession::default();
        assert!(!store.save("a", &mut clean).await.unwrap());
        assert!(store.is_empty());

        let mut session = ClientCredentialsSession::authenticated(token());
        assert!(store.save("b", &mut session).await.unwrap());
        assert!(!session.is_dirty());

        let loaded = store.load("b").await.unwrap().unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.current_access_token, session.current_access_token);

        store.remove("b").await.unwrap();
        assert!(store.load("b").await.unwrap().is_none());
    }
}
