//! What every client that talks to a Token Endpoint shares: the endpoint,
//! the extension registry, refresh (RFC 6749 §6) and authorizing resource
//! requests (§7).

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use url::Url;

use crate::client::authorize_with_driver;
use crate::client_auth::{ClientAuthenticationMethod, Form};
use crate::error::{OAuthError, Result};
use crate::http_client::{Headers, HttpExecutor};
use crate::registry::{ExtensionRegistry, ProtocolExtension};
use crate::scope::Scope;
use crate::session::Session;
use crate::token_endpoint::TokenEndpoint;
use crate::types::TokenResponse;

/// Token Endpoint half of a grant client.
#[derive(Debug, Clone)]
pub struct ExplicitClient {
    token_endpoint: TokenEndpoint,
    registry: ExtensionRegistry,
}

impl ExplicitClient {
    pub fn new(
        token_endpoint: Url,
        client_auth: Option<Arc<dyn ClientAuthenticationMethod>>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self> {
        Ok(ExplicitClient {
            token_endpoint: TokenEndpoint::new(token_endpoint, client_auth, executor)?,
            registry: ExtensionRegistry::with_builtin_errors(),
        })
    }

    pub fn token_endpoint(&self) -> &TokenEndpoint {
        &self.token_endpoint
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Setup-time access to the registry.
    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    pub fn register_protocol_extension(&mut self, extension: ProtocolExtension) -> Result<()> {
        self.registry.register(extension)
    }

    pub(crate) async fn post_form(&self, form: Form) -> Result<TokenResponse> {
        self.token_endpoint.request(form).await
    }

    /// Trades the session's refresh token for a new access token (RFC 6749
    /// §6), optionally narrowing the scope.
    ///
    /// A refresh token or scope the server leaves out of its response is
    /// carried over from the current token. On failure the session is left
    /// untouched.
    #[instrument(skip(self, session, scope), level = "debug")]
    pub async fn refresh<S: Session>(&self, session: &mut S, scope: Option<&Scope>) -> Result<()> {
        let refresh_token = {
            let token = session.access_token().ok_or(OAuthError::NoAccessToken)?;
            token.refresh_token.clone().ok_or(OAuthError::NoRefreshToken)?
        };

        let mut form = Form::new();
        form.insert("grant_type".into(), "refresh_token".into());
        form.insert("refresh_token".into(), refresh_token);
        if let Some(scope) = scope.filter(|scope| !scope.is_empty()) {
            form.insert("scope".into(), scope.to_string());
        }

        let response = self.post_form(form).await?;
        if let Some(token) = session.access_token_mut() {
            token.apply_refresh(response);
        }
        session.set_dirty();
        debug!("access token refreshed");
        Ok(())
    }

    /// Headers that authorize a resource request with the session's access
    /// token.
    ///
    /// An expired token is refreshed first when the session holds a refresh
    /// token; otherwise, or if the refresh fails, this fails with
    /// [`OAuthError::AccessTokenExpired`]. `body` is only called when the
    /// token type needs the request body.
    #[instrument(skip(self, session, body), level = "debug")]
    pub async fn authorization_for_resource_request<S, F>(&self, session: &mut S, body: F) -> Result<Headers>
    where
        S: Session,
        F: FnOnce() -> Vec<u8> + Send,
    {
        let (token_type, expired, refreshable) = {
            let token = session.access_token().ok_or(OAuthError::NoAccessToken)?;
            (token.token_type.clone(), token.is_expired(), token.refresh_token.is_some())
        };
        if self.registry.lookup_access_token_type(&token_type).is_none() {
            return Err(OAuthError::UnsupportedTokenType(token_type));
        }

        if expired {
            if !refreshable {
                warn!("access token expired and no refresh token is available");
                return Err(OAuthError::AccessTokenExpired);
            }
            if let Err(err) = self.refresh(session, None).await {
                warn!(error = %err, "refreshing expired access token failed");
                return Err(OAuthError::AccessTokenExpired);
            }
        }

        let token = session.access_token().ok_or(OAuthError::NoAccessToken)?;
        authorize_with_driver(&self.registry, token, body)
    }
}
