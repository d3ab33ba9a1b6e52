//! Implicit Grant (RFC 6749 §4.2).

use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use crate::client::{
    authorize_with_driver, build_authorization_request_uri, validate_authorization_endpoint,
    validate_redirection_endpoint, QueryParameters, ResponseParameters,
};
use crate::error::{OAuthError, Result};
use crate::http_client::Headers;
use crate::registry::{ExtensionRegistry, ProtocolExtension};
use crate::scope::Scope;
use crate::session::{AuthorizationRequestData, ImplicitSession, Session};
use crate::token_endpoint::expiry_from;
use crate::types::{AccessTokenData, AuthorizationFlow};

/// A client using the "Implicit" grant type. There is no Token Endpoint,
/// no client authentication and no refresh.
#[derive(Debug, Clone)]
pub struct ImplicitClient {
    client_id: String,
    authorization_endpoint: Url,
    registry: ExtensionRegistry,
}

impl ImplicitClient {
    pub fn new(client_id: impl Into<String>, authorization_endpoint: Url) -> Result<Self> {
        validate_authorization_endpoint(&authorization_endpoint)?;
        Ok(ImplicitClient {
            client_id: client_id.into(),
            authorization_endpoint,
            registry: ExtensionRegistry::with_builtin_errors(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.registry
    }

    pub fn register_protocol_extension(&mut self, extension: ProtocolExtension) -> Result<()> {
        self.registry.register(extension)
    }

    /// Builds the Authorization Request URI (§4.2.1) and the session that
    /// remembers it.
    pub fn authorization_request(
        &self,
        redirect_uri: Option<Url>,
        scope: Scope,
        state: impl Into<String>,
    ) -> Result<(Url, ImplicitSession)> {
        let state = state.into();
        let mut parameters = QueryParameters::new();
        parameters.insert("response_type".into(), vec!["token".into()]);
        parameters.insert("client_id".into(), vec![self.client_id.clone()]);
        if let Some(redirect_uri) = &redirect_uri {
            validate_redirection_endpoint(redirect_uri)?;
            parameters.insert("redirect_uri".into(), vec![redirect_uri.to_string()]);
        }
        if !scope.is_empty() {
            parameters.insert("scope".into(), vec![scope.to_string()]);
        }
        if !state.is_empty() {
            parameters.insert("state".into(), vec![state.clone()]);
        }

        let uri = build_authorization_request_uri(&self.authorization_endpoint, &parameters)?;
        debug!(client_id = %self.client_id, "built implicit grant request");
        Ok((
            uri,
            ImplicitSession::started(AuthorizationRequestData {
                redirect_uri,
                scope,
                state,
            }),
        ))
    }

    /// Reads the Access Token Response (§4.2.2) from the URI fragment the
    /// user agent handed back, and installs the token in the session.
    ///
    /// Getting the fragment from the browser to the server is up to the
    /// caller. A leading `#` is ignored.
    pub fn parse_authorization_response(&self, session: &mut ImplicitSession, fragment: &str) -> Result<()> {
        let parameters = ResponseParameters::from_form(fragment.strip_prefix('#').unwrap_or(fragment));
        parameters.check_state(&session.request.state)?;
        if let Some(error) = parameters.error_response(AuthorizationFlow::Implicit) {
            debug!(error = %error.error_code, "authorization server returned an error response");
            return Err(OAuthError::AuthorizationResponse(error));
        }

        let access_token = parameters.require("access_token")?.to_string();
        let token_type = parameters.require("token_type")?.to_string();
        let expires_at = parameters
            .get("expires_in")
            .map(|raw| {
                let seconds: f64 = raw.trim().parse().map_err(|err| {
                    OAuthError::protocol(format!("cannot parse response: cannot parse \"expires_in\" parameter: {err}"))
                })?;
                expiry_from(Utc::now(), seconds)
            })
            .transpose()?;
        // Some servers spell it "scopes".
        let scope = parameters
            .get("scope")
            .or_else(|| parameters.get("scopes"))
            .map(Scope::parse)
            .unwrap_or_else(|| session.request.scope.clone());

        session.set_access_token(AccessTokenData {
            access_token,
            token_type,
            expires_at,
            refresh_token: None,
            scope,
        });
        debug!("implicit grant access token received");
        Ok(())
    }

    /// Headers that authorize a resource request with the session's access
    /// token. Without refresh, an expired token fails with
    /// [`OAuthError::AccessTokenExpired`].
    pub fn authorization_for_resource_request<F>(&self, session: &ImplicitSession, body: F) -> Result<Headers>
    where
        F: FnOnce() -> Vec<u8>,
    {
        let token = session.access_token().ok_or(OAuthError::NoAccessToken)?;
        if self.registry.lookup_access_token_type(&token.token_type).is_none() {
            return Err(OAuthError::UnsupportedTokenType(token.token_type.clone()));
        }
        if token.is_expired() {
            warn!("implicit grant access token expired");
            return Err(OAuthError::AccessTokenExpired);
        }
        authorize_with_driver(&self.registry, token, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ImplicitClient {
        ImplicitClient::new("example-client", Url::parse("https://example.com/authz").unwrap()).unwrap()
    }

    fn session_for(client: &ImplicitClient, scope: &str) -> ImplicitSession {
        let (_, session) = client
            .authorization_request(None, Scope::parse(scope), "mystate")
            .unwrap();
        session
    }

    #[test]
    fn test_request_uses_token_response_type() {
        let (uri, _) = client()
            .authorization_request(Some(Url::parse("https://client.example.com/cb").unwrap()), Scope::new(), "s")
            .unwrap();
        let response_type = uri
            .query_pairs()
            .find(|(k, _)| k == "response_type")
            .map(|(_, v)| v.into_owned());
        assert_eq!(response_type.as_deref(), Some("token"));
    }

    #[test]
    fn test_fragment_success() {
        let client = client();
        let mut session = session_for(&client, "a b");
        session.clear_dirty();
        client
            .parse_authorization_response(&mut session, "#access_token=T&token_type=bearer&expires_in=60&state=mystate")
            .unwrap();
        assert!(session.is_dirty());
        let token = session.access_token().unwrap();
        assert_eq!(token.access_token, "T");
        assert_eq!(token.scope, Scope::parse("a b"));
        assert!(token.expires_at.is_some());
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn test_scopes_spelling_accepted() {
        let client = client();
        let mut session = session_for(&client, "a");
        client
            .parse_authorization_response(&mut session, "access_token=T&token_type=bearer&state=mystate&scopes=x+y")
            .unwrap();
        assert_eq!(session.access_token().unwrap().scope, Scope::parse("x y"));
    }

    #[test]
    fn test_state_checked_before_error() {
        let client = client();
        let mut session = session_for(&client, "");
        let err = client
            .parse_authorization_response(&mut session, "error=access_denied&state=other")
            .unwrap_err();
        assert!(err.is_xsrf());
    }

    #[test]
    fn test_relative_error_uri_keeps_error_response() {
        let client = client();
        let mut session = session_for(&client, "");
        let err = client
            .parse_authorization_response(&mut session, "#error=access_denied&error_uri=%2Fdocs%2Ferrors&state=mystate")
            .unwrap_err();
        assert!(!err.is_transport());
        let response = err.authorization_error_response().unwrap();
        assert_eq!(response.flow, AuthorizationFlow::Implicit);
        assert!(response.error_uri.is_none());
    }

    #[test]
    fn test_missing_token_type_rejected() {
        let client = client();
        let mut session = session_for(&client, "");
        let err = client
            .parse_authorization_response(&mut session, "access_token=T&state=mystate")
            .unwrap_err();
        assert!(err.is_transport());
        assert!(session.access_token().is_none());
    }

    #[test]
    fn test_bad_expires_in_rejected() {
        let client = client();
        let mut session = session_for(&client, "");
        let err = client
            .parse_authorization_response(&mut session, "access_token=T&token_type=bearer&expires_in=soon&state=mystate")
            .unwrap_err();
        assert!(matches!(err, OAuthError::Protocol(_)));
    }

    #[test]
    fn test_unregistered_token_type() {
        let client = client();
        let mut session = session_for(&client, "");
        client
            .parse_authorization_response(&mut session, "access_token=T&token_type=mac&state=mystate")
            .unwrap();
        let err = client.authorization_for_resource_request(&session, Vec::new).unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedTokenType(ref name) if name == "mac"));
    }
}
