//! Authorization Code Grant (RFC 6749 §4.1).

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use crate::client::{
    build_authorization_request_uri, validate_authorization_endpoint, validate_redirection_endpoint, ExplicitClient,
    QueryParameters, ResponseParameters, RESERVED_AUTHORIZATION_PARAMETERS,
};
use crate::client_auth::{ClientAuthenticationMethod, Form};
use crate::error::{OAuthError, Result};
use crate::http_client::{Headers, HttpExecutor};
use crate::registry::{ExtensionRegistry, ProtocolExtension};
use crate::scope::Scope;
use crate::session::{AuthorizationCodeSession, AuthorizationRequestData, Session};
use crate::types::{AccessTokenData, AuthorizationFlow};

/// A client using the "Authorization Code" grant type.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use liboauth2::{AuthorizationCodeClient, HttpBasicAuth, InMemoryHttpClient, QueryParameters, Scope};
/// use url::Url;
///
/// let client = AuthorizationCodeClient::new(
///     "example-client",
///     Url::parse("https://as.example/authz").unwrap(),
///     Url::parse("https://as.example/token").unwrap(),
///     Some(Arc::new(HttpBasicAuth::new("example-client", "secret"))),
///     Arc::new(InMemoryHttpClient::new()),
/// )
/// .unwrap();
/// let (uri, session) = client
///     .authorization_request(None, Scope::parse("read"), "xyz", QueryParameters::new())
///     .unwrap();
/// assert!(uri.as_str().starts_with("https://as.example/authz?"));
/// assert_eq!(session.request.state, "xyz");
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationCodeClient {
    client_id: String,
    authorization_endpoint: Url,
    explicit: ExplicitClient,
}

impl AuthorizationCodeClient {
    pub fn new(
        client_id: impl Into<String>,
        authorization_endpoint: Url,
        token_endpoint: Url,
        client_auth: Option<Arc<dyn ClientAuthenticationMethod>>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self> {
        validate_authorization_endpoint(&authorization_endpoint)?;
        Ok(AuthorizationCodeClient {
            client_id: client_id.into(),
            authorization_endpoint,
            explicit: ExplicitClient::new(token_endpoint, client_auth, executor)?,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn authorization_endpoint(&self) -> &Url {
        &self.authorization_endpoint
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        self.explicit.registry()
    }

    pub fn registry_mut(&mut self) -> &mut ExtensionRegistry {
        self.explicit.registry_mut()
    }

    pub fn register_protocol_extension(&mut self, extension: ProtocolExtension) -> Result<()> {
        self.explicit.register_protocol_extension(extension)
    }

    /// Builds the Authorization Request URI the user agent should be sent
    /// to (§4.1.1), and the session that remembers what was asked for.
    ///
    /// `redirect_uri` may be left out only if exactly one complete
    /// Redirection Endpoint is registered with the Authorization Server.
    /// An empty `scope` or `state` is not sent. `extra_params` may not name
    /// a parameter this method sets itself.
    pub fn authorization_request(
        &self,
        redirect_uri: Option<Url>,
        scope: Scope,
        state: impl Into<String>,
        extra_params: QueryParameters,
    ) -> Result<(Url, AuthorizationCodeSession)> {
        let state = state.into();
        let mut parameters = QueryParameters::new();
        for (name, values) in extra_params {
            if RESERVED_AUTHORIZATION_PARAMETERS.contains(&name.as_str()) {
                return Err(OAuthError::InvalidAuthorizationRequest(format!(
                    "extra parameter {name:?} would override a built-in parameter"
                )));
            }
            parameters.insert(name, values);
        }
        parameters.insert("response_type".into(), vec!["code".into()]);
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
        let session = AuthorizationCodeSession::started(AuthorizationRequestData {
            redirect_uri,
            scope,
            state,
        });
        debug!(client_id = %self.client_id, "built authorization code request");
        Ok((uri, session))
    }

    /// Reads the Authorization Response (§4.1.2) from the URI the user
    /// agent was redirected to, returning the authorization code.
    ///
    /// The state is verified before anything else; a mismatch is
    /// [`OAuthError::StateMismatch`]. An error sent by the server comes back
    /// as [`OAuthError::AuthorizationResponse`].
    pub fn parse_authorization_response(&self, session: &AuthorizationCodeSession, request_uri: &Url) -> Result<String> {
        let parameters = ResponseParameters::from_query(request_uri);
        parameters.check_state(&session.request.state)?;
        if let Some(error) = parameters.error_response(AuthorizationFlow::AuthorizationCode) {
            debug!(error = %error.error_code, "authorization server returned an error response");
            return Err(OAuthError::AuthorizationResponse(error));
        }
        Ok(parameters.require("code")?.to_string())
    }

    /// Exchanges an authorization code for an access token (§4.1.3) and
    /// installs it in the session.
    #[instrument(skip(self, session, code), fields(client_id = %self.client_id), level = "debug")]
    pub async fn access_token(&self, session: &mut AuthorizationCodeSession, code: &str) -> Result<()> {
        let mut form = Form::new();
        form.insert("grant_type".into(), "authorization_code".into());
        form.insert("code".into(), code.to_string());
        if let Some(redirect_uri) = &session.request.redirect_uri {
            form.insert("redirect_uri".into(), redirect_uri.to_string());
        }
        if !self.explicit.token_endpoint().authenticates_client() {
            form.insert("client_id".into(), self.client_id.clone());
        }

        let response = self.explicit.post_form(form).await?;
        session.set_access_token(AccessTokenData::from_response(response, &session.request.scope));
        debug!("authorization code exchanged for an access token");
        Ok(())
    }

    /// See [`ExplicitClient::refresh`].
    pub async fn refresh(&self, session: &mut AuthorizationCodeSession, scope: Option<&Scope>) -> Result<()> {
        self.explicit.refresh(session, scope).await
    }

    /// See [`ExplicitClient::authorization_for_resource_request`].
    pub async fn authorization_for_resource_request<F>(
        &self,
        session: &mut AuthorizationCodeSession,
        body: F,
    ) -> Result<Headers>
    where
        F: FnOnce() -> Vec<u8> + Send,
    {
        self.explicit.authorization_for_resource_request(session, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::InMemoryHttpClient;

    fn client() -> AuthorizationCodeClient {
        AuthorizationCodeClient::new(
            "example-client",
            Url::parse("https://example.com/authz").unwrap(),
            Url::parse("https://example.com/token").unwrap(),
            None,
            Arc::new(InMemoryHttpClient::new()),
        )
        .unwrap()
    }

    fn session(state: &str) -> AuthorizationCodeSession {
        AuthorizationCodeSession::started(AuthorizationRequestData {
            redirect_uri: None,
            scope: Scope::new(),
            state: state.to_string(),
        })
    }

    #[test]
    fn test_reserved_extra_parameter_rejected() {
        for name in RESERVED_AUTHORIZATION_PARAMETERS {
            let mut extra = QueryParameters::new();
            extra.insert(name.to_string(), vec!["x".into()]);
            let err = client()
                .authorization_request(None, Scope::new(), "s", extra)
                .unwrap_err();
            assert!(matches!(err, OAuthError::InvalidAuthorizationRequest(_)), "{name}");
        }
    }

    #[test]
    fn test_empty_scope_and_state_not_sent() {
        let (uri, session) = client()
            .authorization_request(None, Scope::new(), "", QueryParameters::new())
            .unwrap();
        let names: Vec<String> = uri.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(names, vec!["client_id", "response_type"]);
        assert!(session.is_dirty());
    }

    #[test]
    fn test_error_response_is_typed() {
        let uri = Url::parse(
            "https://client.example.com/cb?state=s&error=access_denied&error_description=nope&error_uri=https%3A%2F%2Fas.example%2Fdoc",
        )
        .unwrap();
        let err = client().parse_authorization_response(&session("s"), &uri).unwrap_err();
        let response = err.authorization_error_response().unwrap();
        assert_eq!(response.flow, AuthorizationFlow::AuthorizationCode);
        assert_eq!(response.error_code, "access_denied");
        assert_eq!(response.error_description.as_deref(), Some("nope"));
        assert_eq!(response.error_uri.as_ref().map(Url::as_str), Some("https://as.example/doc"));
        assert!(err.is_server_error_response());
        assert!(client().registry().describe_authorization_error(response).is_some());
    }

    #[test]
    fn test_relative_error_uri_keeps_error_response() {
        let uri = Url::parse("https://client.example.com/cb?state=s&error=access_denied&error_uri=%2Fdocs%2Ferrors").unwrap();
        let err = client().parse_authorization_response(&session("s"), &uri).unwrap_err();
        assert!(err.is_server_error_response());
        assert!(!err.is_transport());
        let response = err.authorization_error_response().unwrap();
        assert_eq!(response.error_code, "access_denied");
        assert!(response.error_uri.is_none());
    }

    #[test]
    fn test_missing_code_is_protocol_error() {
        let uri = Url::parse("https://client.example.com/cb?state=s").unwrap();
        let err = client().parse_authorization_response(&session("s"), &uri).unwrap_err();
        assert!(matches!(err, OAuthError::Protocol(_)));
    }

    #[test]
    fn test_first_code_wins() {
        let uri = Url::parse("https://client.example.com/cb?code=a&state=s&code=b").unwrap();
        assert_eq!(client().parse_authorization_response(&session("s"), &uri).unwrap(), "a");
    }
}
