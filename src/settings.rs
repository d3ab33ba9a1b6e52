//! Client configuration
//!
//! Serde-friendly descriptions of a client registration and of the bundled
//! HTTP transport, loadable from whatever configuration format the
//! embedding application already uses. Builders turn a [`ClientSettings`]
//! into any of the grant clients.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{AuthorizationCodeClient, ClientCredentialsClient, ImplicitClient, PasswordClient};
use crate::client_auth::{ClientAuthenticationMethod, ClientSecretPost, HttpBasicAuth};
use crate::error::{OAuthError, Result};
use crate::http_client::{HttpExecutor, RedirectPolicy};

/// Default request timeout (30 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on a Token Endpoint response body (1 MiB)
const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Token Endpoint replies are never redirected by default
const DEFAULT_MAX_REDIRECTS: u32 = 0;

/// How the client authenticates to the Token Endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClientAuthSettings {
    /// Public client; `client_id` is sent in the form where the grant needs it.
    #[default]
    None,
    /// `client_secret_basic`
    Basic { client_secret: String },
    /// `client_secret_post`
    Post { client_secret: String },
}

impl ClientAuthSettings {
    fn method_name(&self) -> &'static str {
        match self {
            ClientAuthSettings::None => "none",
            ClientAuthSettings::Basic { .. } => "basic",
            ClientAuthSettings::Post { .. } => "post",
        }
    }
}

impl std::fmt::Debug for ClientAuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method_name())
    }
}

/// A client registration with an Authorization Server.
///
/// # Example
/// ```
/// use liboauth2::settings::ClientSettings;
///
/// let settings: ClientSettings = serde_json::from_str(r#"{
///     "client_id": "example-client",
///     "authorization_endpoint": "https://as.example/authz",
///     "token_endpoint": "https://as.example/token",
///     "client_auth": { "method": "basic", "client_secret": "s3cret" }
/// }"#).unwrap();
/// assert!(settings.client_authentication().is_some());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub client_id: String,
    /// Needed by the authorization code and implicit grants
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<Url>,
    /// Needed by every grant except implicit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<Url>,
    #[serde(default)]
    pub client_auth: ClientAuthSettings,
}

impl ClientSettings {
    pub fn new(client_id: impl Into<String>) -> Self {
        ClientSettings {
            client_id: client_id.into(),
            authorization_endpoint: None,
            token_endpoint: None,
            client_auth: ClientAuthSettings::None,
        }
    }

    pub fn with_authorization_endpoint(mut self, endpoint: Url) -> Self {
        self.authorization_endpoint = Some(endpoint);
        self
    }

    pub fn with_token_endpoint(mut self, endpoint: Url) -> Self {
        self.token_endpoint = Some(endpoint);
        self
    }

    pub fn with_client_auth(mut self, client_auth: ClientAuthSettings) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// The configured client authentication method, if any.
    pub fn client_authentication(&self) -> Option<Arc<dyn ClientAuthenticationMethod>> {
        let method: Arc<dyn ClientAuthenticationMethod> = match &self.client_auth {
            ClientAuthSettings::None => return None,
            ClientAuthSettings::Basic { client_secret } => {
                Arc::new(HttpBasicAuth::new(self.client_id.clone(), client_secret.clone()))
            }
            ClientAuthSettings::Post { client_secret } => {
                Arc::new(ClientSecretPost::new(self.client_id.clone(), client_secret.clone()))
            }
        };
        Some(method)
    }

    pub fn authorization_code_client(&self, executor: Arc<dyn HttpExecutor>) -> Result<AuthorizationCodeClient> {
        AuthorizationCodeClient::new(
            self.client_id.clone(),
            self.require_authorization_endpoint()?,
            self.require_token_endpoint()?,
            self.client_authentication(),
            executor,
        )
    }

    pub fn implicit_client(&self) -> Result<ImplicitClient> {
        ImplicitClient::new(self.client_id.clone(), self.require_authorization_endpoint()?)
    }

    pub fn password_client(&self, executor: Arc<dyn HttpExecutor>) -> Result<PasswordClient> {
        PasswordClient::new(self.require_token_endpoint()?, self.client_authentication(), executor)
    }

    pub fn client_credentials_client(&self, executor: Arc<dyn HttpExecutor>) -> Result<ClientCredentialsClient> {
        ClientCredentialsClient::new(self.require_token_endpoint()?, self.client_authentication(), executor)
    }

    fn require_authorization_endpoint(&self) -> Result<Url> {
        self.authorization_endpoint
            .clone()
            .ok_or_else(|| OAuthError::InvalidClient("no authorization endpoint configured".to_string()))
    }

    fn require_token_endpoint(&self) -> Result<Url> {
        self.token_endpoint
            .clone()
            .ok_or_else(|| OAuthError::InvalidClient("no token endpoint configured".to_string()))
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("client_id", &self.client_id)
            .field("authorization_endpoint", &self.authorization_endpoint.as_ref().map(Url::as_str))
            .field("token_endpoint", &self.token_endpoint.as_ref().map(Url::as_str))
            .field("client_auth", &self.client_auth)
            .finish()
    }
}

/// Transport settings for the bundled HTTP executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientSettings {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// Responses larger than this are a transport error
    pub max_body_size: usize,
    /// Redirects followed; 0 disables following
    pub max_redirects: u32,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        HttpClientSettings {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

impl HttpClientSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn redirect_policy(&self) -> RedirectPolicy {
        match self.max_redirects {
            0 => RedirectPolicy::None,
            n => RedirectPolicy::Limit(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::InMemoryHttpClient;

    fn executor() -> Arc<dyn HttpExecutor> {
        Arc::new(InMemoryHttpClient::new())
    }

    #[test]
    fn test_http_defaults() {
        let settings: HttpClientSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, HttpClientSettings::default());
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert_eq!(settings.redirect_policy(), RedirectPolicy::None);

        let settings: HttpClientSettings = serde_json::from_str(r#"{"max_redirects": 3}"#).unwrap();
        assert_eq!(settings.redirect_policy(), RedirectPolicy::Limit(3));
    }

    #[test]
    fn test_client_auth_defaults_to_none() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"client_id": "c", "token_endpoint": "https://as.example/token"}"#).unwrap();
        assert_eq!(settings.client_auth, ClientAuthSettings::None);
        assert!(settings.password_client(executor()).is_ok());
        assert!(matches!(
            settings.client_credentials_client(executor()),
            Err(OAuthError::InvalidClient(_))
        ));
        assert!(matches!(settings.implicit_client(), Err(OAuthError::InvalidClient(_))));
    }

    #[test]
    fn test_builders_validate_endpoints() {
        let settings = ClientSettings::new("c")
            .with_authorization_endpoint(Url::parse("https://as.example/authz#nope").unwrap())
            .with_token_endpoint(Url::parse("https://as.example/token").unwrap())
            .with_client_auth(ClientAuthSettings::Post {
                client_secret: "s".into(),
            });
        assert!(matches!(
            settings.authorization_code_client(executor()),
            Err(OAuthError::InvalidEndpoint { .. })
        ));
        assert!(settings.client_credentials_client(executor()).is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let settings = ClientSettings::new("c").with_client_auth(ClientAuthSettings::Basic {
            client_secret: "hunter2".into(),
        });
        assert!(!format!("{settings:?}").contains("hunter2"));
    }
}
