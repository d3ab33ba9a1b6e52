//! Client Credentials Grant (RFC 6749 §4.4).

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use crate::client::ExplicitClient;
use crate::client_auth::{ClientAuthenticationMethod, Form};
use crate::error::{OAuthError, Result};
use crate::http_client::{Headers, HttpExecutor};
use crate::registry::{ExtensionRegistry, ProtocolExtension};
use crate::scope::Scope;
use crate::session::ClientCredentialsSession;
use crate::types::AccessTokenData;

/// A client using the "Client Credentials" grant type. Only confidential
/// clients can use it, so a client authentication method is required.
#[derive(Debug, Clone)]
pub struct ClientCredentialsClient {
    explicit: ExplicitClient,
}

impl ClientCredentialsClient {
    pub fn new(
        token_endpoint: Url,
        client_auth: Option<Arc<dyn ClientAuthenticationMethod>>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self> {
        if client_auth.is_none() {
            return Err(OAuthError::InvalidClient(
                "the client credentials grant requires a client authentication method".to_string(),
            ));
        }
        Ok(ClientCredentialsClient {
            explicit: ExplicitClient::new(token_endpoint, client_auth, executor)?,
        })
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

    /// Requests an access token for the client itself (§4.4.2).
    #[instrument(skip(self, scope), level = "debug")]
    pub async fn access_token(&self, scope: &Scope) -> Result<ClientCredentialsSession> {
        let mut form = Form::new();
        form.insert("grant_type".into(), "client_credentials".into());
        if !scope.is_empty() {
            form.insert("scope".into(), scope.to_string());
        }

        let response = self.explicit.post_form(form).await?;
        debug!("client credentials grant issued an access token");
        Ok(ClientCredentialsSession::authenticated(AccessTokenData::from_response(response, scope)))
    }

    /// See [`ExplicitClient::refresh`].
    pub async fn refresh(&self, session: &mut ClientCredentialsSession, scope: Option<&Scope>) -> Result<()> {
        self.explicit.refresh(session, scope).await
    }

    /// See [`ExplicitClient::authorization_for_resource_request`].
    pub async fn authorization_for_resource_request<F>(
        &self,
        session: &mut ClientCredentialsSession,
        body: F,
    ) -> Result<Headers>
    where
        F: FnOnce() -> Vec<u8> + Send,
    {
        self.explicit.authorization_for_resource_request(session, body).await
    }
}
