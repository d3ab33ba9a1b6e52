//! Resource Owner Password Credentials Grant (RFC 6749 §4.3).

use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use crate::client::ExplicitClient;
use crate::client_auth::{ClientAuthenticationMethod, Form};
use crate::error::Result;
use crate::http_client::{Headers, HttpExecutor};
use crate::registry::{ExtensionRegistry, ProtocolExtension};
use crate::scope::Scope;
use crate::session::PasswordSession;
use crate::types::AccessTokenData;

/// A client using the "Resource Owner Password Credentials" grant type.
#[derive(Debug, Clone)]
pub struct PasswordClient {
    explicit: ExplicitClient,
}

impl PasswordClient {
    pub fn new(
        token_endpoint: Url,
        client_auth: Option<Arc<dyn ClientAuthenticationMethod>>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self> {
        Ok(PasswordClient {
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

    /// Requests an access token with the resource owner's credentials
    /// (§4.3.2). An empty `scope` is not sent.
    #[instrument(skip(self, password, scope), level = "debug")]
    pub async fn access_token(&self, username: &str, password: &str, scope: &Scope) -> Result<PasswordSession> {
        let mut form = Form::new();
        form.insert("grant_type".into(), "password".into());
        form.insert("username".into(), username.to_string());
        form.insert("password".into(), password.to_string());
        if !scope.is_empty() {
            form.insert("scope".into(), scope.to_string());
        }

        let response = self.explicit.post_form(form).await?;
        debug!("password grant issued an access token");
        Ok(PasswordSession::authenticated(AccessTokenData::from_response(response, scope)))
    }

    /// See [`ExplicitClient::refresh`].
    pub async fn refresh(&self, session: &mut PasswordSession, scope: Option<&Scope>) -> Result<()> {
        self.explicit.refresh(session, scope).await
    }

    /// See [`ExplicitClient::authorization_for_resource_request`].
    pub async fn authorization_for_resource_request<F>(&self, session: &mut PasswordSession, body: F) -> Result<Headers>
    where
        F: FnOnce() -> Vec<u8> + Send,
    {
        self.explicit.authorization_for_resource_request(session, body).await
    }
}
