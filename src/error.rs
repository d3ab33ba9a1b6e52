//! Core OAuth2 error kinds.

use thiserror::Error;

use crate::http_client::HttpClientError;
use crate::types::{AuthorizationErrorResponse, TokenErrorResponse};

/// Every failure surfaced by the clients, the Token Endpoint codec and the
/// extension registry.
///
/// Error *responses* from the Authorization Server (`AuthorizationResponse`,
/// `TokenResponse`) are kept apart from transport failures so callers can
/// tell "the server said no" from "we could not talk to the server".
#[derive(Debug, Error)]
pub enum OAuthError {
    /// An endpoint URL failed validation.
    #[error("invalid {endpoint} endpoint URI {uri:?}: {reason}")]
    InvalidEndpoint {
        endpoint: &'static str,
        uri: String,
        reason: String,
    },

    /// A token type or error code was registered twice in the same namespace.
    #[error("duplicate extension registration: {0}")]
    DuplicateRegistration(String),

    /// An extension descriptor is unusable (e.g. an error with no usage location).
    #[error("invalid extension: {0}")]
    InvalidExtension(String),

    /// The client was configured in a way its grant type cannot work with.
    #[error("invalid client configuration: {0}")]
    InvalidClient(String),

    /// The Authorization Request could not be built (caller bug).
    #[error("cannot build Authorization Request URI: {0}")]
    InvalidAuthorizationRequest(String),

    /// The `state` in a response does not match the state in the session.
    #[error("refusing to parse response: response state parameter does not match request state parameter; XSRF attack likely")]
    StateMismatch,

    /// The Authorization Server sent an error to the Redirection Endpoint.
    #[error("{0}")]
    AuthorizationResponse(AuthorizationErrorResponse),

    /// The Token Endpoint sent an error response.
    #[error("{0}")]
    TokenResponse(TokenErrorResponse),

    /// The HTTP executor failed (connection, TLS, cancelled, timed out...).
    #[error("HTTP transport error: {0}")]
    Transport(#[source] HttpClientError),

    /// A response was received but violates the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed JSON in response: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("no access token")]
    NoAccessToken,

    #[error("no refresh token")]
    NoRefreshToken,

    #[error("access token expired")]
    AccessTokenExpired,

    #[error("unsupported token type {0:?}")]
    UnsupportedTokenType(String),

    /// A token type driver could not authorize a request.
    #[error("token type driver error: {0}")]
    Driver(String),
}

impl OAuthError {
    /// True for failures in talking to the server or in understanding its
    /// reply, as opposed to error responses the server chose to send.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            OAuthError::Transport(_) | OAuthError::Protocol(_) | OAuthError::MalformedJson(_)
        )
    }

    /// True for a state mismatch on an authorization response.
    pub fn is_xsrf(&self) -> bool {
        matches!(self, OAuthError::StateMismatch)
    }

    /// True when the Authorization Server sent a semantically valid error
    /// response, at either the Redirection Endpoint or the Token Endpoint.
    pub fn is_server_error_response(&self) -> bool {
        matches!(
            self,
            OAuthError::AuthorizationResponse(_) | OAuthError::TokenResponse(_)
        )
    }

    /// The Token Endpoint error response carried by this error, if any.
    pub fn token_error_response(&self) -> Option<&TokenErrorResponse> {
        match self {
            OAuthError::TokenResponse(response) => Some(response),
            _ => None,
        }
    }

    /// The Redirection Endpoint error response carried by this error, if any.
    pub fn authorization_error_response(&self) -> Option<&AuthorizationErrorResponse> {
        match self {
            OAuthError::AuthorizationResponse(response) => Some(response),
            _ => None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        OAuthError::Protocol(message.into())
    }
}

pub type Result<T> = std::result::Result<T, OAuthError>;
