//! Extension registry (RFC 6749 §11): access token types and error codes.
//!
//! Each client or resource server owns one registry. It is filled during
//! setup, through `&mut` access, and only read afterwards, so sharing a
//! configured client between tasks needs no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{OAuthError, Result};
use crate::token_type::TokenTypeDriver;
use crate::types::{AuthorizationErrorResponse, AuthorizationFlow, TokenErrorResponse};

/// Where an error code may appear (RFC 6749 §11.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorUsageLocation {
    /// Authorization code grant error response, §4.1.2.1
    AuthorizationCodeGrantErrorResponse,
    /// Implicit grant error response, §4.2.2.1
    ImplicitGrantErrorResponse,
    /// Token error response, §5.2
    TokenErrorResponse,
    /// Resource access error response, §7.2
    ResourceAccessErrorResponse,
}

impl ErrorUsageLocation {
    pub fn for_flow(flow: AuthorizationFlow) -> Self {
        match flow {
            AuthorizationFlow::AuthorizationCode => ErrorUsageLocation::AuthorizationCodeGrantErrorResponse,
            AuthorizationFlow::Implicit => ErrorUsageLocation::ImplicitGrantErrorResponse,
        }
    }
}

/// An entry in the OAuth Extensions Error Registry (RFC 6749 §11.4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionError {
    pub name: String,
    pub usage_locations: Vec<ErrorUsageLocation>,
    pub related_extension: String,
    pub change_controller: String,
    pub specification_documents: Vec<String>,
    /// Human-readable meaning of the error code.
    pub meaning: String,
}

/// An entry in the OAuth Access Token Types Registry (RFC 6749 §11.1.1),
/// together with the driver that implements it.
#[derive(Clone)]
pub struct AccessTokenType {
    /// Matched case-insensitively against `token_type`.
    pub name: String,
    pub additional_token_endpoint_parameters: Vec<String>,
    pub change_controller: String,
    pub specification_documents: Vec<String>,
    pub driver: Arc<dyn TokenTypeDriver>,
}

impl fmt::Debug for AccessTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenType")
            .field("name", &self.name)
            .field("additional_token_endpoint_parameters", &self.additional_token_endpoint_parameters)
            .field("change_controller", &self.change_controller)
            .field("specification_documents", &self.specification_documents)
            .field("needs_body", &self.driver.needs_body())
            .finish()
    }
}

/// Token types and error codes that are registered together, such as the
/// Bearer support of RFC 6750.
#[derive(Debug, Clone, Default)]
pub struct ProtocolExtension {
    pub access_token_types: Vec<AccessTokenType>,
    pub extension_errors: Vec<ExtensionError>,
}

/// Per-client container of access token types and error codes.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    access_token_types: HashMap<String, AccessTokenType>,
    errors: HashMap<ErrorUsageLocation, HashMap<String, ExtensionError>>,
}

impl ExtensionRegistry {
    /// An empty registry; every lookup answers "not found".
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the error codes RFC 6749 itself defines.
    pub fn with_builtin_errors() -> Self {
        let mut registry = Self::new();
        for error in builtin_errors() {
            registry.insert_error(error);
        }
        registry
    }

    /// Registers an access token type. Names collide case-insensitively.
    pub fn register_access_token_type(&mut self, token_type: AccessTokenType) -> Result<()> {
        let key = token_type.name.to_ascii_lowercase();
        if self.access_token_types.contains_key(&key) {
            warn!(token_type = %token_type.name, "access token type registered twice");
            return Err(OAuthError::DuplicateRegistration(format!(
                "access token type {:?} already registered",
                token_type.name
            )));
        }
        debug!(token_type = %token_type.name, "registered access token type");
        self.access_token_types.insert(key, token_type);
        Ok(())
    }

    /// Registers an error code at each of its usage locations. Names are
    /// case-sensitive and only collide within the same location.
    pub fn register_error(&mut self, error: ExtensionError) -> Result<()> {
        if error.usage_locations.is_empty() {
            return Err(OAuthError::InvalidExtension(format!(
                "error {:?} has no usage location",
                error.name
            )));
        }
        for location in &error.usage_locations {
            if self.lookup_error(*location, &error.name).is_some() {
                warn!(error = %error.name, ?location, "error code registered twice");
                return Err(OAuthError::DuplicateRegistration(format!(
                    "error={:?} already registered for {:?}",
                    error.name, location
                )));
            }
        }
        debug!(error = %error.name, locations = ?error.usage_locations, "registered extension error");
        self.insert_error(error);
        Ok(())
    }

    /// Registers a whole protocol extension. Either everything in it is
    /// registered, or nothing is.
    pub fn register(&mut self, extension: ProtocolExtension) -> Result<()> {
        let mut staged = self.clone();
        for token_type in extension.access_token_types {
            staged.register_access_token_type(token_type)?;
        }
        for error in extension.extension_errors {
            staged.register_error(error)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn lookup_access_token_type(&self, name: &str) -> Option<&AccessTokenType> {
        self.access_token_types.get(&name.to_ascii_lowercase())
    }

    pub fn lookup_error(&self, location: ErrorUsageLocation, name: &str) -> Option<&ExtensionError> {
        self.errors.get(&location).and_then(|errors| errors.get(name))
    }

    /// The registered meaning of a Token Endpoint error response.
    pub fn describe_token_error(&self, response: &TokenErrorResponse) -> Option<&ExtensionError> {
        self.lookup_error(ErrorUsageLocation::TokenErrorResponse, &response.error_code)
    }

    /// The registered meaning of a Redirection Endpoint error response.
    pub fn describe_authorization_error(&self, response: &AuthorizationErrorResponse) -> Option<&ExtensionError> {
        self.lookup_error(ErrorUsageLocation::for_flow(response.flow), &response.error_code)
    }

    fn insert_error(&mut self, error: ExtensionError) {
        for location in &error.usage_locations {
            self.errors
                .entry(*location)
                .or_default()
                .insert(error.name.clone(), error.clone());
        }
    }
}

fn builtin(location: ErrorUsageLocation, name: &str, meaning: &str) -> ExtensionError {
    ExtensionError {
        name: name.to_string(),
        usage_locations: vec![location],
        related_extension: "(built-in)".to_string(),
        change_controller: "IETF".to_string(),
        specification_documents: vec!["RFC 6749".to_string()],
        meaning: meaning.to_string(),
    }
}

const REDIRECT_SERVER_ERROR: &str = "The authorization server encountered an unexpected condition that \
    prevented it from fulfilling the request.  (This error code is needed because a 500 Internal Server \
    Error HTTP status code cannot be returned to the client via an HTTP redirect.)";

const REDIRECT_TEMPORARILY_UNAVAILABLE: &str = "The authorization server is currently unable to handle \
    the request due to a temporary overloading or maintenance of the server.  (This error code is needed \
    because a 503 Service Unavailable HTTP status code cannot be returned to the client via an HTTP redirect.)";

/// The error codes enumerated in RFC 6749 §4.1.2.1, §4.2.2.1 and §5.2.
pub fn builtin_errors() -> Vec<ExtensionError> {
    let token = ErrorUsageLocation::TokenErrorResponse;

    let mut errors = Vec::new();
    for (location, grant) in [
        (ErrorUsageLocation::AuthorizationCodeGrantErrorResponse, "an authorization code"),
        (ErrorUsageLocation::ImplicitGrantErrorResponse, "an access token"),
    ] {
        errors.push(builtin(
            location,
            "invalid_request",
            "The request is missing a required parameter, includes an invalid parameter value, \
             includes a parameter more than once, or is otherwise malformed.",
        ));
        errors.push(builtin(
            location,
            "unauthorized_client",
            &format!("The client is not authorized to request {grant} using this method."),
        ));
        errors.push(builtin(
            location,
            "access_denied",
            "The resource owner or authorization server denied the request.",
        ));
        errors.push(builtin(
            location,
            "unsupported_response_type",
            &format!("The authorization server does not support obtaining {grant} using this method."),
        ));
        errors.push(builtin(
            location,
            "invalid_scope",
            "The requested scope is invalid, unknown, or malformed.",
        ));
        errors.push(builtin(location, "server_error", REDIRECT_SERVER_ERROR));
        errors.push(builtin(location, "temporarily_unavailable", REDIRECT_TEMPORARILY_UNAVAILABLE));
    }

    errors.push(builtin(
        token,
        "invalid_request",
        "The request is missing a required parameter, includes an unsupported parameter value (other \
         than grant type), repeats a parameter, includes multiple credentials, utilizes more than one \
         mechanism for authenticating the client, or is otherwise malformed.",
    ));
    errors.push(builtin(
        token,
        "invalid_client",
        "Client authentication failed (e.g., unknown client, no client authentication included, or \
         unsupported authentication method).",
    ));
    errors.push(builtin(
        token,
        "invalid_grant",
        "The provided authorization grant (e.g., authorization code, resource owner credentials) or \
         refresh token is invalid, expired, revoked, does not match the redirection URI used in the \
         authorization request, or was issued to another client.",
    ));
    errors.push(builtin(
        token,
        "unauthorized_client",
        "The authenticated client is not authorized to use this authorization grant type.",
    ));
    errors.push(builtin(
        token,
        "unsupported_grant_type",
        "The authorization grant type is not supported by the authorization server.",
    ));
    errors.push(builtin(
        token,
        "invalid_scope",
        "The requested scope is invalid, unknown, malformed, or exceeds the scope granted by the \
         resource owner.",
    ));
    errors
}
