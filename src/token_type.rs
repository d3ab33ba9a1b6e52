//! The contract an access token type plugin satisfies (RFC 6749 §7.1).
//!
//! Clients use a driver to attach an access token to outgoing requests;
//! resource servers use it to decide whether an incoming request carries a
//! valid one.

use std::fmt;

use liboauth2_lib::escape_quoted_string;

use crate::error::Result;
use crate::http_client::{Headers, HttpRequest};

/// Implementation half of an access token type.
pub trait TokenTypeDriver: Send + Sync {
    /// Whether [`authorize_request`](Self::authorize_request) needs the
    /// outgoing request body. When false the body is never produced.
    fn needs_body(&self) -> bool {
        false
    }

    /// Headers that authorize a request made with `access_token`.
    fn authorize_request(&self, access_token: &str, body: Option<&[u8]>) -> Result<Headers>;

    /// Decides whether an incoming request is authorized.
    fn validate_authorization(&self, request: &HttpRequest) -> std::result::Result<(), ValidationError>;
}

/// An RFC 7235 challenge, rendered into `WWW-Authenticate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub auth_scheme: String,
    pub params: Vec<(String, String)>,
}

impl Challenge {
    pub fn new(auth_scheme: impl Into<String>) -> Self {
        Challenge {
            auth_scheme: auth_scheme.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.auth_scheme)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{key}=\"{}\"", escape_quoted_string(value))?;
        }
        Ok(())
    }
}

/// The answer to an insufficiently authorized resource request (RFC 6750 §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccessError {
    pub status: u16,
    pub challenge: Challenge,
    /// Why the request was refused; mirrors `error_description` when present.
    pub reason: String,
}

impl ResourceAccessError {
    /// Value for the `WWW-Authenticate` response header.
    pub fn www_authenticate(&self) -> String {
        self.challenge.to_string()
    }

    /// The `error` attribute of the challenge, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.challenge.param("error")
    }
}

impl fmt::Display for ResourceAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {} / WWW-Authenticate: {}", self.status, self.challenge)
    }
}

/// Why `validate_authorization` did not accept a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The request is not authorized; send this status and challenge back.
    #[error("{}", .0.reason)]
    Denied(ResourceAccessError),
    /// Authorization could not be decided (e.g. the token store is down).
    #[error("cannot validate authorization: {0}")]
    Internal(String),
}

impl ValidationError {
    pub fn denial(&self) -> Option<&ResourceAccessError> {
        match self {
            ValidationError::Denied(denial) => Some(denial),
            ValidationError::Internal(_) => None,
        }
    }
}
