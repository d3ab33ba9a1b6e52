//! OAuth2 protocol values: token responses, error responses and the access
//! token data kept in a session.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::scope::Scope;

/// Successful response from the Token Endpoint (RFC 6749 §5.1).
#[derive(Clone, PartialEq)]
pub struct TokenResponse {
    /// REQUIRED.
    pub access_token: String,
    /// REQUIRED. Case-insensitive.
    pub token_type: String,
    /// Absolute expiry, computed from `expires_in` when the response arrived.
    pub expires_at: Option<DateTime<Utc>>,
    /// OPTIONAL.
    pub refresh_token: Option<String>,
    /// OPTIONAL if identical to the scope requested by the client.
    pub scope: Option<Scope>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Error response from the Token Endpoint (RFC 6749 §5.2).
///
/// This is a semantically valid answer from the Authorization Server, not a
/// transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenErrorResponse {
    /// A single ASCII error code.
    pub error_code: String,
    pub error_description: Option<String>,
    pub error_uri: Option<Url>,
}

impl fmt::Display for TokenErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_error_fields(f, "token error response", &self.error_code, &self.error_description, &self.error_uri)
    }
}

/// Which Authorization Endpoint flow produced an authorization response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationFlow {
    /// RFC 6749 §4.1
    AuthorizationCode,
    /// RFC 6749 §4.2
    Implicit,
}

/// Error response delivered to the Redirection Endpoint (RFC 6749 §4.1.2.1
/// and §4.2.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationErrorResponse {
    pub flow: AuthorizationFlow,
    /// REQUIRED. A single ASCII error code.
    pub error_code: String,
    /// OPTIONAL. Human-readable ASCII text for the client developer.
    pub error_description: Option<String>,
    /// OPTIONAL. A web page with more information about the error.
    pub error_uri: Option<Url>,
}

impl fmt::Display for AuthorizationErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.flow {
            AuthorizationFlow::AuthorizationCode => "authorization code grant error response",
            AuthorizationFlow::Implicit => "implicit grant error response",
        };
        write_error_fields(f, prefix, &self.error_code, &self.error_description, &self.error_uri)
    }
}

/// `error_uri` is kept only when it is an absolute URI. Anything else is
/// dropped so the error response itself still reaches the caller.
pub(crate) fn absolute_error_uri(raw: Option<&str>) -> Option<Url> {
    let raw = raw?;
    match Url::parse(raw) {
        Ok(uri) => Some(uri),
        Err(err) => {
            debug!(error_uri = raw, %err, "ignoring error_uri that is not an absolute URI");
            None
        }
    }
}

fn write_error_fields(
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    code: &str,
    description: &Option<String>,
    uri: &Option<Url>,
) -> fmt::Result {
    write!(f, "{prefix}: error={code:?}")?;
    if let Some(description) = description {
        write!(f, " error_description={description:?}")?;
    }
    if let Some(uri) = uri {
        write!(f, " error_uri={:?}", uri.as_str())?;
    }
    Ok(())
}

/// The access token currently held by a session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenData {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Scope,
}

impl AccessTokenData {
    /// Builds session token data from a fresh token response. When the server
    /// omitted `scope`, the granted scope is `requested`.
    pub fn from_response(response: TokenResponse, requested: &Scope) -> Self {
        AccessTokenData {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at: response.expires_at,
            refresh_token: response.refresh_token,
            scope: response.scope.unwrap_or_else(|| requested.clone()),
        }
    }

    /// Replaces this token with a refreshed one, keeping the current refresh
    /// token and scope when the response leaves them out.
    pub fn apply_refresh(&mut self, response: TokenResponse) {
        self.access_token = response.access_token;
        self.token_type = response.token_type;
        self.expires_at = response.expires_at;
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = response.scope {
            self.scope = scope;
        }
    }

    /// Whether `now` is at or after the recorded expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for AccessTokenData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenData")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response(refresh: Option<&str>, scope: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "A2".into(),
            token_type: "bearer".into(),
            expires_at: None,
            refresh_token: refresh.map(str::to_owned),
            scope: scope.map(Scope::parse),
        }
    }

    #[test]
    fn test_apply_refresh_carries_over() {
        let mut data = AccessTokenData {
            access_token: "A1".into(),
            token_type: "bearer".into(),
            expires_at: Some(Utc::now()),
            refresh_token: Some("R1".into()),
            scope: Scope::parse("s1"),
        };
        data.apply_refresh(response(None, None));
        assert_eq!(data.access_token, "A2");
        assert_eq!(data.refresh_token.as_deref(), Some("R1"));
        assert_eq!(data.scope, Scope::parse("s1"));
        assert!(data.expires_at.is_none());

        data.apply_refresh(response(Some("R2"), Some("s2 s3")));
        assert_eq!(data.refresh_token.as_deref(), Some("R2"));
        assert_eq!(data.scope, Scope::parse("s3 s2"));
    }

    #[test]
    fn test_scope_defaults_to_requested() {
        let data = AccessTokenData::from_response(response(None, None), &Scope::parse("wanted"));
        assert_eq!(data.scope, Scope::parse("wanted"));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let mut data = AccessTokenData::from_response(response(None, None), &Scope::new());
        assert!(!data.is_expired_at(now));
        data.expires_at = Some(now);
        assert!(data.is_expired_at(now));
        assert!(!data.is_expired_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_error_display() {
        let err = TokenErrorResponse {
            error_code: "invalid_grant".into(),
            error_description: Some("bad code".into()),
            error_uri: None,
        };
        assert_eq!(err.to_string(), r#"token error response: error="invalid_grant" error_description="bad code""#);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let data = AccessTokenData::from_response(response(Some("secret-refresh"), None), &Scope::new());
        let debug = format!("{data:?}");
        assert!(!debug.contains("A2"));
        assert!(!debug.contains("secret-refresh"));
    }
}
