//! The four RFC 6749 grant clients and what they share.

pub mod authorization_code;
pub mod client_credentials;
pub mod explicit;
pub mod implicit;
pub mod password;

pub use authorization_code::AuthorizationCodeClient;
pub use client_credentials::ClientCredentialsClient;
pub use explicit::ExplicitClient;
pub use implicit::ImplicitClient;
pub use password::PasswordClient;

use std::collections::{BTreeMap, HashSet};

use tracing::warn;
use url::Url;

use crate::error::{OAuthError, Result};
use crate::http_client::Headers;
use crate::registry::ExtensionRegistry;
use crate::types::{AccessTokenData, AuthorizationErrorResponse, AuthorizationFlow, absolute_error_uri};

/// Query parameters for an Authorization Request. A name mapped to no
/// values is skipped; more than one value is rejected.
pub type QueryParameters = BTreeMap<String, Vec<String>>;

/// Parameters the grant clients set themselves; callers may not pass them
/// as extra parameters.
pub(crate) const RESERVED_AUTHORIZATION_PARAMETERS: &[&str] =
    &["response_type", "client_id", "redirect_uri", "scope", "state"];

fn check_endpoint(endpoint: &'static str, uri: &Url) -> Result<()> {
    if uri.fragment().is_some() {
        return Err(OAuthError::InvalidEndpoint {
            endpoint,
            uri: uri.to_string(),
            reason: "MUST NOT include a fragment component".to_string(),
        });
    }
    Ok(())
}

/// RFC 6749 §3.1.
pub fn validate_authorization_endpoint(uri: &Url) -> Result<()> {
    check_endpoint("authorization", uri)
}

/// RFC 6749 §3.2.
pub fn validate_token_endpoint(uri: &Url) -> Result<()> {
    check_endpoint("token", uri)
}

/// RFC 6749 §3.1.2: absolute, no fragment.
pub fn validate_redirection_endpoint(uri: &Url) -> Result<()> {
    if uri.cannot_be_a_base() {
        return Err(OAuthError::InvalidEndpoint {
            endpoint: "redirection",
            uri: uri.to_string(),
            reason: "MUST be an absolute URI".to_string(),
        });
    }
    check_endpoint("redirection", uri)
}

/// Adds `parameters` to the query of `endpoint`.
///
/// Fails if the endpoint already carries one of the parameters, or if a
/// parameter has more than one value; a parameter MUST NOT be sent twice
/// (RFC 6749 §3.1).
pub fn build_authorization_request_uri(endpoint: &Url, parameters: &QueryParameters) -> Result<Url> {
    let existing: HashSet<String> = endpoint.query_pairs().map(|(name, _)| name.into_owned()).collect();

    let mut pairs = Vec::with_capacity(parameters.len());
    for (name, values) in parameters {
        if existing.contains(name) {
            return Err(OAuthError::InvalidAuthorizationRequest(format!(
                "endpoint URI already has parameter {name:?}"
            )));
        }
        match values.as_slice() {
            [] => {}
            [value] => pairs.push((name.as_str(), value.as_str())),
            _ => {
                return Err(OAuthError::InvalidAuthorizationRequest(format!(
                    "parameter {name:?} has multiple values"
                )));
            }
        }
    }

    let mut uri = endpoint.clone();
    if !pairs.is_empty() {
        uri.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(uri)
}

/// Decoded parameters of an authorization response. Lookups return the
/// first occurrence of a name.
pub(crate) struct ResponseParameters(Vec<(String, String)>);

impl ResponseParameters {
    pub(crate) fn from_query(uri: &Url) -> Self {
        Self(uri.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect())
    }

    pub(crate) fn from_form(encoded: &str) -> Self {
        Self(liboauth2_lib::decode_form(encoded))
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// State is compared before anything else in the response is looked at.
    /// An absent parameter counts as the empty string.
    pub(crate) fn check_state(&self, expected: &str) -> Result<()> {
        if self.get("state").unwrap_or("") != expected {
            warn!("authorization response state does not match the request state");
            return Err(OAuthError::StateMismatch);
        }
        Ok(())
    }

    /// The error response carried by these parameters, if `error` is set.
    pub(crate) fn error_response(&self, flow: AuthorizationFlow) -> Option<AuthorizationErrorResponse> {
        let error_code = self.get("error")?;
        Some(AuthorizationErrorResponse {
            flow,
            error_code: error_code.to_string(),
            error_description: self.get("error_description").map(str::to_owned),
            error_uri: absolute_error_uri(self.get("error_uri")),
        })
    }

    pub(crate) fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| {
            OAuthError::protocol(format!("cannot parse response: missing required {name:?} parameter"))
        })
    }
}

/// Asks the driver registered for `token`'s type for the headers that
/// authorize a resource request. `body` is only called if the driver
/// needs the request body.
pub(crate) fn authorize_with_driver<F>(registry: &ExtensionRegistry, token: &AccessTokenData, body: F) -> Result<Headers>
where
    F: FnOnce() -> Vec<u8>,
{
    let token_type = registry
        .lookup_access_token_type(&token.token_type)
        .ok_or_else(|| OAuthError::UnsupportedTokenType(token.token_type.clone()))?;
    let body = token_type.driver.needs_body().then(body);
    token_type.driver.authorize_request(&token.access_token, body.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, &[&str])]) -> QueryParameters {
        entries
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_endpoint_with_fragment_rejected() {
        let uri = Url::parse("https://example.com/authz#frag").unwrap();
        assert!(matches!(
            validate_authorization_endpoint(&uri),
            Err(OAuthError::InvalidEndpoint { endpoint: "authorization", .. })
        ));
        assert!(validate_token_endpoint(&Url::parse("https://example.com/token").unwrap()).is_ok());
    }

    #[test]
    fn test_redirection_endpoint_must_be_hierarchical() {
        assert!(validate_redirection_endpoint(&Url::parse("urn:example:cb").unwrap()).is_err());
        assert!(validate_redirection_endpoint(&Url::parse("https://c.example/cb#x").unwrap()).is_err());
        assert!(validate_redirection_endpoint(&Url::parse("https://c.example/cb?a=b").unwrap()).is_ok());
    }

    #[test]
    fn test_build_keeps_existing_query() {
        let endpoint = Url::parse("https://example.com/authz?tenant=t1").unwrap();
        let uri = build_authorization_request_uri(&endpoint, &params(&[("foo", &["bar"]), ("skip", &[])])).unwrap();
        let pairs: Vec<(String, String)> = uri.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(
            pairs,
            vec![("tenant".to_string(), "t1".to_string()), ("foo".to_string(), "bar".to_string())]
        );
    }

    #[test]
    fn test_build_without_parameters_leaves_uri_alone() {
        let endpoint = Url::parse("https://example.com/authz").unwrap();
        let uri = build_authorization_request_uri(&endpoint, &QueryParameters::new()).unwrap();
        assert_eq!(uri.as_str(), "https://example.com/authz");
    }

    #[test]
    fn test_response_parameters_first_value_wins() {
        let parameters = ResponseParameters::from_form("state=s&code=one&code=two");
        assert_eq!(parameters.get("code"), Some("one"));
        assert!(parameters.check_state("s").is_ok());
        assert!(parameters.check_state("").is_err());
        assert!(ResponseParameters::from_form("code=x").check_state("").is_ok());
    }

    #[test]
    fn test_unparseable_error_uri_is_dropped() {
        let parameters = ResponseParameters::from_form("error=access_denied&error_uri=not%20a%20uri");
        let response = parameters.error_response(AuthorizationFlow::AuthorizationCode).unwrap();
        assert_eq!(response.error_code, "access_denied");
        assert!(response.error_uri.is_none());
    }
}
