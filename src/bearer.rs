//! Bearer token usage (RFC 6750), for clients and resource servers.

use std::fmt;
use std::sync::Arc;

use liboauth2_lib::{decode_form, media_type};
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;
use crate::http_client::{Headers, HttpRequest};
use crate::registry::{AccessTokenType, ErrorUsageLocation, ExtensionError, ProtocolExtension};
use crate::scope::Scope;
use crate::token_type::{Challenge, ResourceAccessError, TokenTypeDriver, ValidationError};

const AUTH_SCHEME: &str = "Bearer";
const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";
/// Resolves origin-form request targets such as `/resource?x=1`.
const REQUEST_TARGET_BASE: &str = "http://localhost/";

/// Result of checking a Bearer token against the token store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerdict {
    /// The token is good and carries this scope.
    Valid(Scope),
    /// The token is expired, revoked, malformed or otherwise no good.
    Invalid(String),
}

/// Looks a token up. `Err` means validity could not be decided.
pub type TokenValidationFn = Arc<dyn Fn(&str) -> std::result::Result<TokenVerdict, String> + Send + Sync>;

/// Resource-server side of RFC 6750: finds the Bearer token in a request
/// and decides whether it authorizes the request.
#[derive(Clone)]
pub struct BearerValidator {
    /// Accept the token as an `access_token` form body field (§2.2).
    pub support_body: bool,
    /// Accept the token as an `access_token` query parameter (§2.3). 2xx
    /// responses to such requests SHOULD carry `Cache-Control: private`;
    /// that is up to the caller.
    pub support_uri: bool,
    /// Realm announced in `WWW-Authenticate` challenges.
    pub realm: Option<String>,
    /// Scope every token must have to be accepted.
    pub required_scope: Scope,
    validate_token: TokenValidationFn,
}

impl BearerValidator {
    /// Header-only validator with no required scope.
    pub fn new<F>(validate_token: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<TokenVerdict, String> + Send + Sync + 'static,
    {
        BearerValidator {
            support_body: false,
            support_uri: false,
            realm: None,
            required_scope: Scope::new(),
            validate_token: Arc::new(validate_token),
        }
    }

    pub fn with_body_support(mut self) -> Self {
        self.support_body = true;
        self
    }

    pub fn with_uri_support(mut self) -> Self {
        self.support_uri = true;
        self
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn with_required_scope(mut self, scope: Scope) -> Self {
        self.required_scope = scope;
        self
    }

    /// The single Bearer token carried by `request`, if any, from every
    /// method this validator supports. A token sent more than one way is an
    /// error.
    pub fn extract_token(&self, request: &HttpRequest) -> std::result::Result<Option<String>, String> {
        let mut found = Vec::with_capacity(1);
        found.extend(token_from_header(&request.headers)?);
        if self.support_body {
            found.extend(token_from_body(request)?);
        }
        if self.support_uri {
            found.extend(token_from_uri(&request.url)?);
        }
        match found.len() {
            0 | 1 => Ok(found.pop()),
            _ => Err("invalid Bearer credentials: access token provided with multiple methods".to_string()),
        }
    }

    /// Decides whether `request` is authorized (§3).
    pub fn validate(&self, request: &HttpRequest) -> std::result::Result<(), ValidationError> {
        let token = match self.extract_token(request) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("request carries no Bearer token");
                return Err(self.deny(401, Vec::new(), "no Bearer token"));
            }
            Err(reason) => {
                warn!(%reason, "malformed Bearer credentials");
                return Err(self.deny(
                    400,
                    vec![("error", "invalid_request".to_string()), ("error_description", reason.clone())],
                    &reason,
                ));
            }
        };

        let scope = match (self.validate_token)(&token).map_err(ValidationError::Internal)? {
            TokenVerdict::Valid(scope) => scope,
            TokenVerdict::Invalid(reason) => {
                warn!(%reason, "rejected invalid Bearer token");
                return Err(self.deny(
                    401,
                    vec![("error", "invalid_token".to_string()), ("error_description", reason.clone())],
                    &reason,
                ));
            }
        };

        let missing: Vec<&str> = self.required_scope.missing_from(&scope).collect();
        let reason = match missing.as_slice() {
            [] => return Ok(()),
            [one] => format!("missing required scope value: {one:?}"),
            many => format!(
                "missing required scope values: [{}]",
                many.iter().map(|value| format!("{value:?}")).collect::<Vec<_>>().join(" ")
            ),
        };
        warn!(%reason, "Bearer token has insufficient scope");
        Err(self.deny(
            403,
            vec![
                ("error", "insufficient_scope".to_string()),
                ("error_description", reason.clone()),
                ("scope", self.required_scope.to_string()),
            ],
            &reason,
        ))
    }

    fn deny(&self, status: u16, params: Vec<(&str, String)>, reason: &str) -> ValidationError {
        let mut challenge = Challenge::new(AUTH_SCHEME);
        if let Some(realm) = &self.realm {
            challenge = challenge.with_param("realm", realm.clone());
        }
        for (key, value) in params {
            challenge = challenge.with_param(key, value);
        }
        ValidationError::Denied(ResourceAccessError {
            status,
            challenge,
            reason: reason.to_string(),
        })
    }
}

impl fmt::Debug for BearerValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerValidator")
            .field("support_body", &self.support_body)
            .field("support_uri", &self.support_uri)
            .field("realm", &self.realm)
            .field("required_scope", &self.required_scope)
            .finish()
    }
}

/// The Bearer access token type.
///
/// Without a validator it can only authorize outgoing requests; resource
/// servers attach a [`BearerValidator`].
#[derive(Debug, Clone, Default)]
pub struct BearerDriver {
    validator: Option<BearerValidator>,
}

impl BearerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(validator: BearerValidator) -> Self {
        BearerDriver {
            validator: Some(validator),
        }
    }
}

impl TokenTypeDriver for BearerDriver {
    /// The token goes out exactly as the Authorization Server issued it.
    fn authorize_request(&self, access_token: &str, _body: Option<&[u8]>) -> Result<Headers> {
        let mut headers = Headers::new();
        headers.set("Authorization", format!("{AUTH_SCHEME} {access_token}"));
        Ok(headers)
    }

    fn validate_authorization(&self, request: &HttpRequest) -> std::result::Result<(), ValidationError> {
        match &self.validator {
            Some(validator) => validator.validate(request),
            None => Err(ValidationError::Internal(
                "Bearer token type registered without a validator".to_string(),
            )),
        }
    }
}

/// The Bearer token from the `Authorization` header (§2.1).
///
/// A missing header or another auth scheme is "no token", not an error.
pub fn token_from_header(headers: &Headers) -> std::result::Result<Option<String>, String> {
    let Some(value) = headers.get("Authorization") else {
        return Ok(None);
    };
    let value = value.trim();
    let (scheme, credentials) = match value.split_once(|c: char| c == ' ' || c == '\t') {
        Some((scheme, rest)) => (scheme, rest.trim_start_matches([' ', '\t'])),
        None => (value, ""),
    };
    if scheme.is_empty() || !scheme.bytes().all(is_tchar) {
        return Err("invalid Authorization header: malformed auth-scheme".to_string());
    }
    if !scheme.eq_ignore_ascii_case(AUTH_SCHEME) {
        return Ok(None);
    }
    if credentials.is_empty() {
        return Err("invalid Bearer credentials: missing token".to_string());
    }
    if !is_token68(credentials) {
        return Err("invalid Bearer credentials: used auth-param syntax instead of token68 syntax".to_string());
    }
    Ok(Some(credentials.to_string()))
}

/// The Bearer token from an `application/x-www-form-urlencoded` body (§2.2).
/// Any other content type is "no token".
pub fn token_from_body(request: &HttpRequest) -> std::result::Result<Option<String>, String> {
    let is_form = request
        .headers
        .get("Content-Type")
        .and_then(media_type)
        .is_some_and(|media| media == FORM_MEDIA_TYPE);
    let Some(body) = request.body.as_deref().filter(|_| is_form) else {
        return Ok(None);
    };
    single_parameter(&decode_form(&String::from_utf8_lossy(body)), "body")
}

/// The Bearer token from the `access_token` query parameter (§2.3).
///
/// `uri` may be an absolute URL or an origin-form request target.
pub fn token_from_uri(uri: &str) -> std::result::Result<Option<String>, String> {
    let base = Url::parse(REQUEST_TARGET_BASE).map_err(|err| err.to_string())?;
    let uri = Url::options()
        .base_url(Some(&base))
        .parse(uri)
        .map_err(|err| format!("invalid request URI: {err}"))?;
    let pairs: Vec<(String, String)> = uri.query_pairs().into_owned().collect();
    single_parameter(&pairs, "query")
}

fn single_parameter(pairs: &[(String, String)], location: &str) -> std::result::Result<Option<String>, String> {
    let mut values = pairs
        .iter()
        .filter(|(name, _)| name == "access_token")
        .map(|(_, value)| value);
    match (values.next(), values.next()) {
        (None, _) => Ok(None),
        (Some(token), None) if token.is_empty() => Err(format!(
            "invalid Bearer credentials: empty (but set) access_token {location} parameter"
        )),
        (Some(token), None) => Ok(Some(token.clone())),
        (Some(_), Some(_)) => Err(format!(
            "invalid Bearer credentials: repeated access_token {location} parameter"
        )),
    }
}

/// RFC 7230 `tchar`.
fn is_tchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// RFC 7235 `token68`: `1*( ALPHA / DIGIT / "-" / "." / "_" / "~" / "+" / "/" ) *"="`.
fn is_token68(value: &str) -> bool {
    let body = value.trim_end_matches('=');
    !body.is_empty()
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-._~+/".contains(&b))
}

const INVALID_REQUEST_MEANING: &str = "The request is missing a required parameter, includes an unsupported \
    parameter or parameter value, repeats the same parameter, uses more than one method for including an \
    access token, or is otherwise malformed.  The resource server SHOULD respond with the HTTP 400 (Bad \
    Request) status code.";

const INVALID_TOKEN_MEANING: &str = "The access token provided is expired, revoked, malformed, or invalid for \
    other reasons.  The resource SHOULD respond with the HTTP 401 (Unauthorized) status code.  The client MAY \
    request a new access token and retry the protected resource request.";

const INSUFFICIENT_SCOPE_MEANING: &str = "The request requires higher privileges than provided by the access \
    token.  The resource server SHOULD respond with the HTTP 403 (Forbidden) status code and MAY include the \
    \"scope\" attribute with the scope necessary to access the protected resource.";

/// Everything RFC 6750 registers (§6): the `Bearer` token type and three
/// resource access error codes.
pub fn protocol_extension(driver: BearerDriver) -> ProtocolExtension {
    let error = |name: &str, meaning: &str| ExtensionError {
        name: name.to_string(),
        usage_locations: vec![ErrorUsageLocation::ResourceAccessErrorResponse],
        related_extension: "Bearer access token type".to_string(),
        change_controller: "IETF".to_string(),
        specification_documents: vec!["RFC 6750".to_string()],
        meaning: meaning.to_string(),
    };
    ProtocolExtension {
        access_token_types: vec![AccessTokenType {
            name: AUTH_SCHEME.to_string(),
            additional_token_endpoint_parameters: Vec::new(),
            change_controller: "IETF".to_string(),
            specification_documents: vec!["RFC 6750".to_string()],
            driver: Arc::new(driver),
        }],
        extension_errors: vec![
            error("invalid_request", INVALID_REQUEST_MEANING),
            error("invalid_token", INVALID_TOKEN_MEANING),
            error("insufficient_scope", INSUFFICIENT_SCOPE_MEANING),
        ],
    }
}
