//! Token Endpoint requests and responses (RFC 6749 §3.2, §5).

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use liboauth2_lib::{encode_form, media_type};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::client::validate_token_endpoint;
use crate::client_auth::{ClientAuthenticationMethod, Form};
use crate::error::{OAuthError, Result};
use crate::http_client::{Headers, HttpExecutor, HttpMethod, HttpRequest, HttpResponse, RedirectPolicy};
use crate::scope::Scope;
use crate::types::{TokenErrorResponse, TokenResponse, absolute_error_uri};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_MEDIA_TYPE: &str = "application/json";

/// A validated Token Endpoint plus everything needed to talk to it.
///
/// Holds no mutable state; concurrent requests are independent.
#[derive(Clone)]
pub struct TokenEndpoint {
    url: Url,
    client_auth: Option<Arc<dyn ClientAuthenticationMethod>>,
    executor: Arc<dyn HttpExecutor>,
}

impl TokenEndpoint {
    pub fn new(
        url: Url,
        client_auth: Option<Arc<dyn ClientAuthenticationMethod>>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self> {
        validate_token_endpoint(&url)?;
        Ok(TokenEndpoint {
            url,
            client_auth,
            executor,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether a client authentication method is configured.
    pub fn authenticates_client(&self) -> bool {
        self.client_auth.is_some()
    }

    /// Builds the HTTP request for `form`, applying client authentication.
    pub fn prepare_request(&self, mut form: Form) -> HttpRequest {
        let mut headers = Headers::new();
        if let Some(auth) = &self.client_auth {
            auth.authenticate(&mut headers, &mut form);
        }
        headers.set("Content-Type", FORM_CONTENT_TYPE);
        headers.set("Accept", JSON_MEDIA_TYPE);
        HttpRequest {
            method: HttpMethod::POST,
            url: self.url.to_string(),
            headers,
            body: Some(encode_form(&form).into_bytes()),
            timeout: None,
            redirect_policy: RedirectPolicy::None,
        }
    }

    /// POSTs `form` and decodes the reply.
    ///
    /// A Token Endpoint error response comes back as
    /// [`OAuthError::TokenResponse`]; everything else that goes wrong is a
    /// transport-kind error.
    #[instrument(
        skip(self, form),
        fields(url = %self.url, grant_type = form.get("grant_type").map(String::as_str).unwrap_or("")),
        level = "debug"
    )]
    pub async fn request(&self, form: Form) -> Result<TokenResponse> {
        let request = self.prepare_request(form);
        let response = self.executor.execute(request).await.map_err(|err| {
            warn!(error = %err, "token endpoint request failed");
            OAuthError::Transport(err)
        })?;
        debug!(status = response.status, "token endpoint responded");
        parse_token_response(&response)
    }
}

impl fmt::Debug for TokenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEndpoint")
            .field("url", &self.url.as_str())
            .field("client_auth", &self.client_auth.is_some())
            .finish()
    }
}

#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<f64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Deserialize)]
struct RawTokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    error_uri: Option<String>,
}

/// Decodes a Token Endpoint response received just now.
pub fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
    parse_token_response_at(response, Utc::now())
}

/// Decodes a Token Endpoint response, resolving `expires_in` against `now`.
pub fn parse_token_response_at(response: &HttpResponse, now: DateTime<Utc>) -> Result<TokenResponse> {
    match response.status {
        200 => {
            require_json(response)?;
            let raw: RawTokenResponse = serde_json::from_slice(&response.body)?;
            let access_token = raw
                .access_token
                .ok_or_else(|| OAuthError::protocol("parameter \"access_token\" is missing"))?;
            let token_type = raw
                .token_type
                .ok_or_else(|| OAuthError::protocol("parameter \"token_type\" is missing"))?;
            let expires_at = raw.expires_in.map(|secs| expiry_from(now, secs)).transpose()?;
            Ok(TokenResponse {
                access_token,
                token_type,
                expires_at,
                refresh_token: raw.refresh_token,
                scope: raw.scope.as_deref().map(Scope::parse),
            })
        }
        // RFC 6749 says 400 unless otherwise specified, but some servers send
        // 403 for invalid_grant. Any 4xx is an error response.
        400..=499 => {
            require_json(response)?;
            let raw: RawTokenErrorResponse = serde_json::from_slice(&response.body)?;
            let error_code = raw
                .error
                .ok_or_else(|| OAuthError::protocol("parameter \"error\" is missing"))?;
            let error = TokenErrorResponse {
                error_code,
                error_description: raw.error_description,
                error_uri: absolute_error_uri(raw.error_uri.as_deref()),
            };
            debug!(error = %error.error_code, status = response.status, "token endpoint returned an error response");
            Err(OAuthError::TokenResponse(error))
        }
        status => Err(OAuthError::protocol(format!("unexpected response code {status}"))),
    }
}

/// Turns a relative `expires_in` into an absolute instant.
pub(crate) fn expiry_from(now: DateTime<Utc>, seconds: f64) -> Result<DateTime<Utc>> {
    if !seconds.is_finite() {
        return Err(OAuthError::protocol("parameter \"expires_in\" is not a finite number"));
    }
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return Err(OAuthError::protocol("parameter \"expires_in\" is out of range"));
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or_else(|| OAuthError::protocol("parameter \"expires_in\" is out of range"))
}

fn require_json(response: &HttpResponse) -> Result<()> {
    let content_type = response
        .headers
        .get("Content-Type")
        .ok_or_else(|| OAuthError::protocol("response has no Content-Type"))?;
    match media_type(content_type) {
        Some(media) if media == JSON_MEDIA_TYPE => Ok(()),
        Some(media) => Err(OAuthError::protocol(format!(
            "expected \"{JSON_MEDIA_TYPE}\" media type, got {media:?}"
        ))),
        None => Err(OAuthError::protocol(format!(
            "cannot parse Content-Type {content_type:?}"
        ))),
    }
}
