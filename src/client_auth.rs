//! Client authentication against the Token Endpoint (RFC 6749 §2.3).

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use liboauth2_lib::encode_url_owned;

use crate::http_client::Headers;

/// URL-form body of a Token Endpoint request.
pub type Form = BTreeMap<String, String>;

/// Puts the client's credentials on a Token Endpoint request, in the header
/// map, the form body, or both.
///
/// Any `Fn(&mut Headers, &mut Form)` closure is a method, so new schemes can
/// be plugged in without touching the Token Endpoint codec.
pub trait ClientAuthenticationMethod: Send + Sync {
    fn authenticate(&self, headers: &mut Headers, form: &mut Form);
}

impl<F> ClientAuthenticationMethod for F
where
    F: Fn(&mut Headers, &mut Form) + Send + Sync,
{
    fn authenticate(&self, headers: &mut Headers, form: &mut Form) {
        self(headers, form)
    }
}

/// HTTP Basic authentication (RFC 6749 §2.3.1). Both halves are
/// form-urlencoded before being joined and base64-encoded.
#[derive(Clone)]
pub struct HttpBasicAuth {
    client_id: String,
    client_secret: String,
}

impl HttpBasicAuth {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        HttpBasicAuth {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// The `Authorization` header value.
    pub fn header_value(&self) -> String {
        let creds = format!(
            "{}:{}",
            encode_url_owned(&self.client_id),
            encode_url_owned(&self.client_secret)
        );
        format!("Basic {}", STANDARD.encode(creds.as_bytes()))
    }
}

impl ClientAuthenticationMethod for HttpBasicAuth {
    fn authenticate(&self, headers: &mut Headers, _form: &mut Form) {
        headers.set("Authorization", self.header_value());
    }
}

impl fmt::Debug for HttpBasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBasicAuth")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Credentials in the request body (RFC 6749 §2.3.1, NOT RECOMMENDED by the
/// RFC but widely deployed).
#[derive(Clone)]
pub struct ClientSecretPost {
    client_id: String,
    client_secret: String,
}

impl ClientSecretPost {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        ClientSecretPost {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl ClientAuthenticationMethod for ClientSecretPost {
    fn authenticate(&self, _headers: &mut Headers, form: &mut Form) {
        form.insert("client_id".to_string(), self.client_id.clone());
        form.insert("client_secret".to_string(), self.client_secret.clone());
    }
}

impl fmt::Debug for ClientSecretPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretPost")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
