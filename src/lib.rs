//! OAuth 2.0 client core (RFC 6749) with Bearer token support (RFC 6750).
//!
//! The four grant clients build Authorization Requests, parse responses and
//! talk to the Token Endpoint through a pluggable [`HttpExecutor`]. Access
//! token types and error codes live in a per-client [`ExtensionRegistry`].

pub mod bearer;
pub mod client;
pub mod client_auth;
pub mod error;
pub mod http_client;
pub mod registry;
pub mod scope;
pub mod session;
pub mod settings;
pub mod token_endpoint;
pub mod token_type;
pub mod types;

#[cfg(feature = "reqwest-client")]
pub mod reqwest_client;

pub use bearer::{BearerDriver, BearerValidator, TokenVerdict};
pub use client::{
    AuthorizationCodeClient, ClientCredentialsClient, ExplicitClient, ImplicitClient, PasswordClient, QueryParameters,
};
pub use client_auth::{ClientAuthenticationMethod, ClientSecretPost, Form, HttpBasicAuth};
pub use error::{OAuthError, Result};
pub use http_client::{Headers, HttpExecutor, HttpMethod, HttpRequest, HttpResponse, InMemoryHttpClient};
pub use registry::{AccessTokenType, ErrorUsageLocation, ExtensionError, ExtensionRegistry, ProtocolExtension};
pub use scope::Scope;
pub use session::{
    AuthorizationCodeSession, ClientCredentialsSession, ImplicitSession, InMemorySessionStore, PasswordSession,
    Session, SessionStore,
};
pub use token_type::{Challenge, ResourceAccessError, TokenTypeDriver, ValidationError};
pub use types::{AccessTokenData, AuthorizationErrorResponse, AuthorizationFlow, TokenErrorResponse, TokenResponse};

#[cfg(feature = "reqwest-client")]
pub use reqwest_client::ReqwestHttpClient;

pub use liboauth2_lib::random::new_state;
