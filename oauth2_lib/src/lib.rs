//! Small text helpers used by `liboauth2`: form encoding, header value
//! parsing and opaque random strings.

#[cfg(feature = "url_encoding")]
pub mod url_encoding;

#[cfg(feature = "url_encoding")]
pub use url_encoding::{decode_form, decode_url_owned, encode_form, encode_url_owned};

#[cfg(feature = "random")]
pub mod random;

pub mod header_value;

pub use header_value::{escape_quoted_string, media_type};
