use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode, percent_encode};

/// Custom encode set for application/x-www-form-urlencoded allowing unreserved characters including hyphens
const FORM_URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encodes a string for URL safety and returns an owned `String`
///
/// Besides being used for form bodies, this is the encoding RFC 6749 §2.3.1
/// requires for the client id and secret before they go into HTTP Basic
/// credentials.
///
/// # Example
/// ```
/// use liboauth2_lib::url_encoding::encode_url_owned;
/// let encoded = encode_url_owned("Hello World!");
/// assert_eq!(encoded, "Hello%20World%21");
/// ```
pub fn encode_url_owned(input: &str) -> String {
    percent_encode(input.as_bytes(), FORM_URLENCODE_SET).to_string()
}

/// Decodes a URL-encoded string and returns an owned `String`.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_url_owned(input: &str) -> String {
    percent_decode(input.as_bytes())
        .decode_utf8_lossy()
        .into_owned()
}

/// Serializes key/value pairs into an `application/x-www-form-urlencoded` body.
///
/// Pairs are emitted in iteration order.
///
/// # Example
/// ```
/// use liboauth2_lib::url_encoding::encode_form;
/// let body = encode_form([("grant_type", "password"), ("username", "j doe")]);
/// assert_eq!(body, "grant_type=password&username=j%20doe");
/// ```
pub fn encode_form<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", encode_url_owned(k.as_ref()), encode_url_owned(v.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses an `application/x-www-form-urlencoded` string into ordered pairs.
///
/// Repeated keys are kept; `+` decodes to a space. Empty segments are skipped,
/// and a segment without `=` yields an empty value.
pub fn decode_form(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    decode_url_owned(&raw.replace('+', " "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_unreserved() {
        assert_eq!(encode_url_owned("scope-a_b.c~d"), "scope-a_b.c~d");
        assert_eq!(encode_url_owned("a b:c"), "a%20b%3Ac");
    }

    #[test]
    fn test_decode_form_plus_and_percent() {
        let pairs = decode_form("a=1+2&b=x%20y&&c");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1 2".to_string()),
                ("b".to_string(), "x y".to_string()),
                ("c".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_decode_form_keeps_repeats() {
        let pairs = decode_form("access_token=a&access_token=b");
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_form_roundtrip_special_characters() {
        let body = encode_form([("redirect_uri", "https://client.example.com/cb?x=1&y=2")]);
        let pairs = decode_form(&body);
        assert_eq!(pairs[0].1, "https://client.example.com/cb?x=1&y=2");
    }
}
