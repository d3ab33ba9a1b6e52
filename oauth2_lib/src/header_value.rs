//! Helpers for the handful of HTTP header grammars OAuth needs.

/// Extracts the media type (`type/subtype`, lowercased) from a `Content-Type`
/// value, ignoring any parameters.
///
/// Returns `None` when the value does not contain a `type/subtype` pair.
///
/// # Example
/// ```
/// use liboauth2_lib::media_type;
/// assert_eq!(media_type("Application/JSON; charset=utf-8").as_deref(), Some("application/json"));
/// assert_eq!(media_type("garbage"), None);
/// ```
pub fn media_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let (kind, subtype) = essence.split_once('/')?;
    let (kind, subtype) = (kind.trim(), subtype.trim());
    if kind.is_empty() || subtype.is_empty() || kind.contains(char::is_whitespace) || subtype.contains(char::is_whitespace) {
        return None;
    }
    Some(format!("{}/{}", kind.to_ascii_lowercase(), subtype.to_ascii_lowercase()))
}

/// Escapes a string for use in a quoted-string according to RFC 7230.
///
/// # Arguments
///
/// * `s` - The string to escape
///
/// # Returns
///
/// The escaped string (without quotes)
pub fn escape_quoted_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);

    for c in s.chars() {
        if c == '"' || c == '\\' {
            result.push('\\');
        }
        result.push(c);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_parameters_ignored() {
        assert_eq!(media_type("application/json;charset=UTF-8").as_deref(), Some("application/json"));
        assert_eq!(
            media_type(" application/x-www-form-urlencoded ").as_deref(),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_media_type_rejects_malformed() {
        assert_eq!(media_type(""), None);
        assert_eq!(media_type("application/"), None);
        assert_eq!(media_type("/json"), None);
        assert_eq!(media_type("text plain/x"), None);
    }

    #[test]
    fn test_escape_quoted_string() {
        assert_eq!(escape_quoted_string(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
