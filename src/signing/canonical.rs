//! Canonical request string
//!
//! The canonical string is the message that gets signed. It is laid out as
//!
//! ```text
//! METHOD\nPATH\nname1:value1;name2:value2\nBODY
//! ```
//!
//! where the header section lists the headers named by the caller, in the
//! order the caller gave them, with lowercased names and trimmed values.

use axum::http::HeaderMap;
use std::collections::HashMap;

/// Case-insensitive header lookup used when building the canonical string.
pub trait HeaderLookup {
    /// Return the value of the header `name`, ignoring ASCII case.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        // HeaderMap names are stored lowercased and `get` normalizes the key.
        // `to_str` only admits visible ASCII, so decode the raw bytes instead.
        self.get(name)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }
}

impl HeaderLookup for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Split a signed-headers list into lookup names.
///
/// Entries are trimmed; entries that are empty after trimming are dropped, so
/// an empty list yields no names at all.
pub fn signed_header_names(signed_headers: &str) -> impl Iterator<Item = &str> {
    signed_headers
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Build the canonical string for a request.
///
/// A header named in `signed_headers` but absent from `headers` contributes
/// an empty value rather than an error. Non UTF-8 body bytes are replaced
/// with U+FFFD.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use webhook_gate::signing::build_canonical_string;
///
/// let mut headers = HashMap::new();
/// headers.insert("Content-Type".to_string(), "application/json".to_string());
///
/// let canonical = build_canonical_string("POST", "/", "Content-Type", &headers, br#"{"a":1}"#);
/// assert_eq!(canonical, "POST\n/\ncontent-type:application/json\n{\"a\":1}");
/// ```
pub fn build_canonical_string<H>(
    method: &str,
    path: &str,
    signed_headers: &str,
    headers: &H,
    body: &[u8],
) -> String
where
    H: HeaderLookup + ?Sized,
{
    let header_section = signed_header_names(signed_headers)
        .map(|name| {
            let value = headers.header(name).unwrap_or("").trim();
            format!("{}:{}", name.to_lowercase(), value)
        })
        .collect::<Vec<_>>()
        .join(";");

    let body = String::from_utf8_lossy(body);
    format!("{}\n{}\n{}\n{}", method, path, header_section, body)
}
