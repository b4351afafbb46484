//! Canonical request formatting.
//!
//! The gateway verifies signatures over a string built from the request's
//! parameters:
//!
//! - writes (`POST`, `PUT`, `PATCH`) contribute `json=` followed by the compact
//!   body with every whitespace character removed, or `json={}` when there is
//!   no body
//! - `GET` contributes its query pairs with lower-cased keys, sorted by key and
//!   concatenated as `key=value` with no separator
//! - anything else contributes nothing
//!
//! Bodies are passed in already serialized (see [`encode_body`]) so that the
//! bytes that are signed are the bytes that are sent.

use reqwest::Method;
use serde::Serialize;
use url::Url;

/// Marker for a write without a body.
pub const EMPTY_BODY: &str = "json={}";

/// Serialize a request body as compact JSON with non-ASCII characters escaped
/// as `\uXXXX`.
///
/// Field order is the declaration order of `T`, which the signature depends on.
pub fn encode_body<T: Serialize + ?Sized>(body: &T) -> Result<String, serde_json::Error> {
    let compact = serde_json::to_string(body)?;
    Ok(escape_non_ascii(&compact))
}

fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Remove every whitespace character.
pub fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_write(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// Canonical parameter string for a request.
pub fn format(method: &Method, url: &Url, body: Option<&str>) -> String {
    if is_write(method) {
        return match body.map(str::trim) {
            None | Some("") | Some("{}") => EMPTY_BODY.to_string(),
            Some(json) => strip_whitespace(&format!("json={}", json)),
        };
    }

    if *method == Method::GET {
        return match url.query() {
            Some(query) if !query.is_empty() => format_query(url),
            _ => String::new(),
        };
    }

    String::new()
}

fn format_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (key.to_lowercase(), value.into_owned()))
        .collect();

    // Ties on a repeated key are ordered by value so any permutation of the
    // query gives the same string.
    pairs.sort();

    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}
