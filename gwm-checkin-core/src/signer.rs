//! Request signing for the GWM app gateway.
//!
//! Every request carries a `bt-auth-sign` header computed as:
//!
//! ```text
//! base      = METHOD + path + "bt-auth-appkey:{key}bt-auth-nonce:{nonce}bt-auth-timestamp:{ts}"
//!             + canonical(method, url, body) + app_secret
//! signature = hex(sha256(quote_plus(strip_whitespace(base))))
//! ```
//!
//! plus a fixed block of identity, locale and channel headers that the
//! gateway's access-control layer expects from the Thai Haval app build.
//!
//! Signing performs no I/O. Apart from the nonce and timestamp, which change
//! on every call, the output is fully determined by the inputs;
//! [`RequestSigner::sign_with`] takes both explicitly.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use sha2::{Digest, Sha256};
use url::Url;

use crate::canonical;
use crate::config::AppKeys;
use crate::error::{Error, Result};
use crate::nonce;
use crate::secret::Secret;

/// Authentication scheme tag prefixed to the `-auth-*` fragments.
pub const AUTH_PREFIX: &str = "bt";

pub const HEADER_APP_KEY: &str = "bt-auth-appkey";
pub const HEADER_TIMESTAMP: &str = "bt-auth-timestamp";
pub const HEADER_NONCE: &str = "bt-auth-nonce";
pub const HEADER_SIGN: &str = "bt-auth-sign";
pub const HEADER_ACCESS_TOKEN: &str = "accessToken";

/// Locale, channel and client metadata sent with every request.
const STATIC_HEADERS: &[(&str, &str)] = &[
    ("secVersion", "2.0"),
    ("rs", "2"),
    ("appId", "1"),
    ("enterpriseId", "CC01"),
    ("timeZone", "GMT+07:00"),
    ("terminal", "GW_APP_Haval"),
    ("country", "TH"),
    ("brand", "1"),
    ("language", "th"),
    ("channel", "APP"),
    ("systemType", "1"),
    ("communityBrand", ""),
    ("regionCode", "TH"),
    ("cVer", "3.0.1"),
    ("Content-Type", "application/json; charset=UTF-8"),
];

/// Percent-encode with `quote_plus` semantics: only `A-Za-z0-9-_.~` pass
/// through and spaces become `+`.
fn quote_plus(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

/// Ordered header set produced for one request.
#[derive(Clone)]
pub struct SignedHeaders {
    pub nonce: String,
    pub timestamp: i64,
    pub signature: String,
    entries: Vec<(String, String)>,
}

impl SignedHeaders {
    /// Look up a header value, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace a header (case-insensitive match) or append it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a [`HeaderMap`] for `reqwest`.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::signing(format!("invalid header name {}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::signing(format!("invalid value for header {}: {}", name, e)))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

impl fmt::Debug for SignedHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("SignedHeaders")
            .field("nonce", &self.nonce)
            .field("timestamp", &self.timestamp)
            .field("signature", &self.signature)
            .field("headers", &names)
            .finish()
    }
}

/// A request ready to be sent: built once per call and dropped after the exchange.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<String>,
    pub headers: SignedHeaders,
}

/// Signs requests with the application key/secret and device identity.
#[derive(Clone)]
pub struct RequestSigner {
    app_key: String,
    app_secret: Secret,
    device_id: String,
}

impl RequestSigner {
    pub fn new(keys: &AppKeys, device_id: impl Into<String>) -> Self {
        Self {
            app_key: keys.app_key.clone(),
            app_secret: keys.app_secret.clone(),
            device_id: device_id.into(),
        }
    }

    /// Sign a request with a fresh nonce and the current time.
    ///
    /// `access_token` is empty for the login call itself.
    pub fn sign(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
        access_token: &str,
    ) -> Result<SignedHeaders> {
        self.sign_with(
            method,
            url,
            body,
            access_token,
            &nonce::default_nonce(),
            nonce::timestamp_millis(),
        )
    }

    /// Sign a request with an explicit nonce and timestamp.
    pub fn sign_with(
        &self,
        method: &Method,
        url: &str,
        body: Option<&str>,
        access_token: &str,
        nonce: &str,
        timestamp: i64,
    ) -> Result<SignedHeaders> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::signing(format!("invalid URL {}: {}", url, e)))?;
        let signature = self.signature(method, &parsed, body, nonce, timestamp);

        let mut entries: Vec<(String, String)> = vec![
            (HEADER_APP_KEY.to_string(), self.app_key.clone()),
            (HEADER_TIMESTAMP.to_string(), timestamp.to_string()),
            (HEADER_NONCE.to_string(), nonce.to_string()),
            (HEADER_SIGN.to_string(), signature.clone()),
            (HEADER_ACCESS_TOKEN.to_string(), access_token.to_string()),
            ("deviceId".to_string(), self.device_id.clone()),
            ("iccid".to_string(), self.device_id.clone()),
        ];
        entries.extend(
            STATIC_HEADERS
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string())),
        );

        tracing::trace!(method = %method, path = parsed.path(), nonce, timestamp, "signed request");

        Ok(SignedHeaders {
            nonce: nonce.to_string(),
            timestamp,
            signature,
            entries,
        })
    }

    /// Build a [`SignedRequest`] for `url`.
    pub fn sign_request(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        access_token: &str,
    ) -> Result<SignedRequest> {
        let headers = self.sign(&method, url.as_str(), body.as_deref(), access_token)?;
        Ok(SignedRequest {
            method,
            url,
            body,
            headers,
        })
    }

    /// Compute the `bt-auth-sign` value.
    pub fn signature(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&str>,
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let preamble = format!(
            "{p}-auth-appkey:{key}{p}-auth-nonce:{nonce}{p}-auth-timestamp:{ts}",
            p = AUTH_PREFIX,
            key = self.app_key,
            nonce = nonce,
            ts = timestamp,
        );
        let params = canonical::format(method, url, body);

        let base = format!(
            "{}{}{}{}{}",
            method.as_str().to_uppercase(),
            url.path(),
            preamble,
            params,
            self.app_secret.expose()
        );
        let encoded = quote_plus(&canonical::strip_whitespace(&base));

        hex::encode(Sha256::digest(encoded.as_bytes()))
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("app_key", &self.app_key)
            .field("app_secret", &self.app_secret)
            .field("device_id", &self.device_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTS_URL: &str = "https://ap-h5-gateway.gwmcloud.com/integral/api/v1.0/user-points/get";
    const CHECK_IN_URL: &str =
        "https://ap-h5-gateway.gwmcloud.com/point-task/api/v1.0/task/add/addPoint";
    const NONCE: &str = "ABCDEFGH12345678";
    const TS: i64 = 1_700_000_000_000;

    fn signer() -> RequestSigner {
        let keys = AppKeys {
            app_key: "APPKEY1".to_string(),
            app_secret: Secret::new("s3cr3t"),
        };
        RequestSigner::new(&keys, "dev-1")
    }

    #[test]
    fn test_quote_plus() {
        assert_eq!(quote_plus("a b/c:d"), "a+b%2Fc%3Ad");
        assert_eq!(quote_plus("A-z_0.9~"), "A-z_0.9~");
        assert_eq!(quote_plus("{\"k\":1}"), "%7B%22k%22%3A1%7D");
    }

    #[test]
    fn test_get_signature_known_vector() {
        let headers = signer()
            .sign_with(&Method::GET, POINTS_URL, None, "T1", NONCE, TS)
            .unwrap();
        assert_eq!(
            headers.signature,
            "68cfbc598e04e741b30c7ed6ccfc519247636146215b210b88a30e21a292f865"
        );
    }

    #[test]
    fn test_post_signature_known_vector() {
        let body = r#"{"businessId":"DAILY_CHECK_IN","taskCode":"TH10020003","gwid":"gw-1","platform":"01"}"#;
        let headers = signer()
            .sign_with(&Method::POST, CHECK_IN_URL, Some(body), "T1", NONCE, TS)
            .unwrap();
        assert_eq!(
            headers.signature,
            "5a58edd28545ca4f753b5edea9329665ebfac344dc5891969894fa2c2831cd31"
        );
    }

    #[test]
    fn test_query_signature_known_vector() {
        let keys = AppKeys {
            app_key: "k".to_string(),
            app_secret: Secret::new("s"),
        };
        let headers = RequestSigner::new(&keys, "d")
            .sign_with(&Method::GET, "https://h/p?b=2&A=1", None, "", "N", 1)
            .unwrap();
        assert_eq!(
            headers.signature,
            "d11b2e8d3d0a9d357f6fbdc6396188f5ee4ecc706f3d27f2581cedbb14d58253"
        );
    }

    #[test]
    fn test_signature_ignores_host_and_access_token() {
        let s = signer();
        let a = s
            .sign_with(&Method::GET, POINTS_URL, None, "T1", NONCE, TS)
            .unwrap();
        let b = s
            .sign_with(
                &Method::GET,
                "http://127.0.0.1:9999/integral/api/v1.0/user-points/get",
                None,
                "T2",
                NONCE,
                TS,
            )
            .unwrap();
        assert_eq!(a.signature, b.signature);
    }

    #[test]
    fn test_signature_changes_with_each_input() {
        let s = signer();
        let url = Url::parse(CHECK_IN_URL).unwrap();
        let body = r#"{"taskCode":"A"}"#;
        let base = s.signature(&Method::POST, &url, Some(body), NONCE, TS);

        let other_path = Url::parse("https://ap-h5-gateway.gwmcloud.com/other").unwrap();
        let other_keys = AppKeys {
            app_key: "APPKEY1".to_string(),
            app_secret: Secret::new("different"),
        };
        let variants = [
            s.signature(&Method::PUT, &url, Some(body), NONCE, TS),
            s.signature(&Method::POST, &other_path, Some(body), NONCE, TS),
            s.signature(&Method::POST, &url, Some(r#"{"taskCode":"B"}"#), NONCE, TS),
            s.signature(&Method::POST, &url, Some(body), "ZZZZZZZZZZZZZZZZ", TS),
            s.signature(&Method::POST, &url, Some(body), NONCE, TS + 1),
            RequestSigner::new(&other_keys, "dev-1").signature(
                &Method::POST,
                &url,
                Some(body),
                NONCE,
                TS,
            ),
        ];
        for variant in variants {
            assert_ne!(variant, base);
        }

        assert_eq!(s.signature(&Method::POST, &url, Some(body), NONCE, TS), base);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let s = signer();
        let a = s.sign(&Method::GET, POINTS_URL, None, "T1").unwrap();
        let b = s.sign(&Method::GET, POINTS_URL, None, "T1").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn test_header_set() {
        let headers = signer()
            .sign_with(&Method::POST, CHECK_IN_URL, None, "", NONCE, TS)
            .unwrap();

        assert_eq!(headers.get("bt-auth-appkey"), Some("APPKEY1"));
        assert_eq!(headers.get("bt-auth-timestamp"), Some("1700000000000"));
        assert_eq!(headers.get("bt-auth-nonce"), Some(NONCE));
        assert_eq!(headers.get("bt-auth-sign"), Some(headers.signature.as_str()));
        assert_eq!(headers.get("accessToken"), Some(""));
        assert_eq!(headers.get("deviceId"), Some("dev-1"));
        assert_eq!(headers.get("iccid"), Some("dev-1"));
        assert_eq!(headers.get("terminal"), Some("GW_APP_Haval"));
        assert_eq!(headers.get("content-type"), Some("application/json; charset=UTF-8"));
        assert!(headers.iter().all(|(_, v)| v != "s3cr3t"));

        let map = headers.to_header_map().unwrap();
        assert_eq!(map.len(), headers.len());
        assert_eq!(map.get("accesstoken").unwrap(), "");
    }

    #[test]
    fn test_set_overrides_case_insensitively() {
        let mut headers = signer()
            .sign_with(&Method::POST, CHECK_IN_URL, None, "T1", NONCE, TS)
            .unwrap();
        let before = headers.len();
        headers.set("content-type", "application/json");
        headers.set("brandId", "1");
        assert_eq!(headers.get("Content-Type"), Some("application/json"));
        assert_eq!(headers.get("brandid"), Some("1"));
        assert_eq!(headers.len(), before + 1);
    }

    #[test]
    fn test_invalid_url_is_a_signing_error() {
        let err = signer()
            .sign(&Method::GET, "not a url", None, "")
            .unwrap_err();
        assert!(matches!(err, Error::Signing { .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("s3cr3t"));
    }
}
