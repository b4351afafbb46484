//! Signed transport to the GWM app gateway.
//!
//! [`Gateway`] owns the HTTP connection pool, the base URL and the
//! [`RequestSigner`]. It signs, sends and decodes one request; it knows
//! nothing about sessions or retries.

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::canonical;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::Envelope;
use crate::signer::RequestSigner;

pub const LOGIN_PATH: &str = "/app-api/api/v1.0/userAuth/loginAccount";
pub const POINTS_PATH: &str = "/integral/api/v1.0/user-points/get";
pub const CHECK_IN_PATH: &str = "/point-task/api/v1.0/task/add/addPoint";

/// Maximum length for response bodies quoted in error messages.
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated, {} total bytes)", head, body.len())
    }
}

/// A decoded backend answer.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub envelope: Envelope,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct Gateway {
    http: Client,
    base_url: Url,
    signer: RequestSigner,
}

impl Gateway {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        let base_url = Url::parse(&config.client.base_url).map_err(|e| {
            Error::config(format!("invalid base_url {}: {}", config.client.base_url, e))
        })?;
        let signer = RequestSigner::new(&config.app, config.credentials.device_id.clone());

        Ok(Self {
            http,
            base_url,
            signer,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::signing(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Serialize a request body the way it is signed and sent.
    pub fn encode<B: Serialize + ?Sized>(body: &B) -> Result<String> {
        canonical::encode_body(body)
            .map_err(|e| Error::signing(format!("failed to serialize request body: {}", e)))
    }

    /// Sign and send one request, then decode the response envelope.
    ///
    /// `extra_headers` are applied after signing and override defaults with
    /// the same name. A body that is not a JSON envelope yields
    /// [`Error::HttpStatus`] for non-success statuses and
    /// [`Error::MalformedResponse`] otherwise.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        access_token: &str,
        extra_headers: &[(&str, String)],
    ) -> Result<GatewayResponse> {
        let url = self.endpoint(path)?;
        let mut request = self
            .signer
            .sign_request(method, url, body, access_token)?;
        for (name, value) in extra_headers {
            request.headers.set(*name, value.clone());
        }

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.to_header_map()?);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope = match serde_json::from_str::<Value>(&text)
            .map_err(|e| Error::malformed(path, format!("body is not JSON ({}): {}", e, truncate_body(&text))))
            .and_then(|raw| Envelope::from_value(path, raw))
        {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(Error::HttpStatus {
                    endpoint: path.to_string(),
                    status: status.as_u16(),
                });
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            method = %request.method,
            path,
            status = status.as_u16(),
            code = %envelope.code,
            "gateway response"
        );

        Ok(GatewayResponse { status, envelope })
    }
}
