//! Authenticated API calls with one-shot session recovery.
//!
//! Every call goes out with the current access token. When the backend
//! answers with a recovery code (token expired, logged in elsewhere) the
//! client asks the [`SessionManager`] for a fresh login and repeats the call
//! exactly once. A second rejection is returned as [`Error::AuthRejected`].

use std::sync::Arc;

use reqwest::Method;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{CHECK_IN_PATH, Gateway, POINTS_PATH};
use crate::model::{ApiResult, CheckInPayload, CheckInReceipt, Envelope, PointBalance};
use crate::nonce;
use crate::secret::Secret;
use crate::session::SessionManager;
use crate::store::{FileSessionStore, SessionStore};

/// Daily check-in task code of the Thai app build.
pub const DEFAULT_TASK_CODE: &str = "TH10020003";
pub const DEFAULT_BUSINESS_ID: &str = "DAILY_CHECK_IN";

pub const HEADER_TRANSACTION_NUMBER: &str = "transactionNumber";
pub const HEADER_REQUEST_NO: &str = "request_no";
pub const HEADER_BRAND_ID: &str = "brandId";
const CHECK_IN_CONTENT_TYPE: &str = "application/json";

type ExtraHeaders = fn() -> Vec<(&'static str, String)>;

fn no_extra_headers() -> Vec<(&'static str, String)> {
    Vec::new()
}

/// Regenerated for every attempt.
fn check_in_headers() -> Vec<(&'static str, String)> {
    vec![
        (HEADER_TRANSACTION_NUMBER, nonce::request_id()),
        (HEADER_REQUEST_NO, nonce::request_id()),
        (HEADER_BRAND_ID, "1".to_string()),
        ("Content-Type", CHECK_IN_CONTENT_TYPE.to_string()),
    ]
}

pub struct ApiClient<S: SessionStore> {
    config: Arc<Config>,
    gateway: Gateway,
    session: SessionManager<S>,
    last_points: Option<PointBalance>,
}

impl ApiClient<FileSessionStore> {
    /// Client persisting its session to the configured session file.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let store = FileSessionStore::new(config.session_path());
        Self::new(config, store)
    }
}

impl<S: SessionStore> ApiClient<S> {
    /// Build a client without touching the network.
    ///
    /// Fails with [`Error::Config`] when required settings are missing.
    pub fn new(config: Arc<Config>, store: S) -> Result<Self> {
        config.validate()?;
        let gateway = Gateway::new(&config)?;
        let session = SessionManager::new(config.clone(), gateway.clone(), store);

        Ok(Self {
            config,
            gateway,
            session,
            last_points: None,
        })
    }

    /// Build a client and restore or establish its session.
    pub async fn connect(config: Arc<Config>, store: S) -> Result<Self> {
        let mut client = Self::new(config, store)?;
        client.session.initialize().await?;
        Ok(client)
    }

    pub fn session(&self) -> &SessionManager<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager<S> {
        &mut self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Balance from the last successful [`get_points`](Self::get_points).
    pub fn current_points(&self) -> Option<&PointBalance> {
        self.last_points.as_ref()
    }

    /// Current point balance of the account.
    ///
    /// A success without `data` reports a zero balance.
    pub async fn get_points(&mut self) -> Result<ApiResult<PointBalance>> {
        let envelope = self
            .authenticated(Method::GET, POINTS_PATH, None, no_extra_headers)
            .await?;

        let result = envelope.into_result(|e| PointBalance::from_data(e.data.as_ref()));
        match &result {
            ApiResult::Success(points) => {
                tracing::info!(%points, "Fetched point balance");
                self.last_points = Some(points.clone());
            }
            ApiResult::DomainError { code, message } => {
                tracing::warn!(%code, %message, "Point balance request refused");
            }
        }
        Ok(result)
    }

    /// Submit a check-in task.
    ///
    /// "Already checked in today" and similar refusals come back as
    /// [`ApiResult::DomainError`].
    pub async fn check_in(
        &mut self,
        task_code: &str,
        business_id: &str,
    ) -> Result<ApiResult<CheckInReceipt>> {
        let payload = CheckInPayload::new(task_code, business_id, &self.config.credentials.gw_id);
        let body = Gateway::encode(&payload)?;

        let envelope = self
            .authenticated(Method::POST, CHECK_IN_PATH, Some(body), check_in_headers)
            .await?;

        let result = envelope.into_result(CheckInReceipt::from);
        match &result {
            ApiResult::Success(receipt) => {
                tracing::info!(task_code, message = %receipt.message, "Check-in accepted");
            }
            ApiResult::DomainError { code, message } => {
                tracing::warn!(task_code, %code, %message, "Check-in refused");
            }
        }
        Ok(result)
    }

    /// Daily check-in with the default task.
    pub async fn check_in_default(&mut self) -> Result<ApiResult<CheckInReceipt>> {
        self.check_in(DEFAULT_TASK_CODE, DEFAULT_BUSINESS_ID).await
    }

    /// Check the session with a balance request.
    ///
    /// Recovers an expired session the same way any other call does.
    pub async fn verify_session(&mut self) -> Result<bool> {
        Ok(self.get_points().await?.is_success())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        token: &Secret,
        extra_headers: ExtraHeaders,
    ) -> Result<Envelope> {
        let response = self
            .gateway
            .send(method, path, body, token.expose(), &extra_headers())
            .await?;
        Ok(response.envelope)
    }

    async fn authenticated(
        &mut self,
        method: Method,
        path: &str,
        body: Option<String>,
        extra_headers: ExtraHeaders,
    ) -> Result<Envelope> {
        if !self.session.is_authenticated() {
            self.session.initialize().await?;
        }

        let token = self.session.access_token()?.clone();
        let envelope = self
            .send(method.clone(), path, body.clone(), &token, extra_headers)
            .await?;

        let Some(reason) = envelope.auth_failure() else {
            return Ok(envelope);
        };
        tracing::warn!(path, code = %envelope.code, "Access token rejected");

        let token = self.session.refresh(reason).await?;
        let envelope = self
            .send(method, path, body, &token, extra_headers)
            .await?;

        match envelope.auth_failure() {
            Some(reason) => Err(Error::AuthRejected { reason }),
            None => Ok(envelope),
        }
    }
}

impl<S: SessionStore> std::fmt::Debug for ApiClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.gateway.base_url().as_str())
            .field("session", &self.session)
            .finish()
    }
}
