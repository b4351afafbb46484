//! Wire and domain types for the GWM app gateway.
//!
//! This module defines:
//! - Backend response codes and the [`Envelope`] every endpoint answers with
//! - [`ApiResult`] - tagged outcome of an authenticated call
//! - [`PointBalance`] and [`CheckInReceipt`] - payloads surfaced to callers
//! - [`LoginPayload`] and [`CheckInPayload`] - request bodies, field order is
//!   part of the signature
//! - [`SessionSnapshot`] - the persisted record of the last successful login

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Credentials;
use crate::error::{AuthFailure, Error, Result};
use crate::secret::Secret;

/// Backend code for a successful call.
pub const SUCCESS_CODE: &str = "000000";

/// Backend code for an expired access token.
pub const TOKEN_EXPIRED_CODE: &str = "550004";

/// Backend code for a session invalidated by a login on another device.
pub const LOGGED_IN_ELSEWHERE_CODE: &str = "607501";

/// Country the app build targets. Sent in the login body and headers.
pub const COUNTRY: &str = "TH";

/// Common response shape: `{ "code": ..., "description"|"message"|"msg": ..., "data": ... }`.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub code: String,
    pub message: String,
    pub data: Option<Value>,
    pub raw: Value,
}

impl Envelope {
    /// Parse a decoded JSON body.
    ///
    /// Fails with [`Error::MalformedResponse`] when the body is not an object
    /// or carries no `code`.
    pub fn from_value(endpoint: &str, raw: Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| Error::malformed(endpoint, "response body is not a JSON object"))?;

        let code = match obj.get("code") {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Number(code)) => code.to_string(),
            _ => return Err(Error::malformed(endpoint, "missing `code` field")),
        };

        // Login answers carry `message`/`msg`, the task service uses `description`.
        let message = ["description", "message", "msg"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let data = obj.get("data").filter(|v| !v.is_null()).cloned();

        Ok(Self {
            code,
            message,
            data,
            raw,
        })
    }

    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// The recovery reason, if this code asks for a re-login.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        AuthFailure::from_code(&self.code)
    }

    /// Convert into an [`ApiResult`], building the success payload with `f`.
    pub fn into_result<T>(self, f: impl FnOnce(Envelope) -> T) -> ApiResult<T> {
        if self.is_success() {
            ApiResult::Success(f(self))
        } else {
            ApiResult::DomainError {
                code: self.code,
                message: self.message,
            }
        }
    }
}

/// Outcome of a backend call that reached the business layer.
///
/// Transport and protocol failures are reported through [`Error`] instead, so
/// an error code can never be mistaken for a payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum ApiResult<T> {
    Success(T),
    DomainError { code: String, message: String },
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The backend code: [`SUCCESS_CODE`] for successes.
    pub fn code(&self) -> &str {
        match self {
            Self::Success(_) => SUCCESS_CODE,
            Self::DomainError { code, .. } => code,
        }
    }
}

/// Loyalty point balance. The backend returns either a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointBalance {
    Number(serde_json::Number),
    Text(String),
}

impl PointBalance {
    /// Read the balance out of a get-points `data` field.
    ///
    /// An absent or null `data` counts as zero points.
    pub fn from_data(data: Option<&Value>) -> Self {
        match data {
            Some(Value::Number(n)) => Self::Number(n.clone()),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
            None => Self::zero(),
        }
    }

    pub fn zero() -> Self {
        Self::Number(0.into())
    }
}

impl Default for PointBalance {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for PointBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Successful check-in as reported by the task service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInReceipt {
    pub code: String,
    pub message: String,
    pub data: Option<Value>,
}

impl From<Envelope> for CheckInReceipt {
    fn from(envelope: Envelope) -> Self {
        Self {
            code: envelope.code,
            message: envelope.message,
            data: envelope.data,
        }
    }
}

/// Body of `POST /app-api/api/v1.0/userAuth/loginAccount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub account: String,
    pub password: Secret,
    pub agreement: Vec<u8>,
    pub sms_code: Option<String>,
    pub msg_type: Option<String>,
    pub model: String,
    #[serde(rename = "type")]
    pub login_type: u8,
    pub device_id: String,
    pub app_type: u8,
    pub push_token: String,
    pub country: String,
    pub country_code: Option<String>,
    // The app only ever sends the plaintext variant over TLS.
    pub is_encrypt: bool,
}

impl LoginPayload {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            account: credentials.username.clone(),
            password: credentials.password.clone(),
            agreement: vec![1, 2],
            sms_code: None,
            msg_type: None,
            model: credentials.model.clone(),
            login_type: 1,
            device_id: credentials.device_id.clone(),
            app_type: 0,
            push_token: String::new(),
            country: COUNTRY.to_string(),
            country_code: None,
            is_encrypt: false,
        }
    }
}

/// Body of `POST /point-task/api/v1.0/task/add/addPoint`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInPayload {
    pub business_id: String,
    pub task_code: String,
    pub gwid: String,
    pub platform: String,
}

impl CheckInPayload {
    pub fn new(task_code: &str, business_id: &str, gw_id: &str) -> Self {
        Self {
            business_id: business_id.to_string(),
            task_code: task_code.to_string(),
            gwid: gw_id.to_string(),
            platform: "01".to_string(),
        }
    }
}

/// Persisted record of the last successful login.
///
/// The access token lives inside the raw login response at
/// `response.data.accessToken`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "username")]
    pub account: String,
    pub payload: LoginPayload,
    pub response: Value,
}

impl SessionSnapshot {
    pub fn new(payload: LoginPayload, response: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            account: payload.account.clone(),
            payload,
            response,
        }
    }

    /// The token issued by the login, if the response carries a non-empty one.
    pub fn access_token(&self) -> Option<&str> {
        self.response
            .get("data")?
            .get("accessToken")?
            .as_str()
            .filter(|token| !token.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            device_id: "dev-1".to_string(),
            gw_id: "gw-1".to_string(),
            model: "Pixel 8".to_string(),
            username: "u1".to_string(),
            password: Secret::new("p1"),
        }
    }

    #[test]
    fn test_envelope_reads_description_first() {
        let raw = json!({"code": "620001", "description": "already checked in", "message": "other"});
        let envelope = Envelope::from_value("/x", raw).unwrap();
        assert_eq!(envelope.code, "620001");
        assert_eq!(envelope.message, "already checked in");
        assert!(!envelope.is_success());
    }

    #[test]
    fn test_envelope_falls_back_to_msg() {
        let raw = json!({"code": "100001", "msg": "bad password"});
        let envelope = Envelope::from_value("/x", raw).unwrap();
        assert_eq!(envelope.message, "bad password");
    }

    #[test]
    fn test_envelope_without_code_is_malformed() {
        let err = Envelope::from_value("/x", json!({"data": 1})).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));

        let err = Envelope::from_value("/x", json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn test_envelope_auth_failure() {
        let envelope = Envelope::from_value("/x", json!({"code": "550004"})).unwrap();
        assert_eq!(envelope.auth_failure(), Some(AuthFailure::TokenExpired));

        let envelope = Envelope::from_value("/x", json!({"code": "000000"})).unwrap();
        assert_eq!(envelope.auth_failure(), None);
    }

    #[test]
    fn test_into_result_keeps_domain_error_verbatim() {
        let envelope =
            Envelope::from_value("/x", json!({"code": "620001", "description": "done"})).unwrap();
        let result = envelope.into_result(CheckInReceipt::from);
        assert_eq!(
            result,
            ApiResult::DomainError {
                code: "620001".to_string(),
                message: "done".to_string()
            }
        );
    }

    #[test]
    fn test_point_balance_from_data() {
        assert_eq!(PointBalance::from_data(Some(&json!(120))).to_string(), "120");
        assert_eq!(PointBalance::from_data(Some(&json!("85"))).to_string(), "85");
        assert_eq!(PointBalance::from_data(None), PointBalance::zero());
    }

    #[test]
    fn test_login_payload_field_order() {
        let payload = LoginPayload::new(&credentials());
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"account":"u1","password":"p1","agreement":[1,2],"smsCode":null,"msgType":null,"model":"Pixel 8","type":1,"deviceId":"dev-1","appType":0,"pushToken":"","country":"TH","countryCode":null,"isEncrypt":false}"#
        );
    }

    #[test]
    fn test_check_in_payload_field_order() {
        let payload = CheckInPayload::new("TH10020003", "DAILY_CHECK_IN", "gw-1");
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"businessId":"DAILY_CHECK_IN","taskCode":"TH10020003","gwid":"gw-1","platform":"01"}"#
        );
    }

    #[test]
    fn test_snapshot_access_token() {
        let snapshot = SessionSnapshot::new(
            LoginPayload::new(&credentials()),
            json!({"code": "000000", "data": {"accessToken": "T1"}}),
        );
        assert_eq!(snapshot.account, "u1");
        assert_eq!(snapshot.access_token(), Some("T1"));

        let empty = SessionSnapshot::new(
            LoginPayload::new(&credentials()),
            json!({"code": "000000", "data": {"accessToken": ""}}),
        );
        assert_eq!(empty.access_token(), None);
    }

    #[test]
    fn test_api_result_serializes_tagged() {
        let ok: ApiResult<PointBalance> = ApiResult::Success(PointBalance::Number(42.into()));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"outcome": "success", "value": 42})
        );
    }
}
