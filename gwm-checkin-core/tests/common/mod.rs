//! Shared fixtures for the mock-backend integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use gwm_checkin_core::model::LoginPayload;
use gwm_checkin_core::{AppKeys, ClientConfig, Config, Credentials, Secret, SessionSnapshot};
use serde_json::{Value, json};

pub const LOGIN_PATH: &str = "/app-api/api/v1.0/userAuth/loginAccount";
pub const POINTS_PATH: &str = "/integral/api/v1.0/user-points/get";
pub const CHECK_IN_PATH: &str = "/point-task/api/v1.0/task/add/addPoint";

/// A complete configuration pointing at `base_url`.
pub fn config(base_url: &str) -> Arc<Config> {
    Arc::new(Config {
        app: AppKeys {
            app_key: "APPKEY1".to_string(),
            app_secret: Secret::new("s3cr3t"),
        },
        credentials: Credentials {
            device_id: "dev-1".to_string(),
            gw_id: "gw-1".to_string(),
            model: "Pixel 8".to_string(),
            username: "u1".to_string(),
            password: Secret::new("p1"),
        },
        client: ClientConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            session_path: None,
        },
        config_path: None,
    })
}

/// A stored session for account `u1` carrying `token`.
pub fn snapshot(token: &str) -> SessionSnapshot {
    SessionSnapshot::new(
        LoginPayload::new(&config("http://unused").credentials),
        login_ok(token),
    )
}

pub fn login_ok(token: &str) -> Value {
    json!({
        "code": "000000",
        "message": "success",
        "data": {"accessToken": token, "refreshToken": "R"}
    })
}

pub fn ok(data: Value) -> Value {
    json!({"code": "000000", "description": "SUCCESS", "data": data})
}

pub fn token_expired() -> Value {
    json!({"code": "550004", "description": "token expired"})
}

pub fn logged_in_elsewhere() -> Value {
    json!({"code": "607501", "description": "account logged in on another device"})
}
