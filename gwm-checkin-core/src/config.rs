//! Configuration handling.
//!
//! A [`Config`] is built once at startup and shared by reference with the
//! session manager and API client. Sources, later ones winning:
//!
//! 1. `config.toml` in the platform config directory
//!    (`~/.config/gwm-checkin/config.toml` on Linux), or an explicit path
//! 2. environment variables: `APP_KEY`, `APP_SECRET`, `DEVICE_ID`, `GW_ID`,
//!    `MODEL`, `USERNAME`, `PASSWORD`, each also accepted with a `GWM_` prefix
//!    (the prefixed form wins), plus `GWM_BASE_URL`, `GWM_TIMEOUT_SECS` and
//!    `GWM_SESSION_PATH`
//! 3. with the `keyring-store` feature, a missing password is read from the OS
//!    keyring
//!
//! ```toml
//! [app]
//! app_key = "..."
//! app_secret = "..."
//!
//! [credentials]
//! device_id = "..."
//! gw_id = "..."
//! model = "..."
//! username = "..."
//! password = "..."
//!
//! [client]
//! base_url = "https://ap-h5-gateway.gwmcloud.com"
//! timeout_secs = 15
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::secret::Secret;

/// Application name used for config/data directory paths.
pub const APP_NAME: &str = "gwm-checkin";

pub const DEFAULT_BASE_URL: &str = "https://ap-h5-gateway.gwmcloud.com";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Session snapshot file name in the data directory.
pub const SESSION_FILE: &str = "gwm_login.json";

const CONFIG_FILE: &str = "config.toml";

const ENV_PREFIX: &str = "GWM_";

/// Application key and secret baked into the mobile app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppKeys {
    pub app_key: String,
    pub app_secret: Secret,
}

/// Device and account identity. Immutable for the process lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub device_id: String,
    pub gw_id: String,
    pub model: String,
    pub username: String,
    pub password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme, host and optional port only; endpoint paths are absolute.
    pub base_url: String,
    pub timeout_secs: u64,

    /// Where the session snapshot lives. Defaults to the data directory.
    pub session_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            session_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppKeys,
    pub credentials: Credentials,
    pub client: ClientConfig,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "gwm-checkin", APP_NAME)
}

impl Config {
    /// Default location of `config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(CONFIG_FILE))
    }

    /// Load the file layer then apply environment overrides.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&contents)
            .map_err(|e| Error::config(format!("{} in {}", e, path.display())))?;
        config.config_path = Some(path.to_path_buf());
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::config(format!("invalid TOML: {}", e)))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .or_else(|| lookup(name))
                .filter(|value| !value.trim().is_empty())
        };
        let prefixed = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.trim().is_empty())
        };

        if let Some(value) = var("APP_KEY") {
            self.app.app_key = value;
        }
        if let Some(value) = var("APP_SECRET") {
            self.app.app_secret = Secret::new(value);
        }
        if let Some(value) = var("DEVICE_ID") {
            self.credentials.device_id = value;
        }
        if let Some(value) = var("GW_ID") {
            self.credentials.gw_id = value;
        }
        if let Some(value) = var("MODEL") {
            self.credentials.model = value;
        }
        if let Some(value) = var("USERNAME") {
            self.credentials.username = value;
        }
        if let Some(value) = var("PASSWORD") {
            self.credentials.password = Secret::new(value);
        }
        if let Some(value) = prefixed("BASE_URL") {
            self.client.base_url = value;
        }
        if let Some(value) = prefixed("TIMEOUT_SECS") {
            match value.trim().parse() {
                Ok(secs) => self.client.timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring non-numeric GWM_TIMEOUT_SECS={}", value),
            }
        }
        if let Some(value) = prefixed("SESSION_PATH") {
            self.client.session_path = Some(PathBuf::from(value));
        }
    }

    /// Fill a missing password from the OS keyring.
    ///
    /// Returns `true` if a password was found there.
    #[cfg(feature = "keyring-store")]
    pub fn fill_password_from_keyring(&mut self) -> Result<bool> {
        use crate::store::KeyringPasswordStore;

        if !self.credentials.password.is_empty() || self.credentials.username.trim().is_empty() {
            return Ok(false);
        }

        let vault = KeyringPasswordStore::try_new(APP_NAME)?;
        match vault.get(&self.credentials.username)? {
            Some(password) => {
                tracing::debug!("Using account password from the OS keyring");
                self.credentials.password = password;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fail fast, naming every missing field, before any network call.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, &str, bool); 7] = [
            ("app.app_key", "APP_KEY", self.app.app_key.trim().is_empty()),
            ("app.app_secret", "APP_SECRET", self.app.app_secret.is_empty()),
            ("credentials.device_id", "DEVICE_ID", self.credentials.device_id.trim().is_empty()),
            ("credentials.gw_id", "GW_ID", self.credentials.gw_id.trim().is_empty()),
            ("credentials.model", "MODEL", self.credentials.model.trim().is_empty()),
            ("credentials.username", "USERNAME", self.credentials.username.trim().is_empty()),
            ("credentials.password", "PASSWORD", self.credentials.password.is_empty()),
        ];

        let missing: Vec<String> = checks
            .iter()
            .filter(|(_, _, is_missing)| *is_missing)
            .map(|(field, env, _)| format!("{} ({})", field, env))
            .collect();
        if !missing.is_empty() {
            return Err(Error::config(format!("missing {}", missing.join(", "))));
        }

        let base_url = Url::parse(&self.client.base_url).map_err(|e| {
            Error::config(format!("invalid base_url {}: {}", self.client.base_url, e))
        })?;
        // Endpoint paths are absolute and replace any path on the base URL.
        if base_url.path() != "/" || base_url.query().is_some() {
            return Err(Error::config(format!(
                "base_url must be an origin without a path or query: {}",
                self.client.base_url
            )));
        }

        if self.client.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than zero"));
        }

        Ok(())
    }

    /// Location of the session snapshot.
    pub fn session_path(&self) -> PathBuf {
        if let Some(path) = &self.client.session_path {
            return path.clone();
        }
        project_dirs()
            .map(|d| d.data_dir().join(SESSION_FILE))
            .unwrap_or_else(|| PathBuf::from(SESSION_FILE))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.client.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete() -> Config {
        Config::from_toml_str(
            r#"
            [app]
            app_key = "k"
            app_secret = "s"

            [credentials]
            device_id = "dev"
            gw_id = "gw"
            model = "Pixel"
            username = "u1"
            password = "p1"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.client.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert!(config.session_path().ends_with(SESSION_FILE));
    }

    #[test]
    fn test_complete_config_validates() {
        let config = complete();
        assert!(config.validate().is_ok());
        assert_eq!(config.credentials.password.expose(), "p1");
    }

    #[test]
    fn test_validate_names_every_missing_field() {
        let err = Config::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::Config { .. }));
        for env in ["APP_KEY", "APP_SECRET", "DEVICE_ID", "GW_ID", "MODEL", "USERNAME", "PASSWORD"] {
            assert!(msg.contains(env), "{} missing from: {}", env, msg);
        }
    }

    #[test]
    fn test_validate_rejects_bad_base_url_and_timeout() {
        let mut config = complete();
        config.client.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = complete();
        config.client.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_base_url_with_path() {
        let mut config = complete();
        config.client.base_url = "http://proxy.local/gw".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("origin"), "{}", err);

        config.client.base_url = "http://proxy.local:8080/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_prefixed_wins() {
        let vars: HashMap<&str, &str> = [
            ("USERNAME", "os-user"),
            ("GWM_USERNAME", "u2"),
            ("PASSWORD", "p2"),
            ("GWM_BASE_URL", "http://127.0.0.1:8080"),
            ("GWM_TIMEOUT_SECS", "3"),
            ("MODEL", "   "),
        ]
        .into_iter()
        .collect();

        let mut config = complete();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.credentials.username, "u2");
        assert_eq!(config.credentials.password.expose(), "p2");
        assert_eq!(config.credentials.model, "Pixel");
        assert_eq!(config.client.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.client.timeout_secs, 3);
    }

    #[test]
    fn test_explicit_session_path() {
        let mut config = complete();
        config.client.session_path = Some(PathBuf::from("/tmp/session.json"));
        assert_eq!(config.session_path(), PathBuf::from("/tmp/session.json"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[app]\napp_key = \"from-file\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.app.app_key, "from-file");
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));

        let missing = Config::from_file(&temp.path().join("nope.toml"));
        assert!(matches!(missing, Err(Error::Config { .. })));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            Config::from_toml_str("[app"),
            Err(Error::Config { .. })
        ));
    }
}
