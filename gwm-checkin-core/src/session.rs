//! Session lifecycle: restore, login and re-login.
//!
//! [`SessionManager`] is the only component that reads or writes the
//! [`SessionStore`] and the only one that holds the access token. It moves
//! through three states:
//!
//! ```text
//! Unauthenticated --login ok--> Authenticated(token)
//! Authenticated --recovery code--> Refreshing --login ok--> Authenticated(new)
//! Refreshing --login failed--> Unauthenticated
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> gwm_checkin_core::Result<()> {
//! use std::sync::Arc;
//! use gwm_checkin_core::{Config, FileSessionStore, Gateway, SessionManager};
//!
//! let config = Arc::new(Config::load(None)?);
//! let gateway = Gateway::new(&config)?;
//! let store = FileSessionStore::new(config.session_path());
//!
//! let mut session = SessionManager::new(config, gateway, store);
//! session.initialize().await?;
//! println!("authenticated: {}", session.is_authenticated());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::{Method, StatusCode};

use crate::config::Config;
use crate::error::{AuthFailure, Error, Result};
use crate::gateway::{Gateway, GatewayResponse, LOGIN_PATH};
use crate::model::{LoginPayload, SessionSnapshot};
use crate::secret::Secret;
use crate::store::SessionStore;

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Secret),
    /// A re-login is in flight after the backend rejected the token.
    Refreshing,
}

pub struct SessionManager<S: SessionStore> {
    config: Arc<Config>,
    gateway: Gateway,
    store: S,
    state: AuthState,
    logins: usize,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(config: Arc<Config>, gateway: Gateway, store: S) -> Self {
        Self {
            config,
            gateway,
            store,
            state: AuthState::Unauthenticated,
            logins: 0,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    /// Number of login round-trips made by this manager.
    pub fn login_count(&self) -> usize {
        self.logins
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The current access token.
    pub fn access_token(&self) -> Result<&Secret> {
        match &self.state {
            AuthState::Authenticated(token) => Ok(token),
            _ => Err(Error::NotAuthenticated),
        }
    }

    /// Restore the persisted session, or log in when there is none.
    ///
    /// A snapshot that cannot be read, or that belongs to another account, is
    /// treated as absent.
    #[tracing::instrument(skip(self), fields(account = %self.config.credentials.username))]
    pub async fn initialize(&mut self) -> Result<()> {
        let restored = match self.store.load().await {
            Ok(Some(snapshot)) if snapshot.account != self.config.credentials.username => {
                tracing::warn!(
                    stored = %snapshot.account,
                    "Stored session belongs to another account, ignoring it"
                );
                None
            }
            Ok(Some(snapshot)) => snapshot.access_token().map(Secret::new),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read stored session: {}", e);
                None
            }
        };

        match restored {
            Some(token) => {
                tracing::info!("Restored stored session");
                self.state = AuthState::Authenticated(token);
                Ok(())
            }
            None => {
                tracing::info!("No usable stored session, logging in");
                self.login().await.map(|_| ())
            }
        }
    }

    /// Log in with the configured credentials and persist the new session.
    ///
    /// On failure the manager is left unauthenticated.
    pub async fn login(&mut self) -> Result<Secret> {
        self.logins += 1;
        let payload = LoginPayload::new(&self.config.credentials);
        let body = Gateway::encode(&payload)?;

        let response = self
            .gateway
            .send(Method::POST, LOGIN_PATH, Some(body), "", &[])
            .await;

        match self.complete_login(payload, response).await {
            Ok(token) => {
                self.state = AuthState::Authenticated(token.clone());
                Ok(token)
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                self.state = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    async fn complete_login(
        &self,
        payload: LoginPayload,
        response: Result<GatewayResponse>,
    ) -> Result<Secret> {
        let GatewayResponse { status, envelope } = response?;

        if status != StatusCode::OK {
            return Err(Error::HttpStatus {
                endpoint: LOGIN_PATH.to_string(),
                status: status.as_u16(),
            });
        }
        if !envelope.is_success() {
            return Err(Error::Domain {
                code: envelope.code,
                message: envelope.message,
            });
        }

        let snapshot = SessionSnapshot::new(payload, envelope.raw);
        let token = snapshot
            .access_token()
            .map(Secret::new)
            .ok_or_else(|| Error::malformed(LOGIN_PATH, "login response carries no data.accessToken"))?;

        // The token is good for this run even if it cannot be persisted.
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!("Failed to persist session: {}", e);
        }

        tracing::info!(account = %snapshot.account, "Logged in");
        Ok(token)
    }

    /// Re-login after the backend rejected the current token.
    pub async fn refresh(&mut self, reason: AuthFailure) -> Result<Secret> {
        tracing::info!(code = reason.code(), "Session rejected ({}), logging in again", reason);
        self.state = AuthState::Refreshing;
        self.login().await
    }

    /// Forget the session, both in memory and in the store.
    pub async fn logout(&mut self) -> Result<()> {
        self.store.clear().await?;
        self.state = AuthState::Unauthenticated;
        tracing::info!("Session cleared");
        Ok(())
    }
}

impl<S: SessionStore> std::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("account", &self.config.credentials.username)
            .field("state", &self.state)
            .field("logins", &self.logins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::store::MemorySessionStore;
    use serde_json::json;

    fn config() -> Arc<Config> {
        let mut config = Config::default();
        // Nothing listens here; tests below never reach the network.
        config.client.base_url = "http://127.0.0.1:9".to_string();
        config.credentials.username = "u1".to_string();
        Arc::new(config)
    }

    fn snapshot(account: &str, token: &str) -> SessionSnapshot {
        let credentials = Credentials {
            username: account.to_string(),
            ..Credentials::default()
        };
        SessionSnapshot::new(
            LoginPayload::new(&credentials),
            json!({"code": "000000", "data": {"accessToken": token}}),
        )
    }

    fn manager(store: MemorySessionStore) -> SessionManager<MemorySessionStore> {
        let config = config();
        let gateway = Gateway::new(&config).unwrap();
        SessionManager::new(config, gateway, store)
    }

    #[test]
    fn test_starts_unauthenticated() {
        let session = manager(MemorySessionStore::new());
        assert_eq!(session.state(), &AuthState::Unauthenticated);
        assert!(matches!(session.access_token(), Err(Error::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_initialize_restores_snapshot() {
        let mut session = manager(MemorySessionStore::with_snapshot(snapshot("u1", "T0")));
        session.initialize().await.unwrap();

        assert_eq!(session.state(), &AuthState::Authenticated(Secret::new("T0")));
        assert_eq!(session.login_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_ignores_other_account() {
        let mut session = manager(MemorySessionStore::with_snapshot(snapshot("u2", "T0")));

        // Falls through to a login, which cannot connect.
        assert!(session.initialize().await.is_err());
        assert_eq!(session.login_count(), 1);
        assert_eq!(session.state(), &AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let mut session = manager(MemorySessionStore::with_snapshot(snapshot("u1", "T0")));
        session.initialize().await.unwrap();
        session.logout().await.unwrap();

        assert_eq!(session.state(), &AuthState::Unauthenticated);
        assert!(session.store().load().await.unwrap().is_none());
    }
}
