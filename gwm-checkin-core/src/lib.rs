//! # GWM Check-in Core
//!
//! Client library for the GWM (Haval) mobile app gateway.
//!
//! This crate provides:
//! - Request signing in the gateway's `bt-auth-*` scheme
//! - A persisted login session with automatic one-shot re-login
//! - Authenticated calls for the point balance and the daily check-in
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gwm_checkin_core::{ApiClient, ApiResult, Config};
//!
//! async fn daily(config: Config) -> gwm_checkin_core::Result<()> {
//!     let mut client = ApiClient::from_config(Arc::new(config))?;
//!     if let ApiResult::Success(points) = client.get_points().await? {
//!         println!("points: {}", points);
//!     }
//!     client.check_in_default().await?;
//!     Ok(())
//! }
//! ```

pub mod canonical;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod nonce;
pub mod secret;
pub mod session;
pub mod signer;
pub mod store;

// Re-export commonly used types at crate root
pub use client::{ApiClient, DEFAULT_BUSINESS_ID, DEFAULT_TASK_CODE};

pub use config::{AppKeys, ClientConfig, Config, Credentials};

pub use error::{AuthFailure, Error, Result};

pub use gateway::Gateway;

pub use model::{ApiResult, CheckInReceipt, PointBalance, SessionSnapshot};

pub use secret::Secret;

pub use session::{AuthState, SessionManager};

pub use signer::{RequestSigner, SignedHeaders, SignedRequest};

pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};

#[cfg(feature = "keyring-store")]
pub use store::KeyringPasswordStore;
