//! Top-level error types for gwm-checkin.

use std::fmt;

use thiserror::Error;

use crate::model::{LOGGED_IN_ELSEWHERE_CODE, TOKEN_EXPIRED_CODE};
use crate::store::StoreError;

/// Why the backend rejected an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The token outlived its validity (`550004`).
    TokenExpired,

    /// Another device logged in with the same account (`607501`).
    LoggedInElsewhere,
}

impl AuthFailure {
    /// Map a backend response code onto the recovery vocabulary.
    ///
    /// Returns `None` for every code that does not call for a re-login.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            TOKEN_EXPIRED_CODE => Some(Self::TokenExpired),
            LOGGED_IN_ELSEWHERE_CODE => Some(Self::LoggedInElsewhere),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenExpired => TOKEN_EXPIRED_CODE,
            Self::LoggedInElsewhere => LOGGED_IN_ELSEWHERE_CODE,
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenExpired => write!(f, "access token expired ({})", self.code()),
            Self::LoggedInElsewhere => {
                write!(f, "session taken over by a login elsewhere ({})", self.code())
            }
        }
    }
}

/// Error type for every fallible operation in the core crate.
///
/// Business outcomes of authenticated calls (for example "already checked in
/// today") are not errors; they come back as
/// [`ApiResult::DomainError`](crate::model::ApiResult::DomainError).
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration. Raised before any network call.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Timeout, connection failure, or any other transport problem.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success HTTP status and no usable body.
    #[error("unexpected HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    /// The token was still rejected after the single allowed re-login.
    #[error("authentication failed after re-login: {reason}")]
    AuthRejected { reason: AuthFailure },

    /// A non-success backend code on a call where it is terminal (login).
    #[error("backend returned {code}: {message}")]
    Domain { code: String, message: String },

    /// Non-JSON body or missing fields; a protocol mismatch, not a business outcome.
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// The request could not be turned into a signed request.
    #[error("signing error: {message}")]
    Signing { message: String },

    /// An authenticated call was attempted without a current token.
    #[error("not authenticated: log in first")]
    NotAuthenticated,

    /// Error from session persistence.
    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
