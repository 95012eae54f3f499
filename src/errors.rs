//! Typed error hierarchy for the BuilderHub client.
//!
//! - `GatewayError`: a single backend request failed
//! - `SyncError`: a live collection could not be established or streamed
//! - `ValidationErrors`: form input rejected before any network call
//! - `ControllerError`: what a dashboard intent reports back to its caller
//! - `AuthError`: login, signup and session checks

use std::fmt;

use thiserror::Error;

/// Message used when an error response carries no parseable `detail`.
pub const GENERIC_FAILURE: &str = "request failed";

/// Errors from the remote data gateway.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not authenticated: {message}")]
    Unauthorized { message: String },

    #[error("{message} (HTTP {status})")]
    ValidationOrServerError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl GatewayError {
    /// Map a non-success status and an optional backend message onto the
    /// taxonomy.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let message = detail.unwrap_or_else(|| GENERIC_FAILURE.to_string());
        match status {
            401 => Self::Unauthorized { message },
            403 => Self::Forbidden { message },
            404 => Self::NotFound { message },
            _ => Self::ValidationOrServerError { status, message },
        }
    }

    /// Message suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { message }
            | Self::Forbidden { message }
            | Self::Unauthorized { message }
            | Self::ValidationOrServerError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the real-time subscription layer.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The live subscription could not be established. Triggers the
    /// one-shot REST fallback; never fatal.
    #[error("Subscription setup failed: {0}")]
    SubscriptionSetup(String),

    #[error("Subscription stream error: {0}")]
    Stream(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field errors for one form submission, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `Ok(value)` when no errors were recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors reported by dashboard controller intents.
#[derive(Debug, Clone, Error)]
pub enum ControllerError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Project {id} is not loaded")]
    UnknownProject { id: String },

    #[error("Task {id} is not loaded")]
    UnknownTask { id: String },
}

/// Errors from the authentication flow.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Session storage failed: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }
}
