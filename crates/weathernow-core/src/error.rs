//! Centralized error types for the WeatherNow application.
//!
//! This module provides a typed error hierarchy that:
//! - Classifies every failure with an [`ErrorKind`] at the point it happens
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Failure classification shared by every weather and location operation.
///
/// The kind is attached by whoever observes the failure (HTTP status, transport
/// error, position source) and is never re-derived from message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Queried place does not exist upstream.
    NotFound,
    /// API key missing or rejected.
    Unauthorized,
    /// Upstream throttling (HTTP 429).
    RateLimited,
    /// The request never produced an HTTP response.
    NetworkUnavailable,
    GeolocationDenied,
    GeolocationUnavailable,
    GeolocationTimeout,
    Unknown,
}

impl ErrorKind {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => {
                "Location not found. Check the spelling or try a nearby city."
            }
            ErrorKind::Unauthorized => "Invalid API key. Please check your configuration.",
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.",
            ErrorKind::NetworkUnavailable => {
                "Network error. Please check your internet connection."
            }
            ErrorKind::GeolocationDenied => {
                "Location permission denied. Please enable location access."
            }
            ErrorKind::GeolocationUnavailable => {
                "Location information unavailable. Try again or search manually."
            }
            ErrorKind::GeolocationTimeout => {
                "Location request timed out. Try again or search for a city."
            }
            ErrorKind::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Whether a user-initiated retry has a reasonable chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited
                | ErrorKind::NetworkUnavailable
                | ErrorKind::GeolocationUnavailable
                | ErrorKind::GeolocationTimeout
                | ErrorKind::Unknown
        )
    }

    /// Configuration problems are surfaced apart from everything else.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, ErrorKind::Unauthorized)
    }
}

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    /// A classified failure from the weather, geocoding or location layer.
    #[error("{message}")]
    Service { kind: ErrorKind, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn service(kind: ErrorKind, message: impl Into<String>) -> Self {
        AppError::Service {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Service { kind, .. } => *kind,
            AppError::Config(_) | AppError::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Returns a user-friendly message suitable for display.
    ///
    /// These messages are designed to be actionable and non-technical.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Service { kind, .. } => kind.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Problems with the configuration file itself.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Values parse but fail validation (bad URL, zero TTL, ...).
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The file is not valid TOML or has wrongly typed values.
    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => {
                "Some settings in config.toml are invalid. Fix them and try again."
            }
            ConfigError::ParseError(_) => {
                "config.toml could not be read. Fix the syntax or delete it to regenerate defaults."
            }
        }
    }
}
